use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::pin,
    rc::Rc,
    time::Duration,
};

use futures::future::{select, Either};
use leptos::logging;
use slotmap::{new_key_type, SlotMap};

use crate::{
    cancellation::{with_cancellation, CancellationSlot, CancellationToken, TokenId},
    executor::{sleep, spawn_local},
    fetch_state::Transition,
    Cancelled, FetchClient, FetchError, FetchOptions, FetchState, Latest, RequestConfig,
    RequestInterceptors, Response, ResponseInterceptors, Transport, TransportHandle,
};

new_key_type! {
    /// Handle for a state listener registered with [`FetchController::subscribe`].
    pub struct ListenerKey;
}

type Listener = Rc<dyn Fn(&FetchState)>;

type OptionsHook = Rc<dyn Fn(&FetchController, &FetchOptions)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Active,
    Deactivated,
}

/// Drives a single logical request slot.
///
/// A controller issues requests built from its base [`RequestConfig`], tracks their
/// progress in a [`FetchState`] and guarantees that only the most recently issued
/// request can ever update that state. Issuing a request aborts the previous one.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct FetchController {
    inner: Rc<Inner>,
}

struct Inner {
    config: Latest<RequestConfig>,
    options: Latest<FetchOptions>,
    transport: TransportHandle,

    // Cancellation
    cancellation: CancellationSlot,
    generation: Cell<u64>,
    in_flight: Cell<bool>,
    lifecycle: Cell<Lifecycle>,

    // State
    state: RefCell<FetchState>,
    listeners: RefCell<SlotMap<ListenerKey, Listener>>,
    options_hooks: RefCell<Vec<OptionsHook>>,
}

impl std::fmt::Debug for FetchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchController")
            .field("config", &self.inner.config)
            .field("options", &self.inner.options)
            .field("state", &self.inner.state)
            .field("lifecycle", &self.inner.lifecycle.get())
            .field("listeners", &"...")
            .finish()
    }
}

impl FetchController {
    /// Creates an idle controller with its own [`TransportHandle`] over `transport`.
    pub fn new(transport: Rc<dyn Transport>, config: RequestConfig, options: FetchOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                config: Latest::new(config),
                options: Latest::new(options),
                transport: TransportHandle::new(transport),
                cancellation: CancellationSlot::new(),
                generation: Cell::new(0),
                in_flight: Cell::new(false),
                lifecycle: Cell::new(Lifecycle::Idle),
                state: RefCell::new(FetchState::default()),
                listeners: RefCell::new(SlotMap::with_key()),
                options_hooks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Creates an idle controller using the transport of `client`.
    pub fn from_client(client: &FetchClient, config: RequestConfig, options: FetchOptions) -> Self {
        Self::new(client.transport(), config, options)
    }

    /// Replaces the base config. Affects requests issued from now on.
    pub fn set_config(&self, config: RequestConfig) {
        self.inner.config.set(config);
    }

    /// The current base config.
    pub fn config(&self) -> RequestConfig {
        self.inner.config.get()
    }

    /// Replaces the options. Affects requests issued from now on.
    pub fn set_options(&self, options: FetchOptions) {
        let previous = self.inner.options.get();
        self.inner.options.set(options);

        let hooks = self
            .inner
            .options_hooks
            .try_borrow()
            .expect("FetchController::set_options hooks borrow")
            .clone();
        for hook in hooks {
            hook(self, &previous);
        }
    }

    /// Registers `hook`, called with the previous options after every [`set_options`](Self::set_options).
    pub(crate) fn on_options_change(
        &self,
        hook: impl Fn(&FetchController, &FetchOptions) + 'static,
    ) {
        self.inner
            .options_hooks
            .try_borrow_mut()
            .expect("FetchController::on_options_change borrow_mut")
            .push(Rc::new(hook));
    }

    /// The current options.
    pub fn options(&self) -> FetchOptions {
        self.inner.options.get()
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> FetchState {
        self.inner
            .state
            .try_borrow()
            .expect("FetchController::state borrow")
            .clone()
    }

    /// Whether `loading` is currently set.
    pub fn is_loading(&self) -> bool {
        self.inner
            .state
            .try_borrow()
            .expect("FetchController::is_loading borrow")
            .loading
    }

    /// Whether the controller is between [`activate`](Self::activate) and [`deactivate`](Self::deactivate).
    pub fn is_active(&self) -> bool {
        self.inner.lifecycle.get() == Lifecycle::Active
    }

    pub(crate) fn is_deactivated(&self) -> bool {
        self.inner.lifecycle.get() == Lifecycle::Deactivated
    }

    /// The transport handle owned by this controller.
    pub fn transport(&self) -> &TransportHandle {
        &self.inner.transport
    }

    /// Interceptors applied to every outgoing request of this controller.
    pub fn request_interceptors(&self) -> &RequestInterceptors {
        self.inner.transport.request_interceptors()
    }

    /// Interceptors applied to every response of this controller.
    pub fn response_interceptors(&self) -> &ResponseInterceptors {
        self.inner.transport.response_interceptors()
    }

    /// Registers a listener called after every state change.
    pub fn subscribe(&self, listener: impl Fn(&FetchState) + 'static) -> ListenerKey {
        self.inner
            .listeners
            .try_borrow_mut()
            .expect("FetchController::subscribe borrow_mut")
            .insert(Rc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, key: ListenerKey) -> bool {
        self.inner
            .listeners
            .try_borrow_mut()
            .expect("FetchController::unsubscribe borrow_mut")
            .remove(key)
            .is_some()
    }

    /// Issues a request and ignores its outcome.
    ///
    /// Failures are only observable through [`state`](Self::state).
    pub fn fetch(&self, config: Option<RequestConfig>) {
        let request = self.fetch_async(config);
        spawn_local(async move {
            if let Err(error) = request.await {
                logging::debug_warn!("Fetch failed: {error}");
            }
        });
    }

    /// Issues a request built from the base config with `config` merged on top.
    ///
    /// The previous request is aborted as soon as this is called, before the returned
    /// future is first polled. Every failure, cancellation included, is returned.
    /// Dropping the future before it completes cancels the request.
    pub fn fetch_async(
        &self,
        config: Option<RequestConfig>,
    ) -> impl Future<Output = Result<Response, FetchError>> + 'static {
        let prepared = self.prepare(config);
        async move {
            let Prepared {
                execution,
                token,
                request,
                delay,
            } = prepared?;
            execution.run(token, request, delay).await
        }
    }

    /// Aborts the in-flight request, if any, and clears `loading`.
    ///
    /// `response` and `error` are left untouched and the aborted request can no longer
    /// change them. Does nothing when no request is in flight.
    pub fn cancel(&self) {
        let inner = &self.inner;
        inner.cancellation.abort_current();

        if inner.in_flight.replace(false) {
            inner.generation.set(inner.generation.get() + 1);
            inner.apply(Transition::Cancel);
        }
    }

    /// Activates the controller.
    ///
    /// With `manual == false` exactly one request is scheduled on the executor. Calling
    /// this on an active controller does nothing.
    pub fn activate(&self) {
        if self.inner.lifecycle.replace(Lifecycle::Active) == Lifecycle::Active {
            return;
        }

        if !self.inner.options.with(|options| options.manual) {
            let controller = self.clone();
            spawn_local(async move {
                // Deactivated before the executor got to us.
                if controller.is_active() {
                    controller.fetch(None);
                }
            });
        }
    }

    /// Aborts the in-flight request and freezes the state.
    ///
    /// Later requests are refused with [`FetchError::Cancelled`] until the controller is
    /// activated again.
    pub fn deactivate(&self) {
        self.cancel();
        self.inner.lifecycle.set(Lifecycle::Deactivated);
    }

    fn prepare(&self, config: Option<RequestConfig>) -> Result<Prepared, FetchError> {
        let inner = &self.inner;

        if inner.lifecycle.get() == Lifecycle::Deactivated {
            logging::debug_warn!("Fetch requested on a deactivated controller.");
            return Err(Cancelled::new("controller was deactivated").into());
        }

        // Supersede whatever is in flight before issuing the new request.
        self.cancel();

        let token = inner.cancellation.replace();
        let generation = inner.generation.get() + 1;
        inner.generation.set(generation);
        inner.in_flight.set(true);

        let request = inner.config.with(|base| base.merge(config.as_ref()));
        let delay = inner.options.with(|options| options.loading_delay);

        let execution = Execution {
            inner: inner.clone(),
            generation,
            token_id: token.id(),
            settled: false,
        };

        if delay.is_zero() {
            execution.start();
        }

        Ok(Prepared {
            execution,
            token,
            request,
            delay,
        })
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.get() == generation && self.lifecycle.get() != Lifecycle::Deactivated
    }

    fn finish(&self, token_id: TokenId) {
        self.cancellation.release(token_id);
        self.in_flight.set(false);
    }

    fn apply(&self, transition: Transition) {
        let state = {
            let mut state = self
                .state
                .try_borrow_mut()
                .expect("FetchController::apply borrow_mut");
            state.apply(transition);
            state.clone()
        };

        // Notify listeners.
        let listeners = self
            .listeners
            .try_borrow()
            .expect("FetchController::apply listeners borrow")
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(&state);
        }
    }
}

struct Prepared {
    execution: Execution,
    token: CancellationToken,
    request: RequestConfig,
    delay: Duration,
}

// One issued request. Settles exactly once, or cancels itself when dropped unsettled.
struct Execution {
    inner: Rc<Inner>,
    generation: u64,
    token_id: TokenId,
    settled: bool,
}

impl Execution {
    fn start(&self) {
        if self.inner.is_current(self.generation) {
            self.inner.apply(Transition::Start);
        }
    }

    async fn run(
        self,
        token: CancellationToken,
        request: RequestConfig,
        delay: Duration,
    ) -> Result<Response, FetchError> {
        let inner = self.inner.clone();
        let request = with_cancellation(inner.transport.request(request), token);

        let outcome = if delay.is_zero() {
            request.await
        } else {
            let request = pin!(request);
            match select(request, pin!(sleep(delay))).await {
                Either::Left((outcome, _)) => outcome,
                Either::Right(((), request)) => {
                    self.start();
                    request.await
                }
            }
        };

        self.settle(&outcome);
        outcome
    }

    fn settle(mut self, outcome: &Result<Response, FetchError>) {
        self.settled = true;

        if !self.inner.is_current(self.generation) {
            logging::debug_warn!("Ignoring the outcome of a superseded request.");
            return;
        }

        self.inner.finish(self.token_id);
        let transition = match outcome {
            Ok(response) => Transition::Resolve(response.clone()),
            Err(error) => Transition::Reject(error.clone()),
        };
        self.inner.apply(transition);
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if !self.settled && self.inner.is_current(self.generation) {
            self.inner.cancellation.abort_current();
            self.inner.finish(self.token_id);
            self.inner.apply(Transition::Cancel);
        }
    }
}
