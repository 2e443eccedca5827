use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use slotmap::{new_key_type, SlotMap};

use crate::{FetchError, RequestConfig, Response};

new_key_type! {
    /// Handle returned when registering an interceptor, used to eject it.
    pub struct InterceptorId;
}

/// A step in an interceptor chain. Receives the outcome of the previous step.
pub type Interceptor<T> = Rc<dyn Fn(Result<T, FetchError>) -> Result<T, FetchError>>;

/// Interceptors run on every outgoing request config.
pub type RequestInterceptors = InterceptorManager<RequestConfig>;

/// Interceptors run on every response, successful or not.
pub type ResponseInterceptors = InterceptorManager<Response>;

struct Entry<T> {
    seq: u64,
    interceptor: Interceptor<T>,
}

/// An ordered chain of interceptors that can be added and ejected at any time.
///
/// Interceptors run in registration order. Cloning yields a handle to the same chain.
pub struct InterceptorManager<T> {
    entries: Rc<RefCell<SlotMap<InterceptorId, Entry<T>>>>,
    next_seq: Rc<Cell<u64>>,
}

impl<T> Clone for InterceptorManager<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            next_seq: self.next_seq.clone(),
        }
    }
}

impl<T> Default for InterceptorManager<T> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(SlotMap::with_key())),
            next_seq: Rc::new(Cell::new(0)),
        }
    }
}

impl<T: 'static> std::fmt::Debug for InterceptorManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorManager")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: 'static> InterceptorManager<T> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interceptor that only sees successful values. Failures skip it.
    pub fn add(&self, fulfilled: impl Fn(T) -> Result<T, FetchError> + 'static) -> InterceptorId {
        self.add_raw(move |outcome| outcome.and_then(&fulfilled))
    }

    /// Registers an interceptor with separate success and failure handlers.
    pub fn add_with_rejected(
        &self,
        fulfilled: impl Fn(T) -> Result<T, FetchError> + 'static,
        rejected: impl Fn(FetchError) -> Result<T, FetchError> + 'static,
    ) -> InterceptorId {
        self.add_raw(move |outcome| match outcome {
            Ok(value) => fulfilled(value),
            Err(error) => rejected(error),
        })
    }

    /// Registers an interceptor that receives the full outcome of the previous step.
    pub fn add_raw(
        &self,
        interceptor: impl Fn(Result<T, FetchError>) -> Result<T, FetchError> + 'static,
    ) -> InterceptorId {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        self.entries
            .try_borrow_mut()
            .expect("InterceptorManager::add borrow_mut")
            .insert(Entry {
                seq,
                interceptor: Rc::new(interceptor),
            })
    }

    /// Registers an interceptor that is ejected when the returned guard is dropped.
    pub fn add_guarded(
        &self,
        interceptor: impl Fn(Result<T, FetchError>) -> Result<T, FetchError> + 'static,
    ) -> InterceptorGuard<T> {
        let id = self.add_raw(interceptor);
        InterceptorGuard {
            manager: self.clone(),
            id,
        }
    }

    /// Removes an interceptor. Returns `false` if it was already removed.
    pub fn eject(&self, id: InterceptorId) -> bool {
        self.entries
            .try_borrow_mut()
            .expect("InterceptorManager::eject borrow_mut")
            .remove(id)
            .is_some()
    }

    /// Removes every interceptor.
    pub fn clear(&self) {
        self.entries
            .try_borrow_mut()
            .expect("InterceptorManager::clear borrow_mut")
            .clear();
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.entries
            .try_borrow()
            .expect("InterceptorManager::len borrow")
            .len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `outcome` through the chain.
    pub fn apply(&self, outcome: Result<T, FetchError>) -> Result<T, FetchError> {
        // Snapshot first so interceptors may add or eject while running.
        let chain = {
            let entries = self
                .entries
                .try_borrow()
                .expect("InterceptorManager::apply borrow");
            let mut chain = entries
                .values()
                .map(|entry| (entry.seq, entry.interceptor.clone()))
                .collect::<Vec<_>>();
            chain.sort_by_key(|(seq, _)| *seq);
            chain
        };

        chain
            .into_iter()
            .fold(outcome, |outcome, (_, interceptor)| interceptor(outcome))
    }
}

/// Ejects its interceptor when dropped.
#[must_use = "the interceptor is ejected as soon as the guard is dropped"]
pub struct InterceptorGuard<T: 'static> {
    manager: InterceptorManager<T>,
    id: InterceptorId,
}

impl<T: 'static> InterceptorGuard<T> {
    /// The id of the guarded interceptor.
    pub fn id(&self) -> InterceptorId {
        self.id
    }
}

impl<T: 'static> Drop for InterceptorGuard<T> {
    fn drop(&mut self) {
        self.manager.eject(self.id);
    }
}

impl<T: 'static> std::fmt::Debug for InterceptorGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InterceptorGuard").field(&self.id).finish()
    }
}
