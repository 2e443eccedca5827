use std::{cell::Cell, future::Future, rc::Rc};

use leptos::*;

use crate::{
    fetch_controller::ListenerKey, use_fetch_client, FetchController, FetchError, FetchOptions,
    FetchState, RequestConfig, RequestInterceptors, Response, ResponseInterceptors, SchemaRef,
    ValidatedFetchController,
};

/// Binds a [`FetchController`] to the current reactive scope.
///
/// The controller uses the transport of the [`FetchClient`](crate::FetchClient) in
/// context. Changes to `config` and `options` apply to requests issued afterwards;
/// they never trigger a request by themselves. With `manual == false`, one request is
/// issued when the hook is created. The in-flight request is aborted when the scope
/// is cleaned up.
///
/// Example
/// ```
/// use leptos::*;
/// use leptos_request::*;
///
/// #[component]
/// fn Todos() -> impl IntoView {
///     let FetchResult { response, loading, .. } = use_fetch(
///         RequestConfig::get("https://example.com/todos"),
///         FetchOptions::new().set_manual(false),
///     );
///
///     view! {
///         <Show when=move || !loading.get() fallback=|| view! { <p>"Loading..."</p> }>
///             <pre>{move || response.get().map(|r| r.data.to_string())}</pre>
///         </Show>
///     }
/// }
/// ```
pub fn use_fetch(
    config: impl Into<MaybeSignal<RequestConfig>>,
    options: impl Into<MaybeSignal<FetchOptions>>,
) -> FetchResult {
    let config = config.into();
    let options = options.into();

    let controller = FetchController::from_client(
        &use_fetch_client(),
        config.get_untracked(),
        options.get_untracked(),
    );

    bind(Binding::Plain(controller), config, options)
}

/// Like [`use_fetch`], with every successful response validated against `schema`.
///
/// Validation failures surface as [`FetchError::Validation`]. With `options.mock`,
/// responses are replaced by values the schema generates. A new `schema` or a change
/// of the mock flag takes effect on the next request.
pub fn use_validated_fetch(
    config: impl Into<MaybeSignal<RequestConfig>>,
    options: impl Into<MaybeSignal<FetchOptions>>,
    schema: impl Into<MaybeSignal<Option<SchemaRef>>>,
) -> FetchResult {
    let config = config.into();
    let options = options.into();
    let schema = schema.into();

    let controller = FetchController::from_client(
        &use_fetch_client(),
        config.get_untracked(),
        options.get_untracked(),
    );
    let validated = ValidatedFetchController::new(controller, schema.get_untracked());

    create_isomorphic_effect({
        let validated = validated.clone();
        move |prev: Option<()>| {
            let schema = schema.get();
            // Registered on construction.
            if prev.is_some() {
                validated.set_schema(schema);
            }
        }
    });

    bind(Binding::Validated(validated), config, options)
}

/// Reactive view of a fetch bound to a scope, returned by [`use_fetch`].
#[derive(Clone)]
pub struct FetchResult {
    /// The last successful response.
    pub response: Signal<Option<Response>>,
    /// The last failure.
    pub error: Signal<Option<FetchError>>,
    /// Whether a request is in flight and its loading delay has elapsed.
    pub loading: Signal<bool>,
    controller: FetchController,
}

impl FetchResult {
    /// Issues a request, see [`FetchController::fetch`].
    pub fn fetch(&self, config: Option<RequestConfig>) {
        self.controller.fetch(config)
    }

    /// Issues a request and returns its outcome, see [`FetchController::fetch_async`].
    pub fn fetch_async(
        &self,
        config: Option<RequestConfig>,
    ) -> impl Future<Output = Result<Response, FetchError>> + 'static {
        self.controller.fetch_async(config)
    }

    /// Aborts the in-flight request, see [`FetchController::cancel`].
    pub fn cancel(&self) {
        self.controller.cancel()
    }

    /// Interceptors applied to every outgoing request.
    pub fn request_interceptors(&self) -> &RequestInterceptors {
        self.controller.request_interceptors()
    }

    /// Interceptors applied to every response.
    pub fn response_interceptors(&self) -> &ResponseInterceptors {
        self.controller.response_interceptors()
    }

    /// The underlying controller.
    pub fn controller(&self) -> &FetchController {
        &self.controller
    }
}

impl std::fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResult")
            .field("loading", &self.loading.get_untracked())
            .field("controller", &self.controller)
            .finish()
    }
}

#[derive(Clone)]
enum Binding {
    Plain(FetchController),
    Validated(ValidatedFetchController),
}

impl Binding {
    fn controller(&self) -> &FetchController {
        match self {
            Binding::Plain(controller) => controller,
            Binding::Validated(validated) => validated.controller(),
        }
    }

    fn activate(&self) {
        match self {
            Binding::Plain(controller) => controller.activate(),
            Binding::Validated(validated) => validated.activate(),
        }
    }

    fn deactivate(&self) {
        match self {
            Binding::Plain(controller) => controller.deactivate(),
            Binding::Validated(validated) => validated.deactivate(),
        }
    }
}

fn bind(
    binding: Binding,
    config: MaybeSignal<RequestConfig>,
    options: MaybeSignal<FetchOptions>,
) -> FetchResult {
    let controller = binding.controller().clone();
    let state_signal = RwSignal::new(controller.state());
    let listener = Rc::new(Cell::new(None::<ListenerKey>));

    listener.set(Some(controller.subscribe(move |state: &FetchState| {
        state_signal.set(state.clone());
    })));

    // Keep snapshots current without re-creating the controller.
    create_isomorphic_effect({
        let controller = controller.clone();
        move |_| controller.set_config(config.get())
    });
    create_isomorphic_effect({
        let controller = controller.clone();
        move |_| controller.set_options(options.get())
    });

    binding.activate();

    on_cleanup({
        let controller = controller.clone();
        move || {
            if let Some(listener_id) = listener.take() {
                if !controller.unsubscribe(listener_id) {
                    logging::debug_warn!("Failed to remove listener.");
                }
            }
            binding.deactivate();
        }
    });

    FetchResult {
        response: Signal::derive(move || state_signal.with(|state| state.response.clone())),
        error: Signal::derive(move || state_signal.with(|state| state.error.clone())),
        loading: Signal::derive(move || state_signal.with(|state| state.loading)),
        controller,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{transport::mock::MockTransport, FetchClient, SerdeSchema};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::time::Duration;
    use tokio::{task::LocalSet, time::sleep};

    fn provide_mock(transport: Rc<MockTransport>) {
        provide_context(FetchClient::new(transport, FetchOptions::new()));
    }

    fn echo(value: &str, delay_ms: u64) -> Option<RequestConfig> {
        Some(
            RequestConfig::new()
                .with_param("value", value)
                .with_param("delay_ms", delay_ms),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn signals_follow_controller_state() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                provide_mock(MockTransport::echo());

                let result = use_fetch(
                    RequestConfig::get("http://localhost/items"),
                    FetchOptions::new(),
                );
                assert!(!result.loading.get_untracked());
                assert!(result.response.get_untracked().is_none());

                let request = result.fetch_async(echo("a", 20));
                assert!(result.loading.get_untracked(), "Loading should be set on issue");

                let response = request.await.expect("response");
                assert_eq!(response.data, json!("a"));
                assert!(!result.loading.get_untracked());
                assert_eq!(
                    result.response.get_untracked().map(|r| r.data),
                    Some(json!("a"))
                );
                assert!(result.error.get_untracked().is_none());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn auto_fetch_on_creation() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                let transport = MockTransport::ok_after(Duration::from_millis(10), json!(7));
                provide_mock(transport.clone());

                let result = use_fetch(
                    RequestConfig::get("http://localhost/items"),
                    FetchOptions::new().set_manual(false),
                );

                sleep(Duration::from_millis(50)).await;

                assert_eq!(transport.requests().len(), 1);
                assert_eq!(
                    result.response.get_untracked().map(|r| r.data),
                    Some(json!(7))
                );
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn config_signal_applies_to_next_request() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                let transport = MockTransport::ok_after(Duration::ZERO, json!(null));
                provide_mock(transport.clone());

                let config = RwSignal::new(RequestConfig::get("http://localhost/first"));
                let result = use_fetch(config, FetchOptions::new());

                config.set(RequestConfig::get("http://localhost/second"));
                assert!(
                    transport.requests().is_empty(),
                    "Changing the config should not issue a request"
                );

                result.fetch_async(None).await.expect("response");

                let requests = transport.requests();
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].url.as_deref(), Some("http://localhost/second"));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_clears_loading_and_keeps_response() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                provide_mock(MockTransport::echo());

                let result = use_fetch(
                    RequestConfig::get("http://localhost/items"),
                    FetchOptions::new(),
                );
                result.fetch_async(echo("kept", 0)).await.expect("response");

                let request = result.fetch_async(echo("dropped", 100));
                result.cancel();

                assert!(request.await.unwrap_err().is_cancel());
                assert!(!result.loading.get_untracked());
                assert_eq!(
                    result.response.get_untracked().map(|r| r.data),
                    Some(json!("kept"))
                );
            })
            .await;
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Todo {
        id: u32,
        title: String,
    }

    #[tokio::test(start_paused = true)]
    async fn validated_fetch_reports_schema_errors() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                provide_mock(MockTransport::ok_after(Duration::ZERO, json!({"id": "x"})));

                let schema: SchemaRef = Rc::new(SerdeSchema::<Todo>::new());
                let result = use_validated_fetch(
                    RequestConfig::get("http://localhost/todo"),
                    FetchOptions::new(),
                    Some(schema),
                );

                let error = result.fetch_async(None).await.unwrap_err();

                assert!(error.is_validation_error());
                assert!(result
                    .error
                    .get_untracked()
                    .is_some_and(|error| error.is_validation_error()));
                assert!(result.response.get_untracked().is_none());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn schema_signal_swaps_validation() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                provide_mock(MockTransport::ok_after(
                    Duration::ZERO,
                    json!({"id": 1, "title": "write tests"}),
                ));

                let schema = RwSignal::new(None::<SchemaRef>);
                let result = use_validated_fetch(
                    RequestConfig::get("http://localhost/todo"),
                    FetchOptions::new().set_mock(true),
                    schema,
                );
                assert!(result.response_interceptors().is_empty());

                schema.set(Some(Rc::new(SerdeSchema::<Todo>::new().with_mock(|| Todo {
                    id: 0,
                    title: "mocked".to_string(),
                }))));
                assert_eq!(result.response_interceptors().len(), 1);

                let response = result.fetch_async(None).await.expect("response");
                assert_eq!(response.data, json!({"id": 0, "title": "mocked"}));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn mock_flag_follows_options_signal_and_controller() {
        LocalSet::new()
            .run_until(async {
                let _ = create_runtime();
                provide_mock(MockTransport::new(|_| {
                    (
                        Duration::from_millis(10),
                        Err(crate::TransportError::from(
                            crate::TransportErrorKind::Network,
                        )),
                    )
                }));

                let options = RwSignal::new(FetchOptions::new());
                let schema: SchemaRef = Rc::new(SerdeSchema::<Todo>::new().with_mock(|| Todo {
                    id: 0,
                    title: "mocked".to_string(),
                }));
                let result = use_validated_fetch(
                    RequestConfig::get("http://localhost/todo"),
                    options,
                    Some(schema),
                );

                assert!(result.fetch_async(None).await.unwrap_err().is_transport_error());

                options.set(FetchOptions::new().set_mock(true));
                let response = result.fetch_async(None).await.expect("mocked");
                assert_eq!(response.data, json!({"id": 0, "title": "mocked"}));

                result.controller().set_options(FetchOptions::new());
                assert!(result.fetch_async(None).await.unwrap_err().is_transport_error());
                assert_eq!(result.response_interceptors().len(), 1);
            })
            .await;
    }
}
