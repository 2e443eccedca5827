use std::rc::Rc;

use leptos::*;

use crate::{FetchOptions, ReqwestTransport, Transport};

/// Provides a Fetch Client to the current scope.
pub fn provide_fetch_client() {
    provide_fetch_client_with_options(FetchOptions::new());
}

/// Provides a Fetch Client to the current scope with custom default options.
pub fn provide_fetch_client_with_options(options: FetchOptions) {
    provide_context(FetchClient::new(
        Rc::new(ReqwestTransport::default()),
        options,
    ));
}

/// Provides a Fetch Client to the current scope with a custom transport and default options.
pub fn provide_fetch_client_with_transport(
    transport: impl Transport + 'static,
    options: FetchOptions,
) {
    provide_context(FetchClient::new(Rc::new(transport), options));
}

/// Retrieves the Fetch Client from the current scope.
///
/// Falls back to a client backed by [`ReqwestTransport`] with built-in defaults.
pub fn use_fetch_client() -> FetchClient {
    use_context::<FetchClient>().unwrap_or_default()
}

/// Shared configuration for every fetch in a scope: the transport used to reach
/// the network and the default [`FetchOptions`].
///
/// The transport is shared, interceptor chains are not. Every controller created from
/// a client gets its own [`TransportHandle`](crate::TransportHandle).
#[derive(Clone)]
pub struct FetchClient {
    pub(crate) transport: Rc<dyn Transport>,
    pub(crate) default_options: FetchOptions,
}

impl FetchClient {
    /// Creates a new Fetch Client.
    pub fn new(transport: Rc<dyn Transport>, default_options: FetchOptions) -> Self {
        Self {
            transport,
            default_options,
        }
    }

    /// The transport shared by every controller created from this client.
    pub fn transport(&self) -> Rc<dyn Transport> {
        self.transport.clone()
    }

    /// Default options used by [`FetchOptions::default()`].
    pub fn default_options(&self) -> FetchOptions {
        self.default_options
    }
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new(Rc::new(ReqwestTransport::default()), FetchOptions::new())
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("transport", &"...")
            .field("default_options", &self.default_options)
            .finish()
    }
}
