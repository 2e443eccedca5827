use std::time::Duration;

/// Options for a [`FetchController`](crate::FetchController) or [`use_fetch()`](crate::use_fetch()).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// When `false`, a request is issued automatically once the controller is activated.
    /// Default is `true`.
    pub manual: bool,
    /// How long a request must be in flight before `loading` becomes `true`.
    /// Avoids flicker on fast responses. Default is zero.
    pub loading_delay: Duration,
    /// Replace validated bodies (and transport failures) with values generated by the schema.
    /// Only has an effect on validated fetches. Default is `false`.
    pub mock: bool,
}

impl FetchOptions {
    /// The built-in defaults, ignoring any [`FetchClient`](crate::FetchClient) in context.
    pub const fn new() -> Self {
        Self {
            manual: true,
            loading_delay: Duration::ZERO,
            mock: false,
        }
    }

    /// Set manual.
    pub fn set_manual(self, manual: bool) -> Self {
        FetchOptions { manual, ..self }
    }

    /// Set the loading delay.
    pub fn set_loading_delay(self, loading_delay: Duration) -> Self {
        FetchOptions {
            loading_delay,
            ..self
        }
    }

    /// Set mock mode.
    pub fn set_mock(self, mock: bool) -> Self {
        FetchOptions { mock, ..self }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        // Use client wide defaults if they exist.
        leptos::use_context::<crate::FetchClient>()
            .map(|client| client.default_options)
            .unwrap_or(FetchOptions::new())
    }
}
