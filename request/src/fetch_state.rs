use crate::{FetchError, Response};

/// The observable state of a [`FetchController`](crate::FetchController).
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    /// The last successful response. Cleared when a request fails.
    pub response: Option<Response>,
    /// The last failure. Cleared when a request succeeds.
    pub error: Option<FetchError>,
    /// Whether a request is in flight and its loading delay has elapsed.
    pub loading: bool,
}

/// Events that move a [`FetchState`].
#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Start,
    Cancel,
    Resolve(Response),
    Reject(FetchError),
}

impl FetchState {
    pub(crate) fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Start => {
                self.loading = true;
            }
            Transition::Cancel => {
                self.loading = false;
            }
            Transition::Resolve(response) => {
                *self = FetchState {
                    response: Some(response),
                    error: None,
                    loading: false,
                };
            }
            Transition::Reject(error) => {
                *self = FetchState {
                    response: None,
                    error: Some(error),
                    loading: false,
                };
            }
        }
    }
}
