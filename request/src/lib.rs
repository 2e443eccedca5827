#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # About Request
//!
//! Leptos Request manages the lifecycle of HTTP requests for [Leptos](https://github.com/leptos-rs/leptos).
//!
//! A fetch provides:
//! - response, error and loading state
//! - latest-wins ordering: issuing a request aborts the previous one
//! - delayed loading indicators
//! - cancellation, including on scope cleanup
//! - request and response interceptors
//! - response validation and mocking through schemas
//!
//! ## The main entry points are:
//! - [`use_fetch`](crate::use_fetch()) - Binds a fetch to the current reactive scope.
//! - [`use_validated_fetch`](crate::use_validated_fetch()) - Same, validating every response against a [`Schema`].
//! - [`FetchController`] - The framework independent controller behind both.
//!
//! # A Simple Example
//!
//! In the root of your App, provide a fetch client with [provide_fetch_client] or [provide_fetch_client_with_options] if you want to override the default options.
//!
//! ```rust
//! use leptos::*;
//! use leptos_request::*;
//!
//! #[component]
//! pub fn App() -> impl IntoView {
//!     // Provides Fetch Client for entire app.
//!     provide_fetch_client();
//!
//!     // Rest of App...
//! }
//! ```
//!
//! Then fetch from any component.
//!
//! ```rust
//! use leptos::*;
//! use leptos_request::*;
//!
//! #[component]
//! fn Search() -> impl IntoView {
//!     let result = use_fetch(
//!         RequestConfig::get("https://example.com/search"),
//!         FetchOptions::default(),
//!     );
//!
//!     let search = {
//!         let result = result.clone();
//!         move |query: String| {
//!             // Aborts the previous search, if still in flight.
//!             result.fetch(Some(RequestConfig::new().with_param("q", query)))
//!         }
//!     };
//!
//!     view! {
//!         <input on:input=move |ev| search(event_target_value(&ev))/>
//!         <p>{move || result.response.get().map(|r| r.data.to_string())}</p>
//!     }
//! }
//! ```
//!

mod cancellation;
mod error;
mod executor;
mod fetch_client;
mod fetch_controller;
mod fetch_options;
mod fetch_state;
/// Ordered, removable chains applied to requests and responses.
pub mod interceptor;
mod latest;
mod request_config;
mod response;
mod transport;
mod use_fetch;
mod validation;

pub use cancellation::*;
pub use error::*;
pub use fetch_client::*;
pub use fetch_controller::*;
pub use fetch_options::*;
pub use fetch_state::FetchState;
pub use interceptor::{InterceptorId, RequestInterceptors, ResponseInterceptors};
pub use latest::*;
pub use request_config::*;
pub use response::*;
pub use transport::{ReqwestTransport, Transport, TransportHandle};
pub use use_fetch::*;
pub use validation::*;

pub use reqwest::{header::HeaderMap, Method, StatusCode};
