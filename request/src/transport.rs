use std::rc::Rc;

use async_trait::async_trait;

use crate::{
    Body, FetchError, RequestConfig, RequestInterceptors, Response, ResponseInterceptors,
    TransportError,
};

/// Sends a fully merged request over the wire.
///
/// Implementations must stop work when the returned future is dropped; that is how
/// in-flight requests are aborted. Status codes are not interpreted here,
/// [`TransportHandle`] rejects non-success responses.
#[async_trait(?Send)]
pub trait Transport {
    /// Send the request and return the raw response.
    async fn send(&self, request: RequestConfig) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestConfig) -> Result<Response, TransportError> {
        let url = request.full_url()?;
        let mut builder = self.client.request(request.method(), url);

        if let Some(headers) = request.headers.as_ref() {
            for (name, value) in headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Form(form)) => builder.form(&form),
            Some(Body::Text(text)) => builder.body(text),
            Some(Body::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        Ok(Response {
            status,
            headers,
            data: Response::decode_body(&bytes),
        })
    }
}

/// A transport together with its request and response interceptor chains.
///
/// Each [`FetchController`](crate::FetchController) owns its own handle, so interceptors
/// registered on one controller never affect another.
#[derive(Clone)]
pub struct TransportHandle {
    transport: Rc<dyn Transport>,
    request_interceptors: RequestInterceptors,
    response_interceptors: ResponseInterceptors,
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("transport", &"...")
            .field("request_interceptors", &self.request_interceptors)
            .field("response_interceptors", &self.response_interceptors)
            .finish()
    }
}

impl TransportHandle {
    /// Creates a handle with empty interceptor chains.
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            transport,
            request_interceptors: RequestInterceptors::new(),
            response_interceptors: ResponseInterceptors::new(),
        }
    }

    /// Interceptors applied to the merged config before it is sent.
    pub fn request_interceptors(&self) -> &RequestInterceptors {
        &self.request_interceptors
    }

    /// Interceptors applied to the outcome before it reaches the caller.
    pub fn response_interceptors(&self) -> &ResponseInterceptors {
        &self.response_interceptors
    }

    /// Runs the request chain, sends, rejects non-success statuses, then runs the response chain.
    pub async fn request(&self, config: RequestConfig) -> Result<Response, FetchError> {
        let config = self.request_interceptors.apply(Ok(config))?;

        let outcome = match self.transport.send(config).await {
            Ok(response) if response.status.is_success() => Ok(response),
            Ok(response) => Err(TransportError::status(response).into()),
            Err(error) => Err(error.into()),
        };

        self.response_interceptors.apply(outcome)
    }
}


#[cfg(test)]
mod tests {
    use super::{mock::MockTransport, *};
    use crate::TransportErrorKind;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn non_success_status_is_transport_error() {
        let transport = MockTransport::new(|_| {
            (
                Duration::ZERO,
                Ok(Response::new(StatusCode::NOT_FOUND, json!({"error": "missing"}))),
            )
        });
        let handle = TransportHandle::new(transport);

        let error = handle
            .request(RequestConfig::get("http://localhost/missing"))
            .await
            .unwrap_err();

        match error {
            FetchError::Transport(error) => {
                assert_eq!(error.kind, TransportErrorKind::Status);
                assert_eq!(error.status, Some(StatusCode::NOT_FOUND));
                assert_eq!(
                    error.response.map(|r| r.data),
                    Some(json!({"error": "missing"}))
                );
            }
            other => panic!("Expected transport error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn request_interceptors_rewrite_config() {
        let transport = MockTransport::ok_after(Duration::ZERO, json!(null));
        let handle = TransportHandle::new(transport.clone());
        handle
            .request_interceptors()
            .add(|config| Ok(config.with_header("authorization", "Bearer token")));

        handle
            .request(RequestConfig::get("http://localhost/me"))
            .await
            .expect("request");

        let sent = transport.requests();
        assert_eq!(
            sent[0]
                .headers
                .as_ref()
                .and_then(|h| h.get("authorization"))
                .map(String::as_str),
            Some("Bearer token")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn request_interceptor_failure_skips_transport() {
        let transport = MockTransport::ok_after(Duration::ZERO, json!(null));
        let handle = TransportHandle::new(transport.clone());
        handle
            .request_interceptors()
            .add(|_| Err(FetchError::unknown("not signed in")));

        let error = handle
            .request(RequestConfig::get("http://localhost/me"))
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::Unknown(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn response_interceptors_see_transport_failures() {
        let transport = MockTransport::new(|_| {
            (
                Duration::ZERO,
                Err(TransportError::from(TransportErrorKind::Network)),
            )
        });
        let handle = TransportHandle::new(transport);
        handle
            .response_interceptors()
            .add_with_rejected(Ok, |_| Ok(Response::mocked(json!("recovered"))));

        let response = handle
            .request(RequestConfig::get("http://localhost/"))
            .await
            .expect("recovered");

        assert_eq!(response.data, json!("recovered"));
    }
}
