use reqwest::{header::HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A completed HTTP response.
///
/// The body is kept as a JSON [`Value`] so interceptors can inspect and rewrite it.
/// Bodies that are not JSON are stored as [`Value::String`], empty bodies as [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded body.
    pub data: Value,
}

impl Response {
    /// Creates a response with no headers.
    pub fn new(status: StatusCode, data: Value) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            data,
        }
    }

    /// A synthetic `200 OK` response, used in mock mode.
    pub fn mocked(data: Value) -> Self {
        Self::new(StatusCode::OK, data)
    }

    /// Decodes a raw body.
    pub fn decode_body(bytes: &[u8]) -> Value {
        if bytes.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_body_variants() {
        assert_eq!(Response::decode_body(b""), Value::Null);
        assert_eq!(Response::decode_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(
            Response::decode_body(b"plain text"),
            Value::String("plain text".into())
        );
    }

    #[test]
    fn typed_body() {
        let response = Response::mocked(json!([1, 2, 3]));
        let numbers: Vec<u32> = response.json().expect("numbers");
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(response.status, StatusCode::OK);
    }
}
