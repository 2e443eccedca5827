use std::collections::BTreeMap;

use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;

use crate::{TransportError, TransportErrorKind};

/// Request body.
///
/// Only key/value bodies take part in merging: two [`Body::Json`] objects or two
/// [`Body::Form`] maps are merged key by key. [`Body::Text`], [`Body::Bytes`] and JSON
/// values that are not objects always replace the base body wholesale.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as `application/json`.
    Json(Value),
    /// Serialized as `application/x-www-form-urlencoded`.
    Form(BTreeMap<String, String>),
    /// Sent as is.
    Text(String),
    /// Binary payload, sent as is.
    Bytes(Vec<u8>),
}

impl Body {
    /// Serializes `value` into a [`Body::Json`].
    pub fn json(value: impl Serialize) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Body::Json)
    }

    fn is_absent(&self) -> bool {
        matches!(self, Body::Json(Value::Null))
    }

    fn merge(base: Option<&Body>, overrides: Option<&Body>) -> Option<Body> {
        let overrides = match overrides {
            Some(body) if !body.is_absent() => body,
            _ => return base.cloned(),
        };

        match (base, overrides) {
            (Some(Body::Json(Value::Object(base))), Body::Json(Value::Object(overrides))) => {
                let mut merged = base.clone();
                merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(Body::Json(Value::Object(merged)))
            }
            (Some(Body::Form(base)), Body::Form(overrides)) => {
                let mut merged = base.clone();
                merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
                Some(Body::Form(merged))
            }
            (_, overrides) => Some(overrides.clone()),
        }
    }
}

/// The shape of a request.
///
/// Every field is optional so that a config can act both as the base config of a
/// controller and as a per-call override. See [`RequestConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    /// HTTP method. `GET` when unset.
    pub method: Option<Method>,
    /// Prefix for relative urls.
    pub base_url: Option<String>,
    /// Absolute url, or a path relative to `base_url`.
    pub url: Option<String>,
    /// Request headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Query string parameters.
    pub params: BTreeMap<String, String>,
    /// Request body.
    pub body: Option<Body>,
}

impl RequestConfig {
    /// An empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// A `GET` to `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new().with_method(Method::GET).with_url(url)
    }

    /// A `POST` to `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new().with_method(Method::POST).with_url(url)
    }

    /// A `PUT` to `url`.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new().with_method(Method::PUT).with_url(url)
    }

    /// A `PATCH` to `url`.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new().with_method(Method::PATCH).with_url(url)
    }

    /// A `DELETE` to `url`.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new().with_method(Method::DELETE).with_url(url)
    }

    /// Set the method.
    pub fn with_method(self, method: Method) -> Self {
        RequestConfig {
            method: Some(method),
            ..self
        }
    }

    /// Set the url.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        RequestConfig {
            url: Some(url.into()),
            ..self
        }
    }

    /// Set the base url.
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        RequestConfig {
            base_url: Some(base_url.into()),
            ..self
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Add a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Set a JSON body.
    pub fn with_json(self, value: Value) -> Self {
        self.with_body(Body::Json(value))
    }

    /// Set the body.
    pub fn with_body(self, body: Body) -> Self {
        RequestConfig {
            body: Some(body),
            ..self
        }
    }

    /// The method to use, defaulting to `GET`.
    pub fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// Lays `overrides` on top of `self`.
    ///
    /// - Fields set in `overrides` replace the base fields, `headers` as a whole.
    /// - `params` are merged, `overrides` winning on collisions.
    /// - `body` follows the rules documented on [`Body`]. A missing or `null` override
    ///   body keeps the base body.
    pub fn merge(&self, overrides: Option<&RequestConfig>) -> RequestConfig {
        let Some(overrides) = overrides else {
            return self.clone();
        };

        let mut params = self.params.clone();
        params.extend(
            overrides
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        RequestConfig {
            method: overrides.method.clone().or_else(|| self.method.clone()),
            base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
            url: overrides.url.clone().or_else(|| self.url.clone()),
            headers: overrides.headers.clone().or_else(|| self.headers.clone()),
            params,
            body: Body::merge(self.body.as_ref(), overrides.body.as_ref()),
        }
    }

    /// Resolves `url` against `base_url` and appends `params`.
    pub fn full_url(&self) -> Result<Url, TransportError> {
        let url = self.url.as_deref().unwrap_or_default();

        let mut resolved = match Url::parse(url) {
            Ok(url) => url,
            Err(_) => {
                let base = self.base_url.as_deref().ok_or_else(|| {
                    TransportError::new(
                        TransportErrorKind::Request,
                        format!("Relative url {url:?} without a base url"),
                    )
                })?;
                let base = Url::parse(base).map_err(|e| {
                    TransportError::new(TransportErrorKind::Request, format!("Invalid base url: {e}"))
                })?;
                base.join(url).map_err(|e| {
                    TransportError::new(TransportErrorKind::Request, format!("Invalid url: {e}"))
                })?
            }
        };

        if !self.params.is_empty() {
            resolved.query_pairs_mut().extend_pairs(self.params.iter());
        }

        Ok(resolved)
    }
}
