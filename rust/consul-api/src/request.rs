use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ApiError;

/// Header carrying the ACL token
pub const TOKEN_HEADER: &str = "X-Consul-Token";

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl Method {
    /// The method as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-agnostic API request.
///
/// `path` is relative to the agent root (e.g., `v1/kv/service/config`) and is
/// not percent-encoded; transports encode each segment. Parameters with a
/// `None` value are presence-only flags such as `recurse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Path relative to the agent root
    pub path: String,
    /// Query parameters, in insertion order
    pub params: Vec<(String, Option<String>)>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
    /// Optional request body
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Create a request without parameters, headers or body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Shorthand for a PUT request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Shorthand for a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Shorthand for a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Set a query parameter, replacing any previous value for `name`
    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_param(name, Some(value.to_string()));
        self
    }

    /// Set a presence-only query parameter
    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.set_param(name, None);
        self
    }

    /// Set a raw request body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON request body
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| ApiError::InvalidArgument(format!("body is not serializable: {e}")))?;
        self.body = Some(body);
        self.headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        Ok(self)
    }

    /// Set a header, replacing any previous value (names compare case-insensitively)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set or replace a query parameter in place
    pub fn set_param(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((name, value)),
        }
    }

    /// Whether a query parameter is present (flag or valued)
    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|(existing, _)| existing == name)
    }

    /// The value of a query parameter; flags yield `Some("")`
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }

    /// Whether a header is present (case-insensitive)
    pub fn has_header(&self, name: &str) -> bool {
        self.headers
            .iter()
            .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

/// A raw response as returned by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers keyed by lower-cased name
    pub headers: HashMap<String, String>,
    /// Raw response body
    pub body: Vec<u8>,
    /// Time spent performing the request
    pub elapsed: Duration,
}

impl Response {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Add a header (stored lower-cased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The body decoded lossily as UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Succeed only for HTTP 200, otherwise fail with
    /// [ApiError::RequestFailed] carrying the status and body
    pub fn require_ok(self) -> Result<Self, ApiError> {
        if self.status == 200 {
            Ok(self)
        } else {
            Err(self.into_failure())
        }
    }

    /// Turn this response into a [ApiError::RequestFailed]
    pub fn into_failure(self) -> ApiError {
        tracing::warn!(status = self.status, "unexpected response status");
        ApiError::RequestFailed {
            status: self.status,
            body: self.text(),
        }
    }
}
