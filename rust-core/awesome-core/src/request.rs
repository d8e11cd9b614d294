//! # HTTP Request
//!
//! Request wrapper handed through the middleware chain and, when a handler
//! asks for it, into the handler itself.
//!
//! - Body is collected once, size limited, and kept as `Bytes`
//! - Query string is parsed at construction (first value wins per key)
//! - Path captures and the session principal are attached during dispatch

use crate::error::{Error, Result};
use crate::router::Method;
use crate::session::Principal;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use std::collections::HashMap;
use std::time::Instant;

/// Incoming HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Values captured by the matched path template
    pub path_params: HashMap<String, String>,
    /// Request headers
    headers: HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
    /// Identity resolved from the session cookie
    pub principal: Option<Principal>,
    /// When the request entered the server
    received_at: Instant,
}

impl Request {
    /// Create a request manually (for testing/internal use)
    ///
    /// `path` may carry a query string.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut headers = HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self::from_parts(method, path, query_string, headers, body)
    }

    fn from_parts(
        method: Method,
        path: String,
        query_string: Option<String>,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let query_params = parse_query_string(query_string.as_deref());
        Self {
            method,
            path,
            query_string,
            query_params,
            path_params: HashMap::new(),
            headers,
            body,
            principal: None,
            received_at: Instant::now(),
        }
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// `Error::MethodNotSupported` for methods other than GET/POST,
    /// `Error::PayloadTooLarge` when the body exceeds `max_body_size`,
    /// `Error::Io` when the body cannot be read.
    pub async fn from_hyper_with_limit<B>(
        req: hyper::Request<B>,
        max_body_size: usize,
    ) -> Result<Self>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let method = Method::try_from(req.method())?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);

        let headers = req.headers().clone();
        if let Some(content_len) = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
        {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let collected = req
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let bytes = collected.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }
        let body = (!bytes.is_empty()).then_some(bytes);

        Ok(Self::from_parts(method, path, query_string, headers, body))
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Raw `Content-Type` header, if any
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
    }

    /// Value of the cookie called `name`
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"').to_string())
    }

    /// Get query parameters as a HashMap
    #[must_use]
    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// The signed-in principal, if any
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// A principal with administrator rights is attached
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.principal.as_ref().is_some_and(|p| p.admin)
    }

    /// When the request entered the server
    #[must_use]
    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

/// Parse a query string into a map, keeping the first value of repeated keys
///
/// Blank values are kept. Undecodable input yields an empty map.
pub(crate) fn parse_pairs(raw: &[u8]) -> HashMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(raw).unwrap_or_default();
    let mut map = HashMap::with_capacity(pairs.len());
    for (k, v) in pairs {
        map.entry(k).or_insert(v);
    }
    map
}

fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query.map(|q| parse_pairs(q.as_bytes())).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_headers(pairs: &[(&str, &str)]) -> Request {
        let headers = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Request::new(Method::Get, "/", headers, None)
    }

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_query_string(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&"1".to_string()));
        assert_eq!(result.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        let result = parse_query_string(None);
        assert!(result.is_empty());
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_query_string(Some("name=John+Doe&city=New%20York"));
        assert_eq!(result.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
    }

    #[test]
    fn test_parse_query_string_first_value_wins() {
        let result = parse_query_string(Some("page=2&page=9&blank="));
        assert_eq!(result.get("page"), Some(&"2".to_string()));
        assert_eq!(result.get("blank"), Some(&String::new()));
    }

    #[test]
    fn test_new_splits_query() {
        let req = Request::new(Method::Get, "/api/blogs?page=3", HashMap::new(), None);
        assert_eq!(req.path, "/api/blogs");
        assert_eq!(req.query_string(), Some("page=3"));
        assert_eq!(req.query_map().get("page"), Some(&"3".to_string()));
    }

    #[test]
    fn test_cookie_lookup() {
        let req = with_headers(&[("cookie", "theme=dark; awesession=abc-123-ff")]);
        assert_eq!(req.cookie("awesession"), Some("abc-123-ff".to_string()));
        assert_eq!(req.cookie("theme"), Some("dark".to_string()));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn test_content_type() {
        let req = with_headers(&[("content-type", "application/json")]);
        assert_eq!(req.content_type(), Some("application/json"));
        assert_eq!(with_headers(&[]).content_type(), None);
    }

    #[test]
    fn test_no_principal_is_not_admin() {
        let req = with_headers(&[]);
        assert!(req.principal().is_none());
        assert!(!req.is_admin());
    }

    #[tokio::test]
    async fn test_from_hyper_rejects_large_body() {
        let req = hyper::Request::builder()
            .method("POST")
            .uri("/api/blogs")
            .body(http_body_util::Full::new(Bytes::from(vec![b'x'; 64])))
            .unwrap();
        let err = Request::from_hyper_with_limit(req, 16).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit: 16, actual: 64 }));
    }

    #[tokio::test]
    async fn test_from_hyper_rejects_unsupported_method() {
        let req = hyper::Request::builder()
            .method("DELETE")
            .uri("/api/blogs/1")
            .body(http_body_util::Full::new(Bytes::new()))
            .unwrap();
        let err = Request::from_hyper_with_limit(req, 1024).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotSupported { .. }));
    }
}
