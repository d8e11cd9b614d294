//! # Responses
//!
//! Handlers return a [`Reply`], a closed set of shapes. The
//! [`ResponseTranslator`] maps every shape to exactly one concrete
//! [`Response`]; values that fit no HTTP-specific shape fall back to their
//! text form, so nothing a handler returns is ever rejected.

use crate::error::{Error, Result};
use crate::json::to_json;
use crate::request::Request;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Text prefix that turns a plain string reply into a redirect
pub const REDIRECT_PREFIX: &str = "redirect:";

/// Map key that marks a JSON object reply as a template context
pub const TEMPLATE_KEY: &str = "__template__";

/// Context key under which the current principal is exposed to templates
pub const USER_KEY: &str = "__user__";

const HTML: &str = "text/html;charset=utf-8";
const JSON: &str = "application/json;charset=utf-8";
const PLAIN: &str = "text/plain;charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// HTTP response
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("body", &String::from_utf8_lossy(&self.body))
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: Bytes::new(),
            content_type: PLAIN.to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    fn with_body(body: impl Into<Bytes>, content_type: &str) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.to_string(),
            ..Self::default()
        }
    }

    /// Create a JSON response
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self::with_body(body.into(), JSON)
    }

    /// Create a plain text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_body(body.into(), PLAIN)
    }

    /// Create an HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self::with_body(body.into(), HTML)
    }

    /// Create a binary response
    #[must_use]
    pub fn bytes(body: impl Into<Bytes>, content_type: &str) -> Self {
        Self::with_body(body, content_type)
    }

    /// 302 Found pointing at `location`
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::text(String::new())
            .with_status(302)
            .with_header("Location", location)
    }

    /// Set status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert to hyper Response
    pub(crate) fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = hyper::Response::builder()
            .status(status)
            .header("Content-Type", &self.content_type);
        for (k, v) in &self.headers {
            if !k.eq_ignore_ascii_case("content-type") {
                builder = builder.header(k.as_str(), v.as_str());
            }
        }

        builder.body(Full::new(self.body)).unwrap_or_else(|_| {
            let mut fallback = hyper::Response::new(Full::new(Bytes::from("Internal Server Error")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

/// Handler outcome before HTTP-specific translation
#[derive(Debug)]
pub enum Reply {
    /// Fully built response, passed through unchanged
    Response(Response),
    /// Raw bytes, sent as `application/octet-stream`
    Bytes(Bytes),
    /// Text, sent as HTML unless it starts with `redirect:`
    Text(String),
    /// Redirect to a location
    Redirect(String),
    /// Template name plus its context
    Template {
        /// Template name
        name: String,
        /// Values exposed to the template
        context: Map<String, Value>,
    },
    /// Structured value, serialized as JSON
    Json(Value),
    /// Empty body with this status
    Status(u16),
    /// Status with a plain message body
    StatusWithMessage(u16, String),
}

impl Reply {
    /// Template reply; a non-object `context` is exposed under `value`
    pub fn template(name: impl Into<String>, context: Value) -> Self {
        let context = match context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::Template {
            name: name.into(),
            context,
        }
    }

    /// JSON reply from any serializable value
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(r) => write!(f, "<Response {}>", r.status),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::Text(s) => write!(f, "{s}"),
            Self::Redirect(to) => write!(f, "{REDIRECT_PREFIX}{to}"),
            Self::Template { name, .. } => write!(f, "<Template {name}>"),
            Self::Json(v) => write!(f, "{v}"),
            Self::Status(code) => write!(f, "{code}"),
            Self::StatusWithMessage(code, message) => write!(f, "({code}, {message})"),
        }
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<u16> for Reply {
    fn from(code: u16) -> Self {
        Self::Status(code)
    }
}

impl From<(u16, String)> for Reply {
    fn from((code, message): (u16, String)) -> Self {
        Self::StatusWithMessage(code, message)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}

/// External templating collaborator
pub trait TemplateRenderer: Send + Sync {
    /// Render `name` with `context` into HTML
    ///
    /// # Errors
    ///
    /// Returns `Error::Template` when the template is missing or fails.
    fn render(&self, name: &str, context: &Value) -> Result<String>;
}

/// Maps replies onto HTTP responses
#[derive(Clone, Default)]
pub struct ResponseTranslator {
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl ResponseTranslator {
    /// Translator without template support
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Translator that renders template replies with `renderer`
    #[must_use]
    pub fn with_renderer(renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }

    /// Translate one reply in the context of `req`
    ///
    /// # Errors
    ///
    /// `Error::Template` when a template reply cannot be rendered,
    /// `Error::Json` when a structured reply cannot be serialized.
    pub fn translate(&self, reply: Reply, req: &Request) -> Result<Response> {
        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Bytes(bytes) => Ok(Response::bytes(bytes, OCTET_STREAM)),
            Reply::Text(text) => Ok(match text.strip_prefix(REDIRECT_PREFIX) {
                Some(location) => Response::redirect(location),
                None => Response::html(text),
            }),
            Reply::Redirect(location) => Ok(Response::redirect(&location)),
            Reply::Template { name, context } => self.render(&name, context, req),
            Reply::Json(Value::Object(mut map)) => match map.remove(TEMPLATE_KEY) {
                Some(Value::String(name)) => self.render(&name, map, req),
                Some(other) => {
                    map.insert(TEMPLATE_KEY.to_string(), other);
                    Ok(Response::json(to_json(&map)?))
                }
                None => Ok(Response::json(to_json(&map)?)),
            },
            Reply::Json(value) => Ok(Response::json(to_json(&value)?)),
            Reply::Status(code) if is_valid_status(code) => {
                Ok(Response::text(String::new()).with_status(code))
            }
            Reply::StatusWithMessage(code, message) if is_valid_status(code) => {
                Ok(Response::text(message).with_status(code))
            }
            other @ (Reply::Status(_) | Reply::StatusWithMessage(..)) => {
                Ok(Response::text(other.to_string()))
            }
        }
    }

    fn render(&self, name: &str, mut context: Map<String, Value>, req: &Request) -> Result<Response> {
        let renderer = self.renderer.as_ref().ok_or_else(|| Error::Template {
            message: format!("no renderer configured for {name}"),
        })?;
        let user = match req.principal() {
            Some(principal) => serde_json::to_value(principal)?,
            None => Value::Null,
        };
        context.insert(USER_KEY.to_string(), user);
        let html = renderer.render(name, &Value::Object(context))?;
        Ok(Response::html(html))
    }
}

fn is_valid_status(code: u16) -> bool {
    (100..600).contains(&code)
}
