//! # Request Handler Adapter
//!
//! Binds the inputs of one request onto a handler according to its
//! [`ParameterContract`], invokes it, and folds domain errors into the
//! structured JSON shape.
//!
//! Binding order:
//!
//! 1. POST body (JSON object, url-encoded form or multipart text parts) or GET
//!    query string, only when the contract takes any keyword input
//! 2. filter to declared keywords unless arbitrary keywords are accepted
//! 3. path captures, overriding body/query values with a warning
//! 4. request handle, when declared
//! 5. required keyword check

use crate::contract::{ParameterContract, REQUEST_PARAM};
use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::request::{parse_pairs, Request};
use crate::response::Reply;
use crate::route::RouteEntry;
use crate::router::Method;
use crate::session::Principal;
use hyper::body::Bytes;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Arguments bound for a single handler call
///
/// Built per request, moved into the handler and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct BoundArguments {
    values: Map<String, Value>,
    request: Option<Arc<Request>>,
}

impl BoundArguments {
    /// Empty argument set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for calling handlers directly
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind `value` under `name`, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Attach the request handle
    #[must_use]
    pub fn with_request(mut self, request: Arc<Request>) -> Self {
        self.request = Some(request);
        self
    }

    /// Raw bound value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Bound value as a string slice, only for string values
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Bound value as text; scalars are stringified, `null` is absent
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Same as [`Self::text`] but a missing value is a bad request
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` with `Missing argument: <name>`.
    pub fn required_text(&self, name: &str) -> Result<String> {
        self.text(name)
            .ok_or_else(|| Error::bad_request(format!("Missing argument: {name}")))
    }

    /// The request handle, when the contract asked for it
    #[must_use]
    pub fn request(&self) -> Option<&Arc<Request>> {
        self.request.as_ref()
    }

    /// Principal attached to the injected request
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.request.as_ref().and_then(|r| r.principal())
    }

    /// `name` is bound (the request handle counts as `request`)
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        if name == REQUEST_PARAM && self.request.is_some() {
            return true;
        }
        self.values.contains_key(name)
    }

    /// Bound keyword values
    #[must_use]
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Names of every bound argument
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        if self.request.is_some() {
            names.push(REQUEST_PARAM);
        }
        names
    }

    /// Number of bound arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() + usize::from(self.request.is_some())
    }

    /// Nothing bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bind the inputs of `req` according to `contract`
///
/// # Errors
///
/// `Error::BadRequest` for a missing or unsupported content type, a JSON body
/// that is malformed or not an object, a broken multipart body, or a missing
/// required keyword.
pub async fn bind_arguments(contract: &ParameterContract, req: &Arc<Request>) -> Result<BoundArguments> {
    let mut values = if contract.needs_keywords() {
        match req.method {
            Method::Post => read_body(req).await?,
            Method::Get => query_values(req),
        }
    } else {
        Map::new()
    };

    if !values.is_empty() && !contract.accepts_arbitrary_keywords {
        values.retain(|name, _| contract.accepts_keyword(name));
    }

    for (name, value) in &req.path_params {
        if values.contains_key(name) {
            warn!("duplicate arg name in named arg and path capture: {name}");
        }
        values.insert(name.clone(), Value::String(value.clone()));
    }

    let mut args = BoundArguments {
        values,
        request: None,
    };
    if contract.accepts_request_handle {
        args.request = Some(Arc::clone(req));
    }

    if let Some(missing) = contract
        .required_keywords
        .iter()
        .find(|name| !args.contains(name))
    {
        return Err(Error::bad_request(format!("Missing argument: {missing}")));
    }

    Ok(args)
}

/// Bind, invoke and capture the outcome of one handler call
///
/// Bad requests become a 400 reply and domain errors become their JSON
/// shape. Anything else is returned as an error for the server to log.
///
/// # Errors
///
/// Returns every handler error other than `Error::Api` and
/// `Error::BadRequest`.
pub async fn handle(entry: &RouteEntry, req: &Arc<Request>) -> Result<Reply> {
    let args = match bind_arguments(&entry.contract, req).await {
        Ok(args) => args,
        Err(Error::BadRequest { message }) => return Ok(Reply::StatusWithMessage(400, message)),
        Err(e) => return Err(e),
    };

    debug!("call with args: {}({})", entry.name, args.names().join(", "));

    match entry.handler.call(args).await {
        Ok(reply) => Ok(reply),
        Err(Error::Api(e)) => {
            debug!(handler = %entry.name, code = %e.code(), "api error");
            Ok(Reply::Json(e.to_json()))
        }
        Err(Error::BadRequest { message }) => Ok(Reply::StatusWithMessage(400, message)),
        Err(e) => Err(e),
    }
}

fn query_values(req: &Request) -> Map<String, Value> {
    req.query_map()
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

async fn read_body(req: &Request) -> Result<Map<String, Value>> {
    let Some(content_type) = req.content_type() else {
        return Err(Error::bad_request("Missing Content-Type."));
    };
    let unsupported = || Error::bad_request(format!("Unsupported Content-Type: {content_type}"));
    let mime: mime::Mime = content_type.parse().map_err(|_| unsupported())?;
    let body = req.body_bytes().cloned().unwrap_or_default();

    match mime.essence_str() {
        "application/json" => match parse_json_bytes::<Value>(&body)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::bad_request("JSON body must be object.")),
        },
        "application/x-www-form-urlencoded" => Ok(parse_pairs(&body)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()),
        "multipart/form-data" => read_multipart(content_type, body).await,
        _ => Err(unsupported()),
    }
}

/// Text parts of a multipart body; file parts are skipped
async fn read_multipart(content_type: &str, body: Bytes) -> Result<Map<String, Value>> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| Error::bad_request("Missing multipart boundary."))?;
    let stream = futures_util::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut values = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let text = field
            .text()
            .await
            .map_err(|e| Error::bad_request(format!("Invalid multipart body: {e}")))?;
        values.entry(name).or_insert(Value::String(text));
    }
    Ok(values)
}
