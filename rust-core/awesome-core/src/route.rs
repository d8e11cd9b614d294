//! # Route Metadata
//!
//! A [`RouteDef`] is what a handler module hands to the registry: a name, a
//! declared [`Signature`], the callable, and the method/path tag. Registration
//! turns it into an immutable [`RouteEntry`].

use crate::contract::{ParameterContract, Signature};
use crate::error::{Error, Result};
use crate::handler::BoundArguments;
use crate::response::Reply;
use crate::router::Method;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by every handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply>> + Send>>;

/// A request handler callable
///
/// Implemented for any `Fn(BoundArguments) -> impl Future<Output = Result<Reply>>`.
pub trait Handler: Send + Sync + 'static {
    /// Invoke the handler with its bound arguments
    fn call(&self, args: BoundArguments) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(BoundArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    fn call(&self, args: BoundArguments) -> HandlerFuture {
        Box::pin(self(args))
    }
}

/// Handler plus the tag that places it in the route table
pub struct RouteDef {
    name: String,
    signature: Signature,
    handler: Arc<dyn Handler>,
    method: Option<Method>,
    path: Option<String>,
}

impl RouteDef {
    /// Wrap a handler; it still needs `.get()` or `.post()` before registration
    pub fn new(name: impl Into<String>, signature: Signature, handler: impl Handler) -> Self {
        Self {
            name: name.into(),
            signature,
            handler: Arc::new(handler),
            method: None,
            path: None,
        }
    }

    /// Tag as `GET path`
    #[must_use]
    pub fn get(self, path: impl Into<String>) -> Self {
        self.tag(Method::Get, path)
    }

    /// Tag as `POST path`
    #[must_use]
    pub fn post(self, path: impl Into<String>) -> Self {
        self.tag(Method::Post, path)
    }

    fn tag(mut self, method: Method, path: impl Into<String>) -> Self {
        self.method = Some(method);
        self.path = Some(path.into());
        self
    }

    /// Handler name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate the tag and signature and build the registry entry
    ///
    /// # Errors
    ///
    /// `Error::UntaggedHandler` when method or path is missing,
    /// `Error::InvalidSignature` or `Error::InvalidRoutePattern` when the
    /// declaration is malformed.
    pub fn into_entry(self) -> Result<RouteEntry> {
        let (Some(method), Some(path)) = (self.method, self.path) else {
            return Err(Error::UntaggedHandler { handler: self.name });
        };
        let template = PathTemplate::parse(&path)?;
        let contract = ParameterContract::extract(&self.name, &self.signature)?;

        Ok(RouteEntry {
            method,
            template,
            name: self.name,
            signature: self.signature,
            handler: self.handler,
            contract,
        })
    }
}

/// Registered route, immutable after startup
pub struct RouteEntry {
    /// HTTP method
    pub method: Method,
    /// Path template
    pub template: PathTemplate,
    /// Handler name, for logs
    pub name: String,
    /// Declared signature, for logs
    pub signature: Signature,
    /// The callable
    pub handler: Arc<dyn Handler>,
    /// Binding rules derived from the signature
    pub contract: ParameterContract,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("template", &self.template.as_str())
            .field("name", &self.name)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

/// Path pattern made of literal segments and `{name}` captures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    captures: Vec<String>,
}

impl PathTemplate {
    /// Parse and validate a template such as `/api/blogs/{id}/delete`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` when the template does not start
    /// with `/`, a capture name is empty or not an identifier, a capture name
    /// repeats, or a literal segment contains braces or `*`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRoutePattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if !raw.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut captures: Vec<String> = Vec::new();
        for segment in raw.split('/').skip(1) {
            if let Some(name) = capture_name(segment) {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid("capture names must be identifiers"));
                }
                if captures.iter().any(|c| c == name) {
                    return Err(invalid("capture names must be unique"));
                }
                captures.push(name.to_string());
            } else if segment.contains(['{', '}', '*']) {
                return Err(invalid("literal segments cannot contain '{', '}' or '*'"));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            captures,
        })
    }

    /// Template text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Capture names in order of appearance
    #[must_use]
    pub fn captures(&self) -> &[String] {
        &self.captures
    }
}

/// `Some(name)` for a `{name}` segment, `None` for a literal
fn capture_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_args: BoundArguments) -> Result<Reply> {
        Ok(Reply::Status(204))
    }

    #[test]
    fn test_template_simple() {
        let t = PathTemplate::parse("/api/users").unwrap();
        assert_eq!(t.as_str(), "/api/users");
        assert!(t.captures().is_empty());
    }

    #[test]
    fn test_template_root() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.captures().is_empty());
    }

    #[test]
    fn test_template_captures() {
        let t = PathTemplate::parse("/api/blogs/{id}/comments").unwrap();
        assert_eq!(t.captures(), ["id".to_string()]);
    }

    #[test]
    fn test_template_rejects_wildcards_and_bad_names() {
        assert!(PathTemplate::parse("/static/{*path}").is_err());
        assert!(PathTemplate::parse("/files/*").is_err());
        assert!(PathTemplate::parse("/blog/{}").is_err());
        assert!(PathTemplate::parse("/a/{id}/b/{id}").is_err());
        assert!(PathTemplate::parse("blog").is_err());
    }

    #[test]
    fn test_untagged_handler_is_rejected() {
        let def = RouteDef::new("orphan", Signature::new(), noop);
        let err = def.into_entry().unwrap_err();
        assert!(matches!(err, Error::UntaggedHandler { ref handler } if handler == "orphan"));
    }

    #[test]
    fn test_tagged_handler_builds_entry() {
        let entry = RouteDef::new("get_blog", Signature::new().positional("id"), noop)
            .get("/blog/{id}")
            .into_entry()
            .unwrap();
        assert_eq!(entry.method, Method::Get);
        assert_eq!(entry.template.as_str(), "/blog/{id}");
        assert!(!entry.contract.needs_keywords());
    }

    #[test]
    fn test_invalid_signature_fails_registration() {
        let def = RouteDef::new("bad", Signature::new().request().positional("id"), noop)
            .post("/bad");
        assert!(matches!(def.into_entry(), Err(Error::InvalidSignature { .. })));
    }
}
