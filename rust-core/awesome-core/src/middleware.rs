//! # Middleware System
//!
//! Interceptors wrapped around route dispatch. `before_request` runs in chain
//! order and may short-circuit with its own response; `after_response` runs in
//! reverse order for every stage that was entered, short-circuits included.
//!
//! Canonical order: logging, timing, auth, then dispatch.

use crate::request::Request;
use crate::response::Response;
use crate::session::PrincipalResolver;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware trait for request/response interception
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before dispatch; may modify the request or answer it directly
    async fn before_request(&self, _req: &mut Request) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after dispatch, on the way out
    fn after_response(&self, _req: &Request, _res: &mut Response) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(Response),
}

/// Ordered middleware chain
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the end of the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Run every `before_request` in order, stopping at the first response.
    ///
    /// Also returns how many stages were entered, for [`Self::run_after`].
    pub async fn run_before(&self, req: &mut Request) -> (MiddlewareResult, usize) {
        for (i, mw) in self.middlewares.iter().enumerate() {
            if let MiddlewareResult::Respond(res) = mw.before_request(req).await {
                debug!(middleware = mw.name(), path = %req.path, "short-circuit");
                return (MiddlewareResult::Respond(res), i + 1);
            }
        }
        (MiddlewareResult::Continue, self.middlewares.len())
    }

    /// Run `after_response` in reverse order over the first `entered` stages
    pub fn run_after(&self, req: &Request, res: &mut Response, entered: usize) {
        let entered = entered.min(self.middlewares.len());
        for mw in self.middlewares[..entered].iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Logs every request and response with its request id
#[derive(Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn before_request(&self, req: &mut Request) -> MiddlewareResult {
        let request_id = req.header(REQUEST_ID_HEADER).unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            request_id = %request_id,
            "Request received"
        );
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &Request, res: &mut Response) {
        let request_id = req.header(REQUEST_ID_HEADER).unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Logs how long each request took
#[derive(Default)]
pub struct TimingMiddleware;

impl TimingMiddleware {
    /// Create a new timing middleware
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TimingMiddleware {
    fn after_response(&self, req: &Request, _res: &mut Response) {
        debug!(
            method = %req.method,
            path = %req.path,
            duration_ms = %req.received_at().elapsed().as_millis(),
            "Request timing"
        );
    }

    fn name(&self) -> &'static str {
        "TimingMiddleware"
    }
}

/// Resolves the session principal and guards administrative paths
pub struct AuthMiddleware {
    cookie_name: String,
    resolver: Arc<dyn PrincipalResolver>,
    admin_prefix: String,
    signin_path: String,
}

impl AuthMiddleware {
    /// Read `cookie_name` and resolve it through `resolver`
    pub fn new(cookie_name: impl Into<String>, resolver: Arc<dyn PrincipalResolver>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            resolver,
            admin_prefix: "/manage/".to_string(),
            signin_path: "/signin".to_string(),
        }
    }

    /// Paths under this prefix need an administrator
    #[must_use]
    pub fn admin_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.admin_prefix = prefix.into();
        self
    }

    /// Where anonymous visitors of admin paths are sent
    #[must_use]
    pub fn signin_path(mut self, path: impl Into<String>) -> Self {
        self.signin_path = path.into();
        self
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn before_request(&self, req: &mut Request) -> MiddlewareResult {
        req.principal = None;
        if let Some(token) = req.cookie(&self.cookie_name) {
            match self.resolver.resolve(&token).await {
                Ok(Some(principal)) => {
                    debug!(user = %principal.email, "set current user");
                    req.principal = Some(principal);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %req.path, "session lookup failed: {e}"),
            }
        }

        if req.path.starts_with(&self.admin_prefix) && !req.is_admin() {
            return MiddlewareResult::Respond(Response::redirect(&self.signin_path));
        }
        MiddlewareResult::Continue
    }

    fn name(&self) -> &'static str {
        "AuthMiddleware"
    }
}
