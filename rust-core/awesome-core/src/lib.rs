//! # Awesome Core
//!
//! Declarative request dispatch for the Awesome blog.
//!
//! Handlers are plain async functions over [`BoundArguments`]. Each one is
//! declared once with a [`Signature`] and tagged with a method and path; the
//! [`Router`] derives its [`ParameterContract`] at registration, and the
//! adapter binds query strings, bodies, path captures and the request handle
//! onto it for every request.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper
//! - `router` - Route registry using matchit (radix trie)
//! - `route` - Route definitions, entries and path templates
//! - `contract` - Handler signatures and derived parameter contracts
//! - `handler` - Argument binding and handler invocation
//! - `request` - HTTP request wrapper with headers, cookies and query parsing
//! - `response` - Handler replies and their translation to HTTP responses
//! - `middleware` - Request/response middleware (logging, timing, auth)
//! - `session` - Signed session cookies and principals
//! - `static_files` - Static asset serving
//! - `page` - Pagination
//! - `json` - JSON parsing with simd-json
//! - `error` - Error types and handling

pub mod contract;
pub mod error;
pub mod handler;
pub mod json;
pub mod middleware;
pub mod page;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod session;
pub mod static_files;

pub use contract::{ParamKind, ParameterContract, Signature};
pub use error::{ApiError, Error, Result};
pub use handler::BoundArguments;
pub use json::{parse_json_bytes, to_json};
pub use middleware::{AuthMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareResult, TimingMiddleware};
pub use page::Page;
pub use request::Request;
pub use response::{Reply, Response, ResponseTranslator, TemplateRenderer};
pub use route::{RouteDef, RouteEntry};
pub use router::{Method, Router};
pub use server::{Bytes, Server, ServerConfig};
pub use session::{Principal, PrincipalResolver, SessionCodec};
pub use static_files::StaticFiles;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
