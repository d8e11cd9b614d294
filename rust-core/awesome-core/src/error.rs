//! # Error Handling
//!
//! Centralized error types for the dispatch core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Two families live here:
//!
//! - [`Error`] - everything that can go wrong inside the framework or its
//!   collaborators (routing, binding, persistence, templating, IO).
//! - [`ApiError`] - domain failures raised by handler logic. They travel
//!   through [`Error::Api`] and are turned into the JSON error shape exactly
//!   once, by the request handler adapter.

use crate::router::Method;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Result type alias for dispatch core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error code for malformed or missing input values
pub const VALUE_INVALID: &str = "value:invalid";
/// Error code for a referenced resource that does not exist
pub const VALUE_NOT_FOUND: &str = "value:notfound";
/// Error code for a missing or insufficient principal
pub const PERMISSION_FORBIDDEN: &str = "permission:forbidden";

/// Core error types for the dispatch runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Router failed to match the requested path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// The same method and path template were registered twice
    #[error("Duplicate route: {method} {path}")]
    DuplicateRoute {
        /// HTTP method of the route
        method: Method,
        /// Path template of the route
        path: String,
    },

    /// A handler was registered without a method or a path
    #[error("GET or POST not defined in {handler}")]
    UntaggedHandler {
        /// Handler name
        handler: String,
    },

    /// A handler signature violates the binding rules
    #[error("Invalid signature for {handler}: {reason}")]
    InvalidSignature {
        /// Handler name
        handler: String,
        /// What is wrong with it
        reason: String,
    },

    /// The request is malformed at the protocol level (answered with 400)
    #[error("Bad request: {message}")]
    BadRequest {
        /// Plain message sent back to the client
        message: String,
    },

    /// HTTP method outside of GET/POST
    #[error("Method not supported: {method}")]
    MethodNotSupported {
        /// The method received
        method: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// Structured domain error raised by a handler
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Template lookup or rendering failed
    #[error("Template error: {message}")]
    Template {
        /// Error message from the template engine
        message: String,
    },

    /// Database error
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a protocol-level bad request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Shorthand for a persistence failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }
}

/// Structured domain error: `{error, data, message}`
///
/// `error` is a namespaced machine-readable code and is never empty,
/// `data` names the offending field or resource.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{error}: {data} {message}")]
pub struct ApiError {
    error: String,
    data: String,
    message: String,
}

impl ApiError {
    /// Create an error with an arbitrary code.
    ///
    /// An empty code is replaced by `"error:unknown"`.
    pub fn new(error: impl Into<String>, data: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "error:unknown".to_string();
        }
        Self {
            error,
            data: data.into(),
            message: message.into(),
        }
    }

    /// The input value of `field` is missing or invalid
    pub fn value_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(VALUE_INVALID, field, message)
    }

    /// The resource named `resource` was not found
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(VALUE_NOT_FOUND, resource, message)
    }

    /// The current principal may not perform this action
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(PERMISSION_FORBIDDEN, "permission", message)
    }

    /// Machine-readable code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.error
    }

    /// Offending field or resource name
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Human-readable message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wire shape sent back to clients
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": self.error,
            "data": self.data,
            "message": self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_error() {
        let err = Error::RouteNotFound {
            path: "/unknown".to_string(),
        };
        assert!(err.to_string().contains("/unknown"));
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:9000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:9000"));
    }

    #[test]
    fn test_duplicate_route_message() {
        let err = Error::DuplicateRoute {
            method: Method::Post,
            path: "/api/blogs".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate route: POST /api/blogs");
    }

    #[test]
    fn test_value_invalid_shape() {
        let err = ApiError::value_invalid("email", "Invalid email.");
        assert_eq!(
            err.to_json(),
            json!({"error": "value:invalid", "data": "email", "message": "Invalid email."})
        );
    }

    #[test]
    fn test_not_found_and_permission_codes() {
        assert_eq!(ApiError::not_found("Blog", "").code(), VALUE_NOT_FOUND);
        let denied = ApiError::permission("Please signin first.");
        assert_eq!(denied.code(), PERMISSION_FORBIDDEN);
        assert_eq!(denied.data(), "permission");
    }

    #[test]
    fn test_empty_code_is_replaced() {
        let err = ApiError::new("", "", "");
        assert!(!err.code().is_empty());
        assert_eq!(err.message(), "");
    }

    #[test]
    fn test_api_error_converts_into_core_error() {
        let err: Error = ApiError::value_invalid("name", "name cannot be empty.").into();
        assert!(matches!(err, Error::Api(ref e) if e.data() == "name"));
    }
}
