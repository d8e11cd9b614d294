//! # Route Registry
//!
//! Radix-trie based router using `matchit`, one trie per HTTP method.
//!
//! Templates are made of literal segments and `{name}` captures. A concrete
//! path matches a template when the segment counts agree and every literal
//! segment is equal; captured values are returned by name. The table is
//! filled once at startup and only read while serving.

use crate::error::{Error, Result};
use crate::route::{RouteDef, RouteEntry};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

impl TryFrom<&hyper::Method> for Method {
    type Error = Error;

    fn try_from(method: &hyper::Method) -> Result<Self> {
        match *method {
            hyper::Method::GET => Ok(Self::Get),
            hyper::Method::POST => Ok(Self::Post),
            ref other => Err(Error::MethodNotSupported {
                method: other.to_string(),
            }),
        }
    }
}

/// Matched route with its extracted path captures
#[derive(Debug)]
pub struct Match<'a> {
    /// The registered entry
    pub entry: &'a Arc<RouteEntry>,
    /// Capture name to raw segment value
    pub params: HashMap<String, String>,
}

/// Per-method storage for routes
#[derive(Clone)]
struct MethodRoutes {
    /// Matchit router for path matching, values index into `routes`
    router: MatchitRouter<usize>,
    /// Registered entries
    routes: Vec<Arc<RouteEntry>>,
}

impl MethodRoutes {
    fn new() -> Self {
        Self {
            router: MatchitRouter::new(),
            routes: Vec::new(),
        }
    }
}

/// Route table keyed by (method, path template)
#[derive(Clone, Default)]
pub struct Router {
    method_routes: HashMap<Method, MethodRoutes>,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one tagged handler
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateRoute` if the (method, template) pair is
    /// already registered, `Error::UntaggedHandler` if the definition has no
    /// method or path, and `Error::InvalidSignature` /
    /// `Error::InvalidRoutePattern` for malformed declarations.
    pub fn add_route(&mut self, def: RouteDef) -> Result<()> {
        let entry = def.into_entry()?;
        let method = entry.method;
        let path = entry.template.as_str().to_string();

        let method_routes = self
            .method_routes
            .entry(method)
            .or_insert_with(MethodRoutes::new);

        if method_routes
            .routes
            .iter()
            .any(|r| r.template.as_str() == path)
        {
            return Err(Error::DuplicateRoute { method, path });
        }

        method_routes
            .router
            .insert(path.as_str(), method_routes.routes.len())
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "add route {} {} => {}({})",
            method, path, entry.name, entry.signature
        );
        method_routes.routes.push(Arc::new(entry));

        Ok(())
    }

    /// Register every definition of a handler module
    ///
    /// # Errors
    ///
    /// Stops at the first definition that fails to register.
    pub fn add_routes(&mut self, defs: impl IntoIterator<Item = RouteDef>) -> Result<()> {
        for def in defs {
            self.add_route(def)?;
        }
        Ok(())
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no template for `method` matches.
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match<'_>> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let method_routes = self.method_routes.get(&method).ok_or_else(not_found)?;
        let matched = method_routes.router.at(path).map_err(|_| not_found())?;
        let entry = method_routes
            .routes
            .get(*matched.value)
            .ok_or_else(not_found)?;

        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Match { entry, params })
    }

    /// Number of registered routes across all methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.method_routes.values().map(|m| m.routes.len()).sum()
    }

    /// No route registered yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
