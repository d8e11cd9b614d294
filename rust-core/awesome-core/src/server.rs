//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio, one task per connection.
//! Implements graceful shutdown with signal handling.
//!
//! Request flow:
//!
//! ```text
//! request → middleware (in order) → static files | route match
//!         → adapter → translator → middleware (reverse) → response
//! ```

use crate::error::{Error, Result};
use crate::handler::handle;
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult, REQUEST_ID_HEADER};
use crate::request::Request;
use crate::response::{Response, ResponseTranslator, TemplateRenderer};
use crate::router::{Method, Router};
use crate::static_files::StaticFiles;
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 9000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Everything a request passes through, shared read-only by all connections
#[derive(Clone)]
struct Pipeline {
    router: Arc<Router>,
    middleware: MiddlewareChain,
    translator: ResponseTranslator,
    static_files: Option<StaticFiles>,
}

impl Pipeline {
    /// Core request processing logic (network agnostic)
    async fn process(&self, mut req: Request) -> Response {
        if req.header(REQUEST_ID_HEADER).is_none() {
            req.set_header(REQUEST_ID_HEADER, &generate_request_id());
        }

        let (result, entered) = self.middleware.run_before(&mut req).await;
        let (req, mut response) = match result {
            MiddlewareResult::Continue => self.dispatch(req).await,
            MiddlewareResult::Respond(res) => (Arc::new(req), res),
        };

        if let Some(request_id) = req.header(REQUEST_ID_HEADER) {
            response.set_header(REQUEST_ID_HEADER, request_id);
        }
        self.middleware.run_after(&req, &mut response, entered);
        response
    }

    async fn dispatch(&self, mut req: Request) -> (Arc<Request>, Response) {
        if let Some(files) = self.static_files.as_ref().filter(|f| f.matches(&req)) {
            let response = match files.serve(&req.path).await {
                Ok(res) => res,
                Err(e) => internal_error(&req, "static", &e),
            };
            return (Arc::new(req), response);
        }

        let entry = match self.router.match_route(req.method, &req.path) {
            Ok(matched) => {
                req.path_params = matched.params;
                Arc::clone(matched.entry)
            }
            Err(_) => return (Arc::new(req), not_found()),
        };

        let req = Arc::new(req);
        let response = match handle(&entry, &req).await {
            Ok(reply) => self
                .translator
                .translate(reply, &req)
                .unwrap_or_else(|e| internal_error(&req, &entry.name, &e)),
            Err(e) => internal_error(&req, &entry.name, &e),
        };
        (req, response)
    }
}

/// HTTP server wrapping a route table
pub struct Server {
    config: ServerConfig,
    pipeline: Pipeline,
}

impl Server {
    /// Create a server over a fully registered router
    #[must_use]
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            pipeline: Pipeline {
                router: Arc::new(router),
                middleware: MiddlewareChain::new(),
                translator: ResponseTranslator::new(),
                static_files: None,
            },
        }
    }

    /// Add a middleware to the end of the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.pipeline.middleware.add(middleware);
    }

    /// Render template replies with `renderer`
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.pipeline.translator = ResponseTranslator::with_renderer(renderer);
        self
    }

    /// Serve static assets before routing
    #[must_use]
    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        self.pipeline.static_files = Some(files);
        self
    }

    /// Server configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registered routes
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.pipeline.router
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound and
    /// `Error::Io` if accepting connections fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        info!("Server listening on http://{}", addr);

        let pipeline = Arc::new(self.pipeline.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let pipeline = Arc::clone(&pipeline);
                    let active = Arc::clone(&active);

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let pipeline = Arc::clone(&pipeline);
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let response = handle_request(req, &pipeline, max_body_size).await;
                                info!("    {} - \"{} {}\" {}", remote_addr, method, path, response.status());
                                Ok::<_, hyper::Error>(response)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            info!("Shutdown timeout reached with connections still open");
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Response {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return payload_too_large();
            }
        }
        let req = Request::new(method, path, headers, body);
        self.pipeline.process(req).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {e}");
        std::future::pending::<()>().await;
    }
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    pipeline: &Pipeline,
    max_body_size: usize,
) -> hyper::Response<Full<Bytes>> {
    let request = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(r) => r,
        Err(Error::PayloadTooLarge { limit, actual }) => {
            info!(limit, actual, "payload too large");
            return payload_too_large().into_hyper();
        }
        Err(Error::MethodNotSupported { method }) => {
            return Response::text(format!("Method Not Allowed: {method}"))
                .with_status(405)
                .with_header("Allow", "GET, POST")
                .into_hyper();
        }
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return Response::text("Bad Request").with_status(400).into_hyper();
        }
    };

    pipeline.process(request).await.into_hyper()
}

fn not_found() -> Response {
    Response::json(r#"{"error":"Not Found"}"#).with_status(404)
}

fn payload_too_large() -> Response {
    Response::json(r#"{"error":"Payload Too Large"}"#).with_status(413)
}

fn internal_error(req: &Request, route: &str, e: &Error) -> Response {
    error!(method = %req.method, path = %req.path, route = %route, "handler failed: {e}");
    Response::text("Internal Server Error").with_status(500)
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
