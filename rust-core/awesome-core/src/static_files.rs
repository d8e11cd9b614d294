//! Static assets served from a directory under a fixed path prefix.

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::router::Method;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves GET requests under `prefix` from `dir`
#[derive(Debug, Clone)]
pub struct StaticFiles {
    prefix: String,
    dir: PathBuf,
}

impl StaticFiles {
    /// Map `prefix` (e.g. `/static/`) onto `dir`
    pub fn new(prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            prefix,
            dir: dir.into(),
        }
    }

    /// The request targets a static asset
    #[must_use]
    pub fn matches(&self, req: &Request) -> bool {
        req.method == Method::Get && req.path.starts_with(&self.prefix)
    }

    /// Read the asset for `path`; 404 when absent or escaping the directory
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` for read failures other than a missing file.
    pub async fn serve(&self, path: &str) -> Result<Response> {
        let Some(relative) = path.strip_prefix(&self.prefix) else {
            return Ok(not_found());
        };
        if relative.is_empty() || relative.split('/').any(|s| s == ".." || s.is_empty()) {
            return Ok(not_found());
        }

        let file = self.dir.join(relative);
        match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(not_found()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(not_found()),
            Err(e) => return Err(e.into()),
        }

        let bytes = tokio::fs::read(&file).await?;
        debug!(file = %file.display(), size = bytes.len(), "static file");
        Ok(Response::bytes(bytes, content_type(&file)))
    }
}

fn not_found() -> Response {
    Response::text("Not Found").with_status(404)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "html" => "text/html;charset=utf-8",
        "txt" => "text/plain;charset=utf-8",
        _ => "application/octet-stream",
    }
}
