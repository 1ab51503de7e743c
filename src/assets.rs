//! Static asset serving for the single-page app
//!
//! Paths with no matching file fall back to the index document so client-side
//! routes keep working across a hard refresh.

use crate::error::failure_response;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Serves files for the single-page app from a fixed root directory
pub struct StaticAssets {
    root: PathBuf,
    index: String,
}

impl StaticAssets {
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    /// Serve the file at the request path, falling back to the index document.
    ///
    /// HEAD requests get the same headers with an empty body.
    pub async fn serve(
        &self,
        path: &str,
        head_only: bool,
    ) -> Response<BoxBody<Bytes, hyper::Error>> {
        let relative = path.trim_start_matches('/');

        // Refuse traversal before touching the filesystem
        if relative.split('/').any(|segment| segment == "..") {
            warn!(path, "Path traversal attempt blocked");
            return failure_response(StatusCode::NOT_FOUND, "Not found");
        }

        let candidate = self.root.join(relative);
        if let Some(response) = self.try_file(&candidate, head_only).await {
            return response;
        }

        // Single-page fallback: unmatched paths get the index document
        let index_path = self.root.join(&self.index);
        match self.try_file(&index_path, head_only).await {
            Some(response) => response,
            None => {
                debug!(index = %index_path.display(), "Index document missing");
                failure_response(StatusCode::NOT_FOUND, "Not found")
            }
        }
    }

    /// Load one file if it exists and resolves inside the asset root
    async fn try_file(
        &self,
        path: &Path,
        head_only: bool,
    ) -> Option<Response<BoxBody<Bytes, hyper::Error>>> {
        if !path.is_file() {
            return None;
        }

        // Symlinks could still point outside the root; canonicalize both sides
        let root = self.root.canonicalize().ok()?;
        let resolved = path.canonicalize().ok()?;
        if !resolved.starts_with(&root) {
            warn!(path = %path.display(), "Resolved path escapes the asset root");
            return None;
        }

        let content = tokio::fs::read(&resolved).await.ok()?;
        let mime = mime_guess::from_path(&resolved).first_or_octet_stream();

        let len = content.len();
        let body = if head_only {
            Bytes::new()
        } else {
            Bytes::from(content)
        };

        Some(
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", mime.as_ref())
                .header("Content-Length", len)
                .body(Full::new(body).map_err(|never| match never {}).boxed())
                .expect("valid response with StatusCode enum and static headers"),
        )
    }
}
