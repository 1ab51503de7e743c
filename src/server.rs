//! Inbound HTTP surface: connection handling, routing, and body limits
//!
//! GET and POST under /api/{action} go to the upstream relay; every other
//! GET or HEAD is answered from the static asset directory.

use crate::assets::StaticAssets;
use crate::error::failure_response;
use crate::forward::{ApiMethod, Forwarder, API_PREFIX};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderValue;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The edge HTTP server: static assets plus the /api relay
pub struct EdgeServer {
    bind_addr: SocketAddr,
    forwarder: Arc<Forwarder>,
    assets: Arc<StaticAssets>,
    max_body_bytes: usize,
    shutdown_rx: watch::Receiver<bool>,
}

impl EdgeServer {
    pub fn new(
        bind_addr: SocketAddr,
        forwarder: Arc<Forwarder>,
        assets: Arc<StaticAssets>,
        max_body_bytes: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            forwarder,
            assets,
            max_body_bytes,
            shutdown_rx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener until shutdown
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "Edge server listening (HTTP/1.1 and HTTP/2)");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let forwarder = Arc::clone(&self.forwarder);
                            let assets = Arc::clone(&self.assets);
                            let max_body_bytes = self.max_body_bytes;

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, forwarder, assets, max_body_bytes).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Edge server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    _addr: SocketAddr,
    forwarder: Arc<Forwarder>,
    assets: Arc<StaticAssets>,
    max_body_bytes: usize,
) -> anyhow::Result<()> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let forwarder = Arc::clone(&forwarder);
        let assets = Arc::clone(&assets);
        async move { handle_request(req, forwarder, assets, max_body_bytes).await }
    });

    AutoBuilder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
        .map_err(|e| anyhow::anyhow!("Connection error: {}", e))?;

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    forwarder: Arc<Forwarder>,
    assets: Arc<StaticAssets>,
    max_body_bytes: usize,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    let path = req.uri().path().to_string();

    debug!(method = %req.method(), %path, "Incoming request");

    if let Some(action) = api_action(&path) {
        let action = action.to_string();
        return handle_api(req, forwarder, &action, max_body_bytes).await;
    }

    // Everything else belongs to the single-page app. Paths the API route
    // does not match (such as /api/ or /api/a/b) fall through here too.
    match req.method() {
        &Method::GET => Ok(assets.serve(&path, false).await),
        &Method::HEAD => Ok(assets.serve(&path, true).await),
        _ => Ok(failure_response(StatusCode::NOT_FOUND, "Not found")),
    }
}

async fn handle_api(
    req: Request<Incoming>,
    forwarder: Arc<Forwarder>,
    action: &str,
    max_body_bytes: usize,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    let method = match req.method() {
        &Method::GET => ApiMethod::Get,
        &Method::POST => ApiMethod::Post,
        _ => return Ok(method_not_allowed()),
    };

    let body = if method == ApiMethod::Post {
        match read_json_body(req, max_body_bytes).await {
            Ok(value) => Some(value),
            Err(response) => return Ok(response),
        }
    } else {
        None
    };

    let request_id = Uuid::new_v4().to_string();
    debug!(action, %method, request_id, "Relaying API request");

    match forwarder.forward(method, action, body).await {
        Ok(value) => Ok(json_response(StatusCode::OK, &value)),
        Err(e) => {
            error!(action, request_id, error = %e, "API relay failed");
            Ok(failure_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ))
        }
    }
}

/// Read and parse the request body, honoring the configured size cap.
///
/// An absent body parses as an empty JSON object, mirroring what the API
/// backend expects from a bare POST.
async fn read_json_body(
    req: Request<Incoming>,
    max_body_bytes: usize,
) -> Result<serde_json::Value, Response<BoxBody<Bytes, hyper::Error>>> {
    let limited = Limited::new(req.into_body(), max_body_bytes);
    let bytes = match limited.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Err(if e.downcast_ref::<LengthLimitError>().is_some() {
                warn!(max_body_bytes, "Request body over the configured limit");
                failure_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
            } else {
                failure_response(StatusCode::BAD_REQUEST, "Failed to read request body")
            });
        }
    };

    if bytes.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    serde_json::from_slice(&bytes).map_err(|e| {
        debug!(error = %e, "Request body is not valid JSON");
        failure_response(StatusCode::BAD_REQUEST, "Request body must be JSON")
    })
}

/// Build a JSON response from a relayed upstream value
fn json_response(
    status: StatusCode,
    value: &serde_json::Value,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let body = value.to_string();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(
            Full::new(Bytes::from(body))
                .map_err(|never| match never {})
                .boxed(),
        )
        .expect("valid response with StatusCode enum and static headers")
}

fn method_not_allowed() -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut response = failure_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    response
        .headers_mut()
        .insert(hyper::header::ALLOW, HeaderValue::from_static("GET, POST"));
    response
}

/// Extract the action segment from a path of the form /api/{action}.
///
/// Only a single non-empty segment matches; /api, /api/ and deeper paths do
/// not name an action.
fn api_action(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(API_PREFIX)?;
    let action = rest.strip_prefix('/')?;
    if action.is_empty() || action.contains('/') {
        return None;
    }
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_action_single_segment() {
        assert_eq!(api_action("/api/users"), Some("users"));
        assert_eq!(api_action("/api/submit-form"), Some("submit-form"));
    }

    #[test]
    fn test_api_action_rejects_bare_prefix() {
        assert_eq!(api_action("/api"), None);
        assert_eq!(api_action("/api/"), None);
    }

    #[test]
    fn test_api_action_rejects_deep_paths() {
        assert_eq!(api_action("/api/a/b"), None);
        assert_eq!(api_action("/api/a/"), None);
    }

    #[test]
    fn test_api_action_requires_separator() {
        // /apifoo is an asset path, not an API call
        assert_eq!(api_action("/apifoo"), None);
        assert_eq!(api_action("/"), None);
        assert_eq!(api_action("/index.html"), None);
    }

    #[test]
    fn test_method_not_allowed_lists_allowed_methods() {
        let response = method_not_allowed();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(hyper::header::ALLOW).unwrap(),
            "GET, POST"
        );
    }

    #[test]
    fn test_json_response_serializes_value() {
        let value = serde_json::json!({"success": true, "value": 42});
        let response = json_response(StatusCode::OK, &value);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }
}
