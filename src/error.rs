//! JSON failure envelope for edge-generated errors

use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// JSON body sent to clients when the gateway itself produces the error
#[derive(Debug, Serialize)]
pub struct FailureEnvelope {
    /// Always false
    pub success: bool,
    /// Human-readable error message
    pub error: String,
}

impl FailureEnvelope {
    /// Create a new failure envelope
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"success":false,"error":"{}"}}"#,
                self.error.replace('\"', "\\\"")
            )
        })
    }
}

/// Create a JSON response carrying a failure envelope
pub fn failure_response(
    status: StatusCode,
    message: impl Into<String>,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    let body = FailureEnvelope::new(message).to_json();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)).map_err(|e| match e {}).boxed())
        .expect("valid response with StatusCode enum and static headers")
}
