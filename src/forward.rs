//! Outbound relay for API requests
//!
//! Each inbound /api/{action} request maps to exactly one request against the
//! upstream backend, with the JSON payload carried through untouched in both
//! directions. The upstream's HTTP status is read but never propagated; any
//! response body that parses as JSON is relayed as a success.

use crate::config::{DeploymentContext, UpstreamConfig};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Path prefix that routes a request to the upstream API
pub const API_PREFIX: &str = "/api";

/// Inbound methods accepted on API routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
}

impl ApiMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            ApiMethod::Get => reqwest::Method::GET,
            ApiMethod::Post => reqwest::Method::POST,
        }
    }
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiMethod::Get => write!(f, "GET"),
            ApiMethod::Post => write!(f, "POST"),
        }
    }
}

/// Errors from the relay; callers render every variant the same way
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The upstream request could not be completed
    #[error("request to upstream failed: {0}")]
    Request(reqwest::Error),
    /// The upstream responded with a body that is not JSON
    #[error("invalid JSON from upstream: {0}")]
    Decode(reqwest::Error),
}

/// Relays API calls to the backend resolved from the deployment context.
///
/// The base URL is fixed at construction; the only per-request inputs are the
/// method, the action segment, and the optional JSON body.
pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
}

impl Forwarder {
    /// Build a forwarder for the given context and upstream settings
    pub fn new(context: &DeploymentContext, upstream: &UpstreamConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = upstream.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create upstream HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: context.base_url(upstream.local_port),
        })
    }

    /// Target URL for an action. The action segment is opaque; whatever came
    /// off the request path goes into the URL unmodified.
    pub fn target_url(&self, action: &str) -> String {
        format!("{}{}/{}", self.base_url, API_PREFIX, action)
    }

    /// Issue exactly one upstream request and decode the response as JSON.
    ///
    /// No retries. A connection failure and a non-JSON response body surface
    /// as distinct variants for logging, but both mean the same thing to the
    /// client.
    pub async fn forward(
        &self,
        method: ApiMethod,
        action: &str,
        body: Option<Value>,
    ) -> Result<Value, ForwardError> {
        let url = self.target_url(action);

        let mut request = self
            .client
            .request(method.as_reqwest(), &url)
            .header("Content-Type", "application/json");
        if let Some(payload) = &body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(ForwardError::Request)?;

        let status = response.status();
        debug!(%url, %method, status = status.as_u16(), "Upstream responded");

        response.json().await.map_err(ForwardError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentContext;

    fn forwarder_for(context: &DeploymentContext) -> Forwarder {
        Forwarder::new(context, &UpstreamConfig::default()).unwrap()
    }

    #[test]
    fn test_local_target_url() {
        let forwarder = forwarder_for(&DeploymentContext::Local);
        assert_eq!(
            forwarder.target_url("users"),
            "http://localhost:5000/api/users"
        );
    }

    #[test]
    fn test_local_target_url_uses_configured_port() {
        let upstream = UpstreamConfig {
            local_port: 9001,
            request_timeout_secs: None,
        };
        let forwarder = Forwarder::new(&DeploymentContext::Local, &upstream).unwrap();
        assert_eq!(
            forwarder.target_url("status"),
            "http://localhost:9001/api/status"
        );
    }

    #[test]
    fn test_hosted_target_url() {
        let context = DeploymentContext::Hosted {
            host: "myapp.vercel.app".to_string(),
        };
        let forwarder = forwarder_for(&context);
        assert_eq!(
            forwarder.target_url("submit"),
            "https://myapp.vercel.app/api/submit"
        );
    }

    #[test]
    fn test_action_segment_is_opaque() {
        let forwarder = forwarder_for(&DeploymentContext::Local);
        assert_eq!(
            forwarder.target_url("Weird-action_2"),
            "http://localhost:5000/api/Weird-action_2"
        );
    }

    #[test]
    fn test_api_method_display() {
        assert_eq!(ApiMethod::Get.to_string(), "GET");
        assert_eq!(ApiMethod::Post.to_string(), "POST");
    }
}
