//! Spagate - An HTTP edge gateway for single-page applications
//!
//! This library provides a small edge process that:
//! - Serves a single-page app's static assets with an index.html fallback
//! - Relays GET/POST requests under /api/{action} to a backend service
//! - Passes JSON payloads through verbatim in both directions
//! - Resolves its upstream target once at startup from the deployment context

pub mod assets;
pub mod config;
pub mod error;
pub mod forward;
pub mod server;
