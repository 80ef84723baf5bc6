//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer.

pub mod handlers;
mod rate_limit;
mod server;

pub use handlers::{AppState, AuthorizeUrlBuilder};
pub use server::HttpServer;
