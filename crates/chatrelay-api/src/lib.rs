//! # chatrelay-api
//!
//! HTTP layer for the chat relay built on Axum.
//!
//! Provides the WebSocket session adapter that connects sockets to the
//! realtime engine, health endpoints, CORS/trace middleware and the
//! server runner.

pub mod app;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use state::AppState;
