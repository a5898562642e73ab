//! HTTP API server

pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{create_router, run_server, AppState, SharedState};
