//! Courier - a WebSocket event broadcasting hub
//!
//! Publishers push JSON events over HTTP; the broker fans each event out
//! to every subscriber connected to the matching channel over WebSocket.

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod registry;
pub mod shutdown;
pub mod stats;

pub use config::Config;
pub use error::Error;
