//! CLI interface for the broker

pub mod commands;
mod output;

pub use output::{error, info, success, warn};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "courier-broker")]
#[command(author = "Krakaw")]
#[command(version = "1.0.0")]
#[command(about = "WebSocket event broadcasting hub", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the broker's HTTP/WS server
    Serve {
        /// Path to courier.toml; searched upward from cwd when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to, overriding config
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on, overriding config
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a default courier.toml in the current directory
    Init,
}
