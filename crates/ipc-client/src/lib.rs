//! CraftNet IPC Client
//!
//! JSON-RPC 2.0 client for the local API exposed by the CraftNet client
//! process. Requests are newline-delimited, one connection per request.
//!
//! ## Endpoints
//!
//! - **TCP loopback**: `127.0.0.1:<port>` (default, works on every platform)
//! - **Unix socket**: `/tmp/craftnet.sock` style paths (macOS/Linux)

mod client;
mod protocol;

pub use client::{Endpoint, IpcClient};
pub use protocol::{RpcError, RpcRequest, RpcResponse, StatusResult};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Daemon error {code}: {message}")]
    DaemonError { code: i32, message: String },

    #[error("Connection closed before a response was received")]
    ConnectionClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IpcError>;
