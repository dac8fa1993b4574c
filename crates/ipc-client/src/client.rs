//! IPC Client implementation

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::protocol::{RpcRequest, RpcResponse, StatusResult};
use crate::{IpcError, Result};

/// Where the client's local API can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl Endpoint {
    /// Loopback TCP endpoint on the given port
    pub fn loopback(port: u16) -> Self {
        Self::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{}", addr),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

fn map_connect_error(e: std::io::Error) -> IpcError {
    if e.kind() == std::io::ErrorKind::NotFound
        || e.kind() == std::io::ErrorKind::ConnectionRefused
    {
        IpcError::DaemonNotRunning
    } else {
        IpcError::ConnectionFailed(e.to_string())
    }
}

/// IPC Client for the CraftNet client's local API
pub struct IpcClient {
    endpoint: Endpoint,
    request_id: AtomicU64,
}

impl IpcClient {
    /// Create a new IPC client
    ///
    /// Note: This doesn't establish a connection. Each request creates a new connection.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the next request ID
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a raw JSON-RPC request
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        match &self.endpoint {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(map_connect_error)?;
                let (reader, mut writer) = stream.into_split();
                self.send_and_receive(reader, &mut writer, method, params).await
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path).await.map_err(map_connect_error)?;
                let (reader, mut writer) = stream.into_split();
                self.send_and_receive(reader, &mut writer, method, params).await
            }
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(IpcError::ConnectionFailed(format!(
                "unix sockets are not supported on this platform: {}",
                path.display()
            ))),
        }
    }

    async fn send_and_receive<R, W>(
        &self,
        reader: R,
        writer: &mut W,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let request = RpcRequest::new(method, params, self.next_id());
        let request_json = serde_json::to_string(&request)?;
        debug!("Sending request: {}", request_json);

        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut response_str = String::new();
        if reader.read_line(&mut response_str).await? == 0 {
            return Err(IpcError::ConnectionClosed);
        }
        debug!("Received response: {}", response_str.trim());

        let response: RpcResponse = serde_json::from_str(&response_str)
            .map_err(|e| IpcError::InvalidResponse(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(IpcError::DaemonError {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// Get the client's self-reported status
    pub async fn status(&self) -> Result<StatusResult> {
        let result = self.send_request("status", None).await?;
        serde_json::from_value(result).map_err(|e| IpcError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Serve exactly one request with a canned response line
    async fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.unwrap();
            assert!(line.contains("\"method\":\"status\""));
            writer.write_all(response.as_bytes()).await.unwrap();
            writer.write_all(b"\n").await.unwrap();
        });
        port
    }

    #[test]
    fn test_request_id_increments() {
        let client = IpcClient::new(Endpoint::loopback(4050));
        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);
        assert_eq!(client.next_id(), 3);
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::loopback(4050).to_string(), "tcp://127.0.0.1:4050");
        assert_eq!(
            Endpoint::Unix(PathBuf::from("/tmp/craftnet.sock")).to_string(),
            "unix:///tmp/craftnet.sock"
        );
    }

    #[tokio::test]
    async fn test_status_over_tcp() {
        let port =
            serve_once(r#"{"jsonrpc":"2.0","result":{"state":"idle","connected":false},"id":1}"#)
                .await;
        let client = IpcClient::new(Endpoint::loopback(port));

        let status = client.status().await.unwrap();
        assert_eq!(status.state, "idle");
    }

    #[tokio::test]
    async fn test_daemon_error_is_surfaced() {
        let port =
            serve_once(r#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"busy"},"id":1}"#)
                .await;
        let client = IpcClient::new(Endpoint::loopback(port));

        match client.status().await {
            Err(IpcError::DaemonError { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "busy");
            }
            other => panic!("unexpected result: {:?}", other.map(|s| s.state)),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_daemon_not_running() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = IpcClient::new(Endpoint::loopback(port));
        assert!(matches!(
            client.status().await,
            Err(IpcError::DaemonNotRunning)
        ));
    }
}
