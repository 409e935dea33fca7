//! OpenOCD TCL RPC client
//!
//! Talks to a running OpenOCD server on its TCL port (default 6666).
//! Protocol: command sent as ASCII text followed by a single 0x00 byte.
//! Response: ASCII text terminated by 0x1a (SUB character).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use std::time::Duration;

/// Outbound command terminator
const COMMAND_TERMINATOR: u8 = 0x00;

/// Inbound response sentinel (ASCII SUB / Ctrl-Z)
const RESPONSE_SENTINEL: u8 = 0x1a;

/// Default OpenOCD TCL endpoint
pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 6666;

/// OpenOCD TCL client holding a single connection.
///
/// Every operation takes `&mut self`, so at most one command is ever in
/// flight on the connection.
pub struct OpenocdClient {
    stream: Option<BufReader<TcpStream>>,
    /// Remote host this client connected to
    pub host: String,
    /// Remote TCL port
    pub port: u16,
    read_timeout: Option<Duration>,
}

impl OpenocdClient {
    /// Connect to the OpenOCD TCL server. No retry is attempted.
    pub async fn connect(host: &str, port: u16) -> Result<Self, OpenocdError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            OpenocdError::ConnectionFailed(format!(
                "Failed to connect to OpenOCD at {}:{}: {}",
                host, port, e
            ))
        })?;

        info!("Connected to OpenOCD TCL on {}:{}", host, port);

        Ok(Self {
            stream: Some(BufReader::new(stream)),
            host: host.to_string(),
            port,
            read_timeout: None,
        })
    }

    /// Bound every `receive` by `timeout`. `None` blocks until the server answers.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Write one command frame: command bytes plus the 0x00 terminator.
    pub async fn send(&mut self, command: &str) -> Result<(), OpenocdError> {
        let stream = self.stream.as_mut().ok_or(OpenocdError::NotConnected)?;

        debug!("OpenOCD TCL command: {}", command);

        let mut payload = Vec::with_capacity(command.len() + 1);
        payload.extend_from_slice(command.as_bytes());
        payload.push(COMMAND_TERMINATOR);

        let socket = stream.get_mut();
        socket
            .write_all(&payload)
            .await
            .map_err(|e| OpenocdError::WriteFailed(e.to_string()))?;
        socket
            .flush()
            .await
            .map_err(|e| OpenocdError::WriteFailed(e.to_string()))?;

        Ok(())
    }

    /// Read one response frame, returned without its 0x1a sentinel.
    ///
    /// Bytes that arrive after the sentinel stay buffered for the next call.
    pub async fn receive(&mut self) -> Result<String, OpenocdError> {
        let stream = self.stream.as_mut().ok_or(OpenocdError::NotConnected)?;

        let mut buf = Vec::with_capacity(4096);
        let read = stream.read_until(RESPONSE_SENTINEL, &mut buf);

        let result = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| OpenocdError::Timeout)?,
            None => read.await,
        };
        result.map_err(|e| OpenocdError::ReadFailed(e.to_string()))?;

        // read_until only stops short of the sentinel at EOF
        if buf.pop() != Some(RESPONSE_SENTINEL) {
            return Err(OpenocdError::ConnectionClosed);
        }

        let response = String::from_utf8(buf)
            .map_err(|e| OpenocdError::MalformedResponse(format!("Invalid UTF-8 in response: {}", e)))?;

        debug!("OpenOCD TCL response: {}", response);
        Ok(response)
    }

    /// Send a command and read its response.
    pub async fn command(&mut self, command: &str) -> Result<String, OpenocdError> {
        self.send(command).await?;
        self.receive().await
    }

    /// Close the connection. Calling this on a closed client is a no-op.
    pub async fn disconnect(&mut self) -> Result<(), OpenocdError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let mut socket = stream.into_inner();
        if let Err(e) = socket.shutdown().await {
            // The peer may already be gone (e.g. after `shutdown`)
            warn!("Socket shutdown: {}", e);
        }

        info!("Disconnected from OpenOCD {}:{}", self.host, self.port);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenocdError {
    #[error("{0}")]
    ConnectionFailed(String),

    #[error("Not connected to OpenOCD")]
    NotConnected,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Connection closed by OpenOCD before end of response")]
    ConnectionClosed,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response timeout")]
    Timeout,
}
