//! Error types for the openocd-loader helper

use thiserror::Error;

use crate::openocd_client::OpenocdError;
use crate::platform::LaunchError;
use crate::symbols::SymbolError;

/// Main error type for a loader session
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("ELF tool invocation failed: {0}")]
    ToolInvocation(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Process exit status reported for this error
    pub fn exit_code(&self) -> u8 {
        1
    }
}

impl From<OpenocdError> for LoaderError {
    fn from(error: OpenocdError) -> Self {
        match error {
            OpenocdError::ConnectionFailed(_) => LoaderError::Connection(error.to_string()),
            OpenocdError::ConnectionClosed | OpenocdError::MalformedResponse(_) => {
                LoaderError::Protocol(error.to_string())
            }
            OpenocdError::NotConnected
            | OpenocdError::WriteFailed(_)
            | OpenocdError::ReadFailed(_)
            | OpenocdError::Timeout => LoaderError::Transport(error.to_string()),
        }
    }
}

impl From<SymbolError> for LoaderError {
    fn from(error: SymbolError) -> Self {
        LoaderError::ToolInvocation(error.to_string())
    }
}

impl From<LaunchError> for LoaderError {
    fn from(error: LaunchError) -> Self {
        match error {
            LaunchError::UnsupportedPlatform(_) => LoaderError::Configuration(error.to_string()),
            LaunchError::SpawnFailed(_) => LoaderError::Io(std::io::Error::other(error.to_string())),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LoaderError>;
