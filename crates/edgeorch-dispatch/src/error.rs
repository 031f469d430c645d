//! Dispatch error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from executing a decision locally or forwarding it to a peer.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(String),

    #[error("peer answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to spawn {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
