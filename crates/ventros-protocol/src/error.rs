//! IPC error types, the JSON-RPC 2.0 error codes the host answers with, and
//! URL errors.

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 error codes used on the IPC channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcErrorCode {
    // JSON-RPC 2.0 standard errors
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InternalError,

    // Server errors
    ServerShuttingDown,
}

impl IpcErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InternalError => -32603,
            Self::ServerShuttingDown => -32002,
        }
    }
}

/// JSON-RPC 2.0 error object sent back to IPC clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl IpcError {
    pub fn new(code: IpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(IpcErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(IpcErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(IpcErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    pub fn shutting_down() -> Self {
        Self::new(IpcErrorCode::ServerShuttingDown, "Host is shutting down")
    }
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IPC Error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for IpcError {}

/// Failure to interpret a string as a `ventros://` address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("malformed address {input:?}: {source}")]
    Malformed {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("not a ventros:// address: {0}")]
    WrongScheme(String),

    #[error("address has no host: {0}")]
    MissingHost(String),
}
