use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{ConnectorEvent, ProviderConfig};

/// EIP-1193 error object as returned by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PortError {
    #[error("provider rpc error: {0}")]
    Rpc(#[from] RpcError),
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy error: {0}")]
    Policy(String),
}

impl PortError {
    /// Provider error code, when the failure came back as an RPC error object.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc(err) => Some(err.code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn without_params(method: impl Into<String>) -> Self {
        Self::new(method, Value::Array(Vec::new()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
    Disconnect,
}

impl ProviderEventKind {
    pub const ALL: [Self; 3] = [Self::AccountsChanged, Self::ChainChanged, Self::Disconnect];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsolicited notification pushed by a provider to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    ChainChanged(String),
    Disconnect(Option<RpcError>),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
            Self::Disconnect(_) => ProviderEventKind::Disconnect,
        }
    }
}

/// Listener handle. Two handles are the same listener iff they point at the same allocation.
pub type ProviderListener = Arc<dyn Fn(ProviderEvent) + Send + Sync>;

/// The wallet's request-and-event capability.
#[async_trait]
pub trait WalletProvider: fmt::Debug + Send + Sync {
    async fn request(&self, request: RpcRequest) -> Result<Value, PortError>;
    fn on(&self, event: ProviderEventKind, listener: ProviderListener);
    fn remove_listener(&self, event: ProviderEventKind, listener: &ProviderListener);
    async fn disconnect(&self) -> Result<(), PortError>;
}

/// Builds provider handles. Construction may be slow and may fail.
#[async_trait]
pub trait ProviderFactory: fmt::Debug + Send + Sync {
    async fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn WalletProvider>, PortError>;
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: ConnectorEvent);
}

impl EventSink for UnboundedSender<ConnectorEvent> {
    fn emit(&self, event: ConnectorEvent) {
        if self.send(event).is_err() {
            tracing::trace!("connector event dropped: receiver closed");
        }
    }
}
