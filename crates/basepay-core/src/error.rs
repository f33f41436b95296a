use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::ports::PortError;

pub const USER_REJECTED_REQUEST_CODE: i64 = 4001;
pub const UNSUPPORTED_METHOD_CODE: i64 = 4200;
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

static REJECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(user closed modal|accounts received is empty|user denied account|request rejected)",
    )
    .expect("rejection pattern is a valid regex")
});

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("user rejected the request: {source}")]
    UserRejected {
        #[source]
        source: Box<ConnectorError>,
    },
    #[error("chain {0} is not configured")]
    ChainNotConfigured(u64),
    #[error("switch chain failed: {source}")]
    SwitchChainFailed {
        #[source]
        source: PortError,
    },
    #[error("accounts received is empty")]
    EmptyAccounts,
    #[error("invalid address {value}: {reason}")]
    InvalidAddress { value: String, reason: String },
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
    #[error("malformed wallet_sendCalls response: {0}")]
    MalformedPaymentResponse(String),
    #[error("provider cleanup failed: {0}")]
    CleanupFailed(#[source] PortError),
    #[error(transparent)]
    Provider(#[from] PortError),
}

impl ConnectorError {
    pub fn user_rejected(source: impl Into<ConnectorError>) -> Self {
        Self::UserRejected {
            source: Box::new(source.into()),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        match self {
            Self::UserRejected { .. } => true,
            Self::Provider(err) => err.code() == Some(USER_REJECTED_REQUEST_CODE),
            _ => false,
        }
    }

    /// Reclassifies explicit 4001 codes and known "user declined" messages as `UserRejected`.
    pub fn classify_rejection(self) -> Self {
        if matches!(self, Self::UserRejected { .. }) {
            return self;
        }
        if self.is_user_rejection() || REJECTION_PATTERN.is_match(&self.to_string()) {
            return Self::user_rejected(self);
        }
        self
    }
}
