use alloy::primitives::Address;

/// Connection state is never stored; it is derived from the provider on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { accounts: Vec<Address>, chain_id: u64 },
}

impl ConnectionState {
    /// No known accounts means disconnected, whatever the chain.
    pub fn derive(accounts: Vec<Address>, chain_id: u64) -> Self {
        if accounts.is_empty() {
            Self::Disconnected
        } else {
            Self::Connected { accounts, chain_id }
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}
