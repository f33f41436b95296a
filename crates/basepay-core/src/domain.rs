use std::collections::BTreeMap;
use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const BASE_CHAIN_ID: u64 = 8453;
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

pub const DEFAULT_PREFERENCE_OPTIONS: &str = "all";
pub const SEND_CALLS_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn ether() -> Self {
        Self {
            name: "Ether".to_owned(),
            symbol: "ETH".to_owned(),
            decimals: 18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockExplorer {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    /// Default HTTP RPC endpoints, most preferred first.
    pub rpc_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer: Option<BlockExplorer>,
}

impl ChainDescriptor {
    pub fn base() -> Self {
        Self {
            id: BASE_CHAIN_ID,
            name: "Base".to_owned(),
            native_currency: NativeCurrency::ether(),
            rpc_urls: vec!["https://mainnet.base.org".to_owned()],
            block_explorer: Some(BlockExplorer {
                name: "Basescan".to_owned(),
                url: "https://basescan.org".to_owned(),
            }),
        }
    }

    pub fn base_sepolia() -> Self {
        Self {
            id: BASE_SEPOLIA_CHAIN_ID,
            name: "Base Sepolia".to_owned(),
            native_currency: NativeCurrency::ether(),
            rpc_urls: vec!["https://sepolia.base.org".to_owned()],
            block_explorer: Some(BlockExplorer {
                name: "Basescan".to_owned(),
                url: "https://sepolia.basescan.org".to_owned(),
            }),
        }
    }
}

/// Static, caller-supplied set of supported chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
}

impl ChainRegistry {
    pub fn new(chains: Vec<ChainDescriptor>) -> Self {
        Self { chains }
    }

    pub fn base() -> Self {
        Self::new(vec![ChainDescriptor::base(), ChainDescriptor::base_sepolia()])
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|chain| chain.id == chain_id)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.chains.iter().map(|chain| chain.id).collect()
    }

    pub fn chains(&self) -> &[ChainDescriptor] {
        &self.chains
    }
}

/// Provider preference as supplied by the caller: a bare option string or a structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceInput {
    Options(String),
    Structured(PreferenceOverrides),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub options: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            options: DEFAULT_PREFERENCE_OPTIONS.to_owned(),
            telemetry: None,
            extra: Map::new(),
        }
    }
}

/// Caller-facing connector settings; chain ids come from the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorParameters {
    pub app_name: String,
    pub app_logo_url: Option<String>,
    pub preference: Option<PreferenceInput>,
}

impl ConnectorParameters {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_logo_url: None,
            preference: None,
        }
    }
}

/// Everything a `ProviderFactory` needs to build one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub app_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_logo_url: Option<String>,
    pub app_chain_ids: Vec<u64>,
    pub preference: Preference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub chain_id: Option<u64>,
    pub is_reconnecting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub accounts: Vec<Address>,
    pub chain_id: u64,
}

/// Caller overrides merged over registry defaults when a chain has to be added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEthereumChainOverrides {
    #[serde(default)]
    pub block_explorer_urls: Option<Vec<String>>,
    #[serde(default)]
    pub chain_name: Option<String>,
    #[serde(default)]
    pub icon_urls: Option<Vec<String>>,
    #[serde(default)]
    pub native_currency: Option<NativeCurrency>,
    #[serde(default)]
    pub rpc_urls: Option<Vec<String>>,
}

/// `wallet_addEthereumChain` wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEthereumChainParameter {
    pub block_explorer_urls: Vec<String>,
    pub chain_id: String,
    pub chain_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_urls: Option<Vec<String>>,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchChainParams {
    pub chain_id: u64,
    pub add_ethereum_chain_parameter: Option<AddEthereumChainOverrides>,
}

impl SwitchChainParams {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            add_ethereum_chain_parameter: None,
        }
    }
}

/// Partial state update; only the fields that changed are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    Change(ChangePayload),
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentNetwork {
    Main,
    Test,
}

impl PaymentNetwork {
    pub fn chain_id(self) -> u64 {
        match self {
            Self::Main => BASE_CHAIN_ID,
            Self::Test => BASE_SEPOLIA_CHAIN_ID,
        }
    }
}

impl FromStr for PaymentNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" | "base" => Ok(Self::Main),
            "test" | "testnet" | "base-sepolia" => Ok(Self::Test),
            other => Err(format!("unknown payment network: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCall {
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
}

impl PaymentCall {
    pub fn new(to: Address, data: Bytes, value: U256) -> Self {
        Self { to, data, value }
    }
}

/// `wallet_sendCalls` request parameters. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub version: String,
    #[serde(with = "crate::encoding::hex_quantity")]
    pub chain_id: u64,
    pub calls: Vec<PaymentCall>,
    #[serde(default)]
    pub capabilities: BTreeMap<String, Value>,
}

impl PaymentRequest {
    pub fn new(chain_id: u64, calls: Vec<PaymentCall>) -> Self {
        Self {
            version: SEND_CALLS_VERSION.to_owned(),
            chain_id,
            calls,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with_capability(mut self, name: impl Into<String>, config: Value) -> Self {
        self.capabilities.insert(name.into(), config);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub transaction_hash: String,
    /// Whatever the wallet put in `capabilities.dataCallback`, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_info_responses: Option<Value>,
}
