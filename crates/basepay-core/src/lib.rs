pub mod controller;
pub mod domain;
pub mod encoding;
pub mod error;
pub mod payment;
pub mod ports;
pub mod session;
pub mod state_machine;

pub use controller::{add_chain_parameter, ConnectionController};
pub use domain::{
    AddEthereumChainOverrides, AddEthereumChainParameter, BlockExplorer, ChainDescriptor,
    ChainRegistry, ChangePayload, ConnectParams, Connection, ConnectorEvent, ConnectorParameters,
    NativeCurrency, PaymentCall, PaymentNetwork, PaymentRequest, PaymentResult, Preference,
    PreferenceInput, PreferenceOverrides, ProviderConfig, SwitchChainParams, BASE_CHAIN_ID,
    BASE_SEPOLIA_CHAIN_ID,
};
pub use error::ConnectorError;
pub use payment::{execute_payment, normalize_payment_response, PaymentExecutor};
pub use ports::{
    EventSink, PortError, ProviderEvent, ProviderEventKind, ProviderFactory, ProviderListener,
    RpcError, RpcRequest, WalletProvider,
};
pub use session::{normalize_preference, ProviderSession, SubscriptionSet};
pub use state_machine::ConnectionState;
