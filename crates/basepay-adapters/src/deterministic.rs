use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::{keccak256, Address};
use async_trait::async_trait;
use serde_json::{json, Value};

use basepay_core::encoding::{chain_id_to_hex, json_chain_id_to_u64};
use basepay_core::{
    PortError, ProviderEvent, ProviderEventKind, ProviderListener, RpcError, RpcRequest,
    WalletProvider, BASE_CHAIN_ID,
};

use crate::listeners::ListenerRegistry;

pub const DETERMINISTIC_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";

#[derive(Debug)]
struct DeterministicState {
    accounts: Vec<Address>,
    authorized: bool,
    chain_id: u64,
    known_chains: BTreeSet<u64>,
    sent_calls: Vec<Value>,
    injected_failures: HashMap<String, VecDeque<RpcError>>,
}

/// In-process wallet for development runs and tests. Never touches the network.
#[derive(Debug)]
pub struct DeterministicProvider {
    state: Mutex<DeterministicState>,
    listeners: ListenerRegistry,
}

impl Default for DeterministicProvider {
    fn default() -> Self {
        Self::new([BASE_CHAIN_ID])
    }
}

impl DeterministicProvider {
    /// Starts on the first known chain.
    pub fn new(known_chains: impl IntoIterator<Item = u64>) -> Self {
        let known_chains: Vec<u64> = known_chains.into_iter().collect();
        let chain_id = known_chains.first().copied().unwrap_or(BASE_CHAIN_ID);
        Self {
            state: Mutex::new(DeterministicState {
                accounts: vec![DETERMINISTIC_ACCOUNT
                    .parse()
                    .expect("valid built-in deterministic account")],
                authorized: false,
                chain_id,
                known_chains: known_chains.into_iter().chain([chain_id]).collect(),
                sent_calls: Vec::new(),
                injected_failures: HashMap::new(),
            }),
            listeners: ListenerRegistry::default(),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, DeterministicState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    pub fn listener_count(&self, kind: ProviderEventKind) -> usize {
        self.listeners.count(kind)
    }

    /// Every `wallet_sendCalls` parameter object received so far.
    pub fn sent_calls(&self) -> Result<Vec<Value>, PortError> {
        Ok(self.state()?.sent_calls.clone())
    }

    /// The next call to `method` fails with `error` instead of running.
    pub fn debug_fail_next(&self, method: &str, error: RpcError) -> Result<(), PortError> {
        self.state()?
            .injected_failures
            .entry(method.to_owned())
            .or_default()
            .push_back(error);
        Ok(())
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        let payload: Vec<String> = accounts.iter().map(|a| a.to_checksum(None)).collect();
        self.state()?.accounts = accounts;
        self.listeners.emit(ProviderEvent::AccountsChanged(payload));
        Ok(())
    }

    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        {
            let mut g = self.state()?;
            g.chain_id = chain_id;
            g.known_chains.insert(chain_id);
        }
        self.listeners
            .emit(ProviderEvent::ChainChanged(chain_id_to_hex(chain_id)));
        Ok(())
    }

    pub fn debug_inject_disconnect(&self) -> Result<(), PortError> {
        self.state()?.authorized = false;
        self.listeners.emit(ProviderEvent::Disconnect(None));
        Ok(())
    }

    fn account_strings(accounts: &[Address]) -> Value {
        json!(accounts
            .iter()
            .map(|a| a.to_checksum(None))
            .collect::<Vec<_>>())
    }

    fn first_param<'a>(request: &'a RpcRequest) -> Result<&'a Value, PortError> {
        request.params.get(0).ok_or_else(|| {
            PortError::Rpc(RpcError::new(
                -32602,
                format!("{} expects one parameter object", request.method),
            ))
        })
    }

    fn requested_chain(request: &RpcRequest) -> Result<u64, PortError> {
        let raw = Self::first_param(request)?
            .get("chainId")
            .ok_or_else(|| PortError::Rpc(RpcError::new(-32602, "missing chainId")))?;
        json_chain_id_to_u64(raw)
            .map_err(|e| PortError::Rpc(RpcError::new(-32602, e.to_string())))
    }

    /// Moves to `chain_id`; returns the hex id when the chain actually changed.
    fn move_to_chain(&self, chain_id: u64) -> Result<Option<String>, PortError> {
        let mut g = self.state()?;
        if g.chain_id == chain_id {
            return Ok(None);
        }
        g.chain_id = chain_id;
        Ok(Some(chain_id_to_hex(chain_id)))
    }

    fn switch_chain(&self, request: &RpcRequest) -> Result<Value, PortError> {
        let chain_id = Self::requested_chain(request)?;
        if !self.state()?.known_chains.contains(&chain_id) {
            return Err(PortError::Rpc(RpcError::new(
                basepay_core::error::UNRECOGNIZED_CHAIN_CODE,
                format!(
                    "Unrecognized chain ID \"{}\". Try adding the chain using wallet_addEthereumChain first.",
                    chain_id_to_hex(chain_id)
                ),
            )));
        }
        if let Some(hex) = self.move_to_chain(chain_id)? {
            self.listeners.emit(ProviderEvent::ChainChanged(hex));
        }
        Ok(Value::Null)
    }

    fn add_chain(&self, request: &RpcRequest) -> Result<Value, PortError> {
        let chain_id = Self::requested_chain(request)?;
        let has_rpc = Self::first_param(request)?
            .get("rpcUrls")
            .and_then(Value::as_array)
            .is_some_and(|urls| urls.iter().any(|u| u.as_str().is_some_and(|s| !s.is_empty())));
        if !has_rpc {
            return Err(PortError::Rpc(RpcError::new(
                -32602,
                "rpcUrls must contain at least one url",
            )));
        }
        self.state()?.known_chains.insert(chain_id);
        tracing::debug!(chain_id, "deterministic wallet added chain");
        if let Some(hex) = self.move_to_chain(chain_id)? {
            self.listeners.emit(ProviderEvent::ChainChanged(hex));
        }
        Ok(Value::Null)
    }

    fn send_calls(&self, request: &RpcRequest) -> Result<Value, PortError> {
        let params = Self::first_param(request)?.clone();
        let canonical = serde_json::to_vec(&params)
            .map_err(|e| PortError::Validation(format!("sendCalls params not serializable: {e}")))?;
        let hash = keccak256(canonical);
        self.state()?.sent_calls.push(params);
        Ok(json!(hash.to_string()))
    }
}

#[async_trait]
impl WalletProvider for DeterministicProvider {
    async fn request(&self, request: RpcRequest) -> Result<Value, PortError> {
        tracing::debug!(method = %request.method, "deterministic provider request");
        if let Some(err) = self
            .state()?
            .injected_failures
            .get_mut(&request.method)
            .and_then(VecDeque::pop_front)
        {
            return Err(PortError::Rpc(err));
        }

        match request.method.as_str() {
            "eth_requestAccounts" => {
                let mut g = self.state()?;
                g.authorized = true;
                Ok(Self::account_strings(&g.accounts))
            }
            "eth_accounts" => {
                let g = self.state()?;
                if g.authorized {
                    Ok(Self::account_strings(&g.accounts))
                } else {
                    Ok(json!([]))
                }
            }
            "eth_chainId" => Ok(json!(chain_id_to_hex(self.state()?.chain_id))),
            "wallet_switchEthereumChain" => self.switch_chain(&request),
            "wallet_addEthereumChain" => self.add_chain(&request),
            "wallet_sendCalls" => self.send_calls(&request),
            other => Err(PortError::Rpc(RpcError::new(
                basepay_core::error::UNSUPPORTED_METHOD_CODE,
                format!("method {other} is not supported by the deterministic wallet"),
            ))),
        }
    }

    fn on(&self, event: ProviderEventKind, listener: ProviderListener) {
        self.listeners.add(event, listener);
    }

    fn remove_listener(&self, event: ProviderEventKind, listener: &ProviderListener) {
        self.listeners.remove(event, listener);
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        self.state()?.authorized = false;
        tracing::debug!("deterministic provider disconnected");
        Ok(())
    }
}
