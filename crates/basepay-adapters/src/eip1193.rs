use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use basepay_core::{
    PortError, ProviderConfig, ProviderEvent, ProviderEventKind, ProviderFactory,
    ProviderListener, RpcError, RpcRequest, WalletProvider,
};

use crate::deterministic::DeterministicProvider;
use crate::listeners::ListenerRegistry;
use crate::ConnectorConfig;

/// How much of a non-JSON error page ends up in the transport error.
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, Default)]
struct Observed {
    accounts: Option<Vec<String>>,
    chain_id: Option<String>,
}

/// EIP-1193 provider that forwards every request as JSON-RPC over HTTP.
///
/// A proxy cannot push notifications, so `accountsChanged` and `chainChanged` are raised
/// locally whenever an account or chain read differs from the previous one.
#[derive(Debug)]
pub struct Eip1193ProxyProvider {
    base_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
    observed: Mutex<Observed>,
    listeners: ListenerRegistry,
}

impl Eip1193ProxyProvider {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            next_id: AtomicU64::new(1),
            observed: Mutex::new(Observed::default()),
            listeners: ListenerRegistry::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn listener_count(&self, kind: ProviderEventKind) -> usize {
        self.listeners.count(kind)
    }

    fn observed(&self) -> Result<MutexGuard<'_, Observed>, PortError> {
        self.observed
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, PortError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::debug!(id, method, url = %self.base_url, "eip1193 proxy request");

        let response = self
            .client
            .post(&self.base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Transport(format!("eip1193 proxy body read failed: {e}")))?;
        let body: Value = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                let excerpt: String = text.chars().take(ERROR_BODY_EXCERPT).collect();
                return Err(PortError::Transport(format!(
                    "eip1193 proxy status {status}: {excerpt}"
                )));
            }
            Err(e) => {
                return Err(PortError::Transport(format!(
                    "eip1193 proxy json decode failed: {e}"
                )))
            }
        };

        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            let rpc: RpcError = serde_json::from_value(err.clone()).map_err(|e| {
                PortError::Transport(format!("eip1193 proxy returned malformed error {err}: {e}"))
            })?;
            return Err(PortError::Rpc(rpc));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "eip1193 proxy status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| PortError::Transport("eip1193 proxy missing result".to_owned()))
    }

    /// Records what a read returned and emits an event when it changed since the last read.
    fn observe(&self, method: &str, result: &Value) -> Result<(), PortError> {
        let event = match method {
            "eth_accounts" | "eth_requestAccounts" => {
                let Some(accounts) = result.as_array().map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_ascii_lowercase)
                        .collect::<Vec<_>>()
                }) else {
                    return Ok(());
                };
                let mut g = self.observed()?;
                let previous = g.accounts.replace(accounts.clone());
                previous
                    .filter(|prev| *prev != accounts)
                    .map(|_| ProviderEvent::AccountsChanged(accounts))
            }
            "eth_chainId" => {
                let Some(chain_id) = result.as_str().map(str::to_ascii_lowercase) else {
                    return Ok(());
                };
                let mut g = self.observed()?;
                let previous = g.chain_id.replace(chain_id.clone());
                previous
                    .filter(|prev| *prev != chain_id)
                    .map(|_| ProviderEvent::ChainChanged(chain_id))
            }
            _ => None,
        };
        if let Some(event) = event {
            tracing::debug!(event = %event.kind(), "eip1193 proxy observed change");
            self.listeners.emit(event);
        }
        Ok(())
    }
}

#[async_trait]
impl WalletProvider for Eip1193ProxyProvider {
    async fn request(&self, request: RpcRequest) -> Result<Value, PortError> {
        let result = self.call(&request.method, request.params).await?;
        self.observe(&request.method, &result)?;
        Ok(result)
    }

    fn on(&self, event: ProviderEventKind, listener: ProviderListener) {
        self.listeners.add(event, listener);
    }

    fn remove_listener(&self, event: ProviderEventKind, listener: &ProviderListener) {
        self.listeners.remove(event, listener);
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        *self.observed()? = Observed::default();
        tracing::debug!(url = %self.base_url, "eip1193 proxy session released");
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    Proxy(ProxyRuntime),
}

/// Builds providers according to the configured runtime.
///
/// A configured proxy URL always wins. Without one, production refuses to build anything
/// and development falls back to the in-process deterministic wallet.
#[derive(Debug, Clone)]
pub struct Eip1193ProviderFactory {
    mode: ProviderMode,
}

impl Default for Eip1193ProviderFactory {
    fn default() -> Self {
        Self::with_config(&ConnectorConfig::from_env())
    }
}

impl Eip1193ProviderFactory {
    pub fn with_config(config: &ConnectorConfig) -> Self {
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            let timeout = Duration::from_millis(config.request_timeout_ms);
            match reqwest::Client::builder().timeout(timeout).build() {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        tracing::warn!(error = %e, "proxy client unavailable; using deterministic wallet");
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };
        Self { mode }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ProviderMode::Disabled(_) => "disabled",
            ProviderMode::Deterministic => "deterministic",
            ProviderMode::Proxy(_) => "proxy",
        }
    }
}

#[async_trait]
impl ProviderFactory for Eip1193ProviderFactory {
    async fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn WalletProvider>, PortError> {
        tracing::debug!(mode = self.mode_name(), app = %config.app_name, "creating provider");
        match &self.mode {
            ProviderMode::Disabled(reason) => Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic => Ok(Arc::new(DeterministicProvider::new(
                config.app_chain_ids.iter().copied(),
            ))),
            ProviderMode::Proxy(proxy) => Ok(Arc::new(Eip1193ProxyProvider::new(
                proxy.base_url.clone(),
                proxy.client.clone(),
            ))),
        }
    }
}
