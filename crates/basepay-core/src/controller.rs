use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::domain::{
    AddEthereumChainOverrides, AddEthereumChainParameter, ChainDescriptor, ChainRegistry,
    ChangePayload, ConnectParams, Connection, ConnectorEvent, ConnectorParameters,
    ProviderConfig, SwitchChainParams,
};
use crate::encoding::{
    chain_id_to_hex, json_chain_id_to_u64, normalize_address, normalize_addresses,
    parse_chain_id,
};
use crate::error::{ConnectorError, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_REQUEST_CODE};
use crate::ports::{
    EventSink, PortError, ProviderEvent, ProviderEventKind, ProviderFactory, ProviderListener,
    RpcRequest,
};
use crate::session::{normalize_preference, ProviderSession};
use crate::state_machine::ConnectionState;

/// Connect / disconnect / switch-chain state machine over one lazily built provider.
///
/// Provider listeners only forward events into a queue owned by the controller; call
/// [`ConnectionController::pump_events`] or [`ConnectionController::next_event`] to route
/// them to the `on_*` handlers.
pub struct ConnectionController {
    session: ProviderSession,
    registry: ChainRegistry,
    sink: Arc<dyn EventSink>,
    events_tx: UnboundedSender<ProviderEvent>,
    events_rx: UnboundedReceiver<ProviderEvent>,
}

impl fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionController")
            .field("session", &self.session)
            .field("chains", &self.registry.ids())
            .finish_non_exhaustive()
    }
}

impl ConnectionController {
    pub const ID: &'static str = "baseAccountSDK";
    pub const NAME: &'static str = "Base Account";
    /// Reverse-DNS identifier wallets announce under EIP-6963.
    pub const RDNS: &'static str = "app.base.account";
    pub const CONNECTOR_TYPE: &'static str = "baseAccount";

    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        parameters: ConnectorParameters,
        registry: ChainRegistry,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let config = ProviderConfig {
            app_name: parameters.app_name,
            app_logo_url: parameters.app_logo_url,
            app_chain_ids: registry.ids(),
            preference: normalize_preference(parameters.preference.as_ref()),
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session: ProviderSession::new(factory, config),
            registry,
            sink,
            events_tx,
            events_rx,
        }
    }

    pub fn session(&self) -> &ProviderSession {
        &self.session
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub async fn connect(&mut self, params: ConnectParams) -> Result<Connection, ConnectorError> {
        tracing::debug!(
            connector = Self::ID,
            requested_chain = ?params.chain_id,
            reconnecting = params.is_reconnecting,
            "connecting wallet"
        );
        let connection = self
            .connect_inner(&params)
            .await
            .map_err(ConnectorError::classify_rejection)?;
        tracing::info!(
            accounts = connection.accounts.len(),
            chain_id = connection.chain_id,
            "wallet connected"
        );
        Ok(connection)
    }

    async fn connect_inner(
        &mut self,
        params: &ConnectParams,
    ) -> Result<Connection, ConnectorError> {
        let provider = self.session.provider().await?;
        let raw = provider
            .request(RpcRequest::without_params("eth_requestAccounts"))
            .await?;
        let accounts = normalize_addresses(&raw)?;
        if accounts.is_empty() {
            return Err(ConnectorError::EmptyAccounts);
        }

        self.install_listeners().await?;

        let mut chain_id = self.get_chain_id().await?;
        if let Some(target) = params.chain_id.filter(|target| *target != chain_id) {
            match self.switch_chain(SwitchChainParams::new(target)).await {
                Ok(chain) => chain_id = chain.id,
                Err(err) if err.is_user_rejection() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        target_chain = target,
                        current_chain = chain_id,
                        error = %err,
                        "chain switch during connect failed; staying on current chain"
                    );
                }
            }
        }

        Ok(Connection { accounts, chain_id })
    }

    async fn install_listeners(&mut self) -> Result<(), ConnectorError> {
        for kind in ProviderEventKind::ALL {
            let tx = self.events_tx.clone();
            self.session.subscribe(kind, move || forward_to(tx)).await?;
        }
        Ok(())
    }

    /// Emits `Disconnect` first, then tears down listeners and asks the provider to disconnect.
    pub async fn disconnect(&mut self) -> Result<(), ConnectorError> {
        self.sink.emit(ConnectorEvent::Disconnect);
        let provider = self.session.provider().await?;
        self.session.unsubscribe_all().await?;
        provider.disconnect().await?;
        tracing::info!("wallet disconnected");
        Ok(())
    }

    pub async fn get_accounts(&mut self) -> Result<Vec<Address>, ConnectorError> {
        let provider = self.session.provider().await?;
        let raw = provider
            .request(RpcRequest::without_params("eth_accounts"))
            .await?;
        normalize_addresses(&raw)
    }

    pub async fn get_chain_id(&mut self) -> Result<u64, ConnectorError> {
        let provider = self.session.provider().await?;
        let raw = provider
            .request(RpcRequest::without_params("eth_chainId"))
            .await?;
        json_chain_id_to_u64(&raw)
    }

    /// Liveness check; never fails.
    pub async fn is_authorized(&mut self) -> bool {
        match self.get_accounts().await {
            Ok(accounts) => !accounts.is_empty(),
            Err(err) => {
                tracing::debug!(error = %err, "authorization check failed");
                false
            }
        }
    }

    pub async fn state(&mut self) -> Result<ConnectionState, ConnectorError> {
        let accounts = self.get_accounts().await?;
        let chain_id = self.get_chain_id().await?;
        Ok(ConnectionState::derive(accounts, chain_id))
    }

    pub async fn switch_chain(
        &mut self,
        params: SwitchChainParams,
    ) -> Result<ChainDescriptor, ConnectorError> {
        let chain = self
            .registry
            .get(params.chain_id)
            .cloned()
            .ok_or(ConnectorError::ChainNotConfigured(params.chain_id))?;
        let provider = self.session.provider().await?;

        let switch = provider
            .request(RpcRequest::new(
                "wallet_switchEthereumChain",
                json!([{ "chainId": chain_id_to_hex(chain.id) }]),
            ))
            .await;

        match switch {
            Ok(_) => Ok(chain),
            Err(err) if err.code() == Some(UNRECOGNIZED_CHAIN_CODE) => {
                let parameter =
                    add_chain_parameter(&chain, params.add_ethereum_chain_parameter.as_ref());
                tracing::debug!(chain_id = chain.id, "chain unknown to wallet; adding it");
                let payload = serde_json::to_value(&parameter).map_err(|e| {
                    ConnectorError::user_rejected(PortError::Validation(format!(
                        "add-chain payload serialization failed: {e}"
                    )))
                })?;
                provider
                    .request(RpcRequest::new("wallet_addEthereumChain", json!([payload])))
                    .await
                    .map_err(ConnectorError::user_rejected)?;
                Ok(chain)
            }
            Err(err) if err.code() == Some(USER_REJECTED_REQUEST_CODE) => {
                Err(ConnectorError::user_rejected(err))
            }
            Err(err) => Err(ConnectorError::SwitchChainFailed { source: err }),
        }
    }

    pub async fn on_accounts_changed(
        &mut self,
        accounts: Vec<String>,
    ) -> Result<(), ConnectorError> {
        if accounts.is_empty() {
            return self.on_disconnect().await;
        }
        let accounts = accounts
            .iter()
            .map(|raw| normalize_address(raw))
            .collect::<Result<Vec<_>, _>>()?;
        self.sink.emit(ConnectorEvent::Change(ChangePayload {
            accounts: Some(accounts),
            chain_id: None,
        }));
        Ok(())
    }

    pub fn on_chain_changed(&self, raw_chain_id: &str) -> Result<(), ConnectorError> {
        let chain_id = parse_chain_id(raw_chain_id)?;
        self.sink.emit(ConnectorEvent::Change(ChangePayload {
            accounts: None,
            chain_id: Some(chain_id),
        }));
        Ok(())
    }

    /// Provider-originated disconnect: same teardown as `disconnect`, minus `provider.disconnect()`.
    pub async fn on_disconnect(&mut self) -> Result<(), ConnectorError> {
        self.sink.emit(ConnectorEvent::Disconnect);
        self.session.unsubscribe_all().await?;
        Ok(())
    }

    /// Routes every queued provider event without waiting. Returns how many were handled.
    pub async fn pump_events(&mut self) -> Result<usize, ConnectorError> {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.dispatch(event).await? {
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Waits for the next provider event that still has an installed listener and routes it.
    pub async fn next_event(&mut self) -> Result<Option<ProviderEventKind>, ConnectorError> {
        while let Some(event) = self.events_rx.recv().await {
            let kind = event.kind();
            if self.dispatch(event).await? {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    async fn dispatch(&mut self, event: ProviderEvent) -> Result<bool, ConnectorError> {
        let kind = event.kind();
        if !self.session.subscriptions().is_installed(kind) {
            tracing::debug!(event = %kind, "dropping event queued before teardown");
            return Ok(false);
        }
        match event {
            ProviderEvent::AccountsChanged(accounts) => self.on_accounts_changed(accounts).await?,
            ProviderEvent::ChainChanged(raw) => self.on_chain_changed(&raw)?,
            ProviderEvent::Disconnect(reason) => {
                if let Some(reason) = reason {
                    tracing::debug!(%reason, "provider disconnected");
                }
                self.on_disconnect().await?;
            }
        }
        Ok(true)
    }
}

fn forward_to(tx: UnboundedSender<ProviderEvent>) -> ProviderListener {
    Arc::new(move |event: ProviderEvent| {
        if tx.send(event).is_err() {
            tracing::trace!("provider event dropped: controller gone");
        }
    })
}

/// Caller overrides win; otherwise registry defaults, with `[]` / `[""]` when neither has URLs.
pub fn add_chain_parameter(
    chain: &ChainDescriptor,
    overrides: Option<&AddEthereumChainOverrides>,
) -> AddEthereumChainParameter {
    let block_explorer_urls = match overrides.and_then(|o| o.block_explorer_urls.clone()) {
        Some(urls) => urls,
        None => chain
            .block_explorer
            .as_ref()
            .filter(|explorer| !explorer.url.is_empty())
            .map(|explorer| vec![explorer.url.clone()])
            .unwrap_or_default(),
    };
    let rpc_urls = match overrides.and_then(|o| o.rpc_urls.clone()) {
        Some(urls) if !urls.is_empty() => urls,
        _ => vec![chain.rpc_urls.first().cloned().unwrap_or_default()],
    };
    AddEthereumChainParameter {
        block_explorer_urls,
        chain_id: chain_id_to_hex(chain.id),
        chain_name: overrides
            .and_then(|o| o.chain_name.clone())
            .unwrap_or_else(|| chain.name.clone()),
        icon_urls: overrides.and_then(|o| o.icon_urls.clone()),
        native_currency: overrides
            .and_then(|o| o.native_currency.clone())
            .unwrap_or_else(|| chain.native_currency.clone()),
        rpc_urls,
    }
}
