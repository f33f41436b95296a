use std::fmt;
use std::sync::Arc;

use crate::domain::{Preference, PreferenceInput, ProviderConfig, DEFAULT_PREFERENCE_OPTIONS};
use crate::error::ConnectorError;
use crate::ports::{ProviderEventKind, ProviderFactory, ProviderListener, WalletProvider};

/// Pure: a bare string becomes `{ options }`, a structured input gets `options` defaulted.
pub fn normalize_preference(input: Option<&PreferenceInput>) -> Preference {
    match input {
        Some(PreferenceInput::Options(options)) => Preference {
            options: options.clone(),
            ..Preference::default()
        },
        Some(PreferenceInput::Structured(overrides)) => Preference {
            options: overrides
                .options
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFERENCE_OPTIONS.to_owned()),
            telemetry: overrides.telemetry,
            extra: overrides.extra.clone(),
        },
        None => Preference::default(),
    }
}

/// At most one listener per event kind. A slot is `Some` iff that listener is on the provider.
#[derive(Default)]
pub struct SubscriptionSet {
    accounts_changed: Option<ProviderListener>,
    chain_changed: Option<ProviderListener>,
    disconnect: Option<ProviderListener>,
}

impl SubscriptionSet {
    fn slot(&self, kind: ProviderEventKind) -> &Option<ProviderListener> {
        match kind {
            ProviderEventKind::AccountsChanged => &self.accounts_changed,
            ProviderEventKind::ChainChanged => &self.chain_changed,
            ProviderEventKind::Disconnect => &self.disconnect,
        }
    }

    fn slot_mut(&mut self, kind: ProviderEventKind) -> &mut Option<ProviderListener> {
        match kind {
            ProviderEventKind::AccountsChanged => &mut self.accounts_changed,
            ProviderEventKind::ChainChanged => &mut self.chain_changed,
            ProviderEventKind::Disconnect => &mut self.disconnect,
        }
    }

    pub fn is_installed(&self, kind: ProviderEventKind) -> bool {
        self.slot(kind).is_some()
    }

    pub fn installed_count(&self) -> usize {
        ProviderEventKind::ALL
            .iter()
            .filter(|kind| self.is_installed(**kind))
            .count()
    }

    /// Returns `false` without touching the provider when the slot is already filled.
    pub fn install(
        &mut self,
        provider: &dyn WalletProvider,
        kind: ProviderEventKind,
        make_listener: impl FnOnce() -> ProviderListener,
    ) -> bool {
        let slot = self.slot_mut(kind);
        if slot.is_some() {
            return false;
        }
        let listener = make_listener();
        provider.on(kind, Arc::clone(&listener));
        *slot = Some(listener);
        true
    }

    pub fn remove(&mut self, provider: &dyn WalletProvider, kind: ProviderEventKind) -> bool {
        match self.slot_mut(kind).take() {
            Some(listener) => {
                provider.remove_listener(kind, &listener);
                true
            }
            None => false,
        }
    }

    pub fn remove_all(&mut self, provider: &dyn WalletProvider) -> usize {
        let mut removed = 0;
        for kind in ProviderEventKind::ALL {
            if self.remove(provider, kind) {
                removed += 1;
            }
        }
        removed
    }
}

impl fmt::Debug for SubscriptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("accounts_changed", &self.accounts_changed.is_some())
            .field("chain_changed", &self.chain_changed.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .finish()
    }
}

/// Lazily constructs and then owns exactly one provider handle.
#[derive(Debug)]
pub struct ProviderSession {
    factory: Arc<dyn ProviderFactory>,
    config: ProviderConfig,
    provider: Option<Arc<dyn WalletProvider>>,
    subscriptions: SubscriptionSet,
}

impl ProviderSession {
    pub fn new(factory: Arc<dyn ProviderFactory>, config: ProviderConfig) -> Self {
        Self {
            factory,
            config,
            provider: None,
            subscriptions: SubscriptionSet::default(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    pub fn is_constructed(&self) -> bool {
        self.provider.is_some()
    }

    /// First call builds the provider; a failed build is not cached, so the next call retries.
    pub async fn provider(&mut self) -> Result<Arc<dyn WalletProvider>, ConnectorError> {
        if let Some(provider) = &self.provider {
            return Ok(Arc::clone(provider));
        }
        tracing::debug!(
            app = %self.config.app_name,
            chains = ?self.config.app_chain_ids,
            "constructing wallet provider"
        );
        let provider = self.factory.create(&self.config).await?;
        self.provider = Some(Arc::clone(&provider));
        Ok(provider)
    }

    pub async fn subscribe(
        &mut self,
        kind: ProviderEventKind,
        make_listener: impl FnOnce() -> ProviderListener,
    ) -> Result<bool, ConnectorError> {
        let provider = self.provider().await?;
        let installed = self
            .subscriptions
            .install(provider.as_ref(), kind, make_listener);
        if installed {
            tracing::debug!(event = %kind, "provider listener installed");
        }
        Ok(installed)
    }

    pub async fn unsubscribe_all(&mut self) -> Result<usize, ConnectorError> {
        let provider = self.provider().await?;
        let removed = self.subscriptions.remove_all(provider.as_ref());
        tracing::debug!(removed, "provider listeners removed");
        Ok(removed)
    }
}
