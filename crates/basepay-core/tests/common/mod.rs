#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use basepay_core::{
    ChainRegistry, ConnectionController, ConnectorEvent, ConnectorParameters, EventSink,
    PortError, ProviderConfig, ProviderEvent, ProviderEventKind, ProviderFactory,
    ProviderListener, RpcError, RpcRequest, WalletProvider,
};

pub const ACCOUNT_A_LOWER: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
pub const ACCOUNT_A_CHECKSUM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const ACCOUNT_B_LOWER: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";
pub const ACCOUNT_B_CHECKSUM: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

#[derive(Default)]
struct FakeState {
    scripted: HashMap<String, VecDeque<Result<Value, PortError>>>,
    defaults: HashMap<String, Value>,
    requests: Vec<RpcRequest>,
    listeners: Vec<(ProviderEventKind, ProviderListener)>,
    on_calls: HashMap<ProviderEventKind, usize>,
    remove_calls: HashMap<ProviderEventKind, usize>,
    disconnect_calls: usize,
    disconnect_error: Option<String>,
}

/// Scripted provider that records every interaction.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
}

impl fmt::Debug for FakeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeProvider").finish_non_exhaustive()
    }
}

impl FakeProvider {
    /// Answers account and chain reads like an unlocked wallet on Base.
    pub fn wallet() -> Self {
        let provider = Self::default();
        provider.set_default("eth_requestAccounts", json!([ACCOUNT_A_LOWER]));
        provider.set_default("eth_accounts", json!([ACCOUNT_A_LOWER]));
        provider.set_default("eth_chainId", json!("0x2105"));
        provider
    }

    pub fn set_default(&self, method: &str, value: Value) {
        self.state
            .lock()
            .expect("fake state")
            .defaults
            .insert(method.to_owned(), value);
    }

    pub fn push_response(&self, method: &str, response: Result<Value, PortError>) {
        self.state
            .lock()
            .expect("fake state")
            .scripted
            .entry(method.to_owned())
            .or_default()
            .push_back(response);
    }

    pub fn push_rpc_error(&self, method: &str, code: i64, message: &str) {
        self.push_response(method, Err(PortError::Rpc(RpcError::new(code, message))));
    }

    pub fn fail_disconnect(&self, message: &str) {
        self.state.lock().expect("fake state").disconnect_error = Some(message.to_owned());
    }

    pub fn requests(&self) -> Vec<RpcRequest> {
        self.state.lock().expect("fake state").requests.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    pub fn on_count(&self, kind: ProviderEventKind) -> usize {
        self.state
            .lock()
            .expect("fake state")
            .on_calls
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn remove_count(&self, kind: ProviderEventKind) -> usize {
        self.state
            .lock()
            .expect("fake state")
            .remove_calls
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn listener_count(&self, kind: ProviderEventKind) -> usize {
        self.state
            .lock()
            .expect("fake state")
            .listeners
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state.lock().expect("fake state").disconnect_calls
    }

    /// Delivers an event to every listener registered for its kind.
    pub fn emit(&self, event: ProviderEvent) {
        let kind = event.kind();
        let listeners: Vec<ProviderListener> = self
            .state
            .lock()
            .expect("fake state")
            .listeners
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    async fn request(&self, request: RpcRequest) -> Result<Value, PortError> {
        let mut g = self.state.lock().expect("fake state");
        g.requests.push(request.clone());
        if let Some(response) = g
            .scripted
            .get_mut(&request.method)
            .and_then(VecDeque::pop_front)
        {
            return response;
        }
        g.defaults.get(&request.method).cloned().ok_or_else(|| {
            PortError::Rpc(RpcError::new(
                4200,
                format!("unsupported method {}", request.method),
            ))
        })
    }

    fn on(&self, event: ProviderEventKind, listener: ProviderListener) {
        let mut g = self.state.lock().expect("fake state");
        *g.on_calls.entry(event).or_default() += 1;
        g.listeners.push((event, listener));
    }

    fn remove_listener(&self, event: ProviderEventKind, listener: &ProviderListener) {
        let mut g = self.state.lock().expect("fake state");
        *g.remove_calls.entry(event).or_default() += 1;
        g.listeners
            .retain(|(k, l)| !(*k == event && Arc::ptr_eq(l, listener)));
    }

    async fn disconnect(&self) -> Result<(), PortError> {
        let mut g = self.state.lock().expect("fake state");
        g.disconnect_calls += 1;
        match &g.disconnect_error {
            Some(message) => Err(PortError::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

type BuildFn = Box<dyn Fn() -> Arc<FakeProvider> + Send + Sync>;

/// Hands out fake providers and records what it was asked to build.
pub struct FakeFactory {
    build: BuildFn,
    created: Mutex<Vec<Arc<FakeProvider>>>,
    configs: Mutex<Vec<ProviderConfig>>,
    failures_remaining: AtomicUsize,
}

impl fmt::Debug for FakeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeFactory")
            .field("created", &self.create_count())
            .finish_non_exhaustive()
    }
}

impl FakeFactory {
    /// Every construction returns the same provider.
    pub fn shared(provider: Arc<FakeProvider>) -> Self {
        Self::with_builder(Box::new(move || Arc::clone(&provider)))
    }

    /// Every construction returns a new provider from `build`.
    pub fn fresh(build: impl Fn() -> FakeProvider + Send + Sync + 'static) -> Self {
        Self::with_builder(Box::new(move || Arc::new(build())))
    }

    fn with_builder(build: BuildFn) -> Self {
        Self {
            build,
            created: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().expect("created").len()
    }

    pub fn created(&self) -> Vec<Arc<FakeProvider>> {
        self.created.lock().expect("created").clone()
    }

    pub fn configs(&self) -> Vec<ProviderConfig> {
        self.configs.lock().expect("configs").clone()
    }
}

#[async_trait]
impl ProviderFactory for FakeFactory {
    async fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn WalletProvider>, PortError> {
        self.configs.lock().expect("configs").push(config.clone());
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(PortError::Transport("wallet sdk failed to load".to_owned()));
        }
        let provider = (self.build)();
        self.created
            .lock()
            .expect("created")
            .push(Arc::clone(&provider));
        Ok(provider)
    }
}

pub fn channel_sink() -> (Arc<dyn EventSink>, UnboundedReceiver<ConnectorEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(tx), rx)
}

pub fn drain(rx: &mut UnboundedReceiver<ConnectorEvent>) -> Vec<ConnectorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub struct Harness {
    pub controller: ConnectionController,
    pub provider: Arc<FakeProvider>,
    pub factory: Arc<FakeFactory>,
    pub events: UnboundedReceiver<ConnectorEvent>,
}

pub fn harness_with(provider: FakeProvider) -> Harness {
    let provider = Arc::new(provider);
    let factory = Arc::new(FakeFactory::shared(Arc::clone(&provider)));
    let (sink, events) = channel_sink();
    let controller = ConnectionController::new(
        Arc::clone(&factory) as Arc<dyn ProviderFactory>,
        ConnectorParameters::new("Visitor Counter"),
        ChainRegistry::base(),
        sink,
    );
    Harness {
        controller,
        provider,
        factory,
        events,
    }
}

pub fn harness() -> Harness {
    harness_with(FakeProvider::wallet())
}
