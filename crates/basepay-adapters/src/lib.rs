pub mod config;
pub mod deterministic;
pub mod eip1193;
pub mod listeners;
pub mod sink;

pub use config::{ConfigError, ConnectorConfig, RuntimeProfile};
pub use deterministic::{DeterministicProvider, DETERMINISTIC_ACCOUNT};
pub use eip1193::{Eip1193ProviderFactory, Eip1193ProxyProvider};
pub use listeners::ListenerRegistry;
pub use sink::TracingEventSink;
