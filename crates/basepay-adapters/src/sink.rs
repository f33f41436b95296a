use basepay_core::{ConnectorEvent, EventSink};

/// Event sink that only logs. Used where nothing consumes connector events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: ConnectorEvent) {
        match event {
            ConnectorEvent::Change(change) => tracing::info!(
                accounts = ?change.accounts,
                chain_id = ?change.chain_id,
                "connector state changed"
            ),
            ConnectorEvent::Disconnect => tracing::info!("connector disconnected"),
        }
    }
}
