use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use basepay_core::{ProviderEvent, ProviderEventKind, ProviderListener};

/// Listener table shared by the concrete providers.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<ProviderEventKind, Vec<ProviderListener>>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.lock();
        let counts: HashMap<_, _> = g.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ProviderEventKind, Vec<ProviderListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, kind: ProviderEventKind, listener: ProviderListener) {
        self.lock().entry(kind).or_default().push(listener);
    }

    /// Removes the exact handle (pointer identity). Returns whether it was present.
    pub fn remove(&self, kind: ProviderEventKind, listener: &ProviderListener) -> bool {
        let mut g = self.lock();
        let Some(entries) = g.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|l| !Arc::ptr_eq(l, listener));
        before != entries.len()
    }

    pub fn count(&self, kind: ProviderEventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Calls every listener for the event's kind outside the lock. Returns how many were called.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        let targets: Vec<ProviderListener> = self
            .lock()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for listener in &targets {
            listener(event.clone());
        }
        targets.len()
    }
}
