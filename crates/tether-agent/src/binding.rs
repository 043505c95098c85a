use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use serde_json::Value;
use tether_core::{BindingState, RemoteRef, ServiceAddress, TransportError};
use tokio::sync::Mutex;

/// Everything a caller may read about a binding, published as one unit so
/// the reference and its generation are always seen together.
#[derive(Clone)]
pub struct BindingSnapshot {
    pub state: BindingState,
    pub reference: Option<Arc<dyn RemoteRef>>,
    /// Bumped each time the reference is replaced by a fresh lookup.
    pub generation: u64,
    pub last_probe_ms: Option<u64>,
}

impl fmt::Debug for BindingSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSnapshot")
            .field("state", &self.state)
            .field("endpoint", &self.reference.as_ref().map(|r| r.endpoint()))
            .field("generation", &self.generation)
            .field("last_probe_ms", &self.last_probe_ms)
            .finish()
    }
}

/// A state change of one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub service: String,
    pub from: BindingState,
    pub to: BindingState,
    pub generation: u64,
}

impl Transition {
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// A client's record of one remote service.
///
/// Callers only read it; every state change goes through the
/// reconnection monitor.
pub struct ServiceBinding {
    name: String,
    address: ServiceAddress,
    current: ArcSwap<BindingSnapshot>,
    pub(crate) reconnect_lock: Mutex<()>,
}

impl ServiceBinding {
    fn with_snapshot(address: ServiceAddress, snapshot: BindingSnapshot) -> Self {
        Self {
            name: address.name.clone(),
            address,
            current: ArcSwap::from_pointee(snapshot),
            reconnect_lock: Mutex::new(()),
        }
    }

    pub(crate) fn resolved(address: ServiceAddress, reference: Arc<dyn RemoteRef>) -> Self {
        Self::with_snapshot(
            address,
            BindingSnapshot {
                state: BindingState::Healthy,
                reference: Some(reference),
                generation: 0,
                last_probe_ms: None,
            },
        )
    }

    pub(crate) fn unresolved(address: ServiceAddress) -> Self {
        Self::with_snapshot(
            address,
            BindingSnapshot {
                state: BindingState::Unresolved,
                reference: None,
                generation: 0,
                last_probe_ms: None,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &ServiceAddress {
        &self.address
    }

    pub fn snapshot(&self) -> Arc<BindingSnapshot> {
        self.current.load_full()
    }

    pub fn state(&self) -> BindingState {
        self.current.load().state
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn reference(&self) -> Option<Arc<dyn RemoteRef>> {
        self.current.load().reference.clone()
    }

    /// Invokes `method` on whatever reference is current, even while a
    /// reconnect is in progress.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value, TransportError> {
        match self.reference() {
            Some(reference) => reference.invoke(method, args).await,
            None => Err(TransportError::NotBound(self.address.to_string())),
        }
    }

    fn update<F>(&self, mut f: F) -> Transition
    where
        F: FnMut(&BindingSnapshot) -> BindingSnapshot,
    {
        let mut next = None;
        let previous = self.current.rcu(|current| {
            let snapshot = Arc::new(f(&**current));
            next = Some(snapshot.clone());
            snapshot
        });
        let next = next.unwrap_or_else(|| previous.clone());
        Transition {
            service: self.name.clone(),
            from: previous.state,
            to: next.state,
            generation: next.generation,
        }
    }

    /// Applies a probe of the reference at `generation`. Returns `None`
    /// when that reference has been replaced since the probe started.
    pub(crate) fn record_probe(&self, generation: u64, ok: bool, at_ms: u64) -> Option<Transition> {
        let mut stale = false;
        let transition = self.update(|current| {
            stale = current.generation != generation;
            if stale {
                return current.clone();
            }
            BindingSnapshot {
                state: current.state.after_probe(ok),
                last_probe_ms: Some(at_ms),
                ..current.clone()
            }
        });
        (!stale).then_some(transition)
    }

    pub(crate) fn begin_reconnect(&self) -> Transition {
        self.update(|current| BindingSnapshot {
            state: BindingState::Reconnecting,
            ..current.clone()
        })
    }

    pub(crate) fn complete_reconnect(&self, reference: Arc<dyn RemoteRef>) -> Transition {
        self.update(|current| BindingSnapshot {
            state: current.state.after_lookup(true),
            reference: Some(reference.clone()),
            generation: current.generation + 1,
            last_probe_ms: current.last_probe_ms,
        })
    }

    /// The previous reference, if any, is kept: it may still work.
    pub(crate) fn fail_reconnect(&self) -> Transition {
        self.update(|current| BindingSnapshot {
            state: current.state.after_lookup(false),
            ..current.clone()
        })
    }
}

impl fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("address", &self.address.to_string())
            .field("current", &*self.current.load())
            .finish()
    }
}

/// Bindings keyed by service name, shared between the binder that adds
/// them and the monitor that drives them.
#[derive(Clone, Default)]
pub struct BindingSet {
    inner: Arc<RwLock<BTreeMap<String, Arc<ServiceBinding>>>>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the binding unless one with the same name exists.
    pub(crate) fn insert(&self, binding: ServiceBinding) -> bool {
        let mut inner = self.inner.write();
        if inner.contains_key(binding.name()) {
            return false;
        }
        inner.insert(binding.name().to_string(), Arc::new(binding));
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServiceBinding>> {
        self.inner.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Point-in-time list; bindings added afterwards are not included.
    pub fn all(&self) -> Vec<Arc<ServiceBinding>> {
        self.inner.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
