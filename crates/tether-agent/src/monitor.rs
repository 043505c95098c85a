use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tether_core::{BindingState, Clock, Lookup, RemoteRef, SystemClock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::binder::lookup_with_timeout;
use crate::binding::{BindingSet, ServiceBinding, Transition};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub lookup_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Reconnected { generation: u64 },
    Failed,
    /// Another reconnect of the same binding was already running.
    InFlight,
}

/// Probes every binding on a fixed interval and replaces references that
/// stop answering.
pub struct ReconnectionMonitor {
    bindings: BindingSet,
    lookup: Arc<dyn Lookup>,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Transition>,
}

impl ReconnectionMonitor {
    pub fn new(bindings: BindingSet, lookup: Arc<dyn Lookup>, config: MonitorConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            bindings,
            lookup,
            config,
            clock: Arc::new(SystemClock),
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Receives every state change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.events.subscribe()
    }

    /// One pass over every binding, all checked concurrently.
    pub async fn run_cycle(&self) {
        let bindings = self.bindings.all();
        tracing::debug!(bindings = bindings.len(), "monitor cycle");
        join_all(bindings.iter().map(|binding| self.check(binding))).await;
    }

    async fn check(&self, binding: &ServiceBinding) {
        let snapshot = binding.snapshot();
        match (snapshot.state, &snapshot.reference) {
            // a reconnect abandoned mid-lookup leaves the state behind with
            // the lock free; a live one answers InFlight
            (BindingState::Reconnecting, _) => {
                self.reconnect(binding).await;
            }
            (_, Some(reference)) => {
                let ok = self.probe(binding, reference.as_ref()).await;
                let now = self.clock.now_millis();
                let Some(transition) = binding.record_probe(snapshot.generation, ok, now) else {
                    tracing::debug!(service = %binding.name(), "reference replaced during probe");
                    return;
                };
                self.publish(&transition);
                if transition.to == BindingState::Reconnecting {
                    self.reconnect(binding).await;
                }
            }
            (_, None) => {
                self.reconnect(binding).await;
            }
        }
    }

    async fn probe(&self, binding: &ServiceBinding, reference: &dyn RemoteRef) -> bool {
        let error = match tokio::time::timeout(self.config.probe_timeout, reference.ping()).await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no reply within {:?}", self.config.probe_timeout),
        };
        tracing::warn!(service = %binding.name(), error = %error, "liveness probe failed");
        metrics::counter!("tether_probe_failures_total", "service" => binding.name().to_string())
            .increment(1);
        false
    }

    /// Looks the binding's address up again and publishes the new
    /// reference. At most one reconnect per binding runs at a time.
    pub async fn reconnect(&self, binding: &ServiceBinding) -> ReconnectOutcome {
        let Ok(_guard) = binding.reconnect_lock.try_lock() else {
            tracing::debug!(service = %binding.name(), "reconnect already in flight");
            return ReconnectOutcome::InFlight;
        };

        self.publish(&binding.begin_reconnect());
        let timeout = self.config.lookup_timeout;
        let result = lookup_with_timeout(self.lookup.as_ref(), binding.address(), timeout).await;

        match result {
            Ok(reference) => {
                let transition = binding.complete_reconnect(reference);
                tracing::info!(
                    service = %binding.name(),
                    address = %binding.address(),
                    generation = transition.generation,
                    "reconnected remote service"
                );
                metrics::counter!("tether_reconnects_total").increment(1);
                self.publish(&transition);
                ReconnectOutcome::Reconnected {
                    generation: transition.generation,
                }
            }
            Err(e) => {
                let transition = binding.fail_reconnect();
                tracing::warn!(
                    service = %binding.name(),
                    address = %binding.address(),
                    error = %e,
                    "reconnect failed, keeping previous reference"
                );
                metrics::counter!("tether_reconnect_failures_total").increment(1);
                self.publish(&transition);
                ReconnectOutcome::Failed
            }
        }
    }

    fn publish(&self, transition: &Transition) {
        if !transition.is_change() {
            return;
        }
        tracing::debug!(
            service = %transition.service,
            from = %transition.from,
            to = %transition.to,
            generation = transition.generation,
            "binding state changed"
        );
        // no subscribers is fine
        let _ = self.events.send(transition.clone());
    }

    /// Runs the monitor loop on a background task.
    pub fn spawn(self) -> MonitorHandle {
        let monitor = Arc::new(self);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            async move {
                tracing::info!(
                    bindings = monitor.bindings.len(),
                    interval_ms = monitor.config.interval.as_millis() as u64,
                    "reconnection monitor started"
                );
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(monitor.config.interval) => {}
                    }
                    // a started cycle always runs to completion
                    monitor.run_cycle().await;
                }
                tracing::info!("reconnection monitor stopped");
            }
        });

        MonitorHandle {
            monitor,
            cancel,
            task,
        }
    }
}

pub struct MonitorHandle {
    monitor: Arc<ReconnectionMonitor>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn bindings(&self) -> &BindingSet {
        self.monitor.bindings()
    }

    pub fn monitor(&self) -> &Arc<ReconnectionMonitor> {
        &self.monitor
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.monitor.subscribe()
    }

    /// Lets the current cycle finish, then stops the loop.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "reconnection monitor task failed");
        }
    }
}
