//! Client side of tether: binds remote services by name and keeps the
//! bindings alive in the background.

pub mod admin;
pub mod binder;
pub mod binding;
pub mod config;
pub mod monitor;

use std::path::Path;
use std::sync::Arc;

use tether_core::Lookup;

pub use binder::ClientBinder;
pub use binding::{BindingSet, BindingSnapshot, ServiceBinding, Transition};
pub use config::{ClientConfig, ConfigError, MonitorSettings};
pub use monitor::{
    DEFAULT_INTERVAL, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_PROBE_TIMEOUT, MonitorConfig,
    MonitorHandle, ReconnectOutcome, ReconnectionMonitor,
};

/// Binds everything declared on `binder` and starts monitoring it.
/// Returns `None` when nothing was bound.
pub async fn activate(binder: &ClientBinder, config: MonitorConfig) -> Option<MonitorHandle> {
    let bindings = binder.bind_all().await;
    if bindings.is_empty() {
        tracing::warn!("no remote services declared, reconnection monitor not started");
        return None;
    }
    Some(ReconnectionMonitor::new(bindings, binder.lookup(), config).spawn())
}

/// Client startup from a config file. A missing file skips the client
/// phase; an unreadable or invalid one is an error.
pub async fn activate_from_path(
    path: impl AsRef<Path>,
    lookup: Arc<dyn Lookup>,
) -> Result<Option<MonitorHandle>, ConfigError> {
    let config = match ClientConfig::load(path) {
        Ok(config) => config,
        Err(ConfigError::Missing(path)) => {
            tracing::warn!(path = %path.display(), "no client config, skipping remote services");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let monitor = config.monitor_config();
    let mut binder = ClientBinder::new(Arc::new(config.catalog()), lookup)
        .with_lookup_timeout(monitor.lookup_timeout);
    for spec in config.remotes {
        binder.declare(spec);
    }
    Ok(activate(&binder, monitor).await)
}
