use std::fmt;

use serde::{Deserialize, Serialize};

/// Health of a client binding as tracked by the reconnection monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingState {
    /// Declared but never successfully looked up.
    Unresolved,
    /// Reference present and the last probe or lookup succeeded.
    Healthy,
    /// Reference present, the most recent probe failed once.
    Suspect,
    /// A fresh lookup is in progress.
    Reconnecting,
    /// The last fresh lookup failed. Any previous reference is kept.
    Unavailable,
}

impl BindingState {
    /// State after a liveness probe. Only bindings holding a reference are
    /// probed, and never while a lookup is in flight.
    pub fn after_probe(self, ok: bool) -> BindingState {
        match (self, ok) {
            (BindingState::Reconnecting, _) => BindingState::Reconnecting,
            (_, true) => BindingState::Healthy,
            (BindingState::Healthy, false) => BindingState::Suspect,
            (
                BindingState::Suspect | BindingState::Unavailable | BindingState::Unresolved,
                false,
            ) => BindingState::Reconnecting,
        }
    }

    /// State after a fresh lookup completes.
    pub fn after_lookup(self, ok: bool) -> BindingState {
        if ok {
            BindingState::Healthy
        } else {
            BindingState::Unavailable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BindingState::Unresolved => "unresolved",
            BindingState::Healthy => "healthy",
            BindingState::Suspect => "suspect",
            BindingState::Reconnecting => "reconnecting",
            BindingState::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::BindingState::*;

    #[test]
    fn healthy_degrades_through_suspect() {
        assert_eq!(Healthy.after_probe(false), Suspect);
        assert_eq!(Suspect.after_probe(false), Reconnecting);
    }

    #[test]
    fn successful_probe_restores_health() {
        assert_eq!(Suspect.after_probe(true), Healthy);
        assert_eq!(Unavailable.after_probe(true), Healthy);
        assert_eq!(Healthy.after_probe(true), Healthy);
    }

    #[test]
    fn unavailable_retries_on_failed_probe() {
        assert_eq!(Unavailable.after_probe(false), Reconnecting);
    }

    #[test]
    fn reconnecting_ignores_probes() {
        assert_eq!(Reconnecting.after_probe(true), Reconnecting);
        assert_eq!(Reconnecting.after_probe(false), Reconnecting);
    }

    #[test]
    fn lookup_outcome() {
        assert_eq!(Reconnecting.after_lookup(true), Healthy);
        assert_eq!(Reconnecting.after_lookup(false), Unavailable);
    }
}
