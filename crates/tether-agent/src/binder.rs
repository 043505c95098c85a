use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tether_core::{
    InterfaceCatalog, Lookup, RemoteRef, RemoteServiceSpec, ServiceAddress, TransportError,
};

use crate::binding::{BindingSet, ServiceBinding};
use crate::monitor::DEFAULT_LOOKUP_TIMEOUT;

/// Resolves declared remote services into bindings.
///
/// A lookup that fails or times out still yields a binding, left
/// `Unresolved` with its intended address so the monitor can retry it.
pub struct ClientBinder {
    catalog: Arc<dyn InterfaceCatalog>,
    lookup: Arc<dyn Lookup>,
    lookup_timeout: Duration,
    specs: Vec<RemoteServiceSpec>,
}

impl ClientBinder {
    pub fn new(catalog: Arc<dyn InterfaceCatalog>, lookup: Arc<dyn Lookup>) -> Self {
        Self {
            catalog,
            lookup,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            specs: Vec::new(),
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn declare(&mut self, spec: RemoteServiceSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    pub fn specs(&self) -> &[RemoteServiceSpec] {
        &self.specs
    }

    pub fn lookup(&self) -> Arc<dyn Lookup> {
        self.lookup.clone()
    }

    pub async fn bind_all(&self) -> BindingSet {
        let bindings = BindingSet::new();
        self.bind_into(&bindings).await;
        bindings
    }

    /// Resolves every declared service into `bindings`, including a set a
    /// running monitor already drives. Returns how many were added.
    pub async fn bind_into(&self, bindings: &BindingSet) -> usize {
        let resolved = join_all(
            self.candidate_addresses()
                .into_iter()
                .map(|address| self.resolve(address)),
        )
        .await;

        let mut added = 0;
        for binding in resolved {
            let address = binding.address().to_string();
            if bindings.insert(binding) {
                added += 1;
            } else {
                tracing::warn!(%address, "service already bound, keeping the first binding");
            }
        }
        added
    }

    fn candidate_addresses(&self) -> Vec<ServiceAddress> {
        let mut addresses = Vec::new();
        for spec in &self.specs {
            match self.catalog.interfaces(&spec.discovery_scope) {
                Ok(interfaces) => {
                    addresses.extend(interfaces.iter().map(|i| spec.address_of(i)));
                }
                Err(e) => {
                    tracing::warn!(
                        scope = %spec.discovery_scope,
                        error = %e,
                        "skipping remote services"
                    );
                }
            }
        }
        addresses
    }

    async fn resolve(&self, address: ServiceAddress) -> ServiceBinding {
        match lookup_with_timeout(self.lookup.as_ref(), &address, self.lookup_timeout).await {
            Ok(reference) => {
                tracing::info!(service = %address.name, %address, "bound remote service");
                ServiceBinding::resolved(address, reference)
            }
            Err(e) => {
                tracing::warn!(
                    service = %address.name,
                    %address,
                    error = %e,
                    "remote service unavailable, will retry"
                );
                ServiceBinding::unresolved(address)
            }
        }
    }
}

pub(crate) async fn lookup_with_timeout(
    lookup: &dyn Lookup,
    address: &ServiceAddress,
    timeout: Duration,
) -> Result<Arc<dyn RemoteRef>, TransportError> {
    match tokio::time::timeout(timeout, lookup.lookup(address)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}
