use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tether_core::{Registry, StubEndpoint, TransportError};

/// The name table behind a registry listener. Lives only as long as the
/// process that created it.
#[derive(Debug, Default)]
pub struct Directory {
    names: RwLock<BTreeMap<String, StubEndpoint>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<StubEndpoint> {
        self.names.read().get(name).cloned()
    }

    /// Returns the entry that was replaced, if any.
    pub fn insert(&self, name: impl Into<String>, endpoint: StubEndpoint) -> Option<StubEndpoint> {
        self.names.write().insert(name.into(), endpoint)
    }

    pub fn remove(&self, name: &str) -> Option<StubEndpoint> {
        self.names.write().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

#[async_trait]
impl Registry for Directory {
    async fn rebind(&self, name: &str, endpoint: StubEndpoint) -> Result<(), TransportError> {
        if let Some(previous) = self.insert(name, endpoint) {
            tracing::debug!(name, previous = %previous.object_id, "replaced registry entry");
        }
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<StubEndpoint, TransportError> {
        self.get(name)
            .ok_or_else(|| TransportError::NotBound(name.to_string()))
    }

    async fn unbind(&self, name: &str) -> Result<(), TransportError> {
        self.remove(name)
            .map(|_| ())
            .ok_or_else(|| TransportError::NotBound(name.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rebind_overwrites_previous_entry() {
        let directory = Directory::new();
        let first = StubEndpoint::new("Billing", "127.0.0.1", 5001);
        let second = StubEndpoint::new("Billing", "orders-svc", 5001);

        directory.rebind("Billing", first).await.unwrap();
        directory.rebind("Billing", second.clone()).await.unwrap();

        assert_eq!(directory.lookup("Billing").await.unwrap(), second);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn missing_names_are_not_bound() {
        let directory = Directory::new();
        assert!(matches!(
            directory.lookup("Billing").await,
            Err(TransportError::NotBound(name)) if name == "Billing"
        ));
        assert!(directory.unbind("Billing").await.is_err());
    }

    #[tokio::test]
    async fn lists_names_sorted() {
        let directory = Directory::new();
        for name in ["Orders", "Billing", "Invoices"] {
            directory
                .rebind(name, StubEndpoint::new(name, "127.0.0.1", 5001))
                .await
                .unwrap();
        }
        assert_eq!(directory.list().await.unwrap(), vec!["Billing", "Invoices", "Orders"]);
    }
}
