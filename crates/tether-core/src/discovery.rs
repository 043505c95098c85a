use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown discovery scope '{0}'")]
    UnknownScope(String),
}

/// Enumerates the interfaces a client may bind within a discovery scope.
pub trait InterfaceCatalog: Send + Sync {
    fn interfaces(&self, scope: &str) -> Result<Vec<String>, CatalogError>;
}

/// Catalog declared up front, usually from the client config file.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    scopes: BTreeMap<String, Vec<String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(mut self, scope: impl Into<String>, interface: impl Into<String>) -> Self {
        let interfaces = self.scopes.entry(scope.into()).or_default();
        let interface = interface.into();
        if !interfaces.contains(&interface) {
            interfaces.push(interface);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        iter.into_iter()
            .flat_map(|(scope, interfaces)| {
                interfaces.into_iter().map(move |i| (scope.clone(), i))
            })
            .fold(StaticCatalog::new(), |catalog, (scope, interface)| {
                catalog.declare(scope, interface)
            })
    }
}

impl InterfaceCatalog for StaticCatalog {
    fn interfaces(&self, scope: &str) -> Result<Vec<String>, CatalogError> {
        self.scopes
            .get(scope)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownScope(scope.to_string()))
    }
}
