use serde::{Deserialize, Serialize};

use crate::address::{DEFAULT_EXPORT_PORT, DEFAULT_REGISTRY_PORT, ServiceAddress};

/// Export metadata attached to a service implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    /// Name published in the registry. Falls back to the interface name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_registry_port")]
    pub registry_port: u16,
    /// Fixed port the object is served on. Must survive NAT/port mapping,
    /// so it is never auto-assigned.
    #[serde(default = "default_export_port")]
    pub export_port: u16,
}

fn default_registry_port() -> u16 {
    DEFAULT_REGISTRY_PORT
}

fn default_export_port() -> u16 {
    DEFAULT_EXPORT_PORT
}

impl Default for ExportDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            registry_port: DEFAULT_REGISTRY_PORT,
            export_port: DEFAULT_EXPORT_PORT,
        }
    }
}

impl ExportDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_registry_port(mut self, port: u16) -> Self {
        self.registry_port = port;
        self
    }

    pub fn with_export_port(mut self, port: u16) -> Self {
        self.export_port = port;
        self
    }

    /// Declared name, or the interface name when none was given.
    pub fn resolve_name(&self, interface: &str) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => interface.to_string(),
        }
    }
}

/// A service as it is being exported. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub interface: String,
    pub host: String,
    pub registry_port: u16,
    pub export_port: u16,
    pub inject_liveness: bool,
}

impl ServiceDescriptor {
    pub fn new(
        descriptor: &ExportDescriptor,
        interface: impl Into<String>,
        host: impl Into<String>,
        inject_liveness: bool,
    ) -> Self {
        let interface = interface.into();
        Self {
            name: descriptor.resolve_name(&interface),
            interface,
            host: host.into(),
            registry_port: descriptor.registry_port,
            export_port: descriptor.export_port,
            inject_liveness,
        }
    }

    /// Address clients use to look this service up.
    pub fn address(&self) -> ServiceAddress {
        ServiceAddress::new(self.host.clone(), self.registry_port, self.name.clone())
    }
}

/// One remote registry a client wants bindings from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteServiceSpec {
    pub discovery_scope: String,
    pub host: String,
    #[serde(default = "default_registry_port")]
    pub registry_port: u16,
}

impl RemoteServiceSpec {
    pub fn new(
        discovery_scope: impl Into<String>,
        host: impl Into<String>,
        registry_port: u16,
    ) -> Self {
        Self {
            discovery_scope: discovery_scope.into(),
            host: host.into(),
            registry_port,
        }
    }

    pub fn address_of(&self, interface: &str) -> ServiceAddress {
        ServiceAddress::new(self.host.clone(), self.registry_port, interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_defaults_to_interface() {
        let d = ExportDescriptor::default();
        assert_eq!(d.resolve_name("Billing"), "Billing");

        let blank = ExportDescriptor::named("  ");
        assert_eq!(blank.resolve_name("Billing"), "Billing");
    }

    #[test]
    fn descriptor_address_uses_advertised_host_and_registry_port() {
        let export = ExportDescriptor::named("Billing")
            .with_registry_port(1099)
            .with_export_port(5001);
        let service = ServiceDescriptor::new(&export, "BillingApi", "orders-svc", true);

        assert_eq!(service.name, "Billing");
        assert_eq!(service.export_port, 5001);
        assert_eq!(service.address().to_string(), "tether://orders-svc:1099/Billing");
    }

    #[test]
    fn export_descriptor_fills_defaults_when_deserialized() {
        let d: ExportDescriptor = serde_json::from_str(r#"{"name":"Billing"}"#).unwrap();
        assert_eq!(d.registry_port, 1099);
        assert_eq!(d.export_port, 5001);
    }
}
