use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const SCHEME: &str = "tether";
pub const DEFAULT_REGISTRY_PORT: u16 = 1099;
pub const DEFAULT_EXPORT_PORT: u16 = 5001;
pub const LOOPBACK_HOST: &str = "127.0.0.1";

/// Location of a named service: `tether://host:port/name`, where `port`
/// is the registry port rather than the port the object is served on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl ServiceAddress {
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
        }
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}/{}", SCHEME, self.host, self.port, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("expected scheme 'tether://'")]
    Scheme,
    #[error("missing service name")]
    MissingName,
    #[error("missing or empty host")]
    MissingHost,
    #[error("invalid port '{0}'")]
    Port(String),
}

impl FromStr for ServiceAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or(AddressParseError::Scheme)?;
        let (authority, name) = rest.split_once('/').ok_or(AddressParseError::MissingName)?;
        if name.is_empty() {
            return Err(AddressParseError::MissingName);
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AddressParseError::Port(port.to_string()))?;
                (host, port)
            }
            None => (authority, DEFAULT_REGISTRY_PORT),
        };
        if host.is_empty() {
            return Err(AddressParseError::MissingHost);
        }

        Ok(Self::new(host, port, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_with_registry_port() {
        let addr = ServiceAddress::new("orders-svc", 1099, "Billing");
        assert_eq!(addr.to_string(), "tether://orders-svc:1099/Billing");
    }

    #[test]
    fn parses_full_address() {
        let addr: ServiceAddress = "tether://10.0.0.7:2000/Invoices".parse().unwrap();
        assert_eq!(addr, ServiceAddress::new("10.0.0.7", 2000, "Invoices"));
    }

    #[test]
    fn missing_port_defaults_to_registry_port() {
        let addr: ServiceAddress = "tether://orders-svc/Billing".parse().unwrap();
        assert_eq!(addr.port, DEFAULT_REGISTRY_PORT);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(
            "http://host:1/x".parse::<ServiceAddress>(),
            Err(AddressParseError::Scheme)
        );
        assert_eq!(
            "tether://host:1".parse::<ServiceAddress>(),
            Err(AddressParseError::MissingName)
        );
        assert_eq!(
            "tether://:1/x".parse::<ServiceAddress>(),
            Err(AddressParseError::MissingHost)
        );
        assert!(matches!(
            "tether://host:abc/x".parse::<ServiceAddress>(),
            Err(AddressParseError::Port(_))
        ));
    }
}
