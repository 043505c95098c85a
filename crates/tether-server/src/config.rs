use tether_core::LOOPBACK_HOST;

/// Overrides the host embedded in every exported stub. Set it to the name
/// clients use to reach this process (container or orchestrator service
/// name), not to an address only valid inside this process's namespace.
pub const HOSTNAME_ENV: &str = "TETHER_HOSTNAME";

/// The override is used verbatim; absent or blank means loopback.
pub fn resolve_advertised_host(override_host: Option<&str>) -> String {
    match override_host {
        Some(host) if !host.trim().is_empty() => host.to_string(),
        _ => LOOPBACK_HOST.to_string(),
    }
}

pub fn advertised_host_from_env() -> String {
    resolve_advertised_host(std::env::var(HOSTNAME_ENV).ok().as_deref())
}
