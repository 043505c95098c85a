pub mod config;
pub mod exporter;

pub use config::{HOSTNAME_ENV, advertised_host_from_env, resolve_advertised_host};
pub use exporter::{ExportReport, ExportedService, ServiceExporter};
