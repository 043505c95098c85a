pub mod address;
pub mod descriptor;
pub mod discovery;
pub mod errors;
pub mod health;
pub mod proxy;
pub mod registry;
pub mod service;
pub mod time;
pub mod transport;

pub use address::{
    AddressParseError, DEFAULT_EXPORT_PORT, DEFAULT_REGISTRY_PORT, LOOPBACK_HOST, SCHEME,
    ServiceAddress,
};
pub use descriptor::{ExportDescriptor, RemoteServiceSpec, ServiceDescriptor};
pub use discovery::{CatalogError, InterfaceCatalog, StaticCatalog};
pub use errors::{ExportError, ServiceError, TransportError};
pub use health::BindingState;
pub use proxy::CapabilityProxy;
pub use registry::{Registry, RegistryError, RegistryProvider};
pub use service::{LIVENESS_METHOD, RemoteRef, RemoteService};
pub use time::{Clock, ManualClock, SystemClock};
pub use transport::{Lookup, ObjectExporter, StubEndpoint};
