pub mod handle;

pub use handle::{RegistryHandle, RegistryHandles, RegistryMode};
