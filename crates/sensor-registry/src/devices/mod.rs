//! Device classes shipped with the crate.

mod declarative;
pub mod teltonika;

pub use declarative::DeclarativeDevice;
pub use teltonika::TeltonikaEye;

use crate::device::DeviceCatalog;
use crate::error::ConfigError;
use std::sync::Arc;

/// Catalog holding every built-in Rust device class.
pub fn builtin_catalog() -> Result<DeviceCatalog, ConfigError> {
    let mut catalog = DeviceCatalog::new();
    catalog.register(Arc::new(TeltonikaEye))?;
    Ok(catalog)
}
