use crate::{AdapterInfo, Advertisement, Result};
use std::time::Duration;

/// A minimal blocking BLE scanner.
pub trait Scanner {
    /// Open a scanner on an adapter by name (e.g., "hci0").
    fn open(adapter: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available adapters for this backend.
    fn list() -> Result<Vec<AdapterInfo>>;

    /// Scan for up to `timeout` and return every advertisement received.
    fn scan(&mut self, timeout: Duration) -> Result<Vec<Advertisement>>;
}
