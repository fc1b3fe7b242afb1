//! ble-transport: BLE advertisement scanning abstractions
//!
//! This crate provides the types and the scanner trait the sensor registry consumes at its
//! boundary. Real radio backends live outside this workspace; the default build enables a
//! `mock` backend that replays canned advertising frames so binaries run on any host.

mod types;
pub use types::{AdapterInfo, Advertisement, MacAddress, Timestamp};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::Scanner;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockScanner;
