use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration of the sensor hub and its scan loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub process_name: String,
    pub process_version: String,
    /// Prefix of published service names, `{prefix}.{role}.{dev_id}`.
    pub service_prefix: String,
    pub scan_timeout_secs: u64,
    pub scan_interval_secs: u64,
    /// Services with no data for this long are disconnected.
    pub role_service_timeout_secs: u64,
    pub continuous_scan: bool,
    /// Whether role services of newly seen devices start enabled.
    pub enable_new_devices: bool,
    /// Directory of YAML device descriptors.
    pub descriptors_dir: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            process_name: "ble-sensors".to_string(),
            process_version: env!("CARGO_PKG_VERSION").to_string(),
            service_prefix: "com.victronenergy".to_string(),
            scan_timeout_secs: 15,
            scan_interval_secs: 20,
            role_service_timeout_secs: 1800,
            continuous_scan: false,
            enable_new_devices: false,
            descriptors_dir: None,
        }
    }
}

impl HubConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Pause between two scans.
    pub fn scan_sleep(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.saturating_sub(self.scan_timeout_secs))
    }

    pub fn role_service_timeout(&self) -> Duration {
        Duration::from_secs(self.role_service_timeout_secs)
    }
}
