//! Sensor hub: routes advertisements to device decoders and keeps one
//! published role service per device and role.

use crate::alarm::{init_alarms, refresh};
use crate::config::HubConfig;
use crate::device::{DeviceCatalog, DeviceDecoder, DeviceIdentity};
use crate::error::HubError;
use crate::metrics::MetricsHub;
use crate::roles::{RegisteredRole, RoleRegistry};
use crate::state::{clear_path, PublishedState, StateAccess};
use crate::types::{SensorValue, SettingSpec};
use ble_transport::Advertisement;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

/// Point-in-time view of one role service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSnapshot {
    pub service: String,
    pub dev_id: String,
    pub role: String,
    pub connected: bool,
    pub enabled: bool,
    pub values: BTreeMap<String, SensorValue>,
}

/// Hands out device instances per role: the lowest free one at or above the
/// role's base. An instance stays with its service once assigned.
#[derive(Debug, Default, Clone)]
pub struct InstanceAllocator {
    assigned: BTreeMap<String, (String, u32)>,
}

impl InstanceAllocator {
    pub fn allocate(&mut self, service_id: &str, role: &str, base: u32) -> u32 {
        if let Some((_, instance)) = self.assigned.get(service_id) {
            return *instance;
        }
        let used: BTreeSet<u32> = self
            .assigned
            .values()
            .filter(|(r, _)| r == role)
            .map(|(_, i)| *i)
            .collect();
        let mut instance = base;
        while used.contains(&instance) {
            instance += 1;
        }
        tracing::info!(service = service_id, instance, "assigning device instance");
        self.assigned
            .insert(service_id.to_string(), (role.to_string(), instance));
        instance
    }
}

/// Published state of one device role.
#[derive(Debug, Clone)]
pub struct RoleService {
    role: String,
    service_id: String,
    service_name: String,
    state: PublishedState,
    enabled: bool,
    connected: bool,
    last_seen: Option<Instant>,
}

impl RoleService {
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn state(&self) -> &PublishedState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        if self.connected {
            tracing::info!(service = %self.service_name, "releasing service");
            self.connected = false;
        }
    }

    fn snapshot(&self, dev_id: &str) -> RoleSnapshot {
        RoleSnapshot {
            service: self.service_name.clone(),
            dev_id: dev_id.to_string(),
            role: self.role.clone(),
            connected: self.connected,
            enabled: self.enabled,
            values: self.state.items().clone(),
        }
    }
}

pub struct TrackedDevice {
    manufacturer_id: u16,
    decoder: DeviceDecoder,
    services: BTreeMap<String, RoleService>,
}

impl TrackedDevice {
    pub fn decoder(&self) -> &DeviceDecoder {
        &self.decoder
    }

    pub fn services(&self) -> impl Iterator<Item = &RoleService> {
        self.services.values()
    }
}

/// Persisted settings, keyed by `/Settings/Devices/{dev_id}/{role}{path}`.
#[derive(Debug, Default, Clone)]
struct SettingsStore {
    values: BTreeMap<String, SensorValue>,
}

impl SettingsStore {
    fn get_or_insert(&mut self, key: String, default: SensorValue) -> SensorValue {
        self.values.entry(key).or_insert(default).clone()
    }

    fn set(&mut self, key: String, value: SensorValue) {
        self.values.insert(key, value);
    }
}

fn setting_key(service_id: &str, path: &str) -> String {
    format!("/Settings/Devices/{service_id}{}", clear_path(path))
}

pub struct SensorHub {
    config: HubConfig,
    roles: RoleRegistry,
    catalog: DeviceCatalog,
    devices: BTreeMap<String, TrackedDevice>,
    ignored: HashSet<String>,
    settings: SettingsStore,
    instances: InstanceAllocator,
    metrics: MetricsHub,
}

impl SensorHub {
    pub fn new(
        config: HubConfig,
        roles: RoleRegistry,
        catalog: DeviceCatalog,
    ) -> Result<Self, HubError> {
        Ok(Self {
            config,
            roles,
            catalog,
            devices: BTreeMap::new(),
            ignored: HashSet::new(),
            settings: SettingsStore::default(),
            instances: InstanceAllocator::default(),
            metrics: MetricsHub::new()?,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &MetricsHub {
        &self.metrics
    }

    pub fn device(&self, mac: &str) -> Option<&TrackedDevice> {
        self.devices.get(mac)
    }

    pub fn is_ignored(&self, mac: &str) -> bool {
        self.ignored.contains(mac)
    }

    pub fn handle_advertisement(
        &mut self,
        adv: &Advertisement,
    ) -> Result<Vec<RoleSnapshot>, HubError> {
        self.handle_advertisement_at(adv, Instant::now())
    }

    /// Route one advertisement. Returns a snapshot of every service updated.
    pub fn handle_advertisement_at(
        &mut self,
        adv: &Advertisement,
        now: Instant,
    ) -> Result<Vec<RoleSnapshot>, HubError> {
        self.metrics.sensors.adverts_seen.inc();
        let mac = adv.address.compact();
        if self.ignored.contains(&mac) {
            return Ok(Vec::new());
        }
        tracing::debug!(%mac, name = ?adv.name, rssi = ?adv.rssi, "received advertisement");
        if adv.manufacturer_data.is_empty() {
            tracing::info!(%mac, "ignoring, device without manufacturer data");
            self.ignore(&mac);
            return Err(HubError::NoManufacturerData { mac });
        }

        if !self.devices.contains_key(&mac) {
            self.track(adv, &mac)?;
        }
        let mut updated = Vec::new();
        for (&manufacturer_id, payload) in &adv.manufacturer_data {
            updated.extend(self.handle_payload(&mac, manufacturer_id, payload, now));
        }
        Ok(updated)
    }

    fn ignore(&mut self, mac: &str) {
        self.ignored.insert(mac.to_string());
        self.metrics.sensors.devices_ignored.set(self.ignored.len() as i64);
    }

    /// Start tracking a device with the first manufacturer entry that has a
    /// device class. Unmatched devices are ignored from then on.
    fn track(&mut self, adv: &Advertisement, mac: &str) -> Result<(), HubError> {
        let matched = adv
            .manufacturer_data
            .iter()
            .find_map(|(&id, payload)| Some((id, payload, self.catalog.get(id)?.clone())));
        let Some((manufacturer_id, payload, class)) = matched else {
            let ids: Vec<u16> = adv.manufacturer_data.keys().copied().collect();
            tracing::info!(
                %mac,
                manufacturers = ?ids,
                "ignoring, no device class for manufacturer"
            );
            self.ignore(mac);
            return Err(HubError::UnknownManufacturer {
                mac: mac.to_string(),
                manufacturer_id: ids.first().copied().unwrap_or_default(),
            });
        };
        let identity = DeviceIdentity::new(adv.address, adv.name.as_deref());
        let decoder = match DeviceDecoder::new(class, identity, payload, &self.roles) {
            Ok(decoder) => decoder,
            Err(source) => {
                tracing::error!(%mac, "{source}, ignoring device");
                self.ignore(mac);
                return Err(HubError::Config {
                    mac: mac.to_string(),
                    source,
                });
            }
        };
        tracing::info!(%mac, device = %decoder.config().device_name, "initializing device");

        let mut device = TrackedDevice {
            manufacturer_id,
            decoder,
            services: BTreeMap::new(),
        };
        let role_names = device.decoder.config().roles.clone();
        for role in role_names {
            self.open_service(&mut device, &role);
        }
        self.devices.insert(mac.to_string(), device);
        self.metrics.sensors.devices_known.set(self.devices.len() as i64);
        Ok(())
    }

    fn open_service(&mut self, device: &mut TrackedDevice, role_name: &str) {
        let Some(role) = self.roles.lookup(role_name) else {
            tracing::warn!(role = role_name, "role vanished from registry");
            return;
        };
        let service = new_service(&self.config, &device.decoder, role, &mut self.settings);
        tracing::debug!(service = %service.service_name, enabled = service.enabled, "service initialized");
        device.services.insert(role_name.to_string(), service);
    }

    fn handle_payload(
        &mut self,
        mac: &str,
        manufacturer_id: u16,
        payload: &[u8],
        now: Instant,
    ) -> Vec<RoleSnapshot> {
        let Some(mut device) = self.devices.remove(mac) else {
            return Vec::new();
        };
        let updated = self.update_device(&mut device, manufacturer_id, payload, now);
        self.devices.insert(mac.to_string(), device);
        updated
    }

    fn update_device(
        &mut self,
        device: &mut TrackedDevice,
        manufacturer_id: u16,
        payload: &[u8],
        now: Instant,
    ) -> Vec<RoleSnapshot> {
        if manufacturer_id != device.manufacturer_id {
            tracing::debug!(
                device = %device.decoder.config().device_name,
                manufacturer = format_args!("0x{manufacturer_id:04X}"),
                "skipping foreign manufacturer data"
            );
            return Vec::new();
        }
        if !device.services.values().any(|s| s.enabled) {
            tracing::debug!(device = %device.decoder.config().device_name, "device not enabled, skipping");
            return Vec::new();
        }

        let decoded = device.decoder.decode(payload, &self.roles);
        self.metrics.sensors.payloads_decoded.inc();
        self.metrics.sensors.fields_dropped.inc_by(decoded.dropped as u64);

        let dev_id = device.decoder.dev_id();
        let mut updated = Vec::new();
        for (role_name, mut data) in decoded.values {
            if !device.services.contains_key(&role_name) {
                self.open_service(device, &role_name);
            }
            let Some(role) = self.roles.lookup(&role_name) else {
                continue;
            };
            let Some(service) = device.services.get_mut(&role_name) else {
                continue;
            };
            if !service.enabled {
                continue;
            }

            role.role.update_data(&service.state, &mut data);
            device.decoder.post_decode(&role_name, &service.state, &mut data);
            for (name, value) in data {
                service.state.set(&name, value);
            }
            refresh(&role.spec.alarms, &mut service.state);
            refresh(&device.decoder.config().alarms, &mut service.state);

            if !service.connected {
                if service.state.get("/DeviceInstance").is_none() {
                    let instance =
                        self.instances
                            .allocate(&service.service_id, &role_name, role.spec.dev_instance);
                    service.state.set("/DeviceInstance", i64::from(instance));
                }
                tracing::info!(service = %service.service_name, "registering service");
                service.connected = true;
            }
            service.last_seen = Some(now);
            updated.push(service.snapshot(&dev_id));
        }
        updated
    }

    /// Enable or disable one role service of a device.
    pub fn set_enabled(&mut self, mac: &str, role: &str, enabled: bool) -> Result<(), HubError> {
        let service = self.service_mut(mac, role)?;
        service.enabled = enabled;
        if !enabled {
            service.disconnect();
        }
        let key = setting_key(&service.service_id, "Enabled");
        tracing::info!(service = %service.service_name, enabled, "service enable changed");
        self.settings.set(key, SensorValue::I64(i64::from(enabled)));
        Ok(())
    }

    /// Change a role or device setting, range checked, then fire its callback.
    pub fn apply_setting(
        &mut self,
        mac: &str,
        role: &str,
        path: &str,
        value: f64,
    ) -> Result<(), HubError> {
        let spec = self.setting_spec(mac, role, path)?;
        let service = self.service_mut(mac, role)?;
        let props = spec.props;
        if !(props.min <= value && value <= props.max) {
            return Err(HubError::SettingOutOfRange {
                service: service.service_name.clone(),
                setting: spec.name,
                value,
                min: props.min,
                max: props.max,
            });
        }
        let published = SensorValue::from_number(value);
        service.state.set(&spec.name, published.clone());
        if let Some(callback) = &spec.on_change {
            callback.call(&mut service.state, value);
        }
        let key = setting_key(&service.service_id, &spec.name);
        self.settings.set(key, published);
        Ok(())
    }

    fn setting_spec(&self, mac: &str, role: &str, path: &str) -> Result<SettingSpec, HubError> {
        let device = self
            .devices
            .get(mac)
            .ok_or_else(|| HubError::UnknownDevice(mac.to_string()))?;
        let service = device
            .services
            .get(role)
            .ok_or_else(|| HubError::UnknownService {
                mac: mac.to_string(),
                role: role.to_string(),
            })?;
        let wanted = clear_path(path);
        self.roles
            .lookup(role)
            .into_iter()
            .flat_map(|r| r.spec.settings.iter())
            .chain(device.decoder.config().settings.iter())
            .find(|s| clear_path(&s.name) == wanted)
            .cloned()
            .ok_or_else(|| HubError::UnknownSetting {
                service: service.service_name.clone(),
                setting: wanted,
            })
    }

    fn service_mut(&mut self, mac: &str, role: &str) -> Result<&mut RoleService, HubError> {
        self.devices
            .get_mut(mac)
            .ok_or_else(|| HubError::UnknownDevice(mac.to_string()))?
            .services
            .get_mut(role)
            .ok_or_else(|| HubError::UnknownService {
                mac: mac.to_string(),
                role: role.to_string(),
            })
    }

    /// Disconnect services that received no data within the service timeout.
    /// Returns the released service names.
    pub fn expire_stale(&mut self, now: Instant) -> Vec<String> {
        let timeout = self.config.role_service_timeout();
        let mut expired = Vec::new();
        for device in self.devices.values_mut() {
            for service in device.services.values_mut() {
                let stale = service
                    .last_seen
                    .is_some_and(|seen| now.saturating_duration_since(seen) >= timeout);
                if service.connected && stale {
                    tracing::warn!(
                        service = %service.service_name,
                        "no data received since {} seconds, disconnecting",
                        timeout.as_secs()
                    );
                    service.disconnect();
                    expired.push(service.service_name.clone());
                }
            }
        }
        expired
    }

    pub fn snapshot(&self) -> Vec<RoleSnapshot> {
        self.devices
            .values()
            .flat_map(|device| {
                let dev_id = device.decoder.dev_id();
                device
                    .services
                    .values()
                    .map(move |service| service.snapshot(&dev_id))
            })
            .collect()
    }
}

fn new_service(
    config: &HubConfig,
    decoder: &DeviceDecoder,
    role: &RegisteredRole,
    settings: &mut SettingsStore,
) -> RoleService {
    let device = decoder.config();
    let dev_id = decoder.dev_id();
    let service_id = format!("{dev_id}/{}", role.name());
    let service_name = format!("{}.{}.{dev_id}", config.service_prefix, role.name());

    let mut state = PublishedState::new();
    state.set("/Mgmt/ProcessName", config.process_name.as_str());
    state.set("/Mgmt/ProcessVersion", config.process_version.as_str());
    state.set("/Mgmt/Connection", "Bluetooth LE");
    state.set("/ProductId", i64::from(device.product_id));
    state.set("/ProductName", device.product_name.as_str());
    state.set("/FirmwareVersion", device.firmware_version.as_str());
    state.set("/HardwareVersion", device.hardware_version.as_str());
    state.set("/Connected", 1i64);
    state.set("/Status", 0i64);

    let custom_name = settings.get_or_insert(
        setting_key(&service_id, "CustomName"),
        SensorValue::Text(String::new()),
    );
    state.set("/CustomName", custom_name);
    state.set("/DeviceName", device.device_name.as_str());

    init_settings(&role.spec.settings, &service_id, &mut state, settings);
    init_alarms(&role.spec.alarms, &mut state);
    role.role.init(&mut state);
    init_settings(&device.settings, &service_id, &mut state, settings);
    init_alarms(&device.alarms, &mut state);

    let enabled = settings
        .get_or_insert(
            setting_key(&service_id, "Enabled"),
            SensorValue::I64(i64::from(config.enable_new_devices)),
        )
        .is_truthy();

    RoleService {
        role: role.name().to_string(),
        service_id,
        service_name,
        state,
        enabled,
        connected: false,
        last_seen: None,
    }
}

fn init_settings(
    specs: &[SettingSpec],
    service_id: &str,
    state: &mut PublishedState,
    settings: &mut SettingsStore,
) {
    for spec in specs {
        let value = settings.get_or_insert(
            setting_key(service_id, &spec.name),
            SensorValue::from_number(spec.props.def),
        );
        state.set(&spec.name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::builtin_catalog;
    use crate::roles::builtin_roles;
    use ble_transport::MacAddress;
    use std::time::Duration;

    const TELTONIKA: [u8; 11] = [
        0x01, 0xB7, 0x08, 0xB4, 0x12, 0x0C, 0xCB, 0x0B, 0xFF, 0xC7, 0x67,
    ];
    const MAC: &str = "7cd9f4112a05";

    fn hub(config: HubConfig) -> SensorHub {
        SensorHub::new(config, builtin_roles().unwrap(), builtin_catalog().unwrap()).unwrap()
    }

    fn enabled() -> HubConfig {
        HubConfig {
            enable_new_devices: true,
            ..HubConfig::default()
        }
    }

    fn advert(mac: &str, id: u16, payload: &[u8]) -> Advertisement {
        let address: MacAddress = mac.parse().unwrap();
        Advertisement::new(address, Some("P T EN")).with_manufacturer_data(id, payload)
    }

    #[test]
    fn test_first_advert_creates_services() {
        let mut hub = hub(enabled());
        let updated = hub
            .handle_advertisement(&advert(MAC, 0x089A, &TELTONIKA))
            .unwrap();
        assert_eq!(updated.len(), 3);

        let temperature = updated.iter().find(|s| s.role == "temperature").unwrap();
        assert_eq!(temperature.service, "com.victronenergy.temperature.teltonika_7cd9f4112a05");
        assert!(temperature.connected);
        let v = &temperature.values;
        assert_eq!(v["/Temperature"], SensorValue::F64(22.28));
        assert_eq!(v["/DeviceName"], SensorValue::Text("P T EN 2A05".to_string()));
        assert_eq!(v["/ProductId"], SensorValue::I64(0x3042));
        assert_eq!(v["/Mgmt/Connection"], SensorValue::Text("Bluetooth LE".to_string()));
        assert_eq!(v["/TemperatureType"], SensorValue::I64(2));
        assert_eq!(v["/Alarms/LowBattery"], SensorValue::I64(0));
        assert_eq!(v["/DeviceInstance"], SensorValue::I64(20));

        let input = updated.iter().find(|s| s.role == "digitalinput").unwrap();
        assert_eq!(input.values["/State"], SensorValue::I64(0));
        assert_eq!(input.values["/DeviceInstance"], SensorValue::I64(10));
    }

    #[test]
    fn test_unknown_manufacturer_is_memoized() {
        let mut hub = hub(enabled());
        let adv = advert("11:22:33:44:55:66", 0xFFFF, &[1, 2, 3]);
        assert!(matches!(
            hub.handle_advertisement(&adv),
            Err(HubError::UnknownManufacturer { manufacturer_id: 0xFFFF, .. })
        ));
        assert!(hub.is_ignored("112233445566"));
        assert!(hub.handle_advertisement(&adv).unwrap().is_empty());
    }

    #[test]
    fn test_known_manufacturer_behind_unknown_one() {
        let mut hub = hub(enabled());
        let adv = advert(MAC, 0x004C, &[0x02, 0x15]).with_manufacturer_data(0x089A, &TELTONIKA);
        let updated = hub.handle_advertisement(&adv).unwrap();
        assert_eq!(updated.len(), 3);
        assert!(!hub.is_ignored(MAC));
        assert!(hub.device(MAC).is_some());
    }

    #[test]
    fn test_unknown_manufacturers_only() {
        let mut hub = hub(enabled());
        let adv = advert(MAC, 0x004C, &[0x02, 0x15]).with_manufacturer_data(0x0006, &[1]);
        assert!(matches!(
            hub.handle_advertisement(&adv),
            Err(HubError::UnknownManufacturer { manufacturer_id: 0x0006, .. })
        ));
        assert!(hub.is_ignored(MAC));
    }

    #[test]
    fn test_no_manufacturer_data() {
        let mut hub = hub(enabled());
        let adv = Advertisement::new("11:22:33:44:55:66".parse().unwrap(), None);
        assert!(matches!(
            hub.handle_advertisement(&adv),
            Err(HubError::NoManufacturerData { .. })
        ));
        assert!(hub.is_ignored("112233445566"));
    }

    #[test]
    fn test_invalid_class_is_ignored() {
        let mut hub = hub(enabled());
        // Only the battery flag: no roles.
        let adv = advert(MAC, 0x089A, &[0x01, 0x80, 0x67]);
        assert!(matches!(
            hub.handle_advertisement(&adv),
            Err(HubError::Config { .. })
        ));
        assert!(hub.is_ignored(MAC));
        assert!(hub.device(MAC).is_none());
    }

    #[test]
    fn test_disabled_devices_are_skipped() {
        let mut hub = hub(HubConfig::default());
        let adv = advert(MAC, 0x089A, &TELTONIKA);
        assert!(hub.handle_advertisement(&adv).unwrap().is_empty());
        assert!(hub.device(MAC).is_some());

        hub.set_enabled(MAC, "movement", true).unwrap();
        let updated = hub.handle_advertisement(&adv).unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].role, "movement");
        assert_eq!(updated[0].values["/Roll"], SensorValue::I64(-57));
    }

    #[test]
    fn test_instances_are_unique_per_role() {
        let mut hub = hub(enabled());
        hub.handle_advertisement(&advert(MAC, 0x089A, &TELTONIKA)).unwrap();
        let updated = hub
            .handle_advertisement(&advert("7c:d9:f4:11:2a:06", 0x089A, &TELTONIKA))
            .unwrap();
        let temperature = updated.iter().find(|s| s.role == "temperature").unwrap();
        assert_eq!(temperature.values["/DeviceInstance"], SensorValue::I64(21));
    }

    #[test]
    fn test_apply_setting() {
        let mut hub = hub(enabled());
        hub.handle_advertisement(&advert(MAC, 0x089A, &TELTONIKA)).unwrap();

        hub.apply_setting(MAC, "temperature", "TemperatureType", 4.0).unwrap();
        let service = hub.device(MAC).unwrap().services().find(|s| s.role() == "temperature").unwrap();
        assert_eq!(service.state().get("/TemperatureType"), Some(&SensorValue::I64(4)));

        assert!(matches!(
            hub.apply_setting(MAC, "temperature", "/TemperatureType", 9.0),
            Err(HubError::SettingOutOfRange { .. })
        ));
        assert!(matches!(
            hub.apply_setting(MAC, "temperature", "/Nope", 1.0),
            Err(HubError::UnknownSetting { .. })
        ));
        assert!(matches!(
            hub.apply_setting(MAC, "tank", "/Alarms/High/Enable", 1.0),
            Err(HubError::UnknownService { .. })
        ));
    }

    #[test]
    fn test_expire_stale() {
        let mut hub = hub(enabled());
        let start = Instant::now();
        hub.handle_advertisement_at(&advert(MAC, 0x089A, &TELTONIKA), start)
            .unwrap();

        assert!(hub.expire_stale(start + Duration::from_secs(60)).is_empty());
        let expired = hub.expire_stale(start + Duration::from_secs(1800));
        assert_eq!(expired.len(), 3);
        assert!(hub.snapshot().iter().all(|s| !s.connected));

        // Fresh data reconnects with the same instance.
        let updated = hub
            .handle_advertisement_at(&advert(MAC, 0x089A, &TELTONIKA), start + Duration::from_secs(1900))
            .unwrap();
        assert!(updated.iter().all(|s| s.connected));
        let temperature = updated.iter().find(|s| s.role == "temperature").unwrap();
        assert_eq!(temperature.values["/DeviceInstance"], SensorValue::I64(20));
    }

    #[test]
    fn test_metrics_follow_traffic() {
        let mut hub = hub(enabled());
        hub.handle_advertisement(&advert(MAC, 0x089A, &TELTONIKA)).unwrap();
        let _ = hub.handle_advertisement(&advert("11:22:33:44:55:66", 0xFFFF, &[1]));
        let text = hub.metrics().encode_text();
        assert!(text.contains("ble_adverts_seen 2"));
        assert!(text.contains("ble_payloads_decoded 1"));
        assert!(text.contains("ble_devices_known 1"));
        assert!(text.contains("ble_devices_ignored 1"));
    }

    #[test]
    fn test_snapshot_json() {
        let mut hub = hub(enabled());
        let updated = hub
            .handle_advertisement(&advert(MAC, 0x089A, &TELTONIKA))
            .unwrap();
        let movement = updated.iter().find(|s| s.role == "movement").unwrap();
        let json: serde_json::Value = serde_json::to_value(movement).unwrap();
        assert_eq!(json["dev_id"], "teltonika_7cd9f4112a05");
        assert_eq!(json["values"]["/MovementCount"], 3275);
        assert_eq!(json["values"]["/MovementState"], false);
    }

    #[test]
    fn test_allocator_reuses_assignment() {
        let mut allocator = InstanceAllocator::default();
        assert_eq!(allocator.allocate("a/tank", "tank", 20), 20);
        assert_eq!(allocator.allocate("b/tank", "tank", 20), 21);
        assert_eq!(allocator.allocate("a/tank", "tank", 20), 20);
        assert_eq!(allocator.allocate("a/battery", "battery", 20), 20);
    }
}
