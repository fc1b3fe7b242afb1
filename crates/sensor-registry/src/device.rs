//! Device classes and the per-device decoder.

use crate::decode::try_decode_field;
use crate::error::ConfigError;
use crate::roles::RoleRegistry;
use crate::schema::DeviceSchema;
use crate::state::StateAccess;
use crate::types::{DeviceConfig, RoleTarget, ValueMap};
use crate::validate::validate_device;
use ble_transport::MacAddress;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A family of devices sharing one manufacturer id and payload format.
pub trait DeviceClass: Send + Sync {
    fn manufacturer_id(&self) -> u16;

    /// Build the register table for a payload. Static classes ignore it.
    fn configure(&self, payload: &[u8]) -> DeviceSchema;

    /// True when the table depends on the payload and must be rebuilt on
    /// every decode.
    fn dynamic_layout(&self) -> bool {
        false
    }

    /// Post-decode hook, once per role per decode cycle.
    fn update_data(&self, _role: &str, _state: &dyn StateAccess, _data: &mut ValueMap) {}
}

/// Device classes keyed by manufacturer id.
#[derive(Clone, Default)]
pub struct DeviceCatalog {
    classes: HashMap<u16, Arc<dyn DeviceClass>>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: Arc<dyn DeviceClass>) -> Result<&mut Self, ConfigError> {
        let id = class.manufacturer_id();
        if self.classes.contains_key(&id) {
            return Err(ConfigError::DuplicateManufacturer(id));
        }
        tracing::debug!(manufacturer = format_args!("0x{id:04X}"), "registered device class");
        self.classes.insert(id, class);
        Ok(self)
    }

    pub fn get(&self, manufacturer_id: u16) -> Option<&Arc<dyn DeviceClass>> {
        self.classes.get(&manufacturer_id)
    }

    pub fn manufacturer_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.classes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl std::fmt::Debug for DeviceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCatalog")
            .field("manufacturer_ids", &self.manufacturer_ids())
            .finish()
    }
}

/// Who a physical device is, independent of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub mac: MacAddress,
    pub advertised_name: Option<String>,
}

impl DeviceIdentity {
    pub fn new(mac: MacAddress, advertised_name: Option<&str>) -> Self {
        Self {
            mac,
            advertised_name: advertised_name.map(str::to_string),
        }
    }

    /// Compact lowercase MAC, the device key.
    pub fn mac_id(&self) -> String {
        self.mac.compact()
    }

    /// Last four hex digits of the MAC, uppercased.
    pub fn suffix(&self) -> String {
        let mac = self.mac_id();
        mac[mac.len().saturating_sub(4)..].to_uppercase()
    }

    /// Fill in the published device name: the class name, else the advertised
    /// one, else the product name, followed by the MAC suffix.
    pub fn apply(&self, mut schema: DeviceSchema) -> DeviceSchema {
        let base = schema
            .device_name
            .take()
            .or_else(|| self.advertised_name.clone())
            .or_else(|| schema.product_name.clone());
        schema.device_name = base.map(|name| format!("{name} {}", self.suffix()));
        schema
    }
}

/// Result of decoding one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPayload {
    /// One map per declared role, possibly empty.
    pub values: BTreeMap<String, ValueMap>,
    /// Fields that failed to decode.
    pub dropped: usize,
}

/// Decode every register of a validated table and fan values out to roles.
pub fn decode_registers(config: &DeviceConfig, payload: &[u8]) -> DecodedPayload {
    let mut out = DecodedPayload {
        values: config
            .roles
            .iter()
            .map(|role| (role.clone(), ValueMap::new()))
            .collect(),
        dropped: 0,
    };
    for reg in &config.regs {
        let value = match try_decode_field(reg, payload) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(device = %config.device_name, field = %reg.name, "{e}, ignoring it");
                out.dropped += 1;
                continue;
            }
        };
        match &reg.roles {
            RoleTarget::Ignore => {}
            RoleTarget::All => {
                for map in out.values.values_mut() {
                    map.insert(reg.name.clone(), value.clone());
                }
            }
            RoleTarget::Only(roles) => {
                for role in roles {
                    if let Some(map) = out.values.get_mut(role) {
                        map.insert(reg.name.clone(), value.clone());
                    }
                }
            }
        }
    }
    out
}

/// Decoder state owned by one physical device.
pub struct DeviceDecoder {
    class: Arc<dyn DeviceClass>,
    identity: DeviceIdentity,
    config: DeviceConfig,
}

impl DeviceDecoder {
    /// Configure and validate against the first payload seen.
    pub fn new(
        class: Arc<dyn DeviceClass>,
        identity: DeviceIdentity,
        payload: &[u8],
        roles: &RoleRegistry,
    ) -> Result<Self, ConfigError> {
        let config = validate_device(identity.apply(class.configure(payload)), roles)?;
        tracing::debug!(
            mac = %identity.mac_id(),
            device = %config.device_name,
            regs = config.regs.len(),
            roles = ?config.roles,
            "device configured"
        );
        Ok(Self {
            class,
            identity,
            config,
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Last validated configuration. Its register table is empty after a
    /// dynamic rebuild failed.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn dev_id(&self) -> String {
        format!("{}_{}", self.config.device_prefix, self.identity.mac_id())
    }

    pub fn decode(&mut self, payload: &[u8], roles: &RoleRegistry) -> DecodedPayload {
        if self.class.dynamic_layout() {
            let schema = self.identity.apply(self.class.configure(payload));
            match validate_device(schema, roles) {
                Ok(config) => self.config = config,
                Err(e) => {
                    tracing::warn!(mac = %self.identity.mac_id(), "{e}, dropping payload");
                    self.config.regs.clear();
                    return DecodedPayload::default();
                }
            }
        }
        let decoded = decode_registers(&self.config, payload);
        tracing::debug!(
            device = %self.config.device_name,
            payload = %hex(payload),
            values = ?decoded.values,
            "payload parsed"
        );
        decoded
    }

    pub fn post_decode(&self, role: &str, state: &dyn StateAccess, data: &mut ValueMap) {
        self.class.update_data(role, state, data);
    }
}

impl std::fmt::Debug for DeviceDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDecoder")
            .field("identity", &self.identity)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::builtin_roles;
    use crate::schema::RegisterSchema;
    use crate::types::{FieldType, SensorValue, IGNORE_ROLE};

    struct Probe;

    impl DeviceClass for Probe {
        fn manufacturer_id(&self) -> u16 {
            0x1234
        }

        fn configure(&self, _payload: &[u8]) -> DeviceSchema {
            DeviceSchema {
                manufacturer_id: Some(0x1234),
                product_id: Some(1),
                product_name: Some("Probe".to_string()),
                device_prefix: Some("probe".to_string()),
                roles: Some(vec!["temperature".to_string(), "battery".to_string()]),
                regs: Some(vec![
                    RegisterSchema::new("Version", FieldType::Byte, 0).roles([IGNORE_ROLE]),
                    RegisterSchema::new("Temperature", FieldType::Int16, 1)
                        .scale(10.0)
                        .roles(["temperature"]),
                    RegisterSchema::new("BatteryVoltage", FieldType::UInt16, 3).scale(1000.0),
                    RegisterSchema::new("Spare", FieldType::UInt32, 5),
                ]),
                ..DeviceSchema::default()
            }
        }

        fn update_data(&self, role: &str, _state: &dyn StateAccess, data: &mut ValueMap) {
            if role == "battery" {
                data.insert("Hooked".to_string(), SensorValue::Bool(true));
            }
        }
    }

    fn mac() -> MacAddress {
        "cb:b8:33:4c:88:4f".parse().unwrap()
    }

    #[test]
    fn test_identity() {
        let identity = DeviceIdentity::new(mac(), Some("Ruuvi"));
        assert_eq!(identity.mac_id(), "cbb8334c884f");
        assert_eq!(identity.suffix(), "884F");

        let schema = identity.apply(DeviceSchema::default());
        assert_eq!(schema.device_name.as_deref(), Some("Ruuvi 884F"));

        let nameless = DeviceIdentity::new(mac(), None);
        let schema = nameless.apply(DeviceSchema {
            product_name: Some("Probe".to_string()),
            ..DeviceSchema::default()
        });
        assert_eq!(schema.device_name.as_deref(), Some("Probe 884F"));
    }

    #[test]
    fn test_role_fan_out() {
        let roles = builtin_roles().unwrap();
        let identity = DeviceIdentity::new(mac(), None);
        let payload = [0x01, 0xDC, 0x00, 0xB8, 0x0B];
        let mut decoder = DeviceDecoder::new(Arc::new(Probe), identity, &payload, &roles).unwrap();
        assert_eq!(decoder.dev_id(), "probe_cbb8334c884f");

        let decoded = decoder.decode(&payload, &roles);
        let temperature = &decoded.values["temperature"];
        let battery = &decoded.values["battery"];
        assert_eq!(temperature.get("Temperature"), Some(&SensorValue::F64(22.0)));
        assert_eq!(temperature.get("BatteryVoltage"), Some(&SensorValue::F64(3.0)));
        assert_eq!(battery.get("BatteryVoltage"), Some(&SensorValue::F64(3.0)));
        assert!(!battery.contains_key("Temperature"));
        assert!(!temperature.contains_key("Version"));
        // Spare needs 4 bytes at offset 5.
        assert_eq!(decoded.dropped, 1);
    }

    #[test]
    fn test_static_decode_is_idempotent() {
        let roles = builtin_roles().unwrap();
        let payload = [0x01, 0xDC, 0x00, 0xB8, 0x0B, 0, 0, 0, 0];
        let mut decoder = DeviceDecoder::new(
            Arc::new(Probe),
            DeviceIdentity::new(mac(), None),
            &payload,
            &roles,
        )
        .unwrap();
        let first = decoder.decode(&payload, &roles);
        assert_eq!(first.dropped, 0);
        assert_eq!(first, decoder.decode(&payload, &roles));
    }

    #[test]
    fn test_post_decode_hook() {
        let roles = builtin_roles().unwrap();
        let payload = [0x01, 0xDC, 0x00, 0xB8, 0x0B];
        let mut decoder = DeviceDecoder::new(
            Arc::new(Probe),
            DeviceIdentity::new(mac(), None),
            &payload,
            &roles,
        )
        .unwrap();
        let mut decoded = decoder.decode(&payload, &roles);
        let state = crate::state::PublishedState::new();
        for (role, data) in decoded.values.iter_mut() {
            decoder.post_decode(role, &state, data);
        }
        assert_eq!(decoded.values["battery"].get("Hooked"), Some(&SensorValue::Bool(true)));
        assert!(!decoded.values["temperature"].contains_key("Hooked"));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let mut catalog = DeviceCatalog::new();
        catalog.register(Arc::new(Probe)).unwrap();
        assert_eq!(
            catalog.register(Arc::new(Probe)).unwrap_err(),
            ConfigError::DuplicateManufacturer(0x1234)
        );
        assert!(catalog.get(0x1234).is_some());
        assert!(catalog.get(0x0499).is_none());
    }
}
