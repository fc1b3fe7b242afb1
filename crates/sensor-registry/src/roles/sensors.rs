use super::Role;
use crate::schema::{RoleSchema, SettingSchema};
use crate::state::StateAccess;
use crate::types::{SensorValue, ValueMap};

/// Ambient temperature / humidity probe.
pub struct TemperatureRole;

impl Role for TemperatureRole {
    fn schema(&self) -> RoleSchema {
        RoleSchema {
            name: Some("temperature".to_string()),
            dev_instance: Some(20),
            // 0 battery, 1 fridge, 2 generic, 3 room, 4 outdoor, 5 water heater, 6 freezer
            settings: vec![SettingSchema::new("/TemperatureType", 2.0, 0.0, 6.0)],
            alarms: vec![],
        }
    }
}

pub struct BatteryRole;

impl Role for BatteryRole {
    fn schema(&self) -> RoleSchema {
        RoleSchema {
            name: Some("battery".to_string()),
            dev_instance: Some(20),
            ..RoleSchema::default()
        }
    }
}

/// Binary input such as a reed contact. Devices publish `InputState`; the
/// role derives `State`, honouring `/InvertTranslation`.
pub struct DigitalInputRole;

impl Role for DigitalInputRole {
    fn schema(&self) -> RoleSchema {
        RoleSchema {
            name: Some("digitalinput".to_string()),
            dev_instance: Some(10),
            settings: vec![SettingSchema::new("/InvertTranslation", 0.0, 0.0, 1.0)],
            alarms: vec![],
        }
    }

    fn update_data(&self, state: &dyn StateAccess, data: &mut ValueMap) {
        let Some(input) = data.get("InputState").map(SensorValue::is_truthy) else {
            return;
        };
        let invert = state.get_bool("/InvertTranslation");
        data.insert(
            "State".to_string(),
            SensorValue::I64(i64::from(input != invert)),
        );
    }
}

pub struct MovementRole;

impl Role for MovementRole {
    fn schema(&self) -> RoleSchema {
        RoleSchema {
            name: Some("movement".to_string()),
            dev_instance: Some(30),
            ..RoleSchema::default()
        }
    }
}
