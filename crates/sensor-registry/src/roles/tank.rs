use super::Role;
use crate::schema::{AlarmSchema, RoleSchema, SettingSchema};
use crate::state::StateAccess;
use crate::types::{AlarmFn, AlarmLevel};

/// Tank level sensor. Devices claiming this role must publish `Level` (percent).
pub struct TankRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    High,
    Low,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::High => "/Alarms/High",
            Direction::Low => "/Alarms/Low",
        }
    }
}

/// Level alarm with hysteresis: an active alarm is compared against the
/// `Restore` threshold, an inactive one against `Active`.
fn level_alarm(state: &dyn StateAccess, direction: Direction) -> AlarmLevel {
    let prefix = direction.prefix();
    if !state.get_bool(&format!("{prefix}/Enable")) {
        return AlarmLevel::Ok;
    }
    let raised = state.get_bool(&format!("{prefix}/State"));
    let threshold = if raised { "Restore" } else { "Active" };
    let (Some(threshold), Some(level)) = (
        state.get_f64(&format!("{prefix}/{threshold}")),
        state.get_f64("Level"),
    ) else {
        return AlarmLevel::Ok;
    };
    let active = match direction {
        Direction::High => level > threshold,
        Direction::Low => level < threshold,
    };
    AlarmLevel::from_flag(active)
}

impl Role for TankRole {
    fn schema(&self) -> RoleSchema {
        RoleSchema {
            name: Some("tank".to_string()),
            dev_instance: Some(20),
            settings: vec![
                SettingSchema::new("/Alarms/High/Enable", 0.0, 0.0, 1.0),
                SettingSchema::new("/Alarms/High/Active", 90.0, 0.0, 100.0),
                SettingSchema::new("/Alarms/High/Restore", 80.0, 0.0, 100.0),
                SettingSchema::new("/Alarms/Low/Enable", 0.0, 0.0, 1.0),
                SettingSchema::new("/Alarms/Low/Active", 10.0, 0.0, 100.0),
                SettingSchema::new("/Alarms/Low/Restore", 15.0, 0.0, 100.0),
            ],
            alarms: vec![
                AlarmSchema::new(
                    "/Alarms/High/State",
                    AlarmFn::new(|state| level_alarm(state, Direction::High)),
                ),
                AlarmSchema::new(
                    "/Alarms/Low/State",
                    AlarmFn::new(|state| level_alarm(state, Direction::Low)),
                ),
            ],
        }
    }
}
