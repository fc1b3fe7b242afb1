//! Generic alarm evaluation over published state.

use crate::state::{PublishedState, StateAccess};
use crate::types::{AlarmLevel, AlarmSpec};

pub fn evaluate(alarm: &AlarmSpec, state: &dyn StateAccess) -> AlarmLevel {
    alarm.update.call(state)
}

/// Create every alarm path, cleared.
pub fn init_alarms(alarms: &[AlarmSpec], state: &mut PublishedState) {
    for alarm in alarms {
        state.set(&alarm.name, AlarmLevel::Ok);
    }
}

/// Re-evaluate alarms in order, writing each level back before the next one
/// runs. Returns the alarms whose level changed.
pub fn refresh(alarms: &[AlarmSpec], state: &mut PublishedState) -> Vec<(String, AlarmLevel)> {
    let mut changed = Vec::new();
    for alarm in alarms {
        let level = evaluate(alarm, state);
        if state.set(&alarm.name, level) {
            tracing::info!(alarm = %alarm.name, ?level, "alarm changed");
            changed.push((alarm.name.clone(), level));
        }
    }
    changed
}
