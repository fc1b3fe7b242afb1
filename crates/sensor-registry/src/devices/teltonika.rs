//! Teltonika EYE Sensor (BTSMP1) and EYE Beacon (BTSID1).
//!
//! Both share one advertising format: a version byte, a flag byte, then the
//! optional sections selected by the flags, in flag order. Only the presence
//! of sections differs between the two products.

use crate::decode::decode_field;
use crate::device::DeviceClass;
use crate::schema::{AlarmSchema, DeviceSchema, RegisterSchema};
use crate::state::StateAccess;
use crate::types::{AlarmFn, AlarmLevel, FieldType, RegisterSpec, Xlate, IGNORE_ROLE};

pub const MANUFACTURER_ID: u16 = 0x089A;
pub const PRODUCT_ID: u16 = 0x3042;

const FLAG_OFFSET: usize = 1;
const FLAG_TEMPERATURE: u32 = 0;
const FLAG_HUMIDITY: u32 = 1;
const FLAG_MAGNET_PRESENT: u32 = 2;
const FLAG_MOVEMENT: u32 = 4;
const FLAG_ANGLES: u32 = 5;
const FLAG_BATTERY_VOLTAGE: u32 = 7;

#[derive(Debug, Default, Clone, Copy)]
pub struct TeltonikaEye;

fn flag(payload: &[u8], bit: u32) -> bool {
    decode_field(&RegisterSpec::bit("Flag", FLAG_OFFSET, bit), payload)
        .is_some_and(|v| v.is_truthy())
}

/// Build the register table selected by the flag byte of `payload`.
fn layout(payload: &[u8]) -> (Vec<RegisterSchema>, Vec<String>) {
    let mut regs = vec![
        RegisterSchema::new("Version", FieldType::Byte, 0).roles([IGNORE_ROLE]),
        RegisterSchema::new("EyeFlags", FieldType::Byte, FLAG_OFFSET).roles([IGNORE_ROLE]),
        RegisterSchema::new("LowBattery", FieldType::Boolean, FLAG_OFFSET)
            .shift(6)
            .bits(1),
    ];
    let mut roles: Vec<String> = Vec::new();
    let mut claim = |role: &str| {
        if !roles.iter().any(|r| r == role) {
            roles.push(role.to_string());
        }
    };
    let mut cursor = FLAG_OFFSET + 1;

    if flag(payload, FLAG_MAGNET_PRESENT) {
        regs.push(
            RegisterSchema::new("InputState", FieldType::Boolean, FLAG_OFFSET)
                .shift(3)
                .bits(1)
                .roles(["digitalinput"]),
        );
        claim("digitalinput");
    }
    if flag(payload, FLAG_TEMPERATURE) {
        regs.push(
            RegisterSchema::new("Temperature", FieldType::Int16, cursor)
                .scale(100.0)
                .big_endian()
                .roles(["temperature"]),
        );
        claim("temperature");
        cursor += 2;
    }
    if flag(payload, FLAG_HUMIDITY) {
        regs.push(RegisterSchema::new("Humidity", FieldType::Byte, cursor).roles(["temperature"]));
        claim("temperature");
        cursor += 1;
    }
    if flag(payload, FLAG_MOVEMENT) {
        regs.push(
            RegisterSchema::new("MovementState", FieldType::Boolean, cursor)
                .shift(7)
                .bits(1)
                .roles(["movement"]),
        );
        regs.push(
            RegisterSchema::new("MovementCount", FieldType::UInt16, cursor)
                .mask(0x7FFF)
                .big_endian()
                .roles(["movement"]),
        );
        claim("movement");
        cursor += 2;
    }
    if flag(payload, FLAG_ANGLES) {
        regs.push(
            RegisterSchema::new("Pitch", FieldType::Byte, cursor)
                .xlate(Xlate::ByteToSigned)
                .roles(["movement"]),
        );
        cursor += 1;
        regs.push(
            RegisterSchema::new("Roll", FieldType::Int16, cursor)
                .big_endian()
                .roles(["movement"]),
        );
        claim("movement");
        cursor += 2;
    }
    if flag(payload, FLAG_BATTERY_VOLTAGE) {
        // One byte: millivolts = raw * 10 + 2000.
        regs.push(
            RegisterSchema::new("BatteryVoltage", FieldType::Byte, cursor)
                .scale(0.1)
                .bias(2000.0),
        );
    }
    (regs, roles)
}

fn low_battery(state: &dyn StateAccess) -> AlarmLevel {
    AlarmLevel::from_flag(state.get_f64("LowBattery").unwrap_or(0.0) >= 1.0)
}

impl DeviceClass for TeltonikaEye {
    fn manufacturer_id(&self) -> u16 {
        MANUFACTURER_ID
    }

    fn configure(&self, payload: &[u8]) -> DeviceSchema {
        let (regs, roles) = layout(payload);
        tracing::trace!(regs = regs.len(), ?roles, "computed teltonika layout");
        DeviceSchema {
            manufacturer_id: Some(MANUFACTURER_ID),
            product_id: Some(PRODUCT_ID),
            product_name: Some("TeltonikaEye".to_string()),
            device_prefix: Some("teltonika".to_string()),
            roles: Some(roles),
            regs: Some(regs),
            alarms: vec![AlarmSchema::new("/Alarms/LowBattery", AlarmFn::new(low_battery))],
            ..DeviceSchema::default()
        }
    }

    fn dynamic_layout(&self) -> bool {
        true
    }
}
