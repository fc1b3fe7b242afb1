use crate::state::{PublishedState, StateAccess};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Role name marking a register as decoded but not published to any role.
pub const IGNORE_ROLE: &str = "ignore";

/// Scalar kind of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Byte,
    Int8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
}

impl FieldType {
    /// Width used when a register does not carry explicit `bits`.
    pub fn default_bits(self) -> Option<u32> {
        match self {
            FieldType::Boolean | FieldType::Byte | FieldType::Int8 => Some(8),
            FieldType::Int16 | FieldType::UInt16 => Some(16),
            FieldType::Int32 | FieldType::UInt32 => Some(32),
            FieldType::Int64 | FieldType::UInt64 | FieldType::Double => Some(64),
            FieldType::String => None,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }
}

/// Decoded register value, as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Text(String),
}

impl SensorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SensorValue::I64(v) => Some(*v as f64),
            SensorValue::U64(v) => Some(*v as f64),
            SensorValue::F64(v) => Some(*v),
            SensorValue::Text(_) => None,
        }
    }

    /// Truthiness: non-zero numbers, `true`, non-empty text.
    pub fn is_truthy(&self) -> bool {
        match self {
            SensorValue::Bool(b) => *b,
            SensorValue::Text(s) => !s.is_empty(),
            other => other.as_f64().is_some_and(|v| v != 0.0),
        }
    }

    /// Integral numbers are published as integers, everything else as floats.
    pub fn from_number(v: f64) -> Self {
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
            SensorValue::I64(v as i64)
        } else {
            SensorValue::F64(v)
        }
    }
}

impl From<bool> for SensorValue {
    fn from(v: bool) -> Self {
        SensorValue::Bool(v)
    }
}

impl From<i64> for SensorValue {
    fn from(v: i64) -> Self {
        SensorValue::I64(v)
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        SensorValue::F64(v)
    }
}

impl From<&str> for SensorValue {
    fn from(v: &str) -> Self {
        SensorValue::Text(v.to_string())
    }
}

/// Field name -> value, for one role.
pub type ValueMap = BTreeMap<String, SensorValue>;

/// Intermediate numeric value flowing through mask/shift/scale/bias/xlate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }

    pub fn into_value(self) -> SensorValue {
        match self {
            Numeric::Int(v) => {
                if let Ok(i) = i64::try_from(v) {
                    SensorValue::I64(i)
                } else if let Ok(u) = u64::try_from(v) {
                    SensorValue::U64(u)
                } else {
                    SensorValue::F64(v as f64)
                }
            }
            Numeric::Float(v) => SensorValue::F64(v),
        }
    }
}

/// Register modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegFlag {
    BigEndian,
    Invalid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegFlags {
    pub big_endian: bool,
    pub invalid: bool,
}

impl RegFlags {
    pub fn from_list(flags: &[RegFlag]) -> Self {
        Self {
            big_endian: flags.contains(&RegFlag::BigEndian),
            invalid: flags.contains(&RegFlag::Invalid),
        }
    }
}

#[derive(Clone)]
pub struct XlateFn(Arc<dyn Fn(Numeric) -> Numeric + Send + Sync>);

impl XlateFn {
    pub fn new(f: impl Fn(Numeric) -> Numeric + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, v: Numeric) -> Numeric {
        (self.0)(v)
    }
}

impl fmt::Debug for XlateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("XlateFn(..)")
    }
}

/// Post-decode value translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Xlate {
    /// Reinterpret an unsigned byte as two's complement.
    ByteToSigned,
    /// Reinterpret an unsigned 16-bit word as two's complement.
    WordToSigned,
    #[serde(skip)]
    Custom(XlateFn),
}

impl Xlate {
    pub fn apply(&self, v: Numeric) -> Numeric {
        match self {
            Xlate::ByteToSigned => to_signed(v, 8),
            Xlate::WordToSigned => to_signed(v, 16),
            Xlate::Custom(f) => f.call(v),
        }
    }
}

fn to_signed(v: Numeric, width: u32) -> Numeric {
    match v {
        Numeric::Int(i) if i >= 1 << (width - 1) && i < 1 << width => Numeric::Int(i - (1 << width)),
        other => other,
    }
}

/// Which roles a register contributes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleTarget {
    /// Every role the device declares.
    All,
    /// Decoded but published nowhere.
    Ignore,
    Only(Vec<String>),
}

/// One validated field inside a manufacturer payload.
#[derive(Debug, Clone)]
pub struct RegisterSpec {
    pub name: String,
    pub offset: usize,
    pub field_type: FieldType,
    pub bits: Option<u32>,
    pub mask: Option<u64>,
    pub shift: Option<u32>,
    pub scale: Option<f64>,
    pub bias: Option<f64>,
    pub flags: RegFlags,
    pub inval: Option<f64>,
    pub xlate: Option<Xlate>,
    pub roles: RoleTarget,
}

impl RegisterSpec {
    /// Minimal numeric register, mostly useful for flag probes and tests.
    pub fn new(name: &str, field_type: FieldType, offset: usize) -> Self {
        Self {
            name: name.to_string(),
            offset,
            field_type,
            bits: None,
            mask: None,
            shift: None,
            scale: None,
            bias: None,
            flags: RegFlags::default(),
            inval: None,
            xlate: None,
            roles: RoleTarget::All,
        }
    }

    /// Single bit probe at `offset`, bit `shift`.
    pub fn bit(name: &str, offset: usize, shift: u32) -> Self {
        Self {
            bits: Some(1),
            shift: Some(shift),
            ..Self::new(name, FieldType::Boolean, offset)
        }
    }

    pub fn effective_bits(&self) -> Option<u32> {
        self.bits.or_else(|| self.field_type.default_bits())
    }
}

/// Alarm level written to the alarm path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlarmLevel {
    Ok = 0,
    Warning = 1,
    Alarm = 2,
}

impl AlarmLevel {
    pub fn from_flag(active: bool) -> Self {
        if active {
            AlarmLevel::Warning
        } else {
            AlarmLevel::Ok
        }
    }
}

impl From<AlarmLevel> for SensorValue {
    fn from(level: AlarmLevel) -> Self {
        SensorValue::I64(level as i64)
    }
}

#[derive(Clone)]
pub struct AlarmFn(Arc<dyn Fn(&dyn StateAccess) -> AlarmLevel + Send + Sync>);

impl AlarmFn {
    pub fn new(f: impl Fn(&dyn StateAccess) -> AlarmLevel + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, state: &dyn StateAccess) -> AlarmLevel {
        (self.0)(state)
    }
}

impl fmt::Debug for AlarmFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AlarmFn(..)")
    }
}

/// Invoked with the role service state after a setting changed.
#[derive(Clone)]
pub struct SettingCallback(Arc<dyn Fn(&mut PublishedState, f64) + Send + Sync>);

impl SettingCallback {
    pub fn new(f: impl Fn(&mut PublishedState, f64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, state: &mut PublishedState, value: f64) {
        (self.0)(state, value)
    }
}

impl fmt::Debug for SettingCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SettingCallback(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingProps {
    pub def: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct SettingSpec {
    pub name: String,
    pub props: SettingProps,
    pub on_change: Option<SettingCallback>,
}

#[derive(Debug, Clone)]
pub struct AlarmSpec {
    pub name: String,
    pub update: AlarmFn,
}

/// Validated role definition.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub name: String,
    pub dev_instance: u32,
    pub settings: Vec<SettingSpec>,
    pub alarms: Vec<AlarmSpec>,
}

/// Validated configuration of one device class, as seen for one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub manufacturer_id: u16,
    pub product_id: u16,
    pub product_name: String,
    pub device_name: String,
    pub hardware_version: String,
    pub firmware_version: String,
    pub device_prefix: String,
    pub roles: Vec<String>,
    pub regs: Vec<RegisterSpec>,
    pub settings: Vec<SettingSpec>,
    pub alarms: Vec<AlarmSpec>,
}
