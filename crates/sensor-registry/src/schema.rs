//! Declarative, not yet validated configuration.
//!
//! Every mandatory key is an `Option` here so that absence can be reported by
//! the validator with full context instead of failing deep inside decoding.
//! YAML descriptors deserialize straight into these types; Rust device classes
//! build them with the small builder methods below.

use crate::state::StateAccess;
use crate::types::{AlarmFn, AlarmLevel, FieldType, RegFlag, SettingCallback, Xlate};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceSchema {
    pub manufacturer_id: Option<u16>,
    pub product_id: Option<u16>,
    pub product_name: Option<String>,
    pub device_name: Option<String>,
    pub hardware_version: Option<String>,
    pub firmware_version: Option<String>,
    pub device_prefix: Option<String>,
    pub roles: Option<Vec<String>>,
    pub regs: Option<Vec<RegisterSchema>>,
    #[serde(default)]
    pub settings: Vec<SettingSchema>,
    #[serde(default)]
    pub alarms: Vec<AlarmSchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterSchema {
    pub name: Option<String>,
    pub offset: Option<usize>,
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub bits: Option<u32>,
    pub mask: Option<u64>,
    pub shift: Option<u32>,
    pub scale: Option<f64>,
    pub bias: Option<f64>,
    #[serde(default)]
    pub flags: Vec<RegFlag>,
    pub inval: Option<f64>,
    pub xlate: Option<Xlate>,
    pub roles: Option<Vec<String>>,
}

impl RegisterSchema {
    pub fn new(name: &str, field_type: FieldType, offset: usize) -> Self {
        Self {
            name: Some(name.to_string()),
            field_type: Some(field_type),
            offset: Some(offset),
            ..Self::default()
        }
    }

    pub fn bits(mut self, bits: u32) -> Self {
        self.bits = Some(bits);
        self
    }

    pub fn shift(mut self, shift: u32) -> Self {
        self.shift = Some(shift);
        self
    }

    pub fn mask(mut self, mask: u64) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn bias(mut self, bias: f64) -> Self {
        self.bias = Some(bias);
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.flags.push(RegFlag::BigEndian);
        self
    }

    pub fn invalid_when(mut self, inval: f64) -> Self {
        self.flags.push(RegFlag::Invalid);
        self.inval = Some(inval);
        self
    }

    pub fn xlate(mut self, xlate: Xlate) -> Self {
        self.xlate = Some(xlate);
        self
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingPropsSchema {
    pub def: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingSchema {
    pub name: Option<String>,
    pub props: Option<SettingPropsSchema>,
    #[serde(skip)]
    pub on_change: Option<SettingCallback>,
}

impl SettingSchema {
    pub fn new(name: &str, def: f64, min: f64, max: f64) -> Self {
        Self {
            name: Some(name.to_string()),
            props: Some(SettingPropsSchema {
                def: Some(def),
                min: Some(min),
                max: Some(max),
            }),
            on_change: None,
        }
    }

    pub fn on_change(mut self, callback: SettingCallback) -> Self {
        self.on_change = Some(callback);
        self
    }
}

/// Alarm conditions expressible in a descriptor file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlarmRule {
    /// Raised while `path` is truthy.
    Flag { path: String },
    /// Raised while `path` is strictly above `threshold`.
    Above { path: String, threshold: f64 },
    /// Raised while `path` is strictly below `threshold`.
    Below { path: String, threshold: f64 },
}

impl AlarmRule {
    pub fn into_update(self) -> AlarmFn {
        AlarmFn::new(move |state: &dyn StateAccess| {
            let active = match &self {
                AlarmRule::Flag { path } => state.get_bool(path),
                AlarmRule::Above { path, threshold } => {
                    state.get_f64(path).is_some_and(|v| v > *threshold)
                }
                AlarmRule::Below { path, threshold } => {
                    state.get_f64(path).is_some_and(|v| v < *threshold)
                }
            };
            AlarmLevel::from_flag(active)
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlarmSchema {
    pub name: Option<String>,
    #[serde(skip)]
    pub update: Option<AlarmFn>,
    pub rule: Option<AlarmRule>,
}

impl AlarmSchema {
    pub fn new(name: &str, update: AlarmFn) -> Self {
        Self {
            name: Some(name.to_string()),
            update: Some(update),
            rule: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleSchema {
    pub name: Option<String>,
    pub dev_instance: Option<u32>,
    #[serde(default)]
    pub settings: Vec<SettingSchema>,
    #[serde(default)]
    pub alarms: Vec<AlarmSchema>,
}
