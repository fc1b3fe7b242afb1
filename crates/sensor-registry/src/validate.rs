//! Schema validation: turns declarative schemas into validated specs.
//!
//! Validation fails fast on the first violation and never yields a partially
//! usable configuration.

use crate::error::ConfigError;
use crate::roles::RoleRegistry;
use crate::schema::{AlarmSchema, DeviceSchema, RegisterSchema, RoleSchema, SettingSchema};
use crate::types::{
    AlarmSpec, DeviceConfig, FieldType, RegFlags, RegisterSpec, RoleSpec, RoleTarget,
    SettingProps, SettingSpec, IGNORE_ROLE,
};
use std::collections::HashSet;

pub fn validate_role(schema: RoleSchema) -> Result<RoleSpec, ConfigError> {
    let owner = schema.name.clone().unwrap_or_else(|| "role".to_string());
    let name = required(schema.name, &owner, "name")?;
    let dev_instance = required(schema.dev_instance, &owner, "dev_instance")?;
    Ok(RoleSpec {
        name,
        dev_instance,
        settings: validate_settings(schema.settings, &owner)?,
        alarms: validate_alarms(schema.alarms, &owner)?,
    })
}

pub fn validate_device(
    schema: DeviceSchema,
    roles: &RoleRegistry,
) -> Result<DeviceConfig, ConfigError> {
    let owner = schema
        .device_name
        .clone()
        .or_else(|| schema.product_name.clone())
        .unwrap_or_else(|| "device".to_string());

    let manufacturer_id = required(schema.manufacturer_id, &owner, "manufacturer_id")?;
    let product_id = required(schema.product_id, &owner, "product_id")?;
    let product_name = required(schema.product_name, &owner, "product_name")?;
    let device_name = required(schema.device_name, &owner, "device_name")?;
    let device_prefix = required(schema.device_prefix, &owner, "device_prefix")?;
    let role_names = required(schema.roles, &owner, "roles")?;
    let reg_schemas = required(schema.regs, &owner, "regs")?;

    let mut declared = Vec::new();
    for role in role_names {
        if role == IGNORE_ROLE {
            continue;
        }
        if !roles.contains(&role) {
            return Err(ConfigError::UnknownRole { owner, role });
        }
        if !declared.contains(&role) {
            declared.push(role);
        }
    }
    if declared.is_empty() {
        return Err(ConfigError::Empty {
            owner,
            key: "roles",
        });
    }
    if reg_schemas.is_empty() {
        return Err(ConfigError::Empty { owner, key: "regs" });
    }

    let mut seen = HashSet::new();
    let mut regs = Vec::with_capacity(reg_schemas.len());
    for (index, reg) in reg_schemas.into_iter().enumerate() {
        let reg = validate_register(reg, index, &owner, roles, &declared)?;
        if !seen.insert(reg.name.clone()) {
            return Err(ConfigError::DuplicateRegister {
                owner,
                register: reg.name,
            });
        }
        regs.push(reg);
    }

    Ok(DeviceConfig {
        manufacturer_id,
        product_id,
        product_name,
        device_name,
        hardware_version: schema.hardware_version.unwrap_or_else(default_version),
        firmware_version: schema.firmware_version.unwrap_or_else(default_version),
        device_prefix,
        roles: declared,
        regs,
        settings: validate_settings(schema.settings, &owner)?,
        alarms: validate_alarms(schema.alarms, &owner)?,
    })
}

fn validate_register(
    reg: RegisterSchema,
    index: usize,
    owner: &str,
    registry: &RoleRegistry,
    declared: &[String],
) -> Result<RegisterSpec, ConfigError> {
    let name = reg.name.ok_or_else(|| ConfigError::MissingName {
        owner: owner.to_string(),
        item: "reg",
        index,
    })?;
    let missing = |key: &'static str| ConfigError::MissingItemKey {
        owner: owner.to_string(),
        item: "reg",
        name: name.clone(),
        key,
    };
    let invalid = |key: &'static str, reason: &str| ConfigError::InvalidRegister {
        owner: owner.to_string(),
        register: name.clone(),
        key,
        reason: reason.to_string(),
    };

    let field_type = reg.field_type.ok_or_else(|| missing("type"))?;
    let offset = reg.offset.ok_or_else(|| missing("offset"))?;

    match (field_type, reg.bits) {
        (FieldType::String, None) => return Err(missing("bits")),
        (FieldType::String, Some(bits)) if bits == 0 || bits % 8 != 0 => {
            return Err(invalid("bits", "must be a positive multiple of 8"));
        }
        (FieldType::String, Some(_)) => {}
        (_, Some(bits)) if bits == 0 || bits > 64 => {
            return Err(invalid("bits", "must be between 1 and 64"));
        }
        _ => {}
    }
    if reg.shift.is_some_and(|s| s >= 64) {
        return Err(invalid("shift", "must be below 64"));
    }
    if reg.scale.is_some_and(|s| s == 0.0 || !s.is_finite()) {
        return Err(invalid("scale", "must be a non-zero finite number"));
    }
    if reg
        .bias
        .is_some_and(|b| !b.is_finite() || b.abs() >= i64::MAX as f64)
    {
        return Err(invalid("bias", "must be a finite number within the i64 range"));
    }
    if field_type == FieldType::Double
        && reg.bits.is_none()
        && (reg.mask.is_some() || reg.shift.is_some())
    {
        return Err(invalid("bits", "is required to mask or shift a double"));
    }

    let flags = RegFlags::from_list(&reg.flags);
    if flags.invalid && reg.inval.is_none() {
        return Err(missing("inval"));
    }

    let roles = match reg.roles {
        None => RoleTarget::All,
        Some(list) if list.iter().any(|r| r == IGNORE_ROLE) => RoleTarget::Ignore,
        Some(list) => {
            for role in &list {
                if !registry.contains(role) {
                    return Err(ConfigError::UnknownRegisterRole {
                        owner: owner.to_string(),
                        register: name,
                        role: role.clone(),
                    });
                }
                if !declared.contains(role) {
                    return Err(ConfigError::UndeclaredRole {
                        owner: owner.to_string(),
                        register: name,
                        role: role.clone(),
                    });
                }
            }
            RoleTarget::Only(list)
        }
    };

    Ok(RegisterSpec {
        name,
        offset,
        field_type,
        bits: reg.bits,
        mask: reg.mask,
        shift: reg.shift,
        scale: reg.scale,
        bias: reg.bias,
        flags,
        inval: reg.inval,
        xlate: reg.xlate,
        roles,
    })
}

fn validate_settings(
    settings: Vec<SettingSchema>,
    owner: &str,
) -> Result<Vec<SettingSpec>, ConfigError> {
    settings
        .into_iter()
        .enumerate()
        .map(|(index, setting)| {
            let name = setting.name.ok_or_else(|| ConfigError::MissingName {
                owner: owner.to_string(),
                item: "setting",
                index,
            })?;
            let missing = |key: &'static str| ConfigError::MissingItemKey {
                owner: owner.to_string(),
                item: "setting",
                name: name.clone(),
                key,
            };
            let props = setting.props.ok_or_else(|| missing("props"))?;
            let props = SettingProps {
                def: props.def.ok_or_else(|| missing("def"))?,
                min: props.min.ok_or_else(|| missing("min"))?,
                max: props.max.ok_or_else(|| missing("max"))?,
            };
            if !(props.min <= props.def && props.def <= props.max) {
                return Err(ConfigError::InvalidSettingRange {
                    owner: owner.to_string(),
                    setting: name,
                });
            }
            Ok(SettingSpec {
                name,
                props,
                on_change: setting.on_change,
            })
        })
        .collect()
}

fn validate_alarms(alarms: Vec<AlarmSchema>, owner: &str) -> Result<Vec<AlarmSpec>, ConfigError> {
    alarms
        .into_iter()
        .enumerate()
        .map(|(index, alarm)| {
            let name = alarm.name.ok_or_else(|| ConfigError::MissingName {
                owner: owner.to_string(),
                item: "alarm",
                index,
            })?;
            let update = match (alarm.update, alarm.rule) {
                (Some(update), _) => update,
                (None, Some(rule)) => rule.into_update(),
                (None, None) => {
                    return Err(ConfigError::MissingItemKey {
                        owner: owner.to_string(),
                        item: "alarm",
                        name,
                        key: "update",
                    })
                }
            };
            Ok(AlarmSpec { name, update })
        })
        .collect()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn required<T>(value: Option<T>, owner: &str, key: &'static str) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey {
        owner: owner.to_string(),
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::builtin_roles;
    use crate::schema::{AlarmRule, SettingSchema};
    use crate::types::AlarmLevel;

    fn device() -> DeviceSchema {
        DeviceSchema {
            manufacturer_id: Some(0x0499),
            product_id: Some(0x3001),
            product_name: Some("Probe".to_string()),
            device_name: Some("Probe 884F".to_string()),
            device_prefix: Some("probe".to_string()),
            roles: Some(vec!["temperature".to_string()]),
            regs: Some(vec![RegisterSchema::new("Temperature", FieldType::Int16, 1)]),
            ..DeviceSchema::default()
        }
    }

    #[test]
    fn test_valid_device() {
        let roles = builtin_roles().unwrap();
        let cfg = validate_device(device(), &roles).unwrap();
        assert_eq!(cfg.roles, vec!["temperature"]);
        assert_eq!(cfg.regs.len(), 1);
        assert_eq!(cfg.regs[0].roles, RoleTarget::All);
        assert_eq!(cfg.hardware_version, "1.0.0");
    }

    #[test]
    fn test_missing_regs_rejected() {
        let roles = builtin_roles().unwrap();
        let schema = DeviceSchema {
            regs: None,
            ..device()
        };
        assert_eq!(
            validate_device(schema, &roles).unwrap_err(),
            ConfigError::MissingKey {
                owner: "Probe 884F".to_string(),
                key: "regs"
            }
        );
    }

    #[test]
    fn test_empty_roles_rejected() {
        let roles = builtin_roles().unwrap();
        let schema = DeviceSchema {
            roles: Some(vec![]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::Empty { key: "roles", .. })
        ));
    }

    #[test]
    fn test_unknown_roles_rejected() {
        let roles = builtin_roles().unwrap();
        let schema = DeviceSchema {
            roles: Some(vec!["sonar".to_string()]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::UnknownRole { .. })
        ));

        let schema = DeviceSchema {
            regs: Some(vec![
                RegisterSchema::new("Temperature", FieldType::Int16, 1).roles(["sonar"])
            ]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::UnknownRegisterRole { .. })
        ));

        let schema = DeviceSchema {
            regs: Some(vec![
                RegisterSchema::new("Level", FieldType::Byte, 1).roles(["tank"])
            ]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::UndeclaredRole { .. })
        ));
    }

    #[test]
    fn test_ignore_sentinel() {
        let roles = builtin_roles().unwrap();
        let schema = DeviceSchema {
            roles: Some(vec!["temperature".to_string(), IGNORE_ROLE.to_string()]),
            regs: Some(vec![
                RegisterSchema::new("Version", FieldType::Byte, 0).roles([IGNORE_ROLE])
            ]),
            ..device()
        };
        let cfg = validate_device(schema, &roles).unwrap();
        assert_eq!(cfg.roles, vec!["temperature"]);
        assert_eq!(cfg.regs[0].roles, RoleTarget::Ignore);
    }

    #[test]
    fn test_register_keys() {
        let roles = builtin_roles().unwrap();
        let nameless = RegisterSchema {
            name: None,
            ..RegisterSchema::new("x", FieldType::Byte, 0)
        };
        let schema = DeviceSchema {
            regs: Some(vec![nameless]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::MissingName { item: "reg", index: 0, .. })
        ));

        let typeless = RegisterSchema {
            field_type: None,
            ..RegisterSchema::new("x", FieldType::Byte, 0)
        };
        let schema = DeviceSchema {
            regs: Some(vec![typeless]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::MissingItemKey { key: "type", .. })
        ));
    }

    #[test]
    fn test_bias_range() {
        let roles = builtin_roles().unwrap();
        for bias in [1.8e38, f64::INFINITY, f64::NAN] {
            let schema = DeviceSchema {
                regs: Some(vec![RegisterSchema::new("Temperature", FieldType::Int16, 1).bias(bias)]),
                ..device()
            };
            assert!(matches!(
                validate_device(schema, &roles),
                Err(ConfigError::InvalidRegister { key: "bias", .. })
            ));
        }
        let schema = DeviceSchema {
            regs: Some(vec![RegisterSchema::new("Temperature", FieldType::Int16, 1).bias(-40.0)]),
            ..device()
        };
        assert!(validate_device(schema, &roles).is_ok());
    }

    #[test]
    fn test_string_bits() {
        let roles = builtin_roles().unwrap();
        for (bits, ok) in [(None, false), (Some(12), false), (Some(0), false), (Some(40), true)] {
            let reg = RegisterSchema {
                bits,
                ..RegisterSchema::new("Name", FieldType::String, 0)
            };
            let schema = DeviceSchema {
                regs: Some(vec![reg]),
                ..device()
            };
            assert_eq!(validate_device(schema, &roles).is_ok(), ok, "bits={bits:?}");
        }
    }

    #[test]
    fn test_duplicate_register() {
        let roles = builtin_roles().unwrap();
        let schema = DeviceSchema {
            regs: Some(vec![
                RegisterSchema::new("T", FieldType::Byte, 0),
                RegisterSchema::new("T", FieldType::Byte, 1),
            ]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::DuplicateRegister { .. })
        ));
    }

    #[test]
    fn test_invalid_flag_needs_sentinel() {
        let roles = builtin_roles().unwrap();
        let mut reg = RegisterSchema::new("T", FieldType::Byte, 0);
        reg.flags.push(crate::types::RegFlag::Invalid);
        let schema = DeviceSchema {
            regs: Some(vec![reg]),
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::MissingItemKey { key: "inval", .. })
        ));
    }

    #[test]
    fn test_setting_props() {
        let roles = builtin_roles().unwrap();
        let mut setting = SettingSchema::new("/Offset", 0.0, -10.0, 10.0);
        if let Some(props) = setting.props.as_mut() {
            props.max = None;
        }
        let schema = DeviceSchema {
            settings: vec![setting],
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::MissingItemKey { key: "max", .. })
        ));

        let schema = DeviceSchema {
            settings: vec![SettingSchema::new("/Offset", 20.0, -10.0, 10.0)],
            ..device()
        };
        assert!(matches!(
            validate_device(schema, &roles),
            Err(ConfigError::InvalidSettingRange { .. })
        ));
    }

    #[test]
    fn test_role_alarm_without_update_rejected() {
        let schema = RoleSchema {
            name: Some("tank".to_string()),
            dev_instance: Some(20),
            settings: vec![],
            alarms: vec![AlarmSchema {
                name: Some("/Alarms/High/State".to_string()),
                update: None,
                rule: None,
            }],
        };
        assert_eq!(
            validate_role(schema).unwrap_err(),
            ConfigError::MissingItemKey {
                owner: "tank".to_string(),
                item: "alarm",
                name: "/Alarms/High/State".to_string(),
                key: "update",
            }
        );
    }

    #[test]
    fn test_role_alarm_from_rule() {
        let schema = RoleSchema {
            name: Some("battery".to_string()),
            dev_instance: Some(20),
            settings: vec![],
            alarms: vec![AlarmSchema {
                name: Some("/Alarms/LowVoltage".to_string()),
                update: None,
                rule: Some(AlarmRule::Below {
                    path: "Voltage".to_string(),
                    threshold: 11.5,
                }),
            }],
        };
        let spec = validate_role(schema).unwrap();
        let state = crate::state::PublishedState::new();
        assert_eq!(spec.alarms[0].update.call(&state), AlarmLevel::Ok);
    }

    #[test]
    fn test_role_missing_instance() {
        let schema = RoleSchema {
            name: Some("x".to_string()),
            ..RoleSchema::default()
        };
        assert!(matches!(
            validate_role(schema),
            Err(ConfigError::MissingKey { key: "dev_instance", .. })
        ));
    }
}
