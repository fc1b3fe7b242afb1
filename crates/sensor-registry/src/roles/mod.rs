//! Role registry: named sensor categories with settings, alarms and hooks.

mod sensors;
mod tank;

pub use sensors::{BatteryRole, DigitalInputRole, MovementRole, TemperatureRole};
pub use tank::TankRole;

use crate::error::ConfigError;
use crate::schema::RoleSchema;
use crate::state::{PublishedState, StateAccess};
use crate::types::{RoleSpec, ValueMap};
use crate::validate::validate_role;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A sensor category. Implementations supply the declarative schema and may
/// hook into service initialisation and per-advertisement data.
pub trait Role: Send + Sync {
    fn schema(&self) -> RoleSchema;

    /// Runs once per role service, after role settings and alarms exist and
    /// before device settings are added.
    fn init(&self, _state: &mut PublishedState) {}

    /// Runs on every decoded advertisement before values are published.
    fn update_data(&self, _state: &dyn StateAccess, _data: &mut ValueMap) {}
}

/// A validated role together with its behaviour.
#[derive(Clone)]
pub struct RegisteredRole {
    pub spec: RoleSpec,
    pub role: Arc<dyn Role>,
}

impl RegisteredRole {
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

impl std::fmt::Debug for RegisteredRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredRole")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct RoleRegistryBuilder {
    roles: BTreeMap<String, RegisteredRole>,
}

impl RoleRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a role. Names are unique.
    pub fn register(&mut self, role: Arc<dyn Role>) -> Result<&mut Self, ConfigError> {
        let spec = validate_role(role.schema())?;
        if self.roles.contains_key(&spec.name) {
            return Err(ConfigError::DuplicateRole(spec.name));
        }
        tracing::debug!(role = %spec.name, base_instance = spec.dev_instance, "registered role");
        self.roles
            .insert(spec.name.clone(), RegisteredRole { spec, role });
        Ok(self)
    }

    pub fn build(self) -> RoleRegistry {
        tracing::info!(roles = ?self.roles.keys().collect::<Vec<_>>(), "role registry ready");
        RoleRegistry { roles: self.roles }
    }
}

/// Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<String, RegisteredRole>,
}

impl RoleRegistry {
    pub fn builder() -> RoleRegistryBuilder {
        RoleRegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredRole> {
        self.roles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredRole> {
        self.roles.values()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Registry with every role shipped in this crate.
pub fn builtin_roles() -> Result<RoleRegistry, ConfigError> {
    let mut builder = RoleRegistry::builder();
    builder
        .register(Arc::new(TankRole))?
        .register(Arc::new(TemperatureRole))?
        .register(Arc::new(BatteryRole))?
        .register(Arc::new(DigitalInputRole))?
        .register(Arc::new(MovementRole))?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_roles() {
        let roles = builtin_roles().unwrap();
        assert_eq!(
            roles.names().collect::<Vec<_>>(),
            vec!["battery", "digitalinput", "movement", "tank", "temperature"]
        );
        assert_eq!(roles.lookup("tank").unwrap().spec.dev_instance, 20);
        assert_eq!(roles.lookup("digitalinput").unwrap().spec.dev_instance, 10);
        assert!(roles.lookup("sonar").is_none());
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let mut builder = RoleRegistry::builder();
        builder.register(Arc::new(TankRole)).unwrap();
        assert_eq!(
            builder.register(Arc::new(TankRole)).unwrap_err(),
            ConfigError::DuplicateRole("tank".to_string())
        );
    }

    struct Broken;

    impl Role for Broken {
        fn schema(&self) -> RoleSchema {
            RoleSchema {
                name: Some("broken".to_string()),
                ..RoleSchema::default()
            }
        }
    }

    #[test]
    fn test_invalid_role_rejected() {
        let mut builder = RoleRegistry::builder();
        assert!(matches!(
            builder.register(Arc::new(Broken)),
            Err(ConfigError::MissingKey { key: "dev_instance", .. })
        ));
        assert!(builder.build().is_empty());
    }
}
