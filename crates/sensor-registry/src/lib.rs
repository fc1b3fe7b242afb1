//! sensor-registry: declarative BLE advertisement decoding into role services

mod types;
pub use types::*;

mod error;
pub use error::{ConfigError, FieldError, HubError};

mod state;
pub use state::{clear_path, PublishedState, StateAccess};

mod decode;
pub use decode::{decode_field, load_number, load_str, try_decode_field};

mod schema;
pub use schema::{
    AlarmRule, AlarmSchema, DeviceSchema, RegisterSchema, RoleSchema, SettingPropsSchema,
    SettingSchema,
};

mod validate;
pub use validate::{validate_device, validate_role};

pub mod roles;
pub use roles::{builtin_roles, RegisteredRole, Role, RoleRegistry, RoleRegistryBuilder};

mod device;
pub use device::{
    decode_registers, DecodedPayload, DeviceCatalog, DeviceClass, DeviceDecoder, DeviceIdentity,
};

pub mod devices;
pub use devices::builtin_catalog;

pub mod alarm;

mod config;
pub use config::HubConfig;

mod hub;
pub use hub::{InstanceAllocator, RoleService, RoleSnapshot, SensorHub, TrackedDevice};

mod loader;
pub use loader::{load_descriptor_file, load_descriptors_dir, load_hub_config};

mod metrics;
pub use metrics::{MetricsHub, SensorMetrics};
