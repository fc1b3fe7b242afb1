use crate::device::DeviceClass;
use crate::error::ConfigError;
use crate::roles::RoleRegistry;
use crate::schema::DeviceSchema;
use crate::validate::validate_device;

/// Static register table declared in a descriptor file.
#[derive(Debug, Clone)]
pub struct DeclarativeDevice {
    manufacturer_id: u16,
    schema: DeviceSchema,
}

impl DeclarativeDevice {
    pub fn new(schema: DeviceSchema) -> Result<Self, ConfigError> {
        let manufacturer_id = schema.manufacturer_id.ok_or_else(|| ConfigError::MissingKey {
            owner: schema
                .product_name
                .clone()
                .unwrap_or_else(|| "descriptor".to_string()),
            key: "manufacturer_id",
        })?;
        Ok(Self {
            manufacturer_id,
            schema,
        })
    }

    pub fn schema(&self) -> &DeviceSchema {
        &self.schema
    }

    /// Validate the table up front, before any device of this class is seen.
    /// The device name is only known per device, so the product name stands in.
    pub fn check(&self, roles: &RoleRegistry) -> Result<(), ConfigError> {
        let mut schema = self.schema.clone();
        if schema.device_name.is_none() {
            schema.device_name = schema.product_name.clone();
        }
        validate_device(schema, roles).map(|_| ())
    }
}

impl DeviceClass for DeclarativeDevice {
    fn manufacturer_id(&self) -> u16 {
        self.manufacturer_id
    }

    fn configure(&self, _payload: &[u8]) -> DeviceSchema {
        self.schema.clone()
    }
}
