use thiserror::Error;

/// Rejected device or role configuration. Fatal for the offending class.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{owner}: configuration '{key}' is missing")]
    MissingKey { owner: String, key: &'static str },
    #[error("{owner}: configuration '{key}' must have at least one element")]
    Empty { owner: String, key: &'static str },
    #[error("{owner}: unknown role '{role}'")]
    UnknownRole { owner: String, role: String },
    #[error("{owner}: unknown role '{role}' in reg {register}")]
    UnknownRegisterRole {
        owner: String,
        register: String,
        role: String,
    },
    #[error("{owner}: role '{role}' in reg {register} is not declared by the device")]
    UndeclaredRole {
        owner: String,
        register: String,
        role: String,
    },
    #[error("{owner}: missing 'name' in {item} at index {index}")]
    MissingName {
        owner: String,
        item: &'static str,
        index: usize,
    },
    #[error("{owner}: missing key '{key}' in {item} {name}")]
    MissingItemKey {
        owner: String,
        item: &'static str,
        name: String,
        key: &'static str,
    },
    #[error("{owner}: '{key}' in reg {register} {reason}")]
    InvalidRegister {
        owner: String,
        register: String,
        key: &'static str,
        reason: String,
    },
    #[error("{owner}: duplicate reg name '{register}'")]
    DuplicateRegister { owner: String, register: String },
    #[error("{owner}: setting {setting} must satisfy min <= def <= max")]
    InvalidSettingRange { owner: String, setting: String },
    #[error("duplicate role '{0}'")]
    DuplicateRole(String),
    #[error("duplicate device class for manufacturer 0x{0:04X}")]
    DuplicateManufacturer(u16),
}

/// Non-fatal problem decoding one field of one payload.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FieldError {
    #[error("can not parse {field}, field needs {needed} bytes at offset {offset} but payload has {available}")]
    Truncated {
        field: String,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("can not parse {field}, invalid utf-8: {source}")]
    Utf8 {
        field: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("can not parse {field}, no width for its type")]
    NoWidth { field: String },
}

/// Why the hub could not handle an advertisement or a control request.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("{mac}: device without manufacturer data")]
    NoManufacturerData { mac: String },
    #[error("{mac}: no device class for manufacturer 0x{manufacturer_id:04X}")]
    UnknownManufacturer { mac: String, manufacturer_id: u16 },
    #[error("{mac}: invalid device configuration: {source}")]
    Config {
        mac: String,
        #[source]
        source: ConfigError,
    },
    #[error("unknown device {0}")]
    UnknownDevice(String),
    #[error("{mac}: no {role} service")]
    UnknownService { mac: String, role: String },
    #[error("{service}: unknown setting {setting}")]
    UnknownSetting { service: String, setting: String },
    #[error("{service}: setting {setting} = {value} outside [{min}, {max}]")]
    SettingOutOfRange {
        service: String,
        setting: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}
