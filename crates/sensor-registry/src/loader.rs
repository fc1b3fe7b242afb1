use crate::config::HubConfig;
use crate::devices::DeclarativeDevice;
use crate::roles::RoleRegistry;
use crate::schema::DeviceSchema;
use anyhow::Context;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub fn load_descriptor_file(path: impl AsRef<Path>) -> anyhow::Result<DeviceSchema> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading descriptor: {}", path.display()))?;
    let val: Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    let schema: DeviceSchema = serde_yaml::from_value(val)
        .with_context(|| format!("decoding descriptor: {}", path.display()))?;
    Ok(schema)
}

/// Load and validate every `*.yml`/`*.yaml` descriptor in `dir`, in file name order.
pub fn load_descriptors_dir(
    dir: impl AsRef<Path>,
    roles: &RoleRegistry,
) -> anyhow::Result<Vec<DeclarativeDevice>> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())
        .with_context(|| format!("listing descriptors: {}", dir.as_ref().display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    let mut devices = Vec::with_capacity(entries.len());
    for p in entries {
        let schema = load_descriptor_file(&p)?;
        let device = DeclarativeDevice::new(schema)
            .with_context(|| format!("invalid descriptor: {}", p.display()))?;
        device
            .check(roles)
            .with_context(|| format!("invalid descriptor: {}", p.display()))?;
        tracing::info!(path = %p.display(), "loaded device descriptor");
        devices.push(device);
    }
    Ok(devices)
}

pub fn load_hub_config(path: impl AsRef<Path>) -> anyhow::Result<HubConfig> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing config: {}", path.display()))
}
