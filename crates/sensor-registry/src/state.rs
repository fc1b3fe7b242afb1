use crate::types::SensorValue;
use std::collections::BTreeMap;

/// Read access to the key/value surface a role service publishes.
pub trait StateAccess {
    fn get(&self, path: &str) -> Option<&SensorValue>;

    fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(SensorValue::as_f64)
    }

    /// Missing paths read as false.
    fn get_bool(&self, path: &str) -> bool {
        self.get(path).is_some_and(SensorValue::is_truthy)
    }
}

/// Normalise a bus path to a single leading slash and no trailing one.
pub fn clear_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/').trim_end_matches('/'))
}

/// Mutable published state of one role service. Paths are normalised with
/// [`clear_path`] on every access, so `Level` and `/Level` are the same item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishedState {
    items: BTreeMap<String, SensorValue>,
}

impl PublishedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a path; returns true when the stored value changed.
    pub fn set(&mut self, path: &str, value: impl Into<SensorValue>) -> bool {
        let path = clear_path(path);
        let value = value.into();
        match self.items.get(&path) {
            Some(current) if *current == value => false,
            Some(_) => {
                tracing::trace!(%path, ?value, "updating item");
                self.items.insert(path, value);
                true
            }
            None => {
                tracing::trace!(%path, ?value, "creating item");
                self.items.insert(path, value);
                true
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<SensorValue> {
        let removed = self.items.remove(&clear_path(path));
        if removed.is_none() {
            tracing::warn!(path, "can not delete missing item");
        }
        removed
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(&clear_path(path))
    }

    pub fn items(&self) -> &BTreeMap<String, SensorValue> {
        &self.items
    }
}

impl StateAccess for PublishedState {
    fn get(&self, path: &str) -> Option<&SensorValue> {
        self.items.get(&clear_path(path))
    }
}
