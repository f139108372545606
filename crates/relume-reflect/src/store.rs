//! Value carry-over across rebuilds, and lock-step shared uniforms.

use std::collections::{BTreeSet, HashMap};

use crate::value::{GpuType, UniformValue};

/// A remembered uniform: its type plus one value per array element.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub ty: GpuType,
    pub values: Vec<UniformValue>,
}

/// Snapshot of the previous reflection pass's user-editable values. Rebuilt
/// before every reflection pass; `migrate` carries values forward only when
/// name and GPU type both survived the edit.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    entries: HashMap<String, StoredValue>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, ty: GpuType, values: &[UniformValue]) {
        self.entries.insert(
            name.to_string(),
            StoredValue {
                ty,
                values: values.to_vec(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&StoredValue> {
        self.entries.get(name)
    }

    /// Overwrite `fresh` (the GPU-read defaults) with remembered values when
    /// name and type match. Array growth keeps the new tail's defaults;
    /// array shrink drops the excess. Returns whether anything carried over.
    pub fn migrate(&self, name: &str, ty: GpuType, fresh: &mut [UniformValue]) -> bool {
        let prev = match self.entries.get(name) {
            Some(prev) if prev.ty == ty => prev,
            _ => return false,
        };
        let n = prev.values.len().min(fresh.len());
        fresh[..n].clone_from_slice(&prev.values[..n]);
        n > 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Uniform names the scene keeps in lock-step across layers: one canonical
/// value, adopted by every layer that declares the name at the same type.
#[derive(Debug, Clone, Default)]
pub struct SharedUniforms {
    names: BTreeSet<String>,
    values: HashMap<String, StoredValue>,
}

impl SharedUniforms {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
            values: HashMap::new(),
        }
    }

    pub fn is_shared(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Record an edit as the canonical value. Ignored for unshared names.
    pub fn publish(&mut self, name: &str, ty: GpuType, values: &[UniformValue]) -> bool {
        if !self.names.contains(name) {
            return false;
        }
        self.values.insert(
            name.to_string(),
            StoredValue {
                ty,
                values: values.to_vec(),
            },
        );
        true
    }

    /// Canonical value for a shared name, only when the asking declaration's
    /// type matches. A layer declaring `gain` at a different type falls back
    /// to its own value.
    pub fn canonical(&self, name: &str, ty: GpuType) -> Option<&[UniformValue]> {
        let stored = self.values.get(name)?;
        if stored.ty == ty {
            Some(&stored.values)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_name_and_type_keeps_the_user_value() {
        let mut store = ValueStore::new();
        store.insert("gain", GpuType::Float, &[UniformValue::Float(0.75)]);

        let mut fresh = vec![UniformValue::Float(0.0)];
        assert!(store.migrate("gain", GpuType::Float, &mut fresh));
        assert_eq!(fresh, vec![UniformValue::Float(0.75)]);
    }

    #[test]
    fn type_change_resets_to_the_fresh_default() {
        let mut store = ValueStore::new();
        store.insert("gain", GpuType::Float, &[UniformValue::Float(0.75)]);

        let mut fresh = vec![UniformValue::Vec2([0.1, 0.2])];
        assert!(!store.migrate("gain", GpuType::Vec2, &mut fresh));
        assert_eq!(fresh, vec![UniformValue::Vec2([0.1, 0.2])]);
    }

    #[test]
    fn unknown_name_keeps_the_fresh_default() {
        let store = ValueStore::new();
        let mut fresh = vec![UniformValue::Int(7)];
        assert!(!store.migrate("other", GpuType::Int, &mut fresh));
        assert_eq!(fresh, vec![UniformValue::Int(7)]);
    }

    #[test]
    fn array_resize_keeps_the_common_prefix() {
        let mut store = ValueStore::new();
        store.insert(
            "levels",
            GpuType::Float,
            &[
                UniformValue::Float(1.0),
                UniformValue::Float(2.0),
                UniformValue::Float(3.0),
            ],
        );

        // Shrink: extra elements dropped.
        let mut two = vec![UniformValue::Float(0.0); 2];
        assert!(store.migrate("levels", GpuType::Float, &mut two));
        assert_eq!(two, vec![UniformValue::Float(1.0), UniformValue::Float(2.0)]);

        // Grow: new slots keep their defaults.
        let mut four = vec![UniformValue::Float(9.0); 4];
        assert!(store.migrate("levels", GpuType::Float, &mut four));
        assert_eq!(
            four,
            vec![
                UniformValue::Float(1.0),
                UniformValue::Float(2.0),
                UniformValue::Float(3.0),
                UniformValue::Float(9.0),
            ]
        );
    }

    #[test]
    fn shared_uniforms_guard_name_and_type() {
        let mut shared = SharedUniforms::new(["gain".to_string()]);
        assert!(shared.is_shared("gain"));
        assert!(!shared.is_shared("other"));

        assert!(!shared.publish("other", GpuType::Float, &[UniformValue::Float(1.0)]));
        assert!(shared.publish("gain", GpuType::Float, &[UniformValue::Float(0.5)]));

        assert_eq!(
            shared.canonical("gain", GpuType::Float),
            Some(&[UniformValue::Float(0.5)][..])
        );
        assert_eq!(shared.canonical("gain", GpuType::Vec2), None);
        assert_eq!(shared.canonical("other", GpuType::Float), None);
    }
}
