use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::animation::binding::TargetProperty;
use crate::animation::{AnimationValue, Curve};

/// Generic animation target exposing a fixed set of typed properties.
///
/// Properties are declared with [`with_property`](Self::with_property); a curve
/// only binds to a property that already exists with the curve's data type.
#[derive(Debug, Clone, Default)]
pub struct AnimatedObject {
    pub name: String,
    properties: FxHashMap<TargetProperty, AnimationValue>,
    /// Number of writes since the last [`take_dirty`](Self::take_dirty).
    dirty_writes: u32,
    pub animations: Vec<Arc<Curve>>,
}

impl AnimatedObject {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, path: &str, value: impl Into<AnimationValue>) -> Self {
        self.properties
            .insert(TargetProperty::from_path(path), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, property: &TargetProperty) -> Option<AnimationValue> {
        self.properties.get(property).copied()
    }

    /// Convenience lookup by dot path.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<AnimationValue> {
        self.get(&TargetProperty::from_path(path))
    }

    /// Overwrites an existing property of the same data type.
    pub fn set(&mut self, property: &TargetProperty, value: AnimationValue) -> bool {
        match self.properties.get_mut(property) {
            Some(slot) if slot.data_type() == value.data_type() => {
                *slot = value;
                self.dirty_writes += 1;
                true
            }
            _ => false,
        }
    }

    /// Returns and clears the dirty write counter.
    pub fn take_dirty(&mut self) -> u32 {
        std::mem::take(&mut self.dirty_writes)
    }
}
