//! Late Binding
//!
//! Weighted players do not write their targets directly. They register their
//! value here and, once every controller has advanced, the resolver merges all
//! contributions per `(target, property)` and writes the result.
//!
//! - Matrices (with decomposition enabled) blend scale, rotation and
//!   translation separately and recompose.
//! - Quaternions use a cumulative slerp chain.
//! - Other types use a weighted sum.
//!
//! When the total weight is below 1 the original value fills the remainder;
//! otherwise weights are renormalized by the total.

use glam::{Mat4, Quat, Vec3};
use log::trace;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::animation::binding::{TargetHandle, TargetProperty};
use crate::animation::values::AnimationValue;
use crate::scene::Scene;
use crate::settings::InterpolationOptions;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Contribution {
    value: AnimationValue,
    weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Holder {
    target: TargetHandle,
    property: TargetProperty,
    original: AnimationValue,
    contributions: SmallVec<[Contribution; 2]>,
    total_weight: f32,
}

/// Per-tick accumulation of weighted writes.
#[derive(Debug, Default)]
pub struct LateBindingResolver {
    holders: Vec<Holder>,
    index: FxHashMap<(TargetHandle, TargetProperty), usize>,
}

impl LateBindingResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one weighted value. The first registration for a property fixes
    /// its original value.
    pub fn register(
        &mut self,
        target: TargetHandle,
        property: TargetProperty,
        original: AnimationValue,
        value: AnimationValue,
        weight: f32,
    ) {
        let holders = &mut self.holders;
        let slot = *self.index.entry((target, property)).or_insert_with(|| {
            holders.push(Holder {
                target,
                property,
                original,
                contributions: SmallVec::new(),
                total_weight: 0.0,
            });
            holders.len() - 1
        });
        let holder = &mut self.holders[slot];
        holder.contributions.push(Contribution { value, weight });
        holder.total_weight += weight;
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Number of distinct properties pending.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.holders.len()
    }

    /// Merges and writes every pending property, then clears.
    pub fn resolve(&mut self, scene: &mut Scene, options: &InterpolationOptions) {
        if self.holders.is_empty() {
            return;
        }
        trace!("Resolving {} late-bound properties", self.holders.len());

        for holder in self.holders.drain(..) {
            let current = scene.property(holder.target, &holder.property);
            let value = resolve_holder(&holder, current, options);
            scene.set_property(holder.target, &holder.property, value);
        }
        self.index.clear();
    }

    /// Drops every pending contribution without writing.
    pub fn clear(&mut self) {
        self.holders.clear();
        self.index.clear();
    }
}

fn resolve_holder(
    holder: &Holder,
    current: Option<AnimationValue>,
    options: &InterpolationOptions,
) -> AnimationValue {
    match holder.original {
        AnimationValue::Matrix(original) if options.matrix_decomposition => {
            AnimationValue::Matrix(resolve_matrices(holder, original))
        }
        AnimationValue::Quaternion(original) => {
            let reference = current.and_then(|v| v.as_quat()).unwrap_or(Quat::IDENTITY);
            AnimationValue::Quaternion(resolve_quaternions(holder, original, reference))
        }
        _ => resolve_linear(holder),
    }
}

fn resolve_linear(holder: &Holder) -> AnimationValue {
    let mut normalizer = 1.0;
    let mut start = 0;
    let mut result;

    if holder.total_weight < 1.0 {
        result = holder.original.scaled(1.0 - holder.total_weight);
    } else {
        normalizer = holder.total_weight;
        let first = holder.contributions[0];
        let scale = first.weight / normalizer;
        result = if scale == 1.0 {
            first.value
        } else {
            first.value.scaled(scale)
        };
        start = 1;
    }

    for contribution in &holder.contributions[start..] {
        let scale = contribution.weight / normalizer;
        if scale != 0.0 {
            result.add_scaled(&contribution.value, scale);
        }
    }
    result
}

fn resolve_quaternions(holder: &Holder, original: Quat, reference: Quat) -> Quat {
    if holder.total_weight == 0.0 {
        return reference;
    }

    let contributions = &holder.contributions;
    let as_quat = |c: &Contribution| c.value.as_quat().unwrap_or(Quat::IDENTITY);

    if contributions.len() == 1 {
        return original.slerp(as_quat(&contributions[0]), holder.total_weight.min(1.0));
    }

    let mut normalizer = 1.0;
    let mut weighted: SmallVec<[(Quat, f32); 4]> = SmallVec::new();
    if holder.total_weight < 1.0 {
        weighted.push((original, 1.0 - holder.total_weight));
    } else {
        normalizer = holder.total_weight;
    }
    for contribution in contributions {
        weighted.push((as_quat(contribution), contribution.weight / normalizer));
    }
    slerp_chain(&weighted)
}

/// Folds `(rotation, weight)` pairs left to right, each slerp step moving the
/// running result towards the next rotation by its share of the weight seen
/// so far.
fn slerp_chain(weighted: &[(Quat, f32)]) -> Quat {
    let Some(&(first, first_weight)) = weighted.first() else {
        return Quat::IDENTITY;
    };
    let mut cumulative = first;
    let mut cumulative_amount = first_weight;
    for &(rotation, weight) in &weighted[1..] {
        cumulative_amount += weight;
        if cumulative_amount > 0.0 {
            cumulative = cumulative.slerp(rotation, weight / cumulative_amount);
        }
    }
    cumulative
}

fn resolve_matrices(holder: &Holder, original: Mat4) -> Mat4 {
    if holder.total_weight == 0.0 {
        return original;
    }

    let contributions = &holder.contributions;
    let as_mat = |c: &Contribution| c.value.as_mat4().unwrap_or(Mat4::IDENTITY);

    if holder.total_weight >= 1.0 && contributions.len() == 1 {
        return as_mat(&contributions[0]);
    }

    let mut normalizer = 1.0;
    let mut scaling = Vec3::ZERO;
    let mut translation = Vec3::ZERO;
    let mut rotations: SmallVec<[(Quat, f32); 4]> = SmallVec::new();

    let mut accumulate = |matrix: Mat4, weight: f32| {
        let (s, r, t) = matrix.to_scale_rotation_translation();
        scaling += s * weight;
        translation += t * weight;
        rotations.push((r, weight));
    };

    if holder.total_weight < 1.0 {
        accumulate(original, 1.0 - holder.total_weight);
    } else {
        normalizer = holder.total_weight;
    }
    for contribution in contributions {
        if contribution.weight == 0.0 {
            continue;
        }
        accumulate(as_mat(contribution), contribution.weight / normalizer);
    }

    Mat4::from_scale_rotation_translation(scaling, slerp_chain(&rotations), translation)
}
