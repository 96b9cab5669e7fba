//! Curve Serialization
//!
//! JSON shape:
//!
//! ```json
//! {
//!   "name": "walk", "property": "position", "framePerSecond": 30,
//!   "dataType": 1, "loopBehavior": 1,
//!   "enableBlending": false, "blendingSpeed": 0.01,
//!   "keys": [{ "frame": 0, "values": [0, 0, 0] }],
//!   "ranges": [{ "name": "start", "from": 0, "to": 10 }]
//! }
//! ```
//!
//! Each key's `values` holds the value's components, optionally followed by
//! the in tangent, the out tangent and an interpolation code (`1` = step).
//! Missing tangents in front of a present field are written as `null`.

use serde::{Deserialize, Serialize};

use crate::animation::binding::TargetProperty;
use crate::animation::curve::{AnimationRange, Curve, CurveLoopMode};
use crate::animation::tracks::{KeyInterpolation, Keyframe};
use crate::animation::values::{AnimationValue, CurveDataType};
use crate::errors::{AnimationError, Result};

const STEP_CODE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRange {
    pub name: String,
    pub from: f32,
    pub to: f32,
}

impl From<&AnimationRange> for SerializedRange {
    fn from(range: &AnimationRange) -> Self {
        Self {
            name: range.name.clone(),
            from: range.from,
            to: range.to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedKey {
    pub frame: f32,
    pub values: Vec<Option<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedCurve {
    pub name: String,
    pub property: String,
    pub frame_per_second: f32,
    pub data_type: u32,
    pub loop_behavior: u32,
    #[serde(default)]
    pub enable_blending: bool,
    #[serde(default = "default_blending_speed")]
    pub blending_speed: f32,
    pub keys: Vec<SerializedKey>,
    #[serde(default)]
    pub ranges: Vec<SerializedRange>,
}

fn default_blending_speed() -> f32 {
    Curve::DEFAULT_BLENDING_SPEED
}

impl Curve {
    #[must_use]
    pub fn serialize(&self) -> SerializedCurve {
        SerializedCurve {
            name: self.name().to_string(),
            property: self.property().path(),
            frame_per_second: self.frames_per_second(),
            data_type: self.data_type().code(),
            loop_behavior: self.loop_mode().code(),
            enable_blending: self.enable_blending,
            blending_speed: self.blending_speed,
            keys: self.data().erased_keys().iter().map(serialize_key).collect(),
            ranges: self.ranges().iter().map(SerializedRange::from).collect(),
        }
    }

    pub fn parse(data: &SerializedCurve) -> Result<Self> {
        let data_type = CurveDataType::from_code(data.data_type).ok_or(AnimationError::UnknownCode {
            kind: "data type",
            code: data.data_type,
        })?;
        let loop_mode =
            CurveLoopMode::from_code(data.loop_behavior).ok_or(AnimationError::UnknownCode {
                kind: "loop behavior",
                code: data.loop_behavior,
            })?;

        let keys = data
            .keys
            .iter()
            .map(|key| parse_key(data_type, key))
            .collect::<Result<Vec<_>>>()?;

        let mut curve = Self::from_keys(
            &data.name,
            TargetProperty::from_path(&data.property),
            data.frame_per_second,
            data_type,
            &keys,
        )?
        .with_loop_mode(loop_mode);
        curve.enable_blending = data.enable_blending;
        curve.blending_speed = data.blending_speed;
        for range in &data.ranges {
            curve.create_range(&range.name, range.from, range.to);
        }
        Ok(curve)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.serialize())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::parse(&serde_json::from_str(json)?)
    }
}

fn serialize_key(key: &Keyframe<AnimationValue>) -> SerializedKey {
    let count = key.value.data_type().component_count();
    let components = |value: &AnimationValue| {
        let mut out = Vec::with_capacity(count);
        value.write_components(&mut out);
        out.into_iter().map(Some).collect::<Vec<_>>()
    };

    let mut values = components(&key.value);
    let step = key.interpolation == KeyInterpolation::Step;
    let has_out = key.out_tangent.is_some();

    if key.in_tangent.is_some() || has_out || step {
        match &key.in_tangent {
            Some(tangent) => values.extend(components(tangent)),
            None => values.extend(std::iter::repeat_n(None, count)),
        }
    }
    if has_out || step {
        match &key.out_tangent {
            Some(tangent) => values.extend(components(tangent)),
            None => values.extend(std::iter::repeat_n(None, count)),
        }
    }
    if step {
        values.push(Some(STEP_CODE));
    }

    SerializedKey {
        frame: key.frame,
        values,
    }
}

fn parse_key(data_type: CurveDataType, key: &SerializedKey) -> Result<Keyframe<AnimationValue>> {
    let count = data_type.component_count();
    let invalid = || AnimationError::InvalidKeyData {
        frame: key.frame,
        expected: count,
        found: key.values.iter().take(count).filter(|v| v.is_some()).count(),
    };

    let value = read_value(data_type, key.values.get(..count)).ok_or_else(invalid)?;
    let in_tangent = read_tangent(data_type, key.values.get(count..2 * count));
    let out_tangent = read_tangent(data_type, key.values.get(2 * count..3 * count));
    let interpolation = match key.values.get(3 * count).copied().flatten() {
        Some(code) if code == STEP_CODE => KeyInterpolation::Step,
        _ => KeyInterpolation::Linear,
    };

    Ok(Keyframe {
        frame: key.frame,
        value,
        in_tangent,
        out_tangent,
        interpolation,
    })
}

fn read_value(data_type: CurveDataType, values: Option<&[Option<f32>]>) -> Option<AnimationValue> {
    let components = values?.iter().copied().collect::<Option<Vec<f32>>>()?;
    AnimationValue::from_components(data_type, &components)
}

/// Quaternion tangents of zero length count as absent.
fn read_tangent(data_type: CurveDataType, values: Option<&[Option<f32>]>) -> Option<AnimationValue> {
    let tangent = read_value(data_type, values)?;
    match tangent {
        AnimationValue::Quaternion(q) if q.length_squared() == 0.0 => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_step_key_without_tangents_writes_placeholders() {
        let key = Keyframe::new(2.0, AnimationValue::Float(5.0)).step();
        let serialized = serialize_key(&key);
        assert_eq!(serialized.values, vec![Some(5.0), None, None, Some(1.0)]);

        let parsed = parse_key(CurveDataType::Float, &serialized).unwrap();
        assert_eq!(parsed.interpolation, KeyInterpolation::Step);
        assert!(parsed.in_tangent.is_none());
        assert!(parsed.out_tangent.is_none());
    }

    #[test]
    fn test_zero_quaternion_tangent_is_absent() {
        let key = SerializedKey {
            frame: 0.0,
            values: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0]
                .into_iter()
                .map(Some)
                .collect(),
        };
        let parsed = parse_key(CurveDataType::Quaternion, &key).unwrap();
        assert_eq!(parsed.value, AnimationValue::Quaternion(Quat::IDENTITY));
        assert!(parsed.in_tangent.is_none());
        assert!(parsed.out_tangent.is_some());
    }

    #[test]
    fn test_short_values_are_rejected() {
        let key = SerializedKey {
            frame: 4.0,
            values: vec![Some(1.0), Some(2.0)],
        };
        let err = parse_key(CurveDataType::Vector3, &key).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidKeyData { expected: 3, found: 2, .. }));
    }

    #[test]
    fn test_unknown_codes_are_rejected() {
        let curve = Curve::tween(
            "c",
            TargetProperty::Position,
            30.0,
            10.0,
            AnimationValue::Vector3(Vec3::ZERO),
            AnimationValue::Vector3(Vec3::ONE),
        )
        .unwrap();
        let mut data = curve.serialize();
        data.loop_behavior = 9;
        assert!(matches!(
            Curve::parse(&data),
            Err(AnimationError::UnknownCode { kind: "loop behavior", code: 9 })
        ));

        data.loop_behavior = 1;
        data.keys.clear();
        assert!(matches!(Curve::parse(&data), Err(AnimationError::EmptyCurve { .. })));
    }
}
