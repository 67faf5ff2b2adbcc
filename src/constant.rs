//! Constant values carried by leaf nodes and uniform declarations.

use serde::{Deserialize, Serialize};

use crate::types::ShaderType;

/// A literal value. Matrices are stored column-major, matching the layout
/// both target languages construct from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Color([f32; 3]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl ConstValue {
    pub fn shader_type(&self) -> ShaderType {
        match self {
            ConstValue::Float(_) => ShaderType::Float,
            ConstValue::Int(_) => ShaderType::Int,
            ConstValue::Uint(_) => ShaderType::Uint,
            ConstValue::Bool(_) => ShaderType::Bool,
            ConstValue::Vec2(_) => ShaderType::Vec2,
            ConstValue::Vec3(_) => ShaderType::Vec3,
            ConstValue::Vec4(_) => ShaderType::Vec4,
            ConstValue::Color(_) => ShaderType::Color,
            ConstValue::Mat2(_) => ShaderType::Mat2,
            ConstValue::Mat3(_) => ShaderType::Mat3,
            ConstValue::Mat4(_) => ShaderType::Mat4,
        }
    }

    /// Deterministic zero value of the given type, used as the substitute
    /// when a referenced vertex attribute is missing from the bound
    /// geometry.
    pub fn zero(ty: ShaderType) -> ConstValue {
        match ty.vector_type() {
            ShaderType::Int => ConstValue::Int(0),
            ShaderType::Uint => ConstValue::Uint(0),
            ShaderType::Bool => ConstValue::Bool(false),
            ShaderType::Vec2 => ConstValue::Vec2([0.0; 2]),
            ShaderType::Vec3 => ConstValue::Vec3([0.0; 3]),
            ShaderType::Vec4 => ConstValue::Vec4([0.0; 4]),
            ShaderType::Mat2 => ConstValue::Mat2([0.0; 4]),
            ShaderType::Mat3 => ConstValue::Mat3([0.0; 9]),
            ShaderType::Mat4 => ConstValue::Mat4([0.0; 16]),
            _ => ConstValue::Float(0.0),
        }
    }

    /// Scalar components, in declaration order.
    pub fn components(&self) -> Vec<f32> {
        match self {
            ConstValue::Float(v) => vec![*v],
            ConstValue::Int(v) => vec![*v as f32],
            ConstValue::Uint(v) => vec![*v as f32],
            ConstValue::Bool(v) => vec![if *v { 1.0 } else { 0.0 }],
            ConstValue::Vec2(v) => v.to_vec(),
            ConstValue::Vec3(v) | ConstValue::Color(v) => v.to_vec(),
            ConstValue::Vec4(v) => v.to_vec(),
            ConstValue::Mat2(v) => v.to_vec(),
            ConstValue::Mat3(v) => v.to_vec(),
            ConstValue::Mat4(v) => v.to_vec(),
        }
    }

    /// Stable bit-level hash input; `-0.0` and `NaN` payloads hash by their
    /// raw bits so version-free cache keys stay deterministic.
    pub fn hash_bits(&self, state: &mut impl std::hash::Hasher) {
        use std::hash::Hash;
        match self {
            ConstValue::Int(v) => v.hash(state),
            ConstValue::Uint(v) => v.hash(state),
            ConstValue::Bool(v) => v.hash(state),
            other => {
                for c in other.components() {
                    c.to_bits().hash(state);
                }
            }
        }
    }
}

impl From<f32> for ConstValue {
    fn from(v: f32) -> Self {
        ConstValue::Float(v)
    }
}

impl From<i32> for ConstValue {
    fn from(v: i32) -> Self {
        ConstValue::Int(v)
    }
}

impl From<u32> for ConstValue {
    fn from(v: u32) -> Self {
        ConstValue::Uint(v)
    }
}

impl From<bool> for ConstValue {
    fn from(v: bool) -> Self {
        ConstValue::Bool(v)
    }
}

impl From<[f32; 2]> for ConstValue {
    fn from(v: [f32; 2]) -> Self {
        ConstValue::Vec2(v)
    }
}

impl From<[f32; 3]> for ConstValue {
    fn from(v: [f32; 3]) -> Self {
        ConstValue::Vec3(v)
    }
}

impl From<[f32; 4]> for ConstValue {
    fn from(v: [f32; 4]) -> Self {
        ConstValue::Vec4(v)
    }
}

/// Format a float literal, removing trailing zeros but always keeping a
/// decimal point so the token parses as a float in both targets.
pub fn fmt_f32(v: f32) -> String {
    if v.is_finite() {
        let s = format!("{v:.9}");
        let s = s.trim_end_matches('0');
        if s.ends_with('.') {
            format!("{s}0")
        } else {
            s.to_string()
        }
    } else {
        "0.0".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_f32_keeps_decimal_point() {
        assert_eq!(fmt_f32(1.0), "1.0");
        assert_eq!(fmt_f32(0.5), "0.5");
        assert_eq!(fmt_f32(-2.25), "-2.25");
        assert_eq!(fmt_f32(f32::NAN), "0.0");
    }

    #[test]
    fn test_zero_matches_type() {
        assert_eq!(ConstValue::zero(ShaderType::Vec3).shader_type(), ShaderType::Vec3);
        assert_eq!(ConstValue::zero(ShaderType::Color).shader_type(), ShaderType::Vec3);
        assert_eq!(ConstValue::zero(ShaderType::Int).shader_type(), ShaderType::Int);
    }
}
