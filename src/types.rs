//! Core type tokens and pure type-system queries.
//!
//! Shader types are represented as an opaque token enum rather than target
//! spellings; the emitter decides how a token is spelled in WGSL or GLSL.
//! Everything in this module is a pure function over tokens.

use serde::{Deserialize, Serialize};

/// Abstract shader value type.
///
/// `Color` is an alias of `Vec3` for all numeric purposes but is kept as a
/// distinct token so authoring code can declare intent (and so uniform
/// records surface it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderType {
    Float,
    Int,
    Uint,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Color,
    /// 2D sampled texture resource.
    Texture,
    /// Cube texture resource.
    CubeTexture,
    /// Depth texture resource (comparison sampling).
    DepthTexture,
    Sampler,
    /// An assignable property slot; treated as a reference type.
    Property,
    Void,
}

/// Shader pipeline stage a snippet belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 3] = [
        ShaderStage::Vertex,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];
}

/// The three sequential compiler passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStage {
    Setup,
    Analyze,
    Generate,
}

impl BuildStage {
    pub const ALL: [BuildStage; 3] = [BuildStage::Setup, BuildStage::Analyze, BuildStage::Generate];
}

/// How often a node's external value must be refreshed before the compiled
/// artifact is used. Surfaced in the artifact; never executed by the
/// compiler itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateFrequency {
    #[default]
    None,
    Frame,
    Render,
    Object,
}

impl ShaderType {
    /// Resolve aliases down to the plain numeric vector type.
    ///
    /// `color` reads as `vec3`; sampled texture results read as `vec4`.
    pub fn vector_type(self) -> ShaderType {
        match self {
            ShaderType::Color => ShaderType::Vec3,
            ShaderType::Texture | ShaderType::CubeTexture => ShaderType::Vec4,
            other => other,
        }
    }

    /// Scalar component type of a vector or matrix; scalars map to
    /// themselves, opaque types to `Void`.
    pub fn component_type(self) -> ShaderType {
        match self.vector_type() {
            ShaderType::Float | ShaderType::Vec2 | ShaderType::Vec3 | ShaderType::Vec4 => {
                ShaderType::Float
            }
            ShaderType::Mat2 | ShaderType::Mat3 | ShaderType::Mat4 => ShaderType::Float,
            ShaderType::Int | ShaderType::IVec2 | ShaderType::IVec3 | ShaderType::IVec4 => {
                ShaderType::Int
            }
            ShaderType::Uint | ShaderType::UVec2 | ShaderType::UVec3 | ShaderType::UVec4 => {
                ShaderType::Uint
            }
            ShaderType::Bool | ShaderType::BVec2 | ShaderType::BVec3 | ShaderType::BVec4 => {
                ShaderType::Bool
            }
            _ => ShaderType::Void,
        }
    }

    /// Component count: 1 for scalars, 2-4 for vectors, 4/9/16 for matrices,
    /// 0 for opaque resource types and `void`.
    pub fn length(self) -> usize {
        match self.vector_type() {
            ShaderType::Float | ShaderType::Int | ShaderType::Uint | ShaderType::Bool => 1,
            ShaderType::Vec2 | ShaderType::IVec2 | ShaderType::UVec2 | ShaderType::BVec2 => 2,
            ShaderType::Vec3 | ShaderType::IVec3 | ShaderType::UVec3 | ShaderType::BVec3 => 3,
            ShaderType::Vec4 | ShaderType::IVec4 | ShaderType::UVec4 | ShaderType::BVec4 => 4,
            ShaderType::Mat2 => 4,
            ShaderType::Mat3 => 9,
            ShaderType::Mat4 => 16,
            _ => 0,
        }
    }

    /// Inverse of [`ShaderType::length`] for vector-like lengths: build the
    /// type with `len` components of `component`. Lengths 9 and 16 map back
    /// to matrices (float only).
    pub fn from_length(len: usize, component: ShaderType) -> Option<ShaderType> {
        if len == 1 {
            return Some(component);
        }
        let ty = match (len, component) {
            (2, ShaderType::Float) => ShaderType::Vec2,
            (3, ShaderType::Float) => ShaderType::Vec3,
            (4, ShaderType::Float) => ShaderType::Vec4,
            (2, ShaderType::Int) => ShaderType::IVec2,
            (3, ShaderType::Int) => ShaderType::IVec3,
            (4, ShaderType::Int) => ShaderType::IVec4,
            (2, ShaderType::Uint) => ShaderType::UVec2,
            (3, ShaderType::Uint) => ShaderType::UVec3,
            (4, ShaderType::Uint) => ShaderType::UVec4,
            (2, ShaderType::Bool) => ShaderType::BVec2,
            (3, ShaderType::Bool) => ShaderType::BVec3,
            (4, ShaderType::Bool) => ShaderType::BVec4,
            (9, ShaderType::Float) => ShaderType::Mat3,
            (16, ShaderType::Float) => ShaderType::Mat4,
            _ => return None,
        };
        Some(ty)
    }

    /// The vector type a matrix multiplies (its column type); passes other
    /// types through [`ShaderType::component_type`] semantics.
    pub fn vector_from_matrix(self) -> ShaderType {
        match self {
            ShaderType::Mat2 => ShaderType::Vec2,
            ShaderType::Mat3 => ShaderType::Vec3,
            ShaderType::Mat4 => ShaderType::Vec4,
            other => other,
        }
    }

    /// Element type: matrix columns for matrices, otherwise the component
    /// type.
    pub fn element_type(self) -> ShaderType {
        if self.is_matrix() {
            self.vector_from_matrix()
        } else {
            self.component_type()
        }
    }

    pub fn is_matrix(self) -> bool {
        matches!(self, ShaderType::Mat2 | ShaderType::Mat3 | ShaderType::Mat4)
    }

    pub fn is_vector(self) -> bool {
        matches!(self.vector_type().length(), 2..=4) && !self.is_matrix()
    }

    /// Reference types are never value-formatted: `void`, assignable
    /// properties, and opaque resources.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ShaderType::Void
                | ShaderType::Property
                | ShaderType::Sampler
                | ShaderType::Texture
                | ShaderType::CubeTexture
                | ShaderType::DepthTexture
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(self.component_type(), ShaderType::Int | ShaderType::Uint)
    }

    /// Same shape, different scalar: `vec3` + `int` -> `ivec3`.
    pub fn change_component_type(self, component: ShaderType) -> ShaderType {
        ShaderType::from_length(self.length(), component).unwrap_or(self)
    }

    /// The integer-component counterpart used for loop counters and bit ops.
    pub fn integer_type(self) -> ShaderType {
        if self.is_integer() {
            self
        } else {
            self.change_component_type(ShaderType::Int)
        }
    }

    /// Canonical abstract token name (target-independent spelling used in
    /// hashes, diagnostics, and serialization).
    pub fn token(self) -> &'static str {
        match self {
            ShaderType::Float => "float",
            ShaderType::Int => "int",
            ShaderType::Uint => "uint",
            ShaderType::Bool => "bool",
            ShaderType::Vec2 => "vec2",
            ShaderType::Vec3 => "vec3",
            ShaderType::Vec4 => "vec4",
            ShaderType::IVec2 => "ivec2",
            ShaderType::IVec3 => "ivec3",
            ShaderType::IVec4 => "ivec4",
            ShaderType::UVec2 => "uvec2",
            ShaderType::UVec3 => "uvec3",
            ShaderType::UVec4 => "uvec4",
            ShaderType::BVec2 => "bvec2",
            ShaderType::BVec3 => "bvec3",
            ShaderType::BVec4 => "bvec4",
            ShaderType::Mat2 => "mat2",
            ShaderType::Mat3 => "mat3",
            ShaderType::Mat4 => "mat4",
            ShaderType::Color => "color",
            ShaderType::Texture => "texture",
            ShaderType::CubeTexture => "cubeTexture",
            ShaderType::DepthTexture => "depthTexture",
            ShaderType::Sampler => "sampler",
            ShaderType::Property => "property",
            ShaderType::Void => "void",
        }
    }

    /// Promote two operand types for a component-wise binary operation:
    /// longer shape wins, float component dominates int, int dominates uint.
    pub fn promote(self, other: ShaderType) -> ShaderType {
        let a = self.vector_type();
        let b = other.vector_type();
        if a == b {
            return a;
        }
        let len = a.length().max(b.length());
        let component = match (a.component_type(), b.component_type()) {
            (ShaderType::Float, _) | (_, ShaderType::Float) => ShaderType::Float,
            (ShaderType::Int, _) | (_, ShaderType::Int) => ShaderType::Int,
            (ShaderType::Uint, _) | (_, ShaderType::Uint) => ShaderType::Uint,
            _ => ShaderType::Bool,
        };
        ShaderType::from_length(len, component).unwrap_or(a)
    }
}

/// Returns a description of the known coercion gap for `(from, to)`, or
/// `None` when the pair is supported by [`crate::emitter::Emitter::format`].
///
/// Matrix conversions above length 4 other than the two special-cased pairs
/// are passed through unmodified. Downstream consumers may depend on the
/// permissive behavior, so this is reported as a diagnostic instead of an
/// error.
pub fn coercion_gap(from: ShaderType, to: ShaderType) -> Option<String> {
    let from = from.vector_type();
    let to = to.vector_type();
    if from == to || to.is_reference() {
        return None;
    }
    let from_len = from.length();
    let to_len = to.length();
    if from_len == 16 && to_len == 9 {
        return None;
    }
    if from_len == 9 && to_len == 4 {
        return None;
    }
    if from_len > 4 {
        return Some(format!(
            "unsupported coercion from {} to {}: left as-is",
            from.token(),
            to.token()
        ));
    }
    if to_len > 4 || to_len == 0 {
        return Some(format!(
            "unsupported coercion from {} to {}: left as-is",
            from.token(),
            to.token()
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(ShaderType::Float.length(), 1);
        assert_eq!(ShaderType::Vec2.length(), 2);
        assert_eq!(ShaderType::Color.length(), 3);
        assert_eq!(ShaderType::Vec4.length(), 4);
        assert_eq!(ShaderType::Mat3.length(), 9);
        assert_eq!(ShaderType::Mat4.length(), 16);
        assert_eq!(ShaderType::Sampler.length(), 0);
        assert_eq!(ShaderType::Void.length(), 0);
    }

    #[test]
    fn test_component_types() {
        assert_eq!(ShaderType::Vec3.component_type(), ShaderType::Float);
        assert_eq!(ShaderType::IVec2.component_type(), ShaderType::Int);
        assert_eq!(ShaderType::BVec4.component_type(), ShaderType::Bool);
        assert_eq!(ShaderType::Mat4.component_type(), ShaderType::Float);
        assert_eq!(ShaderType::Color.component_type(), ShaderType::Float);
    }

    #[test]
    fn test_color_is_a_vec3_alias() {
        assert_eq!(ShaderType::Color.vector_type(), ShaderType::Vec3);
        assert_eq!(ShaderType::Color.length(), 3);
        assert!(coercion_gap(ShaderType::Color, ShaderType::Vec3).is_none());
    }

    #[test]
    fn test_from_length_round_trip() {
        for ty in [
            ShaderType::Float,
            ShaderType::Vec2,
            ShaderType::Vec3,
            ShaderType::Vec4,
            ShaderType::IVec3,
            ShaderType::UVec2,
            ShaderType::BVec4,
        ] {
            let rebuilt = ShaderType::from_length(ty.length(), ty.component_type());
            assert_eq!(rebuilt, Some(ty));
        }
    }

    #[test]
    fn test_vector_from_matrix() {
        assert_eq!(ShaderType::Mat2.vector_from_matrix(), ShaderType::Vec2);
        assert_eq!(ShaderType::Mat3.vector_from_matrix(), ShaderType::Vec3);
        assert_eq!(ShaderType::Mat4.vector_from_matrix(), ShaderType::Vec4);
    }

    #[test]
    fn test_promote() {
        assert_eq!(
            ShaderType::Float.promote(ShaderType::Vec3),
            ShaderType::Vec3
        );
        assert_eq!(ShaderType::Int.promote(ShaderType::Float), ShaderType::Float);
        assert_eq!(ShaderType::IVec2.promote(ShaderType::Uint), ShaderType::IVec2);
        assert_eq!(ShaderType::Color.promote(ShaderType::Float), ShaderType::Vec3);
    }

    #[test]
    fn test_matrix_gap_is_reported_not_fatal() {
        assert!(coercion_gap(ShaderType::Mat4, ShaderType::Vec2).is_some());
        assert!(coercion_gap(ShaderType::Vec2, ShaderType::Mat4).is_some());
        // The two documented matrix special cases are supported.
        assert!(coercion_gap(ShaderType::Mat4, ShaderType::Mat3).is_none());
        assert!(coercion_gap(ShaderType::Mat3, ShaderType::Vec4).is_none());
    }
}
