//! Property tests for the shared format/coercion rules.

use proptest::prelude::*;
use proptest::sample::select;

use node_forge_shader_compiler::emitter::Emitter;
use node_forge_shader_compiler::emitter::glsl::GlslEmitter;
use node_forge_shader_compiler::emitter::wgsl::WgslEmitter;
use node_forge_shader_compiler::types::ShaderType;

const VALUE_TYPES: &[ShaderType] = &[
    ShaderType::Float,
    ShaderType::Int,
    ShaderType::Uint,
    ShaderType::Bool,
    ShaderType::Vec2,
    ShaderType::Vec3,
    ShaderType::Vec4,
    ShaderType::IVec2,
    ShaderType::IVec3,
    ShaderType::IVec4,
    ShaderType::UVec2,
    ShaderType::UVec3,
    ShaderType::UVec4,
    ShaderType::Mat2,
    ShaderType::Mat3,
    ShaderType::Mat4,
    ShaderType::Color,
];

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}"
}

proptest! {
    /// format(snippet, t, t) returns the snippet unchanged, for every type.
    #[test]
    fn format_to_same_type_is_identity(ty in select(VALUE_TYPES), s in ident()) {
        let wgsl = WgslEmitter;
        let glsl = GlslEmitter;
        prop_assert_eq!(wgsl.format(&s, ty, ty), s.clone());
        prop_assert_eq!(glsl.format(&s, ty, ty), s.clone());
    }

    /// No (from, to) pair panics, and re-formatting the result to the same
    /// target is stable.
    #[test]
    fn format_is_total_and_settles(
        from in select(VALUE_TYPES),
        to in select(VALUE_TYPES),
        s in ident(),
    ) {
        let wgsl = WgslEmitter;
        let once = wgsl.format(&s, from, to);
        prop_assert_eq!(wgsl.format(&once, to, to), once.clone());
    }

    /// Shrinking always takes the leading components, never reorders.
    #[test]
    fn truncation_takes_leading_components(s in ident()) {
        let wgsl = WgslEmitter;
        prop_assert_eq!(wgsl.format(&s, ShaderType::Vec4, ShaderType::Vec2), format!("{s}.xy"));
        prop_assert_eq!(wgsl.format(&s, ShaderType::Vec4, ShaderType::Vec3), format!("{s}.xyz"));
        prop_assert_eq!(wgsl.format(&s, ShaderType::Vec3, ShaderType::Vec2), format!("{s}.xy"));
        prop_assert_eq!(wgsl.format(&s, ShaderType::Vec3, ShaderType::Float), format!("{s}.x"));
    }
}
