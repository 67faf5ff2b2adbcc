//! The pluggable target-language contract.
//!
//! The compiler core never hard-codes target syntax; everything lexical
//! (type spelling, texture-sampling call forms, declaration syntax, stage
//! assembly) goes through this trait. Type-system queries and the
//! `format` coercion table have shared default implementations that
//! backends may override for opaque-resource special cases.

pub mod glsl;
pub mod wgsl;

use crate::allocator::{AttributeAlloc, TextureAlloc, UniformAlloc, VarAlloc, VaryingAlloc};
use crate::constant::{ConstValue, fmt_f32};
use crate::function::{FunctionParam, NodeCode};
use crate::graph::MathFunction;
use crate::types::{ShaderStage, ShaderType};

/// How an abstract intrinsic resolves on a target: either a native spelling
/// or a polyfill function the builder injects once per compile.
#[derive(Clone, Debug)]
pub enum MethodResolution {
    Native(&'static str),
    Polyfill { name: String, source: String },
}

/// Everything an emitter needs to assemble one stage's source text.
pub struct StagePieces<'a> {
    pub stage: ShaderStage,
    pub uniforms: Vec<&'a UniformAlloc>,
    pub textures: Vec<&'a TextureAlloc>,
    pub attributes: &'a [AttributeAlloc],
    pub varyings: &'a [VaryingAlloc],
    pub vars: &'a [VarAlloc],
    pub codes: &'a [NodeCode],
    /// Statements emitted into this stage from another stage's build
    /// (varying assignments land here), placed ahead of the main flow.
    pub prelude: &'a str,
    pub flow: &'a str,
    pub result: Option<&'a str>,
}

pub trait Emitter {
    /// Short target tag used in diagnostics ("wgsl", "glsl").
    fn target_name(&self) -> &'static str;

    /// Target spelling of an abstract type token.
    fn get_type(&self, ty: ShaderType) -> String;

    // Pure type-system queries, exposed through the contract so a backend
    // can override resolution for its own opaque types.

    fn get_vector_type(&self, ty: ShaderType) -> ShaderType {
        ty.vector_type()
    }

    fn get_component_type(&self, ty: ShaderType) -> ShaderType {
        ty.component_type()
    }

    fn get_type_length(&self, ty: ShaderType) -> usize {
        ty.length()
    }

    /// Rewrite `snippet` (of type `from`) into type `to`.
    ///
    /// Deterministic and idempotent: formatting a snippet to its own type
    /// returns it unchanged. Unsupported matrix pairs pass through
    /// unmodified; [`crate::types::coercion_gap`] reports those.
    fn format(&self, snippet: &str, from: ShaderType, to: ShaderType) -> String {
        default_format(self, snippet, from, to)
    }

    /// Target literal for a constant value.
    fn generate_const(&self, value: &ConstValue) -> String {
        match value {
            ConstValue::Float(v) => fmt_f32(*v),
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Uint(v) => format!("{v}u"),
            ConstValue::Bool(v) => v.to_string(),
            other => {
                let parts: Vec<String> = other.components().iter().map(|&c| fmt_f32(c)).collect();
                format!("{}({})", self.get_type(other.shader_type()), parts.join(", "))
            }
        }
    }

    /// Map an abstract intrinsic to the target spelling, or to a polyfill
    /// compiled alongside the shader when the target has no native form.
    fn get_method(&self, op: MathFunction, ty: ShaderType) -> MethodResolution;

    // Texture sampling call forms. Each target spells these structurally
    // differently, so there is no shared default.

    fn generate_texture(&self, tex: &TextureAlloc, uv: &str) -> String;
    fn generate_texture_level(&self, tex: &TextureAlloc, uv: &str, level: &str) -> String;
    fn generate_texture_bias(&self, tex: &TextureAlloc, uv: &str, bias: &str) -> String;
    fn generate_texture_grad(&self, tex: &TextureAlloc, uv: &str, ddx: &str, ddy: &str) -> String;
    fn generate_texture_compare(&self, tex: &TextureAlloc, uv: &str, reference: &str) -> String;

    /// Declaration fragment for a local variable (no initializer, no
    /// terminator).
    fn get_var(&self, ty: ShaderType, name: &str) -> String;

    fn get_attribute_decl(&self, attribute: &AttributeAlloc) -> String;
    fn get_varying_decl(&self, varying: &VaryingAlloc) -> String;
    fn get_uniform_decl(&self, uniform: &UniformAlloc) -> String;

    /// Expression a uniform is read through inside shader code.
    fn uniform_property_name(&self, uniform: &UniformAlloc) -> String {
        uniform.name.clone()
    }

    /// Expression a varying is read or written through in `stage`.
    fn varying_property_name(&self, varying: &VaryingAlloc, stage: ShaderStage) -> String {
        let _ = stage;
        varying.name.clone()
    }

    /// Expression a vertex attribute is read through.
    fn attribute_property_name(&self, attribute: &AttributeAlloc) -> String {
        attribute.name.clone()
    }

    /// Expression a function parameter is read through inside its body.
    fn parameter_property_name(&self, param: &FunctionParam) -> String {
        param.name.clone()
    }

    /// Call-site expression passing `snippet` by reference (pointer
    /// parameters).
    fn reference_expr(&self, snippet: &str) -> String {
        snippet.to_string()
    }

    /// Assemble a compiled function body into a named target function.
    fn compose_function(
        &self,
        name: &str,
        params: &[FunctionParam],
        return_type: ShaderType,
        vars: &[VarAlloc],
        flow: &str,
        result: &str,
    ) -> String;

    /// Assemble one stage's complete source text.
    fn compose_stage(&self, pieces: &StagePieces) -> String;

    /// Header comment prepended to every composed stage.
    fn signature(&self) -> String {
        format!("// node-forge shader graph ({})\n", self.target_name())
    }
}

/// The shared coercion table. Matrix conversions past the two supported
/// special cases pass through unchanged; see [`crate::types::coercion_gap`].
pub fn default_format<E: Emitter + ?Sized>(
    emitter: &E,
    snippet: &str,
    from: ShaderType,
    to: ShaderType,
) -> String {
    let from = emitter.get_vector_type(from);
    let to = emitter.get_vector_type(to);

    if from == to || to.is_reference() {
        return snippet.to_string();
    }

    let from_len = emitter.get_type_length(from);
    let to_len = emitter.get_type_length(to);

    // mat4 -> mat3: upper-left 3x3 via per-column truncation.
    if from_len == 16 && to_len == 9 {
        return format!(
            "{}({snippet}[0].xyz, {snippet}[1].xyz, {snippet}[2].xyz)",
            emitter.get_type(to)
        );
    }

    // mat3 -> vec4 as two packed column pairs; used only by the
    // uniform-array element path.
    if from_len == 9 && to_len == 4 {
        return format!(
            "{}({snippet}[0].xy, {snippet}[1].xy)",
            emitter.get_type(to)
        );
    }

    if from_len > 4 {
        // Remaining matrix-sized sources are unsupported; pass through.
        return snippet.to_string();
    }

    if to_len > 4 || to_len == 0 {
        // Matrix-sized or opaque targets are unsupported; pass through.
        return snippet.to_string();
    }

    if from_len == to_len {
        return format!("{}({snippet})", emitter.get_type(to));
    }

    if from_len > to_len {
        // Shrink: take the first N components, then reconcile component
        // types.
        let swizzle = &"xyzw"[..to_len];
        let truncated =
            ShaderType::from_length(to_len, emitter.get_component_type(from)).unwrap_or(to);
        return default_format(emitter, &format!("{snippet}.{swizzle}"), truncated, to);
    }

    if to_len == 4 && from_len > 1 {
        // Grow into a position-like vec4: pad w with one.
        let to3 = ShaderType::from_length(3, emitter.get_component_type(to)).unwrap_or(to);
        return format!(
            "{}({}, 1.0)",
            emitter.get_type(to),
            default_format(emitter, snippet, from, to3)
        );
    }

    if from_len == 2 {
        // vec2 -> vec3: pad z with zero, never duplicate the last
        // component.
        let to2 = ShaderType::from_length(2, emitter.get_component_type(to)).unwrap_or(to);
        return format!(
            "{}({}, 0.0)",
            emitter.get_type(to),
            default_format(emitter, snippet, from, to2)
        );
    }

    // Scalar source: wrap a component conversion when the scalar kind
    // differs, then construct the one-argument vector.
    let mut snippet = snippet.to_string();
    if from_len == 1 && to_len > 1 && from != emitter.get_component_type(to) {
        snippet = format!("{}({snippet})", emitter.get_type(emitter.get_component_type(to)));
    }

    format!("{}({snippet})", emitter.get_type(to))
}
