//! GLSL backend.
//!
//! Classic declaration style: plain `uniform` declarations, combined
//! texture samplers, `in`/`out` varyings with the vertex stage writing and
//! the fragment stage reading the same names.

use crate::allocator::{AttributeAlloc, TextureAlloc, UniformAlloc, VarAlloc, VaryingAlloc};
use crate::emitter::{Emitter, MethodResolution, StagePieces};
use crate::function::FunctionParam;
use crate::graph::{MathFunction, TextureDimension};
use crate::types::{ShaderStage, ShaderType};

pub struct GlslEmitter;

impl Emitter for GlslEmitter {
    fn target_name(&self) -> &'static str {
        "glsl"
    }

    fn get_type(&self, ty: ShaderType) -> String {
        match ty {
            ShaderType::Float => "float",
            ShaderType::Int => "int",
            ShaderType::Uint => "uint",
            ShaderType::Bool => "bool",
            ShaderType::Vec2 => "vec2",
            ShaderType::Vec3 | ShaderType::Color => "vec3",
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
            ShaderType::Texture => "sampler2D",
            ShaderType::CubeTexture => "samplerCube",
            ShaderType::DepthTexture => "sampler2DShadow",
            ShaderType::Sampler => "sampler2D",
            ShaderType::Property => "",
            ShaderType::Void => "void",
        }
        .to_string()
    }

    fn get_method(&self, op: MathFunction, _ty: ShaderType) -> MethodResolution {
        match op {
            MathFunction::InverseSqrt => MethodResolution::Native("inversesqrt"),
            // Two-argument atan is the GLSL spelling of atan2.
            MathFunction::Atan2 => MethodResolution::Native("atan"),
            MathFunction::Dpdx => MethodResolution::Native("dFdx"),
            MathFunction::Dpdy => MethodResolution::Native("dFdy"),
            MathFunction::Mod => MethodResolution::Native("mod"),
            MathFunction::Negate => MethodResolution::Native("-"),
            other => MethodResolution::Native(other.token()),
        }
    }

    fn generate_texture(&self, tex: &TextureAlloc, uv: &str) -> String {
        format!("texture({}, {uv})", tex.texture_name)
    }

    fn generate_texture_level(&self, tex: &TextureAlloc, uv: &str, level: &str) -> String {
        format!("textureLod({}, {uv}, {level})", tex.texture_name)
    }

    fn generate_texture_bias(&self, tex: &TextureAlloc, uv: &str, bias: &str) -> String {
        format!("texture({}, {uv}, {bias})", tex.texture_name)
    }

    fn generate_texture_grad(&self, tex: &TextureAlloc, uv: &str, ddx: &str, ddy: &str) -> String {
        format!("textureGrad({}, {uv}, {ddx}, {ddy})", tex.texture_name)
    }

    fn generate_texture_compare(&self, tex: &TextureAlloc, uv: &str, reference: &str) -> String {
        format!("texture({}, vec3({uv}, {reference}))", tex.texture_name)
    }

    fn get_var(&self, ty: ShaderType, name: &str) -> String {
        format!("{} {name}", self.get_type(ty))
    }

    fn get_attribute_decl(&self, attribute: &AttributeAlloc) -> String {
        format!(
            "layout(location = {}) in {} {};",
            attribute.location,
            self.get_type(attribute.ty),
            attribute.name
        )
    }

    fn get_varying_decl(&self, varying: &VaryingAlloc) -> String {
        format!("{} {}", self.get_type(varying.ty.vector_type()), varying.name)
    }

    fn get_uniform_decl(&self, uniform: &UniformAlloc) -> String {
        format!(
            "uniform {} {};",
            self.get_type(uniform.ty.vector_type()),
            uniform.name
        )
    }

    fn compose_function(
        &self,
        name: &str,
        params: &[FunctionParam],
        return_type: ShaderType,
        vars: &[VarAlloc],
        flow: &str,
        result: &str,
    ) -> String {
        let params: Vec<String> = params
            .iter()
            .map(|p| {
                if p.pointer {
                    format!("inout {} {}", self.get_type(p.ty.vector_type()), p.name)
                } else {
                    format!("{} {}", self.get_type(p.ty.vector_type()), p.name)
                }
            })
            .collect();

        let mut out = format!(
            "{} {name}({}) {{\n",
            self.get_type(return_type.vector_type()),
            params.join(", ")
        );
        for var in vars {
            out.push_str(&format!("\t{};\n", self.get_var(var.ty, &var.name)));
        }
        out.push_str(flow);
        if return_type != ShaderType::Void && !result.is_empty() {
            out.push_str(&format!("\treturn {result};\n"));
        }
        out.push_str("}\n");
        out
    }

    fn compose_stage(&self, pieces: &StagePieces) -> String {
        let mut out = String::from("#version 450\n");
        out.push_str(&self.signature());
        out.push('\n');

        for uniform in &pieces.uniforms {
            out.push_str(&self.get_uniform_decl(uniform));
            out.push('\n');
        }
        for tex in &pieces.textures {
            let sampler = match tex.dimension {
                TextureDimension::D2 => "sampler2D",
                TextureDimension::Cube => "samplerCube",
                TextureDimension::Depth => "sampler2DShadow",
            };
            out.push_str(&format!("uniform {sampler} {};\n", tex.texture_name));
        }
        if !pieces.uniforms.is_empty() || !pieces.textures.is_empty() {
            out.push('\n');
        }

        match pieces.stage {
            ShaderStage::Vertex => {
                for attribute in pieces.attributes {
                    out.push_str(&self.get_attribute_decl(attribute));
                    out.push('\n');
                }
                for varying in pieces.varyings {
                    out.push_str(&format!("out {};\n", self.get_varying_decl(varying)));
                }
            }
            ShaderStage::Fragment => {
                for varying in pieces.varyings {
                    out.push_str(&format!("in {};\n", self.get_varying_decl(varying)));
                }
                out.push_str("layout(location = 0) out vec4 fragColor;\n");
            }
            ShaderStage::Compute => {
                out.push_str("layout(local_size_x = 64) in;\n");
            }
        }
        out.push('\n');

        for code in pieces.codes {
            out.push_str(&code.code);
            out.push('\n');
        }

        out.push_str("void main() {\n");
        for var in pieces.vars {
            out.push_str(&format!("\t{};\n", self.get_var(var.ty, &var.name)));
        }
        out.push_str(pieces.prelude);
        out.push_str(pieces.flow);
        match (pieces.stage, pieces.result) {
            (ShaderStage::Vertex, Some(result)) => {
                out.push_str(&format!("\tgl_Position = {result};\n"));
            }
            (ShaderStage::Fragment, Some(result)) => {
                out.push_str(&format!("\tfragColor = {result};\n"));
            }
            _ => {}
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::Emitter;

    #[test]
    fn test_type_spelling() {
        let e = GlslEmitter;
        assert_eq!(e.get_type(ShaderType::Vec3), "vec3");
        assert_eq!(e.get_type(ShaderType::Color), "vec3");
        assert_eq!(e.get_type(ShaderType::Mat3), "mat3");
        assert_eq!(e.get_type(ShaderType::Texture), "sampler2D");
    }

    #[test]
    fn test_atan2_spells_as_atan() {
        let e = GlslEmitter;
        let MethodResolution::Native(name) = e.get_method(MathFunction::Atan2, ShaderType::Float)
        else {
            panic!("expected native method");
        };
        assert_eq!(name, "atan");
    }

    #[test]
    fn test_format_shares_default_rules() {
        let e = GlslEmitter;
        assert_eq!(
            e.format("v", ShaderType::Vec3, ShaderType::Vec4),
            "vec4(v, 1.0)"
        );
        assert_eq!(
            e.format("m", ShaderType::Mat4, ShaderType::Mat3),
            "mat3(m[0].xyz, m[1].xyz, m[2].xyz)"
        );
    }
}
