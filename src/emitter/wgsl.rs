//! WGSL backend.
//!
//! Value uniforms are packed into one struct per uniform group (bound at
//! `@binding(0)` of the group's bind slot); texture/sampler pairs take the
//! following bindings. Varyings travel through a `VertexOutput` struct that
//! the vertex entry returns and the fragment entry receives.

use crate::allocator::{AttributeAlloc, TextureAlloc, UniformAlloc, VarAlloc, VaryingAlloc};
use crate::emitter::{Emitter, MethodResolution, StagePieces};
use crate::function::FunctionParam;
use crate::graph::{MathFunction, TextureDimension};
use crate::types::{ShaderStage, ShaderType};

pub struct WgslEmitter;

/// Keep only characters that are valid in a WGSL identifier.
fn sanitize_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn group_struct_name(group: &str) -> String {
    let ident = sanitize_ident(group);
    let mut chars = ident.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    };
    format!("{capitalized}Uniforms")
}

fn group_var_name(group: &str) -> String {
    format!("{}_uniforms", sanitize_ident(group))
}

impl WgslEmitter {
    fn sampler_type(&self, dimension: TextureDimension) -> &'static str {
        match dimension {
            TextureDimension::Depth => "sampler_comparison",
            _ => "sampler",
        }
    }
}

impl Emitter for WgslEmitter {
    fn target_name(&self) -> &'static str {
        "wgsl"
    }

    fn get_type(&self, ty: ShaderType) -> String {
        match ty {
            ShaderType::Float => "f32",
            ShaderType::Int => "i32",
            ShaderType::Uint => "u32",
            ShaderType::Bool => "bool",
            ShaderType::Vec2 => "vec2f",
            ShaderType::Vec3 | ShaderType::Color => "vec3f",
            ShaderType::Vec4 => "vec4f",
            ShaderType::IVec2 => "vec2i",
            ShaderType::IVec3 => "vec3i",
            ShaderType::IVec4 => "vec4i",
            ShaderType::UVec2 => "vec2u",
            ShaderType::UVec3 => "vec3u",
            ShaderType::UVec4 => "vec4u",
            ShaderType::BVec2 => "vec2<bool>",
            ShaderType::BVec3 => "vec3<bool>",
            ShaderType::BVec4 => "vec4<bool>",
            ShaderType::Mat2 => "mat2x2<f32>",
            ShaderType::Mat3 => "mat3x3<f32>",
            ShaderType::Mat4 => "mat4x4<f32>",
            ShaderType::Texture => "texture_2d<f32>",
            ShaderType::CubeTexture => "texture_cube<f32>",
            ShaderType::DepthTexture => "texture_depth_2d",
            ShaderType::Sampler => "sampler",
            ShaderType::Property | ShaderType::Void => "",
        }
        .to_string()
    }

    fn get_method(&self, op: MathFunction, ty: ShaderType) -> MethodResolution {
        match op {
            MathFunction::InverseSqrt => MethodResolution::Native("inverseSqrt"),
            MathFunction::Dpdx => MethodResolution::Native("dpdx"),
            MathFunction::Dpdy => MethodResolution::Native("dpdy"),
            MathFunction::Atan2 => MethodResolution::Native("atan2"),
            MathFunction::Mod => {
                // WGSL `%` truncates; GLSL-style mod needs a floor form.
                let spelled = self.get_type(ty.vector_type());
                let name = format!("mod_{}", sanitize_ident(&spelled));
                let source = format!(
                    "fn {name}(x: {spelled}, y: {spelled}) -> {spelled} {{\n\treturn x - y * floor(x / y);\n}}\n"
                );
                MethodResolution::Polyfill { name, source }
            }
            MathFunction::Negate => MethodResolution::Native("-"),
            other => MethodResolution::Native(other.token()),
        }
    }

    fn generate_texture(&self, tex: &TextureAlloc, uv: &str) -> String {
        if tex.stage == ShaderStage::Vertex {
            // Implicit-derivative sampling is fragment-only; clamp to the
            // base level elsewhere.
            return self.generate_texture_level(tex, uv, "0.0");
        }
        format!(
            "textureSample({}, {}, {uv})",
            tex.texture_name, tex.sampler_name
        )
    }

    fn generate_texture_level(&self, tex: &TextureAlloc, uv: &str, level: &str) -> String {
        format!(
            "textureSampleLevel({}, {}, {uv}, {level})",
            tex.texture_name, tex.sampler_name
        )
    }

    fn generate_texture_bias(&self, tex: &TextureAlloc, uv: &str, bias: &str) -> String {
        format!(
            "textureSampleBias({}, {}, {uv}, {bias})",
            tex.texture_name, tex.sampler_name
        )
    }

    fn generate_texture_grad(&self, tex: &TextureAlloc, uv: &str, ddx: &str, ddy: &str) -> String {
        format!(
            "textureSampleGrad({}, {}, {uv}, {ddx}, {ddy})",
            tex.texture_name, tex.sampler_name
        )
    }

    fn generate_texture_compare(&self, tex: &TextureAlloc, uv: &str, reference: &str) -> String {
        format!(
            "textureSampleCompare({}, {}, {uv}, {reference})",
            tex.texture_name, tex.sampler_name
        )
    }

    fn get_var(&self, ty: ShaderType, name: &str) -> String {
        format!("var {name}: {}", self.get_type(ty))
    }

    fn get_attribute_decl(&self, attribute: &AttributeAlloc) -> String {
        format!(
            "@location({}) {}: {}",
            attribute.location,
            sanitize_ident(&attribute.name),
            self.get_type(attribute.ty)
        )
    }

    fn get_varying_decl(&self, varying: &VaryingAlloc) -> String {
        format!(
            "@location({}) {}: {}",
            varying.location,
            varying.name,
            self.get_type(varying.ty.vector_type())
        )
    }

    fn get_uniform_decl(&self, uniform: &UniformAlloc) -> String {
        format!("{}: {}", uniform.name, self.get_type(uniform.ty.vector_type()))
    }

    fn uniform_property_name(&self, uniform: &UniformAlloc) -> String {
        format!("{}.{}", group_var_name(&uniform.group), uniform.name)
    }

    fn varying_property_name(&self, varying: &VaryingAlloc, _stage: ShaderStage) -> String {
        format!("varyings.{}", varying.name)
    }

    fn attribute_property_name(&self, attribute: &AttributeAlloc) -> String {
        sanitize_ident(&attribute.name)
    }

    fn parameter_property_name(&self, param: &FunctionParam) -> String {
        if param.pointer {
            format!("(*{})", param.name)
        } else {
            param.name.clone()
        }
    }

    fn reference_expr(&self, snippet: &str) -> String {
        format!("&{snippet}")
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
                    format!("{}: ptr<function, {}>", p.name, self.get_type(p.ty.vector_type()))
                } else {
                    format!("{}: {}", p.name, self.get_type(p.ty.vector_type()))
                }
            })
            .collect();

        let mut out = String::new();
        if return_type == ShaderType::Void {
            out.push_str(&format!("fn {name}({}) {{\n", params.join(", ")));
        } else {
            out.push_str(&format!(
                "fn {name}({}) -> {} {{\n",
                params.join(", "),
                self.get_type(return_type.vector_type())
            ));
        }
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
        let mut out = self.signature();

        // Value uniforms, one struct per group.
        let mut group_indices: Vec<usize> = pieces
            .uniforms
            .iter()
            .map(|u| u.group_index)
            .chain(pieces.textures.iter().map(|t| t.group_index))
            .collect();
        group_indices.sort_unstable();
        group_indices.dedup();

        for &gi in &group_indices {
            let members: Vec<&&UniformAlloc> = pieces
                .uniforms
                .iter()
                .filter(|u| u.group_index == gi)
                .collect();
            if members.is_empty() {
                continue;
            }
            let group = &members[0].group;
            out.push_str(&format!("struct {} {{\n", group_struct_name(group)));
            for member in &members {
                out.push_str(&format!("\t{},\n", self.get_uniform_decl(member)));
            }
            out.push_str("}\n");
            out.push_str(&format!(
                "@group({gi}) @binding(0) var<uniform> {}: {};\n\n",
                group_var_name(group),
                group_struct_name(group)
            ));
        }

        // Texture/sampler pairs follow the group's uniform struct binding.
        for tex in &pieces.textures {
            let tex_binding = 1 + tex.order_in_group * 2;
            let samp_binding = tex_binding + 1;
            out.push_str(&format!(
                "@group({}) @binding({tex_binding}) var {}: {};\n",
                tex.group_index,
                tex.texture_name,
                self.get_type(tex.dimension.resource_type())
            ));
            out.push_str(&format!(
                "@group({}) @binding({samp_binding}) var {}: {};\n\n",
                tex.group_index,
                tex.sampler_name,
                self.sampler_type(tex.dimension)
            ));
        }

        // Stage IO struct shared by vertex and fragment.
        if matches!(pieces.stage, ShaderStage::Vertex | ShaderStage::Fragment) {
            out.push_str("struct VertexOutput {\n");
            out.push_str("\t@builtin(position) position: vec4f,\n");
            for varying in pieces.varyings {
                out.push_str(&format!("\t{},\n", self.get_varying_decl(varying)));
            }
            out.push_str("}\n\n");
        }

        for code in pieces.codes {
            out.push_str(&code.code);
            out.push('\n');
        }

        let var_decls = |out: &mut String| {
            for var in pieces.vars {
                out.push_str(&format!("\t{};\n", self.get_var(var.ty, &var.name)));
            }
        };

        match pieces.stage {
            ShaderStage::Vertex => {
                out.push_str("@vertex\n");
                if pieces.attributes.is_empty() {
                    out.push_str("fn vs_main() -> VertexOutput {\n");
                } else {
                    let params: Vec<String> = pieces
                        .attributes
                        .iter()
                        .map(|a| format!("\t{},", self.get_attribute_decl(a)))
                        .collect();
                    out.push_str(&format!(
                        "fn vs_main(\n{}\n) -> VertexOutput {{\n",
                        params.join("\n")
                    ));
                }
                out.push_str("\tvar varyings: VertexOutput;\n");
                var_decls(&mut out);
                out.push_str(pieces.prelude);
                out.push_str(pieces.flow);
                if let Some(result) = pieces.result {
                    out.push_str(&format!("\tvaryings.position = {result};\n"));
                }
                out.push_str("\treturn varyings;\n}\n");
            }
            ShaderStage::Fragment => {
                out.push_str("@fragment\n");
                out.push_str("fn fs_main(varyings: VertexOutput) -> @location(0) vec4f {\n");
                var_decls(&mut out);
                out.push_str(pieces.prelude);
                out.push_str(pieces.flow);
                match pieces.result {
                    Some(result) => out.push_str(&format!("\treturn {result};\n")),
                    None => out.push_str("\treturn vec4f(0.0, 0.0, 0.0, 1.0);\n"),
                }
                out.push_str("}\n");
            }
            ShaderStage::Compute => {
                out.push_str("@compute @workgroup_size(64)\n");
                out.push_str("fn cs_main(@builtin(global_invocation_id) global_id: vec3u) {\n");
                var_decls(&mut out);
                out.push_str(pieces.prelude);
                out.push_str(pieces.flow);
                out.push_str("}\n");
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ConstValue;
    use crate::graph::NodeId;
    use crate::types::UpdateFrequency;

    #[test]
    fn test_type_spelling() {
        let e = WgslEmitter;
        assert_eq!(e.get_type(ShaderType::Vec3), "vec3f");
        assert_eq!(e.get_type(ShaderType::Color), "vec3f");
        assert_eq!(e.get_type(ShaderType::Mat4), "mat4x4<f32>");
        assert_eq!(e.get_type(ShaderType::Texture), "texture_2d<f32>");
    }

    #[test]
    fn test_format_idempotent() {
        let e = WgslEmitter;
        assert_eq!(
            e.format("foo", ShaderType::Vec3, ShaderType::Vec3),
            "foo"
        );
        assert_eq!(
            e.format("vec2f(a, b)", ShaderType::Vec2, ShaderType::Vec2),
            "vec2f(a, b)"
        );
        // Color is a vec3 alias, not a conversion.
        assert_eq!(e.format("c", ShaderType::Color, ShaderType::Vec3), "c");
    }

    #[test]
    fn test_format_truncates_leading_components() {
        let e = WgslEmitter;
        assert_eq!(e.format("v", ShaderType::Vec4, ShaderType::Vec2), "v.xy");
        assert_eq!(e.format("v", ShaderType::Vec3, ShaderType::Float), "v.x");
    }

    #[test]
    fn test_format_pads_growth() {
        let e = WgslEmitter;
        // vec3 -> vec4 pads w with one (position building).
        assert_eq!(
            e.format("v", ShaderType::Vec3, ShaderType::Vec4),
            "vec4f(v, 1.0)"
        );
        // vec2 -> vec3 pads z with zero.
        assert_eq!(
            e.format("v", ShaderType::Vec2, ShaderType::Vec3),
            "vec3f(v, 0.0)"
        );
    }

    #[test]
    fn test_format_matrix_special_cases() {
        let e = WgslEmitter;
        assert_eq!(
            e.format("m", ShaderType::Mat4, ShaderType::Mat3),
            "mat3x3<f32>(m[0].xyz, m[1].xyz, m[2].xyz)"
        );
        // The documented pass-through gap.
        assert_eq!(e.format("m", ShaderType::Mat4, ShaderType::Vec2), "m");
        assert_eq!(e.format("v", ShaderType::Vec2, ShaderType::Mat4), "v");
    }

    #[test]
    fn test_format_scalar_component_conversion() {
        let e = WgslEmitter;
        assert_eq!(
            e.format("1u", ShaderType::Uint, ShaderType::Vec3),
            "vec3f(f32(1u))"
        );
        assert_eq!(
            e.format("x", ShaderType::Float, ShaderType::Vec3),
            "vec3f(x)"
        );
    }

    #[test]
    fn test_generate_const() {
        let e = WgslEmitter;
        assert_eq!(e.generate_const(&ConstValue::Float(0.5)), "0.5");
        assert_eq!(e.generate_const(&ConstValue::Uint(3)), "3u");
        assert_eq!(
            e.generate_const(&ConstValue::Vec3([1.0, 0.5, 0.0])),
            "vec3f(1.0, 0.5, 0.0)"
        );
        assert_eq!(
            e.generate_const(&ConstValue::Color([1.0, 0.0, 0.0])),
            "vec3f(1.0, 0.0, 0.0)"
        );
    }

    #[test]
    fn test_mod_polyfill_is_valid_wgsl() {
        let e = WgslEmitter;
        let MethodResolution::Polyfill { name, source } =
            e.get_method(MathFunction::Mod, ShaderType::Vec3)
        else {
            panic!("expected polyfill for mod");
        };
        assert_eq!(name, "mod_vec3f");
        naga::front::wgsl::parse_str(&source).expect("polyfill should parse as WGSL");
    }

    #[test]
    fn test_uniform_property_goes_through_group_struct() {
        let e = WgslEmitter;
        let u = UniformAlloc {
            name: "nodeUniform0".to_string(),
            ty: ShaderType::Vec3,
            group: "frame".to_string(),
            group_index: 0,
            order_in_group: 0,
            stage: ShaderStage::Fragment,
            node: NodeId(0),
            update: UpdateFrequency::Frame,
        };
        assert_eq!(e.uniform_property_name(&u), "frame_uniforms.nodeUniform0");
    }
}
