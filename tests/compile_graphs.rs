//! End-to-end graph -> shader-text compiles. Every WGSL module produced
//! here must parse and validate under naga.

use node_forge_shader_compiler::builder::{GeometryLayout, ShaderBuilder};
use node_forge_shader_compiler::constant::ConstValue;
use node_forge_shader_compiler::emitter::glsl::GlslEmitter;
use node_forge_shader_compiler::emitter::wgsl::WgslEmitter;
use node_forge_shader_compiler::graph::{Graph, MathFunction, NodeId, Operator};
use node_forge_shader_compiler::types::{ShaderStage, ShaderType};
use node_forge_shader_compiler::validation::validate_wgsl_module;

fn compile_wgsl(graph: &mut Graph, roots: &[(ShaderStage, NodeId)]) -> node_forge_shader_compiler::CompiledShader {
    let emitter = WgslEmitter;
    let mut builder = ShaderBuilder::new(graph, &emitter);
    for (stage, root) in roots {
        builder.add_flow(*stage, *root);
    }
    builder.build().expect("compile failed")
}

fn assert_valid_wgsl(artifact: &node_forge_shader_compiler::CompiledShader) {
    for stage in [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Compute] {
        if let Some(source) = artifact.stage_source(stage) {
            validate_wgsl_module(source)
                .unwrap_or_else(|e| panic!("stage {stage:?} emitted invalid WGSL: {e:#}"));
        }
    }
}

#[test]
fn textured_material_compiles_to_valid_wgsl() {
    let mut g = Graph::new();

    // Vertex: clip position = mvp * vec4(position, 1.0).
    let position = g.attribute("position", ShaderType::Vec3);
    let mvp = g.uniform(
        Some("mvp"),
        ConstValue::Mat4([
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ]),
        "object",
    );
    let position4 = g.convert(position, ShaderType::Vec4);
    let clip = g.mul(mvp, position4);

    // Fragment: albedo sample tinted by a per-frame color.
    let uv = g.attribute("uv", ShaderType::Vec2);
    let albedo = g.texture("albedo", uv);
    let tint = g.uniform(Some("tint"), ConstValue::Vec3([1.0, 0.9, 0.8]), "frame");
    let tint4 = g.convert(tint, ShaderType::Vec4);
    let color = g.mul(albedo, tint4);

    let artifact = compile_wgsl(
        &mut g,
        &[(ShaderStage::Vertex, clip), (ShaderStage::Fragment, color)],
    );
    assert_valid_wgsl(&artifact);

    let vertex = artifact.vertex.as_deref().unwrap();
    let fragment = artifact.fragment.as_deref().unwrap();
    assert!(vertex.contains("fn vs_main"));
    assert!(vertex.contains("object_uniforms.mvp"));
    assert!(fragment.contains("textureSample(nodeTexture0, nodeSampler0"));
    assert!(fragment.contains("frame_uniforms.tint"));

    // The uv attribute crossed into the fragment stage through exactly one
    // varying, never through ad hoc state.
    assert_eq!(artifact.varyings.len(), 1);
    assert!(fragment.contains("varyings.nodeVarying0"));
    assert!(vertex.contains("varyings.nodeVarying0 = uv"));

    // Group membership is preserved into the allocation records.
    let tint_record = artifact
        .uniforms
        .iter()
        .find(|u| u.name == "tint")
        .expect("tint uniform record");
    assert_eq!(tint_record.group, "frame");
    let mvp_record = artifact
        .uniforms
        .iter()
        .find(|u| u.name == "mvp")
        .expect("mvp uniform record");
    assert_eq!(mvp_record.group, "object");
    assert_ne!(tint_record.group_index, mvp_record.group_index);
}

#[test]
fn scalar_promotion_broadcasts_through_vector_constructor() {
    let mut g = Graph::new();
    let v = g.splat(0.5, ShaderType::Vec3);
    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, v)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    assert!(
        fragment.contains("vec3f(0.5, 0.5, 0.5)"),
        "expected three identical components, got:\n{fragment}"
    );
}

#[test]
fn loop_direction_is_inferred_from_bounds() {
    // start=10, end=0 with no explicit condition: descending (>=, decrement).
    let mut g = Graph::new();
    let acc_init = g.float(0.0);
    let acc = g.named_var(acc_init, "total");
    let start = g.int(10);
    let end = g.int(0);
    let counter = g.loop_counter(ShaderType::Int);
    let counter_f = g.convert(counter, ShaderType::Float);
    let sum = g.add_op(acc, counter_f);
    let body = g.assign(acc, sum);
    let lp = g.loop_between(start, end, counter, body);
    let root = g.stack(vec![acc, lp], Some(acc));

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, root)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    assert!(
        fragment.contains("for (var i0: i32 = 10; i0 >= 0; i0 -= 1)"),
        "expected a descending loop, got:\n{fragment}"
    );

    // start=0, end=10: ascending (<, increment).
    let mut g = Graph::new();
    let acc_init = g.float(0.0);
    let acc = g.named_var(acc_init, "total");
    let start = g.int(0);
    let end = g.int(10);
    let counter = g.loop_counter(ShaderType::Int);
    let counter_f = g.convert(counter, ShaderType::Float);
    let sum = g.add_op(acc, counter_f);
    let body = g.assign(acc, sum);
    let lp = g.loop_between(start, end, counter, body);
    let root = g.stack(vec![acc, lp], Some(acc));

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, root)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    assert!(
        fragment.contains("for (var i0: i32 = 0; i0 < 10; i0 += 1)"),
        "expected an ascending loop, got:\n{fragment}"
    );
}

#[test]
fn overload_selection_is_all_or_nothing() {
    let mut g = Graph::new();
    let scalar_blend = g.function(
        "blend",
        &[("a", ShaderType::Float), ("b", ShaderType::Float)],
        ShaderType::Float,
        |g, p| g.add_op(p[0], p[1]),
    );
    let vector_blend = g.function(
        "blend",
        &[("a", ShaderType::Vec3), ("b", ShaderType::Float)],
        ShaderType::Vec3,
        |g, p| g.mul(p[0], p[1]),
    );

    let a = g.constant([1.0f32, 0.5, 0.25]);
    let b = g.float(0.5);
    let call = g.call_overloaded(vec![scalar_blend, vector_blend], vec![a, b]);

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, call)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();

    // (vec3, float) arguments: the (float, float) candidate scores 0 on the
    // first-parameter mismatch; the (vec3, float) candidate scores 2.
    assert!(fragment.contains("blend_1("), "got:\n{fragment}");
    assert!(!fragment.contains("blend_0("), "got:\n{fragment}");
    assert!(fragment.contains("fn blend_1(a: vec3f, b: f32) -> vec3f"));
}

#[test]
fn pointer_parameters_pass_references() {
    let mut g = Graph::new();
    let shift = g.function_with_pointers(
        "shift",
        &[("target", ShaderType::Float), ("amount", ShaderType::Float)],
        &["target"],
        ShaderType::Void,
        |g, p| {
            let sum = g.add_op(p[0], p[1]);
            g.assign(p[0], sum)
        },
    );

    let init = g.float(1.0);
    let total = g.named_var(init, "total");
    let amount = g.float(0.5);
    let call = g.call(shift, vec![total, amount]);
    let root = g.stack(vec![total, call], Some(total));

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, root)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    assert!(fragment.contains("fn shift_0(target: ptr<function, f32>, amount: f32)"));
    assert!(fragment.contains("(*target) = ((*target) + amount)"));
    assert!(fragment.contains("shift_0(&total, 0.5)"));
}

#[test]
fn vec2_to_vec4_and_back_truncates_leading_components() {
    let mut g = Graph::new();
    let v2 = g.constant([1.0f32, 2.0]);
    let grown = g.convert(v2, ShaderType::Vec4);
    let back = g.convert(grown, ShaderType::Vec2);
    let root = g.convert(back, ShaderType::Vec4);

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, root)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    // Growth pads (0.0 then 1.0), truncation slices the leading pair back
    // out; the original components survive the round trip.
    assert!(fragment.contains("vec2f(1.0, 2.0)"), "got:\n{fragment}");
    assert!(fragment.contains(".xy"), "got:\n{fragment}");
}

#[test]
fn mod_polyfill_is_injected_once() {
    let mut g = Graph::new();
    let a = g.constant([3.5f32, 4.5]);
    let b = g.constant([2.0f32, 2.0]);
    let m = g.math(MathFunction::Mod, vec![a, b]);
    let root = g.convert(m, ShaderType::Vec4);

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, root)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    assert_eq!(
        fragment.matches("fn mod_vec2f(").count(),
        1,
        "polyfill should be compiled exactly once:\n{fragment}"
    );
    assert!(fragment.contains("mod_vec2f(vec2f(3.5, 4.5), vec2f(2.0, 2.0))"));
}

#[test]
fn glsl_emitter_spells_the_same_graph_differently() {
    let mut g = Graph::new();
    let y = g.float(1.0);
    let x = g.float(2.0);
    let angle = g.math(MathFunction::Atan2, vec![y, x]);
    let root = g.convert(angle, ShaderType::Vec4);

    let position = g.attribute("position", ShaderType::Vec3);
    let clip = g.convert(position, ShaderType::Vec4);

    let emitter = GlslEmitter;
    let mut builder = ShaderBuilder::new(&mut g, &emitter);
    builder.add_flow(ShaderStage::Vertex, clip);
    builder.add_flow(ShaderStage::Fragment, root);
    let artifact = builder.build().unwrap();

    let vertex = artifact.vertex.unwrap();
    let fragment = artifact.fragment.unwrap();
    assert!(vertex.contains("gl_Position ="));
    assert!(vertex.contains("layout(location = 0) in vec3 position;"));
    assert!(fragment.contains("fragColor ="));
    // GLSL spells atan2 as two-argument atan.
    assert!(fragment.contains("atan(1.0, 2.0)"), "got:\n{fragment}");
}

#[test]
fn missing_geometry_attribute_degrades_to_zero_constant() {
    let mut g = Graph::new();
    let uv = g.attribute("uv", ShaderType::Vec2);
    let root = g.convert(uv, ShaderType::Vec4);

    let emitter = WgslEmitter;
    let geometry = GeometryLayout::new().with_attribute("position", ShaderType::Vec3);
    let mut builder = ShaderBuilder::new(&mut g, &emitter).with_geometry(geometry);
    builder.add_flow(ShaderStage::Fragment, root);
    let artifact = builder.build().expect("missing attribute is not fatal");

    assert_valid_wgsl(&artifact);
    assert!(
        artifact
            .diagnostics
            .iter()
            .any(|d| d.message.contains("no attribute 'uv'")),
        "expected a warning diagnostic"
    );
    let vertex = artifact.vertex.unwrap();
    assert!(vertex.contains("vec2f(0.0, 0.0)"), "got:\n{vertex}");
    assert!(artifact.attributes.is_empty());
}

#[test]
fn remap_expands_into_arithmetic_during_setup() {
    let mut g = Graph::new();
    let t = g.uniform(Some("t"), 0.25f32, "frame");
    let in_low = g.float(0.0);
    let in_high = g.float(1.0);
    let out_low = g.float(-1.0);
    let out_high = g.float(1.0);
    let remapped = g.remap_clamp(t, in_low, in_high, out_low, out_high);

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, remapped)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    // The node rewrote itself into a clamped linear-map subgraph; there is
    // no "remap" left in the generated text.
    assert!(fragment.contains("clamp("), "got:\n{fragment}");
    assert!(fragment.contains("frame_uniforms.t"), "got:\n{fragment}");
}

#[test]
fn compute_stage_composes_statement_flow() {
    let mut g = Graph::new();
    let init = g.float(0.0);
    let acc = g.named_var(init, "acc");
    let two = g.float(2.0);
    let doubled = g.mul(acc, two);
    let step = g.assign(acc, doubled);
    let root = g.stack(vec![acc, step], None);

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Compute, root)]);
    assert_valid_wgsl(&artifact);
    let compute = artifact.compute.unwrap();
    assert!(compute.contains("fn cs_main"));
    assert!(compute.contains("acc = 0.0;"));
    assert!(compute.contains("acc = (acc * 2.0);"));
    assert!(artifact.vertex.is_none() && artifact.fragment.is_none());
}

#[test]
fn comparison_operators_produce_boolean_conditions() {
    let mut g = Graph::new();
    let time = g.uniform(Some("time"), 0.0f32, "frame");
    let half = g.float(0.5);
    let is_early = g.op(Operator::Less, time, half);
    let warm = g.color([1.0, 0.5, 0.0]);
    let cool = g.color([0.0, 0.5, 1.0]);
    let picked = g.cond(is_early, warm, cool);

    let artifact = compile_wgsl(&mut g, &[(ShaderStage::Fragment, picked)]);
    assert_valid_wgsl(&artifact);
    let fragment = artifact.fragment.unwrap();
    assert!(fragment.contains("if ((frame_uniforms.time < 0.5))"), "got:\n{fragment}");
    // The per-frame uniform surfaces in the update list.
    assert_eq!(artifact.updates.len(), 1);
}
