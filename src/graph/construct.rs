//! Author-facing node constructors.
//!
//! Material/effect authors build graphs through these helpers; the
//! compiler itself only requires a well-formed graph rooted at designated
//! output nodes, so everything here is convenience over [`Graph::add`].

use crate::constant::ConstValue;
use crate::function::{FunctionDef, FunctionId, FunctionParam};
use crate::graph::{
    Graph, MathFunction, NodeId, NodeKind, Operator, TextureDimension, TextureSampleVariant,
    TextureSource,
};
use crate::types::{ShaderType, UpdateFrequency};

impl Graph {
    // ---- leaf values ----

    pub fn constant(&mut self, value: impl Into<ConstValue>) -> NodeId {
        self.add(NodeKind::Const(value.into()))
    }

    pub fn float(&mut self, v: f32) -> NodeId {
        self.constant(v)
    }

    pub fn int(&mut self, v: i32) -> NodeId {
        self.constant(v)
    }

    pub fn uint(&mut self, v: u32) -> NodeId {
        self.constant(v)
    }

    pub fn color(&mut self, rgb: [f32; 3]) -> NodeId {
        self.add(NodeKind::Const(ConstValue::Color(rgb)))
    }

    /// Vector constant built from one scalar: the construct-from-one-
    /// argument path, which broadcasts the value to every component.
    pub fn splat(&mut self, v: f32, ty: ShaderType) -> NodeId {
        let value = match ty.vector_type() {
            ShaderType::Vec2 => ConstValue::Vec2([v; 2]),
            ShaderType::Vec3 => ConstValue::Vec3([v; 3]),
            ShaderType::Vec4 => ConstValue::Vec4([v; 4]),
            _ => ConstValue::Float(v),
        };
        self.add(NodeKind::Const(value))
    }

    /// An externally supplied constant in the given update group
    /// (`"frame"`, `"render"`, `"object"`, or a custom partition).
    pub fn uniform(
        &mut self,
        name: Option<&str>,
        value: impl Into<ConstValue>,
        group: &str,
    ) -> NodeId {
        let id = self.add(NodeKind::Uniform {
            name: name.map(str::to_string),
            value: value.into(),
            group: group.to_string(),
        });
        let frequency = match group {
            "frame" => UpdateFrequency::Frame,
            "render" => UpdateFrequency::Render,
            "object" => UpdateFrequency::Object,
            _ => UpdateFrequency::None,
        };
        self.set_update(id, frequency);
        id
    }

    pub fn attribute(&mut self, name: &str, ty: ShaderType) -> NodeId {
        self.add(NodeKind::Attribute {
            name: name.to_string(),
            ty,
        })
    }

    pub fn varying(&mut self, node: NodeId) -> NodeId {
        self.add(NodeKind::Varying { node, name: None })
    }

    // ---- operators ----

    pub fn op(&mut self, op: Operator, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add(NodeKind::Operator { op, lhs, rhs })
    }

    pub fn add_op(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.op(Operator::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.op(Operator::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.op(Operator::Mul, lhs, rhs)
    }

    pub fn div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.op(Operator::Div, lhs, rhs)
    }

    // ---- intrinsics ----

    pub fn math(&mut self, op: MathFunction, args: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Math { op, args })
    }

    pub fn sin(&mut self, a: NodeId) -> NodeId {
        self.math(MathFunction::Sin, vec![a])
    }

    pub fn cos(&mut self, a: NodeId) -> NodeId {
        self.math(MathFunction::Cos, vec![a])
    }

    pub fn normalize(&mut self, a: NodeId) -> NodeId {
        self.math(MathFunction::Normalize, vec![a])
    }

    pub fn dot(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.math(MathFunction::Dot, vec![a, b])
    }

    pub fn mix(&mut self, a: NodeId, b: NodeId, t: NodeId) -> NodeId {
        self.math(MathFunction::Mix, vec![a, b, t])
    }

    pub fn clamp(&mut self, x: NodeId, lo: NodeId, hi: NodeId) -> NodeId {
        self.math(MathFunction::Clamp, vec![x, lo, hi])
    }

    // ---- shape changes ----

    pub fn convert(&mut self, node: NodeId, to: ShaderType) -> NodeId {
        self.add(NodeKind::Convert { node, to })
    }

    pub fn join(&mut self, args: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Join { args })
    }

    pub fn split(&mut self, node: NodeId, swizzle: &str) -> NodeId {
        self.add(NodeKind::Split {
            node,
            swizzle: swizzle.to_string(),
        })
    }

    pub fn var(&mut self, node: NodeId) -> NodeId {
        self.add(NodeKind::Var { node, name: None })
    }

    pub fn named_var(&mut self, node: NodeId, name: &str) -> NodeId {
        self.add(NodeKind::Var {
            node,
            name: Some(name.to_string()),
        })
    }

    /// Statement node re-assigning a materialized temporary.
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.add(NodeKind::Assign { target, value })
    }

    // ---- textures ----

    pub fn texture(&mut self, name: &str, uv: NodeId) -> NodeId {
        self.add(NodeKind::Texture {
            source: TextureSource {
                name: name.to_string(),
                dimension: TextureDimension::D2,
            },
            uv,
            sample: TextureSampleVariant::Standard,
        })
    }

    pub fn texture_level(&mut self, name: &str, uv: NodeId, level: NodeId) -> NodeId {
        self.add(NodeKind::Texture {
            source: TextureSource {
                name: name.to_string(),
                dimension: TextureDimension::D2,
            },
            uv,
            sample: TextureSampleVariant::Level(level),
        })
    }

    pub fn texture_compare(&mut self, name: &str, uv: NodeId, reference: NodeId) -> NodeId {
        self.add(NodeKind::Texture {
            source: TextureSource {
                name: name.to_string(),
                dimension: TextureDimension::Depth,
            },
            uv,
            sample: TextureSampleVariant::Compare(reference),
        })
    }

    // ---- control flow ----

    pub fn cond(&mut self, cond: NodeId, then_branch: NodeId, else_branch: NodeId) -> NodeId {
        self.add(NodeKind::Conditional {
            cond,
            then_branch,
            else_branch: Some(else_branch),
        })
    }

    pub fn when(&mut self, cond: NodeId, then_branch: NodeId) -> NodeId {
        self.add(NodeKind::Conditional {
            cond,
            then_branch,
            else_branch: None,
        })
    }

    pub fn stack(&mut self, nodes: Vec<NodeId>, output: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Stack { nodes, output })
    }

    pub fn cache_scope(&mut self, node: NodeId, parent: bool) -> NodeId {
        self.add(NodeKind::CacheScope { node, parent })
    }

    pub fn loop_counter(&mut self, ty: ShaderType) -> NodeId {
        self.add(NodeKind::LoopCounter { ty })
    }

    /// Counting loop; build the counter first, reference it from the body.
    pub fn loop_between(
        &mut self,
        start: NodeId,
        end: NodeId,
        counter: NodeId,
        body: NodeId,
    ) -> NodeId {
        self.add(NodeKind::Loop {
            start,
            end,
            counter,
            body,
            ascending: None,
        })
    }

    // ---- remap ----

    pub fn remap(
        &mut self,
        value: NodeId,
        in_low: NodeId,
        in_high: NodeId,
        out_low: NodeId,
        out_high: NodeId,
    ) -> NodeId {
        self.add(NodeKind::Remap {
            value,
            in_low,
            in_high,
            out_low,
            out_high,
            clamp: false,
        })
    }

    pub fn remap_clamp(
        &mut self,
        value: NodeId,
        in_low: NodeId,
        in_high: NodeId,
        out_low: NodeId,
        out_high: NodeId,
    ) -> NodeId {
        self.add(NodeKind::Remap {
            value,
            in_low,
            in_high,
            out_low,
            out_high,
            clamp: true,
        })
    }

    // ---- functions ----

    /// Define a function: parameter nodes are created first and handed to
    /// the closure that builds the body subgraph.
    pub fn function(
        &mut self,
        name: &str,
        params: &[(&str, ShaderType)],
        return_type: ShaderType,
        body: impl FnOnce(&mut Graph, &[NodeId]) -> NodeId,
    ) -> FunctionId {
        self.function_with_pointers(name, params, &[], return_type, body)
    }

    /// Like [`Graph::function`], but parameters named in `pointers` are
    /// declared pass-by-reference.
    pub fn function_with_pointers(
        &mut self,
        name: &str,
        params: &[(&str, ShaderType)],
        pointers: &[&str],
        return_type: ShaderType,
        body: impl FnOnce(&mut Graph, &[NodeId]) -> NodeId,
    ) -> FunctionId {
        let param_nodes: Vec<NodeId> = params
            .iter()
            .map(|(pname, pty)| {
                self.add(NodeKind::Parameter {
                    name: (*pname).to_string(),
                    ty: *pty,
                })
            })
            .collect();

        let body_root = body(self, &param_nodes);

        let params = params
            .iter()
            .zip(&param_nodes)
            .map(|((pname, pty), &node)| FunctionParam {
                name: (*pname).to_string(),
                ty: *pty,
                pointer: pointers.contains(pname),
                node,
            })
            .collect();

        self.functions.add(FunctionDef {
            name: name.to_string(),
            params,
            return_type,
            body: body_root,
        })
    }

    pub fn call(&mut self, function: FunctionId, args: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::FunctionCall { function, args })
    }

    pub fn call_overloaded(&mut self, candidates: Vec<FunctionId>, args: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::OverloadedCall { candidates, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splat_repeats_components() {
        let mut g = Graph::new();
        let v = g.splat(0.5, ShaderType::Vec3);
        match &g.node(v).kind {
            NodeKind::Const(ConstValue::Vec3(c)) => assert_eq!(c, &[0.5, 0.5, 0.5]),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_uniform_group_sets_update_frequency() {
        let mut g = Graph::new();
        let u = g.uniform(Some("time"), 0.0f32, "frame");
        assert_eq!(g.node(u).update, UpdateFrequency::Frame);
    }

    #[test]
    fn test_function_builder_wires_parameters() {
        let mut g = Graph::new();
        let f = g.function(
            "luma",
            &[("color", ShaderType::Vec3)],
            ShaderType::Float,
            |g, params| {
                let weights = g.constant([0.2126f32, 0.7152, 0.0722]);
                g.dot(params[0], weights)
            },
        );
        let def = g.functions.def(f);
        assert_eq!(def.params.len(), 1);
        assert_eq!(def.params[0].name, "color");
        assert!(!def.params[0].pointer);
    }
}
