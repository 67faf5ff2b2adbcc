//! The node graph IR: an arena of typed expression nodes.
//!
//! Nodes live in a graph-owned arena and reference each other by index, so
//! the graph is a DAG with cheap structural sharing. Per-compile working
//! data never lives on the node itself; the builder keeps it in side tables
//! keyed by [`NodeId`] (see [`crate::cache`]).

pub mod construct;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::constant::ConstValue;
use crate::function::{FunctionId, FunctionRegistry};
use crate::types::{ShaderType, UpdateFrequency};

/// Index of a node in its graph's arena. Assigned monotonically at
/// construction and never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Binary operators, including comparisons and logical connectives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl Operator {
    pub fn token(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::LessEqual
                | Operator::Greater
                | Operator::GreaterEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }
}

/// Abstract intrinsic functions. The emitter maps each to the target
/// spelling, injecting a polyfill function when the target lacks a native
/// form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathFunction {
    Abs,
    Floor,
    Ceil,
    Fract,
    Sqrt,
    InverseSqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Negate,
    Normalize,
    Length,
    Dpdx,
    Dpdy,
    Atan2,
    Pow,
    Min,
    Max,
    Mod,
    Step,
    Distance,
    Dot,
    Cross,
    Reflect,
    Clamp,
    Mix,
    Smoothstep,
    Refract,
}

impl MathFunction {
    pub fn arity(self) -> usize {
        match self {
            MathFunction::Abs
            | MathFunction::Floor
            | MathFunction::Ceil
            | MathFunction::Fract
            | MathFunction::Sqrt
            | MathFunction::InverseSqrt
            | MathFunction::Exp
            | MathFunction::Log
            | MathFunction::Sin
            | MathFunction::Cos
            | MathFunction::Tan
            | MathFunction::Negate
            | MathFunction::Normalize
            | MathFunction::Length
            | MathFunction::Dpdx
            | MathFunction::Dpdy => 1,
            MathFunction::Atan2
            | MathFunction::Pow
            | MathFunction::Min
            | MathFunction::Max
            | MathFunction::Mod
            | MathFunction::Step
            | MathFunction::Distance
            | MathFunction::Dot
            | MathFunction::Cross
            | MathFunction::Reflect => 2,
            MathFunction::Clamp
            | MathFunction::Mix
            | MathFunction::Smoothstep
            | MathFunction::Refract => 3,
        }
    }

    /// Canonical abstract name, used for hashing and diagnostics.
    pub fn token(self) -> &'static str {
        match self {
            MathFunction::Abs => "abs",
            MathFunction::Floor => "floor",
            MathFunction::Ceil => "ceil",
            MathFunction::Fract => "fract",
            MathFunction::Sqrt => "sqrt",
            MathFunction::InverseSqrt => "inverseSqrt",
            MathFunction::Exp => "exp",
            MathFunction::Log => "log",
            MathFunction::Sin => "sin",
            MathFunction::Cos => "cos",
            MathFunction::Tan => "tan",
            MathFunction::Negate => "negate",
            MathFunction::Normalize => "normalize",
            MathFunction::Length => "length",
            MathFunction::Dpdx => "dpdx",
            MathFunction::Dpdy => "dpdy",
            MathFunction::Atan2 => "atan2",
            MathFunction::Pow => "pow",
            MathFunction::Min => "min",
            MathFunction::Max => "max",
            MathFunction::Mod => "mod",
            MathFunction::Step => "step",
            MathFunction::Distance => "distance",
            MathFunction::Dot => "dot",
            MathFunction::Cross => "cross",
            MathFunction::Reflect => "reflect",
            MathFunction::Clamp => "clamp",
            MathFunction::Mix => "mix",
            MathFunction::Smoothstep => "smoothstep",
            MathFunction::Refract => "refract",
        }
    }
}

/// Texture resource dimensionality, which selects the sampler kind and the
/// uv coordinate type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureDimension {
    D2,
    Cube,
    Depth,
}

impl TextureDimension {
    pub fn resource_type(self) -> ShaderType {
        match self {
            TextureDimension::D2 => ShaderType::Texture,
            TextureDimension::Cube => ShaderType::CubeTexture,
            TextureDimension::Depth => ShaderType::DepthTexture,
        }
    }

    pub fn uv_type(self) -> ShaderType {
        match self {
            TextureDimension::D2 | TextureDimension::Depth => ShaderType::Vec2,
            TextureDimension::Cube => ShaderType::Vec3,
        }
    }
}

/// A logical texture input, identified by name. The GPU resource layer
/// binds the actual texture; the compiler only allocates binding slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureSource {
    pub name: String,
    pub dimension: TextureDimension,
}

/// Texture sampling call form; each maps to a structurally different call
/// in the target language.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TextureSampleVariant {
    Standard,
    Level(NodeId),
    Bias(NodeId),
    Grad(NodeId, NodeId),
    Compare(NodeId),
}

/// Node payload. Child references are [`NodeId`]s into the owning graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    /// Literal value.
    Const(ConstValue),
    /// Externally supplied constant; `group` names the update partition the
    /// resource layer uses to decide refresh frequency and binding layout.
    Uniform {
        name: Option<String>,
        value: ConstValue,
        group: String,
    },
    /// Per-vertex geometry input.
    Attribute { name: String, ty: ShaderType },
    /// Value computed in the vertex stage and interpolated for the fragment
    /// stage.
    Varying { node: NodeId, name: Option<String> },
    /// Binary operation.
    Operator {
        op: Operator,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// Intrinsic call.
    Math { op: MathFunction, args: Vec<NodeId> },
    /// Type conversion through the single-argument constructor path.
    Convert { node: NodeId, to: ShaderType },
    /// Vector construction from components.
    Join { args: Vec<NodeId> },
    /// Component selection (`.xyz` style).
    Split { node: NodeId, swizzle: String },
    /// Force the wrapped expression into a named temporary.
    Var { node: NodeId, name: Option<String> },
    /// Re-assign a materialized target (a `Var` or a swizzle of one);
    /// statement-only, used inside stacks and loop bodies.
    Assign { target: NodeId, value: NodeId },
    /// Texture sample.
    Texture {
        source: TextureSource,
        uv: NodeId,
        sample: TextureSampleVariant,
    },
    /// If/else over two branch subgraphs.
    Conditional {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    /// Counting loop. `counter` must be a `LoopCounter` node referenced by
    /// the body; direction is inferred from constant bounds when
    /// `ascending` is not given explicitly.
    Loop {
        start: NodeId,
        end: NodeId,
        counter: NodeId,
        body: NodeId,
        ascending: Option<bool>,
    },
    /// Induction variable of the enclosing loop.
    LoopCounter { ty: ShaderType },
    /// Ordered statement list with an optional tail expression.
    Stack {
        nodes: Vec<NodeId>,
        output: Option<NodeId>,
    },
    /// Compiles the wrapped subgraph under its own cache scope; `parent`
    /// selects whether the scope inherits the currently active one.
    CacheScope { node: NodeId, parent: bool },
    /// Call to a known function.
    FunctionCall {
        function: FunctionId,
        args: Vec<NodeId>,
    },
    /// Call site with several candidate functions, disambiguated by
    /// argument types.
    OverloadedCall {
        candidates: Vec<FunctionId>,
        args: Vec<NodeId>,
    },
    /// Function parameter reference; only valid while the enclosing
    /// function body is being compiled.
    Parameter { name: String, ty: ShaderType },
    /// Linear signal remap, expanded in the setup stage into an arithmetic
    /// subgraph.
    Remap {
        value: NodeId,
        in_low: NodeId,
        in_high: NodeId,
        out_low: NodeId,
        out_high: NodeId,
        clamp: bool,
    },
}

impl NodeKind {
    /// Variant tag used in cache-key hashing; child ids are hashed through
    /// their own cache keys, never directly.
    fn hash_shallow(&self, state: &mut DefaultHasher) {
        std::mem::discriminant(self).hash(state);
        match self {
            NodeKind::Const(v) => v.hash_bits(state),
            NodeKind::Uniform { name, value, group } => {
                name.hash(state);
                value.hash_bits(state);
                group.hash(state);
            }
            NodeKind::Attribute { name, ty } => {
                name.hash(state);
                ty.hash(state);
            }
            NodeKind::Varying { name, .. } => name.hash(state),
            NodeKind::Operator { op, .. } => op.hash(state),
            NodeKind::Math { op, .. } => op.hash(state),
            NodeKind::Convert { to, .. } => to.hash(state),
            NodeKind::Join { .. } => {}
            NodeKind::Split { swizzle, .. } => swizzle.hash(state),
            NodeKind::Var { name, .. } => name.hash(state),
            NodeKind::Assign { .. } => {}
            NodeKind::Texture { source, sample, .. } => {
                source.hash(state);
                std::mem::discriminant(sample).hash(state);
            }
            NodeKind::Conditional { .. } => {}
            NodeKind::Loop { ascending, .. } => ascending.hash(state),
            NodeKind::LoopCounter { ty } => ty.hash(state),
            NodeKind::Stack { .. } => {}
            NodeKind::CacheScope { parent, .. } => parent.hash(state),
            NodeKind::FunctionCall { function, .. } => function.hash(state),
            NodeKind::OverloadedCall { candidates, .. } => candidates.hash(state),
            NodeKind::Parameter { name, ty } => {
                name.hash(state);
                ty.hash(state);
            }
            NodeKind::Remap { clamp, .. } => clamp.hash(state),
        }
    }
}

/// One IR node. Identity (`id`) is stable for the node's lifetime; the
/// `version` counter is the sole cache-invalidation signal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Declared result type; inferred from the kind when absent.
    pub node_type: Option<ShaderType>,
    pub version: u32,
    /// Global nodes resolve their working data in the outermost cache scope
    /// regardless of where they are referenced.
    pub global: bool,
    pub update: UpdateFrequency,
    #[serde(skip)]
    cache_key: Option<u64>,
    #[serde(skip)]
    cache_key_version: u32,
    /// Mix of the child keys the memoized key was computed from; a child
    /// recompute (even in an earlier call) invalidates this node too.
    #[serde(skip)]
    child_key_mix: u64,
}

/// The graph arena plus the function registry reachable from it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    pub functions: FunctionRegistry,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            kind,
            node_type: None,
            version: 0,
            global: false,
            update: UpdateFrequency::None,
            cache_key: None,
            cache_key_version: 0,
            child_key_mix: 0,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn set_global(&mut self, id: NodeId) {
        self.nodes[id.index()].global = true;
    }

    pub fn set_update(&mut self, id: NodeId, update: UpdateFrequency) {
        self.nodes[id.index()].update = update;
    }

    /// Bump the node's version; all memoized cache keys that include this
    /// node become stale and are recomputed lazily on the next request.
    pub fn bump_version(&mut self, id: NodeId) {
        self.nodes[id.index()].version += 1;
    }

    /// Named/indexed children in a stable enumeration order. The order is
    /// part of the cache-key contract.
    pub fn children(&self, id: NodeId) -> Vec<(Option<&'static str>, NodeId)> {
        match &self.node(id).kind {
            NodeKind::Const(_)
            | NodeKind::Uniform { .. }
            | NodeKind::Attribute { .. }
            | NodeKind::LoopCounter { .. }
            | NodeKind::Parameter { .. } => Vec::new(),
            NodeKind::Varying { node, .. }
            | NodeKind::Convert { node, .. }
            | NodeKind::Split { node, .. }
            | NodeKind::Var { node, .. }
            | NodeKind::CacheScope { node, .. } => vec![(Some("node"), *node)],
            NodeKind::Operator { lhs, rhs, .. } => {
                vec![(Some("lhs"), *lhs), (Some("rhs"), *rhs)]
            }
            NodeKind::Assign { target, value } => {
                vec![(Some("target"), *target), (Some("value"), *value)]
            }
            NodeKind::Math { args, .. } => args.iter().map(|&a| (None, a)).collect(),
            NodeKind::Join { args } => args.iter().map(|&a| (None, a)).collect(),
            NodeKind::Texture { uv, sample, .. } => {
                let mut out = vec![(Some("uv"), *uv)];
                match sample {
                    TextureSampleVariant::Standard => {}
                    TextureSampleVariant::Level(n) => out.push((Some("level"), *n)),
                    TextureSampleVariant::Bias(n) => out.push((Some("bias"), *n)),
                    TextureSampleVariant::Grad(dx, dy) => {
                        out.push((Some("ddx"), *dx));
                        out.push((Some("ddy"), *dy));
                    }
                    TextureSampleVariant::Compare(n) => out.push((Some("compare"), *n)),
                }
                out
            }
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut out = vec![(Some("cond"), *cond), (Some("then"), *then_branch)];
                if let Some(e) = else_branch {
                    out.push((Some("else"), *e));
                }
                out
            }
            NodeKind::Loop {
                start,
                end,
                counter,
                body,
                ..
            } => vec![
                (Some("start"), *start),
                (Some("end"), *end),
                (Some("counter"), *counter),
                (Some("body"), *body),
            ],
            NodeKind::Stack { nodes, output } => {
                let mut out: Vec<_> = nodes.iter().map(|&n| (None, n)).collect();
                if let Some(o) = output {
                    out.push((Some("output"), *o));
                }
                out
            }
            NodeKind::FunctionCall { args, .. } | NodeKind::OverloadedCall { args, .. } => {
                args.iter().map(|&a| (None, a)).collect()
            }
            NodeKind::Remap {
                value,
                in_low,
                in_high,
                out_low,
                out_high,
                ..
            } => vec![
                (Some("value"), *value),
                (Some("inLow"), *in_low),
                (Some("inHigh"), *in_high),
                (Some("outLow"), *out_low),
                (Some("outHigh"), *out_high),
            ],
        }
    }

    /// Structural identity for shared-node resolution. Two attribute nodes
    /// with the same name and type (or two uniforms with the same declared
    /// name and group) hash equal and collapse to one canonical instance;
    /// all other nodes are identified by their id.
    pub fn node_hash(&self, id: NodeId) -> u64 {
        let node = self.node(id);
        let mut state = DefaultHasher::new();
        match &node.kind {
            NodeKind::Attribute { name, ty } => {
                "attribute".hash(&mut state);
                name.hash(&mut state);
                ty.hash(&mut state);
            }
            NodeKind::Uniform {
                name: Some(name),
                group,
                ..
            } => {
                "uniform".hash(&mut state);
                name.hash(&mut state);
                group.hash(&mut state);
            }
            _ => {
                "node".hash(&mut state);
                node.id.hash(&mut state);
            }
        }
        state.finish()
    }

    /// Content hash over the node and its children, in child order.
    ///
    /// Memoized against the node's version: bumping any descendant's
    /// version transitively changes the key of every ancestor, while
    /// unrelated siblings keep their memoized keys. A cyclic graph is a
    /// fatal error.
    pub fn cache_key(&mut self, id: NodeId) -> Result<u64> {
        let mut visiting = vec![false; self.nodes.len()];
        self.cache_key_inner(id, &mut visiting)
    }

    fn cache_key_inner(&mut self, id: NodeId, visiting: &mut Vec<bool>) -> Result<u64> {
        if visiting[id.index()] {
            bail!("cyclic node graph: node {} is reachable from itself", id.0);
        }

        visiting[id.index()] = true;
        let children = self.children(id);
        let mut child_keys = Vec::with_capacity(children.len());
        for (_, child) in &children {
            child_keys.push(self.cache_key_inner(*child, visiting)?);
        }
        visiting[id.index()] = false;

        let mut mix_state = DefaultHasher::new();
        for key in &child_keys {
            key.hash(&mut mix_state);
        }
        let child_key_mix = mix_state.finish();

        let node = &self.nodes[id.index()];
        if let Some(key) = node.cache_key {
            if node.cache_key_version == node.version && node.child_key_mix == child_key_mix {
                return Ok(key);
            }
        }

        let mut state = DefaultHasher::new();
        node.kind.hash_shallow(&mut state);
        node.node_type.hash(&mut state);
        node.global.hash(&mut state);
        // The version is part of the content: a bump must change this key
        // (and, through the mix, every ancestor's key).
        node.version.hash(&mut state);
        child_key_mix.hash(&mut state);
        let key = state.finish();

        let node = &mut self.nodes[id.index()];
        node.cache_key = Some(key);
        node.cache_key_version = node.version;
        node.child_key_mix = child_key_mix;
        Ok(key)
    }

    /// Visit `id` and every node reachable from it, parents first.
    pub fn traverse(&self, id: NodeId, callback: &mut impl FnMut(NodeId)) {
        callback(id);
        for (_, child) in self.children(id) {
            self.traverse(child, callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut g = Graph::new();
        let a = g.add(NodeKind::Const(ConstValue::Float(1.0)));
        let b = g.add(NodeKind::Const(ConstValue::Float(2.0)));
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
    }

    #[test]
    fn test_cache_key_is_stable() {
        let mut g = Graph::new();
        let a = g.add(NodeKind::Const(ConstValue::Float(1.0)));
        let b = g.add(NodeKind::Const(ConstValue::Float(2.0)));
        let sum = g.add(NodeKind::Operator {
            op: Operator::Add,
            lhs: a,
            rhs: b,
        });
        let k1 = g.cache_key(sum).unwrap();
        let k2 = g.cache_key(sum).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_version_bump_invalidates_ancestors_only() {
        let mut g = Graph::new();
        let a = g.add(NodeKind::Const(ConstValue::Float(1.0)));
        let b = g.add(NodeKind::Const(ConstValue::Float(2.0)));
        let sum = g.add(NodeKind::Operator {
            op: Operator::Add,
            lhs: a,
            rhs: b,
        });
        let unrelated = g.add(NodeKind::Math {
            op: MathFunction::Sin,
            args: vec![b],
        });

        let sum_before = g.cache_key(sum).unwrap();
        let unrelated_before = g.cache_key(unrelated).unwrap();

        g.bump_version(a);

        assert_ne!(g.cache_key(sum).unwrap(), sum_before);
        assert_eq!(g.cache_key(unrelated).unwrap(), unrelated_before);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut g = Graph::new();
        let a = g.add(NodeKind::Const(ConstValue::Float(1.0)));
        let neg = g.add(NodeKind::Math {
            op: MathFunction::Negate,
            args: vec![a],
        });
        // Rewire the child to close a cycle.
        if let NodeKind::Math { args, .. } = &mut g.node_mut(neg).kind {
            args[0] = neg;
        }
        assert!(g.cache_key(neg).is_err());
    }

    #[test]
    fn test_attribute_nodes_share_identity() {
        let mut g = Graph::new();
        let a = g.add(NodeKind::Attribute {
            name: "uv".to_string(),
            ty: ShaderType::Vec2,
        });
        let b = g.add(NodeKind::Attribute {
            name: "uv".to_string(),
            ty: ShaderType::Vec2,
        });
        let c = g.add(NodeKind::Attribute {
            name: "normal".to_string(),
            ty: ShaderType::Vec3,
        });
        assert_eq!(g.node_hash(a), g.node_hash(b));
        assert_ne!(g.node_hash(a), g.node_hash(c));
    }
}
