//! The builder: drives the three-phase compilation (setup -> analyze ->
//! generate) over the stage root nodes and owns every per-compile
//! subsystem (cache scopes, allocator, flow buffers, function inclusion).
//!
//! A compile is one synchronous pass on one call stack; the builder borrows
//! the graph exclusively for its duration and nothing it allocates outlives
//! the returned artifact.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};

use crate::allocator::ResourceAllocator;
use crate::artifact::{CompiledShader, Diagnostic, Severity, UpdateRecord, content_key};
use crate::cache::{CacheScopeId, NodeDataCache, StageKey};
use crate::constant::ConstValue;
use crate::emitter::{Emitter, MethodResolution, StagePieces};
use crate::flow::{FlowCode, TabDepth, terminate_statement};
use crate::function::FunctionId;
use crate::graph::{
    Graph, MathFunction, NodeId, NodeKind, Operator, TextureSampleVariant, TextureSource,
};
use crate::types::{BuildStage, ShaderStage, ShaderType, UpdateFrequency, coercion_gap};

/// The vertex attributes actually present on the bound geometry. When
/// given, referencing an absent attribute degrades to a deterministic zero
/// constant with a warning instead of failing the compile.
#[derive(Clone, Debug, Default)]
pub struct GeometryLayout {
    attributes: HashMap<String, ShaderType>,
}

impl GeometryLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &str, ty: ShaderType) -> Self {
        self.attributes.insert(name.to_string(), ty);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// Mutable generation context; `node_block` is the flow block (conditional
/// or loop) statements are currently being emitted into.
#[derive(Clone, Copy, Debug, Default)]
struct BuildContext {
    node_block: Option<NodeId>,
}

fn sanitize_fn_ident(s: &str) -> String {
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

pub struct ShaderBuilder<'a> {
    graph: &'a mut Graph,
    emitter: &'a dyn Emitter,
    geometry: Option<GeometryLayout>,

    flow_roots: HashMap<ShaderStage, Vec<NodeId>>,
    build_stage: Option<BuildStage>,
    shader_stage: Option<ShaderStage>,

    cache: NodeDataCache,
    current_scope: CacheScopeId,

    flow: FlowCode,
    flows_data: HashMap<(ShaderStage, NodeId), FlowCode>,
    stage_prelude: HashMap<ShaderStage, String>,
    tab: TabDepth,
    context: BuildContext,

    alloc: ResourceAllocator,
    codes: HashMap<ShaderStage, Vec<crate::function::NodeCode>>,
    compiled_functions: HashMap<(ShaderStage, FunctionId), String>,
    functions_in_progress: HashSet<FunctionId>,
    injected_polyfills: HashSet<(ShaderStage, String)>,

    hash_nodes: HashMap<u64, NodeId>,
    nodes_seen: Vec<NodeId>,
    nodes_seen_set: HashSet<NodeId>,
    chain: Vec<NodeId>,
    loop_index: usize,

    diagnostics: Vec<Diagnostic>,
}

impl<'a> ShaderBuilder<'a> {
    pub fn new(graph: &'a mut Graph, emitter: &'a dyn Emitter) -> Self {
        let cache = NodeDataCache::new();
        let root_scope = cache.root();
        Self {
            graph,
            emitter,
            geometry: None,
            flow_roots: HashMap::new(),
            build_stage: None,
            shader_stage: None,
            cache,
            current_scope: root_scope,
            flow: FlowCode::new(),
            flows_data: HashMap::new(),
            stage_prelude: HashMap::new(),
            tab: TabDepth::new(),
            context: BuildContext::default(),
            alloc: ResourceAllocator::new(),
            codes: HashMap::new(),
            compiled_functions: HashMap::new(),
            functions_in_progress: HashSet::new(),
            injected_polyfills: HashSet::new(),
            hash_nodes: HashMap::new(),
            nodes_seen: Vec::new(),
            nodes_seen_set: HashSet::new(),
            chain: Vec::new(),
            loop_index: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: GeometryLayout) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Register a stage root. Roots build in registration order within
    /// their stage.
    pub fn add_flow(&mut self, stage: ShaderStage, root: NodeId) {
        self.flow_roots.entry(stage).or_default().push(root);
    }

    // ---- diagnostics ----

    fn warn(&mut self, message: String) {
        eprintln!("[shader-graph] warning: {message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    fn info(&mut self, message: String) {
        eprintln!("[shader-graph] {message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Info,
            message,
        });
    }

    // ---- node data access ----

    fn current_stage(&self) -> Result<ShaderStage> {
        self.shader_stage
            .ok_or_else(|| anyhow::anyhow!("no shader stage active"))
    }

    fn stage_key(&self) -> StageKey {
        match self.shader_stage {
            Some(stage) => StageKey::Stage(stage),
            None => StageKey::Any,
        }
    }

    fn scope_for(&self, node: NodeId) -> CacheScopeId {
        if self.graph.node(node).global {
            self.cache.root()
        } else {
            self.current_scope
        }
    }

    fn data(&self, node: NodeId) -> Option<&crate::cache::NodeData> {
        self.cache.get(self.scope_for(node), node, self.stage_key())
    }

    fn data_mut(&mut self, node: NodeId) -> &mut crate::cache::NodeData {
        let scope = self.scope_for(node);
        let stage = self.stage_key();
        self.cache.get_mut(scope, node, stage)
    }

    fn data_any(&self, node: NodeId) -> Option<&crate::cache::NodeData> {
        self.cache.get(self.scope_for(node), node, StageKey::Any)
    }

    fn data_any_mut(&mut self, node: NodeId) -> &mut crate::cache::NodeData {
        let scope = self.scope_for(node);
        self.cache.get_mut(scope, node, StageKey::Any)
    }

    fn output_node_of(&self, node: NodeId) -> Option<NodeId> {
        self.data_any(node).and_then(|d| d.output_node)
    }

    // ---- shared-node resolution ----

    /// Substitute the canonical instance for structurally identical nodes
    /// (equal attribute names, equal named uniforms) before any work.
    fn shared_node(&mut self, node: NodeId) -> NodeId {
        let hash = self.graph.node_hash(node);
        *self.hash_nodes.entry(hash).or_insert(node)
    }

    // ---- type inference ----

    /// The node's result type under this builder. Defers to the setup
    /// stage's output-node substitution, then the declared type, then
    /// per-kind inference.
    pub fn node_type(&mut self, node: NodeId) -> ShaderType {
        if let Some(out) = self.output_node_of(node) {
            return self.node_type(out);
        }
        if let Some(declared) = self.graph.node(node).node_type {
            return declared;
        }
        let kind = self.graph.node(node).kind.clone();
        match kind {
            NodeKind::Const(v) => v.shader_type(),
            NodeKind::Uniform { value, .. } => value.shader_type(),
            NodeKind::Attribute { ty, .. } => ty,
            NodeKind::Varying { node, .. } => self.node_type(node),
            NodeKind::Operator { op, lhs, rhs } => {
                let a = self.node_type(lhs);
                let b = self.node_type(rhs);
                operator_type(op, a, b)
            }
            NodeKind::Math { op, args } => {
                let arg_types: Vec<ShaderType> =
                    args.iter().map(|&a| self.node_type(a)).collect();
                math_type(op, &arg_types)
            }
            NodeKind::Convert { to, .. } => to,
            NodeKind::Join { args } => {
                let component = args
                    .first()
                    .map(|&a| self.node_type(a).component_type())
                    .unwrap_or(ShaderType::Float);
                let len: usize = args
                    .iter()
                    .map(|&a| self.node_type(a).vector_type().length())
                    .sum();
                ShaderType::from_length(len.min(4), component).unwrap_or(ShaderType::Vec4)
            }
            NodeKind::Split { node, swizzle } => {
                let component = self.node_type(node).component_type();
                ShaderType::from_length(swizzle.len(), component).unwrap_or(component)
            }
            NodeKind::Var { node, .. } => self.node_type(node),
            NodeKind::Assign { target, .. } => self.node_type(target),
            NodeKind::Texture { source, sample, .. } => {
                if matches!(sample, TextureSampleVariant::Compare(_))
                    || source.dimension == crate::graph::TextureDimension::Depth
                {
                    ShaderType::Float
                } else {
                    ShaderType::Vec4
                }
            }
            NodeKind::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                let then_ty = self.node_type(then_branch);
                match else_branch {
                    Some(e) => {
                        let else_ty = self.node_type(e);
                        if then_ty == ShaderType::Void || else_ty == ShaderType::Void {
                            ShaderType::Void
                        } else if else_ty.length() > then_ty.length() {
                            else_ty
                        } else {
                            then_ty
                        }
                    }
                    None => then_ty,
                }
            }
            NodeKind::Loop { .. } => ShaderType::Void,
            NodeKind::LoopCounter { ty } => ty,
            NodeKind::Stack { output, .. } => match output {
                Some(o) => self.node_type(o),
                None => ShaderType::Void,
            },
            NodeKind::CacheScope { node, .. } => self.node_type(node),
            NodeKind::FunctionCall { function, .. } => {
                self.graph.functions.def(function).return_type
            }
            NodeKind::OverloadedCall { candidates, args } => {
                let arg_types: Vec<ShaderType> =
                    args.iter().map(|&a| self.node_type(a)).collect();
                let selected = self
                    .graph
                    .functions
                    .select_overload(&candidates, &arg_types)
                    .or_else(|| candidates.first().copied());
                match selected {
                    Some(f) => self.graph.functions.def(f).return_type,
                    None => ShaderType::Void,
                }
            }
            NodeKind::Parameter { ty, .. } => ty,
            NodeKind::Remap { value, .. } => self.node_type(value),
        }
    }

    // ---- formatting ----

    /// Format a snippet toward the caller's expected type, recording the
    /// documented pass-through gaps as diagnostics.
    fn format_to(&mut self, snippet: &str, from: ShaderType, output: Option<ShaderType>) -> String {
        match output {
            None => snippet.to_string(),
            Some(to) => {
                if let Some(gap) = coercion_gap(from, to) {
                    self.info(gap);
                }
                self.emitter.format(snippet, from, to)
            }
        }
    }

    // ---- flow emission ----

    fn add_flow_code(&mut self, code: &str) {
        self.flow.code.push_str(code);
    }

    /// Append one statement at the current indentation. When `node` is
    /// given and a flow block is active, the statement is recorded against
    /// the node so sibling blocks that cannot see this emission re-emit it.
    fn add_line_flow_code(&mut self, code: &str, node: Option<NodeId>) {
        if code.is_empty() {
            return;
        }
        if let (Some(n), Some(block)) = (node, self.context.node_block) {
            let data = self.data_mut(n);
            data.flow_codes.push(code.to_string());
            data.flow_code_blocks.insert(block);
        }
        let line = format!("{}{}", self.tab.get(), terminate_statement(code));
        self.flow.code.push_str(&line);
    }

    /// A shared node is being re-referenced after materialization. If the
    /// current flow block is neither the block the statements were emitted
    /// into nor a descendant of one, the statements are not visible here
    /// (each branch of a conditional is a separate compiled block), so they
    /// are re-emitted into the current block.
    fn emit_flow_hierarchy(&mut self, node: NodeId) {
        let Some(current_block) = self.context.node_block else {
            return;
        };
        let (flow_codes, emitted_blocks) = match self.data(node) {
            Some(d) if !d.flow_codes.is_empty() => {
                (d.flow_codes.clone(), d.flow_code_blocks.clone())
            }
            _ => return,
        };

        let mut block = Some(current_block);
        while let Some(b) = block {
            if emitted_blocks.contains(&b) {
                return;
            }
            block = self.data(b).and_then(|d| d.parent_block);
        }

        for code in &flow_codes {
            let line = format!("{}{}", self.tab.get(), terminate_statement(code));
            self.flow.code.push_str(&line);
        }
        self.data_mut(node).flow_code_blocks.insert(current_block);
    }

    fn flow_child_node(&mut self, node: NodeId, output: Option<ShaderType>) -> Result<FlowCode> {
        let previous = std::mem::take(&mut self.flow);
        let result = self.build_node(node, output);
        let mut flow = std::mem::replace(&mut self.flow, previous);
        flow.result = Some(result?);
        Ok(flow)
    }

    fn flow_node(&mut self, root: NodeId) -> Result<()> {
        let stage = self.current_stage()?;
        let ty = self.node_type(root);
        let output = if ty == ShaderType::Void { None } else { Some(ty) };
        let flow = self.flow_child_node(root, output)?;
        self.flows_data.insert((stage, root), flow);
        Ok(())
    }

    /// Build `node` under another shader stage, appending its statements
    /// plus an assignment into that stage's prelude. This is the only way
    /// a value crosses the vertex/fragment boundary.
    fn flow_node_from_shader_stage(
        &mut self,
        stage: ShaderStage,
        node: NodeId,
        output: ShaderType,
        property: &str,
    ) -> Result<()> {
        let previous_stage = self.shader_stage;
        let previous_tab = self.tab.reset();
        // A cross-stage build is a fresh call stack; the fragment-side
        // ancestry must not trip cycle detection here.
        let previous_chain = std::mem::take(&mut self.chain);
        self.shader_stage = Some(stage);

        let flow = self.flow_child_node(node, Some(output))?;
        let mut code = flow.code;
        code.push_str(&format!(
            "\t{property} = {};\n",
            flow.result.unwrap_or_default()
        ));
        self.stage_prelude.entry(stage).or_default().push_str(&code);

        self.shader_stage = previous_stage;
        self.tab = previous_tab;
        self.chain = previous_chain;
        Ok(())
    }

    // ---- the build entry point ----

    /// Build one node for the active build stage. Setup and analyze return
    /// an empty string; generate returns the snippet formatted to `output`.
    pub fn build_node(&mut self, node: NodeId, output: Option<ShaderType>) -> Result<String> {
        let node = self.shared_node(node);

        if self.chain.contains(&node) {
            bail!(
                "cyclic node graph: node {} is already being built on this call chain",
                node.0
            );
        }
        if self.nodes_seen_set.insert(node) {
            self.nodes_seen.push(node);
        }

        self.chain.push(node);
        let result = self.build_node_inner(node, output);
        self.chain.pop();
        result
    }

    fn build_node_inner(&mut self, node: NodeId, output: Option<ShaderType>) -> Result<String> {
        // Cache scoping is transparent to all three stages: swap the active
        // scope, build the wrapped subgraph, restore.
        if let NodeKind::CacheScope { node: child, parent } = self.graph.node(node).kind.clone() {
            let scope = match self.data_any(node).and_then(|d| d.cache_scope) {
                Some(s) => s,
                None => {
                    let parent_scope = parent.then_some(self.current_scope);
                    let s = self.cache.push_scope(parent_scope);
                    self.data_any_mut(node).cache_scope = Some(s);
                    s
                }
            };
            let previous = self.current_scope;
            self.current_scope = scope;
            let result = self.build_node(child, output);
            self.current_scope = previous;
            return result;
        }

        match self.build_stage {
            Some(BuildStage::Setup) => {
                self.setup_stage(node)?;
                Ok(String::new())
            }
            Some(BuildStage::Analyze) => {
                self.analyze_stage(node)?;
                Ok(String::new())
            }
            Some(BuildStage::Generate) => self.generate_stage(node, output),
            None => bail!("build() was not started; no build stage active"),
        }
    }

    // ---- setup stage ----

    fn setup_stage(&mut self, node: NodeId) -> Result<()> {
        let initialized = self.data_any(node).map(|d| d.initialized).unwrap_or(false);
        if initialized {
            return Ok(());
        }
        self.data_any_mut(node).initialized = true;

        let output = self.setup_node(node)?;

        for (_, child) in self.graph.children(node) {
            self.build_node(child, None)?;
        }
        if let Some(out) = output {
            self.build_node(out, None)?;
            self.data_any_mut(node).output_node = Some(out);
        }
        Ok(())
    }

    /// Per-kind lazy macro-expansion: a node may rewrite itself into a
    /// different output node, created on first visit and memoized so the
    /// later stages see the expansion instead of the original.
    fn setup_node(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        let kind = self.graph.node(node).kind.clone();
        match kind {
            NodeKind::Remap {
                value,
                in_low,
                in_high,
                out_low,
                out_high,
                clamp,
            } => {
                let g = &mut *self.graph;
                let num = g.add(NodeKind::Operator {
                    op: Operator::Sub,
                    lhs: value,
                    rhs: in_low,
                });
                let den = g.add(NodeKind::Operator {
                    op: Operator::Sub,
                    lhs: in_high,
                    rhs: in_low,
                });
                let mut t = g.add(NodeKind::Operator {
                    op: Operator::Div,
                    lhs: num,
                    rhs: den,
                });
                if clamp {
                    let zero = g.add(NodeKind::Const(ConstValue::Float(0.0)));
                    let one = g.add(NodeKind::Const(ConstValue::Float(1.0)));
                    t = g.add(NodeKind::Math {
                        op: MathFunction::Clamp,
                        args: vec![t, zero, one],
                    });
                }
                let span = g.add(NodeKind::Operator {
                    op: Operator::Sub,
                    lhs: out_high,
                    rhs: out_low,
                });
                let scaled = g.add(NodeKind::Operator {
                    op: Operator::Mul,
                    lhs: t,
                    rhs: span,
                });
                let out = g.add(NodeKind::Operator {
                    op: Operator::Add,
                    lhs: out_low,
                    rhs: scaled,
                });
                Ok(Some(out))
            }
            _ => Ok(None),
        }
    }

    // ---- analyze stage ----

    fn analyze_stage(&mut self, node: NodeId) -> Result<()> {
        let usage = {
            let data = self.data_mut(node);
            data.usage_count += 1;
            data.usage_count
        };

        if usage == 1 {
            for (_, child) in self.graph.children(node) {
                self.build_node(child, None)?;
            }
            if let Some(out) = self.output_node_of(node) {
                self.build_node(out, None)?;
            }
        }
        Ok(())
    }

    fn usage_count(&self, node: NodeId) -> u32 {
        self.data(node).map(|d| d.usage_count).unwrap_or(0)
    }

    // ---- generate stage ----

    fn generate_stage(&mut self, node: NodeId, output: Option<ShaderType>) -> Result<String> {
        // A node the setup stage rewrote defers to its expansion, but the
        // usage-count/temporary bookkeeping stays on the rewritten node so
        // a shared expansion still materializes only once.
        if self.output_node_of(node).is_some() {
            return self.generate_expression(node, output);
        }

        let kind = self.graph.node(node).kind.clone();
        match kind {
            NodeKind::Const(value) => {
                let ty = value.shader_type();
                let snippet = self.emitter.generate_const(&value);
                Ok(self.format_to(&snippet, ty, output))
            }
            NodeKind::Uniform { name, value, group } => {
                self.generate_uniform(node, name, &value, &group, output)
            }
            NodeKind::Attribute { name, ty } => self.generate_attribute(node, &name, ty, output),
            NodeKind::Varying { node: child, name } => {
                self.generate_varying(node, child, name, output)
            }
            NodeKind::Parameter { name, ty } => {
                let property = self.data(node).and_then(|d| d.property_name.clone());
                match property {
                    Some(p) => Ok(self.format_to(&p, ty, output)),
                    None => bail!(
                        "unresolved function parameter '{name}' referenced outside a function body"
                    ),
                }
            }
            NodeKind::LoopCounter { ty } => {
                let property = self.data(node).and_then(|d| d.property_name.clone());
                match property {
                    Some(p) => Ok(self.format_to(&p, ty, output)),
                    None => bail!("loop counter referenced outside an enclosing loop"),
                }
            }
            NodeKind::Stack {
                nodes,
                output: stack_output,
            } => {
                for child in nodes {
                    let snippet = self.build_node(child, Some(ShaderType::Void))?;
                    // Void snippets that survive to here are call statements
                    // (e.g. a pointer-parameter function call); anything
                    // value-typed already emitted its own statements.
                    if !snippet.is_empty() && self.node_type(child) == ShaderType::Void {
                        self.add_line_flow_code(&snippet, None);
                    }
                }
                match stack_output {
                    Some(out) => self.build_node(out, output),
                    None => Ok(String::new()),
                }
            }
            NodeKind::Var { node: child, name } => self.generate_var(node, child, name, output),
            NodeKind::Assign { target, value } => self.generate_assign(node, target, value, output),
            NodeKind::Conditional {
                cond,
                then_branch,
                else_branch,
            } => self.generate_conditional(node, cond, then_branch, else_branch, output),
            NodeKind::Loop {
                start,
                end,
                counter,
                body,
                ascending,
            } => self.generate_loop(start, end, counter, body, ascending),
            NodeKind::CacheScope { .. } => unreachable!("handled in build_node_inner"),
            _ => self.generate_expression(node, output),
        }
    }

    /// Shared-expression materialization: a node used by more than one call
    /// site is computed once into an allocated temporary on first visit and
    /// resolves to the variable name afterwards; a node used exactly once
    /// stays inline.
    fn generate_expression(&mut self, node: NodeId, output: Option<ShaderType>) -> Result<String> {
        let ty = self.node_type(node).vector_type();

        if let Some(property) = self.data(node).and_then(|d| d.property_name.clone()) {
            self.emit_flow_hierarchy(node);
            return Ok(self.format_to(&property, ty, output));
        }

        let needs_var = self.usage_count(node) > 1
            && ty.length() > 0
            && output != Some(ShaderType::Void);

        let raw = self.generate_raw(node)?;

        if needs_var {
            let stage = self.current_stage()?;
            let var_index = self.alloc.add_var(stage, None, ty);
            let property = self.alloc.var(stage, var_index).name.clone();
            self.add_line_flow_code(&format!("{property} = {raw}"), Some(node));
            let data = self.data_mut(node);
            data.variable = Some(var_index);
            data.snippet = Some(raw);
            data.property_name = Some(property.clone());
            Ok(self.format_to(&property, ty, output))
        } else {
            self.data_mut(node).snippet = Some(raw.clone());
            Ok(self.format_to(&raw, ty, output))
        }
    }

    /// The expression snippet at the node's own type, before any
    /// caller-side formatting.
    fn generate_raw(&mut self, node: NodeId) -> Result<String> {
        if let Some(out) = self.output_node_of(node) {
            let ty = self.node_type(node).vector_type();
            return self.build_node(out, Some(ty));
        }

        let kind = self.graph.node(node).kind.clone();
        match kind {
            NodeKind::Operator { op, lhs, rhs } => self.generate_operator(op, lhs, rhs),
            NodeKind::Math { op, args } => self.generate_math(op, &args),
            NodeKind::Convert { node: child, to } => {
                let child_ty = self.node_type(child);
                let snippet = self.build_node(child, Some(child_ty))?;
                Ok(self.format_to(&snippet, child_ty, Some(to)))
            }
            NodeKind::Join { args } => {
                let mut parts = Vec::with_capacity(args.len());
                for &arg in &args {
                    let arg_ty = self.node_type(arg).vector_type();
                    parts.push(self.build_node(arg, Some(arg_ty))?);
                }
                let ty = self.node_type(node).vector_type();
                Ok(format!(
                    "{}({})",
                    self.emitter.get_type(ty),
                    parts.join(", ")
                ))
            }
            NodeKind::Split { node: child, swizzle } => {
                let child_ty = self.node_type(child).vector_type();
                let snippet = self.build_node(child, Some(child_ty))?;
                Ok(format!("{snippet}.{swizzle}"))
            }
            NodeKind::Texture { source, uv, sample } => {
                self.generate_texture(&source, uv, &sample)
            }
            NodeKind::FunctionCall { function, args } => {
                self.generate_function_call(function, &args)
            }
            NodeKind::OverloadedCall { candidates, args } => {
                let function = self.resolve_overload(node, &candidates, &args)?;
                self.generate_function_call(function, &args)
            }
            // A structural kind that reached expression generation without
            // its concrete handling is a programming error in the variant,
            // not in the author's graph; fail loudly rather than emitting
            // nothing.
            other => bail!(
                "node {} ({}) does not provide a generate implementation",
                node.0,
                kind_name(&other)
            ),
        }
    }

    fn generate_operator(&mut self, op: Operator, lhs: NodeId, rhs: NodeId) -> Result<String> {
        let lhs_ty = self.node_type(lhs).vector_type();
        let rhs_ty = self.node_type(rhs).vector_type();

        let (lhs_out, rhs_out) = if op.is_logical() {
            (ShaderType::Bool, ShaderType::Bool)
        } else if lhs_ty.is_matrix() || rhs_ty.is_matrix() {
            if op == Operator::Mul && lhs_ty.is_matrix() && rhs_ty.is_vector() {
                (lhs_ty, lhs_ty.vector_from_matrix())
            } else if op == Operator::Mul && rhs_ty.is_matrix() && lhs_ty.is_vector() {
                (rhs_ty.vector_from_matrix(), rhs_ty)
            } else {
                // matrix * matrix, matrix * scalar: operand types stand.
                (lhs_ty, rhs_ty)
            }
        } else {
            // Component-wise ops need equally shaped operands in WGSL, so
            // scalars are broadcast through the common type.
            let common = lhs_ty.promote(rhs_ty);
            (common, common)
        };

        let a = self.build_node(lhs, Some(lhs_out))?;
        let b = self.build_node(rhs, Some(rhs_out))?;
        Ok(format!("({a} {} {b})", op.token()))
    }

    fn generate_math(&mut self, op: MathFunction, args: &[NodeId]) -> Result<String> {
        if args.len() != op.arity() {
            bail!(
                "math function '{}' expects {} arguments, got {}",
                op.token(),
                op.arity(),
                args.len()
            );
        }

        if op == MathFunction::Negate {
            let ty = self.node_type(args[0]);
            let snippet = self.build_node(args[0], Some(ty))?;
            return Ok(format!("(-{snippet})"));
        }

        let mut input_ty = self
            .node_type(args[0])
            .vector_type();
        for &arg in &args[1..] {
            input_ty = input_ty.promote(self.node_type(arg));
        }
        if op == MathFunction::Cross {
            input_ty = ShaderType::Vec3;
        }

        let mut parts = Vec::with_capacity(args.len());
        for (i, &arg) in args.iter().enumerate() {
            // Refraction ratio stays scalar.
            let expected = if op == MathFunction::Refract && i == 2 {
                ShaderType::Float
            } else {
                input_ty
            };
            parts.push(self.build_node(arg, Some(expected))?);
        }

        let method = self.resolve_method(op, input_ty)?;
        Ok(format!("{method}({})", parts.join(", ")))
    }

    fn resolve_method(&mut self, op: MathFunction, ty: ShaderType) -> Result<String> {
        match self.emitter.get_method(op, ty) {
            MethodResolution::Native(name) => Ok(name.to_string()),
            MethodResolution::Polyfill { name, source } => {
                let stage = self.current_stage()?;
                if self.injected_polyfills.insert((stage, name.clone())) {
                    self.codes
                        .entry(stage)
                        .or_default()
                        .push(crate::function::NodeCode {
                            name: name.clone(),
                            code: source,
                        });
                }
                Ok(name)
            }
        }
    }

    fn generate_uniform(
        &mut self,
        node: NodeId,
        name: Option<String>,
        value: &ConstValue,
        group: &str,
        output: Option<ShaderType>,
    ) -> Result<String> {
        let stage = self.current_stage()?;
        let ty = value.shader_type();

        // Uniform allocations always live in the root scope so a uniform
        // referenced from a branch or function body still deduplicates
        // against the outer compile.
        let root = self.cache.root();
        let existing = self
            .cache
            .get(root, node, StageKey::Stage(stage))
            .and_then(|d| d.uniform);
        let index = match existing {
            Some(i) => i,
            None => {
                let update = self.graph.node(node).update;
                let i = self
                    .alloc
                    .add_uniform(stage, node, name, ty, group, update);
                self.cache
                    .get_mut(root, node, StageKey::Stage(stage))
                    .uniform = Some(i);
                i
            }
        };

        let property = self.emitter.uniform_property_name(&self.alloc.uniforms[index]);
        Ok(self.format_to(&property, ty, output))
    }

    fn generate_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        ty: ShaderType,
        output: Option<ShaderType>,
    ) -> Result<String> {
        let stage = self.current_stage()?;

        match stage {
            ShaderStage::Vertex => {
                if let Some(geometry) = &self.geometry {
                    if !geometry.has(name) {
                        self.warn(format!(
                            "geometry has no attribute '{name}'; substituting a zero {}",
                            ty.token()
                        ));
                        let snippet = self.emitter.generate_const(&ConstValue::zero(ty));
                        return Ok(self.format_to(&snippet, ty, output));
                    }
                }
                let index = self.alloc.add_attribute(name, ty);
                let property = self
                    .emitter
                    .attribute_property_name(&self.alloc.attributes[index]);
                Ok(self.format_to(&property, ty, output))
            }
            ShaderStage::Fragment => {
                // Geometry inputs only exist in the vertex stage; reading
                // one from the fragment stage routes through a varying.
                let companion = match self.data_any(node).and_then(|d| d.varying_companion) {
                    Some(v) => v,
                    None => {
                        let v = self.graph.add(NodeKind::Varying {
                            node,
                            name: None,
                        });
                        self.data_any_mut(node).varying_companion = Some(v);
                        v
                    }
                };
                self.build_node(companion, output.or(Some(ty)))
            }
            ShaderStage::Compute => {
                self.warn(format!(
                    "attribute '{name}' referenced from the compute stage; substituting a zero {}",
                    ty.token()
                ));
                let snippet = self.emitter.generate_const(&ConstValue::zero(ty));
                Ok(self.format_to(&snippet, ty, output))
            }
        }
    }

    fn generate_varying(
        &mut self,
        node: NodeId,
        child: NodeId,
        name: Option<String>,
        output: Option<ShaderType>,
    ) -> Result<String> {
        let stage = self.current_stage()?;
        let ty = self.node_type(child).vector_type();

        let index = match self.data_any(node).and_then(|d| d.varying) {
            Some(i) => i,
            None => {
                let i = self.alloc.add_varying(node, name, ty);
                self.data_any_mut(node).varying = Some(i);

                // Emit the vertex-side computation and assignment exactly
                // once, no matter which stage asked first.
                let property = self
                    .emitter
                    .varying_property_name(&self.alloc.varyings[i], ShaderStage::Vertex);
                self.flow_node_from_shader_stage(ShaderStage::Vertex, child, ty, &property)?;
                i
            }
        };

        let property = self
            .emitter
            .varying_property_name(&self.alloc.varyings[index], stage);
        Ok(self.format_to(&property, ty, output))
    }

    fn generate_var(
        &mut self,
        node: NodeId,
        child: NodeId,
        name: Option<String>,
        output: Option<ShaderType>,
    ) -> Result<String> {
        let ty = self.node_type(child).vector_type();

        if let Some(property) = self.data(node).and_then(|d| d.property_name.clone()) {
            self.emit_flow_hierarchy(node);
            return Ok(self.format_to(&property, ty, output));
        }

        let snippet = self.build_node(child, Some(ty))?;
        let stage = self.current_stage()?;
        let var_index = self.alloc.add_var(stage, name, ty);
        let property = self.alloc.var(stage, var_index).name.clone();
        self.add_line_flow_code(&format!("{property} = {snippet}"), Some(node));
        let data = self.data_mut(node);
        data.variable = Some(var_index);
        data.property_name = Some(property.clone());
        Ok(self.format_to(&property, ty, output))
    }

    fn generate_assign(
        &mut self,
        node: NodeId,
        target: NodeId,
        value: NodeId,
        output: Option<ShaderType>,
    ) -> Result<String> {
        let target_ty = self.node_type(target).vector_type();

        if let Some(property) = self.data(node).and_then(|d| d.property_name.clone()) {
            self.emit_flow_hierarchy(node);
            return Ok(self.format_to(&property, target_ty, output));
        }

        let target_snippet = self.build_node(target, None)?;
        let value_snippet = self.build_node(value, Some(target_ty))?;
        self.add_line_flow_code(
            &format!("{target_snippet} = {value_snippet}"),
            Some(node),
        );
        self.data_mut(node).property_name = Some(target_snippet.clone());
        Ok(self.format_to(&target_snippet, target_ty, output))
    }

    fn generate_texture(
        &mut self,
        source: &TextureSource,
        uv: NodeId,
        sample: &TextureSampleVariant,
    ) -> Result<String> {
        let stage = self.current_stage()?;
        let index = self
            .alloc
            .add_texture(stage, &source.name, source.dimension, "material");

        let uv_ty = source.dimension.uv_type();
        let uv_snippet = self.build_node(uv, Some(uv_ty))?;
        let tex = self.alloc.textures[index].clone();

        Ok(match sample {
            TextureSampleVariant::Standard => self.emitter.generate_texture(&tex, &uv_snippet),
            TextureSampleVariant::Level(level) => {
                let level_snippet = self.build_node(*level, Some(ShaderType::Float))?;
                self.emitter
                    .generate_texture_level(&tex, &uv_snippet, &level_snippet)
            }
            TextureSampleVariant::Bias(bias) => {
                let bias_snippet = self.build_node(*bias, Some(ShaderType::Float))?;
                self.emitter
                    .generate_texture_bias(&tex, &uv_snippet, &bias_snippet)
            }
            TextureSampleVariant::Grad(ddx, ddy) => {
                let ddx_snippet = self.build_node(*ddx, Some(uv_ty))?;
                let ddy_snippet = self.build_node(*ddy, Some(uv_ty))?;
                self.emitter
                    .generate_texture_grad(&tex, &uv_snippet, &ddx_snippet, &ddy_snippet)
            }
            TextureSampleVariant::Compare(reference) => {
                let ref_snippet = self.build_node(*reference, Some(ShaderType::Float))?;
                self.emitter
                    .generate_texture_compare(&tex, &uv_snippet, &ref_snippet)
            }
        })
    }

    fn generate_conditional(
        &mut self,
        node: NodeId,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
        output: Option<ShaderType>,
    ) -> Result<String> {
        let ty = self.node_type(node);

        if let Some(property) = self.data(node).and_then(|d| d.property_name.clone()) {
            self.emit_flow_hierarchy(node);
            return Ok(self.format_to(&property, ty.vector_type(), output));
        }

        // When the conditional's value is observed, a result variable is
        // allocated ahead of the block and each branch assigns its tail
        // expression into it.
        let needs_property = ty != ShaderType::Void;
        let property = if needs_property {
            let stage = self.current_stage()?;
            let var_index = self.alloc.add_var(stage, None, ty.vector_type());
            let name = self.alloc.var(stage, var_index).name.clone();
            let data = self.data_mut(node);
            data.variable = Some(var_index);
            data.property_name = Some(name.clone());
            Some(name)
        } else {
            None
        };

        let cond_snippet = self.build_node(cond, Some(ShaderType::Bool))?;
        let tab = self.tab.get().to_string();
        self.add_flow_code(&format!("\n{tab}if ({cond_snippet}) {{\n"));

        // Each branch is its own flow block: a value materialized in one
        // branch is not visible from the sibling.
        let previous_block = self.context.node_block;

        let branch_output = if needs_property {
            Some(ty.vector_type())
        } else {
            Some(ShaderType::Void)
        };

        self.data_mut(then_branch).parent_block = previous_block;
        self.context.node_block = Some(then_branch);
        self.tab.push();
        let then_snippet = self.build_node(then_branch, branch_output)?;
        if let (Some(p), false) = (&property, then_snippet.is_empty()) {
            let inner_tab = self.tab.get().to_string();
            self.add_flow_code(&format!("{inner_tab}{p} = {then_snippet};\n"));
        }
        self.tab.pop();
        self.context.node_block = previous_block;

        if let Some(else_branch) = else_branch {
            self.add_flow_code(&format!("{tab}}} else {{\n"));
            self.data_mut(else_branch).parent_block = previous_block;
            self.context.node_block = Some(else_branch);
            self.tab.push();
            let else_snippet = self.build_node(else_branch, branch_output)?;
            if let (Some(p), false) = (&property, else_snippet.is_empty()) {
                let inner_tab = self.tab.get().to_string();
                self.add_flow_code(&format!("{inner_tab}{p} = {else_snippet};\n"));
            }
            self.tab.pop();
            self.context.node_block = previous_block;
        }
        self.add_flow_code(&format!("{tab}}}\n"));

        match property {
            Some(p) => Ok(self.format_to(&p, ty.vector_type(), output)),
            None => Ok(String::new()),
        }
    }

    fn generate_loop(
        &mut self,
        start: NodeId,
        end: NodeId,
        counter: NodeId,
        body: NodeId,
        ascending: Option<bool>,
    ) -> Result<String> {
        let counter_ty = self.node_type(counter);
        let name = format!("i{}", self.loop_index);
        self.loop_index += 1;
        self.data_mut(counter).property_name = Some(name.clone());

        let start_snippet = self.build_node(start, Some(counter_ty))?;
        let end_snippet = self.build_node(end, Some(counter_ty))?;

        // Direction: explicit wins; otherwise compare constant bounds,
        // defaulting to ascending.
        let ascending = ascending.unwrap_or_else(|| {
            match (self.const_scalar(start), self.const_scalar(end)) {
                (Some(s), Some(e)) => s <= e,
                _ => true,
            }
        });

        let one = match counter_ty.component_type() {
            ShaderType::Float => "1.0",
            ShaderType::Uint => "1u",
            _ => "1",
        };
        let (cmp, update_op) = if ascending { ("<", "+=") } else { (">=", "-=") };

        let decl = self.emitter.get_var(counter_ty, &name);
        let tab = self.tab.get().to_string();
        self.add_flow_code(&format!(
            "\n{tab}for ({decl} = {start_snippet}; {name} {cmp} {end_snippet}; {name} {update_op} {one}) {{\n"
        ));

        let previous_block = self.context.node_block;
        self.data_mut(body).parent_block = previous_block;
        self.context.node_block = Some(body);

        self.tab.push();
        self.build_node(body, Some(ShaderType::Void))?;
        self.tab.pop();

        self.context.node_block = previous_block;
        self.add_flow_code(&format!("{tab}}}\n"));

        Ok(String::new())
    }

    fn const_scalar(&self, node: NodeId) -> Option<f32> {
        match &self.graph.node(node).kind {
            NodeKind::Const(v) => v.components().first().copied(),
            _ => None,
        }
    }

    // ---- functions ----

    fn resolve_overload(
        &mut self,
        node: NodeId,
        candidates: &[FunctionId],
        args: &[NodeId],
    ) -> Result<FunctionId> {
        if let Some(resolved) = self.data(node).and_then(|d| d.resolved_overload) {
            return Ok(resolved);
        }
        let arg_types: Vec<ShaderType> = args.iter().map(|&a| self.node_type(a)).collect();
        let selected = self.graph.functions.select_overload(candidates, &arg_types);
        match selected {
            Some(f) => {
                self.data_mut(node).resolved_overload = Some(f);
                Ok(f)
            }
            None => {
                let names: Vec<&str> = candidates
                    .iter()
                    .map(|&c| self.graph.functions.def(c).name.as_str())
                    .collect();
                let types: Vec<&str> = arg_types.iter().map(|t| t.token()).collect();
                bail!(
                    "no overload of '{}' accepts argument types ({})",
                    names.first().copied().unwrap_or("<unnamed>"),
                    types.join(", ")
                )
            }
        }
    }

    fn generate_function_call(&mut self, function: FunctionId, args: &[NodeId]) -> Result<String> {
        let def = self.graph.functions.def(function).clone();

        if args.len() < def.params.len() {
            let missing = &def.params[args.len()].name;
            bail!(
                "call to '{}' is missing an argument for parameter '{missing}'",
                def.name
            );
        }
        if args.len() > def.params.len() {
            bail!(
                "call to '{}' passes {} arguments for {} parameters",
                def.name,
                args.len(),
                def.params.len()
            );
        }

        let fn_name = self.include_function(function)?;

        let mut parts = Vec::with_capacity(args.len());
        for (param, &arg) in def.params.iter().zip(args) {
            if param.pointer {
                let snippet = self.build_node(arg, None)?;
                parts.push(self.emitter.reference_expr(&snippet));
            } else {
                let snippet = self.build_node(arg, Some(param.ty))?;
                parts.push(snippet);
            }
        }
        Ok(format!("{fn_name}({})", parts.join(", ")))
    }

    /// Compile a function body once per (stage, function) into a standalone
    /// named target function with its own cache scope, local variables, and
    /// flow buffer; call sites reduce to a plain call expression.
    fn include_function(&mut self, function: FunctionId) -> Result<String> {
        let stage = self.current_stage()?;
        if let Some(name) = self.compiled_functions.get(&(stage, function)) {
            return Ok(name.clone());
        }
        if !self.functions_in_progress.insert(function) {
            bail!(
                "recursive shader function '{}'",
                self.graph.functions.def(function).name
            );
        }

        let def = self.graph.functions.def(function).clone();
        let fn_name = format!("{}_{}", sanitize_fn_ident(&def.name), function.0);

        // Isolate: fresh flow buffer, fresh tab depth, fresh locals, an
        // unparented cache scope, and no enclosing flow block.
        let saved_flow = std::mem::take(&mut self.flow);
        let saved_tab = self.tab.reset();
        let saved_scope = self.current_scope;
        let saved_vars = self.alloc.restore_vars(stage, Vec::new());
        let saved_build_stage = self.build_stage;
        let saved_context = self.context;
        self.current_scope = self.cache.push_scope(None);
        self.context = BuildContext::default();

        // Bind declared parameters to their target names.
        for param in &def.params {
            let property = self.emitter.parameter_property_name(param);
            let scope = self.current_scope;
            self.cache
                .get_mut(scope, param.node, StageKey::Stage(stage))
                .property_name = Some(property);
        }

        // The body subgraph was never visited by the outer passes, so all
        // three build stages run here, within the isolated environment.
        let mut result = String::new();
        for build_stage in BuildStage::ALL {
            self.build_stage = Some(build_stage);
            result = self.build_node(def.body, Some(def.return_type))?;
        }

        let vars = self.alloc.restore_vars(stage, saved_vars);
        let flow = std::mem::replace(&mut self.flow, saved_flow);
        self.tab = saved_tab;
        self.current_scope = saved_scope;
        self.build_stage = saved_build_stage;
        self.context = saved_context;

        let code = self.emitter.compose_function(
            &fn_name,
            &def.params,
            def.return_type,
            &vars,
            &flow.code,
            &result,
        );
        self.codes
            .entry(stage)
            .or_default()
            .push(crate::function::NodeCode {
                name: fn_name.clone(),
                code,
            });

        self.functions_in_progress.remove(&function);
        self.compiled_functions
            .insert((stage, function), fn_name.clone());
        Ok(fn_name)
    }

    // ---- orchestration ----

    /// Run the three build stages, once each, in strict order, over the
    /// same stage roots, then assemble the artifact.
    pub fn build(mut self) -> Result<CompiledShader> {
        for build_stage in BuildStage::ALL {
            self.build_stage = Some(build_stage);
            for shader_stage in ShaderStage::ALL {
                let roots = match self.flow_roots.get(&shader_stage) {
                    Some(roots) if !roots.is_empty() => roots.clone(),
                    _ => continue,
                };
                self.shader_stage = Some(shader_stage);
                for root in roots {
                    if build_stage == BuildStage::Generate {
                        self.flow_node(root)?;
                    } else {
                        self.build_node(root, None)?;
                    }
                }
            }
        }
        self.build_stage = None;
        self.shader_stage = None;

        self.compose()
    }

    fn stage_result(&mut self, stage: ShaderStage, root: NodeId) -> Option<String> {
        let flow = self.flows_data.get(&(stage, root))?;
        let result = flow.result.clone()?;
        if result.is_empty() {
            return None;
        }
        let ty = self.node_type(root);
        match stage {
            // Vertex results are positions, fragment results are colors;
            // both funnel through the vec4 growth rules.
            ShaderStage::Vertex | ShaderStage::Fragment => {
                Some(self.emitter.format(&result, ty, ShaderType::Vec4))
            }
            ShaderStage::Compute => None,
        }
    }

    fn compose(mut self) -> Result<CompiledShader> {
        let mut artifact = CompiledShader::default();

        let mut all_roots: Vec<(ShaderStage, NodeId)> = Vec::new();
        for shader_stage in ShaderStage::ALL {
            for root in self.flow_roots.get(&shader_stage).cloned().unwrap_or_default() {
                all_roots.push((shader_stage, root));
            }
        }

        for shader_stage in ShaderStage::ALL {
            let roots = self.flow_roots.get(&shader_stage).cloned().unwrap_or_default();
            let prelude = self.stage_prelude.get(&shader_stage).cloned().unwrap_or_default();

            // The vertex stage still needs composing when another stage
            // routed varying assignments into it.
            let needed = !roots.is_empty()
                || (shader_stage == ShaderStage::Vertex
                    && (!prelude.is_empty() || !self.alloc.varyings.is_empty()));
            if !needed {
                continue;
            }

            let mut flow_text = String::new();
            let mut result: Option<String> = None;
            for &root in &roots {
                if let Some(flow) = self.flows_data.get(&(shader_stage, root)) {
                    flow_text.push_str(&flow.code);
                }
                result = self.stage_result(shader_stage, root);
            }

            let codes = self.codes.get(&shader_stage).cloned().unwrap_or_default();
            let pieces = StagePieces {
                stage: shader_stage,
                uniforms: self.alloc.uniforms_for(shader_stage),
                textures: self.alloc.textures_for(shader_stage),
                attributes: &self.alloc.attributes,
                varyings: &self.alloc.varyings,
                vars: self.alloc.vars(shader_stage),
                codes: &codes,
                prelude: &prelude,
                flow: &flow_text,
                result: result.as_deref(),
            };
            let source = self.emitter.compose_stage(&pieces);

            match shader_stage {
                ShaderStage::Vertex => artifact.vertex = Some(source),
                ShaderStage::Fragment => artifact.fragment = Some(source),
                ShaderStage::Compute => artifact.compute = Some(source),
            }
        }

        for &node in &self.nodes_seen {
            let frequency = self.graph.node(node).update;
            if frequency != UpdateFrequency::None {
                artifact.updates.push(UpdateRecord { node, frequency });
            }
        }

        artifact.attributes = self.alloc.attributes.clone();
        artifact.uniforms = self.alloc.uniforms.clone();
        artifact.varyings = self.alloc.varyings.clone();
        artifact.textures = self.alloc.textures.clone();
        artifact.diagnostics = self.diagnostics.clone();
        artifact.cache_key = content_key(self.graph, &all_roots, self.emitter.target_name())?;

        Ok(artifact)
    }
}

fn kind_name(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Const(_) => "const",
        NodeKind::Uniform { .. } => "uniform",
        NodeKind::Attribute { .. } => "attribute",
        NodeKind::Varying { .. } => "varying",
        NodeKind::Operator { .. } => "operator",
        NodeKind::Math { .. } => "math",
        NodeKind::Convert { .. } => "convert",
        NodeKind::Join { .. } => "join",
        NodeKind::Split { .. } => "split",
        NodeKind::Var { .. } => "var",
        NodeKind::Assign { .. } => "assign",
        NodeKind::Texture { .. } => "texture",
        NodeKind::Conditional { .. } => "conditional",
        NodeKind::Loop { .. } => "loop",
        NodeKind::LoopCounter { .. } => "loopCounter",
        NodeKind::Stack { .. } => "stack",
        NodeKind::CacheScope { .. } => "cacheScope",
        NodeKind::FunctionCall { .. } => "functionCall",
        NodeKind::OverloadedCall { .. } => "overloadedCall",
        NodeKind::Parameter { .. } => "parameter",
        NodeKind::Remap { .. } => "remap",
    }
}

/// Result typing for binary operators: comparisons yield boolean shapes,
/// matrix multiplication follows the linear-algebra forms, everything else
/// promotes component-wise.
fn operator_type(op: Operator, a: ShaderType, b: ShaderType) -> ShaderType {
    let a = a.vector_type();
    let b = b.vector_type();

    if op.is_logical() {
        return ShaderType::Bool;
    }
    if op.is_comparison() {
        let len = a.length().max(b.length());
        return ShaderType::from_length(len, ShaderType::Bool).unwrap_or(ShaderType::Bool);
    }
    if op == Operator::Mul {
        if a.is_matrix() && b.is_matrix() {
            return if a.length() >= b.length() { a } else { b };
        }
        if a.is_matrix() && b.is_vector() {
            return a.vector_from_matrix();
        }
        if b.is_matrix() && a.is_vector() {
            return b.vector_from_matrix();
        }
        if a.is_matrix() || b.is_matrix() {
            return if a.is_matrix() { a } else { b };
        }
    }
    if a.is_matrix() || b.is_matrix() {
        return if a.is_matrix() { a } else { b };
    }
    a.promote(b)
}

/// Result typing for intrinsics: reductions go scalar, `cross` is always a
/// 3-vector, everything else follows its promoted input type.
fn math_type(op: MathFunction, args: &[ShaderType]) -> ShaderType {
    match op {
        MathFunction::Length | MathFunction::Distance | MathFunction::Dot => ShaderType::Float,
        MathFunction::Cross => ShaderType::Vec3,
        _ => {
            let mut ty = args.first().copied().unwrap_or(ShaderType::Float).vector_type();
            for &arg in &args[1..] {
                ty = ty.promote(arg);
            }
            ty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::wgsl::WgslEmitter;

    #[test]
    fn test_operator_type_matrix_forms() {
        assert_eq!(
            operator_type(Operator::Mul, ShaderType::Mat4, ShaderType::Vec4),
            ShaderType::Vec4
        );
        assert_eq!(
            operator_type(Operator::Mul, ShaderType::Vec3, ShaderType::Mat3),
            ShaderType::Vec3
        );
        assert_eq!(
            operator_type(Operator::Mul, ShaderType::Mat3, ShaderType::Float),
            ShaderType::Mat3
        );
        assert_eq!(
            operator_type(Operator::Less, ShaderType::Vec3, ShaderType::Vec3),
            ShaderType::BVec3
        );
    }

    #[test]
    fn test_single_const_fragment_compiles() {
        let mut g = Graph::new();
        let c = g.add(NodeKind::Const(ConstValue::Vec4([1.0, 0.0, 0.0, 1.0])));
        let emitter = WgslEmitter;
        let mut builder = ShaderBuilder::new(&mut g, &emitter);
        builder.add_flow(ShaderStage::Fragment, c);
        let artifact = builder.build().unwrap();
        let fragment = artifact.fragment.unwrap();
        assert!(fragment.contains("vec4f(1.0, 0.0, 0.0, 1.0)"));
        assert!(fragment.contains("fn fs_main"));
    }

    #[test]
    fn test_build_stage_order_is_fixed() {
        assert_eq!(
            BuildStage::ALL,
            [BuildStage::Setup, BuildStage::Analyze, BuildStage::Generate]
        );
    }
}
