//! Per-compile, per-node working data, organized as a chain of nested
//! cache scopes.
//!
//! A child scope inherits its parent for reads but writes only into itself,
//! which is what gives conditional branches and function bodies their own
//! deduplication scope without leaking into the outer compile. All of this
//! is dropped with the compile; nothing here outlives the builder.

use std::collections::{HashMap, HashSet};

use crate::function::FunctionId;
use crate::graph::NodeId;
use crate::types::ShaderStage;

/// Cache scopes are arena-indexed inside one builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheScopeId(pub usize);

/// Working data is keyed per shader stage; `Any` entries are shared by all
/// stages (setup results, varyings).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKey {
    Any,
    Stage(ShaderStage),
}

/// Scratch the builder accumulates for one node within one cache scope and
/// stage. Created on first visit, discarded with the scope.
#[derive(Clone, Debug, Default)]
pub struct NodeData {
    /// Setup ran for this node (setup is memoized per scope).
    pub initialized: bool,
    /// The node the setup stage rewrote this node into, if any.
    pub output_node: Option<NodeId>,
    /// Distinct call sites seen during the analyze stage.
    pub usage_count: u32,
    /// Generated snippet, cached per (scope, stage).
    pub snippet: Option<String>,
    /// Target identifier this node resolves to once materialized
    /// (temporary, uniform, varying, induction variable, parameter).
    pub property_name: Option<String>,
    /// Index into the allocator's per-stage var list.
    pub variable: Option<usize>,
    /// Index into the allocator's uniform records.
    pub uniform: Option<usize>,
    /// Index into the allocator's varying records.
    pub varying: Option<usize>,
    /// Index into the allocator's texture binding records.
    pub texture_binding: Option<usize>,
    /// Statements this node hoisted, for re-emission into sibling flow
    /// blocks that cannot see the original emission.
    pub flow_codes: Vec<String>,
    /// Flow blocks the hoisted statements were already emitted into.
    pub flow_code_blocks: HashSet<NodeId>,
    /// For block nodes (conditionals, loops): the enclosing block.
    pub parent_block: Option<NodeId>,
    /// Memoized overload selection for this call site.
    pub resolved_overload: Option<FunctionId>,
    /// Cache scope created for a `CacheScope` node.
    pub cache_scope: Option<CacheScopeId>,
    /// Companion varying node created when a vertex attribute is read from
    /// the fragment stage.
    pub varying_companion: Option<NodeId>,
}

#[derive(Debug, Default)]
struct CacheScope {
    parent: Option<CacheScopeId>,
    data: HashMap<(NodeId, StageKey), NodeData>,
}

/// All cache scopes of one compile. Scope 0 is the root (global) scope.
#[derive(Debug)]
pub struct NodeDataCache {
    scopes: Vec<CacheScope>,
}

impl NodeDataCache {
    pub fn new() -> Self {
        Self {
            scopes: vec![CacheScope::default()],
        }
    }

    pub fn root(&self) -> CacheScopeId {
        CacheScopeId(0)
    }

    /// Create a nested scope. `parent = None` makes an isolated scope that
    /// does not fall through to any other (used for function bodies).
    pub fn push_scope(&mut self, parent: Option<CacheScopeId>) -> CacheScopeId {
        let id = CacheScopeId(self.scopes.len());
        self.scopes.push(CacheScope {
            parent,
            data: HashMap::new(),
        });
        id
    }

    /// Find the scope in `scope`'s parent chain that holds an entry for the
    /// key, if any.
    fn owning_scope(
        &self,
        scope: CacheScopeId,
        node: NodeId,
        stage: StageKey,
    ) -> Option<CacheScopeId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if self.scopes[s.0].data.contains_key(&(node, stage)) {
                return Some(s);
            }
            current = self.scopes[s.0].parent;
        }
        None
    }

    pub fn get(&self, scope: CacheScopeId, node: NodeId, stage: StageKey) -> Option<&NodeData> {
        let owner = self.owning_scope(scope, node, stage)?;
        self.scopes[owner.0].data.get(&(node, stage))
    }

    /// Mutable access, falling through to the owning ancestor scope;
    /// creates a default entry in `scope` itself when no ancestor has one.
    pub fn get_mut(&mut self, scope: CacheScopeId, node: NodeId, stage: StageKey) -> &mut NodeData {
        let owner = self.owning_scope(scope, node, stage).unwrap_or(scope);
        self.scopes[owner.0]
            .data
            .entry((node, stage))
            .or_default()
    }
}

impl Default for NodeDataCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scope_reads_parent_writes_self() {
        let mut cache = NodeDataCache::new();
        let root = cache.root();
        let node = NodeId(7);

        cache.get_mut(root, node, StageKey::Any).usage_count = 3;

        let child = cache.push_scope(Some(root));
        // Read falls through to the parent entry.
        assert_eq!(
            cache.get(child, node, StageKey::Any).unwrap().usage_count,
            3
        );

        // A write for a key the parent does not hold lands in the child.
        let other = NodeId(8);
        cache.get_mut(child, other, StageKey::Any).usage_count = 1;
        assert!(cache.get(root, other, StageKey::Any).is_none());
    }

    #[test]
    fn test_isolated_scope_does_not_fall_through() {
        let mut cache = NodeDataCache::new();
        let root = cache.root();
        let node = NodeId(1);
        cache.get_mut(root, node, StageKey::Any).usage_count = 5;

        let isolated = cache.push_scope(None);
        assert!(cache.get(isolated, node, StageKey::Any).is_none());
    }

    #[test]
    fn test_stage_keys_are_independent() {
        let mut cache = NodeDataCache::new();
        let root = cache.root();
        let node = NodeId(2);
        cache
            .get_mut(root, node, StageKey::Stage(ShaderStage::Vertex))
            .usage_count = 2;
        assert!(
            cache
                .get(root, node, StageKey::Stage(ShaderStage::Fragment))
                .is_none()
        );
    }
}
