//! Reusable subgraphs compiled into named target-language functions.
//!
//! A function is a body subgraph plus a declared layout (parameter names,
//! types, return type). Call sites either name one function directly or
//! carry several candidates that are disambiguated by argument types.

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::types::ShaderType;

/// Index of a function definition in the graph's registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One declared parameter. `pointer` parameters receive a reference
/// expression at the call site instead of a value-coerced snippet.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: String,
    pub ty: ShaderType,
    pub pointer: bool,
    /// The `Parameter` node the body reads this argument through.
    pub node: NodeId,
}

/// A named subgraph with a declared call layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub return_type: ShaderType,
    pub body: NodeId,
}

/// All functions reachable from a graph, indexed by [`FunctionId`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FunctionRegistry {
    defs: Vec<FunctionDef>,
}

impl FunctionRegistry {
    pub fn add(&mut self, def: FunctionDef) -> FunctionId {
        let id = FunctionId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub fn def(&self, id: FunctionId) -> &FunctionDef {
        &self.defs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Score one candidate against concrete argument types.
    ///
    /// Exact per-position matches count one point each; any mismatch zeroes
    /// the candidate out entirely (all-or-nothing, not partial matching).
    /// Arity mismatches score zero as well.
    fn score(&self, candidate: FunctionId, arg_types: &[ShaderType]) -> u32 {
        let def = self.def(candidate);
        if def.params.len() != arg_types.len() {
            return 0;
        }
        let mut score = 0;
        for (param, arg) in def.params.iter().zip(arg_types) {
            if param.ty.vector_type() == arg.vector_type() {
                score += 1;
            } else {
                return 0;
            }
        }
        score
    }

    /// Select the candidate whose declared parameter types best match the
    /// argument types. Returns `None` when no candidate scores above zero
    /// (the caller reports this as a fatal resolution error). Ties resolve
    /// to the earliest-registered candidate.
    pub fn select_overload(
        &self,
        candidates: &[FunctionId],
        arg_types: &[ShaderType],
    ) -> Option<FunctionId> {
        let mut best: Option<(FunctionId, u32)> = None;
        for &candidate in candidates {
            let score = self.score(candidate, arg_types);
            if score == 0 {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }
        best.map(|(id, _)| id)
    }
}

/// A compiled piece of target-language code (a function body or an emitter
/// polyfill) hoisted above the stage entry point.
#[derive(Clone, Debug)]
pub struct NodeCode {
    pub name: String,
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, ty: ShaderType) -> FunctionParam {
        FunctionParam {
            name: name.to_string(),
            ty,
            pointer: false,
            node: NodeId(0),
        }
    }

    fn registry_with_two_candidates() -> (FunctionRegistry, FunctionId, FunctionId) {
        let mut registry = FunctionRegistry::default();
        let scalar = registry.add(FunctionDef {
            name: "blend".to_string(),
            params: vec![param("a", ShaderType::Float), param("b", ShaderType::Float)],
            return_type: ShaderType::Float,
            body: NodeId(0),
        });
        let vector = registry.add(FunctionDef {
            name: "blend".to_string(),
            params: vec![param("a", ShaderType::Vec3), param("b", ShaderType::Float)],
            return_type: ShaderType::Vec3,
            body: NodeId(0),
        });
        (registry, scalar, vector)
    }

    #[test]
    fn test_overload_prefers_exact_match() {
        let (registry, _scalar, vector) = registry_with_two_candidates();
        let selected = registry.select_overload(
            &[FunctionId(0), FunctionId(1)],
            &[ShaderType::Vec3, ShaderType::Float],
        );
        assert_eq!(selected, Some(vector));
    }

    #[test]
    fn test_mismatch_zeroes_candidate() {
        let (registry, _, _) = registry_with_two_candidates();
        // First parameter mismatches on candidate 0 even though the second
        // would match, so its score is 0, not 1.
        assert_eq!(
            registry.score(FunctionId(0), &[ShaderType::Vec3, ShaderType::Float]),
            0
        );
        assert_eq!(
            registry.score(FunctionId(1), &[ShaderType::Vec3, ShaderType::Float]),
            2
        );
    }

    #[test]
    fn test_no_candidate_matches() {
        let (registry, _, _) = registry_with_two_candidates();
        let selected = registry.select_overload(
            &[FunctionId(0), FunctionId(1)],
            &[ShaderType::Mat4, ShaderType::Mat4],
        );
        assert_eq!(selected, None);
    }
}
