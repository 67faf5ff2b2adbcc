//! Compiled-artifact output and the whole-graph content cache.
//!
//! The artifact is everything the GPU resource layer needs: per-stage
//! source text, the attribute/uniform/varying allocation records (with
//! group membership intact), and the list of nodes that must be refreshed
//! per frame/render/object before the artifact is used.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;

use crate::allocator::{AttributeAlloc, TextureAlloc, UniformAlloc, VaryingAlloc};
use crate::builder::{GeometryLayout, ShaderBuilder};
use crate::emitter::Emitter;
use crate::graph::{Graph, NodeId};
use crate::types::{ShaderStage, UpdateFrequency};

/// Non-fatal findings recorded during a compile. Fatal errors abort the
/// compile instead and never produce an artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// A node the caller must re-evaluate before using the artifact, tagged
/// with its declared frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRecord {
    pub node: NodeId,
    pub frequency: UpdateFrequency,
}

/// The compiler's output for one material/effect.
#[derive(Clone, Debug, Default)]
pub struct CompiledShader {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
    pub compute: Option<String>,
    pub attributes: Vec<AttributeAlloc>,
    pub uniforms: Vec<UniformAlloc>,
    pub varyings: Vec<VaryingAlloc>,
    pub textures: Vec<TextureAlloc>,
    pub updates: Vec<UpdateRecord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Content hash over the compiled roots; the key the program cache
    /// stores this artifact under.
    pub cache_key: u64,
}

impl CompiledShader {
    pub fn stage_source(&self, stage: ShaderStage) -> Option<&str> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_deref(),
            ShaderStage::Fragment => self.fragment.as_deref(),
            ShaderStage::Compute => self.compute.as_deref(),
        }
    }
}

/// Compute the content key for a set of stage roots. Bumping the version
/// of any node reachable from a root changes the key.
pub fn content_key(
    graph: &mut Graph,
    roots: &[(ShaderStage, NodeId)],
    target: &str,
) -> Result<u64> {
    let mut state = DefaultHasher::new();
    target.hash(&mut state);
    for (stage, root) in roots {
        stage.hash(&mut state);
        graph.cache_key(*root)?.hash(&mut state);
    }
    Ok(state.finish())
}

/// Whole-graph compilation cache, shared across frames by the owning
/// renderer. A compile is only re-run when the content key of the roots
/// changed; otherwise the previous artifact is returned untouched.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<u64, Arc<CompiledShader>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, key: u64) -> Option<Arc<CompiledShader>> {
        self.programs.get(&key).cloned()
    }

    /// Return the cached artifact for the roots' current content key, or
    /// run a full compile and cache the result.
    pub fn get_or_compile(
        &mut self,
        graph: &mut Graph,
        emitter: &dyn Emitter,
        roots: &[(ShaderStage, NodeId)],
        geometry: Option<GeometryLayout>,
    ) -> Result<Arc<CompiledShader>> {
        let key = content_key(graph, roots, emitter.target_name())?;
        if let Some(artifact) = self.programs.get(&key) {
            return Ok(artifact.clone());
        }

        let mut builder = ShaderBuilder::new(graph, emitter);
        if let Some(geometry) = geometry {
            builder = builder.with_geometry(geometry);
        }
        for (stage, root) in roots {
            builder.add_flow(*stage, *root);
        }
        let mut artifact = builder.build()?;
        artifact.cache_key = key;

        let artifact = Arc::new(artifact);
        self.programs.insert(key, artifact.clone());
        Ok(artifact)
    }
}
