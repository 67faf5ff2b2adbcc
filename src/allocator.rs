//! Stable target-identifier allocation for temporaries, uniforms,
//! varyings, vertex attributes, and texture bindings.
//!
//! Every allocation is deduplicated by the requesting node's identity (or
//! an explicit name) per relevant scope: repeat requests return the record
//! assigned on first use, so a shared node always resolves to the same
//! identifier for the lifetime of one compiled artifact. Names carry a
//! monotonic counter suffix, which keeps them collision-free across the
//! whole compiled unit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::{NodeId, TextureDimension};
use crate::types::{ShaderStage, ShaderType, UpdateFrequency};

/// A hoisted temporary, declared at the top of its stage's body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarAlloc {
    pub name: String,
    pub ty: ShaderType,
}

/// A uniform binding record. `group` is the named update partition exactly
/// as declared on the originating node; `group_index` is assigned in
/// first-use order and `order_in_group` is the ordinal the resource layer
/// uses to lay the group's buffer out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformAlloc {
    pub name: String,
    pub ty: ShaderType,
    pub group: String,
    pub group_index: usize,
    pub order_in_group: usize,
    pub stage: ShaderStage,
    pub node: NodeId,
    pub update: UpdateFrequency,
}

/// A vertex-stage output interpolated into the fragment stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaryingAlloc {
    pub name: String,
    pub ty: ShaderType,
    pub location: usize,
    pub node: NodeId,
}

/// A per-vertex geometry input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeAlloc {
    pub name: String,
    pub ty: ShaderType,
    pub location: usize,
}

/// A texture plus its sampler, bound as a pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureAlloc {
    pub texture_name: String,
    pub sampler_name: String,
    pub source: String,
    pub dimension: TextureDimension,
    pub group: String,
    pub group_index: usize,
    pub order_in_group: usize,
    pub stage: ShaderStage,
}

/// Allocator state for one compile.
#[derive(Debug, Default)]
pub struct ResourceAllocator {
    vars: HashMap<ShaderStage, Vec<VarAlloc>>,
    pub uniforms: Vec<UniformAlloc>,
    pub varyings: Vec<VaryingAlloc>,
    pub attributes: Vec<AttributeAlloc>,
    pub textures: Vec<TextureAlloc>,
    /// Uniform groups in first-use order; the index is the group index.
    pub groups: Vec<String>,
    uniform_index: usize,
    texture_by_source: HashMap<(String, ShaderStage), usize>,
}

impl ResourceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn group_index(&mut self, group: &str) -> usize {
        if let Some(i) = self.groups.iter().position(|g| g == group) {
            return i;
        }
        self.groups.push(group.to_string());
        self.groups.len() - 1
    }

    /// Allocate a temporary in `stage`, returning its index into the
    /// stage's var list. Callers memoize the index in node data, which is
    /// what enforces at-most-one-per-node.
    pub fn add_var(&mut self, stage: ShaderStage, name: Option<String>, ty: ShaderType) -> usize {
        let vars = self.vars.entry(stage).or_default();
        let name = name.unwrap_or_else(|| format!("nodeVar{}", vars.len()));
        vars.push(VarAlloc { name, ty });
        vars.len() - 1
    }

    pub fn var(&self, stage: ShaderStage, index: usize) -> &VarAlloc {
        &self.vars[&stage][index]
    }

    pub fn vars(&self, stage: ShaderStage) -> &[VarAlloc] {
        self.vars.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Swap out the active var list for `stage`; used while a function body
    /// compiles with its own locals.
    pub fn take_vars(&mut self, stage: ShaderStage) -> Vec<VarAlloc> {
        self.vars.remove(&stage).unwrap_or_default()
    }

    pub fn restore_vars(&mut self, stage: ShaderStage, vars: Vec<VarAlloc>) -> Vec<VarAlloc> {
        let current = self.vars.remove(&stage).unwrap_or_default();
        self.vars.insert(stage, vars);
        current
    }

    pub fn add_uniform(
        &mut self,
        stage: ShaderStage,
        node: NodeId,
        name: Option<String>,
        ty: ShaderType,
        group: &str,
        update: UpdateFrequency,
    ) -> usize {
        let group_index = self.group_index(group);
        let order_in_group = self
            .uniforms
            .iter()
            .filter(|u| u.group_index == group_index && u.stage == stage)
            .count();
        let name = name.unwrap_or_else(|| {
            let n = self.uniform_index;
            self.uniform_index += 1;
            format!("nodeUniform{n}")
        });
        self.uniforms.push(UniformAlloc {
            name,
            ty,
            group: group.to_string(),
            group_index,
            order_in_group,
            stage,
            node,
            update,
        });
        self.uniforms.len() - 1
    }

    pub fn uniforms_for(&self, stage: ShaderStage) -> Vec<&UniformAlloc> {
        self.uniforms.iter().filter(|u| u.stage == stage).collect()
    }

    pub fn add_varying(&mut self, node: NodeId, name: Option<String>, ty: ShaderType) -> usize {
        let location = self.varyings.len();
        let name = name.unwrap_or_else(|| format!("nodeVarying{location}"));
        self.varyings.push(VaryingAlloc {
            name,
            ty,
            location,
            node,
        });
        location
    }

    /// Attributes dedup by name: the same geometry input referenced through
    /// several nodes resolves to a single record.
    pub fn add_attribute(&mut self, name: &str, ty: ShaderType) -> usize {
        if let Some(i) = self.attributes.iter().position(|a| a.name == name) {
            return i;
        }
        let location = self.attributes.len();
        self.attributes.push(AttributeAlloc {
            name: name.to_string(),
            ty,
            location,
        });
        location
    }

    /// Texture bindings dedup by (source, stage): sampling the same logical
    /// texture twice shares one binding pair.
    pub fn add_texture(
        &mut self,
        stage: ShaderStage,
        source: &str,
        dimension: TextureDimension,
        group: &str,
    ) -> usize {
        let key = (source.to_string(), stage);
        if let Some(&i) = self.texture_by_source.get(&key) {
            return i;
        }
        let group_index = self.group_index(group);
        let order_in_group = self
            .textures
            .iter()
            .filter(|t| t.group_index == group_index && t.stage == stage)
            .count();
        let n = self.textures.len();
        self.textures.push(TextureAlloc {
            texture_name: format!("nodeTexture{n}"),
            sampler_name: format!("nodeSampler{n}"),
            source: source.to_string(),
            dimension,
            group: group.to_string(),
            group_index,
            order_in_group,
            stage,
        });
        self.texture_by_source.insert(key, n);
        n
    }

    pub fn textures_for(&self, stage: ShaderStage) -> Vec<&TextureAlloc> {
        self.textures.iter().filter(|t| t.stage == stage).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_names_count_up_per_stage() {
        let mut alloc = ResourceAllocator::new();
        let a = alloc.add_var(ShaderStage::Fragment, None, ShaderType::Vec3);
        let b = alloc.add_var(ShaderStage::Fragment, None, ShaderType::Float);
        let c = alloc.add_var(ShaderStage::Vertex, None, ShaderType::Vec2);
        assert_eq!(alloc.var(ShaderStage::Fragment, a).name, "nodeVar0");
        assert_eq!(alloc.var(ShaderStage::Fragment, b).name, "nodeVar1");
        assert_eq!(alloc.var(ShaderStage::Vertex, c).name, "nodeVar0");
    }

    #[test]
    fn test_uniform_groups_keep_first_use_order() {
        let mut alloc = ResourceAllocator::new();
        alloc.add_uniform(
            ShaderStage::Fragment,
            NodeId(0),
            None,
            ShaderType::Float,
            "object",
            UpdateFrequency::Object,
        );
        alloc.add_uniform(
            ShaderStage::Fragment,
            NodeId(1),
            None,
            ShaderType::Vec3,
            "frame",
            UpdateFrequency::Frame,
        );
        alloc.add_uniform(
            ShaderStage::Fragment,
            NodeId(2),
            None,
            ShaderType::Vec2,
            "object",
            UpdateFrequency::Object,
        );
        assert_eq!(alloc.groups, vec!["object".to_string(), "frame".to_string()]);
        assert_eq!(alloc.uniforms[2].group_index, 0);
        assert_eq!(alloc.uniforms[2].order_in_group, 1);
    }

    #[test]
    fn test_attribute_dedup_by_name() {
        let mut alloc = ResourceAllocator::new();
        let a = alloc.add_attribute("uv", ShaderType::Vec2);
        let b = alloc.add_attribute("uv", ShaderType::Vec2);
        let c = alloc.add_attribute("normal", ShaderType::Vec3);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(alloc.attributes.len(), 2);
    }

    #[test]
    fn test_texture_dedup_by_source_and_stage() {
        let mut alloc = ResourceAllocator::new();
        let a = alloc.add_texture(ShaderStage::Fragment, "albedo", TextureDimension::D2, "material");
        let b = alloc.add_texture(ShaderStage::Fragment, "albedo", TextureDimension::D2, "material");
        let c = alloc.add_texture(ShaderStage::Vertex, "albedo", TextureDimension::D2, "material");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
