//! Node-graph shader compiler.
//!
//! Takes a directed graph of typed expression nodes (arithmetic, texture
//! samples, control flow, uniforms, user-defined functions) and compiles it
//! into shader source text for a pluggable target language. Compilation is
//! a single synchronous pass in three stages: setup (lazy macro-expansion),
//! analyze (usage counting that drives shared-expression deduplication),
//! and generate (structured-control-flow code emission).
//!
//! ```
//! use node_forge_shader_compiler::builder::ShaderBuilder;
//! use node_forge_shader_compiler::emitter::wgsl::WgslEmitter;
//! use node_forge_shader_compiler::graph::Graph;
//! use node_forge_shader_compiler::types::{ShaderStage, ShaderType};
//!
//! let mut graph = Graph::new();
//! let uv = graph.attribute("uv", ShaderType::Vec2);
//! let color = graph.convert(uv, ShaderType::Vec4);
//!
//! let emitter = WgslEmitter;
//! let mut builder = ShaderBuilder::new(&mut graph, &emitter);
//! builder.add_flow(ShaderStage::Fragment, color);
//! let artifact = builder.build().unwrap();
//! assert!(artifact.fragment.unwrap().contains("fn fs_main"));
//! ```

pub mod allocator;
pub mod artifact;
pub mod builder;
pub mod cache;
pub mod constant;
pub mod emitter;
pub mod flow;
pub mod function;
pub mod graph;
pub mod types;
pub mod validation;

pub use artifact::{CompiledShader, ProgramCache};
pub use builder::{GeometryLayout, ShaderBuilder};
pub use constant::ConstValue;
pub use graph::{Graph, NodeId, NodeKind};
pub use types::{ShaderStage, ShaderType, UpdateFrequency};
