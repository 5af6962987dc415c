//! Two-stage template compiler.
//!
//! Templates mix code that runs while generating (generation time) with
//! code that is emitted into the target method (generated). The pipeline
//! classifies each node by stage, then quotes every template into a
//! generator program that the expansion runtime interprets per target.

pub mod arguments;
pub mod database;
pub mod diagnostics;
pub mod pipeline;
pub mod registry;

pub use database::{LoadError, TemplateSource, TwoStageDatabase};
pub use pipeline::{CompilationResult, compile_with_diagnostics};
pub use registry::{GeneratorRegistry, RegistryError};
