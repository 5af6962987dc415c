//! Template compiler front end: semantic annotation, validation, stage
//! classification, quoting into generator programs, and span projection.

pub mod annotate;
pub mod classify;
pub mod partition;
pub mod quote;
pub mod resolve;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use annotate::{AnnotationCache, Session, SessionId};
pub use classify::{Classification, classify};
pub use partition::{PartitionCategory, TextPartition, project_stages};
pub use quote::{GENERATOR_SUFFIX, Generator, QuoteOutput, quote_templates};
pub use resolve::{Environment, EnvironmentError, MemberSpec, ScopeResolver};
pub use validate::validate;
