//! Reference implementations of the semantic services: an environment of
//! known symbols and a lexical resolver over template trees.

mod env;
mod scope;

pub use env::{Environment, EnvironmentError, MemberSpec};
pub use scope::ScopeResolver;
