//! Expansion runtime: runs a generator program against a target method and
//! produces the generated code.
//!
//! ```text
//! generator program ──interp──▶ syntax tree ──flatten──▶ generated body
//!          ▲                          │
//!          └── ExpansionContext ◀─────┘ fresh names, returns, deferred calls
//! ```

pub mod context;
pub mod deferred;
pub mod error;
pub mod flatten;
pub mod host;
pub mod interp;
pub mod meta;
pub mod returns;
pub mod scope;
pub mod target;
pub mod value;

use std::rc::Rc;

use twostage_syntax::SyntaxNode;

pub use context::{ContextGuard, ExpansionContext};
pub use deferred::{DeferredCallSite, InvokeOriginal};
pub use error::{ExpansionError, ExpansionResult};
pub use interp::Interpreter;
pub use scope::{LexicalScopes, ScopeId};
pub use target::{ResultKind, TargetMethod, TargetParameter};
pub use value::{HostObject, Value};

/// Runs `program` with `context` as the current expansion context and
/// returns the flattened tree it builds.
pub fn expand(program: &SyntaxNode, context: Rc<ExpansionContext>) -> ExpansionResult<SyntaxNode> {
    let _span = tracing::debug_span!(
        "expand",
        generator = program.name().unwrap_or_default(),
        target = %context.target().name
    )
    .entered();
    let _guard = context.enter();
    let tree = match Interpreter::new(context.clone()).run(program)? {
        Value::Node(tree) => tree,
        other => {
            tracing::debug!(result = other.type_name(), "generator returned no tree");
            return Err(ExpansionError::NoResult);
        }
    };
    let tree = flatten::flatten(&tree);
    tracing::debug!(statements = tree.children().len(), "expanded");
    Ok(tree)
}
