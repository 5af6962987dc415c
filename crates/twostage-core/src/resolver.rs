//! Interfaces to the semantic services the compiler consumes.

use twostage_syntax::{Stage, SyntaxNode};

use crate::symbol::Symbol;
use crate::types::TypeRef;

/// Semantic facts about one node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Symbol the node refers to.
    pub symbol: Option<Symbol>,
    /// Symbol the node declares.
    pub declared: Option<Symbol>,
    /// Type of the node when it is an expression.
    pub ty: Option<TypeRef>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.symbol.is_none() && self.declared.is_none() && self.ty.is_none()
    }
}

/// Binds syntax nodes to symbols and types. Called once per node by the
/// annotation pass.
pub trait SemanticResolver {
    fn resolve(&self, node: &SyntaxNode) -> Resolution;
}

/// Decides the stage of non-local symbols.
///
/// Implementations return one of `Default`, `GenerationTimeOnly` or
/// `GeneratedOnly`; never `Conflict`.
pub trait SymbolStageClassifier {
    fn classify_stage(&self, symbol: &Symbol) -> Stage;
}
