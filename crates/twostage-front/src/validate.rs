//! Checks that run before classification.

use twostage_core::{Cancelled, CancellationToken, CompilationPhase, Diagnostic, DiagnosticCode};
use twostage_syntax::{SyntaxNode, TokenKind};

/// Prefix of the variables generator programs declare.
pub const RESERVED_PREFIX: &str = "__";

/// Reports identifiers that would collide with generator variables.
///
/// Cancellation is checked before every node.
pub fn validate(tree: &SyntaxNode, cancellation: &CancellationToken) -> Result<Vec<Diagnostic>, Cancelled> {
    let mut diagnostics = Vec::new();
    for node in tree.descendants() {
        cancellation.check()?;
        for token in node.tokens() {
            if token.kind() == TokenKind::Identifier && token.text().starts_with(RESERVED_PREFIX) {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticCode::ReservedIdentifier,
                        token.span(),
                        format!("identifier `{}` uses the reserved prefix `{RESERVED_PREFIX}`", token.text()),
                        CompilationPhase::Validation,
                    )
                    .with_property("identifier", token.text()),
                );
            }
        }
    }
    Ok(diagnostics)
}
