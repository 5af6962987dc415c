//! Syntax trees for the template language: kinds, persistent nodes,
//! the winnow-based lexer, a recursive-descent parser and a printer.

pub mod kind;
pub mod lexer;
pub mod make;
pub mod node;
pub mod parser;
pub mod printer;
pub mod span;
pub mod stage;

pub use kind::{SyntaxKind, TokenKind};
pub use lexer::ParseError;
pub use node::{Annotation, AnnotationId, NodeId, SyntaxElement, SyntaxNode, SyntaxToken};
pub use parser::{parse_compilation_unit, parse_expression, parse_statement};
pub use span::Span;
pub use stage::Stage;
