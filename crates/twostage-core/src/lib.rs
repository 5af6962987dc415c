//! Types shared by the template compiler front end and the expansion runtime.
pub mod cancel;
pub mod diagnostic;
pub mod resolver;
pub mod symbol;
pub mod types;

pub use cancel::{Cancelled, CancellationToken};
pub use diagnostic::{CompilationPhase, Diagnostic, DiagnosticCode, DiagnosticSeverity};
pub use resolver::{Resolution, SemanticResolver, SymbolStageClassifier};
pub use symbol::{DeferredCallForm, Symbol, SymbolId, SymbolKind};
pub use types::TypeRef;
