//! Diagnostic messages emitted while compiling templates.

use twostage_syntax::Span;

/// A user-facing diagnostic with source location and structured properties.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[salsa::accumulator]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: DiagnosticSeverity,
    pub span: Span,
    pub message: String,
    pub properties: Vec<(String, String)>,
    pub phase: CompilationPhase,
}

impl Diagnostic {
    pub fn error(
        code: DiagnosticCode,
        span: Span,
        message: impl Into<String>,
        phase: CompilationPhase,
    ) -> Self {
        Self {
            code,
            severity: DiagnosticSeverity::Error,
            span,
            message: message.into(),
            properties: Vec::new(),
            phase,
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.push((key.to_owned(), value.into()));
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Stable diagnostic codes, grouped by family.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Template text does not parse.
    Syntax,
    /// A generated-only value is used where generation time is required.
    ForcedGenerationTimeViolated,
    /// One declaration groups generation-time and generated variables.
    AmbiguousVariableStage,
    /// A generation-time local is assigned under a generated condition.
    GenerationTimeAssignedInGeneratedBranch,
    /// `break` or `continue` of a generation-time loop under a generated condition.
    GenerationTimeJumpInGeneratedBranch,
    /// A construct with no staged meaning.
    UnsupportedConstruct,
    /// A generation-time value of a type without a literal form reaches generated code.
    UnsupportedSerialization,
    /// The deferred call is used outside a declaration or return, or more than once.
    DeferredCallMisuse,
    /// An identifier uses the prefix reserved for generator variables.
    ReservedIdentifier,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::Syntax => "TS0001",
            DiagnosticCode::ForcedGenerationTimeViolated => "TS0101",
            DiagnosticCode::AmbiguousVariableStage => "TS0102",
            DiagnosticCode::GenerationTimeAssignedInGeneratedBranch => "TS0103",
            DiagnosticCode::GenerationTimeJumpInGeneratedBranch => "TS0104",
            DiagnosticCode::UnsupportedConstruct => "TS0201",
            DiagnosticCode::UnsupportedSerialization => "TS0202",
            DiagnosticCode::DeferredCallMisuse => "TS0301",
            DiagnosticCode::ReservedIdentifier => "TS0401",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Compilation phase where a diagnostic was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompilationPhase {
    Parsing,
    Validation,
    Classification,
    Quoting,
}

impl std::fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "ERROR"),
            DiagnosticSeverity::Warning => write!(f, "WARNING"),
            DiagnosticSeverity::Info => write!(f, "INFO"),
        }
    }
}

/// Whether any diagnostic in `diagnostics` is an error.
pub fn has_errors<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> bool {
    diagnostics.into_iter().any(Diagnostic::is_error)
}
