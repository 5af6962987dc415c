//! Compilation pipeline for templates.
//!
//! Each stage is a salsa tracked function, cached per [`TemplateSource`].
//!
//! ```text
//! TemplateSource
//!     │
//!     ▼
//! parse_template ─► SyntaxNode
//!     │
//!     ▼
//! annotate_template ─► SyntaxNode (validated, stamped with semantic ids)
//!     │
//!     ▼
//! classify_template ─► Classification (every node staged)
//!     │
//!     ├─► stage_partition ─► TextPartition<Stage>
//!     │
//!     ▼
//! compile_template ─► Vec<Generator>
//! ```
//!
//! Stages report through the [`Diagnostic`] accumulator. A stage that
//! reported an error stops the stages after it.

use salsa::Accumulator;
use twostage_core::{CompilationPhase, Diagnostic, DiagnosticCode};
use twostage_front::{
    Classification, Generator, ScopeResolver, TextPartition, classify, project_stages,
    quote_templates, validate,
};
use twostage_syntax::{Stage, SyntaxNode, parse_compilation_unit};

use crate::database::TemplateSource;

/// Output of [`compile_with_diagnostics`].
#[derive(Clone, Debug)]
pub struct CompilationResult {
    /// Empty when any stage reported an error.
    pub generators: Vec<Generator>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationResult {
    pub fn has_errors(&self) -> bool {
        twostage_core::diagnostic::has_errors(&self.diagnostics)
    }
}

/// Stage 1: parse the template text.
#[salsa::tracked]
pub fn parse_template(db: &dyn salsa::Database, source: TemplateSource) -> Option<SyntaxNode> {
    match parse_compilation_unit(source.text(db)) {
        Ok(tree) => Some(tree),
        Err(error) => {
            Diagnostic::error(
                DiagnosticCode::Syntax,
                error.span,
                error.message,
                CompilationPhase::Parsing,
            )
            .accumulate(db);
            None
        }
    }
}

/// Stage 2: validate the tree and record resolver facts in the session's
/// annotation cache.
#[salsa::tracked]
pub fn annotate_template(db: &dyn salsa::Database, source: TemplateSource) -> Option<SyntaxNode> {
    let tree = parse_template(db, source)?;
    let session = source.session(db);
    let diagnostics = match validate(&tree, session.cancellation()) {
        Ok(diagnostics) => diagnostics,
        Err(cancelled) => {
            tracing::debug!(path = %source.path(db).display(), "{cancelled}");
            return None;
        }
    };
    let failed = twostage_core::diagnostic::has_errors(&diagnostics);
    for diagnostic in diagnostics {
        diagnostic.accumulate(db);
    }
    if failed {
        return None;
    }
    let resolver = ScopeResolver::new(source.environment(db), &tree);
    let annotated = session.cache().annotate(&tree, &resolver);
    tracing::debug!(
        session = session.id().raw(),
        annotations = session.cache().len(),
        "annotated template"
    );
    Some(annotated)
}

/// Stage 3: classify every node. The classification is returned even
/// when it has errors, so its stages can still be shown.
#[salsa::tracked]
pub fn classify_template(db: &dyn salsa::Database, source: TemplateSource) -> Option<Classification> {
    let tree = annotate_template(db, source)?;
    let classification = classify(&tree, source.session(db).cache(), source.environment(db));
    for diagnostic in &classification.diagnostics {
        diagnostic.clone().accumulate(db);
    }
    Some(classification)
}

/// The stage of every piece of template text.
#[salsa::tracked]
pub fn stage_partition(db: &dyn salsa::Database, source: TemplateSource) -> Option<TextPartition<Stage>> {
    classify_template(db, source).map(|classification| project_stages(&classification.tree))
}

/// Stage 4: quote each template into its generator.
#[salsa::tracked]
pub fn compile_template(db: &dyn salsa::Database, source: TemplateSource) -> Vec<Generator> {
    let Some(classification) = classify_template(db, source) else {
        return Vec::new();
    };
    if classification.has_errors() {
        return Vec::new();
    }
    let output = quote_templates(&classification.tree, source.session(db).cache());
    let failed = output.has_errors();
    for diagnostic in output.diagnostics {
        diagnostic.accumulate(db);
    }
    if failed {
        return Vec::new();
    }
    tracing::debug!(
        path = %source.path(db).display(),
        generators = output.generators.len(),
        "compiled templates"
    );
    output.generators
}

/// Runs every stage and collects what they reported, in order.
pub fn compile_with_diagnostics(db: &dyn salsa::Database, source: TemplateSource) -> CompilationResult {
    let generators = compile_template(db, source);
    let diagnostics = compile_template::accumulated::<Diagnostic>(db, source)
        .into_iter()
        .cloned()
        .collect();
    CompilationResult {
        generators,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TwoStageDatabase;

    fn compiled(text: &str) -> CompilationResult {
        let db = TwoStageDatabase::default();
        let source = TemplateSource::from_text(&db, "test.tpl", text);
        compile_with_diagnostics(&db, source)
    }

    #[test]
    fn test_full_pipeline() {
        let result = compiled("template T(int n) { Console.WriteLine(n); }");
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.generators.len(), 1);
        assert_eq!(result.generators[0].name, "T_Generator");
    }

    #[test]
    fn test_syntax_error_stops_pipeline() {
        let result = compiled("template T( { }");
        assert!(result.generators.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, DiagnosticCode::Syntax);
        assert_eq!(result.diagnostics[0].phase, CompilationPhase::Parsing);
    }

    #[test]
    fn test_reserved_identifier_stops_pipeline() {
        let result = compiled("template T() { var __x = 1; }");
        assert!(result.generators.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, DiagnosticCode::ReservedIdentifier);
    }

    #[test]
    fn test_cancelled_session_produces_nothing() {
        let db = TwoStageDatabase::default();
        let session = twostage_front::Session::new();
        session.cancellation().cancel();
        let source = TemplateSource::new(
            &db,
            "test.tpl".into(),
            "template T() { }".to_owned(),
            twostage_front::Environment::standard(),
            session,
        );
        let result = compile_with_diagnostics(&db, source);
        assert!(result.generators.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_stages_are_cached() {
        let db = TwoStageDatabase::default();
        let source = TemplateSource::from_text(&db, "test.tpl", "template T() { }");
        let first = classify_template(&db, source).unwrap();
        let second = classify_template(&db, source).unwrap();
        assert!(first.tree.ptr_eq(&second.tree));
    }
}
