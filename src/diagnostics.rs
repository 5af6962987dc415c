//! Diagnostic formatting for the command line.

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use twostage_core::{CompilationPhase, Diagnostic, DiagnosticSeverity};

/// Get the display color for a compilation phase.
pub fn phase_color(phase: &CompilationPhase) -> Color {
    match phase {
        CompilationPhase::Parsing => Color::Red,
        CompilationPhase::Validation => Color::Yellow,
        CompilationPhase::Classification => Color::Magenta,
        CompilationPhase::Quoting => Color::Cyan,
    }
}

/// Normalize a span to ensure end > start (required by ariadne).
pub fn normalize_span(start: usize, end: usize) -> (usize, usize) {
    (start, end.max(start + 1))
}

fn report_kind(severity: DiagnosticSeverity) -> ReportKind<'static> {
    match severity {
        DiagnosticSeverity::Error => ReportKind::Error,
        DiagnosticSeverity::Warning => ReportKind::Warning,
        DiagnosticSeverity::Info => ReportKind::Advice,
    }
}

fn build_report<'a>(
    diag: &Diagnostic,
    file_path: &'a str,
    color: bool,
) -> Report<'static, (&'a str, std::ops::Range<usize>)> {
    let (start, end) = normalize_span(diag.span.start, diag.span.end);
    let mut label = Label::new((file_path, start..end)).with_message(&diag.message);
    if color {
        label = label.with_color(phase_color(&diag.phase));
    }
    let mut report = Report::build(report_kind(diag.severity), (file_path, start..end))
        .with_config(
            Config::default()
                .with_color(color)
                .with_index_type(IndexType::Byte),
        )
        .with_code(diag.code.as_str())
        .with_message(&diag.message)
        .with_label(label);
    for (key, value) in &diag.properties {
        report = report.with_note(format!("{key}: {value}"));
    }
    report.finish()
}

/// Print a diagnostic using ariadne for pretty output.
pub fn print_diagnostic(diag: &Diagnostic, source: &str, file_path: &str) {
    build_report(diag, file_path, true)
        .eprint((file_path, Source::from(source)))
        .ok();
}

/// Render a diagnostic without colors.
pub fn render_diagnostic(diag: &Diagnostic, source: &str, file_path: &str) -> String {
    let mut out = Vec::new();
    build_report(diag, file_path, false)
        .write((file_path, Source::from(source)), &mut out)
        .ok();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use twostage_core::DiagnosticCode;
    use twostage_syntax::Span;

    use super::*;

    #[test]
    fn test_phase_colors() {
        assert_eq!(phase_color(&CompilationPhase::Parsing), Color::Red);
        assert_eq!(phase_color(&CompilationPhase::Validation), Color::Yellow);
        assert_eq!(phase_color(&CompilationPhase::Classification), Color::Magenta);
        assert_eq!(phase_color(&CompilationPhase::Quoting), Color::Cyan);
    }

    #[test]
    fn test_normalize_span_valid() {
        assert_eq!(normalize_span(0, 10), (0, 10));
        assert_eq!(normalize_span(5, 15), (5, 15));
    }

    #[test]
    fn test_normalize_span_zero_length() {
        assert_eq!(normalize_span(5, 5), (5, 6));
        assert_eq!(normalize_span(0, 0), (0, 1));
    }

    #[test]
    fn test_render_includes_code_message_and_properties() {
        let source = "template T() { var __x = 1; }";
        let diag = Diagnostic::error(
            DiagnosticCode::ReservedIdentifier,
            Span::new(19, 22),
            "identifier `__x` is reserved",
            CompilationPhase::Validation,
        )
        .with_property("name", "__x");
        let rendered = render_diagnostic(&diag, source, "t.tpl");
        assert!(rendered.contains("TS0401"), "{rendered}");
        assert!(rendered.contains("identifier `__x` is reserved"), "{rendered}");
        assert!(rendered.contains("name: __x"), "{rendered}");
        assert!(rendered.contains("t.tpl"), "{rendered}");
    }
}
