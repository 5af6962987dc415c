//! Pipeline tests: classification, quoting and the stage partition, driven
//! through the salsa database.

use twostage::pipeline::{classify_template, compile_with_diagnostics, stage_partition};
use twostage::{TemplateSource, TwoStageDatabase};
use twostage_core::{CompilationPhase, DiagnosticCode};
use twostage_front::classify;
use twostage_syntax::Stage;
use twostage_syntax::printer::compact;

fn offset_of(text: &str, needle: &str) -> std::ops::Range<usize> {
    let start = text.find(needle).expect("needle should occur in text");
    start..start + needle.len()
}

#[test]
fn test_deferred_call_used_twice_reports_once() {
    let db = TwoStageDatabase::default();
    let source = TemplateSource::from_text(
        &db,
        "twice.tpl",
        "template T() { var a = meta.Proceed(); return meta.Proceed(); }",
    );
    let result = compile_with_diagnostics(&db, source);
    assert_eq!(result.diagnostics.len(), 1, "{:?}", result.diagnostics);
    let diagnostic = &result.diagnostics[0];
    assert_eq!(diagnostic.code, DiagnosticCode::DeferredCallMisuse);
    assert_eq!(diagnostic.phase, CompilationPhase::Quoting);
    assert_eq!(diagnostic.property("callee"), Some("Meta.Proceed"));
    assert!(result.generators.is_empty());
}

#[test]
fn test_classification_errors_stop_quoting() {
    let db = TwoStageDatabase::default();
    let source = TemplateSource::from_text(
        &db,
        "forced.tpl",
        "template T() { var n = meta.Target.Parameters[this.Index].Name; }",
    );
    let result = compile_with_diagnostics(&db, source);
    let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::ForcedGenerationTimeViolated]);
    assert!(result.generators.is_empty());

    let classification = classify_template(&db, source).expect("template should classify");
    let receiver = classification
        .tree
        .descendants()
        .find(|node| compact(node) == "meta.Target.Parameters[this.Index]")
        .expect("receiver node");
    assert!(
        receiver
            .descendants()
            .all(|node| node.stage() == Some(Stage::GenerationTimeOnly))
    );
}

#[test]
fn test_reclassifying_changes_nothing() {
    let db = TwoStageDatabase::default();
    let source = TemplateSource::from_text(
        &db,
        "again.tpl",
        "template T(int n) { foreach (var p in meta.Target.Parameters) { Console.WriteLine(p.Value); } }",
    );
    let first = classify_template(&db, source).expect("template should classify");
    let again = classify(
        &first.tree,
        source.session(&db).cache(),
        source.environment(&db),
    );
    assert_eq!(again.tree, first.tree);
    assert!(again.diagnostics.is_empty());
}

#[test]
fn test_stage_partition_covers_the_text() {
    let db = TwoStageDatabase::default();
    let text = "template T(int n) { Console.WriteLine(n); }";
    let source = TemplateSource::from_text(&db, "partition.tpl", text);
    let partition = stage_partition(&db, source).expect("template should classify");

    assert_eq!(
        partition.classify(offset_of(text, "Console")),
        Stage::GeneratedOnly
    );
    let argument = text.rfind('n').expect("argument");
    assert_eq!(
        partition.classify(argument..argument + 1),
        Stage::GenerationTimeOnly
    );

    let ranges = partition.covering(text.len());
    assert_eq!(ranges.first().map(|(range, _)| range.start), Some(0));
    assert_eq!(ranges.last().map(|(range, _)| range.end), Some(text.len()));
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].0.end, pair[1].0.start);
        assert_ne!(pair[0].1, pair[1].1);
    }
    assert!(
        partition
            .enumerate_ranges()
            .all(|(_, stage)| stage != Stage::Default)
    );
}

#[test]
fn test_sessions_compile_in_parallel() {
    const TEMPLATE: &str =
        "template T() { var x = Console.ReadLine(); foreach (var p in meta.Target.Parameters) Console.WriteLine(p.Value); }";
    let programs: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                scope.spawn(move || {
                    let db = TwoStageDatabase::default();
                    let source = TemplateSource::from_text(&db, format!("t{i}.tpl"), TEMPLATE);
                    let result = compile_with_diagnostics(&db, source);
                    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
                    compact(&result.generators[0].program)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("compilation thread panicked"))
            .collect()
    });
    assert!(programs.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_break_under_generated_branch_stops_compilation() {
    let db = TwoStageDatabase::default();
    let source = TemplateSource::from_text(
        &db,
        "jump.tpl",
        "template T() { foreach (var p in meta.Target.Parameters) { if (Console.ReadLine() == null) { break; } Console.WriteLine(p.Value); } }",
    );
    let result = compile_with_diagnostics(&db, source);
    let codes: Vec<_> = result.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![DiagnosticCode::GenerationTimeJumpInGeneratedBranch]);
    assert_eq!(result.diagnostics[0].phase, CompilationPhase::Classification);
    assert!(result.generators.is_empty());
}
