//! End-to-end tests: compile templates, then expand the generators against
//! target methods.

use std::rc::Rc;

use twostage::{GeneratorRegistry, RegistryError, TemplateSource, TwoStageDatabase};
use twostage_core::TypeRef;
use twostage_front::{Environment, Session};
use twostage_runtime::{ExpansionContext, ExpansionError, InvokeOriginal, TargetMethod, Value};
use twostage_syntax::printer::{compact, pretty};

fn compile(text: &str, environment: Environment) -> GeneratorRegistry {
    let db = TwoStageDatabase::default();
    let source = TemplateSource::new(
        &db,
        "test.tpl".into(),
        text.to_owned(),
        environment,
        Session::new(),
    );
    let result = twostage::compile_with_diagnostics(&db, source);
    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    GeneratorRegistry::from_generators(result.generators)
}

fn context(target: TargetMethod) -> ExpansionContext {
    let site = InvokeOriginal::new(
        target.name.clone(),
        target.parameters.iter().map(|parameter| parameter.name.clone()),
    );
    ExpansionContext::new(target, site)
}

fn service_environment() -> Environment {
    let manifest = r#"{
        "globals": { "Service": { "kind": "type", "type": "Service", "stage": "generated" } },
        "types": { "Service": { "SomeCall": { "kind": "method", "type": "int" } } }
    }"#;
    Environment::standard().merge(Environment::from_json(manifest).expect("manifest should load"))
}

#[test]
fn test_generation_time_branch_is_chosen_per_argument() {
    let registry = compile(
        r#"template Choose(int n) { if (n > 0) return "a"; else return "b"; }"#,
        Environment::standard(),
    );
    let target = TargetMethod::new("Pick", TypeRef::String);

    let positive = context(target.clone()).with_argument("n", Value::Int(2));
    let body = registry.expand("Choose", Rc::new(positive)).unwrap();
    insta::assert_snapshot!(compact(&body), @r#"{ return "a"; }"#);

    let negative = context(target).with_argument("n", Value::Int(-1));
    let body = registry.expand("Choose", Rc::new(negative)).unwrap();
    insta::assert_snapshot!(compact(&body), @r#"{ return "b"; }"#);
}

#[test]
fn test_one_generated_statement_per_parameter() {
    let registry = compile(
        "template Trace() { foreach (var p in meta.Target.Parameters) Console.WriteLine(p.Value); }",
        Environment::standard(),
    );
    let target = TargetMethod::new("Save", TypeRef::Void)
        .with_parameter("path", TypeRef::String)
        .with_parameter("count", TypeRef::Int)
        .with_parameter("force", TypeRef::Bool);
    let body = registry.expand("Trace", Rc::new(context(target))).unwrap();
    assert_eq!(body.child_nodes().count(), 3);
    insta::assert_snapshot!(pretty(&body), @r"
    {
        Console.WriteLine(path);
        Console.WriteLine(count);
        Console.WriteLine(force);
    }
    ");
}

#[test]
fn test_void_target_keeps_only_side_effects() {
    let registry = compile(
        "template Call() { return Service.SomeCall(); } template Bare() { var x = Service.SomeCall(); return x; }",
        service_environment(),
    );
    let target = TargetMethod::new("Run", TypeRef::Void);

    let body = registry.expand("Call", Rc::new(context(target.clone()))).unwrap();
    insta::assert_snapshot!(compact(&body), @"{ Service.SomeCall(); return; }");

    let body = registry.expand("Bare", Rc::new(context(target))).unwrap();
    insta::assert_snapshot!(compact(&body), @"{ var x = Service.SomeCall(); return; }");
}

#[test]
fn test_void_target_keeps_calls_inside_returned_expressions() {
    let registry = compile(
        "template Sum() { return Service.SomeCall() + 1; }",
        service_environment(),
    );
    let target = TargetMethod::new("Run", TypeRef::Void);
    let body = registry.expand("Sum", Rc::new(context(target))).unwrap();
    insta::assert_snapshot!(compact(&body), @"{ _ = Service.SomeCall() + 1; return; }");
}

#[test]
fn test_awaitable_deferred_call() {
    let registry = compile(
        "template Wrap() { var r = meta.ProceedAsync(); return r; }",
        Environment::standard(),
    );
    let target = TargetMethod::new("Load", "Task<int>".parse().unwrap())
        .with_parameter("path", TypeRef::String);
    let body = registry.expand("Wrap", Rc::new(context(target))).unwrap();
    insta::assert_snapshot!(
        compact(&body),
        @"{ var r = await Load_Original(path); return (int)r; }"
    );
}

#[test]
fn test_form_mismatch_is_raised_at_expansion() {
    let registry = compile(
        "template Wrap() { var r = meta.ProceedAsync(); return r; }",
        Environment::standard(),
    );
    let target = TargetMethod::new("Count", TypeRef::Int);
    let error = registry.expand("Wrap", Rc::new(context(target))).unwrap_err();
    assert!(
        matches!(
            error,
            RegistryError::Expansion(ExpansionError::FormMismatch { .. })
        ),
        "{error}"
    );
}

#[test]
fn test_generated_locals_do_not_capture_parameters() {
    let registry = compile(
        "template Echo() { var value = Console.ReadLine(); Console.WriteLine(value); }",
        Environment::standard(),
    );
    let target = TargetMethod::new("Echo", TypeRef::Void).with_parameter("value", TypeRef::String);
    let body = registry.expand("Echo", Rc::new(context(target))).unwrap();
    insta::assert_snapshot!(
        compact(&body),
        @"{ var value_1 = Console.ReadLine(); Console.WriteLine(value_1); }"
    );
}
