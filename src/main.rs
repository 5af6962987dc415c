//! Template compiler CLI entry point.

mod cli;

use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use cli::{Cli, Command};
use salsa::Database;
use tracing_subscriber::EnvFilter;
use twostage::arguments::parse_argument;
use twostage::diagnostics::print_diagnostic;
use twostage::pipeline::{classify_template, compile_with_diagnostics, stage_partition};
use twostage::{GeneratorRegistry, TemplateSource, TwoStageDatabase};
use twostage_core::{Diagnostic, TypeRef};
use twostage_runtime::{ExpansionContext, InvokeOriginal, TargetMethod};
use twostage_syntax::printer::pretty;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let input = cli.command.input();
    let db = TwoStageDatabase::default();
    let source = match db.load(&input.file, input.env.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    db.attach(|db| match &cli.command {
        Command::Classify { .. } => classify(db, source),
        Command::Compile { .. } => compile(db, source),
        Command::Expand {
            template,
            method,
            returns,
            params,
            args,
            ..
        } => {
            let request = ExpandRequest {
                template: template.as_deref(),
                method,
                returns,
                params,
                args,
            };
            expand(db, source, request)
        }
    })
}

fn report(db: &dyn salsa::Database, source: TemplateSource, diagnostics: &[Diagnostic]) {
    let path = source.path(db).display().to_string();
    for diag in diagnostics {
        print_diagnostic(diag, source.text(db), &path);
    }
}

fn classify(db: &dyn salsa::Database, source: TemplateSource) -> ExitCode {
    let Some(partition) = stage_partition(db, source) else {
        let result = compile_with_diagnostics(db, source);
        report(db, source, &result.diagnostics);
        return ExitCode::FAILURE;
    };
    let text = source.text(db);
    for (range, stage) in partition.covering(text.len()) {
        println!("{:>5}..{:<5} {:<16} {:?}", range.start, range.end, stage.to_string(), &text[range.clone()]);
    }
    match classify_template(db, source) {
        Some(classification) if classification.has_errors() => {
            report(db, source, &classification.diagnostics);
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

fn compile(db: &dyn salsa::Database, source: TemplateSource) -> ExitCode {
    let result = compile_with_diagnostics(db, source);
    report(db, source, &result.diagnostics);
    if result.has_errors() {
        return ExitCode::FAILURE;
    }
    for generator in &result.generators {
        println!("{}", pretty(&generator.program));
    }
    ExitCode::SUCCESS
}

struct ExpandRequest<'a> {
    template: Option<&'a str>,
    method: &'a str,
    returns: &'a str,
    params: &'a [(String, String)],
    args: &'a [(String, String)],
}

fn expand(db: &dyn salsa::Database, source: TemplateSource, request: ExpandRequest<'_>) -> ExitCode {
    let result = compile_with_diagnostics(db, source);
    report(db, source, &result.diagnostics);
    if result.has_errors() {
        return ExitCode::FAILURE;
    }
    let registry = GeneratorRegistry::from_generators(result.generators);
    let template = match request.template {
        Some(template) => template.to_owned(),
        None => {
            let mut templates = registry.templates();
            match (templates.next(), templates.next()) {
                (Some(only), None) => only.to_owned(),
                _ => {
                    eprintln!("Error: the file has {} templates; pick one with --template", registry.len());
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let return_type = match request.returns.parse::<TypeRef>() {
        Ok(ty) => ty,
        Err(e) => {
            eprintln!("Error: bad return type `{}`: {e}", request.returns);
            return ExitCode::FAILURE;
        }
    };
    let mut target = TargetMethod::new(request.method, return_type);
    for (name, ty) in request.params {
        match ty.parse::<TypeRef>() {
            Ok(ty) => target = target.with_parameter(name.as_str(), ty),
            Err(e) => {
                eprintln!("Error: bad type for parameter `{name}`: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let site = InvokeOriginal::new(
        request.method,
        target.parameters.iter().map(|parameter| parameter.name.clone()),
    );
    let mut context = ExpansionContext::new(target, site);
    for (name, value) in request.args {
        context = context.with_argument(name.as_str(), parse_argument(value));
    }

    match registry.expand(&template, Rc::new(context)) {
        Ok(body) => {
            println!("{}", pretty(&body));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
