//! Staged quoting.
//!
//! A classified template is rewritten into a *generator program*: an
//! ordinary template, named after the original plus [`GENERATOR_SUFFIX`],
//! which builds the generated code as a syntax tree when it runs.
//!
//! * Generation-time statements are kept as they are. A generation-time
//!   `if` or `foreach` stays host control flow and its branches are
//!   rewritten in place.
//! * Every other statement is *reified*: turned into constructor calls
//!   (`Syntax.IfStatement(...)`, `Syntax.Token(TokenKind.Plus)`) whose
//!   result is appended to the accumulator of the enclosing generated block.
//! * Generation-time values inside generated code are lifted through
//!   literal constructors; splices go through `Syntax.Splice`.
//! * Generated locals get fresh identifiers from the expansion context.
//!
//! A generated block that needs host statements of its own is built by a
//! zero-argument closure with a fresh accumulator.

mod meta_context;

use std::collections::HashMap;

use twostage_core::{
    CompilationPhase, DeferredCallForm, Diagnostic, DiagnosticCode, TypeRef,
};
use twostage_syntax::make;
use twostage_syntax::{
    Annotation, NodeId, Stage, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken, TokenKind,
};

use crate::annotate::AnnotationCache;
use meta_context::MetaContext;

/// Appended to a template's name to name its generator.
pub const GENERATOR_SUFFIX: &str = "_Generator";

/// A compiled template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Generator {
    /// Name of the template this generator was compiled from.
    pub template: String,
    pub name: String,
    /// A `template` node whose body builds the generated code.
    pub program: SyntaxNode,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QuoteOutput {
    pub generators: Vec<Generator>,
    pub diagnostics: Vec<Diagnostic>,
}

impl QuoteOutput {
    pub fn has_errors(&self) -> bool {
        twostage_core::diagnostic::has_errors(&self.diagnostics)
    }
}

/// Compiles every template of a classified tree into a generator.
///
/// `tree` is either a compilation unit or a single template.
pub fn quote_templates(tree: &SyntaxNode, cache: &AnnotationCache) -> QuoteOutput {
    let templates: Vec<&SyntaxNode> = if tree.kind() == SyntaxKind::Template {
        vec![tree]
    } else {
        tree.child_nodes()
            .filter(|node| node.kind() == SyntaxKind::Template)
            .collect()
    };
    let mut output = QuoteOutput::default();
    for template in templates {
        let mut quoter = Quoter::new(cache);
        output.generators.push(quoter.template(template));
        output.diagnostics.append(&mut quoter.diagnostics);
    }
    output
}

struct Quoter<'a> {
    cache: &'a AnnotationCache,
    meta: MetaContext,
    /// The deferred call lowered through the expansion context.
    lowered: Option<(NodeId, DeferredCallForm)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Quoter<'a> {
    fn new(cache: &'a AnnotationCache) -> Self {
        Self {
            cache,
            meta: MetaContext::default(),
            lowered: None,
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn template(&mut self, template: &SyntaxNode) -> Generator {
        self.scan_deferred(template);

        let name = template.name().unwrap_or_default().to_owned();
        let generator_name = format!("{name}{GENERATOR_SUFFIX}");
        let parameters: Vec<SyntaxNode> = template
            .child_nodes()
            .filter(|node| node.kind() == SyntaxKind::Parameter)
            .cloned()
            .collect();

        let accumulator = self.meta.push();
        let mut statements = vec![statement_list(&accumulator)];
        if let Some(body) = template.child_node_of_kind(SyntaxKind::Block) {
            for statement in body.child_nodes() {
                self.host_statement(statement, &mut statements);
            }
        }
        statements.push(make::return_statement(Some(make::call(
            "Syntax.Block",
            [make::identifier_name(&accumulator)],
        ))));
        self.meta.pop();

        tracing::debug!(
            template = %name,
            statements = statements.len(),
            diagnostics = self.diagnostics.len(),
            "quoted template"
        );
        Generator {
            template: name,
            name: generator_name.clone(),
            program: make::template(&generator_name, parameters, make::block(statements)),
        }
    }

    // Deferred calls

    fn deferred_form(&self, node: &SyntaxNode) -> Option<DeferredCallForm> {
        if node.kind() != SyntaxKind::InvocationExpression {
            return None;
        }
        self.cache.symbol(node).and_then(|symbol| symbol.deferred)
    }

    /// Picks the one deferred call that will be lowered and reports the rest.
    fn scan_deferred(&mut self, template: &SyntaxNode) {
        let mut parents: HashMap<NodeId, SyntaxNode> = HashMap::new();
        let mut seen = 0;
        for node in template.descendants() {
            for child in node.child_nodes() {
                parents.insert(child.id(), node.clone());
            }
            let Some(form) = self.deferred_form(&node) else {
                continue;
            };
            seen += 1;
            let callee = self
                .cache
                .symbol(&node)
                .map(|symbol| symbol.to_string())
                .unwrap_or_default();
            if seen > 1 {
                self.report(
                    Diagnostic::error(
                        DiagnosticCode::DeferredCallMisuse,
                        node.span(),
                        format!("`{callee}` can be used only once per template"),
                        CompilationPhase::Quoting,
                    )
                    .with_property("callee", callee),
                );
                continue;
            }
            if !is_deferred_position(&node, &parents) {
                self.report(
                    Diagnostic::error(
                        DiagnosticCode::DeferredCallMisuse,
                        node.span(),
                        format!(
                            "`{callee}` must be the initializer of a single variable or the value of a `return`"
                        ),
                        CompilationPhase::Quoting,
                    )
                    .with_property("callee", callee),
                );
                continue;
            }
            self.lowered = Some((node.id(), form));
        }
    }

    fn lowered_form(&self, node: &SyntaxNode) -> Option<DeferredCallForm> {
        self.lowered
            .filter(|(id, _)| *id == node.id())
            .map(|(_, form)| form)
    }

    // Host statements

    /// Appends the host statements for one template statement to `out`.
    fn host_statement(&mut self, statement: &SyntaxNode, out: &mut Vec<SyntaxNode>) {
        let generation_time = statement.stage() == Some(Stage::GenerationTimeOnly);
        match statement.kind() {
            SyntaxKind::IfStatement if generation_time => out.push(self.host_if(statement)),
            SyntaxKind::ForEachStatement if generation_time => {
                out.push(self.host_foreach(statement))
            }
            _ if generation_time => out.push(statement.clone()),
            SyntaxKind::LocalDeclaration => self.generated_declaration(statement, out),
            SyntaxKind::ForEachStatement => self.generated_foreach(statement, out),
            _ => {
                let quoted = self.embedded_statement(statement);
                self.append(quoted, out);
            }
        }
    }

    /// `__sN.Add(quoted);` against the innermost accumulator.
    fn append(&self, quoted: SyntaxNode, out: &mut Vec<SyntaxNode>) {
        let add = make::member_access(make::identifier_name(self.meta.accumulator()), "Add");
        out.push(make::expression_statement(make::invocation(add, [quoted])));
    }

    fn host_if(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        let (Some(condition), Some(then_branch)) = (statement.child_node(0), statement.child_node(1))
        else {
            return statement.clone();
        };
        let else_branch = statement
            .child_node_of_kind(SyntaxKind::ElseClause)
            .and_then(|clause| clause.child_node(0));
        let then_block = self.host_block(then_branch);
        let else_block = else_branch.map(|branch| self.host_block(branch));
        make::if_statement(condition.clone(), then_block, else_block)
    }

    fn host_foreach(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        let (Some(variable), Some(source), Some(body)) = (
            statement.token_of_kind(TokenKind::Identifier),
            statement.child_node(0),
            statement.child_node(1),
        ) else {
            return statement.clone();
        };
        let body = self.host_block(body);
        make::foreach_statement(false, variable.clone(), source.clone(), body)
    }

    /// Branch of host control flow: its statements run in the current
    /// generated block.
    fn host_block(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        let mut statements = Vec::new();
        if statement.kind() == SyntaxKind::Block {
            for child in statement.child_nodes() {
                self.host_statement(child, &mut statements);
            }
        } else {
            self.host_statement(statement, &mut statements);
        }
        make::block(statements)
    }

    /// Declares the host variable holding the fresh identifier of a
    /// generated local, emitting `var __x_k = Context.FreshIdentifier("x");`.
    fn fresh_local(&mut self, declaring: &SyntaxNode, out: &mut Vec<SyntaxNode>) -> String {
        let name = declaring.name().unwrap_or_default();
        let variable = self
            .meta
            .declare(name, self.cache.declared_symbol(declaring));
        out.push(make::local_declaration(
            SyntaxToken::identifier(variable.as_str()),
            Some(make::call(
                "Context.FreshIdentifier",
                [make::string_literal(name)],
            )),
        ));
        variable
    }

    fn generated_declaration(&mut self, statement: &SyntaxNode, out: &mut Vec<SyntaxNode>) {
        let declarators: Vec<&SyntaxNode> = statement.child_nodes().collect();
        if let [declarator] = declarators.as_slice() {
            let form = declarator
                .child_node(0)
                .and_then(|initializer| self.lowered_form(initializer));
            if let Some(form) = form {
                let variable = self.fresh_local(declarator, out);
                let assign = make::call(
                    "Context.CreateAssignStatement",
                    [make::identifier_name(&variable), form_path(form)],
                );
                self.append(assign, out);
                return;
            }
        }

        let mut quoted = Vec::new();
        for declarator in declarators {
            let variable = self.fresh_local(declarator, out);
            let mut arguments = vec![make::identifier_name(&variable)];
            if let Some(initializer) = declarator.child_node(0) {
                arguments.push(self.quote(initializer));
            }
            quoted.push(make::call("Syntax.VariableDeclarator", arguments));
        }
        let declaration = make::call("Syntax.LocalDeclaration", quoted);
        self.append(declaration, out);
    }

    fn generated_foreach(&mut self, statement: &SyntaxNode, out: &mut Vec<SyntaxNode>) {
        let variable = self.fresh_local(statement, out);
        let mut arguments = vec![make::identifier_name(&variable)];
        for child in statement.child_nodes() {
            let quoted = if child.kind().is_statement() {
                self.embedded_statement(child)
            } else {
                self.quote(child)
            };
            arguments.push(quoted);
        }
        let foreach = make::call("Syntax.ForEachStatement", arguments);
        self.append(foreach, out);
    }

    // Generated statements

    /// Statements that cannot be reified in place.
    fn is_host_level(&self, statement: &SyntaxNode) -> bool {
        statement.stage() == Some(Stage::GenerationTimeOnly)
            || matches!(
                statement.kind(),
                SyntaxKind::LocalDeclaration | SyntaxKind::ForEachStatement
            )
    }

    fn needs_host(&self, statement: &SyntaxNode) -> bool {
        if statement.kind() == SyntaxKind::Block {
            statement
                .child_nodes()
                .any(|child| self.is_host_level(child))
        } else {
            self.is_host_level(statement)
        }
    }

    /// Quotes a statement nested in generated code, building it through a
    /// closure when it needs host statements.
    fn embedded_statement(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        if self.needs_host(statement) {
            self.generated_block(statement)
        } else {
            self.quote_statement(statement)
        }
    }

    /// `Syntax.Block((() => { var __sN = ...; ...; return __sN; })())`.
    ///
    /// A single statement that is not a block becomes a synthetic block,
    /// which is inlined again after expansion.
    fn generated_block(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        let accumulator = self.meta.push();
        let mut body = vec![statement_list(&accumulator)];
        let is_block = statement.kind() == SyntaxKind::Block;
        if is_block {
            for child in statement.child_nodes() {
                self.host_statement(child, &mut body);
            }
        } else {
            self.host_statement(statement, &mut body);
        }
        body.push(make::return_statement(Some(make::identifier_name(
            &accumulator,
        ))));
        self.meta.pop();

        let closure = make::invocation(make::parenthesized(make::thunk(make::block(body))), []);
        let constructor = if is_block {
            "Syntax.Block"
        } else {
            "Syntax.SyntheticBlock"
        };
        make::call(constructor, [closure])
    }

    fn quote_statement(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        match statement.kind() {
            SyntaxKind::ReturnStatement => self.quote_return(statement),
            _ => self.structural(statement),
        }
    }

    fn quote_return(&mut self, statement: &SyntaxNode) -> SyntaxNode {
        let Some(value) = statement.child_node(0) else {
            return make::call("Context.ReturnStatement", []);
        };
        if let Some(form) = self.lowered_form(value) {
            return make::call("Context.CreateReturnStatement", [form_path(form)]);
        }
        let ty = self
            .cache
            .ty(value)
            .unwrap_or(TypeRef::Error)
            .to_string();
        let quoted = self.quote(value);
        make::call(
            "Context.ReturnStatement",
            [quoted, make::string_literal(&ty)],
        )
    }

    // Expressions

    fn quote(&mut self, node: &SyntaxNode) -> SyntaxNode {
        if node.has_annotation(Annotation::Splice) {
            return make::call("Syntax.Splice", [node.clone()]);
        }
        if !node.kind().is_expression() {
            return self.structural(node);
        }
        if self.deferred_form(node).is_some() {
            // Misplaced or repeated; already reported.
            return default_literal();
        }
        if node.stage() == Some(Stage::GenerationTimeOnly)
            && node.kind() != SyntaxKind::LiteralExpression
        {
            return self.lift(node);
        }
        if node.kind() == SyntaxKind::IdentifierName {
            let variable = self
                .cache
                .symbol(node)
                .and_then(|symbol| self.meta.lookup(&symbol).map(str::to_owned));
            if let Some(variable) = variable {
                return make::call("Syntax.IdentifierName", [make::identifier_name(&variable)]);
            }
        }
        self.structural(node)
    }

    /// The method part of an invocation is never a value of its own.
    fn quote_callee(&mut self, callee: &SyntaxNode) -> SyntaxNode {
        match callee.kind() {
            SyntaxKind::MemberAccessExpression | SyntaxKind::IdentifierName
                if !callee.has_annotation(Annotation::Splice) =>
            {
                self.structural(callee)
            }
            _ => self.quote(callee),
        }
    }

    /// Embeds the value of a generation-time expression as a literal.
    fn lift(&mut self, node: &SyntaxNode) -> SyntaxNode {
        let constructor = match self.cache.ty(node) {
            Some(TypeRef::String) => "Syntax.StringLiteral",
            Some(TypeRef::Char) => "Syntax.CharLiteral",
            Some(TypeRef::Int | TypeRef::Long) => "Syntax.IntLiteral",
            Some(TypeRef::Float | TypeRef::Double) => "Syntax.FloatLiteral",
            Some(TypeRef::Error) | None => return default_literal(),
            Some(ty) => {
                self.report(
                    Diagnostic::error(
                        DiagnosticCode::UnsupportedSerialization,
                        node.span(),
                        format!("a generation-time value of type `{ty}` cannot be used in generated code"),
                        CompilationPhase::Quoting,
                    )
                    .with_property("type", ty.to_string()),
                );
                return default_literal();
            }
        };
        make::call(
            "Syntax.LiteralExpression",
            [make::call(constructor, [node.clone()])],
        )
    }

    /// `Syntax.<Kind>(children...)`.
    fn structural(&mut self, node: &SyntaxNode) -> SyntaxNode {
        let mut arguments = Vec::with_capacity(node.children().len());
        for (index, child) in node.children().iter().enumerate() {
            let quoted = match child {
                SyntaxElement::Token(token) => quote_token(token),
                SyntaxElement::Node(child) if child.kind().is_statement() => {
                    self.embedded_statement(child)
                }
                SyntaxElement::Node(child)
                    if index == 0 && node.kind() == SyntaxKind::InvocationExpression =>
                {
                    self.quote_callee(child)
                }
                SyntaxElement::Node(child) => self.quote(child),
            };
            arguments.push(quoted);
        }
        make::call(&format!("Syntax.{}", node.kind()), arguments)
    }
}

/// `var __sN = Syntax.StatementList();`
fn statement_list(accumulator: &str) -> SyntaxNode {
    make::local_declaration(
        SyntaxToken::identifier(accumulator),
        Some(make::call("Syntax.StatementList", [])),
    )
}

fn form_path(form: DeferredCallForm) -> SyntaxNode {
    make::path(&format!("DeferredCallForm.{form}"))
}

/// Stand-in for a value that could not be produced; the cause is
/// reported elsewhere.
fn default_literal() -> SyntaxNode {
    make::call(
        "Syntax.LiteralExpression",
        [make::call(
            "Syntax.Token",
            [make::path("TokenKind.DefaultKeyword")],
        )],
    )
}

/// `Syntax.Token(TokenKind.X)`, with the text when it is not the
/// kind's fixed spelling.
fn quote_token(token: &SyntaxToken) -> SyntaxNode {
    let kind = make::path(&format!("TokenKind.{}", token.kind()));
    if token.is_canonical() {
        make::call("Syntax.Token", [kind])
    } else {
        make::call("Syntax.Token", [kind, make::string_literal(token.text())])
    }
}

/// Deferred calls may only initialize a lone variable or be returned.
fn is_deferred_position(node: &SyntaxNode, parents: &HashMap<NodeId, SyntaxNode>) -> bool {
    let Some(parent) = parents.get(&node.id()) else {
        return false;
    };
    match parent.kind() {
        SyntaxKind::ReturnStatement => true,
        SyntaxKind::VariableDeclarator => parents
            .get(&parent.id())
            .is_some_and(|declaration| declaration.child_nodes().count() == 1),
        _ => false,
    }
}
