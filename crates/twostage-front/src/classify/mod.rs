//! Binding-time classification.
//!
//! One recursive pass computes a [`Stage`] for every node of an annotated
//! tree. Stages flow bottom-up through [`Stage::combine`]; requirements
//! flow top-down through an immutable [`ScopeContext`]:
//!
//! * a member or method that only exists at generation time *forces* its
//!   receiver and arguments, and everything below a forced position ends up
//!   `GenerationTimeOnly`;
//! * an `if` or `foreach` whose condition is known at generation time stays
//!   host control flow, and its branches hold ordinary template code;
//! * any other `if` or `foreach` is generated, and locals assigned inside
//!   it are pinned to `GeneratedOnly`.
//!
//! A generation-time expression whose type is the `dynamic` placeholder is
//! a *splice*: it runs at generation time and produces generated code. It
//! is stamped `GeneratedOnly` with an [`Annotation::Splice`] mark.
//!
//! The pass is single and structural. A local declared without initializer
//! takes the combined stage of its assignment sites, visited ahead of time;
//! a local that depends on itself (`i = i + 1`) is seen as `Default`.

mod bindings;
mod context;

use std::collections::{HashMap, HashSet};

use twostage_core::{
    CompilationPhase, Diagnostic, DiagnosticCode, Symbol, SymbolKind, SymbolStageClassifier,
};
use twostage_syntax::printer::compact;
use twostage_syntax::{
    Annotation, NodeId, Stage, SyntaxElement, SyntaxKind, SyntaxNode, TokenKind,
};

use crate::annotate::AnnotationCache;
use bindings::LocalVariableBindings;
use context::ScopeContext;

/// A classified tree and what the classifier reported about it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Classification {
    pub tree: SyntaxNode,
    pub diagnostics: Vec<Diagnostic>,
}

impl Classification {
    pub fn has_errors(&self) -> bool {
        twostage_core::diagnostic::has_errors(&self.diagnostics)
    }
}

/// Stamps every node of `tree` with a stage.
///
/// Classifying an already classified tree returns it unchanged and reports
/// nothing.
pub fn classify(
    tree: &SyntaxNode,
    cache: &AnnotationCache,
    symbols: &dyn SymbolStageClassifier,
) -> Classification {
    let mut classifier = Classifier::new(tree, cache, symbols);
    classifier.visit(tree, &ScopeContext::default());
    let stamped = classifier.stamp(tree, Stage::Default);
    tracing::debug!(
        nodes = classifier.stages.len(),
        splices = classifier.splices.len(),
        diagnostics = classifier.diagnostics.len(),
        "classified tree"
    );
    Classification {
        tree: stamped,
        diagnostics: classifier.diagnostics,
    }
}

struct Classifier<'a> {
    cache: &'a AnnotationCache,
    symbols: &'a dyn SymbolStageClassifier,
    nodes: HashMap<NodeId, SyntaxNode>,
    parents: HashMap<NodeId, SyntaxNode>,
    stages: HashMap<NodeId, Stage>,
    splices: HashSet<NodeId>,
    bindings: LocalVariableBindings,
    diagnostics: Vec<Diagnostic>,
    reported: HashSet<(NodeId, DiagnosticCode)>,
}

impl<'a> Classifier<'a> {
    fn new(
        tree: &SyntaxNode,
        cache: &'a AnnotationCache,
        symbols: &'a dyn SymbolStageClassifier,
    ) -> Self {
        let mut nodes = HashMap::new();
        let mut parents = HashMap::new();
        for node in tree.descendants() {
            for child in node.child_nodes() {
                parents.insert(child.id(), node.clone());
            }
            nodes.insert(node.id(), node);
        }
        Self {
            cache,
            symbols,
            nodes,
            parents,
            stages: HashMap::new(),
            splices: HashSet::new(),
            bindings: LocalVariableBindings::default(),
            diagnostics: Vec::new(),
            reported: HashSet::new(),
        }
    }

    fn report(&mut self, node: &SyntaxNode, diagnostic: Diagnostic) {
        if self.reported.insert((node.id(), diagnostic.code)) {
            self.diagnostics.push(diagnostic);
        }
    }

    fn is_placeholder(&self, node: &SyntaxNode) -> bool {
        self.cache.ty(node).is_some_and(|ty| ty.is_placeholder())
    }

    fn symbol_stage(&self, symbol: &Symbol) -> Stage {
        self.symbols.classify_stage(symbol)
    }

    fn visit(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        if let Some(stage) = node.stage() {
            return stage;
        }
        let id = node.id();
        let expression = node.kind().is_expression();
        let forced = cx.is_forced() && expression;
        if let Some(&stage) = self.stages.get(&id) {
            if !forced || stage.is_generation_time() {
                return stage;
            }
        }

        if forced {
            if let Some(subject) = self.violation(node) {
                let reason = cx.forced_reason().unwrap_or_default().to_owned();
                self.report(
                    node,
                    Diagnostic::error(
                        DiagnosticCode::ForcedGenerationTimeViolated,
                        node.span(),
                        format!("{subject} is generated code but must be evaluated at generation time ({reason})"),
                        CompilationPhase::Classification,
                    )
                    .with_property("reason", reason),
                );
                self.force_subtree(node);
                return Stage::GenerationTimeOnly;
            }
        }

        let mut stage = self.compute(node, cx);
        if forced {
            stage = Stage::GenerationTimeOnly;
            self.splices.remove(&id);
        } else if expression && stage.is_generation_time() && self.is_placeholder(node) {
            self.splices.insert(id);
            stage = Stage::GeneratedOnly;
        }
        self.stages.insert(id, stage);
        stage
    }

    /// Why `node` cannot run at generation time, if it cannot.
    fn violation(&self, node: &SyntaxNode) -> Option<String> {
        if node.kind() == SyntaxKind::ThisExpression {
            return Some("`this`".to_string());
        }
        let symbol = self.cache.symbol(node);
        if let Some(symbol) = &symbol {
            if symbol.is_local() {
                // Locals are coerced unless they are already pinned.
                return (node.kind() == SyntaxKind::IdentifierName
                    && self.bindings.get(symbol) == Some(Stage::GeneratedOnly))
                .then(|| format!("local `{}`", symbol.name));
            }
            if self.symbol_stage(symbol).is_generated() {
                return Some(format!("`{symbol}`"));
            }
        }
        self.is_placeholder(node)
            .then(|| format!("`{}`", compact(node)))
    }

    fn force_subtree(&mut self, node: &SyntaxNode) {
        for descendant in node.descendants() {
            self.splices.remove(&descendant.id());
            self.stages
                .insert(descendant.id(), Stage::GenerationTimeOnly);
        }
    }

    fn visit_children(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Vec<Stage> {
        node.child_nodes().map(|child| self.visit(child, cx)).collect()
    }

    fn combine_children(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        Stage::combine(self.visit_children(node, cx))
    }

    fn compute(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        use SyntaxKind::*;
        match node.kind() {
            CompilationUnit | Template | Block | SwitchSection | ElseClause => {
                self.visit_children(node, cx);
                Stage::Default
            }
            EmptyStatement => Stage::Default,
            Parameter | TypeSyntax => {
                self.visit_children(node, cx);
                Stage::GenerationTimeOnly
            }
            LiteralExpression => Stage::GenerationTimeOnly,
            ThisExpression => Stage::GeneratedOnly,
            IdentifierName => self.identifier(node, cx),
            ParenthesizedExpression
            | PrefixUnaryExpression
            | BinaryExpression
            | ConditionalExpression
            | ElementAccessExpression
            | CastExpression
            | ListExpression
            | WhereClause
            | SelectClause
            | ExpressionStatement => self.combine_children(node, cx),
            MemberAccessExpression => self.member_access(node, cx),
            InvocationExpression => self.invocation(node, cx),
            AssignmentExpression | PostfixUnaryExpression => self.assignment(node, cx),
            LocalDeclaration => self.local_declaration(node, cx),
            VariableDeclarator => self.declarator(node, cx),
            IfStatement => self.if_statement(node, cx),
            ForEachStatement => self.foreach_statement(node, cx),
            ReturnStatement | YieldReturnStatement | YieldBreakStatement => {
                self.visit_children(node, cx);
                Stage::GeneratedOnly
            }
            BreakStatement | ContinueStatement => self.jump(node, cx),
            WhileStatement | DoStatement | ForStatement | GotoStatement | SwitchStatement
            | LockStatement | LocalFunction | UsingStatement | LambdaExpression
            | QueryExpression | AwaitExpression => {
                self.unsupported(node, construct_name(node.kind()), cx)
            }
        }
    }

    fn unsupported(&mut self, node: &SyntaxNode, construct: &str, cx: &ScopeContext) -> Stage {
        self.report(
            node,
            Diagnostic::error(
                DiagnosticCode::UnsupportedConstruct,
                node.span(),
                format!("`{construct}` is not supported in templates"),
                CompilationPhase::Classification,
            )
            .with_property("construct", construct),
        );
        self.visit_children(node, cx);
        Stage::Default
    }

    fn jump(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        if let Some(reason) = cx.loop_crossed() {
            let jump = if node.kind() == SyntaxKind::BreakStatement {
                "break"
            } else {
                "continue"
            };
            self.report(
                node,
                Diagnostic::error(
                    DiagnosticCode::GenerationTimeJumpInGeneratedBranch,
                    node.span(),
                    format!(
                        "`{jump}` leaves a generation-time loop from under {reason}, which is only known in generated code"
                    ),
                    CompilationPhase::Classification,
                )
                .with_property("jump", jump)
                .with_property("reason", reason),
            );
        }
        cx.loop_stage()
    }

    fn identifier(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let Some(symbol) = self.cache.symbol(node) else {
            return Stage::Default;
        };
        if !symbol.is_local() {
            return self.symbol_stage(&symbol);
        }
        if self.bindings.is_pending(&symbol) {
            return Stage::Default;
        }
        match self.bindings.get(&symbol) {
            Some(Stage::Default) | None if cx.is_forced() => {
                self.bindings.record(symbol, Stage::GenerationTimeOnly);
                Stage::GenerationTimeOnly
            }
            Some(stage) => stage,
            None => Stage::Default,
        }
    }

    fn member_access(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let Some(receiver) = node.child_node(0) else {
            return Stage::Default;
        };
        let member = self
            .cache
            .symbol(node)
            .map(|symbol| (self.symbol_stage(&symbol), symbol));
        match member {
            Some((Stage::GenerationTimeOnly, symbol)) => {
                let forced = cx.force(|| format!("receiver of generation-time member `{symbol}`"));
                self.visit(receiver, &forced);
                Stage::GenerationTimeOnly
            }
            Some((Stage::GeneratedOnly, _)) => {
                self.visit(receiver, cx);
                Stage::GeneratedOnly
            }
            _ => self.visit(receiver, cx),
        }
    }

    /// A type or namespace name used as a receiver, which has no value.
    fn is_type_reference(&self, node: &SyntaxNode) -> bool {
        node.kind() == SyntaxKind::IdentifierName
            && self.cache.symbol(node).is_some_and(|symbol| {
                matches!(symbol.kind, SymbolKind::Type | SymbolKind::Namespace)
                    && self.symbol_stage(&symbol) == Stage::Default
            })
    }

    fn invocation(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let mut children = node.child_nodes();
        let Some(callee) = children.next() else {
            return Stage::Default;
        };
        let arguments: Vec<&SyntaxNode> = children.collect();
        let Some(method) = self.cache.symbol(node) else {
            return self.combine_children(node, cx);
        };
        if method.is_deferred_call() {
            self.visit_children(node, cx);
            return Stage::GeneratedOnly;
        }
        match self.symbol_stage(&method) {
            Stage::GenerationTimeOnly => {
                self.visit(callee, cx);
                let forced = cx.force(|| format!("argument of generation-time method `{method}`"));
                for argument in arguments {
                    self.visit(argument, &forced);
                }
                Stage::GenerationTimeOnly
            }
            Stage::GeneratedOnly => {
                self.visit_children(node, cx);
                Stage::GeneratedOnly
            }
            Stage::Default | Stage::Conflict => {
                let callee_stage = self.visit(callee, cx);
                let contributes = callee.kind() == SyntaxKind::MemberAccessExpression
                    && !callee
                        .child_node(0)
                        .is_some_and(|receiver| self.is_type_reference(receiver));
                let mut stages: Vec<Stage> = Vec::new();
                if contributes {
                    stages.push(callee_stage);
                }
                for argument in arguments {
                    stages.push(self.visit(argument, cx));
                }
                Stage::combine(stages)
            }
        }
    }

    /// The local written by an assignment or `++`/`--`, if the target is one.
    fn assigned_local(&self, node: &SyntaxNode) -> Option<Symbol> {
        let target = node.child_node(0)?;
        if target.kind() != SyntaxKind::IdentifierName {
            return None;
        }
        self.cache.symbol(target).filter(Symbol::is_local)
    }

    fn assignment(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let local = self.assigned_local(node);
        if let (Some(local), Some(reason)) = (&local, cx.generated_condition()) {
            if self.bindings.get(local) == Some(Stage::GenerationTimeOnly) {
                self.report(
                    node,
                    Diagnostic::error(
                        DiagnosticCode::GenerationTimeAssignedInGeneratedBranch,
                        node.span(),
                        format!(
                            "generation-time local `{}` is assigned under {reason}, which is only known in generated code",
                            local.name
                        ),
                        CompilationPhase::Classification,
                    )
                    .with_property("local", &*local.name)
                    .with_property("reason", reason),
                );
            }
            self.bindings.record(local.clone(), Stage::GeneratedOnly);
            self.visit_children(node, cx);
            return Stage::GeneratedOnly;
        }

        if let Some(local) = local.filter(|local| {
            self.bindings.get(local) == Some(Stage::GenerationTimeOnly)
        }) {
            let mut children = node.child_nodes();
            if let Some(target) = children.next() {
                self.visit(target, cx);
            }
            let forced = cx.force(|| format!("assigned to generation-time local `{}`", local.name));
            for value in children {
                self.visit(value, &forced);
            }
            return Stage::GenerationTimeOnly;
        }
        self.combine_children(node, cx)
    }

    fn local_declaration(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let stages = self.visit_children(node, cx);
        let generation_time = stages.iter().filter(|stage| stage.is_generation_time()).count();
        if generation_time > 0 && generation_time < stages.len() {
            let names: Vec<&str> = node.child_nodes().filter_map(SyntaxNode::name).collect();
            self.report(
                node,
                Diagnostic::error(
                    DiagnosticCode::AmbiguousVariableStage,
                    node.span(),
                    "this declaration mixes generation-time and generated variables; declare them separately",
                    CompilationPhase::Classification,
                )
                .with_property("variables", names.join(", ")),
            );
        }
        Stage::combine(stages)
    }

    fn declarator(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let Some(local) = self.cache.declared_symbol(node) else {
            return self.combine_children(node, cx);
        };
        if cx.generated_condition().is_some() {
            self.visit_children(node, cx);
            self.bindings.record(local, Stage::GeneratedOnly);
            return Stage::GeneratedOnly;
        }
        if let Some(initializer) = node.child_node(0) {
            let stage = self.visit(initializer, cx);
            self.bindings.record(local, stage);
            return stage;
        }
        if !self.bindings.begin(&local) {
            return Stage::Default;
        }
        let stage = self.stage_from_assignments(&local);
        self.bindings.finish(&local, stage);
        stage
    }

    /// Combined stage of the values assigned to `local` anywhere in the tree.
    fn stage_from_assignments(&mut self, local: &Symbol) -> Stage {
        let root = ScopeContext::default();
        let mut stages = Vec::new();
        for site in self.cache.assignment_sites(local) {
            let Some(site) = self.nodes.get(&site).cloned() else {
                continue;
            };
            if self.under_generated_condition(&site) {
                return Stage::GeneratedOnly;
            }
            if site.kind() == SyntaxKind::AssignmentExpression {
                if let Some(value) = site.child_node(1) {
                    stages.push(self.visit(value, &root));
                }
            }
        }
        Stage::combine(stages)
    }

    /// Whether `node` sits in a branch or loop body selected at run time.
    fn under_generated_condition(&mut self, node: &SyntaxNode) -> bool {
        let root = ScopeContext::default();
        let mut child = node.clone();
        while let Some(parent) = self.parents.get(&child.id()).cloned() {
            let selector = match parent.kind() {
                SyntaxKind::IfStatement | SyntaxKind::ForEachStatement => parent.child_node(0).cloned(),
                _ => None,
            };
            if let Some(selector) = selector {
                if selector.id() != child.id() && !self.visit(&selector, &root).is_generation_time() {
                    return true;
                }
            }
            child = parent;
        }
        false
    }

    fn if_statement(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        let mut children = node.child_nodes();
        let Some(condition) = children.next() else {
            return Stage::Default;
        };
        let (stage, branch_cx) = if self.visit(condition, cx).is_generation_time() {
            (Stage::GenerationTimeOnly, cx.clone())
        } else {
            let branch_cx =
                cx.under_generated_condition(|| format!("the condition `{}`", compact(condition)));
            (Stage::GeneratedOnly, branch_cx)
        };
        for branch in children {
            if branch.kind() == SyntaxKind::ElseClause {
                self.stages.insert(branch.id(), stage);
                self.visit_children(branch, &branch_cx);
            } else {
                self.visit(branch, &branch_cx);
            }
        }
        stage
    }

    fn foreach_statement(&mut self, node: &SyntaxNode, cx: &ScopeContext) -> Stage {
        if node.token_of_kind(TokenKind::AwaitKeyword).is_some() {
            return self.unsupported(node, "await foreach", cx);
        }
        let mut children = node.child_nodes();
        let (Some(source), Some(body)) = (children.next(), children.next()) else {
            return Stage::Default;
        };
        let stage = if self.visit(source, cx).is_generation_time() {
            Stage::GenerationTimeOnly
        } else {
            Stage::GeneratedOnly
        };
        if let Some(variable) = self.cache.declared_symbol(node) {
            self.bindings.record(variable, stage);
        }
        let body_cx = if stage.is_generation_time() {
            cx.in_loop(stage)
        } else {
            cx.under_generated_condition(|| format!("the loop over `{}`", compact(source)))
                .in_loop(stage)
        };
        self.visit(body, &body_cx);
        stage
    }

    /// Rebuilds `node` with every computed stage and splice mark applied.
    /// Nodes that were never visited inherit the stage of their parent.
    fn stamp(&self, node: &SyntaxNode, inherited: Stage) -> SyntaxNode {
        let stage = self
            .stages
            .get(&node.id())
            .copied()
            .or(node.stage())
            .unwrap_or(inherited);
        let mut changed = false;
        let children: Vec<SyntaxElement> = node
            .children()
            .iter()
            .map(|child| match child {
                SyntaxElement::Node(child) => {
                    let stamped = self.stamp(child, stage);
                    changed |= !stamped.ptr_eq(child);
                    SyntaxElement::Node(stamped)
                }
                SyntaxElement::Token(token) => SyntaxElement::Token(token.clone()),
            })
            .collect();
        let rebuilt = if changed {
            node.with_children(children)
        } else {
            node.clone()
        };
        let stamped = rebuilt.with_stage(stage);
        if self.splices.contains(&node.id()) {
            stamped.with_annotation(Annotation::Splice)
        } else {
            stamped
        }
    }
}

fn construct_name(kind: SyntaxKind) -> &'static str {
    use SyntaxKind::*;
    match kind {
        WhileStatement => "while",
        DoStatement => "do",
        ForStatement => "for",
        GotoStatement => "goto",
        SwitchStatement => "switch",
        LockStatement => "lock",
        LocalFunction => "local function",
        UsingStatement => "using",
        LambdaExpression => "lambda",
        QueryExpression => "query",
        AwaitExpression => "await",
        kind => kind.name(),
    }
}
