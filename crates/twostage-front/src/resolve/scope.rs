//! Lexical resolution of template parameters and locals, and expression
//! typing against an [`Environment`].

use std::collections::HashMap;
use std::sync::Arc;

use twostage_core::{Resolution, SemanticResolver, Symbol, SymbolId, SymbolKind, TypeRef};
use twostage_syntax::{NodeId, SyntaxKind, SyntaxNode, TokenKind};

use super::Environment;

/// Resolver over one parsed tree.
///
/// All facts are computed up front by a single walk; [`SemanticResolver::resolve`]
/// is a lookup by node id, so it works on any rewrite of the same tree.
#[derive(Debug, Default)]
pub struct ScopeResolver {
    resolutions: HashMap<NodeId, Resolution>,
}

impl ScopeResolver {
    pub fn new(environment: &Environment, tree: &SyntaxNode) -> Self {
        let mut walker = Walker::new(environment);
        walker.walk(tree);
        tracing::trace!(
            resolved = walker.resolutions.len(),
            locals = walker.locals.len(),
            "resolved template scopes"
        );
        Self {
            resolutions: walker.resolutions,
        }
    }
}

impl SemanticResolver for ScopeResolver {
    fn resolve(&self, node: &SyntaxNode) -> Resolution {
        self.resolutions.get(&node.id()).cloned().unwrap_or_default()
    }
}

struct Local {
    symbol: Symbol,
    /// `None` until the first assignment of a declarator without initializer.
    ty: Option<TypeRef>,
}

struct Walker<'a> {
    environment: &'a Environment,
    /// Ids of globals (`name`) and members (`Owner.name`), in manifest order.
    member_ids: HashMap<String, SymbolId>,
    scopes: Vec<HashMap<Arc<str>, SymbolId>>,
    locals: HashMap<SymbolId, Local>,
    next_id: u32,
    resolutions: HashMap<NodeId, Resolution>,
}

impl<'a> Walker<'a> {
    fn new(environment: &'a Environment) -> Self {
        let globals = environment.globals.keys().cloned();
        let members = environment.types.iter().flat_map(|(owner, members)| {
            members.keys().map(move |name| format!("{owner}.{name}"))
        });
        let member_ids: HashMap<_, _> = globals
            .chain(members)
            .zip(0..)
            .map(|(key, id)| (key, SymbolId(id)))
            .collect();
        let next_id = member_ids.len() as u32;
        Self {
            environment,
            member_ids,
            scopes: vec![HashMap::new()],
            locals: HashMap::new(),
            next_id,
            resolutions: HashMap::new(),
        }
    }

    fn record(&mut self, node: &SyntaxNode, resolution: Resolution) {
        if !resolution.is_empty() {
            self.resolutions.insert(node.id(), resolution);
        }
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, ty: Option<TypeRef>) -> Symbol {
        let id = SymbolId(self.next_id);
        self.next_id += 1;
        let symbol = Symbol::new(id, name, kind);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(symbol.name.clone(), id);
        }
        self.locals.insert(
            id,
            Local {
                symbol: symbol.clone(),
                ty,
            },
        );
        symbol
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(HashMap::new());
        f(self);
        self.scopes.pop();
    }

    fn walk_children(&mut self, node: &SyntaxNode) {
        for child in node.child_nodes() {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: &SyntaxNode) {
        match node.kind() {
            kind if kind.is_expression() => {
                self.expression(node);
            }
            SyntaxKind::Template | SyntaxKind::LocalFunction => {
                if let Some(name) = node.name() {
                    let kind = if node.kind() == SyntaxKind::Template {
                        SymbolKind::Template
                    } else {
                        SymbolKind::Local
                    };
                    let declared = self.declare(name, kind, Some(TypeRef::Object));
                    self.record(
                        node,
                        Resolution {
                            declared: Some(declared),
                            ..Resolution::default()
                        },
                    );
                }
                self.scoped(|this| this.walk_children(node));
            }
            SyntaxKind::Parameter => {
                let ty = node
                    .child_node_of_kind(SyntaxKind::TypeSyntax)
                    .and_then(|ty| ty.token())
                    .map_or(TypeRef::Object, |token| {
                        token.text().parse().unwrap_or(TypeRef::Error)
                    });
                let Some(name) = node.name() else { return };
                let declared = self.declare(name, SymbolKind::Parameter, Some(ty.clone()));
                self.record(
                    node,
                    Resolution {
                        declared: Some(declared),
                        ty: Some(ty),
                        ..Resolution::default()
                    },
                );
            }
            SyntaxKind::Block | SyntaxKind::ForStatement | SyntaxKind::UsingStatement => {
                self.scoped(|this| this.walk_children(node));
            }
            SyntaxKind::VariableDeclarator => {
                let initializer = node.child_node(0).map(|value| self.expression(value));
                let Some(name) = node.name() else { return };
                let declared = self.declare(name, SymbolKind::Local, initializer.clone());
                self.record(
                    node,
                    Resolution {
                        declared: Some(declared),
                        ty: initializer,
                        ..Resolution::default()
                    },
                );
            }
            SyntaxKind::ForEachStatement => {
                let mut children = node.child_nodes();
                let source = children.next().map(|source| self.expression(source));
                let body = children.next();
                let element = match source {
                    Some(TypeRef::Placeholder) => TypeRef::Placeholder,
                    Some(ty) => ty.element().cloned().unwrap_or(TypeRef::Error),
                    None => TypeRef::Error,
                };
                self.scoped(|this| {
                    if let Some(name) = node.name() {
                        let declared = this.declare(name, SymbolKind::Local, Some(element.clone()));
                        this.record(
                            node,
                            Resolution {
                                declared: Some(declared),
                                ty: Some(element),
                                ..Resolution::default()
                            },
                        );
                    }
                    if let Some(body) = body {
                        this.walk(body);
                    }
                });
            }
            _ => self.walk_children(node),
        }
    }

    fn lookup(&self, name: &str) -> Option<(Symbol, TypeRef)> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                let local = &self.locals[id];
                let ty = local.ty.clone().unwrap_or(TypeRef::Object);
                return Some((local.symbol.clone(), ty));
            }
        }
        let spec = self.environment.global(name)?;
        let id = self.member_ids.get(name).copied()?;
        let mut symbol = Symbol::new(id, name, spec.kind);
        if let Some(form) = spec.deferred {
            symbol = symbol.with_deferred(form);
        }
        Some((symbol, spec.type_ref()))
    }

    fn member(&self, receiver: &TypeRef, name: &str) -> Option<(Symbol, TypeRef)> {
        let (owner, spec) = self.environment.member(receiver, name)?;
        let id = self.member_ids.get(&format!("{owner}.{name}")).copied()?;
        let mut symbol = Symbol::new(id, name, spec.kind).with_container(owner);
        if let Some(form) = spec.deferred {
            symbol = symbol.with_deferred(form);
        }
        Some((symbol, spec.type_ref()))
    }

    /// Resolves an expression and returns its type.
    fn expression(&mut self, node: &SyntaxNode) -> TypeRef {
        let (symbol, ty) = self.expression_facts(node);
        self.record(
            node,
            Resolution {
                symbol,
                declared: None,
                ty: Some(ty.clone()),
            },
        );
        ty
    }

    fn operand(&mut self, node: &SyntaxNode, index: usize) -> TypeRef {
        match node.child_node(index) {
            Some(child) => self.expression(child),
            None => TypeRef::Error,
        }
    }

    fn expression_facts(&mut self, node: &SyntaxNode) -> (Option<Symbol>, TypeRef) {
        match node.kind() {
            SyntaxKind::LiteralExpression => {
                let ty = match node.token().map(|token| token.kind()) {
                    Some(TokenKind::IntLiteral) => TypeRef::Int,
                    Some(TokenKind::FloatLiteral) => TypeRef::Double,
                    Some(TokenKind::StringLiteral) => TypeRef::String,
                    Some(TokenKind::CharLiteral) => TypeRef::Char,
                    Some(TokenKind::TrueKeyword | TokenKind::FalseKeyword) => TypeRef::Bool,
                    _ => TypeRef::Object,
                };
                (None, ty)
            }
            SyntaxKind::IdentifierName => match node.name().and_then(|name| self.lookup(name)) {
                Some((symbol, ty)) => (Some(symbol), ty),
                None => (None, TypeRef::Error),
            },
            SyntaxKind::ThisExpression => (None, TypeRef::Placeholder),
            SyntaxKind::ParenthesizedExpression => (None, self.operand(node, 0)),
            SyntaxKind::BinaryExpression => {
                let lhs = self.operand(node, 0);
                let rhs = self.operand(node, 1);
                let operator = node.token().map(|token| token.kind());
                (None, binary_type(operator, &lhs, &rhs))
            }
            SyntaxKind::PrefixUnaryExpression => {
                let operand = self.operand(node, 0);
                let ty = match node.token().map(|token| token.kind()) {
                    _ if operand.is_placeholder() => TypeRef::Placeholder,
                    Some(TokenKind::Bang) => TypeRef::Bool,
                    _ => operand,
                };
                (None, ty)
            }
            SyntaxKind::PostfixUnaryExpression => (None, self.operand(node, 0)),
            SyntaxKind::AssignmentExpression => {
                let value = self.operand(node, 1);
                if let Some(target) = node.child_node(0) {
                    self.refine(target, &value);
                }
                (None, self.operand(node, 0))
            }
            SyntaxKind::ConditionalExpression => {
                self.operand(node, 0);
                let when_true = self.operand(node, 1);
                let when_false = self.operand(node, 2);
                let ty = if when_true.is_placeholder() || when_false.is_placeholder() {
                    TypeRef::Placeholder
                } else {
                    when_true
                };
                (None, ty)
            }
            SyntaxKind::InvocationExpression => {
                let mut children = node.child_nodes();
                let Some(callee) = children.next() else {
                    return (None, TypeRef::Error);
                };
                let returns = self.expression(callee);
                for argument in children {
                    self.expression(argument);
                }
                let symbol = self
                    .resolutions
                    .get(&callee.id())
                    .and_then(|callee| callee.symbol.clone())
                    .filter(|symbol| symbol.kind == SymbolKind::Method);
                let ty = if symbol.is_some() || returns.is_placeholder() {
                    returns
                } else {
                    TypeRef::Object
                };
                (symbol, ty)
            }
            SyntaxKind::MemberAccessExpression => {
                let receiver = self.operand(node, 0);
                if receiver.is_placeholder() {
                    return (None, TypeRef::Placeholder);
                }
                match node.name().and_then(|name| self.member(&receiver, name)) {
                    Some((symbol, ty)) => (Some(symbol), ty),
                    None => (None, TypeRef::Error),
                }
            }
            SyntaxKind::ElementAccessExpression => {
                let receiver = self.operand(node, 0);
                self.operand(node, 1);
                let ty = match receiver {
                    TypeRef::Placeholder => TypeRef::Placeholder,
                    TypeRef::String => TypeRef::Char,
                    TypeRef::List(element) => *element,
                    _ => TypeRef::Error,
                };
                (None, ty)
            }
            SyntaxKind::CastExpression => {
                let ty = node
                    .child_node_of_kind(SyntaxKind::TypeSyntax)
                    .and_then(|ty| ty.token())
                    .and_then(|token| token.text().parse().ok())
                    .unwrap_or(TypeRef::Error);
                self.operand(node, 1);
                (None, ty)
            }
            SyntaxKind::ListExpression => {
                let elements: Vec<TypeRef> = node
                    .child_nodes()
                    .map(|element| self.expression(element))
                    .collect();
                let element = elements.into_iter().next().unwrap_or(TypeRef::Object);
                (None, TypeRef::List(Box::new(element)))
            }
            SyntaxKind::LambdaExpression => {
                self.scoped(|this| {
                    for child in node.child_nodes() {
                        match child.kind() {
                            SyntaxKind::Parameter => {
                                if let Some(name) = child.name() {
                                    let declared = this.declare(name, SymbolKind::Local, None);
                                    this.record(
                                        child,
                                        Resolution {
                                            declared: Some(declared),
                                            ..Resolution::default()
                                        },
                                    );
                                }
                            }
                            _ => this.walk(child),
                        }
                    }
                });
                (None, TypeRef::Object)
            }
            SyntaxKind::AwaitExpression => {
                let operand = self.operand(node, 0);
                (None, operand.unwrap_awaitable().clone())
            }
            SyntaxKind::QueryExpression => {
                let source = self.operand(node, 0);
                let mut selected = TypeRef::Object;
                self.scoped(|this| {
                    if let Some(name) = node.name() {
                        let element = source.element().cloned().unwrap_or(TypeRef::Object);
                        this.declare(name, SymbolKind::Local, Some(element));
                    }
                    for clause in node.child_nodes().skip(1) {
                        let ty = this.operand(clause, 0);
                        if clause.kind() == SyntaxKind::SelectClause {
                            selected = ty;
                        }
                    }
                });
                (None, TypeRef::Sequence(Box::new(selected)))
            }
            kind => unreachable!("{kind} is not an expression"),
        }
    }

    /// Gives an untyped local the type of its first assigned value.
    fn refine(&mut self, target: &SyntaxNode, value: &TypeRef) {
        if target.kind() != SyntaxKind::IdentifierName {
            return;
        }
        let Some(name) = target.name() else { return };
        let Some(id) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) else {
            return;
        };
        if let Some(local) = self.locals.get_mut(id) {
            local.ty.get_or_insert_with(|| value.clone());
        }
    }
}

fn binary_type(operator: Option<TokenKind>, lhs: &TypeRef, rhs: &TypeRef) -> TypeRef {
    use TokenKind::*;
    if lhs.is_placeholder() || rhs.is_placeholder() {
        return TypeRef::Placeholder;
    }
    match operator {
        Some(
            EqualsEquals | BangEquals | Less | Greater | LessEquals | GreaterEquals
            | AmpersandAmpersand | BarBar,
        ) => TypeRef::Bool,
        Some(Plus) if *lhs == TypeRef::String || *rhs == TypeRef::String => TypeRef::String,
        _ => TypeRef::promote(lhs, rhs).unwrap_or(TypeRef::Error),
    }
}

#[cfg(test)]
mod tests {
    use twostage_syntax::parse_compilation_unit;

    use super::*;

    fn resolve_all(source: &str) -> (SyntaxNode, ScopeResolver) {
        let tree = parse_compilation_unit(source).unwrap();
        let resolver = ScopeResolver::new(&Environment::standard(), &tree);
        (tree, resolver)
    }

    fn expression_types(source: &str) -> Vec<String> {
        let (tree, resolver) = resolve_all(source);
        tree.descendants()
            .filter(|node| node.kind() == SyntaxKind::ExpressionStatement)
            .filter_map(|statement| statement.child_node(0).cloned())
            .map(|expression| {
                resolver
                    .resolve(&expression)
                    .ty
                    .map_or("-".to_string(), |ty| ty.to_string())
            })
            .collect()
    }

    #[test]
    fn test_expression_types() {
        let types = expression_types(
            r#"template T(string s, int n) {
                s + n;
                n * 2.5;
                n < 3;
                meta.Target.Parameters;
                meta.Target.Parameters[0].Value;
                meta.This.Anything(1);
                s[0];
                (long)n;
                Console.WriteLine(s);
                unknown;
            }"#,
        );
        assert_eq!(
            types,
            vec![
                "string",
                "double",
                "bool",
                "List<Parameter>",
                "dynamic",
                "dynamic",
                "char",
                "long",
                "void",
                "?",
            ]
        );
    }

    #[test]
    fn test_shadowing_and_scopes() {
        let (tree, resolver) = resolve_all(
            "template T(int x) { { var x = \"inner\"; x; } x; }",
        );
        let references: Vec<_> = tree
            .descendants()
            .filter(|node| node.kind() == SyntaxKind::IdentifierName)
            .map(|node| resolver.resolve(&node))
            .collect();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].symbol.as_ref().unwrap().kind, SymbolKind::Local);
        assert_eq!(references[0].ty, Some(TypeRef::String));
        assert_eq!(references[1].symbol.as_ref().unwrap().kind, SymbolKind::Parameter);
        assert_eq!(references[1].ty, Some(TypeRef::Int));
    }

    #[test]
    fn test_untyped_local_takes_first_assignment() {
        let types = expression_types("template T() { var a; a = \"s\"; a; a = 1; a; }");
        assert_eq!(types, vec!["string", "string", "string", "string"]);
    }

    #[test]
    fn test_foreach_variable_type() {
        let (tree, resolver) = resolve_all(
            "template T() { foreach (var p in meta.Target.Parameters) { p.Name; } }",
        );
        let foreach = tree
            .descendants()
            .find(|node| node.kind() == SyntaxKind::ForEachStatement)
            .unwrap();
        let declared = resolver.resolve(&foreach);
        assert_eq!(declared.declared.unwrap().kind, SymbolKind::Local);
        assert_eq!(declared.ty, Some(TypeRef::Named("Parameter".into())));
        let name = tree
            .descendants()
            .find(|node| {
                node.kind() == SyntaxKind::MemberAccessExpression && node.name() == Some("Name")
            })
            .unwrap();
        assert_eq!(resolver.resolve(&name).ty, Some(TypeRef::String));
    }

    #[test]
    fn test_deferred_call_symbol() {
        let (tree, resolver) = resolve_all("template T() { var r = meta.ProceedAsync(); }");
        let call = tree
            .descendants()
            .find(|node| node.kind() == SyntaxKind::InvocationExpression)
            .unwrap();
        let resolution = resolver.resolve(&call);
        let symbol = resolution.symbol.unwrap();
        assert!(symbol.is_deferred_call());
        assert_eq!(symbol.to_string(), "Meta.ProceedAsync");
        assert_eq!(resolution.ty, Some(TypeRef::Placeholder));
    }

    #[test]
    fn test_member_ids_are_deterministic() {
        let (first_tree, first) = resolve_all("template T() { Console.WriteLine(1); }");
        let (second_tree, second) = resolve_all("template U() { var a = 1; Console.WriteLine(a); }");
        let symbol = |tree: &SyntaxNode, resolver: &ScopeResolver| {
            tree.descendants()
                .find(|node| node.kind() == SyntaxKind::InvocationExpression)
                .and_then(|call| resolver.resolve(&call).symbol)
                .unwrap()
        };
        assert_eq!(symbol(&first_tree, &first), symbol(&second_tree, &second));
    }
}
