//! Constructors for synthesized nodes.
//!
//! Every node built here has a fresh id and no source position.

use crate::kind::{SyntaxKind, TokenKind};
use crate::node::{SyntaxElement, SyntaxNode, SyntaxToken};
use crate::span::Span;

pub fn node(kind: SyntaxKind, children: impl IntoIterator<Item = SyntaxElement>) -> SyntaxNode {
    SyntaxNode::synthesized(kind, children.into_iter().collect())
}

fn nodes(children: impl IntoIterator<Item = SyntaxNode>) -> impl Iterator<Item = SyntaxElement> {
    children.into_iter().map(SyntaxElement::from)
}

pub fn token(kind: TokenKind, text: &str) -> SyntaxToken {
    SyntaxToken::new(kind, text, Span::detached())
}

pub fn identifier_name(name: &str) -> SyntaxNode {
    identifier_name_from(SyntaxToken::identifier(name))
}

pub fn identifier_name_from(token: SyntaxToken) -> SyntaxNode {
    node(SyntaxKind::IdentifierName, [token.into()])
}

/// `a.b.c` as nested member accesses.
pub fn path(dotted: &str) -> SyntaxNode {
    let mut segments = dotted.split('.');
    let first = segments.next().unwrap_or_default();
    segments.fold(identifier_name(first), member_access)
}

pub fn member_access(receiver: SyntaxNode, name: &str) -> SyntaxNode {
    node(
        SyntaxKind::MemberAccessExpression,
        [receiver.into(), SyntaxToken::identifier(name).into()],
    )
}

pub fn invocation(callee: SyntaxNode, arguments: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    node(
        SyntaxKind::InvocationExpression,
        std::iter::once(callee.into()).chain(nodes(arguments)),
    )
}

/// `Dotted.Path(arguments)`.
pub fn call(dotted: &str, arguments: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    invocation(path(dotted), arguments)
}

pub fn literal(token: SyntaxToken) -> SyntaxNode {
    node(SyntaxKind::LiteralExpression, [token.into()])
}

pub fn string_literal(value: &str) -> SyntaxNode {
    literal(token(TokenKind::StringLiteral, value))
}

pub fn int_literal(value: i64) -> SyntaxNode {
    literal(token(TokenKind::IntLiteral, &value.to_string()))
}

pub fn keyword_literal(kind: TokenKind) -> SyntaxNode {
    literal(SyntaxToken::canonical(kind))
}

pub fn this_expression() -> SyntaxNode {
    node(SyntaxKind::ThisExpression, [])
}

pub fn parenthesized(inner: SyntaxNode) -> SyntaxNode {
    node(SyntaxKind::ParenthesizedExpression, [inner.into()])
}

pub fn binary(lhs: SyntaxNode, operator: TokenKind, rhs: SyntaxNode) -> SyntaxNode {
    node(
        SyntaxKind::BinaryExpression,
        [
            lhs.into(),
            SyntaxToken::canonical(operator).into(),
            rhs.into(),
        ],
    )
}

/// `target = value`
pub fn assignment(target: SyntaxNode, value: SyntaxNode) -> SyntaxNode {
    node(
        SyntaxKind::AssignmentExpression,
        [
            target.into(),
            SyntaxToken::canonical(TokenKind::Equals).into(),
            value.into(),
        ],
    )
}

pub fn type_syntax(name: &str) -> SyntaxNode {
    node(SyntaxKind::TypeSyntax, [token(TokenKind::TypeName, name).into()])
}

pub fn cast(ty: &str, operand: SyntaxNode) -> SyntaxNode {
    let operand = match operand.kind() {
        SyntaxKind::LiteralExpression
        | SyntaxKind::IdentifierName
        | SyntaxKind::ParenthesizedExpression
        | SyntaxKind::InvocationExpression
        | SyntaxKind::MemberAccessExpression
        | SyntaxKind::ElementAccessExpression => operand,
        _ => parenthesized(operand),
    };
    node(SyntaxKind::CastExpression, [type_syntax(ty).into(), operand.into()])
}

pub fn await_expression(operand: SyntaxNode) -> SyntaxNode {
    node(SyntaxKind::AwaitExpression, [operand.into()])
}

pub fn parameter(ty: Option<&str>, name: &str) -> SyntaxNode {
    let mut children: Vec<SyntaxElement> = Vec::new();
    if let Some(ty) = ty {
        children.push(type_syntax(ty).into());
    }
    children.push(SyntaxToken::identifier(name).into());
    node(SyntaxKind::Parameter, children)
}

/// A lambda without parameters whose body is `body`.
pub fn thunk(body: SyntaxNode) -> SyntaxNode {
    node(SyntaxKind::LambdaExpression, [body.into()])
}

pub fn block(statements: impl IntoIterator<Item = SyntaxNode>) -> SyntaxNode {
    node(SyntaxKind::Block, nodes(statements))
}

pub fn expression_statement(expression: SyntaxNode) -> SyntaxNode {
    node(SyntaxKind::ExpressionStatement, [expression.into()])
}

pub fn declarator(name: SyntaxToken, initializer: Option<SyntaxNode>) -> SyntaxNode {
    node(
        SyntaxKind::VariableDeclarator,
        std::iter::once(name.into()).chain(nodes(initializer)),
    )
}

/// `var name = initializer;`
pub fn local_declaration(name: SyntaxToken, initializer: Option<SyntaxNode>) -> SyntaxNode {
    node(
        SyntaxKind::LocalDeclaration,
        [declarator(name, initializer).into()],
    )
}

pub fn return_statement(value: Option<SyntaxNode>) -> SyntaxNode {
    node(SyntaxKind::ReturnStatement, nodes(value))
}

pub fn yield_return(value: SyntaxNode) -> SyntaxNode {
    node(SyntaxKind::YieldReturnStatement, [value.into()])
}

pub fn yield_break() -> SyntaxNode {
    node(SyntaxKind::YieldBreakStatement, [])
}

pub fn if_statement(
    condition: SyntaxNode,
    then_branch: SyntaxNode,
    else_branch: Option<SyntaxNode>,
) -> SyntaxNode {
    let else_clause = else_branch.map(|body| node(SyntaxKind::ElseClause, [body.into()]));
    node(
        SyntaxKind::IfStatement,
        nodes([condition, then_branch].into_iter().chain(else_clause)),
    )
}

pub fn while_statement(condition: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
    node(SyntaxKind::WhileStatement, [condition.into(), body.into()])
}

pub fn foreach_statement(
    awaited: bool,
    variable: SyntaxToken,
    source: SyntaxNode,
    body: SyntaxNode,
) -> SyntaxNode {
    let mut children: Vec<SyntaxElement> = Vec::new();
    if awaited {
        children.push(SyntaxToken::canonical(TokenKind::AwaitKeyword).into());
    }
    children.extend([variable.into(), source.into(), body.into()]);
    node(SyntaxKind::ForEachStatement, children)
}

pub fn using_statement(awaited: bool, declaration: SyntaxNode, body: SyntaxNode) -> SyntaxNode {
    let mut children: Vec<SyntaxElement> = Vec::new();
    if awaited {
        children.push(SyntaxToken::canonical(TokenKind::AwaitKeyword).into());
    }
    children.extend([declaration.into(), body.into()]);
    node(SyntaxKind::UsingStatement, children)
}

pub fn template(
    name: &str,
    parameters: impl IntoIterator<Item = SyntaxNode>,
    body: SyntaxNode,
) -> SyntaxNode {
    node(
        SyntaxKind::Template,
        std::iter::once(SyntaxToken::identifier(name).into())
            .chain(nodes(parameters))
            .chain(std::iter::once(body.into())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::compact;

    #[test]
    fn test_call_path() {
        let call = call("Syntax.Token", [path("TokenKind.Plus")]);
        assert_eq!(compact(&call), "Syntax.Token(TokenKind.Plus)");
    }

    #[test]
    fn test_cast_parenthesizes_compound_operand() {
        let sum = binary(identifier_name("a"), TokenKind::Plus, int_literal(1));
        assert_eq!(compact(&cast("int", sum)), "(int)(a + 1)");
        assert_eq!(compact(&cast("int", identifier_name("a"))), "(int)a");
    }

    #[test]
    fn test_if_with_else() {
        let stmt = if_statement(
            identifier_name("c"),
            block([return_statement(None)]),
            Some(expression_statement(call("f", []))),
        );
        assert_eq!(compact(&stmt), "if (c) { return; } else f();");
    }
}
