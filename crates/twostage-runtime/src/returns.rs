//! Lowering of template `return` statements for the target's result kind.

use twostage_syntax::make;
use twostage_syntax::{Annotation, SyntaxKind, SyntaxNode, SyntaxToken};

use crate::target::ResultKind;

/// Builds the statement that replaces `return value;` in the target.
///
/// `dynamic` says the value is typed with the `dynamic` placeholder, in
/// which case it is cast to the target's result type. `fresh` allocates
/// names for the locals of desugared loops.
pub fn lower_return(
    result: &ResultKind,
    value: Option<SyntaxNode>,
    dynamic: bool,
    fresh: &mut dyn FnMut(&str) -> String,
) -> SyntaxNode {
    match result {
        ResultKind::Void => void_return(value),
        ResultKind::Awaitable(ty) if ty.is_void() => void_return(value),
        ResultKind::Value(ty) | ResultKind::Awaitable(ty) => {
            let value = match value {
                Some(value) if dynamic && !ty.is_placeholder() => {
                    Some(make::cast(&ty.to_string(), value))
                }
                value => value,
            };
            make::return_statement(value)
        }
        ResultKind::Sequence(_) => iterate(value, false, fresh),
        ResultKind::AsyncSequence(_) => iterate(value, true, fresh),
        ResultKind::Enumerator(_) => drain(value, false, fresh),
        ResultKind::AsyncEnumerator(_) => drain(value, true, fresh),
    }
}

/// `{ value; return; }`, or `{ return; }` when `value` is pure.
fn void_return(value: Option<SyntaxNode>) -> SyntaxNode {
    let mut statements = Vec::new();
    if let Some(value) = value.filter(|value| !is_pure(value)) {
        statements.push(evaluated(value));
    }
    statements.push(make::return_statement(None));
    make::block(statements).with_annotation(Annotation::Synthetic)
}

/// Literals and names, possibly parenthesized or cast.
fn is_pure(node: &SyntaxNode) -> bool {
    match node.kind() {
        SyntaxKind::LiteralExpression | SyntaxKind::IdentifierName | SyntaxKind::ThisExpression => {
            true
        }
        SyntaxKind::ParenthesizedExpression => node.child_node(0).is_some_and(is_pure),
        SyntaxKind::CastExpression => node.child_node(1).is_some_and(is_pure),
        _ => false,
    }
}

/// A statement that evaluates `value`. Expressions that cannot stand as a
/// statement are discarded into `_`.
fn evaluated(value: SyntaxNode) -> SyntaxNode {
    match value.kind() {
        SyntaxKind::InvocationExpression
        | SyntaxKind::AssignmentExpression
        | SyntaxKind::PostfixUnaryExpression
        | SyntaxKind::AwaitExpression => make::expression_statement(value),
        _ => make::expression_statement(make::assignment(make::identifier_name("_"), value)),
    }
}

/// `{ foreach (var item in value) yield return item; yield break; }`
fn iterate(
    value: Option<SyntaxNode>,
    awaited: bool,
    fresh: &mut dyn FnMut(&str) -> String,
) -> SyntaxNode {
    let Some(value) = value else {
        return make::yield_break();
    };
    let item = fresh("item");
    let each = make::foreach_statement(
        awaited,
        SyntaxToken::identifier(item.as_str()),
        value,
        make::yield_return(make::identifier_name(&item)),
    );
    make::block([each, make::yield_break()]).with_annotation(Annotation::Flatten)
}

/// Acquires the enumerator in a `using` so it is released on every path,
/// then yields what it produces.
fn drain(
    value: Option<SyntaxNode>,
    awaited: bool,
    fresh: &mut dyn FnMut(&str) -> String,
) -> SyntaxNode {
    let Some(value) = value else {
        return make::yield_break();
    };
    let enumerator = fresh("enumerator");
    let move_next = make::invocation(
        make::member_access(
            make::identifier_name(&enumerator),
            if awaited { "MoveNextAsync" } else { "MoveNext" },
        ),
        [],
    );
    let condition = if awaited {
        make::await_expression(move_next)
    } else {
        move_next
    };
    let current = make::member_access(make::identifier_name(&enumerator), "Current");
    let pump = make::while_statement(condition, make::yield_return(current));
    let acquire = make::using_statement(
        awaited,
        make::local_declaration(SyntaxToken::identifier(enumerator.as_str()), Some(value)),
        make::block([pump]),
    );
    make::block([acquire, make::yield_break()]).with_annotation(Annotation::Flatten)
}

#[cfg(test)]
mod tests {
    use twostage_core::TypeRef;
    use twostage_syntax::parse_expression;
    use twostage_syntax::printer::compact;

    use super::*;

    fn lowered(result: ResultKind, value: &str, dynamic: bool) -> SyntaxNode {
        let value = parse_expression(value).unwrap();
        lower_return(&result, Some(value), dynamic, &mut |name| name.to_owned())
    }

    #[test]
    fn test_void_keeps_only_side_effects() {
        let call = lowered(ResultKind::Void, "SomeCall()", false);
        insta::assert_snapshot!(compact(&call), @"{ SomeCall(); return; }");
        assert!(call.has_annotation(Annotation::Synthetic));

        let identifier = lowered(ResultKind::Void, "result", false);
        insta::assert_snapshot!(compact(&identifier), @"{ return; }");
        let wrapped = lowered(ResultKind::Void, "(int)(x)", false);
        insta::assert_snapshot!(compact(&wrapped), @"{ return; }");
    }

    #[test]
    fn test_void_keeps_calls_nested_in_expressions() {
        let sum = lowered(ResultKind::Void, "SomeCall() + 1", false);
        insta::assert_snapshot!(compact(&sum), @"{ _ = SomeCall() + 1; return; }");

        let member = lowered(ResultKind::Void, "Load().Count", false);
        insta::assert_snapshot!(compact(&member), @"{ _ = Load().Count; return; }");

        let cast = lowered(ResultKind::Void, "(int)Next()", false);
        insta::assert_snapshot!(compact(&cast), @"{ _ = (int)Next(); return; }");
    }

    #[test]
    fn test_cast_only_for_dynamic_values() {
        let dynamic = lowered(ResultKind::Value(TypeRef::Int), "x", true);
        insta::assert_snapshot!(compact(&dynamic), @"return (int)x;");
        let typed = lowered(ResultKind::Value(TypeRef::Int), "x", false);
        insta::assert_snapshot!(compact(&typed), @"return x;");
        let awaited = lowered(ResultKind::Awaitable(TypeRef::String), "a + b", true);
        insta::assert_snapshot!(compact(&awaited), @"return (string)(a + b);");
    }

    #[test]
    fn test_awaitable_void_behaves_like_void() {
        let lowered = lowered(ResultKind::Awaitable(TypeRef::Void), "await Run()", false);
        insta::assert_snapshot!(compact(&lowered), @"{ await Run(); return; }");
    }

    #[test]
    fn test_sequences_become_flattened_loops() {
        let sequence = lowered(ResultKind::AsyncSequence(TypeRef::Int), "Source()", false);
        insta::assert_snapshot!(
            compact(&sequence),
            @"{ await foreach (var item in Source()) yield return item; yield break; }"
        );
        assert!(sequence.has_annotation(Annotation::Flatten));

        let enumerator = lowered(ResultKind::AsyncEnumerator(TypeRef::Int), "Source()", false);
        insta::assert_snapshot!(
            compact(&enumerator),
            @"{ await using (var enumerator = Source()) { while (await enumerator.MoveNextAsync()) yield return enumerator.Current; } yield break; }"
        );

        let plain = lowered(ResultKind::Enumerator(TypeRef::Int), "e", false);
        insta::assert_snapshot!(
            compact(&plain),
            @"{ using (var enumerator = e) { while (enumerator.MoveNext()) yield return enumerator.Current; } yield break; }"
        );
    }
}
