//! Inlining of blocks that exist only because of how code was generated.

use twostage_syntax::{Annotation, SyntaxElement, SyntaxKind, SyntaxNode};

/// Splices nested blocks into the enclosing block when they are marked
/// [`Annotation::Flatten`], or marked [`Annotation::Synthetic`] and declare
/// no locals of their own.
pub fn flatten(tree: &SyntaxNode) -> SyntaxNode {
    tree.rewrite(&mut |node| {
        if node.kind() != SyntaxKind::Block || !node.child_nodes().any(is_inlined) {
            return node;
        }
        let mut children: Vec<SyntaxElement> = Vec::with_capacity(node.children().len());
        for child in node.children() {
            match child {
                SyntaxElement::Node(block) if is_inlined(block) => {
                    children.extend(block.children().iter().cloned());
                }
                child => children.push(child.clone()),
            }
        }
        node.with_children(children)
    })
}

fn is_inlined(node: &SyntaxNode) -> bool {
    node.kind() == SyntaxKind::Block
        && (node.has_annotation(Annotation::Flatten)
            || (node.has_annotation(Annotation::Synthetic)
                && !node
                    .child_nodes()
                    .any(|statement| statement.kind() == SyntaxKind::LocalDeclaration)))
}

#[cfg(test)]
mod tests {
    use twostage_syntax::make;
    use twostage_syntax::printer::compact;
    use twostage_syntax::SyntaxToken;

    use super::*;

    fn call(name: &str) -> SyntaxNode {
        make::expression_statement(make::call(name, []))
    }

    #[test]
    fn test_synthetic_blocks_without_locals_are_inlined() {
        let synthetic = make::block([call("b"), call("c")]).with_annotation(Annotation::Synthetic);
        let tree = make::block([call("a"), synthetic, call("d")]);
        insta::assert_snapshot!(compact(&flatten(&tree)), @"{ a(); b(); c(); d(); }");
    }

    #[test]
    fn test_synthetic_blocks_with_locals_stay() {
        let local = make::local_declaration(SyntaxToken::identifier("x"), Some(make::int_literal(1)));
        let synthetic = make::block([local, call("b")]).with_annotation(Annotation::Synthetic);
        let tree = make::block([synthetic, call("d")]);
        insta::assert_snapshot!(compact(&flatten(&tree)), @"{ { var x = 1; b(); } d(); }");
    }

    #[test]
    fn test_flatten_marked_blocks_always_inline() {
        // The synthetic block inherits the declaration and stays.
        let local = make::local_declaration(SyntaxToken::identifier("x"), None);
        let inner = make::block([local, make::yield_break()]).with_annotation(Annotation::Flatten);
        let outer = make::block([inner]).with_annotation(Annotation::Synthetic);
        let tree = make::block([call("a"), outer]);
        insta::assert_snapshot!(compact(&flatten(&tree)), @"{ a(); { var x; yield break; } }");
    }

    #[test]
    fn test_blocks_under_statements_are_kept() {
        let body = make::block([call("b")]).with_annotation(Annotation::Synthetic);
        let tree = make::block([make::if_statement(make::identifier_name("c"), body, None)]);
        insta::assert_snapshot!(compact(&flatten(&tree)), @"{ if (c) { b(); } }");
    }
}
