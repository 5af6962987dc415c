//! Semantic annotation: attaching resolver facts to syntax nodes by id.

mod cache;
mod session;

pub use cache::AnnotationCache;
pub use session::{Session, SessionId};

#[cfg(test)]
mod tests {
    use twostage_core::{SymbolKind, TypeRef};
    use twostage_syntax::{SyntaxKind, SyntaxNode};

    use super::*;
    use crate::testing::annotated;

    fn find(tree: &SyntaxNode, kind: SyntaxKind, name: &str) -> SyntaxNode {
        tree.descendants()
            .find(|node| node.kind() == kind && node.name() == Some(name))
            .unwrap_or_else(|| panic!("no {kind} named {name}"))
    }

    #[test]
    fn test_every_node_is_stamped() {
        let (session, tree) = annotated("template T() { var x = 1; x = x + 2; }");
        assert!(tree.descendants().all(|node| node.semantic_id().is_some()));
        assert_eq!(session.cache().len(), tree.descendants().count());
    }

    #[test]
    fn test_facts_follow_the_node() {
        let (session, tree) = annotated(
            "template T(string name) { var n = name.Length; Console.WriteLine(n); }",
        );
        let cache = session.cache();

        let declarator = find(&tree, SyntaxKind::VariableDeclarator, "n");
        let local = cache.declared_symbol(&declarator).unwrap();
        assert_eq!(local.kind, SymbolKind::Local);
        assert_eq!(&*local.name, "n");

        let name_ref = tree
            .descendants()
            .find(|node| node.kind() == SyntaxKind::IdentifierName && node.name() == Some("name"))
            .unwrap();
        assert_eq!(cache.symbol(&name_ref).unwrap().kind, SymbolKind::Parameter);
        assert_eq!(cache.ty(&name_ref), Some(TypeRef::String));

        let call = tree
            .descendants()
            .find(|node| node.kind() == SyntaxKind::InvocationExpression)
            .unwrap();
        assert_eq!(cache.ty(&call), Some(TypeRef::Void));
        assert_eq!(cache.symbol(&call).unwrap().to_string(), "Console.WriteLine");
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let (session, tree) = annotated("template T() { var a = 1; }");
        let before = session.cache().len();
        let resolver = crate::ScopeResolver::new(&crate::Environment::standard(), &tree);
        let again = session.cache().annotate(&tree, &resolver);
        assert!(again.ptr_eq(&tree));
        assert_eq!(session.cache().len(), before);
    }

    #[test]
    fn test_unannotated_node_has_no_facts() {
        let (session, _) = annotated("template T() { }");
        let fresh = twostage_syntax::make::int_literal(3);
        assert_eq!(session.cache().ty(&fresh), None);
        assert_eq!(session.cache().symbol(&fresh), None);
    }

    #[test]
    fn test_assignment_sites_are_recorded_for_locals() {
        let (session, tree) =
            annotated("template T(int p) { var a; a = 1; a = p; p = 3; a++; }");
        let cache = session.cache();
        let declarator = find(&tree, SyntaxKind::VariableDeclarator, "a");
        let local = cache.declared_symbol(&declarator).unwrap();
        let sites = cache.assignment_sites(&local);
        assert_eq!(sites.len(), 3);

        let parameter = find(&tree, SyntaxKind::Parameter, "p");
        let parameter = cache.declared_symbol(&parameter).unwrap();
        assert!(cache.assignment_sites(&parameter).is_empty());
    }

    #[test]
    fn test_sessions_are_independent() {
        let first = Session::new();
        let second = Session::new();
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
        assert!(first.cache().is_empty());
        let (session, _) = annotated("template T() { var a = 1; }");
        assert!(!session.cache().is_empty());
        assert!(first.cache().is_empty());
    }
}
