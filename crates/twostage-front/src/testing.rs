//! Shared fixtures for unit tests: parse, resolve against the standard
//! environment, annotate and classify.

use twostage_syntax::printer::compact;
use twostage_syntax::{SyntaxNode, parse_compilation_unit};

use crate::{Classification, Environment, ScopeResolver, Session, classify};

pub(crate) fn annotated(source: &str) -> (Session, SyntaxNode) {
    let tree = parse_compilation_unit(source).expect("test template should parse");
    let resolver = ScopeResolver::new(&Environment::standard(), &tree);
    let session = Session::new();
    let annotated = session.cache().annotate(&tree, &resolver);
    (session, annotated)
}

pub(crate) fn classified(source: &str) -> (Session, Classification) {
    let (session, tree) = annotated(source);
    let classification = classify(&tree, session.cache(), &Environment::standard());
    (session, classification)
}

/// The first node, in pre-order, that prints as `text`.
pub(crate) fn node_with_text(tree: &SyntaxNode, text: &str) -> SyntaxNode {
    tree.descendants()
        .find(|node| compact(node) == text)
        .unwrap_or_else(|| panic!("no node prints as `{text}`"))
}
