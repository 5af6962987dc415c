//! Side table of semantic facts keyed by annotation ids stamped on nodes.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use twostage_core::{Resolution, SemanticResolver, Symbol, TypeRef};
use twostage_syntax::{Annotation, AnnotationId, NodeId, SyntaxKind, SyntaxNode};

/// Maps annotation ids to the facts the resolver reported for the original
/// node, so the facts survive any number of tree rewrites.
///
/// Reads and writes go through concurrent maps; one cache belongs to one
/// [`Session`](super::Session) and is written by that session only.
#[derive(Debug, Default)]
pub struct AnnotationCache {
    next_id: AtomicU32,
    facts: DashMap<AnnotationId, Resolution>,
    assignment_sites: DashMap<Symbol, Vec<NodeId>>,
}

impl AnnotationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&self, resolution: Resolution) -> AnnotationId {
        let id = AnnotationId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.facts.insert(id, resolution);
        id
    }

    /// Stamp every node of `tree` with an annotation id.
    ///
    /// Nodes that already carry one are left untouched, so annotating an
    /// annotated tree returns it unchanged.
    pub fn annotate(&self, tree: &SyntaxNode, resolver: &dyn SemanticResolver) -> SyntaxNode {
        let mut annotated = 0usize;
        let result = tree.rewrite(&mut |node| {
            if node.semantic_id().is_some() {
                return node;
            }
            let id = self.intern(resolver.resolve(&node));
            self.record_assignment(&node);
            annotated += 1;
            node.with_annotation(Annotation::Semantic(id))
        });
        tracing::trace!(annotated, "annotated nodes");
        result
    }

    fn record_assignment(&self, node: &SyntaxNode) {
        if !matches!(
            node.kind(),
            SyntaxKind::AssignmentExpression | SyntaxKind::PostfixUnaryExpression
        ) {
            return;
        }
        let Some(target) = node.child_node(0).and_then(|target| self.symbol(target)) else {
            return;
        };
        if target.is_local() {
            self.assignment_sites
                .entry(target)
                .or_default()
                .push(node.id());
        }
    }

    fn fact<R>(&self, node: &SyntaxNode, f: impl FnOnce(&Resolution) -> Option<R>) -> Option<R> {
        let id = node.semantic_id()?;
        let fact = self.facts.get(&id)?;
        f(&fact)
    }

    /// Symbol the node refers to.
    pub fn symbol(&self, node: &SyntaxNode) -> Option<Symbol> {
        self.fact(node, |fact| fact.symbol.clone())
    }

    /// Type of the node, when it is an expression.
    pub fn ty(&self, node: &SyntaxNode) -> Option<TypeRef> {
        self.fact(node, |fact| fact.ty.clone())
    }

    /// Symbol the node declares.
    pub fn declared_symbol(&self, node: &SyntaxNode) -> Option<Symbol> {
        self.fact(node, |fact| fact.declared.clone())
    }

    /// Ids of the assignment expressions whose target is `local`, in tree order.
    pub fn assignment_sites(&self, local: &Symbol) -> Vec<NodeId> {
        self.assignment_sites
            .get(local)
            .map(|sites| sites.clone())
            .unwrap_or_default()
    }

    /// Number of interned annotation ids.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
