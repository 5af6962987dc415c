//! Persistent syntax trees.
//!
//! Nodes are immutable and reference counted. Rewrites build new nodes and
//! share every subtree they leave untouched, so a rewritten tree costs only
//! the path from the root to each change.
//!
//! Each node carries a process-unique [`NodeId`] that survives rewrites
//! (`with_children`, `with_annotation`, ...) and a small set of
//! [`Annotation`]s. Semantic facts are not stored in the tree; a node is
//! stamped with an [`AnnotationId`] that indexes a side table owned by the
//! compilation session.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;

use crate::kind::{SyntaxKind, TokenKind};
use crate::span::Span;
use crate::stage::Stage;

/// Unique identifier of a syntax node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

impl NodeId {
    /// Allocate a new id, unique within the process.
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interned key of a semantic fact recorded by the annotation pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u32);

impl AnnotationId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Marks stamped on a node by the compiler passes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Annotation {
    /// Key into the session's semantic side table.
    Semantic(AnnotationId),
    /// Binding-time classification.
    Stage(Stage),
    /// A generation-time expression whose value is generated code.
    Splice,
    /// A block introduced by the compiler rather than written in the template.
    Synthetic,
    /// A block that must be inlined into its parent even if it declares locals.
    Flatten,
}

pub type Annotations = SmallVec<[Annotation; 2]>;

/// A leaf of the syntax tree.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SyntaxToken {
    kind: TokenKind,
    text: Arc<str>,
    span: Span,
}

impl SyntaxToken {
    pub fn new(kind: TokenKind, text: impl Into<Arc<str>>, span: Span) -> Self {
        Self {
            kind,
            text: text.into(),
            span,
        }
    }

    /// A keyword or operator token with its fixed spelling.
    ///
    /// Panics for kinds without a canonical spelling; that is a bug in the
    /// caller, not in the input.
    pub fn canonical(kind: TokenKind) -> Self {
        let text = kind
            .canonical_text()
            .unwrap_or_else(|| panic!("token kind {kind} has no canonical text"));
        Self::new(kind, text, Span::detached())
    }

    pub fn identifier(name: impl Into<Arc<str>>) -> Self {
        Self::new(TokenKind::Identifier, name, Span::detached())
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Whether the text equals the kind's canonical spelling.
    pub fn is_canonical(&self) -> bool {
        self.kind.canonical_text() == Some(&*self.text)
    }
}

impl fmt::Debug for SyntaxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})@{}", self.kind, &*self.text, self.span)
    }
}

/// A child of a syntax node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SyntaxElement {
    Node(SyntaxNode),
    Token(SyntaxToken),
}

impl SyntaxElement {
    pub fn as_node(&self) -> Option<&SyntaxNode> {
        match self {
            SyntaxElement::Node(node) => Some(node),
            SyntaxElement::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&SyntaxToken> {
        match self {
            SyntaxElement::Node(_) => None,
            SyntaxElement::Token(token) => Some(token),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SyntaxElement::Node(node) => node.span(),
            SyntaxElement::Token(token) => token.span(),
        }
    }
}

impl fmt::Debug for SyntaxElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxElement::Node(node) => node.fmt(f),
            SyntaxElement::Token(token) => token.fmt(f),
        }
    }
}

impl From<SyntaxNode> for SyntaxElement {
    fn from(node: SyntaxNode) -> Self {
        SyntaxElement::Node(node)
    }
}

impl From<SyntaxToken> for SyntaxElement {
    fn from(token: SyntaxToken) -> Self {
        SyntaxElement::Token(token)
    }
}

#[derive(PartialEq, Eq, Hash)]
struct NodeData {
    id: NodeId,
    kind: SyntaxKind,
    span: Span,
    children: Vec<SyntaxElement>,
    annotations: Annotations,
}

/// An immutable, shareable syntax node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SyntaxNode(Arc<NodeData>);

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, span: Span, children: Vec<SyntaxElement>) -> Self {
        Self(Arc::new(NodeData {
            id: NodeId::fresh(),
            kind,
            span,
            children,
            annotations: Annotations::new(),
        }))
    }

    /// A node without a source position, spanning its children if they have one.
    pub fn synthesized(kind: SyntaxKind, children: Vec<SyntaxElement>) -> Self {
        let span = children
            .iter()
            .map(SyntaxElement::span)
            .filter(|span| !span.is_empty())
            .reduce(Span::cover)
            .unwrap_or_else(Span::detached);
        Self::new(kind, span, children)
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.kind
    }

    pub fn span(&self) -> Span {
        self.0.span
    }

    pub fn children(&self) -> &[SyntaxElement] {
        &self.0.children
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.0.annotations
    }

    pub fn ptr_eq(&self, other: &SyntaxNode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Node children, skipping tokens.
    pub fn child_nodes(&self) -> impl Iterator<Item = &SyntaxNode> + '_ {
        self.0.children.iter().filter_map(SyntaxElement::as_node)
    }

    /// The `index`-th node child, skipping tokens.
    pub fn child_node(&self, index: usize) -> Option<&SyntaxNode> {
        self.child_nodes().nth(index)
    }

    pub fn child_node_of_kind(&self, kind: SyntaxKind) -> Option<&SyntaxNode> {
        self.child_nodes().find(|node| node.kind() == kind)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &SyntaxToken> + '_ {
        self.0.children.iter().filter_map(SyntaxElement::as_token)
    }

    /// The first token child.
    pub fn token(&self) -> Option<&SyntaxToken> {
        self.tokens().next()
    }

    pub fn token_of_kind(&self, kind: TokenKind) -> Option<&SyntaxToken> {
        self.tokens().find(|token| token.kind() == kind)
    }

    /// Text of the first identifier token, if any.
    pub fn name(&self) -> Option<&str> {
        self.token_of_kind(TokenKind::Identifier)
            .map(SyntaxToken::text)
    }

    pub fn has_annotation(&self, annotation: Annotation) -> bool {
        self.0.annotations.contains(&annotation)
    }

    pub fn stage(&self) -> Option<Stage> {
        self.0.annotations.iter().find_map(|annotation| match annotation {
            Annotation::Stage(stage) => Some(*stage),
            _ => None,
        })
    }

    pub fn semantic_id(&self) -> Option<AnnotationId> {
        self.0.annotations.iter().find_map(|annotation| match annotation {
            Annotation::Semantic(id) => Some(*id),
            _ => None,
        })
    }

    fn rebuild(&self, children: Vec<SyntaxElement>, annotations: Annotations) -> SyntaxNode {
        Self(Arc::new(NodeData {
            id: self.0.id,
            kind: self.0.kind,
            span: self.0.span,
            children,
            annotations,
        }))
    }

    /// Same node (id, kind, span, annotations) with new children.
    pub fn with_children(&self, children: Vec<SyntaxElement>) -> SyntaxNode {
        self.rebuild(children, self.0.annotations.clone())
    }

    /// Adds an annotation; returns `self` unchanged if it is already present.
    pub fn with_annotation(&self, annotation: Annotation) -> SyntaxNode {
        if self.has_annotation(annotation) {
            return self.clone();
        }
        let mut annotations = self.0.annotations.clone();
        annotations.push(annotation);
        self.rebuild(self.0.children.clone(), annotations)
    }

    /// Replaces any existing stage annotation.
    pub fn with_stage(&self, stage: Stage) -> SyntaxNode {
        if self.stage() == Some(stage) {
            return self.clone();
        }
        let mut annotations: Annotations = self
            .0
            .annotations
            .iter()
            .copied()
            .filter(|annotation| !matches!(annotation, Annotation::Stage(_)))
            .collect();
        annotations.push(Annotation::Stage(stage));
        self.rebuild(self.0.children.clone(), annotations)
    }

    /// Pre-order traversal including `self`.
    pub fn descendants(&self) -> Descendants {
        Descendants {
            stack: vec![self.clone()],
        }
    }

    /// Post-order rewrite. `f` sees each node after its children were
    /// rewritten. Subtrees for which `f` returns the node unchanged keep
    /// their original allocation.
    pub fn rewrite(&self, f: &mut impl FnMut(SyntaxNode) -> SyntaxNode) -> SyntaxNode {
        let mut changed = false;
        let children: Vec<SyntaxElement> = self
            .children()
            .iter()
            .map(|child| match child {
                SyntaxElement::Node(node) => {
                    let rewritten = node.rewrite(f);
                    changed |= !rewritten.ptr_eq(node);
                    SyntaxElement::Node(rewritten)
                }
                SyntaxElement::Token(token) => SyntaxElement::Token(token.clone()),
            })
            .collect();
        let node = if changed {
            self.with_children(children)
        } else {
            self.clone()
        };
        f(node)
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind(), self.span())?;
        if let Some(stage) = self.stage() {
            write!(f, "[{stage}]")?;
        }
        if self.children().is_empty() {
            return Ok(());
        }
        f.debug_list().entries(self.children()).finish()
    }
}

/// Pre-order iterator returned by [`SyntaxNode::descendants`].
pub struct Descendants {
    stack: Vec<SyntaxNode>,
}

impl Iterator for Descendants {
    type Item = SyntaxNode;

    fn next(&mut self) -> Option<SyntaxNode> {
        let node = self.stack.pop()?;
        self.stack.extend(
            node.children()
                .iter()
                .rev()
                .filter_map(SyntaxElement::as_node)
                .cloned(),
        );
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> SyntaxNode {
        SyntaxNode::synthesized(
            SyntaxKind::IdentifierName,
            vec![SyntaxToken::identifier(name).into()],
        )
    }

    #[test]
    fn test_with_children_keeps_identity() {
        let node = ident("a");
        let stamped = node.with_stage(Stage::GeneratedOnly);
        assert_eq!(stamped.id(), node.id());
        assert_eq!(stamped.stage(), Some(Stage::GeneratedOnly));
        assert_eq!(node.stage(), None);
    }

    #[test]
    fn test_with_stage_replaces_previous() {
        let node = ident("a")
            .with_stage(Stage::Default)
            .with_stage(Stage::GenerationTimeOnly);
        let stages = node
            .annotations()
            .iter()
            .filter(|a| matches!(a, Annotation::Stage(_)))
            .count();
        assert_eq!(stages, 1);
        assert_eq!(node.stage(), Some(Stage::GenerationTimeOnly));
    }

    #[test]
    fn test_rewrite_shares_untouched_subtrees() {
        let left = ident("a");
        let right = ident("b");
        let parent = SyntaxNode::synthesized(
            SyntaxKind::ListExpression,
            vec![left.clone().into(), right.clone().into()],
        );
        let rewritten = parent.rewrite(&mut |node| {
            if node.name() == Some("b") {
                node.with_annotation(Annotation::Splice)
            } else {
                node
            }
        });
        assert!(rewritten.child_node(0).unwrap().ptr_eq(&left));
        assert!(!rewritten.child_node(1).unwrap().ptr_eq(&right));
        assert_eq!(rewritten.id(), parent.id());
    }

    #[test]
    fn test_descendants_preorder() {
        let parent = SyntaxNode::synthesized(
            SyntaxKind::ListExpression,
            vec![ident("a").into(), ident("b").into()],
        );
        let names: Vec<_> = parent
            .descendants()
            .map(|n| n.name().unwrap_or("-").to_string())
            .collect();
        assert_eq!(names, vec!["-", "a", "b"]);
    }
}
