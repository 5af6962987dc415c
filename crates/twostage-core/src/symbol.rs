use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Resolver-assigned identity of a symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Local,
    Parameter,
    Method,
    Property,
    Field,
    Type,
    Namespace,
    Template,
}

/// The shapes a deferred call can be requested in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeferredCallForm {
    Plain,
    Awaitable,
    Sequence,
    Enumerator,
    AsyncSequence,
    AsyncEnumerator,
}

impl DeferredCallForm {
    pub const ALL: [DeferredCallForm; 6] = [
        DeferredCallForm::Plain,
        DeferredCallForm::Awaitable,
        DeferredCallForm::Sequence,
        DeferredCallForm::Enumerator,
        DeferredCallForm::AsyncSequence,
        DeferredCallForm::AsyncEnumerator,
    ];

    /// Member name under `DeferredCallForm.` in generator programs.
    pub fn name(self) -> &'static str {
        match self {
            DeferredCallForm::Plain => "Plain",
            DeferredCallForm::Awaitable => "Awaitable",
            DeferredCallForm::Sequence => "Sequence",
            DeferredCallForm::Enumerator => "Enumerator",
            DeferredCallForm::AsyncSequence => "AsyncSequence",
            DeferredCallForm::AsyncEnumerator => "AsyncEnumerator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|form| form.name() == name)
    }
}

impl std::fmt::Display for DeferredCallForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An externally resolved binding site or referenced entity.
///
/// Symbols compare by value; two resolutions of the same entity are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: Arc<str>,
    pub kind: SymbolKind,
    /// Type that declares this symbol, for members.
    pub container: Option<Arc<str>>,
    /// Set when the symbol is the deferred-call placeholder.
    pub deferred: Option<DeferredCallForm>,
}

impl Symbol {
    pub fn new(id: SymbolId, name: impl Into<Arc<str>>, kind: SymbolKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            container: None,
            deferred: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<Arc<str>>) -> Self {
        self.container = Some(container.into());
        self
    }

    pub fn with_deferred(mut self, form: DeferredCallForm) -> Self {
        self.deferred = Some(form);
        self
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, SymbolKind::Local)
    }

    pub fn is_deferred_call(&self) -> bool {
        self.deferred.is_some()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.container {
            Some(container) => write!(f, "{container}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}
