//! Hierarchical lexical scopes for fresh identifiers.
//!
//! A name requested in a scope is renamed when it is already defined in
//! that scope, in an enclosing one, or in any scope nested inside it, so a
//! generated local can neither capture nor be captured by another.
//! Renaming appends the smallest free numeric suffix: `x`, `x_1`, `x_2`.

use std::collections::HashSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    names: HashSet<String>,
}

#[derive(Debug)]
pub struct LexicalScopes {
    scopes: Vec<Scope>,
}

impl Default for LexicalScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalScopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                names: HashSet::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            parent: Some(parent),
            names: HashSet::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// Records a name that is already taken, such as a target parameter.
    pub fn reserve(&mut self, scope: ScopeId, name: &str) {
        self.scopes[scope.0].names.insert(name.to_owned());
    }

    /// Defines `name` in `scope`, renamed if it would collide.
    pub fn define(&mut self, scope: ScopeId, name: &str) -> String {
        let mut candidate = name.to_owned();
        let mut suffix = 0;
        while self.collides(scope, &candidate) {
            suffix += 1;
            candidate = format!("{name}_{suffix}");
        }
        self.scopes[scope.0].names.insert(candidate.clone());
        candidate
    }

    fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |scope| self.parent(*scope))
    }

    fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        self.ancestors(scope).any(|candidate| candidate == ancestor)
    }

    fn collides(&self, scope: ScopeId, name: &str) -> bool {
        (0..self.scopes.len()).map(ScopeId).any(|other| {
            self.scopes[other.0].names.contains(name)
                && (self.is_within(scope, other) || self.is_within(other, scope))
        })
    }
}
