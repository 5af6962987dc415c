//! The expansion context: everything a generator needs to know about the
//! method it is expanded into.
//!
//! The interpreter carries its context explicitly. Host functions reached
//! from generator code (`Context.FreshIdentifier(...)`) find it through a
//! thread-local stack instead; [`ExpansionContext::enter`] pushes onto that
//! stack and the returned guard pops on every exit path, unwinding
//! included.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use twostage_core::DeferredCallForm;
use twostage_syntax::make;
use twostage_syntax::{SyntaxNode, SyntaxToken};

use crate::deferred::DeferredCallSite;
use crate::error::{ExpansionError, ExpansionResult};
use crate::meta::Meta;
use crate::returns;
use crate::scope::{LexicalScopes, ScopeId};
use crate::target::TargetMethod;
use crate::value::Value;

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<ExpansionContext>>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
pub struct ExpansionContext {
    target: Rc<TargetMethod>,
    deferred: Box<dyn DeferredCallSite>,
    arguments: HashMap<String, Value>,
    scopes: RefCell<LexicalScopes>,
    current_scope: Cell<ScopeId>,
}

impl ExpansionContext {
    pub fn new(target: TargetMethod, deferred: impl DeferredCallSite + 'static) -> Self {
        let mut scopes = LexicalScopes::new();
        let root = scopes.root();
        for parameter in &target.parameters {
            scopes.reserve(root, &parameter.name);
        }
        Self {
            target: Rc::new(target),
            deferred: Box::new(deferred),
            arguments: HashMap::new(),
            scopes: RefCell::new(scopes),
            current_scope: Cell::new(root),
        }
    }

    /// Supplies the value of a generation-time template parameter.
    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn target(&self) -> &TargetMethod {
        &self.target
    }

    pub fn meta(&self) -> Value {
        Value::object(Meta::new(self.target.clone()))
    }

    /// A name for a generated local that neither shadows nor is shadowed
    /// by any other name of the target.
    pub fn fresh_name(&self, hint: &str) -> String {
        self.scopes
            .borrow_mut()
            .define(self.current_scope.get(), hint)
    }

    pub fn fresh_identifier(&self, hint: &str) -> SyntaxToken {
        SyntaxToken::identifier(self.fresh_name(hint))
    }

    /// Opens a nested lexical scope; returns the scope to restore.
    pub fn push_scope(&self) -> ScopeId {
        let outer = self.current_scope.get();
        let inner = self.scopes.borrow_mut().push(outer);
        self.current_scope.set(inner);
        outer
    }

    pub fn pop_scope(&self, outer: ScopeId) {
        self.current_scope.set(outer);
    }

    /// Lowers `return value;` for the target's result kind.
    pub fn lower_return(&self, value: Option<SyntaxNode>, dynamic: bool) -> SyntaxNode {
        returns::lower_return(
            &self.target.result_kind(),
            value,
            dynamic,
            &mut |hint| self.fresh_name(hint),
        )
    }

    fn check_form(&self, form: DeferredCallForm) -> ExpansionResult<()> {
        if self.target.result_kind().accepts(form) {
            Ok(())
        } else {
            Err(ExpansionError::FormMismatch {
                form,
                target: self.target.name.clone(),
                result: self.target.return_type.to_string(),
            })
        }
    }

    /// `var variable = <deferred call>;`
    pub fn deferred_assign(
        &self,
        variable: SyntaxToken,
        form: DeferredCallForm,
    ) -> ExpansionResult<SyntaxNode> {
        self.check_form(form)?;
        let invocation = self.deferred.invocation(form);
        Ok(make::local_declaration(variable, Some(invocation)))
    }

    /// `return <deferred call>;`, lowered for the target.
    pub fn deferred_return(&self, form: DeferredCallForm) -> ExpansionResult<SyntaxNode> {
        self.check_form(form)?;
        let invocation = self.deferred.invocation(form);
        Ok(self.lower_return(Some(invocation), false))
    }

    /// Makes this the current context of the calling thread until the
    /// guard is dropped.
    pub fn enter(self: &Rc<Self>) -> ContextGuard {
        let depth = ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            active.push(self.clone());
            active.len() - 1
        });
        ContextGuard {
            depth,
            _not_send: PhantomData,
        }
    }
}

/// The innermost context entered on this thread.
pub fn current() -> ExpansionResult<Rc<ExpansionContext>> {
    ACTIVE
        .with(|active| active.borrow().last().cloned())
        .ok_or(ExpansionError::NoContext)
}

/// Pops the context pushed by [`ExpansionContext::enter`].
#[must_use = "the context is popped as soon as the guard is dropped"]
pub struct ContextGuard {
    depth: usize,
    /// The stack is per thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.borrow_mut().truncate(self.depth));
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use twostage_core::TypeRef;
    use twostage_syntax::printer::compact;

    use super::*;
    use crate::deferred::InvokeOriginal;

    fn context(return_type: TypeRef) -> Rc<ExpansionContext> {
        let target = TargetMethod::new("Load", return_type).with_parameter("path", TypeRef::String);
        let site = InvokeOriginal::new("Load", ["path".to_owned()]);
        Rc::new(ExpansionContext::new(target, site))
    }

    #[test]
    fn test_fresh_names_avoid_parameters() {
        let context = context(TypeRef::Void);
        assert_eq!(context.fresh_name("path"), "path_1");
        assert_eq!(context.fresh_name("result"), "result");
        let outer = context.push_scope();
        assert_eq!(context.fresh_name("result"), "result_1");
        context.pop_scope(outer);
    }

    #[test]
    fn test_deferred_forms_are_checked() {
        let context = context("Task<string>".parse().unwrap());
        let assign = context
            .deferred_assign(context.fresh_identifier("r"), DeferredCallForm::Awaitable)
            .unwrap();
        insta::assert_snapshot!(compact(&assign), @"var r = await Load_Original(path);");

        let error = context
            .deferred_return(DeferredCallForm::Plain)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "`Plain` deferred call does not fit target `Load` returning `Task<string>`"
        );
    }

    #[test]
    fn test_plain_deferred_return() {
        let context = context(TypeRef::Int);
        let lowered = context.deferred_return(DeferredCallForm::Plain).unwrap();
        insta::assert_snapshot!(compact(&lowered), @"return Load_Original(path);");
    }

    #[test]
    fn test_guard_pops_on_every_exit() {
        assert!(current().is_err());
        let outer = context(TypeRef::Void);
        let _guard = outer.enter();
        {
            let inner = context(TypeRef::Int);
            let _inner_guard = inner.enter();
            assert!(Rc::ptr_eq(&current().unwrap(), &inner));
        }
        assert!(Rc::ptr_eq(&current().unwrap(), &outer));

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let inner = context(TypeRef::Int);
            let _inner_guard = inner.enter();
            panic!("generator failed");
        }));
        assert!(result.is_err());
        assert!(Rc::ptr_eq(&current().unwrap(), &outer));
    }
}
