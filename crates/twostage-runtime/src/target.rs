//! The method a template is expanded into.

use twostage_core::{DeferredCallForm, TypeRef};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetParameter {
    pub name: String,
    pub ty: TypeRef,
}

impl TargetParameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Description of the target method handed to the expansion context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetMethod {
    pub name: String,
    pub return_type: TypeRef,
    pub parameters: Vec<TargetParameter>,
}

impl TargetMethod {
    pub fn new(name: impl Into<String>, return_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.parameters.push(TargetParameter::new(name, ty));
        self
    }

    pub fn result_kind(&self) -> ResultKind {
        ResultKind::of(&self.return_type)
    }
}

/// How a target hands back its result, which decides how `return` is
/// lowered and which deferred-call form it accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultKind {
    Void,
    Value(TypeRef),
    /// Returns the awaited type from an asynchronous body.
    Awaitable(TypeRef),
    Sequence(TypeRef),
    Enumerator(TypeRef),
    AsyncSequence(TypeRef),
    AsyncEnumerator(TypeRef),
}

impl ResultKind {
    pub fn of(return_type: &TypeRef) -> Self {
        match return_type {
            TypeRef::Void => ResultKind::Void,
            TypeRef::Awaitable(inner) => ResultKind::Awaitable((**inner).clone()),
            TypeRef::Sequence(item) => ResultKind::Sequence((**item).clone()),
            TypeRef::Enumerator(item) => ResultKind::Enumerator((**item).clone()),
            TypeRef::AsyncSequence(item) => ResultKind::AsyncSequence((**item).clone()),
            TypeRef::AsyncEnumerator(item) => ResultKind::AsyncEnumerator((**item).clone()),
            other => ResultKind::Value(other.clone()),
        }
    }

    /// Whether a deferred call of `form` can stand for the original body.
    pub fn accepts(&self, form: DeferredCallForm) -> bool {
        use DeferredCallForm::*;
        matches!(
            (self, form),
            (ResultKind::Void | ResultKind::Value(_), Plain)
                | (ResultKind::Awaitable(_), Awaitable)
                | (ResultKind::Sequence(_), Sequence)
                | (ResultKind::Enumerator(_), Enumerator)
                | (ResultKind::AsyncSequence(_), AsyncSequence)
                | (ResultKind::AsyncEnumerator(_), AsyncEnumerator)
        )
    }

    /// The type a `return` statement hands back, if it carries a value.
    pub fn returned_type(&self) -> Option<&TypeRef> {
        match self {
            ResultKind::Value(ty) => Some(ty),
            ResultKind::Awaitable(ty) if !ty.is_void() => Some(ty),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_compatibility() {
        let awaitable = ResultKind::of(&"Task<int>".parse().unwrap());
        assert!(awaitable.accepts(DeferredCallForm::Awaitable));
        assert!(!awaitable.accepts(DeferredCallForm::Plain));
        assert_eq!(awaitable.returned_type(), Some(&TypeRef::Int));

        let void = ResultKind::of(&TypeRef::Void);
        assert!(void.accepts(DeferredCallForm::Plain));
        assert!(!void.accepts(DeferredCallForm::Sequence));
        assert_eq!(void.returned_type(), None);

        let stream = ResultKind::of(&"IAsyncEnumerable<string>".parse().unwrap());
        assert!(stream.accepts(DeferredCallForm::AsyncSequence));
        assert!(!stream.accepts(DeferredCallForm::AsyncEnumerator));
    }
}
