//! Deferred calls: the join point a template stands in for.

use twostage_core::DeferredCallForm;
use twostage_syntax::make;
use twostage_syntax::SyntaxNode;

/// Produces the expression that invokes whatever the template wraps.
pub trait DeferredCallSite: std::fmt::Debug {
    /// The invocation in the requested form. The form was already checked
    /// against the target.
    fn invocation(&self, form: DeferredCallForm) -> SyntaxNode;
}

/// Calls the original implementation of the target, renamed with a
/// suffix, passing the target's parameters through.
#[derive(Clone, Debug)]
pub struct InvokeOriginal {
    pub method: String,
    pub arguments: Vec<String>,
}

impl InvokeOriginal {
    pub const SUFFIX: &'static str = "_Original";

    pub fn new(method: impl Into<String>, arguments: impl IntoIterator<Item = String>) -> Self {
        Self {
            method: method.into(),
            arguments: arguments.into_iter().collect(),
        }
    }
}

impl DeferredCallSite for InvokeOriginal {
    fn invocation(&self, form: DeferredCallForm) -> SyntaxNode {
        let call = make::call(
            &format!("{}{}", self.method, Self::SUFFIX),
            self.arguments
                .iter()
                .map(|argument| make::identifier_name(argument)),
        );
        match form {
            DeferredCallForm::Awaitable => make::await_expression(call),
            _ => call,
        }
    }
}

#[cfg(test)]
mod tests {
    use twostage_syntax::printer::compact;

    use super::*;

    #[test]
    fn test_invoke_original() {
        let site = InvokeOriginal::new("Save", ["path".to_string(), "force".to_string()]);
        assert_eq!(
            compact(&site.invocation(DeferredCallForm::Plain)),
            "Save_Original(path, force)"
        );
        assert_eq!(
            compact(&site.invocation(DeferredCallForm::Awaitable)),
            "await Save_Original(path, force)"
        );
    }
}
