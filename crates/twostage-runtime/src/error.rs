//! Errors raised while expanding a generator.

use derive_more::{Display, Error};
use twostage_core::DeferredCallForm;

pub type ExpansionResult<T> = Result<T, ExpansionError>;

/// Expansion stops at the first error; nothing is accumulated.
#[derive(Clone, Debug, Display, Error, PartialEq)]
pub enum ExpansionError {
    /// The template asked for a deferred call the target cannot provide.
    #[display("`{form}` deferred call does not fit target `{target}` returning `{result}`")]
    FormMismatch {
        form: DeferredCallForm,
        target: String,
        result: String,
    },

    #[display("undefined name `{_0}`")]
    Undefined(#[error(not(source))] String),

    #[display("`{receiver}` has no member `{member}`")]
    NoMember { receiver: String, member: String },

    #[display("type error: {_0}")]
    Type(#[error(not(source))] String),

    #[display("missing template argument `{_0}`")]
    MissingArgument(#[error(not(source))] String),

    #[display("`{_0}` cannot be evaluated at generation time")]
    Unsupported(#[error(not(source))] String),

    /// `break` or `continue` with no enclosing loop in the same body.
    #[display("`{_0}` is not inside a generation-time loop")]
    StrayJump(#[error(not(source))] String),

    #[display("no expansion context is active on this thread")]
    NoContext,

    #[display("generator finished without producing a syntax tree")]
    NoResult,
}

impl ExpansionError {
    pub fn type_error(message: impl std::fmt::Display) -> Self {
        ExpansionError::Type(message.to_string())
    }

    pub fn no_member(receiver: impl std::fmt::Display, member: &str) -> Self {
        ExpansionError::NoMember {
            receiver: receiver.to_string(),
            member: member.to_owned(),
        }
    }
}
