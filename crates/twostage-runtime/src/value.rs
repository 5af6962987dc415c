//! Values of generator programs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use twostage_core::DeferredCallForm;
use twostage_syntax::make;
use twostage_syntax::printer::compact;
use twostage_syntax::{SyntaxNode, SyntaxToken, TokenKind};

use crate::error::{ExpansionError, ExpansionResult};
use crate::interp::Closure;

/// An object supplied by the host, such as the `meta` API.
pub trait HostObject: fmt::Debug {
    fn type_name(&self) -> &str;

    fn member(&self, name: &str) -> ExpansionResult<Value> {
        Err(ExpansionError::no_member(self.type_name(), name))
    }

    fn call(&self, name: &str, _arguments: Vec<Value>) -> ExpansionResult<Value> {
        Err(ExpansionError::no_member(self.type_name(), name))
    }

    /// The generated code this object stands for when spliced.
    fn to_syntax(&self) -> Option<SyntaxNode> {
        None
    }
}

/// Built-in globals of generator programs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Namespace {
    Syntax,
    Context,
    TokenKind,
    DeferredCallForm,
    Math,
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Rc<str>),
    /// Shared and mutable: statement accumulators are lists.
    List(Rc<RefCell<Vec<Value>>>),
    Node(SyntaxNode),
    Token(SyntaxToken),
    TokenKind(TokenKind),
    Form(DeferredCallForm),
    Object(Rc<dyn HostObject>),
    Closure(Rc<Closure>),
    Namespace(Namespace),
}

impl Value {
    pub fn string(text: impl Into<Rc<str>>) -> Self {
        Value::String(text.into())
    }

    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn object(object: impl HostObject + 'static) -> Self {
        Value::Object(Rc::new(object))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::List(_) => "List",
            Value::Node(_) => "SyntaxNode",
            Value::Token(_) => "SyntaxToken",
            Value::TokenKind(_) => "TokenKind",
            Value::Form(_) => "DeferredCallForm",
            Value::Object(object) => object.type_name(),
            Value::Closure(_) => "closure",
            Value::Namespace(_) => "namespace",
        }
    }

    pub fn as_bool(&self) -> ExpansionResult<bool> {
        match self {
            Value::Bool(value) => Ok(*value),
            other => Err(ExpansionError::type_error(format_args!(
                "expected bool, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_int(&self) -> ExpansionResult<i64> {
        match self {
            Value::Int(value) => Ok(*value),
            Value::Char(value) => Ok(i64::from(u32::from(*value))),
            other => Err(ExpansionError::type_error(format_args!(
                "expected int, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_float(&self) -> ExpansionResult<f64> {
        match self {
            Value::Float(value) => Ok(*value),
            Value::Int(value) => Ok(*value as f64),
            other => Err(ExpansionError::type_error(format_args!(
                "expected a number, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_node(&self) -> ExpansionResult<&SyntaxNode> {
        match self {
            Value::Node(node) => Ok(node),
            other => Err(ExpansionError::type_error(format_args!(
                "expected a syntax node, found {}",
                other.type_name()
            ))),
        }
    }

    /// Elements of a list or the characters of a string.
    pub fn items(&self) -> ExpansionResult<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::String(text) => Ok(text.chars().map(Value::Char).collect()),
            other => Err(ExpansionError::type_error(format_args!(
                "cannot iterate over {}",
                other.type_name()
            ))),
        }
    }

    /// Generated code standing for this value.
    pub fn to_syntax(&self) -> ExpansionResult<SyntaxNode> {
        Ok(match self {
            Value::Node(node) => node.clone(),
            Value::Token(token) if token.kind() == TokenKind::Identifier => {
                make::identifier_name_from(token.clone())
            }
            Value::Null => make::keyword_literal(TokenKind::NullKeyword),
            Value::Bool(true) => make::keyword_literal(TokenKind::TrueKeyword),
            Value::Bool(false) => make::keyword_literal(TokenKind::FalseKeyword),
            Value::Int(value) => make::int_literal(*value),
            Value::Float(value) => {
                make::literal(make::token(TokenKind::FloatLiteral, &float_text(*value)))
            }
            Value::Char(value) => {
                make::literal(make::token(TokenKind::CharLiteral, &value.to_string()))
            }
            Value::String(text) => make::string_literal(text),
            Value::List(items) => {
                let elements = items
                    .borrow()
                    .iter()
                    .map(Value::to_syntax)
                    .collect::<ExpansionResult<Vec<_>>>()?;
                make::node(
                    twostage_syntax::SyntaxKind::ListExpression,
                    elements.into_iter().map(Into::into),
                )
            }
            Value::Object(object) => object.to_syntax().ok_or_else(|| {
                ExpansionError::type_error(format_args!(
                    "{} cannot be spliced into generated code",
                    object.type_name()
                ))
            })?,
            other => {
                return Err(ExpansionError::type_error(format_args!(
                    "{} cannot be spliced into generated code",
                    other.type_name()
                )));
            }
        })
    }
}

/// Spelling of a floating literal; always has a fraction or exponent.
pub fn float_text(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                matches!((self.as_float(), other.as_float()), (Ok(a), Ok(b)) if a == b)
            }
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Token(a), Value::Token(b)) => a == b,
            (Value::TokenKind(a), Value::TokenKind(b)) => a == b,
            (Value::Form(a), Value::Form(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Char(value) => write!(f, "{value}"),
            Value::String(text) => f.write_str(text),
            Value::Node(node) => f.write_str(&compact(node)),
            Value::Token(token) => f.write_str(token.text()),
            Value::TokenKind(kind) => write!(f, "{kind}"),
            Value::Form(form) => write!(f, "{form}"),
            other => f.write_str(other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_literals() {
        assert_eq!(compact(&Value::string("a\"b").to_syntax().unwrap()), r#""a\"b""#);
        assert_eq!(compact(&Value::Float(2.0).to_syntax().unwrap()), "2.0");
        assert_eq!(compact(&Value::Int(-3).to_syntax().unwrap()), "-3");
        let list = Value::list(vec![Value::Int(1), Value::Bool(true)]);
        assert_eq!(compact(&list.to_syntax().unwrap()), "[1, true]");
        assert!(Value::Form(DeferredCallForm::Plain).to_syntax().is_err());
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::string("2"));
    }
}
