//! Native functions behind the globals of generator programs.
//!
//! `Syntax.*` builds nodes and tokens, `Context.*` talks to the current
//! expansion context, `TokenKind.*` and `DeferredCallForm.*` name
//! constants, and `Math.*` is a handful of numeric helpers.

use twostage_core::{DeferredCallForm, TypeRef};
use twostage_syntax::make;
use twostage_syntax::{Annotation, SyntaxElement, SyntaxKind, SyntaxToken, TokenKind};

use crate::context::{self, ExpansionContext};
use crate::error::{ExpansionError, ExpansionResult};
use crate::value::{float_text, Namespace, Value};

/// A global name not bound by the program itself.
pub fn global(name: &str, context: &ExpansionContext) -> ExpansionResult<Value> {
    Ok(match name {
        "meta" => context.meta(),
        "Syntax" => Value::Namespace(Namespace::Syntax),
        "Context" => Value::Namespace(Namespace::Context),
        "TokenKind" => Value::Namespace(Namespace::TokenKind),
        "DeferredCallForm" => Value::Namespace(Namespace::DeferredCallForm),
        "Math" => Value::Namespace(Namespace::Math),
        _ => return Err(ExpansionError::Undefined(name.to_owned())),
    })
}

pub fn namespace_member(namespace: Namespace, name: &str) -> ExpansionResult<Value> {
    let found = match namespace {
        Namespace::TokenKind => TokenKind::from_name(name).map(Value::TokenKind),
        Namespace::DeferredCallForm => DeferredCallForm::ALL
            .into_iter()
            .find(|form| form.name() == name)
            .map(Value::Form),
        _ => None,
    };
    found.ok_or_else(|| ExpansionError::no_member(format_args!("{namespace:?}"), name))
}

pub fn call_namespace(
    namespace: Namespace,
    name: &str,
    arguments: Vec<Value>,
) -> ExpansionResult<Value> {
    match namespace {
        Namespace::Syntax => syntax(name, arguments),
        Namespace::Context => context_call(name, arguments),
        Namespace::Math => math(name, arguments),
        Namespace::TokenKind | Namespace::DeferredCallForm => Err(ExpansionError::no_member(
            format_args!("{namespace:?}"),
            name,
        )),
    }
}

fn argument(arguments: &[Value], index: usize, function: &str) -> ExpansionResult<Value> {
    arguments.get(index).cloned().ok_or_else(|| {
        ExpansionError::type_error(format_args!(
            "`{function}` expects at least {} arguments",
            index + 1
        ))
    })
}

fn text_of(value: &Value) -> ExpansionResult<String> {
    match value {
        Value::String(text) => Ok(text.to_string()),
        Value::Token(token) => Ok(token.text().to_owned()),
        other => Err(ExpansionError::type_error(format_args!(
            "expected a string, found {}",
            other.type_name()
        ))),
    }
}

fn syntax(name: &str, arguments: Vec<Value>) -> ExpansionResult<Value> {
    let function = format!("Syntax.{name}");
    Ok(match name {
        "StatementList" => Value::list(Vec::new()),
        "Token" => {
            let Value::TokenKind(kind) = argument(&arguments, 0, &function)? else {
                return Err(ExpansionError::type_error("`Syntax.Token` expects a TokenKind"));
            };
            let token = match arguments.get(1) {
                Some(text) => make::token(kind, &text_of(text)?),
                None if kind.canonical_text().is_some() => SyntaxToken::canonical(kind),
                None => {
                    return Err(ExpansionError::type_error(format_args!(
                        "a `{kind}` token needs its text"
                    )));
                }
            };
            Value::Token(token)
        }
        "StringLiteral" => {
            let value = argument(&arguments, 0, &function)?;
            Value::Token(make::token(TokenKind::StringLiteral, &value.to_string()))
        }
        "CharLiteral" => {
            let value = argument(&arguments, 0, &function)?;
            Value::Token(make::token(TokenKind::CharLiteral, &value.to_string()))
        }
        "IntLiteral" => {
            let value = argument(&arguments, 0, &function)?.as_int()?;
            Value::Token(make::token(TokenKind::IntLiteral, &value.to_string()))
        }
        "FloatLiteral" => {
            let value = argument(&arguments, 0, &function)?.as_float()?;
            Value::Token(make::token(TokenKind::FloatLiteral, &float_text(value)))
        }
        "Splice" => Value::Node(argument(&arguments, 0, &function)?.to_syntax()?),
        "SyntheticBlock" => Value::Node(
            construct(SyntaxKind::Block, arguments)?.with_annotation(Annotation::Synthetic),
        ),
        _ => {
            let kind = SyntaxKind::from_name(name)
                .ok_or_else(|| ExpansionError::no_member("Syntax", name))?;
            Value::Node(construct(kind, arguments)?)
        }
    })
}

/// A node of `kind` whose children are the arguments, with lists spread
/// and nulls left out.
fn construct(
    kind: SyntaxKind,
    arguments: Vec<Value>,
) -> ExpansionResult<twostage_syntax::SyntaxNode> {
    let mut children: Vec<SyntaxElement> = Vec::with_capacity(arguments.len());
    for argument in arguments {
        push_child(&mut children, argument)?;
    }
    Ok(make::node(kind, children))
}

fn push_child(children: &mut Vec<SyntaxElement>, value: Value) -> ExpansionResult<()> {
    match value {
        Value::Null => {}
        Value::Node(node) => children.push(node.into()),
        Value::Token(token) => children.push(token.into()),
        Value::List(items) => {
            for item in items.borrow().iter() {
                push_child(children, item.clone())?;
            }
        }
        other => {
            return Err(ExpansionError::type_error(format_args!(
                "{} is not a syntax element",
                other.type_name()
            )));
        }
    }
    Ok(())
}

fn context_call(name: &str, arguments: Vec<Value>) -> ExpansionResult<Value> {
    let context = context::current()?;
    let function = format!("Context.{name}");
    match name {
        "FreshIdentifier" => {
            let hint = text_of(&argument(&arguments, 0, &function)?)?;
            Ok(Value::Token(context.fresh_identifier(&hint)))
        }
        "ReturnStatement" => {
            let value = match arguments.first() {
                Some(value) => Some(value.to_syntax()?),
                None => None,
            };
            let dynamic = match arguments.get(1) {
                Some(ty) => text_of(ty)?
                    .parse::<TypeRef>()
                    .is_ok_and(|ty| ty.is_placeholder()),
                None => false,
            };
            Ok(Value::Node(context.lower_return(value, dynamic)))
        }
        "CreateAssignStatement" => {
            let Value::Token(variable) = argument(&arguments, 0, &function)? else {
                return Err(ExpansionError::type_error(
                    "`Context.CreateAssignStatement` expects an identifier token",
                ));
            };
            let form = form_of(&argument(&arguments, 1, &function)?)?;
            Ok(Value::Node(context.deferred_assign(variable, form)?))
        }
        "CreateReturnStatement" => {
            let form = form_of(&argument(&arguments, 0, &function)?)?;
            Ok(Value::Node(context.deferred_return(form)?))
        }
        _ => Err(ExpansionError::no_member("Context", name)),
    }
}

fn form_of(value: &Value) -> ExpansionResult<DeferredCallForm> {
    match value {
        Value::Form(form) => Ok(*form),
        other => Err(ExpansionError::type_error(format_args!(
            "expected a DeferredCallForm, found {}",
            other.type_name()
        ))),
    }
}

fn math(name: &str, arguments: Vec<Value>) -> ExpansionResult<Value> {
    let function = format!("Math.{name}");
    let first = argument(&arguments, 0, &function)?;
    let integral = arguments.iter().all(|value| matches!(value, Value::Int(_)));
    match (name, integral) {
        ("Abs", true) => Ok(Value::Int(first.as_int()?.abs())),
        ("Abs", false) => Ok(Value::Float(first.as_float()?.abs())),
        ("Max" | "Min", _) => {
            let second = argument(&arguments, 1, &function)?;
            if integral {
                let (a, b) = (first.as_int()?, second.as_int()?);
                Ok(Value::Int(if name == "Max" { a.max(b) } else { a.min(b) }))
            } else {
                let (a, b) = (first.as_float()?, second.as_float()?);
                Ok(Value::Float(if name == "Max" { a.max(b) } else { a.min(b) }))
            }
        }
        _ => Err(ExpansionError::no_member("Math", name)),
    }
}

/// Methods of built-in values. Host objects answer their own.
pub fn call_method(receiver: &Value, name: &str, arguments: Vec<Value>) -> ExpansionResult<Value> {
    match (receiver, name) {
        (Value::Namespace(namespace), _) => call_namespace(*namespace, name, arguments),
        (Value::List(items), "Add") => {
            items.borrow_mut().extend(arguments);
            Ok(Value::Null)
        }
        (Value::String(text), "ToUpper") => Ok(Value::string(text.to_uppercase())),
        (Value::String(text), "ToLower") => Ok(Value::string(text.to_lowercase())),
        (Value::Object(object), _) => object.call(name, arguments),
        _ => Err(ExpansionError::no_member(receiver.type_name(), name)),
    }
}

pub fn member(receiver: &Value, name: &str) -> ExpansionResult<Value> {
    match (receiver, name) {
        (Value::Namespace(namespace), _) => namespace_member(*namespace, name),
        (Value::List(items), "Count") => Ok(Value::Int(items.borrow().len() as i64)),
        (Value::String(text), "Length") => Ok(Value::Int(text.chars().count() as i64)),
        (Value::Object(object), _) => object.member(name),
        _ => Err(ExpansionError::no_member(receiver.type_name(), name)),
    }
}

pub fn binary(operator: TokenKind, lhs: &Value, rhs: &Value) -> ExpansionResult<Value> {
    use TokenKind::*;
    let mismatch = || {
        ExpansionError::type_error(format_args!(
            "`{}` cannot combine {} and {}",
            operator.canonical_text().unwrap_or_default(),
            lhs.type_name(),
            rhs.type_name()
        ))
    };
    match operator {
        EqualsEquals => return Ok(Value::Bool(lhs == rhs)),
        BangEquals => return Ok(Value::Bool(lhs != rhs)),
        Plus if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) => {
            return Ok(Value::string(format!("{lhs}{rhs}")));
        }
        _ => {}
    }
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(match operator {
            Plus => Value::Int(a.wrapping_add(*b)),
            Minus => Value::Int(a.wrapping_sub(*b)),
            Star => Value::Int(a.wrapping_mul(*b)),
            Slash | Percent if *b == 0 => {
                return Err(ExpansionError::type_error("division by zero"));
            }
            Slash => Value::Int(a.wrapping_div(*b)),
            Percent => Value::Int(a.wrapping_rem(*b)),
            Less => Value::Bool(a < b),
            Greater => Value::Bool(a > b),
            LessEquals => Value::Bool(a <= b),
            GreaterEquals => Value::Bool(a >= b),
            _ => return Err(mismatch()),
        }),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (lhs.as_float()?, rhs.as_float()?);
            Ok(match operator {
                Plus => Value::Float(a + b),
                Minus => Value::Float(a - b),
                Star => Value::Float(a * b),
                Slash => Value::Float(a / b),
                Percent => Value::Float(a % b),
                Less => Value::Bool(a < b),
                Greater => Value::Bool(a > b),
                LessEquals => Value::Bool(a <= b),
                GreaterEquals => Value::Bool(a >= b),
                _ => return Err(mismatch()),
            })
        }
        (Value::String(a), Value::String(b)) => Ok(match operator {
            Less => Value::Bool(a < b),
            Greater => Value::Bool(a > b),
            LessEquals => Value::Bool(a <= b),
            GreaterEquals => Value::Bool(a >= b),
            _ => return Err(mismatch()),
        }),
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use twostage_syntax::printer::compact;

    use super::*;

    #[test]
    fn test_constructors_spread_lists() {
        let statements = Value::list(vec![
            Value::Node(make::expression_statement(make::call("f", []))),
            Value::Node(make::return_statement(None)),
        ]);
        let block = syntax("Block", vec![statements]).unwrap();
        insta::assert_snapshot!(compact(block.as_node().unwrap()), @"{ f(); return; }");
    }

    #[test]
    fn test_token_text_defaults_to_spelling() {
        let Value::Token(plus) = syntax("Token", vec![Value::TokenKind(TokenKind::Plus)]).unwrap()
        else {
            panic!("expected a token");
        };
        assert_eq!(plus.text(), "+");
        let literal = syntax(
            "LiteralExpression",
            vec![syntax("IntLiteral", vec![Value::Int(41)]).unwrap()],
        )
        .unwrap();
        assert_eq!(compact(literal.as_node().unwrap()), "41");
    }

    #[test]
    fn test_unknown_constructor() {
        assert!(matches!(
            syntax("Frobnicate", vec![]),
            Err(ExpansionError::NoMember { .. })
        ));
    }

    #[test]
    fn test_context_requires_entered_context() {
        assert_eq!(
            context_call("FreshIdentifier", vec![Value::string("x")]),
            Err(ExpansionError::NoContext)
        );
    }

    #[test]
    fn test_binary() {
        assert_eq!(
            binary(TokenKind::Plus, &Value::string("n="), &Value::Int(2)).unwrap(),
            Value::string("n=2")
        );
        assert_eq!(
            binary(TokenKind::Greater, &Value::Int(3), &Value::Float(2.5)).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(TokenKind::Slash, &Value::Int(1), &Value::Int(0)).is_err());
    }
}
