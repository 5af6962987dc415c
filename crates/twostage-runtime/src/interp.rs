//! A tree-walking interpreter for generator programs.
//!
//! Generator programs are ordinary templates, so this evaluates the
//! template language directly. Every call reaches its expansion context
//! through the interpreter; only host functions go through the
//! thread-local stack.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use twostage_syntax::{SyntaxKind, SyntaxNode, TokenKind};

use crate::context::ExpansionContext;
use crate::error::{ExpansionError, ExpansionResult};
use crate::host;
use crate::value::Value;

/// Variables visible at a point of the program. Clones share frames, so a
/// closure sees later assignments to the variables it captured.
#[derive(Clone, Debug, Default)]
pub struct Env {
    frames: Vec<Rc<RefCell<HashMap<String, Value>>>>,
}

impl Env {
    fn nested(&self) -> Env {
        let mut frames = self.frames.clone();
        frames.push(Rc::default());
        Env { frames }
    }

    fn define(&self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last() {
            frame.borrow_mut().insert(name.to_owned(), value);
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.borrow().get(name).cloned())
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        for frame in self.frames.iter().rev() {
            let mut frame = frame.borrow_mut();
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }
}

#[derive(Debug)]
pub struct Closure {
    parameters: Vec<String>,
    body: SyntaxNode,
    captured: Env,
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl Flow {
    /// The value a body finished with. Jumps must not leave a body.
    fn into_value(self) -> ExpansionResult<Value> {
        match self {
            Flow::Normal => Ok(Value::Null),
            Flow::Return(value) => Ok(value),
            Flow::Break => Err(ExpansionError::StrayJump("break".to_owned())),
            Flow::Continue => Err(ExpansionError::StrayJump("continue".to_owned())),
        }
    }
}

pub struct Interpreter {
    context: Rc<ExpansionContext>,
}

fn child(node: &SyntaxNode, index: usize) -> ExpansionResult<&SyntaxNode> {
    node.child_node(index)
        .ok_or_else(|| ExpansionError::type_error(format_args!("malformed {}", node.kind())))
}

fn operator(node: &SyntaxNode) -> ExpansionResult<TokenKind> {
    node.token()
        .map(|token| token.kind())
        .ok_or_else(|| ExpansionError::type_error(format_args!("malformed {}", node.kind())))
}

impl Interpreter {
    pub fn new(context: Rc<ExpansionContext>) -> Self {
        Self { context }
    }

    /// Runs a generator template, binding its parameters to the context's
    /// arguments, and returns what its body returns.
    pub fn run(&self, program: &SyntaxNode) -> ExpansionResult<Value> {
        let env = Env::default().nested();
        for parameter in program
            .child_nodes()
            .filter(|node| node.kind() == SyntaxKind::Parameter)
        {
            let name = parameter.name().unwrap_or_default();
            let value = self
                .context
                .argument(name)
                .cloned()
                .ok_or_else(|| ExpansionError::MissingArgument(name.to_owned()))?;
            env.define(name, value);
        }
        let Some(body) = program.child_node_of_kind(SyntaxKind::Block) else {
            return Ok(Value::Null);
        };
        self.exec(body, &env)?.into_value()
    }

    // Statements

    fn exec(&self, statement: &SyntaxNode, env: &Env) -> ExpansionResult<Flow> {
        use SyntaxKind::*;
        match statement.kind() {
            Block => {
                let scope = env.nested();
                for child in statement.child_nodes() {
                    let flow = self.exec(child, &scope)?;
                    if !matches!(flow, Flow::Normal) {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            LocalDeclaration => {
                for declarator in statement.child_nodes() {
                    let value = match declarator.child_node(0) {
                        Some(initializer) => self.eval(initializer, env)?,
                        None => Value::Null,
                    };
                    env.define(declarator.name().unwrap_or_default(), value);
                }
                Ok(Flow::Normal)
            }
            ExpressionStatement => {
                self.eval(child(statement, 0)?, env)?;
                Ok(Flow::Normal)
            }
            EmptyStatement => Ok(Flow::Normal),
            IfStatement => {
                if self.eval(child(statement, 0)?, env)?.as_bool()? {
                    self.exec(child(statement, 1)?, env)
                } else if let Some(else_clause) = statement.child_node_of_kind(ElseClause) {
                    self.exec(child(else_clause, 0)?, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            ForEachStatement => {
                if statement.token_of_kind(TokenKind::AwaitKeyword).is_some() {
                    return Err(ExpansionError::Unsupported("await foreach".to_owned()));
                }
                let name = statement.name().unwrap_or_default();
                let items = self.eval(child(statement, 0)?, env)?.items()?;
                let body = child(statement, 1)?;
                for item in items {
                    let scope = env.nested();
                    scope.define(name, item);
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            WhileStatement => {
                let condition = child(statement, 0)?;
                let body = child(statement, 1)?;
                while self.eval(condition, env)?.as_bool()? {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            DoStatement => {
                let body = child(statement, 0)?;
                let condition = child(statement, 1)?;
                loop {
                    match self.exec(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(condition, env)?.as_bool()? {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            ForStatement => {
                let scope = env.nested();
                self.exec(child(statement, 0)?, &scope)?;
                let condition = child(statement, 1)?;
                let increment = child(statement, 2)?;
                let body = child(statement, 3)?;
                loop {
                    if condition.kind() != EmptyStatement
                        && !self.eval(condition, &scope)?.as_bool()?
                    {
                        break;
                    }
                    match self.exec(body, &scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if increment.kind() != EmptyStatement {
                        self.eval(increment, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            ReturnStatement => {
                let value = match statement.child_node(0) {
                    Some(value) => self.eval(value, env)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            BreakStatement => Ok(Flow::Break),
            ContinueStatement => Ok(Flow::Continue),
            kind if kind.is_expression() => {
                self.eval(statement, env)?;
                Ok(Flow::Normal)
            }
            kind => Err(ExpansionError::Unsupported(kind.to_string())),
        }
    }

    // Expressions

    fn eval(&self, node: &SyntaxNode, env: &Env) -> ExpansionResult<Value> {
        use SyntaxKind::*;
        match node.kind() {
            LiteralExpression => literal(node),
            IdentifierName => {
                let name = node.name().unwrap_or_default();
                match env.lookup(name) {
                    Some(value) => Ok(value),
                    None => host::global(name, &self.context),
                }
            }
            ParenthesizedExpression => self.eval(child(node, 0)?, env),
            BinaryExpression => {
                let operator = operator(node)?;
                let lhs = self.eval(child(node, 0)?, env)?;
                match operator {
                    TokenKind::AmpersandAmpersand if !lhs.as_bool()? => Ok(Value::Bool(false)),
                    TokenKind::BarBar if lhs.as_bool()? => Ok(Value::Bool(true)),
                    TokenKind::AmpersandAmpersand | TokenKind::BarBar => {
                        Ok(Value::Bool(self.eval(child(node, 1)?, env)?.as_bool()?))
                    }
                    _ => {
                        let rhs = self.eval(child(node, 1)?, env)?;
                        host::binary(operator, &lhs, &rhs)
                    }
                }
            }
            PrefixUnaryExpression => {
                let operand = self.eval(child(node, 0)?, env)?;
                match (operator(node)?, operand) {
                    (TokenKind::Bang, operand) => Ok(Value::Bool(!operand.as_bool()?)),
                    (TokenKind::Minus, Value::Int(value)) => Ok(Value::Int(value.wrapping_neg())),
                    (TokenKind::Minus, Value::Float(value)) => Ok(Value::Float(-value)),
                    (_, operand) => Err(ExpansionError::type_error(format_args!(
                        "cannot negate {}",
                        operand.type_name()
                    ))),
                }
            }
            PostfixUnaryExpression => {
                let target = child(node, 0)?;
                let old = self.eval(target, env)?;
                let step = match operator(node)? {
                    TokenKind::PlusPlus => TokenKind::Plus,
                    _ => TokenKind::Minus,
                };
                let new = host::binary(step, &old, &Value::Int(1))?;
                self.assign(target, new, env)?;
                Ok(old)
            }
            AssignmentExpression => {
                let target = child(node, 0)?;
                let value = self.eval(child(node, 1)?, env)?;
                let value = match operator(node)? {
                    TokenKind::PlusEquals => {
                        host::binary(TokenKind::Plus, &self.eval(target, env)?, &value)?
                    }
                    TokenKind::MinusEquals => {
                        host::binary(TokenKind::Minus, &self.eval(target, env)?, &value)?
                    }
                    _ => value,
                };
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
            ConditionalExpression => {
                if self.eval(child(node, 0)?, env)?.as_bool()? {
                    self.eval(child(node, 1)?, env)
                } else {
                    self.eval(child(node, 2)?, env)
                }
            }
            InvocationExpression => self.invoke(node, env),
            MemberAccessExpression => {
                let receiver = self.eval(child(node, 0)?, env)?;
                host::member(&receiver, node.name().unwrap_or_default())
            }
            ElementAccessExpression => {
                let receiver = self.eval(child(node, 0)?, env)?;
                let index = self.eval(child(node, 1)?, env)?.as_int()?;
                let items = receiver.items()?;
                usize::try_from(index)
                    .ok()
                    .and_then(|index| items.get(index).cloned())
                    .ok_or_else(|| {
                        ExpansionError::type_error(format_args!(
                            "index {index} is out of range for length {}",
                            items.len()
                        ))
                    })
            }
            CastExpression => {
                let ty = child(node, 0)?
                    .token()
                    .map(|token| token.text().to_owned())
                    .unwrap_or_default();
                let value = self.eval(child(node, 1)?, env)?;
                cast(&ty, value)
            }
            ListExpression => {
                let items = node
                    .child_nodes()
                    .map(|item| self.eval(item, env))
                    .collect::<ExpansionResult<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            LambdaExpression => {
                let parameters = node
                    .child_nodes()
                    .filter(|child| child.kind() == Parameter)
                    .map(|parameter| parameter.name().unwrap_or_default().to_owned())
                    .collect();
                let body = node
                    .child_nodes()
                    .last()
                    .filter(|body| body.kind() != Parameter)
                    .cloned()
                    .ok_or_else(|| ExpansionError::type_error("lambda without a body"))?;
                Ok(Value::Closure(Rc::new(Closure {
                    parameters,
                    body,
                    captured: env.clone(),
                })))
            }
            QueryExpression => self.query(node, env),
            ThisExpression => Err(ExpansionError::Unsupported("this".to_owned())),
            AwaitExpression => Err(ExpansionError::Unsupported("await".to_owned())),
            kind => Err(ExpansionError::Unsupported(kind.to_string())),
        }
    }

    fn assign(&self, target: &SyntaxNode, value: Value, env: &Env) -> ExpansionResult<()> {
        if target.kind() != SyntaxKind::IdentifierName {
            return Err(ExpansionError::Unsupported(format!(
                "assignment to {}",
                target.kind()
            )));
        }
        let name = target.name().unwrap_or_default();
        if env.assign(name, value) {
            Ok(())
        } else {
            Err(ExpansionError::Undefined(name.to_owned()))
        }
    }

    fn invoke(&self, node: &SyntaxNode, env: &Env) -> ExpansionResult<Value> {
        let callee = child(node, 0)?;
        let arguments = node
            .child_nodes()
            .skip(1)
            .map(|argument| self.eval(argument, env))
            .collect::<ExpansionResult<Vec<_>>>()?;
        if callee.kind() == SyntaxKind::MemberAccessExpression {
            let receiver = self.eval(child(callee, 0)?, env)?;
            return host::call_method(&receiver, callee.name().unwrap_or_default(), arguments);
        }
        match self.eval(callee, env)? {
            Value::Closure(closure) => self.call(&closure, arguments),
            other => Err(ExpansionError::type_error(format_args!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    /// Calls a closure in a nested lexical scope of the generated code, so
    /// that sibling blocks built by closures can reuse local names.
    fn call(&self, closure: &Closure, arguments: Vec<Value>) -> ExpansionResult<Value> {
        if arguments.len() != closure.parameters.len() {
            return Err(ExpansionError::type_error(format_args!(
                "closure expects {} arguments, got {}",
                closure.parameters.len(),
                arguments.len()
            )));
        }
        let scope = closure.captured.nested();
        for (name, value) in closure.parameters.iter().zip(arguments) {
            scope.define(name, value);
        }
        let outer = self.context.push_scope();
        let result = if closure.body.kind() == SyntaxKind::Block {
            self.exec(&closure.body, &scope).and_then(Flow::into_value)
        } else {
            self.eval(&closure.body, &scope)
        };
        self.context.pop_scope(outer);
        result
    }

    /// `from x in source where condition select projection`
    fn query(&self, node: &SyntaxNode, env: &Env) -> ExpansionResult<Value> {
        let name = node.name().unwrap_or_default();
        let source = self.eval(child(node, 0)?, env)?.items()?;
        let condition = node
            .child_node_of_kind(SyntaxKind::WhereClause)
            .map(|clause| child(clause, 0))
            .transpose()?;
        let projection = node
            .child_node_of_kind(SyntaxKind::SelectClause)
            .map(|clause| child(clause, 0))
            .transpose()?;
        let mut results = Vec::new();
        for item in source {
            let scope = env.nested();
            scope.define(name, item.clone());
            if let Some(condition) = condition {
                if !self.eval(condition, &scope)?.as_bool()? {
                    continue;
                }
            }
            results.push(match projection {
                Some(projection) => self.eval(projection, &scope)?,
                None => item,
            });
        }
        Ok(Value::list(results))
    }
}

fn literal(node: &SyntaxNode) -> ExpansionResult<Value> {
    let token = node
        .token()
        .ok_or_else(|| ExpansionError::type_error("literal without a token"))?;
    let malformed = || ExpansionError::type_error(format_args!("malformed literal `{}`", token.text()));
    Ok(match token.kind() {
        TokenKind::IntLiteral => Value::Int(token.text().parse().map_err(|_| malformed())?),
        TokenKind::FloatLiteral => Value::Float(token.text().parse().map_err(|_| malformed())?),
        TokenKind::StringLiteral => Value::string(token.text()),
        TokenKind::CharLiteral => Value::Char(token.text().chars().next().ok_or_else(malformed)?),
        TokenKind::TrueKeyword => Value::Bool(true),
        TokenKind::FalseKeyword => Value::Bool(false),
        _ => Value::Null,
    })
}

fn cast(ty: &str, value: Value) -> ExpansionResult<Value> {
    Ok(match (ty, value) {
        ("int" | "long", Value::Float(value)) => Value::Int(value as i64),
        ("int" | "long", Value::Char(value)) => Value::Int(i64::from(u32::from(value))),
        ("float" | "double", Value::Int(value)) => Value::Float(value as f64),
        ("char", Value::Int(value)) => u32::try_from(value)
            .ok()
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or_else(|| ExpansionError::type_error(format_args!("{value} is not a char")))?,
        ("string", value) => Value::string(value.to_string()),
        (_, value) => value,
    })
}

#[cfg(test)]
mod tests {
    use twostage_core::TypeRef;
    use twostage_syntax::parse_expression;

    use super::*;
    use crate::deferred::InvokeOriginal;
    use crate::target::TargetMethod;

    fn evaluate(source: &str) -> ExpansionResult<Value> {
        let target = TargetMethod::new("F", TypeRef::Void);
        let context = Rc::new(ExpansionContext::new(target, InvokeOriginal::new("F", [])));
        let expression = parse_expression(source).unwrap();
        Interpreter::new(context).eval(&expression, &Env::default().nested())
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(evaluate(r#""n" + (4 - 6)"#).unwrap(), Value::string("n-2"));
        assert_eq!(evaluate("Math.Max(3, 9) % 4").unwrap(), Value::Int(1));
        assert_eq!(evaluate("(int)2.9").unwrap(), Value::Int(2));
        assert_eq!(evaluate(r#""abc".ToUpper().Length"#).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(evaluate("false && missing").unwrap(), Value::Bool(false));
        assert_eq!(evaluate("true || missing").unwrap(), Value::Bool(true));
        assert_eq!(
            evaluate("true && missing"),
            Err(ExpansionError::Undefined("missing".to_owned()))
        );
    }

    #[test]
    fn test_closures_and_queries() {
        assert_eq!(evaluate("((x) => x * 2)(21)").unwrap(), Value::Int(42));
        let evens = evaluate("from x in [1, 2, 3, 4] where x % 2 == 0 select x * 10").unwrap();
        assert_eq!(evens.items().unwrap(), vec![Value::Int(20), Value::Int(40)]);
        assert_eq!(evaluate("[5, 6, 7][1]").unwrap(), Value::Int(6));
        assert!(evaluate("[5][3]").is_err());
    }

    #[test]
    fn test_unsupported_constructs() {
        assert_eq!(
            evaluate("this"),
            Err(ExpansionError::Unsupported("this".to_owned()))
        );
        assert!(matches!(
            evaluate("await F()"),
            Err(ExpansionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_jumps_do_not_escape_closures() {
        assert_eq!(
            evaluate("(() => { break; })()"),
            Err(ExpansionError::StrayJump("break".to_owned()))
        );
        assert_eq!(
            evaluate("(() => { if (true) { continue; } return 1; })()"),
            Err(ExpansionError::StrayJump("continue".to_owned()))
        );
        assert_eq!(evaluate("(() => { return 1; })()").unwrap(), Value::Int(1));
    }
}
