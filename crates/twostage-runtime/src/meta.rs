//! The `meta` object generator programs use to inspect their target.

use std::rc::Rc;

use twostage_syntax::make;
use twostage_syntax::SyntaxNode;

use crate::error::{ExpansionError, ExpansionResult};
use crate::target::{TargetMethod, TargetParameter};
use crate::value::{HostObject, Value};

#[derive(Debug)]
pub struct Meta {
    target: Rc<TargetMethod>,
}

impl Meta {
    pub fn new(target: Rc<TargetMethod>) -> Self {
        Self { target }
    }
}

impl HostObject for Meta {
    fn type_name(&self) -> &str {
        "Meta"
    }

    fn member(&self, name: &str) -> ExpansionResult<Value> {
        match name {
            "Target" => Ok(Value::object(TargetInfo(self.target.clone()))),
            "This" => Ok(Value::Node(make::this_expression())),
            _ => Err(ExpansionError::no_member(self.type_name(), name)),
        }
    }
}

#[derive(Debug)]
struct TargetInfo(Rc<TargetMethod>);

impl HostObject for TargetInfo {
    fn type_name(&self) -> &str {
        "Target"
    }

    fn member(&self, name: &str) -> ExpansionResult<Value> {
        match name {
            "Method" => Ok(Value::object(MethodInfo(self.0.clone()))),
            "Parameters" => Ok(Value::list(
                self.0
                    .parameters
                    .iter()
                    .enumerate()
                    .map(|(index, parameter)| {
                        Value::object(ParameterInfo {
                            index,
                            parameter: parameter.clone(),
                        })
                    })
                    .collect(),
            )),
            _ => Err(ExpansionError::no_member(self.type_name(), name)),
        }
    }
}

#[derive(Debug)]
struct MethodInfo(Rc<TargetMethod>);

impl HostObject for MethodInfo {
    fn type_name(&self) -> &str {
        "Method"
    }

    fn member(&self, name: &str) -> ExpansionResult<Value> {
        match name {
            "Name" => Ok(Value::string(self.0.name.as_str())),
            "ReturnType" => Ok(Value::string(self.0.return_type.to_string())),
            _ => Err(ExpansionError::no_member(self.type_name(), name)),
        }
    }
}

#[derive(Debug)]
struct ParameterInfo {
    index: usize,
    parameter: TargetParameter,
}

impl HostObject for ParameterInfo {
    fn type_name(&self) -> &str {
        "Parameter"
    }

    fn member(&self, name: &str) -> ExpansionResult<Value> {
        match name {
            "Name" => Ok(Value::string(self.parameter.name.as_str())),
            "Type" => Ok(Value::string(self.parameter.ty.to_string())),
            "Index" => Ok(Value::Int(self.index as i64)),
            "Value" => Ok(Value::Node(make::identifier_name(&self.parameter.name))),
            _ => Err(ExpansionError::no_member(self.type_name(), name)),
        }
    }

    /// A parameter spliced as a whole reads the parameter.
    fn to_syntax(&self) -> Option<SyntaxNode> {
        Some(make::identifier_name(&self.parameter.name))
    }
}

#[cfg(test)]
mod tests {
    use twostage_core::TypeRef;
    use twostage_syntax::printer::compact;

    use super::*;

    #[test]
    fn test_parameters() {
        let target = TargetMethod::new("Log", TypeRef::Void)
            .with_parameter("a", TypeRef::String)
            .with_parameter("b", TypeRef::Int);
        let meta = Meta::new(Rc::new(target));
        let Value::Object(target) = meta.member("Target").unwrap() else {
            panic!("Target is not an object");
        };
        let parameters = target.member("Parameters").unwrap().items().unwrap();
        assert_eq!(parameters.len(), 2);
        let Value::Object(second) = &parameters[1] else {
            panic!("parameter is not an object");
        };
        assert_eq!(second.member("Name").unwrap(), Value::string("b"));
        assert_eq!(second.member("Type").unwrap(), Value::string("int"));
        assert_eq!(second.member("Index").unwrap(), Value::Int(1));
        assert_eq!(compact(&parameters[1].to_syntax().unwrap()), "b");
        assert!(second.member("Missing").is_err());
    }
}
