//! Types as seen by the template compiler.
//!
//! The resolver reports these for expressions. Two of them are special to
//! staging: [`TypeRef::Placeholder`] is the type of values that *are*
//! generated code (spelled `dynamic`), and [`TypeRef::Error`] marks an
//! expression whose type could not be determined.

use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Void,
    Bool,
    Char,
    String,
    Int,
    Long,
    Float,
    Double,
    Object,
    Placeholder,
    Named(String),
    List(Box<TypeRef>),
    Awaitable(Box<TypeRef>),
    Sequence(Box<TypeRef>),
    Enumerator(Box<TypeRef>),
    AsyncSequence(Box<TypeRef>),
    AsyncEnumerator(Box<TypeRef>),
    Error,
}

impl TypeRef {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, TypeRef::Placeholder)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeRef::Error)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, TypeRef::Int | TypeRef::Long)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, TypeRef::Float | TypeRef::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    /// The result type of an awaitable, or `self` for anything else.
    pub fn unwrap_awaitable(&self) -> &TypeRef {
        match self {
            TypeRef::Awaitable(inner) => inner,
            other => other,
        }
    }

    /// Element type of lists and sequence-like types.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::List(inner)
            | TypeRef::Sequence(inner)
            | TypeRef::Enumerator(inner)
            | TypeRef::AsyncSequence(inner)
            | TypeRef::AsyncEnumerator(inner) => Some(inner),
            _ => None,
        }
    }

    /// Result of the usual numeric promotion between two operand types.
    pub fn promote(lhs: &TypeRef, rhs: &TypeRef) -> Option<TypeRef> {
        use TypeRef::*;
        let rank = |ty: &TypeRef| match ty {
            Int => Some(0),
            Long => Some(1),
            Float => Some(2),
            Double => Some(3),
            _ => None,
        };
        let (l, r) = (rank(lhs)?, rank(rhs)?);
        Some(if l >= r { lhs.clone() } else { rhs.clone() })
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Char => write!(f, "char"),
            TypeRef::String => write!(f, "string"),
            TypeRef::Int => write!(f, "int"),
            TypeRef::Long => write!(f, "long"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::Double => write!(f, "double"),
            TypeRef::Object => write!(f, "object"),
            TypeRef::Placeholder => write!(f, "dynamic"),
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(inner) => write!(f, "List<{inner}>"),
            TypeRef::Awaitable(inner) => write!(f, "Task<{inner}>"),
            TypeRef::Sequence(inner) => write!(f, "IEnumerable<{inner}>"),
            TypeRef::Enumerator(inner) => write!(f, "IEnumerator<{inner}>"),
            TypeRef::AsyncSequence(inner) => write!(f, "IAsyncEnumerable<{inner}>"),
            TypeRef::AsyncEnumerator(inner) => write!(f, "IAsyncEnumerator<{inner}>"),
            TypeRef::Error => write!(f, "?"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("malformed type `{text}`")]
pub struct TypeParseError {
    pub text: String,
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let malformed = || TypeParseError {
            text: text.to_owned(),
        };
        if let Some(open) = text.find('<') {
            let inner = text
                .strip_suffix('>')
                .map(|rest| &rest[open + 1..])
                .ok_or_else(malformed)?;
            let inner = Box::new(inner.parse::<TypeRef>()?);
            return match &text[..open] {
                "List" => Ok(TypeRef::List(inner)),
                "Task" => Ok(TypeRef::Awaitable(inner)),
                "IEnumerable" => Ok(TypeRef::Sequence(inner)),
                "IEnumerator" => Ok(TypeRef::Enumerator(inner)),
                "IAsyncEnumerable" => Ok(TypeRef::AsyncSequence(inner)),
                "IAsyncEnumerator" => Ok(TypeRef::AsyncEnumerator(inner)),
                _ => Err(malformed()),
            };
        }
        Ok(match text {
            "" => return Err(malformed()),
            "void" => TypeRef::Void,
            "bool" => TypeRef::Bool,
            "char" => TypeRef::Char,
            "string" => TypeRef::String,
            "int" => TypeRef::Int,
            "long" => TypeRef::Long,
            "float" => TypeRef::Float,
            "double" => TypeRef::Double,
            "object" => TypeRef::Object,
            "dynamic" => TypeRef::Placeholder,
            "?" => TypeRef::Error,
            name => TypeRef::Named(name.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let ty: TypeRef = "Task<List<int>>".parse().unwrap();
        assert_eq!(
            ty,
            TypeRef::Awaitable(Box::new(TypeRef::List(Box::new(TypeRef::Int))))
        );
        assert_eq!(ty.to_string(), "Task<List<int>>");
        assert_eq!(ty.unwrap_awaitable().to_string(), "List<int>");
    }

    #[test]
    fn test_placeholder_spelling() {
        assert_eq!(TypeRef::Placeholder.to_string(), "dynamic");
        assert!("dynamic".parse::<TypeRef>().unwrap().is_placeholder());
        assert!("Foo<int>".parse::<TypeRef>().is_err());
    }

    #[test]
    fn test_promotion() {
        assert_eq!(TypeRef::promote(&TypeRef::Int, &TypeRef::Double), Some(TypeRef::Double));
        assert_eq!(TypeRef::promote(&TypeRef::Int, &TypeRef::String), None);
    }
}
