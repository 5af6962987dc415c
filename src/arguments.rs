//! Template arguments given on the command line.

use twostage_runtime::Value;

/// Reads `text` as a JSON value. Text that is not JSON is taken as a
/// plain string, so `--arg name=Ada` needs no quoting.
pub fn parse_argument(text: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => from_json(json),
        Err(_) => Value::string(text),
    }
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Bool(value),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(value) => Value::Int(value),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(text) => Value::string(text),
        serde_json::Value::Array(items) => Value::list(items.into_iter().map(from_json).collect()),
        object @ serde_json::Value::Object(_) => Value::string(object.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_argument("3"), Value::Int(3));
        assert_eq!(parse_argument("2.5"), Value::Float(2.5));
        assert_eq!(parse_argument("true"), Value::Bool(true));
        assert_eq!(parse_argument("null"), Value::Null);
        assert_eq!(parse_argument("\"a b\""), Value::string("a b"));
    }

    #[test]
    fn test_non_json_is_a_string() {
        assert_eq!(parse_argument("Ada"), Value::string("Ada"));
    }

    #[test]
    fn test_arrays_become_lists() {
        let value = parse_argument("[1, \"x\"]");
        let items = value.items().unwrap();
        assert_eq!(items, [Value::Int(1), Value::string("x")]);
    }
}
