//! Argument validation against a [`ToolSchema`] (spec §4.5, §9). Absent
//! optional keys take their declared default; unknown keys and type/enum
//! violations are rejected with `InvalidParams` before the tool ever runs.

use serde_json::{Map, Value};

use crate::tool::{ArgType, ToolSchema};

pub fn validate_and_apply_defaults(schema: &ToolSchema, arguments: Value) -> Result<Value, String> {
    let mut input = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => return Err(format!("arguments must be an object, got {other}")),
    };

    let known_keys: std::collections::HashSet<&str> = schema.args.iter().map(|a| a.key).collect();
    for key in input.keys() {
        if !known_keys.contains(key.as_str()) {
            return Err(format!("unknown argument `{key}`"));
        }
    }

    let mut output = Map::new();
    for spec in &schema.args {
        match input.remove(spec.key) {
            Some(value) => {
                check_type(spec.key, spec.ty, &value)?;
                if let Some(allowed) = &spec.allowed_values {
                    let s = value.as_str().unwrap_or_default();
                    if !allowed.contains(&s) {
                        return Err(format!(
                            "argument `{}` must be one of {:?}, got `{}`",
                            spec.key, allowed, s
                        ));
                    }
                }
                output.insert(spec.key.to_string(), value);
            }
            None => {
                if spec.required {
                    return Err(format!("missing required argument `{}`", spec.key));
                }
                if let Some(default) = &spec.default {
                    output.insert(spec.key.to_string(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(output))
}

fn check_type(key: &str, ty: ArgType, value: &Value) -> Result<(), String> {
    let ok = match ty {
        ArgType::String => value.is_string(),
        ArgType::Integer => value.is_i64() || value.is_u64(),
        ArgType::Boolean => value.is_boolean(),
        ArgType::Number => value.is_number(),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("argument `{key}` has the wrong type, expected {ty:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ArgSpec;

    fn schema() -> ToolSchema {
        ToolSchema {
            name: "t",
            description: "d",
            args: vec![
                ArgSpec::required("cores", ArgType::Integer),
                ArgSpec::optional("partition", ArgType::String, Value::String("debug".into())),
            ],
        }
    }

    #[test]
    fn fills_in_defaults() {
        let v = validate_and_apply_defaults(&schema(), serde_json::json!({"cores": 2})).unwrap();
        assert_eq!(v["partition"], "debug");
        assert_eq!(v["cores"], 2);
    }

    #[test]
    fn rejects_missing_required() {
        assert!(validate_and_apply_defaults(&schema(), serde_json::json!({})).is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(validate_and_apply_defaults(&schema(), serde_json::json!({"cores": 1, "bogus": 1})).is_err());
    }

    #[test]
    fn rejects_wrong_type() {
        assert!(validate_and_apply_defaults(&schema(), serde_json::json!({"cores": "two"})).is_err());
    }
}
