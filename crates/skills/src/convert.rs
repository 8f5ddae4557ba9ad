//! Conversions between JSON values, Rhai values and the contract types.

use rhai::{Array, Dynamic, Map};
use serde_json::Value;
use skilldock_core::{Error, ExecutionContext, Outcome, Result, SkillDescription, Status};
use tracing::debug;

pub fn json_to_dynamic(val: &Value) -> Dynamic {
    match val {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Dynamic::from(i),
            (None, Some(f)) => Dynamic::from(f),
            _ => Dynamic::from(n.to_string()),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(arr) => Dynamic::from(arr.iter().map(json_to_dynamic).collect::<Array>()),
        Value::Object(obj) => Dynamic::from(object_to_map(obj)),
    }
}

fn object_to_map(obj: &serde_json::Map<String, Value>) -> Map {
    obj.iter()
        .map(|(k, v)| (k.as_str().into(), json_to_dynamic(v)))
        .collect()
}

pub fn dynamic_to_json(val: &Dynamic) -> Value {
    if val.is_unit() {
        Value::Null
    } else if let Ok(b) = val.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = val.as_int() {
        Value::from(i)
    } else if let Ok(f) = val.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    } else if val.is::<String>() || val.is::<rhai::ImmutableString>() {
        Value::String(val.clone().into_string().unwrap_or_default())
    } else if val.is::<Array>() {
        let arr = val.clone().into_array().unwrap_or_default();
        Value::Array(arr.iter().map(dynamic_to_json).collect())
    } else if let Some(map) = val.clone().try_cast::<Map>() {
        Value::Object(
            map.iter()
                .map(|(k, v)| (k.to_string(), dynamic_to_json(v)))
                .collect(),
        )
    } else {
        Value::String(val.to_string())
    }
}

/// The object map a script's entry point receives.
pub fn context_to_map(ctx: &ExecutionContext) -> Map {
    match json_to_dynamic(&ctx.to_json()).try_cast::<Map>() {
        Some(map) => map,
        None => Map::new(),
    }
}

/// Interpret a script's return value as an [`Outcome`].
///
/// Anything other than an object map with a valid `status` and a `message`
/// is a contract violation naming the type actually returned.
pub fn outcome_from_dynamic(value: Dynamic) -> Result<Outcome> {
    if !value.is::<Map>() {
        return Err(Error::ContractViolation {
            expected: "Outcome".to_string(),
            actual: value.type_name().to_string(),
        });
    }

    let mut outcome: Outcome = serde_json::from_value(dynamic_to_json(&value)).map_err(|e| {
        debug!(error = %e, "Script returned a map that is not an outcome");
        Error::ContractViolation {
            expected: "Outcome".to_string(),
            actual: "map".to_string(),
        }
    })?;

    if outcome.status != Status::Failure {
        outcome.error_details = None;
    }
    Ok(outcome)
}

pub fn description_from_dynamic(value: Dynamic) -> Result<SkillDescription> {
    if !value.is::<Map>() {
        return Err(Error::ContractViolation {
            expected: "SkillDescription".to_string(),
            actual: value.type_name().to_string(),
        });
    }
    serde_json::from_value(dynamic_to_json(&value)).map_err(|_| Error::ContractViolation {
        expected: "SkillDescription".to_string(),
        actual: "map".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skilldock_core::Priority;

    #[test]
    fn test_json_dynamic_roundtrip_nested() {
        let value = json!({"a": [1, 2.5, "x", null, true], "b": {"c": "d"}});
        assert_eq!(dynamic_to_json(&json_to_dynamic(&value)), value);
    }

    #[test]
    fn test_context_to_map_fields() {
        let ctx = ExecutionContext::new("sum")
            .with_parameter("n", 3)
            .with_priority(Priority::High);
        let map = context_to_map(&ctx);
        assert_eq!(map["task"].clone().into_string().unwrap(), "sum");
        assert_eq!(map["priority"].clone().into_string().unwrap(), "high");
        let params = map["parameters"].clone().try_cast::<Map>().unwrap();
        assert_eq!(params["n"].as_int().unwrap(), 3);
    }

    #[test]
    fn test_non_map_is_contract_violation() {
        let err = outcome_from_dynamic(Dynamic::from(42_i64)).unwrap_err();
        match err {
            Error::ContractViolation { expected, actual } => {
                assert_eq!(expected, "Outcome");
                assert_eq!(actual, "i64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_map_without_status_is_contract_violation() {
        let value = json_to_dynamic(&json!({"message": "no status"}));
        assert!(matches!(
            outcome_from_dynamic(value),
            Err(Error::ContractViolation { .. })
        ));
    }

    #[test]
    fn test_error_details_dropped_on_success() {
        let value = json_to_dynamic(&json!({
            "status": "success",
            "message": "fine",
            "error_details": {"x": 1}
        }));
        let outcome = outcome_from_dynamic(value).unwrap();
        assert!(outcome.is_success());
        assert!(outcome.error_details.is_none());
    }

    #[test]
    fn test_description_from_map() {
        let value = json_to_dynamic(&json!({
            "summary": "adds numbers",
            "tags": ["math"],
            "version": "1.0.0"
        }));
        let desc = description_from_dynamic(value).unwrap();
        assert_eq!(desc.summary, "adds numbers");
        assert_eq!(desc.tags, vec!["math".to_string()]);
    }
}
