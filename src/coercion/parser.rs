use serde_json::{Map, Value};

use super::error::CoercionError;
use super::file::CbasFile;
use super::value::CbasValue;
use crate::models::{ParameterTypeDefinition, PrimitiveType, StructField};

/// Name of a raw value's JSON kind, used as the source type in coercion errors.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_f64() => "Float",
        Value::Number(_) => "Int",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Coerce `raw` into a value of the declared type.
pub fn parse_value(
    parameter_name: &str,
    type_definition: &ParameterTypeDefinition,
    raw: &Value,
) -> Result<CbasValue, CoercionError> {
    match type_definition {
        ParameterTypeDefinition::Primitive { primitive_type } => {
            parse_primitive(parameter_name, *primitive_type, raw)
        }
        ParameterTypeDefinition::Optional { optional_type } => {
            if raw.is_null() {
                Ok(CbasValue::none())
            } else {
                parse_value(parameter_name, optional_type, raw).map(CbasValue::some)
            }
        }
        ParameterTypeDefinition::Array {
            array_type,
            non_empty,
        } => parse_array(parameter_name, type_definition, array_type, *non_empty, raw),
        ParameterTypeDefinition::Map {
            key_type,
            value_type,
        } => parse_map(parameter_name, type_definition, *key_type, value_type, raw),
        ParameterTypeDefinition::Struct { name, fields } => {
            parse_struct(parameter_name, name, fields, raw)
        }
    }
}

pub fn parse_primitive(
    parameter_name: &str,
    primitive_type: PrimitiveType,
    raw: &Value,
) -> Result<CbasValue, CoercionError> {
    let from_type = json_type_name(raw);
    let to_type = primitive_type.to_string();

    match primitive_type {
        PrimitiveType::String => Ok(CbasValue::String(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        PrimitiveType::Int => {
            let Value::Number(number) = raw else {
                return Err(CoercionError::unsupported(parameter_name, from_type, to_type));
            };
            if let Some(i) = number.as_i64() {
                return Ok(CbasValue::Int(i));
            }
            if number.is_u64() {
                return Err(CoercionError::type_error(
                    parameter_name,
                    from_type,
                    to_type,
                    format!("Value {number} is out of range for Int."),
                ));
            }
            match number.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(CbasValue::Int(f as i64))
                }
                _ => Err(CoercionError::type_error(
                    parameter_name,
                    from_type,
                    to_type,
                    format!("Value {number} has a fractional part."),
                )),
            }
        }
        PrimitiveType::Float => match raw.as_f64() {
            Some(f) => Ok(CbasValue::Float(f)),
            None => Err(CoercionError::unsupported(parameter_name, from_type, to_type)),
        },
        PrimitiveType::Boolean => match raw {
            Value::Bool(b) => Ok(CbasValue::Boolean(*b)),
            _ => Err(CoercionError::unsupported(parameter_name, from_type, to_type)),
        },
        PrimitiveType::File => match raw {
            Value::String(s) => CbasFile::parse(s)
                .map(CbasValue::File)
                .map_err(|reason| {
                    CoercionError::value_error(parameter_name, from_type, to_type, reason)
                }),
            _ => Err(CoercionError::unsupported(parameter_name, from_type, to_type)),
        },
    }
}

fn parse_array(
    parameter_name: &str,
    array_definition: &ParameterTypeDefinition,
    inner: &ParameterTypeDefinition,
    non_empty: bool,
    raw: &Value,
) -> Result<CbasValue, CoercionError> {
    let to_type = array_definition.to_string();

    let values = match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| parse_value(parameter_name, inner, item))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Null => {
            return Err(CoercionError::unsupported(parameter_name, "null", to_type));
        }
        scalar => {
            // A lone value stands in for a single-element array
            let element = parse_value(parameter_name, inner, scalar).map_err(|e| {
                CoercionError::type_error(
                    parameter_name,
                    json_type_name(scalar),
                    to_type.clone(),
                    format!("Value could not be wrapped as a single element: {e}"),
                )
            })?;
            vec![element]
        }
    };

    if non_empty && values.is_empty() {
        return Err(CoercionError::value_error(
            parameter_name,
            json_type_name(raw),
            to_type,
            "Non-empty array must have at least one value",
        ));
    }

    Ok(CbasValue::Array(values))
}

fn parse_map(
    parameter_name: &str,
    map_definition: &ParameterTypeDefinition,
    key_type: PrimitiveType,
    value_type: &ParameterTypeDefinition,
    raw: &Value,
) -> Result<CbasValue, CoercionError> {
    let Value::Object(entries) = raw else {
        return Err(CoercionError::unsupported(
            parameter_name,
            json_type_name(raw),
            map_definition.to_string(),
        ));
    };

    let mut coerced = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let key = parse_map_key(parameter_name, key_type, key)?;
        let value = parse_value(parameter_name, value_type, value)?;
        coerced.push((key, value));
    }
    Ok(CbasValue::Map(coerced))
}

/// JSON object keys are always strings; typed keys are read from that text.
fn parse_map_key(
    parameter_name: &str,
    key_type: PrimitiveType,
    key: &str,
) -> Result<CbasValue, CoercionError> {
    let invalid = |reason: String| {
        CoercionError::value_error(parameter_name, "String", key_type.to_string(), reason)
    };

    match key_type {
        PrimitiveType::String => Ok(CbasValue::String(key.to_string())),
        PrimitiveType::Int => key
            .parse::<i64>()
            .map(CbasValue::Int)
            .map_err(|e| invalid(format!("map key '{key}' is not an Int ({e})"))),
        PrimitiveType::Float => key
            .parse::<f64>()
            .map(CbasValue::Float)
            .map_err(|e| invalid(format!("map key '{key}' is not a Float ({e})"))),
        PrimitiveType::Boolean => key
            .parse::<bool>()
            .map(CbasValue::Boolean)
            .map_err(|e| invalid(format!("map key '{key}' is not a Boolean ({e})"))),
        PrimitiveType::File => CbasFile::parse(key).map(CbasValue::File).map_err(invalid),
    }
}

fn parse_struct(
    parameter_name: &str,
    struct_name: &str,
    fields: &[StructField],
    raw: &Value,
) -> Result<CbasValue, CoercionError> {
    let to_type = format!("Struct ({struct_name})");
    let Value::Object(values) = raw else {
        return Err(CoercionError::unsupported(parameter_name, json_type_name(raw), to_type));
    };

    let coerced = fields
        .iter()
        .map(|field| {
            parse_struct_field(parameter_name, struct_name, &to_type, field, values)
                .map(|value| (field.field_name.clone(), value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CbasValue::Struct {
        name: struct_name.to_string(),
        fields: coerced,
    })
}

fn parse_struct_field(
    parameter_name: &str,
    struct_name: &str,
    to_type: &str,
    field: &StructField,
    values: &Map<String, Value>,
) -> Result<CbasValue, CoercionError> {
    match values.get(&field.field_name) {
        Some(value) => parse_value(
            &format!("{parameter_name}.{}", field.field_name),
            &field.field_type,
            value,
        ),
        None if field.field_type.is_optional() => Ok(CbasValue::none()),
        None => Err(CoercionError::value_error(
            parameter_name,
            "Object",
            to_type,
            format!(
                "Field {} not provided in input for Struct ({struct_name})",
                field.field_name
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prim(t: PrimitiveType) -> ParameterTypeDefinition {
        ParameterTypeDefinition::primitive(t)
    }

    fn sample_struct() -> ParameterTypeDefinition {
        ParameterTypeDefinition::Struct {
            name: "Sample".to_string(),
            fields: vec![
                StructField {
                    field_name: "id".to_string(),
                    field_type: prim(PrimitiveType::String),
                },
                StructField {
                    field_name: "depth".to_string(),
                    field_type: ParameterTypeDefinition::optional(prim(PrimitiveType::Int)),
                },
            ],
        }
    }

    #[test]
    fn test_string_stringifies_anything() {
        let t = prim(PrimitiveType::String);
        assert_eq!(parse_value("p", &t, &json!("x")).unwrap(), CbasValue::String("x".into()));
        assert_eq!(parse_value("p", &t, &json!(12)).unwrap(), CbasValue::String("12".into()));
        assert_eq!(parse_value("p", &t, &json!(true)).unwrap(), CbasValue::String("true".into()));
        assert_eq!(
            parse_value("p", &t, &json!([1, "a"])).unwrap(),
            CbasValue::String("[1,\"a\"]".into())
        );
    }

    #[test]
    fn test_int_coercion() {
        let t = prim(PrimitiveType::Int);
        assert_eq!(parse_value("p", &t, &json!(3)).unwrap(), CbasValue::Int(3));
        assert_eq!(parse_value("p", &t, &json!(3.0)).unwrap(), CbasValue::Int(3));
        assert_eq!(parse_value("p", &t, &json!(-7.0)).unwrap(), CbasValue::Int(-7));

        let err = parse_value("wf.n", &t, &json!(3.5)).unwrap_err();
        assert!(err.is_type_error());
        assert_eq!(err.parameter_name(), "wf.n");

        assert!(parse_value("p", &t, &json!(u64::MAX)).unwrap_err().is_type_error());
        assert!(parse_value("p", &t, &json!("3")).unwrap_err().is_type_error());
    }

    #[test]
    fn test_float_and_boolean() {
        let f = prim(PrimitiveType::Float);
        assert_eq!(parse_value("p", &f, &json!(2)).unwrap(), CbasValue::Float(2.0));
        assert_eq!(parse_value("p", &f, &json!(2.25)).unwrap(), CbasValue::Float(2.25));
        assert!(parse_value("p", &f, &json!("2.25")).is_err());

        let b = prim(PrimitiveType::Boolean);
        assert_eq!(parse_value("p", &b, &json!(false)).unwrap(), CbasValue::Boolean(false));
        assert!(parse_value("p", &b, &json!("true")).unwrap_err().is_type_error());
    }

    #[test]
    fn test_file_coercion() {
        let t = prim(PrimitiveType::File);
        let value = parse_value("p", &t, &json!("gs://bucket/o")).unwrap();
        assert_eq!(value.to_json(), json!("gs://bucket/o"));
        assert_eq!(value.count_files(), 1);

        assert!(parse_value("p", &t, &json!(42)).unwrap_err().is_type_error());

        let err = parse_value("p", &t, &json!("gs://bucket/bad name")).unwrap_err();
        assert!(err.is_value_error());
        assert!(err.to_string().contains("Illegal character"));

        // coercing an already-coerced file is a no-op
        let again = parse_value("p", &t, &value.to_json()).unwrap();
        assert_eq!(again, value);
    }

    #[test]
    fn test_optional_coercion() {
        let t = ParameterTypeDefinition::optional(prim(PrimitiveType::Int));
        assert_eq!(parse_value("p", &t, &Value::Null).unwrap(), CbasValue::none());
        assert_eq!(parse_value("p", &t, &json!(5)).unwrap(), CbasValue::some(CbasValue::Int(5)));
        assert!(parse_value("p", &t, &json!("five")).is_err());
    }

    #[test]
    fn test_array_coercion() {
        let t = ParameterTypeDefinition::array(prim(PrimitiveType::String), true);
        let err = parse_value("p", &t, &json!([])).unwrap_err();
        assert!(err.is_value_error());

        assert_eq!(
            parse_value("p", &t, &json!(["a"])).unwrap(),
            CbasValue::Array(vec![CbasValue::String("a".into())])
        );

        let ints = ParameterTypeDefinition::array(prim(PrimitiveType::Int), false);
        assert_eq!(parse_value("p", &ints, &json!([])).unwrap(), CbasValue::Array(vec![]));
        assert!(parse_value("p", &ints, &json!([1, "x"])).is_err());
    }

    #[test]
    fn test_array_scalar_wrap() {
        let files = ParameterTypeDefinition::array(prim(PrimitiveType::File), true);
        let value = parse_value("p", &files, &json!("gs://b/one")).unwrap();
        assert_eq!(value.to_json(), json!(["gs://b/one"]));

        let ints = ParameterTypeDefinition::array(prim(PrimitiveType::Int), false);
        let err = parse_value("p", &ints, &json!(true)).unwrap_err();
        assert!(err.is_type_error());
        assert!(parse_value("p", &ints, &Value::Null).unwrap_err().is_type_error());
    }

    #[test]
    fn test_map_coercion() {
        let t = ParameterTypeDefinition::map(PrimitiveType::Int, prim(PrimitiveType::Float));
        let value = parse_value("p", &t, &json!({"1": 1, "2": 2.5})).unwrap();
        assert_eq!(value.to_json(), json!({"1": 1.0, "2": 2.5}));

        assert!(parse_value("p", &t, &json!([1, 2])).unwrap_err().is_type_error());
        assert!(parse_value("p", &t, &json!({"one": 1})).unwrap_err().is_value_error());
        assert!(parse_value("p", &t, &json!({"1": "x"})).is_err());
    }

    #[test]
    fn test_struct_coercion() {
        let t = sample_struct();
        let value = parse_value("wf.sample", &t, &json!({"id": "s1", "extra": 1})).unwrap();
        assert_eq!(
            value,
            CbasValue::Struct {
                name: "Sample".to_string(),
                fields: vec![
                    ("id".to_string(), CbasValue::String("s1".into())),
                    ("depth".to_string(), CbasValue::none()),
                ],
            }
        );
        assert_eq!(value.to_json(), json!({"id": "s1"}));

        let err = parse_value("wf.sample", &t, &json!({"depth": 3})).unwrap_err();
        assert!(err.is_value_error());
        assert!(err.to_string().contains("Field id not provided in input for Struct (Sample)"));

        let err = parse_value("wf.sample", &t, &json!({"id": "s1", "depth": "deep"})).unwrap_err();
        assert_eq!(err.parameter_name(), "wf.sample.depth");

        assert!(parse_value("wf.sample", &t, &json!("s1")).unwrap_err().is_type_error());
    }
}
