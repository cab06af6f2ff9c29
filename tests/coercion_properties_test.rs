//! Property tests: coerced values serialize back to their canonical JSON form.

mod common;

use common::*;
use proptest::prelude::*;
use serde_json::{json, Value};

use cbas_core::coercion::parse_value;
use cbas_core::models::{ParameterTypeDefinition, PrimitiveType};

fn primitive(primitive_type: PrimitiveType) -> ParameterTypeDefinition {
    ParameterTypeDefinition::primitive(primitive_type)
}

proptest! {
    #[test]
    fn prop_string_round_trip(raw in string_value_strategy()) {
        let value = parse_value("p", &primitive(PrimitiveType::String), &raw).unwrap();
        prop_assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn prop_int_round_trip(raw in int_value_strategy()) {
        let value = parse_value("p", &primitive(PrimitiveType::Int), &raw).unwrap();
        prop_assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn prop_whole_float_coerces_to_int(n in -1_000_000i64..1_000_000i64) {
        let value = parse_value("p", &primitive(PrimitiveType::Int), &json!(n as f64)).unwrap();
        prop_assert_eq!(value.to_json(), json!(n));
    }

    #[test]
    fn prop_fractional_float_is_not_an_int(raw in float_value_strategy()) {
        let err = parse_value("p", &primitive(PrimitiveType::Int), &raw).unwrap_err();
        prop_assert!(err.is_type_error());
    }

    #[test]
    fn prop_float_round_trip(raw in float_value_strategy()) {
        let value = parse_value("p", &primitive(PrimitiveType::Float), &raw).unwrap();
        prop_assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn prop_file_round_trip(uri in file_uri_strategy()) {
        let raw = Value::String(uri);
        let value = parse_value("p", &primitive(PrimitiveType::File), &raw).unwrap();
        prop_assert_eq!(value.count_files(), 1);
        prop_assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn prop_string_array_round_trip(raw in string_array_strategy()) {
        let array = ParameterTypeDefinition::array(primitive(PrimitiveType::String), false);
        let value = parse_value("p", &array, &raw).unwrap();
        prop_assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn prop_optional_passes_values_through(raw in int_value_strategy()) {
        let optional = ParameterTypeDefinition::optional(primitive(PrimitiveType::Int));
        let value = parse_value("p", &optional, &raw).unwrap();
        prop_assert!(!value.is_none());
        prop_assert_eq!(value.to_json(), raw);
    }
}

#[test]
fn test_optional_null_is_none() {
    let optional = ParameterTypeDefinition::optional(primitive(PrimitiveType::Int));
    let value = parse_value("p", &optional, &Value::Null).unwrap();
    assert!(value.is_none());
    assert_eq!(value.to_json(), Value::Null);
}

#[test]
fn test_non_empty_array_rejects_empty_input() {
    let array = ParameterTypeDefinition::array(primitive(PrimitiveType::String), true);
    assert!(parse_value("p", &array, &json!([])).unwrap_err().is_value_error());
    assert!(parse_value("p", &array, &json!(["a"])).is_ok());
}
