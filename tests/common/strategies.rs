//! Proptest strategies for raw JSON values and their declared types.

#![allow(dead_code)]

use proptest::prelude::*;
use serde_json::{json, Value};

/// Path-like strings that are always valid URIs.
pub fn file_uri_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9]{1,12}".prop_map(|o| format!("gs://bucket/{o}")),
        "[a-z0-9]{1,12}".prop_map(|o| format!("https://example.com/{o}.txt")),
        "[a-z0-9]{1,12}".prop_map(|o| format!("/data/{o}.bam")),
    ]
}

pub fn string_value_strategy() -> impl Strategy<Value = Value> {
    "[a-zA-Z0-9 _.-]{0,32}".prop_map(Value::String)
}

pub fn int_value_strategy() -> impl Strategy<Value = Value> {
    any::<i64>().prop_map(|n| json!(n))
}

/// Finite floats with a fractional part, to keep them distinct from integers.
pub fn float_value_strategy() -> impl Strategy<Value = Value> {
    (-1.0e9f64..1.0e9f64)
        .prop_filter("needs a fractional part", |f| f.fract() != 0.0)
        .prop_map(|f| json!(f))
}

pub fn string_array_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec("[a-z]{1,8}", 0..8).prop_map(|items| json!(items))
}
