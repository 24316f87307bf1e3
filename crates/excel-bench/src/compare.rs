//! Tolerant structural comparison of expected vs. actual feature payloads.
//!
//! This is the sole arbiter of every pass/fail verdict:
//!
//! - an `"error"` key in `actual` fails the comparison outright;
//! - a top-level key missing from `actual` only passes when its expected value is `null`;
//! - strings starting with `#` are colors and compare case-insensitively;
//! - numbers compare with an absolute tolerance of [`NUMERIC_TOLERANCE`] (booleans are never
//!   numbers);
//! - arrays pass when every expected element matches some actual element, in any order;
//! - objects recurse key by key;
//! - everything else must be equal.

use serde_json::Value;

use crate::model::JsonMap;

pub const NUMERIC_TOLERANCE: f64 = 0.0001;

/// Does `actual` satisfy `expected`?
pub fn compare_results(expected: &JsonMap, actual: &JsonMap) -> bool {
    if actual.contains_key("error") {
        return false;
    }

    expected.iter().all(|(key, expected_value)| match actual.get(key) {
        Some(actual_value) => deep_compare(expected_value, actual_value),
        None => expected_value.is_null(),
    })
}

/// Recursive comparison keyed on the shape of `expected`.
///
/// Booleans and numbers are distinct cell types here: `true` never matches `1` and `0` never
/// matches `false`, in either direction.
pub fn deep_compare(expected: &Value, actual: &Value) -> bool {
    match expected {
        Value::String(expected) if expected.starts_with('#') => match actual {
            Value::String(actual) => expected.eq_ignore_ascii_case(actual),
            _ => false,
        },
        Value::Number(expected) => match (expected.as_f64(), actual) {
            (Some(expected), Value::Number(actual)) => actual
                .as_f64()
                .is_some_and(|actual| (expected - actual).abs() <= NUMERIC_TOLERANCE),
            _ => false,
        },
        Value::Array(expected) => match actual {
            Value::Array(actual) => expected
                .iter()
                .all(|item| actual.iter().any(|candidate| deep_compare(item, candidate))),
            _ => false,
        },
        Value::Object(expected) => match actual {
            Value::Object(actual) => expected.iter().all(|(key, value)| {
                actual
                    .get(key)
                    .is_some_and(|candidate| deep_compare(value, candidate))
            }),
            _ => false,
        },
        other => other == actual,
    }
}

/// Short classification of a failed result for report notes.
pub fn failure_note_from_actual(actual: &JsonMap) -> &'static str {
    let unsupported = actual
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .is_some_and(|error| {
            error.starts_with("notimplemented")
                || error.contains("not implemented")
                || error.contains("not supported")
                || error.contains("unsupported")
        });
    if unsupported {
        "Not implemented"
    } else {
        "Incorrect result"
    }
}
