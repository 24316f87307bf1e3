use excel_bench::compare::NUMERIC_TOLERANCE;
use excel_bench::{compare_results, deep_compare, JsonMap};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..=1_000_000).prop_map(|n| json!(n)),
        (-1.0e9f64..1.0e9).prop_map(|f| json!(f)),
        "[a-zA-Z0-9# ]{0,8}".prop_map(Value::String),
    ]
}

// Keys are at most four letters, so "error" never appears.
fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_map() -> impl Strategy<Value = JsonMap> {
    prop::collection::btree_map("[a-z]{1,4}", arb_json(), 0..5)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_every_value_satisfies_itself(value in arb_json()) {
        prop_assert!(deep_compare(&value, &value));
    }

    #[test]
    fn prop_extra_actual_keys_are_ignored(expected in arb_map(), extra in arb_json()) {
        let mut actual = expected.clone();
        actual.insert("extra_key".to_string(), extra);
        prop_assert!(compare_results(&expected, &actual));
    }

    #[test]
    fn prop_error_key_always_fails(expected in arb_map(), message in ".*") {
        let mut actual = expected.clone();
        actual.insert("error".to_string(), Value::String(message));
        prop_assert!(!compare_results(&expected, &actual));
    }

    #[test]
    fn prop_colors_ignore_case(hex in "[0-9a-fA-F]{6,8}") {
        let lower = Value::String(format!("#{}", hex.to_ascii_lowercase()));
        let upper = Value::String(format!("#{}", hex.to_ascii_uppercase()));
        prop_assert!(deep_compare(&lower, &upper));
        prop_assert!(deep_compare(&upper, &lower));
    }

    #[test]
    fn prop_numbers_within_tolerance(x in -1.0e6f64..1.0e6, within in 0.0f64..0.9) {
        let close = x + within * NUMERIC_TOLERANCE;
        let far = x + 2.0 * NUMERIC_TOLERANCE;
        prop_assert!(deep_compare(&json!(x), &json!(close)));
        prop_assert!(!deep_compare(&json!(x), &json!(far)));
    }

    #[test]
    fn prop_booleans_never_match_numbers(flag in any::<bool>(), n in -2i64..=2, f in -2.0f64..2.0) {
        for number in [json!(n), json!(f), json!(u8::from(flag))] {
            prop_assert!(!deep_compare(&json!(flag), &number));
            prop_assert!(!deep_compare(&number, &json!(flag)));
        }
    }

    #[test]
    fn prop_array_order_is_irrelevant(items in prop::collection::vec(arb_leaf(), 0..6)) {
        let mut reversed = items.clone();
        reversed.reverse();
        prop_assert!(deep_compare(&Value::Array(items), &Value::Array(reversed)));
    }
}

#[test]
fn booleans_are_not_numbers() {
    assert!(!deep_compare(&json!(1), &json!(true)));
    assert!(!deep_compare(&json!(true), &json!(1)));
    assert!(!deep_compare(&json!(0), &json!(false)));
    assert!(!deep_compare(&json!(false), &json!(0.0)));
    assert!(!deep_compare(&json!([1, 0]), &json!([true, false])));
}
