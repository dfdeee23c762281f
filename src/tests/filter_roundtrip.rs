use proptest::prelude::*;

use crate::filter::{
    Condition, ConditionDocument, ConditionTerm, FilterPolicy, NumericCondition, StringCondition,
};
use crate::loader::parse_filter_policy;

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

// Quarter steps stay exact through the JSON number form.
fn number() -> impl Strategy<Value = f64> {
    (-1_000_000i64..1_000_000).prop_map(|v| v as f64 / 4.0)
}

fn string_condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        (
            prop::collection::vec(word(), 0..4),
            prop::collection::vec(word(), 0..3)
        )
            .prop_filter("allow or prefix", |(allow, prefixes)| {
                !allow.is_empty() || !prefixes.is_empty()
            })
            .prop_map(|(allow, prefixes)| {
                Condition::String(
                    StringCondition::builder()
                        .allow(allow)
                        .prefixes(prefixes)
                        .build()
                        .unwrap(),
                )
            }),
        prop::collection::vec(word(), 1..4)
            .prop_map(|deny| Condition::String(StringCondition::builder().deny(deny).build().unwrap())),
    ]
}

fn numeric_condition() -> impl Strategy<Value = Condition> {
    (
        prop::collection::vec(number(), 0..3),
        prop::option::of((number(), number())),
        prop::option::of((number(), 1i64..1000)),
        prop::option::of(number()),
        prop::option::of(number()),
    )
        .prop_filter("at least one bound", |(allow, between, strict, gt, lte)| {
            !allow.is_empty()
                || between.is_some()
                || strict.is_some()
                || gt.is_some()
                || lte.is_some()
        })
        .prop_map(|(allow, between, strict, gt, lte)| {
            let mut builder = NumericCondition::builder().allow(allow);
            if let Some((a, b)) = between {
                builder = builder.between(a.min(b), a.max(b));
            }
            if let Some((lo, width)) = strict {
                builder = builder.between_strict(lo, lo + width as f64);
            }
            if let Some(value) = gt {
                builder = builder.greater_than(value);
            }
            if let Some(value) = lte {
                builder = builder.less_than_or_equal_to(value);
            }
            Condition::Numeric(builder.build().unwrap())
        })
}

fn condition() -> impl Strategy<Value = Condition> {
    prop_oneof![
        Just(Condition::Exists),
        string_condition(),
        numeric_condition(),
    ]
}

proptest! {
    #[test]
    fn compiled_condition_decompiles_to_itself(condition in condition()) {
        let document = condition.compile();
        prop_assert_eq!(document.decompile().unwrap(), condition.clone());

        let wire = document.to_value();
        let terms = wire
            .as_array()
            .unwrap()
            .iter()
            .map(ConditionTerm::from_value)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        prop_assert_eq!(ConditionDocument::new(terms).decompile().unwrap(), condition);
    }

    #[test]
    fn parsed_policy_compiles_to_the_same_wire_form(condition in condition()) {
        let policy = FilterPolicy::new().with_attribute("attr", vec![condition]).unwrap();
        let compiled = policy.compile().unwrap().to_value();

        let parsed = parse_filter_policy(&compiled.to_string()).unwrap();
        prop_assert_eq!(parsed.compile().unwrap().to_value(), compiled);
    }
}
