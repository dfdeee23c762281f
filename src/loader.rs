use serde_json::{Map, Value};

use crate::error::BindingError;
use crate::filter::{Condition, ConditionDocument, ConditionTerm, FilterPolicy};

/// Parse a filter policy in the message-routing wire format into a
/// validated `FilterPolicy`.
///
/// Plain strings and prefixes of one attribute are gathered into a single
/// string condition; every other term becomes a condition of its own. The
/// result compiles back to the same set of terms.
///
/// Example:
/// ```rust
/// use bindery_core::parse_filter_policy;
/// let policy = parse_filter_policy(r#"{"color": ["red", {"prefix": "bl"}]}"#).unwrap();
/// assert_eq!(policy.len(), 1);
/// ```
pub fn parse_filter_policy(text: &str) -> Result<FilterPolicy, BindingError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = value else {
        return Err(BindingError::InvalidFormat(
            "a filter policy must be a JSON object".to_string(),
        ));
    };
    filter_policy_from_map(&map)
}

pub(crate) fn filter_policy_from_map(map: &Map<String, Value>) -> Result<FilterPolicy, BindingError> {
    let mut policy = FilterPolicy::new();
    for (name, terms) in map {
        let Value::Array(terms) = terms else {
            return Err(BindingError::InvalidFormat(format!(
                "filter policy attribute '{name}' must map to an array"
            )));
        };
        policy.insert(name.clone(), attribute_conditions(terms)?)?;
    }
    Ok(policy)
}

fn attribute_conditions(values: &[Value]) -> Result<Vec<Condition>, BindingError> {
    let mut groups: Vec<Vec<ConditionTerm>> = Vec::new();
    let mut string_group: Option<usize> = None;

    for value in values {
        let term = ConditionTerm::from_value(value)?;
        match term {
            ConditionTerm::Literal(_) | ConditionTerm::Prefix(_) => match string_group {
                Some(i) => groups[i].push(term),
                None => {
                    string_group = Some(groups.len());
                    groups.push(vec![term]);
                }
            },
            other => groups.push(vec![other]),
        }
    }

    groups
        .into_iter()
        .map(|terms| ConditionDocument::new(terms).decompile())
        .collect()
}
