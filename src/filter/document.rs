//! Compiled condition documents in the message-routing wire format.
//!
//! | Condition                  | Wire terms                                  |
//! |----------------------------|---------------------------------------------|
//! | `Exists`                   | `{"exists": true}`                          |
//! | string allow `v`           | `"v"`                                       |
//! | string prefix `p`          | `{"prefix": "p"}`                           |
//! | string deny `[a, b]`       | `{"anything-but": ["a", "b"]}`              |
//! | numeric allow `n`          | `{"numeric": ["=", n]}`                     |
//! | `between(lo, hi)`          | `{"numeric": [">=", lo, "<=", hi]}`         |
//! | `between_strict(lo, hi)`   | `{"numeric": [">", lo, "<", hi]}`           |
//! | `gt`/`gte`/`lt`/`lte` `n`  | `{"numeric": [">", n]}` etc.                |
//!
//! Terms of one document are alternatives: a message matches when any term
//! matches.

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value, json};
use strum_macros::{AsRefStr, EnumString};

use crate::error::BindingError;

use super::condition::{Condition, NumericCondition, StringCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString)]
pub enum NumericOp {
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Gte,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTerm {
    Exists,
    Literal(String),
    Prefix(String),
    AnythingBut(Vec<String>),
    Numeric(Vec<(NumericOp, f64)>),
}

/// Integral values render without a fractional part.
fn number(value: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

impl ConditionTerm {
    pub fn to_value(&self) -> Value {
        match self {
            ConditionTerm::Exists => json!({"exists": true}),
            ConditionTerm::Literal(s) => Value::String(s.clone()),
            ConditionTerm::Prefix(p) => json!({"prefix": p}),
            ConditionTerm::AnythingBut(values) => json!({"anything-but": values}),
            ConditionTerm::Numeric(bounds) => {
                let flat: Vec<Value> = bounds
                    .iter()
                    .flat_map(|(op, v)| [Value::String(op.as_ref().to_string()), number(*v)])
                    .collect();
                json!({"numeric": flat})
            }
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, BindingError> {
        match value {
            Value::String(s) => Ok(ConditionTerm::Literal(s.clone())),
            Value::Object(map) => term_from_object(map),
            other => Err(BindingError::InvalidFormat(format!(
                "unsupported filter term: {other}"
            ))),
        }
    }
}

fn term_from_object(map: &Map<String, Value>) -> Result<ConditionTerm, BindingError> {
    let mut entries = map.iter();
    let (Some((key, body)), None) = (entries.next(), entries.next()) else {
        return Err(BindingError::InvalidFormat(format!(
            "a filter term object must have exactly one key, found {}",
            map.len()
        )));
    };

    match (key.as_str(), body) {
        ("exists", Value::Bool(true)) => Ok(ConditionTerm::Exists),
        ("prefix", Value::String(p)) => Ok(ConditionTerm::Prefix(p.clone())),
        ("anything-but", Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    BindingError::InvalidFormat(format!("anything-but expects strings, found {v}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ConditionTerm::AnythingBut),
        ("numeric", Value::Array(flat)) => numeric_bounds(flat).map(ConditionTerm::Numeric),
        (key, body) => Err(BindingError::InvalidFormat(format!(
            "unsupported filter term {key}: {body}"
        ))),
    }
}

fn numeric_bounds(flat: &[Value]) -> Result<Vec<(NumericOp, f64)>, BindingError> {
    if flat.is_empty() || flat.len() % 2 != 0 {
        return Err(BindingError::InvalidFormat(format!(
            "numeric expects operator/value pairs, found {} elements",
            flat.len()
        )));
    }
    flat.chunks(2)
        .map(|pair| {
            let op = pair[0]
                .as_str()
                .and_then(|s| s.parse::<NumericOp>().ok())
                .ok_or_else(|| {
                    BindingError::InvalidFormat(format!("unknown numeric operator {}", pair[0]))
                })?;
            let value = pair[1].as_f64().ok_or_else(|| {
                BindingError::InvalidFormat(format!("numeric operand {} is not a number", pair[1]))
            })?;
            Ok((op, value))
        })
        .collect()
}

impl Serialize for ConditionTerm {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(ser)
    }
}

/// The compiled form of one [`Condition`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ConditionDocument {
    terms: Vec<ConditionTerm>,
}

impl ConditionDocument {
    pub fn new(terms: Vec<ConditionTerm>) -> Self {
        ConditionDocument { terms }
    }

    pub fn terms(&self) -> &[ConditionTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.terms.iter().map(ConditionTerm::to_value).collect())
    }

    /// Reconstruct the condition this document was compiled from.
    pub fn decompile(&self) -> Result<Condition, BindingError> {
        decompile(self)
    }
}

/// Compile a condition. Pure; conditions are valid by construction.
pub fn compile(condition: &Condition) -> ConditionDocument {
    let terms = match condition {
        Condition::Exists => vec![ConditionTerm::Exists],
        Condition::String(s) if !s.denied().is_empty() => {
            vec![ConditionTerm::AnythingBut(s.denied().to_vec())]
        }
        Condition::String(s) => s
            .allowed()
            .iter()
            .cloned()
            .map(ConditionTerm::Literal)
            .chain(s.prefixes().iter().cloned().map(ConditionTerm::Prefix))
            .collect(),
        Condition::Numeric(n) => compile_numeric(n),
    };
    ConditionDocument { terms }
}

fn compile_numeric(n: &NumericCondition) -> Vec<ConditionTerm> {
    use NumericOp::*;

    let mut terms: Vec<ConditionTerm> = n
        .allowed()
        .iter()
        .map(|v| ConditionTerm::Numeric(vec![(Eq, *v)]))
        .collect();
    if let Some((lo, hi)) = n.between() {
        terms.push(ConditionTerm::Numeric(vec![(Gte, lo), (Lte, hi)]));
    }
    if let Some((lo, hi)) = n.between_strict() {
        terms.push(ConditionTerm::Numeric(vec![(Gt, lo), (Lt, hi)]));
    }
    let singles = [
        (Gt, n.greater_than()),
        (Gte, n.greater_than_or_equal_to()),
        (Lt, n.less_than()),
        (Lte, n.less_than_or_equal_to()),
    ];
    for (op, value) in singles {
        if let Some(v) = value {
            terms.push(ConditionTerm::Numeric(vec![(op, v)]));
        }
    }
    terms
}

/// Inverse of [`compile`]. Fails with `InvalidFormat` on documents that no
/// single condition compiles to (mixed kinds, repeated ranges).
pub fn decompile(document: &ConditionDocument) -> Result<Condition, BindingError> {
    let terms = document.terms();
    match terms {
        [] => Err(BindingError::InvalidFormat(
            "an empty condition document has no condition".to_string(),
        )),
        [ConditionTerm::Exists] => Ok(Condition::Exists),
        [ConditionTerm::AnythingBut(values)] => Condition::deny(values.iter().cloned()),
        _ if terms
            .iter()
            .all(|t| matches!(t, ConditionTerm::Literal(_) | ConditionTerm::Prefix(_))) =>
        {
            let mut builder = StringCondition::builder();
            for term in terms {
                builder = match term {
                    ConditionTerm::Literal(v) => builder.allow([v.clone()]),
                    ConditionTerm::Prefix(p) => builder.prefixes([p.clone()]),
                    _ => builder,
                };
            }
            builder.build().map(Condition::String)
        }
        _ if terms.iter().all(|t| matches!(t, ConditionTerm::Numeric(_))) => {
            decompile_numeric(terms).map(Condition::Numeric)
        }
        _ => Err(BindingError::InvalidFormat(
            "condition document mixes term kinds that no single condition produces".to_string(),
        )),
    }
}

fn decompile_numeric(terms: &[ConditionTerm]) -> Result<NumericCondition, BindingError> {
    use NumericOp::*;

    let mut builder = NumericCondition::builder();
    let mut seen: Vec<&'static str> = Vec::new();
    let mut once = |slot: &'static str| {
        if seen.contains(&slot) {
            Err(BindingError::InvalidFormat(format!(
                "numeric bound '{slot}' appears twice in one condition document"
            )))
        } else {
            seen.push(slot);
            Ok(())
        }
    };

    for term in terms {
        let ConditionTerm::Numeric(bounds) = term else {
            continue;
        };
        builder = match bounds.as_slice() {
            [(Eq, v)] => builder.allow([*v]),
            [(Gte, lo), (Lte, hi)] => {
                once("between")?;
                builder.between(*lo, *hi)
            }
            [(Gt, lo), (Lt, hi)] => {
                once("between_strict")?;
                builder.between_strict(*lo, *hi)
            }
            [(Gt, v)] => {
                once(">")?;
                builder.greater_than(*v)
            }
            [(Gte, v)] => {
                once(">=")?;
                builder.greater_than_or_equal_to(*v)
            }
            [(Lt, v)] => {
                once("<")?;
                builder.less_than(*v)
            }
            [(Lte, v)] => {
                once("<=")?;
                builder.less_than_or_equal_to(*v)
            }
            other => {
                return Err(BindingError::InvalidFormat(format!(
                    "unsupported numeric expression {:?}",
                    other
                )));
            }
        };
    }
    builder.build()
}
