//! Filter policies: attribute name to a list of OR'd conditions.

use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::BindingError;
use crate::loader;

use super::condition::Condition;
use super::document::ConditionDocument;

/// Most attributes a single filter policy may name.
pub const MAX_ATTRIBUTES: usize = 5;
/// Upper bound on the product of per-attribute term counts.
pub const MAX_COMBINATIONS: usize = 100;

/// A declarative rule set restricting which messages a subscriber receives.
/// Attributes keep their insertion order so rendered output is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPolicy {
    attributes: Vec<(String, Vec<Condition>)>,
}

impl FilterPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` with its conditions. Names must be non-empty and unique.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Result<(), BindingError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BindingError::construction(
                "filter policy attribute names must be non-empty",
            ));
        }
        if self.attributes.iter().any(|(n, _)| *n == name) {
            return Err(BindingError::construction(format!(
                "filter policy attribute '{name}' is declared twice"
            )));
        }
        self.attributes.push((name, conditions));
        Ok(())
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        conditions: Vec<Condition>,
    ) -> Result<Self, BindingError> {
        self.insert(name, conditions)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&[Condition]> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Compile every attribute. An empty policy compiles to an empty mapping
    /// (deliver unconditionally); an attribute without conditions is an error.
    pub fn compile(&self) -> Result<CompiledFilterPolicy, BindingError> {
        if self.attributes.len() > MAX_ATTRIBUTES {
            return Err(BindingError::construction(format!(
                "a filter policy can have at most {MAX_ATTRIBUTES} attribute names, found {}",
                self.attributes.len()
            )));
        }

        let mut compiled = Vec::with_capacity(self.attributes.len());
        for (name, conditions) in &self.attributes {
            if conditions.is_empty() {
                return Err(BindingError::construction(format!(
                    "filter policy attribute '{name}' has no conditions"
                )));
            }
            compiled.push((name.clone(), conditions.iter().map(Condition::compile).collect()));
        }
        let compiled = CompiledFilterPolicy {
            attributes: compiled,
        };

        let combinations = compiled.combinations();
        if combinations > MAX_COMBINATIONS {
            return Err(BindingError::construction(format!(
                "the total combination of filter values ({combinations}) must not exceed {MAX_COMBINATIONS}"
            )));
        }
        Ok(compiled)
    }
}

/// A compiled filter policy: attribute name to its compiled condition
/// documents, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilterPolicy {
    attributes: Vec<(String, Vec<ConditionDocument>)>,
}

impl CompiledFilterPolicy {
    pub fn get(&self, name: &str) -> Option<&[ConditionDocument]> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ConditionDocument])> {
        self.attributes
            .iter()
            .map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Product of the per-attribute term counts.
    pub fn combinations(&self) -> usize {
        self.attributes
            .iter()
            .map(|(_, docs)| docs.iter().map(ConditionDocument::len).sum::<usize>())
            .product()
    }

    /// The wire document: every attribute maps to the concatenation of its
    /// conditions' terms.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(name, docs)| (name.clone(), flatten(docs)))
            .collect();
        Value::Object(map)
    }
}

fn flatten(docs: &[ConditionDocument]) -> Value {
    Value::Array(
        docs.iter()
            .flat_map(|d| d.terms().iter().map(|t| t.to_value()))
            .collect(),
    )
}

impl Serialize for CompiledFilterPolicy {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        let mut m = ser.serialize_map(Some(self.attributes.len()))?;
        for (name, docs) in &self.attributes {
            m.serialize_entry(name, &flatten(docs))?;
        }
        m.end()
    }
}

impl Serialize for FilterPolicy {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        self.compile()
            .map_err(S::Error::custom)?
            .serialize(ser)
    }
}

impl<'de> Deserialize<'de> for FilterPolicy {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(de)?;
        loader::filter_policy_from_map(&map).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario_policy() -> FilterPolicy {
        FilterPolicy::new()
            .with_attribute("color", vec![Condition::allow(["red", "orange"]).unwrap()])
            .unwrap()
            .with_attribute(
                "price",
                vec![
                    Condition::between(100.0, 200.0).unwrap(),
                    Condition::greater_than(300.0).unwrap(),
                ],
            )
            .unwrap()
    }

    #[test]
    fn test_filtered_subscription_scenario() {
        let compiled = scenario_policy().compile().unwrap();

        let price = compiled.get("price").unwrap();
        let price_terms: usize = price.iter().map(ConditionDocument::len).sum();
        assert_eq!(price_terms, 2);

        let color = compiled.get("color").unwrap();
        assert_eq!(color.len(), 1);

        assert_eq!(
            compiled.to_value(),
            json!({
                "color": ["red", "orange"],
                "price": [
                    {"numeric": [">=", 100, "<=", 200]},
                    {"numeric": [">", 300]}
                ]
            })
        );
    }

    #[test]
    fn test_serialization_preserves_declaration_order() {
        let policy = FilterPolicy::new()
            .with_attribute("zeta", vec![Condition::exists()])
            .unwrap()
            .with_attribute("alpha", vec![Condition::exists()])
            .unwrap();
        let text = serde_json::to_string(&policy).unwrap();
        assert_eq!(
            text,
            r#"{"zeta":[{"exists":true}],"alpha":[{"exists":true}]}"#
        );
    }

    #[test]
    fn test_empty_policy_compiles_to_unconditional() {
        let compiled = FilterPolicy::new().compile().unwrap();
        assert!(compiled.is_empty());
        assert_eq!(compiled.to_value(), json!({}));
    }

    #[test]
    fn test_attribute_without_conditions_fails_to_compile() {
        let policy = FilterPolicy::new().with_attribute("color", vec![]).unwrap();
        assert!(policy.compile().unwrap_err().is_construction());
    }

    #[test]
    fn test_attribute_names_must_be_unique_and_non_empty() {
        let mut policy = FilterPolicy::new();
        assert!(policy.insert("", vec![Condition::exists()]).is_err());
        policy.insert("color", vec![Condition::exists()]).unwrap();
        assert!(policy.insert("color", vec![Condition::exists()]).is_err());
        assert_eq!(policy.len(), 1);
    }

    #[test]
    fn test_too_many_attributes() {
        let mut policy = FilterPolicy::new();
        for name in ["a", "b", "c", "d", "e", "f"] {
            policy.insert(name, vec![Condition::exists()]).unwrap();
        }
        assert!(policy.compile().unwrap_err().is_construction());
    }

    #[test]
    fn test_too_many_combinations() {
        let values: Vec<String> = (0..11).map(|i| format!("v{i}")).collect();
        let policy = FilterPolicy::new()
            .with_attribute("a", vec![Condition::allow(values.clone()).unwrap()])
            .unwrap()
            .with_attribute("b", vec![Condition::allow(values).unwrap()])
            .unwrap();
        let err = policy.compile().unwrap_err();
        assert!(err.to_string().contains("121"));
    }

    #[test]
    fn test_deserialize_from_wire_format() {
        let policy: FilterPolicy = serde_json::from_value(json!({
            "color": ["red", "orange"],
            "price": [{"numeric": [">=", 100, "<=", 200]}, {"numeric": [">", 300]}]
        }))
        .unwrap();
        assert_eq!(policy.get("color").unwrap().len(), 1);
        assert_eq!(policy.get("price").unwrap().len(), 2);
        assert_eq!(
            policy.compile().unwrap().to_value(),
            scenario_policy().compile().unwrap().to_value()
        );
    }
}
