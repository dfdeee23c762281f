//! Permission statements for resource policy documents.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::BindingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum Effect {
    Allow,
    Deny,
}

/// Who a statement grants to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PolicyPrincipal {
    /// A service principal, e.g. `sns.amazonaws.com`
    Service(String),
    /// An account root, rendered as its id
    Account(String),
    /// A role or user ARN
    Arn(String),
    /// Everybody
    Any,
}

impl PolicyPrincipal {
    pub fn service(name: impl Into<String>) -> Self {
        PolicyPrincipal::Service(name.into())
    }

    /// The rendered principal, e.g. `sns.amazonaws.com` or `*`.
    pub fn value(&self) -> &str {
        self.slot().1
    }

    fn slot(&self) -> (&'static str, &str) {
        match self {
            PolicyPrincipal::Service(s) => ("Service", s),
            PolicyPrincipal::Account(a) => ("AWS", a),
            PolicyPrincipal::Arn(a) => ("AWS", a),
            PolicyPrincipal::Any => ("AWS", "*"),
        }
    }
}

/// One statement of a resource policy. Built through [`PolicyStatement::builder`],
/// so every value in circulation is valid for a resource policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    sid: Option<String>,
    effect: Effect,
    principals: Vec<PolicyPrincipal>,
    actions: Vec<String>,
    resources: Vec<String>,
    conditions: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PolicyStatement {
    pub fn builder() -> PolicyStatementBuilder {
        PolicyStatementBuilder::default()
    }

    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn principals(&self) -> &[PolicyPrincipal] {
        &self.principals
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// The value under `operator` / `key` in the condition block.
    pub fn condition(&self, operator: &str, key: &str) -> Option<&Value> {
        self.conditions.get(operator).and_then(|m| m.get(key))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyStatementBuilder {
    sid: Option<String>,
    effect: Option<Effect>,
    principals: Vec<PolicyPrincipal>,
    actions: Vec<String>,
    resources: Vec<String>,
    conditions: BTreeMap<String, BTreeMap<String, Value>>,
}

impl PolicyStatementBuilder {
    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Defaults to `Allow` when never called.
    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn principal(mut self, principal: PolicyPrincipal) -> Self {
        self.principals.push(principal);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<PolicyStatement, BindingError> {
        if self.actions.is_empty() {
            return Err(BindingError::construction(
                "a resource policy statement must name at least one action",
            ));
        }
        if self.principals.is_empty() {
            return Err(BindingError::construction(
                "a resource policy statement must name at least one principal",
            ));
        }
        Ok(PolicyStatement {
            sid: self.sid,
            effect: self.effect.unwrap_or(Effect::Allow),
            principals: self.principals,
            actions: self.actions,
            resources: self.resources,
            conditions: self.conditions,
        })
    }
}

/// Single-element lists render as a scalar.
fn one_or_many(values: &[String]) -> Value {
    match values {
        [one] => Value::String(one.clone()),
        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
    }
}

impl Serialize for PolicyStatement {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut principals: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for principal in &self.principals {
            let (slot, value) = principal.slot();
            principals.entry(slot).or_default().push(value.to_string());
        }
        let principals: BTreeMap<&str, Value> = principals
            .iter()
            .map(|(slot, values)| (*slot, one_or_many(values)))
            .collect();

        let mut m = ser.serialize_map(None)?;
        if let Some(sid) = &self.sid {
            m.serialize_entry("Sid", sid)?;
        }
        m.serialize_entry("Effect", &self.effect.to_string())?;
        m.serialize_entry("Principal", &principals)?;
        m.serialize_entry("Action", &one_or_many(&self.actions))?;
        if !self.resources.is_empty() {
            m.serialize_entry("Resource", &one_or_many(&self.resources))?;
        }
        if !self.conditions.is_empty() {
            m.serialize_entry("Condition", &self.conditions)?;
        }
        m.end()
    }
}
