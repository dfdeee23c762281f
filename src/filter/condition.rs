//! Typed filter conditions.
//!
//! Every constructor validates: a condition value in circulation always has
//! at least one populated field, never mixes a deny-list with allow/prefix
//! terms, and never carries an empty or inverted numeric range.

use itertools::Itertools;

use crate::error::BindingError;

use super::document::{ConditionDocument, compile};

/// One filter condition on a message attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The attribute must be present; its value is not constrained.
    Exists,
    String(StringCondition),
    Numeric(NumericCondition),
}

impl Condition {
    pub fn exists() -> Self {
        Condition::Exists
    }

    /// Match any of the given string values.
    pub fn allow<I, S>(values: I) -> Result<Self, BindingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StringCondition::builder().allow(values).build().map(Condition::String)
    }

    /// Match any value except the given ones.
    pub fn deny<I, S>(values: I) -> Result<Self, BindingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StringCondition::builder().deny(values).build().map(Condition::String)
    }

    /// Match values beginning with any of the given prefixes.
    pub fn prefixes<I, S>(values: I) -> Result<Self, BindingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StringCondition::builder()
            .prefixes(values)
            .build()
            .map(Condition::String)
    }

    /// Match any of the given numbers.
    pub fn numbers<I: IntoIterator<Item = f64>>(values: I) -> Result<Self, BindingError> {
        NumericCondition::builder().allow(values).build().map(Condition::Numeric)
    }

    /// Inclusive range.
    pub fn between(lo: f64, hi: f64) -> Result<Self, BindingError> {
        NumericCondition::builder().between(lo, hi).build().map(Condition::Numeric)
    }

    /// Exclusive range on both ends.
    pub fn between_strict(lo: f64, hi: f64) -> Result<Self, BindingError> {
        NumericCondition::builder()
            .between_strict(lo, hi)
            .build()
            .map(Condition::Numeric)
    }

    pub fn greater_than(value: f64) -> Result<Self, BindingError> {
        NumericCondition::builder().greater_than(value).build().map(Condition::Numeric)
    }

    pub fn greater_than_or_equal_to(value: f64) -> Result<Self, BindingError> {
        NumericCondition::builder()
            .greater_than_or_equal_to(value)
            .build()
            .map(Condition::Numeric)
    }

    pub fn less_than(value: f64) -> Result<Self, BindingError> {
        NumericCondition::builder().less_than(value).build().map(Condition::Numeric)
    }

    pub fn less_than_or_equal_to(value: f64) -> Result<Self, BindingError> {
        NumericCondition::builder()
            .less_than_or_equal_to(value)
            .build()
            .map(Condition::Numeric)
    }

    /// Compile into the message-routing wire document.
    pub fn compile(&self) -> ConditionDocument {
        compile(self)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringCondition {
    allow: Vec<String>,
    deny: Vec<String>,
    prefixes: Vec<String>,
}

impl StringCondition {
    pub fn builder() -> StringConditionBuilder {
        StringConditionBuilder::default()
    }

    pub fn allowed(&self) -> &[String] {
        &self.allow
    }

    pub fn denied(&self) -> &[String] {
        &self.deny
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn matches(&self, value: &str) -> bool {
        if !self.deny.is_empty() {
            return !self.deny.iter().any(|d| d == value);
        }
        self.allow.iter().any(|a| a == value) || self.prefixes.iter().any(|p| value.starts_with(p))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StringConditionBuilder {
    allow: Vec<String>,
    deny: Vec<String>,
    prefixes: Vec<String>,
}

impl StringConditionBuilder {
    pub fn allow<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn deny<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn prefixes<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<StringCondition, BindingError> {
        if self.allow.is_empty() && self.deny.is_empty() && self.prefixes.is_empty() {
            return Err(BindingError::construction(
                "a string condition needs at least one allow, deny or prefix value",
            ));
        }
        if !self.deny.is_empty() && !(self.allow.is_empty() && self.prefixes.is_empty()) {
            return Err(BindingError::construction(
                "a deny-list cannot be combined with allow or prefix values in one condition",
            ));
        }
        Ok(StringCondition {
            allow: self.allow.into_iter().unique().collect(),
            deny: self.deny.into_iter().unique().collect(),
            prefixes: self.prefixes.into_iter().unique().collect(),
        })
    }
}

/// Numeric bounds; the condition matches when ANY populated bound matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumericCondition {
    allow: Vec<f64>,
    between: Option<(f64, f64)>,
    between_strict: Option<(f64, f64)>,
    greater_than: Option<f64>,
    greater_than_or_equal_to: Option<f64>,
    less_than: Option<f64>,
    less_than_or_equal_to: Option<f64>,
}

impl NumericCondition {
    pub fn builder() -> NumericConditionBuilder {
        NumericConditionBuilder::default()
    }

    pub fn allowed(&self) -> &[f64] {
        &self.allow
    }

    pub fn between(&self) -> Option<(f64, f64)> {
        self.between
    }

    pub fn between_strict(&self) -> Option<(f64, f64)> {
        self.between_strict
    }

    pub fn greater_than(&self) -> Option<f64> {
        self.greater_than
    }

    pub fn greater_than_or_equal_to(&self) -> Option<f64> {
        self.greater_than_or_equal_to
    }

    pub fn less_than(&self) -> Option<f64> {
        self.less_than
    }

    pub fn less_than_or_equal_to(&self) -> Option<f64> {
        self.less_than_or_equal_to
    }

    pub fn matches(&self, value: f64) -> bool {
        self.allow.contains(&value)
            || self.between.is_some_and(|(lo, hi)| lo <= value && value <= hi)
            || self.between_strict.is_some_and(|(lo, hi)| lo < value && value < hi)
            || self.greater_than.is_some_and(|v| value > v)
            || self.greater_than_or_equal_to.is_some_and(|v| value >= v)
            || self.less_than.is_some_and(|v| value < v)
            || self.less_than_or_equal_to.is_some_and(|v| value <= v)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NumericConditionBuilder {
    inner: NumericCondition,
}

impl NumericConditionBuilder {
    pub fn allow<I: IntoIterator<Item = f64>>(mut self, values: I) -> Self {
        self.inner.allow.extend(values);
        self
    }

    pub fn between(mut self, lo: f64, hi: f64) -> Self {
        self.inner.between = Some((lo, hi));
        self
    }

    pub fn between_strict(mut self, lo: f64, hi: f64) -> Self {
        self.inner.between_strict = Some((lo, hi));
        self
    }

    pub fn greater_than(mut self, value: f64) -> Self {
        self.inner.greater_than = Some(value);
        self
    }

    pub fn greater_than_or_equal_to(mut self, value: f64) -> Self {
        self.inner.greater_than_or_equal_to = Some(value);
        self
    }

    pub fn less_than(mut self, value: f64) -> Self {
        self.inner.less_than = Some(value);
        self
    }

    pub fn less_than_or_equal_to(mut self, value: f64) -> Self {
        self.inner.less_than_or_equal_to = Some(value);
        self
    }

    pub fn build(self) -> Result<NumericCondition, BindingError> {
        let mut c = self.inner;
        let bounds = [
            c.greater_than,
            c.greater_than_or_equal_to,
            c.less_than,
            c.less_than_or_equal_to,
        ];
        let ranges = [c.between, c.between_strict];

        if c.allow.is_empty()
            && bounds.iter().all(Option::is_none)
            && ranges.iter().all(Option::is_none)
        {
            return Err(BindingError::construction(
                "a numeric condition needs at least one value or bound",
            ));
        }

        let all_finite = c.allow.iter().all(|v| v.is_finite())
            && bounds.iter().flatten().all(|v| v.is_finite())
            && ranges
                .iter()
                .flatten()
                .all(|(lo, hi)| lo.is_finite() && hi.is_finite());
        if !all_finite {
            return Err(BindingError::construction(
                "numeric conditions only accept finite numbers",
            ));
        }

        if let Some((lo, hi)) = c.between {
            if lo > hi {
                return Err(BindingError::construction(format!(
                    "between({lo}, {hi}) has its lower bound above its upper bound"
                )));
            }
        }
        if let Some((lo, hi)) = c.between_strict {
            if lo >= hi {
                return Err(BindingError::construction(format!(
                    "between_strict({lo}, {hi}) is an empty range"
                )));
            }
        }

        // -0.0 and 0.0 render the same, so they must dedupe the same.
        c.allow = c
            .allow
            .into_iter()
            .map(|v| if v == 0.0 { 0.0 } else { v })
            .unique_by(|v| v.to_bits())
            .collect();
        Ok(c)
    }
}
