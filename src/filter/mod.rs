//! The filter-policy DSL: typed conditions, their compiled wire documents,
//! and per-attribute filter policies.

mod condition;
mod document;
mod policy;

pub use condition::{
    Condition, NumericCondition, NumericConditionBuilder, StringCondition, StringConditionBuilder,
};
pub use document::{ConditionDocument, ConditionTerm, NumericOp, compile, decompile};
pub use policy::{CompiledFilterPolicy, FilterPolicy, MAX_ATTRIBUTES, MAX_COMBINATIONS};
