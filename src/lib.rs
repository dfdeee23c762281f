// src/lib.rs
pub use binder::{Binder, SubscriberKey};
pub use binding_cache::BindingCache;
pub use error::BindingError;
pub use graph::{DeploymentGraph, NotificationRecord, SubscriptionRecord, Topology};
pub use loader::parse_filter_policy;
pub use manifest::{
    Manifest, ManifestEntry, NOTIFICATIONS_TYPE, SUBSCRIPTION_TYPE, StackManifest, logical_id,
};
pub use subscription::{SubscriptionDescriptor, SubscriptionOptions, SubscriptionProtocol};
pub use traits::PolicyHolder;

pub use filter::{
    CompiledFilterPolicy, Condition, ConditionDocument, ConditionTerm, FilterPolicy,
    NumericCondition, NumericConditionBuilder, NumericOp, StringCondition, StringConditionBuilder,
};
pub use types::*;

mod binder;
mod binding_cache;
mod error;
pub mod filter;
mod graph;
mod loader;
mod manifest;
mod subscription;
mod traits;
pub mod types;

#[cfg(test)]
mod tests;
