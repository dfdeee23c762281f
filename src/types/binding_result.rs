//! The artifact a binder hands back to the resource it was bound to.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::subscription::SubscriptionDescriptor;

use super::ids::{ResourceRef, StackId};
use super::notification::DestinationKind;

/// What the target needs to materialize the link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BindingConfig {
    /// A topic subscription and the stack it must be materialized in.
    Subscription {
        descriptor: SubscriptionDescriptor,
        owner: StackId,
    },
    /// A bucket event destination.
    Notification { destination: DestinationKind },
}

/// Result of binding a subscriber to a target. Read-only once created;
/// repeat bindings of the same pair share one instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingResult {
    /// Identity of the subscriber, e.g. `App/orders` or `https:https://example.com`
    pub subscriber: String,
    pub target: ResourceRef,
    /// The subscriber's ARN or endpoint as seen from the target
    pub address: String,
    pub config: BindingConfig,
    /// Resources whose policies were mutated by this binding; whatever
    /// materializes the link depends on them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ResourceRef>,
}

impl BindingResult {
    pub fn descriptor(&self) -> Option<&SubscriptionDescriptor> {
        match &self.config {
            BindingConfig::Subscription { descriptor, .. } => Some(descriptor),
            BindingConfig::Notification { .. } => None,
        }
    }

    pub fn destination(&self) -> Option<DestinationKind> {
        match &self.config {
            BindingConfig::Notification { destination } => Some(*destination),
            BindingConfig::Subscription { .. } => None,
        }
    }
}

impl Display for BindingResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.config {
            BindingConfig::Subscription { descriptor, .. } => write!(
                f,
                "Subscription({} -> {}; {})",
                self.target,
                descriptor.protocol(),
                self.address
            ),
            BindingConfig::Notification { destination } => write!(
                f,
                "Notification({} -> {destination}; {})",
                self.target, self.address
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{SubscriptionOptions, SubscriptionProtocol};
    use crate::types::ids::ArenaId;
    use crate::types::resource_kind::ResourceKind;

    fn topic() -> ResourceRef {
        ResourceRef::new(ArenaId::new(0), ResourceKind::Topic)
    }

    #[test]
    fn test_binding_result_display_subscription() {
        let descriptor = SubscriptionDescriptor::build(
            "https://example.com/hook",
            SubscriptionProtocol::Https,
            &SubscriptionOptions::default(),
            None,
        )
        .unwrap();
        let result = BindingResult {
            subscriber: "https:https://example.com/hook".to_string(),
            target: topic(),
            address: "https://example.com/hook".to_string(),
            config: BindingConfig::Subscription {
                descriptor,
                owner: ArenaId::new(0),
            },
            dependencies: vec![],
        };
        assert_eq!(
            result.to_string(),
            "Subscription(Topic#0 -> https; https://example.com/hook)"
        );
        assert!(result.descriptor().is_some());
        assert_eq!(result.destination(), None);
    }

    #[test]
    fn test_binding_result_display_notification() {
        let result = BindingResult {
            subscriber: "App/q".to_string(),
            target: ResourceRef::new(ArenaId::new(1), ResourceKind::Bucket),
            address: "arn:aws:sqs:us-east-1:123456789012:q".to_string(),
            config: BindingConfig::Notification {
                destination: DestinationKind::Queue,
            },
            dependencies: vec![ResourceRef::new(ArenaId::new(2), ResourceKind::Queue)],
        };
        let display = result.to_string();
        assert!(display.starts_with("Notification(Bucket#1 -> Queue"));
        assert_eq!(result.destination(), Some(DestinationKind::Queue));
        assert!(result.descriptor().is_none());
    }
}
