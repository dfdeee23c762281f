//! Subscription delivery configuration.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::BindingError;
use crate::filter::{CompiledFilterPolicy, FilterPolicy};
use crate::types::{ResourceKind, ResourceRef};

/// How a topic delivers to a subscriber.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SubscriptionProtocol {
    Http,
    Https,
    Email,
    EmailJson,
    Sms,
    /// Delivery into a queue
    #[serde(rename = "sqs")]
    #[strum(serialize = "sqs")]
    QueueDelivery,
    /// Mobile push endpoints
    #[serde(rename = "application")]
    #[strum(serialize = "application")]
    MobileApp,
    /// Invocation of a function
    #[serde(rename = "lambda")]
    #[strum(serialize = "lambda")]
    FunctionInvoke,
    #[serde(rename = "firehose")]
    #[strum(serialize = "firehose")]
    FirehoseStream,
}

impl SubscriptionProtocol {
    pub fn supports_raw_delivery(&self) -> bool {
        matches!(
            self,
            Self::Http | Self::Https | Self::QueueDelivery | Self::FirehoseStream
        )
    }
}

/// Options accepted by every subscriber kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionOptions {
    pub raw_message_delivery: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_queue: Option<ResourceRef>,
    /// No policy means unconditional delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_policy: Option<FilterPolicy>,
    /// Region of the topic for cross-region subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Required for firehose subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_role_arn: Option<String>,
}

impl SubscriptionOptions {
    pub fn raw_message_delivery(mut self, raw: bool) -> Self {
        self.raw_message_delivery = raw;
        self
    }

    pub fn dead_letter_queue(mut self, queue: ResourceRef) -> Self {
        self.dead_letter_queue = Some(queue);
        self
    }

    pub fn filter_policy(mut self, policy: FilterPolicy) -> Self {
        self.filter_policy = Some(policy);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn subscription_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.subscription_role_arn = Some(arn.into());
        self
    }

    pub fn is_default(&self) -> bool {
        *self == SubscriptionOptions::default()
    }
}

/// The immutable, validated delivery configuration of one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDescriptor {
    endpoint: String,
    protocol: SubscriptionProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_letter_target: Option<ResourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_policy: Option<CompiledFilterPolicy>,
    raw_delivery: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cross_account_role_arn: Option<String>,
}

impl SubscriptionDescriptor {
    /// Validate and assemble a descriptor. `default_region` is the region the
    /// subscription is deployed to; a `region` option equal to it is dropped.
    pub fn build(
        endpoint: impl Into<String>,
        protocol: SubscriptionProtocol,
        options: &SubscriptionOptions,
        default_region: Option<&str>,
    ) -> Result<Self, BindingError> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(BindingError::construction(
                "a subscription endpoint must be non-empty",
            ));
        }
        if protocol == SubscriptionProtocol::FirehoseStream && options.subscription_role_arn.is_none()
        {
            return Err(BindingError::construction(
                "a subscription role ARN is required for firehose subscriptions",
            ));
        }
        if options.raw_message_delivery && !protocol.supports_raw_delivery() {
            return Err(BindingError::construction(format!(
                "raw message delivery can only be enabled for http, https, sqs and firehose subscriptions, not {protocol}"
            )));
        }
        if let Some(dlq) = options.dead_letter_queue {
            if !dlq.is(ResourceKind::Queue) {
                return Err(BindingError::construction(format!(
                    "a dead-letter target must be a queue, found {}",
                    dlq.kind
                )));
            }
        }

        let filter_policy = options
            .filter_policy
            .as_ref()
            .map(FilterPolicy::compile)
            .transpose()?;

        let region = options
            .region
            .clone()
            .filter(|r| Some(r.as_str()) != default_region);

        Ok(SubscriptionDescriptor {
            endpoint,
            protocol,
            dead_letter_target: options.dead_letter_queue,
            filter_policy,
            raw_delivery: options.raw_message_delivery,
            region,
            cross_account_role_arn: options.subscription_role_arn.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn protocol(&self) -> SubscriptionProtocol {
        self.protocol
    }

    pub fn dead_letter_target(&self) -> Option<ResourceRef> {
        self.dead_letter_target
    }

    pub fn filter_policy(&self) -> Option<&CompiledFilterPolicy> {
        self.filter_policy.as_ref()
    }

    pub fn raw_delivery(&self) -> bool {
        self.raw_delivery
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn cross_account_role_arn(&self) -> Option<&str> {
        self.cross_account_role_arn.as_deref()
    }
}
