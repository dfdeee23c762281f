//! Resource kinds and the per-kind constants the rest of the crate needs.
//!
//! This module centralizes service names, ARN shapes and CloudFormation
//! type names so they are not scattered as magic strings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The resource kinds a graph can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ResourceKind {
    /// A broadcast topic (e.g. an SNS topic)
    Topic,
    /// A message queue (e.g. an SQS queue)
    Queue,
    /// An invocable function (e.g. a Lambda function)
    Function,
    /// An object bucket (e.g. an S3 bucket)
    Bucket,
    /// An encryption key (e.g. a KMS key)
    Key,
    /// A streaming delivery channel (e.g. a Firehose delivery stream)
    DeliveryStream,
}

impl AsRef<str> for ResourceKind {
    fn as_ref(&self) -> &str {
        match self {
            Self::Topic => "Topic",
            Self::Queue => "Queue",
            Self::Function => "Function",
            Self::Bucket => "Bucket",
            Self::Key => "Key",
            Self::DeliveryStream => "DeliveryStream",
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Topic" => Ok(Self::Topic),
            "Queue" => Ok(Self::Queue),
            "Function" => Ok(Self::Function),
            "Bucket" => Ok(Self::Bucket),
            "Key" => Ok(Self::Key),
            "DeliveryStream" => Ok(Self::DeliveryStream),
            _ => Err(format!("Unknown resource kind: {s}")),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl ResourceKind {
    /// The ARN service segment.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Topic => "sns",
            Self::Queue => "sqs",
            Self::Function => "lambda",
            Self::Bucket => "s3",
            Self::Key => "kms",
            Self::DeliveryStream => "firehose",
        }
    }

    /// The service principal that acts on behalf of this kind when it
    /// delivers to somebody else.
    pub fn service_principal(&self) -> String {
        format!("{}.amazonaws.com", self.service())
    }

    /// The ARN resource segment for a resource of this kind called `name`.
    pub fn arn_resource(&self, name: &str) -> String {
        match self {
            Self::Function => format!("function:{name}"),
            Self::Key => format!("key/{name}"),
            Self::DeliveryStream => format!("deliverystream/{name}"),
            _ => name.to_string(),
        }
    }

    /// Buckets are global: their ARNs carry neither region nor account.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Bucket)
    }

    /// Whether an owned resource of this kind gets a policy document created
    /// on the first `add_to_resource_policy` call.
    pub fn auto_create_policy(&self) -> bool {
        !matches!(self, Self::DeliveryStream)
    }

    pub fn cfn_type(&self) -> &'static str {
        match self {
            Self::Topic => "AWS::SNS::Topic",
            Self::Queue => "AWS::SQS::Queue",
            Self::Function => "AWS::Lambda::Function",
            Self::Bucket => "AWS::S3::Bucket",
            Self::Key => "AWS::KMS::Key",
            Self::DeliveryStream => "AWS::KinesisFirehose::DeliveryStream",
        }
    }

    /// The separate resource type the policy document renders as, if the
    /// kind does not embed it.
    pub fn policy_cfn_type(&self) -> Option<&'static str> {
        match self {
            Self::Topic => Some("AWS::SNS::TopicPolicy"),
            Self::Queue => Some("AWS::SQS::QueuePolicy"),
            Self::Bucket => Some("AWS::S3::BucketPolicy"),
            Self::Function => Some("AWS::Lambda::Permission"),
            Self::Key | Self::DeliveryStream => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use yare::parameterized;

    #[parameterized(
        topic = { ResourceKind::Topic, "sns", "my-topic" },
        queue = { ResourceKind::Queue, "sqs", "my-topic" },
        function = { ResourceKind::Function, "lambda", "function:my-topic" },
        key = { ResourceKind::Key, "kms", "key/my-topic" },
        stream = { ResourceKind::DeliveryStream, "firehose", "deliverystream/my-topic" },
    )]
    fn test_arn_parts(kind: ResourceKind, service: &str, resource: &str) {
        assert_eq!(kind.service(), service);
        assert_eq!(kind.arn_resource("my-topic"), resource);
    }

    #[test]
    fn test_round_trip_names() {
        for kind in [
            ResourceKind::Topic,
            ResourceKind::Queue,
            ResourceKind::Function,
            ResourceKind::Bucket,
            ResourceKind::Key,
            ResourceKind::DeliveryStream,
        ] {
            assert_eq!(ResourceKind::from_str(kind.as_ref()), Ok(kind));
        }
        assert!(ResourceKind::from_str("Table").is_err());
    }

    #[test]
    fn test_only_delivery_streams_refuse_policies() {
        assert!(ResourceKind::Topic.auto_create_policy());
        assert!(ResourceKind::Function.auto_create_policy());
        assert!(!ResourceKind::DeliveryStream.auto_create_policy());
    }

    #[test]
    fn test_service_principal() {
        assert_eq!(ResourceKind::Topic.service_principal(), "sns.amazonaws.com");
        assert_eq!(ResourceKind::Bucket.service_principal(), "s3.amazonaws.com");
    }
}
