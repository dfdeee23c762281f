//! Data model types for the deployment graph.
//!
//! Canonical string forms:
//! - ARN: `arn:aws:sqs:us-east-1:123456789012:orders`, buckets `arn:aws:s3:::bucket`
//! - Resource path: `Stack/name`, unique per graph among owned resources
//! - Resource handle: `Queue#3` (kind plus arena index)

mod arn;
mod binding_result;
mod environment;
mod ids;
mod notification;
mod policy_document;
mod resource;
mod resource_kind;
mod stack;
mod statement;

pub use arn::Arn;
pub use binding_result::{BindingConfig, BindingResult};
pub use environment::{Environment, GraphSettings, PSEUDO_ACCOUNT, PSEUDO_REGION};
pub use ids::{ArenaId, ResourceId, ResourceMarker, ResourceRef, StackId, StackMarker};
pub use notification::{
    DestinationKind, EventType, FilterRule, NotificationKeyFilter, filter_rules,
};
pub use policy_document::{
    AddToResourcePolicyResult, POLICY_VERSION, PolicyAttachment, PolicyDocument,
};
pub use resource::ResourceNode;
pub use resource_kind::ResourceKind;
pub use stack::Stack;
pub use statement::{Effect, PolicyPrincipal, PolicyStatement, PolicyStatementBuilder};
