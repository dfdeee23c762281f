//! Resource nodes held in the graph's arena.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::traits::PolicyHolder;

use super::arn::Arn;
use super::environment::Environment;
use super::ids::{ResourceRef, StackId};
use super::policy_document::PolicyAttachment;
use super::resource_kind::ResourceKind;

/// A resource in a deployment graph. Owned resources are rendered into the
/// manifest; imported ones are only referenced by ARN.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    handle: ResourceRef,
    /// Logical and physical name, unique among the stack's owned resources
    name: String,
    /// `<stack>/<name>`, used in logs and binding results
    path: String,
    stack: StackId,
    env: Environment,
    arn: Arn,
    imported: bool,
    encryption_key: Option<ResourceRef>,
    policy: PolicyAttachment,
}

impl Display for ResourceNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} '{}'", self.handle.kind, self.path)
    }
}

impl ResourceNode {
    pub(crate) fn new(
        handle: ResourceRef,
        name: impl Into<String>,
        stack_name: &str,
        stack: StackId,
        env: Environment,
        arn: Arn,
    ) -> Self {
        let name = name.into();
        Self {
            path: format!("{stack_name}/{name}"),
            handle,
            name,
            stack,
            env,
            arn,
            imported: false,
            encryption_key: None,
            policy: PolicyAttachment::Absent,
        }
    }

    pub(crate) fn imported(mut self) -> Self {
        self.imported = true;
        self
    }

    pub(crate) fn with_encryption_key(mut self, key: ResourceRef) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.handle.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stack(&self) -> StackId {
        self.stack
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    pub fn is_imported(&self) -> bool {
        self.imported
    }

    pub fn encryption_key(&self) -> Option<ResourceRef> {
        self.encryption_key
    }
}

impl PolicyHolder for ResourceNode {
    fn handle(&self) -> ResourceRef {
        self.handle
    }

    fn auto_create_policy(&self) -> bool {
        !self.imported && self.handle.kind.auto_create_policy()
    }

    fn policy_attachment(&self) -> &PolicyAttachment {
        &self.policy
    }

    fn policy_attachment_mut(&mut self) -> &mut PolicyAttachment {
        &mut self.policy
    }
}
