//! Resource policy documents and the lazily created attachment slot that
//! owns one.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use super::ids::ResourceRef;
use super::statement::PolicyStatement;

pub const POLICY_VERSION: &str = "2012-10-17";

/// An ordered list of statements. Statements are only ever appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDocument {
    statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn push(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }
}

impl Serialize for PolicyDocument {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = ser.serialize_struct("PolicyDocument", 2)?;
        s.serialize_field("Version", POLICY_VERSION)?;
        s.serialize_field("Statement", &self.statements)?;
        s.end()
    }
}

/// Outcome of `add_to_resource_policy`. A refused statement is reported here
/// rather than as an error: callers routinely probe and then branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddToResourcePolicyResult {
    pub succeeded: bool,
    /// The resource whose policy now carries the statement; anything that
    /// relies on the grant should depend on it.
    pub policy_dependable: Option<ResourceRef>,
}

impl AddToResourcePolicyResult {
    pub fn refused() -> Self {
        AddToResourcePolicyResult {
            succeeded: false,
            policy_dependable: None,
        }
    }
}

/// The policy slot of a single resource: absent until the first statement,
/// then exactly one document for the rest of the resource's life.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PolicyAttachment {
    #[default]
    Absent,
    Attached(PolicyDocument),
}

impl PolicyAttachment {
    pub fn document(&self) -> Option<&PolicyDocument> {
        match self {
            PolicyAttachment::Absent => None,
            PolicyAttachment::Attached(doc) => Some(doc),
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, PolicyAttachment::Attached(_))
    }

    /// Append `statement`, creating the document first when `auto_create`
    /// allows it. Returns `false` when there is no document to append to.
    pub(crate) fn add_statement(&mut self, auto_create: bool, statement: PolicyStatement) -> bool {
        match self {
            PolicyAttachment::Attached(doc) => {
                doc.push(statement);
                debug!(event = "Policy", phase = "Appended", statements = doc.len());
                true
            }
            PolicyAttachment::Absent if auto_create => {
                let mut doc = PolicyDocument::default();
                doc.push(statement);
                *self = PolicyAttachment::Attached(doc);
                debug!(event = "Policy", phase = "Created", statements = 1);
                true
            }
            PolicyAttachment::Absent => {
                warn!(
                    event = "Policy",
                    phase = "Refused",
                    actions = statement.actions().join(",")
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::statement::PolicyPrincipal;
    use serde_json::json;

    fn statement(action: &str) -> PolicyStatement {
        PolicyStatement::builder()
            .principal(PolicyPrincipal::Any)
            .action(action)
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_statement_creates_document() {
        let mut slot = PolicyAttachment::default();
        assert!(slot.document().is_none());
        assert!(slot.add_statement(true, statement("sns:Publish")));
        assert!(slot.is_attached());
        assert_eq!(slot.document().unwrap().len(), 1);
    }

    #[test]
    fn test_subsequent_statements_append_in_order() {
        let mut slot = PolicyAttachment::default();
        for action in ["a:One", "a:Two", "a:Three"] {
            assert!(slot.add_statement(true, statement(action)));
        }
        let actions: Vec<&str> = slot
            .document()
            .unwrap()
            .statements()
            .iter()
            .map(|s| s.actions()[0].as_str())
            .collect();
        assert_eq!(actions, vec!["a:One", "a:Two", "a:Three"]);
    }

    #[test]
    fn test_refused_without_auto_create() {
        let mut slot = PolicyAttachment::default();
        assert!(!slot.add_statement(false, statement("sns:Publish")));
        assert_eq!(slot, PolicyAttachment::Absent);
    }

    #[test]
    fn test_existing_document_accepts_even_without_auto_create() {
        let mut slot = PolicyAttachment::default();
        slot.add_statement(true, statement("a:One"));
        assert!(slot.add_statement(false, statement("a:Two")));
        assert_eq!(slot.document().unwrap().len(), 2);
    }

    #[test]
    fn test_document_serialization() {
        let mut slot = PolicyAttachment::default();
        slot.add_statement(true, statement("sns:Publish"));
        assert_eq!(
            serde_json::to_value(slot.document().unwrap()).unwrap(),
            json!({
                "Version": "2012-10-17",
                "Statement": [
                    {"Effect": "Allow", "Principal": {"AWS": "*"}, "Action": "sns:Publish"}
                ]
            })
        );
    }
}
