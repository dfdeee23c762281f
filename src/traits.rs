use crate::types::{
    AddToResourcePolicyResult, PolicyAttachment, PolicyDocument, PolicyStatement, ResourceRef,
};

/// Anything that owns a resource policy slot, e.g. a topic, a queue or a
/// function's permission set.
pub trait PolicyHolder {
    /// The handle other parts of the graph use to refer to this holder
    fn handle(&self) -> ResourceRef;

    /// Whether the first statement may create the document. Imported
    /// resources and kinds without resource policies answer `false`.
    fn auto_create_policy(&self) -> bool;

    fn policy_attachment(&self) -> &PolicyAttachment;

    fn policy_attachment_mut(&mut self) -> &mut PolicyAttachment;

    /// Append a statement to this holder's own policy, creating the document
    /// on first use.
    fn add_to_resource_policy(&mut self, statement: PolicyStatement) -> AddToResourcePolicyResult {
        let auto_create = self.auto_create_policy();
        if self
            .policy_attachment_mut()
            .add_statement(auto_create, statement)
        {
            AddToResourcePolicyResult {
                succeeded: true,
                policy_dependable: Some(self.handle()),
            }
        } else {
            AddToResourcePolicyResult::refused()
        }
    }

    fn policy_document(&self) -> Option<&PolicyDocument> {
        self.policy_attachment().document()
    }
}
