//! The deployment graph: arena-owned stacks and resources, the binding cache
//! and the subscription and notification records materialized from it.

use std::rc::Rc;

use tracing::{debug, info};

use crate::binder::{Binder, grant};
use crate::binding_cache::BindingCache;
use crate::error::BindingError;
use crate::manifest::{self, Manifest};
use crate::subscription::SubscriptionDescriptor;
use crate::traits::PolicyHolder;
use crate::types::{
    AddToResourcePolicyResult, ArenaId, Arn, BindingConfig, BindingResult, DestinationKind,
    Environment, EventType, FilterRule, GraphSettings, NotificationKeyFilter, PolicyDocument,
    PolicyPrincipal, PolicyStatement, ResourceKind, ResourceNode, ResourceRef, Stack, StackId,
    filter_rules,
};

const PATH_SEPARATOR: char = '/';

/// Stacks and resources, indexed by their arena handles. Binders read
/// addresses from it and mutate a resource's policy only through
/// [`Topology::add_to_resource_policy`].
#[derive(Debug, Clone, Default)]
pub struct Topology {
    settings: GraphSettings,
    stacks: Vec<Stack>,
    resources: Vec<ResourceNode>,
}

impl Topology {
    fn new(settings: GraphSettings) -> Self {
        Topology {
            settings,
            stacks: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn stack(&self, id: StackId) -> Result<&Stack, BindingError> {
        self.stacks
            .get(id.index())
            .ok_or_else(|| BindingError::UnknownResource(format!("stack {id} does not exist")))
    }

    pub fn resources(&self) -> &[ResourceNode] {
        &self.resources
    }

    /// Look up a handle. Handles whose kind disagrees with the node are
    /// treated as foreign.
    pub fn resource(&self, r: ResourceRef) -> Result<&ResourceNode, BindingError> {
        self.resources
            .get(r.id.index())
            .filter(|node| node.kind() == r.kind)
            .ok_or_else(|| {
                BindingError::UnknownResource(format!("{r} does not belong to this graph"))
            })
    }

    fn resource_mut(&mut self, r: ResourceRef) -> Result<&mut ResourceNode, BindingError> {
        self.resources
            .get_mut(r.id.index())
            .filter(|node| node.kind() == r.kind)
            .ok_or_else(|| {
                BindingError::UnknownResource(format!("{r} does not belong to this graph"))
            })
    }

    pub(crate) fn add_to_resource_policy(
        &mut self,
        r: ResourceRef,
        statement: PolicyStatement,
    ) -> Result<AddToResourcePolicyResult, BindingError> {
        Ok(self.resource_mut(r)?.add_to_resource_policy(statement))
    }

    fn add_stack(&mut self, name: &str, env: Environment) -> Result<StackId, BindingError> {
        if name.is_empty() {
            return Err(BindingError::construction("stack names must be non-empty"));
        }
        if name.contains(PATH_SEPARATOR) {
            return Err(BindingError::construction(format!(
                "stack name '{name}' must not contain '{PATH_SEPARATOR}'"
            )));
        }
        if self.stacks.iter().any(|s| s.name() == name) {
            return Err(BindingError::construction(format!(
                "a stack named '{name}' already exists"
            )));
        }
        let id: StackId = ArenaId::new(self.stacks.len());
        let env = env.or(&self.settings.default_environment());
        self.stacks.push(Stack::new(id, name, env));
        Ok(id)
    }

    fn insert(
        &mut self,
        stack: StackId,
        kind: ResourceKind,
        name: &str,
        imported: Option<Arn>,
        encryption_key: Option<ResourceRef>,
    ) -> Result<ResourceRef, BindingError> {
        let owner = self.stack(stack)?.clone();
        if name.is_empty() {
            return Err(BindingError::construction("resource names must be non-empty"));
        }
        if name.contains(PATH_SEPARATOR) {
            return Err(BindingError::construction(format!(
                "resource name '{name}' must not contain '{PATH_SEPARATOR}'"
            )));
        }
        // Imports are told apart by ARN, so only owned names must be unique.
        if imported.is_none()
            && self
                .resources
                .iter()
                .any(|r| r.stack() == stack && !r.is_imported() && r.name() == name)
        {
            return Err(BindingError::construction(format!(
                "stack '{}' already has a resource named '{name}'",
                owner.name()
            )));
        }
        if let Some(key) = encryption_key {
            self.resource(key)?;
        }

        let handle = ResourceRef::new(ArenaId::new(self.resources.len()), kind);
        let node = match imported {
            Some(arn) => {
                let env = arn.environment().or(owner.env());
                ResourceNode::new(handle, name, owner.name(), stack, env, arn).imported()
            }
            None => {
                let env = owner.env().clone();
                let arn = Arn::for_resource(&self.settings.partition, kind, name, &env);
                ResourceNode::new(handle, name, owner.name(), stack, env, arn)
            }
        };
        let node = match encryption_key {
            Some(key) => node.with_encryption_key(key),
            None => node,
        };

        debug!(
            event = "Resource",
            phase = "Added",
            resource = node.to_string(),
            arn = node.arn().to_string(),
            imported = node.is_imported()
        );
        self.resources.push(node);
        Ok(handle)
    }
}

/// A topic subscription, placed in its owner stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRecord {
    topic: ResourceRef,
    owner: StackId,
    descriptor: SubscriptionDescriptor,
    binding: Rc<BindingResult>,
    depends_on: Vec<ResourceRef>,
}

impl SubscriptionRecord {
    pub fn topic(&self) -> ResourceRef {
        self.topic
    }

    pub fn owner(&self) -> StackId {
        self.owner
    }

    pub fn descriptor(&self) -> &SubscriptionDescriptor {
        &self.descriptor
    }

    pub fn binding(&self) -> &Rc<BindingResult> {
        &self.binding
    }

    /// Resources whose policies must exist before the subscription.
    pub fn depends_on(&self) -> &[ResourceRef] {
        &self.depends_on
    }
}

/// One bucket event delivered to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    bucket: ResourceRef,
    event: EventType,
    destination: DestinationKind,
    filters: Vec<FilterRule>,
    binding: Rc<BindingResult>,
}

impl NotificationRecord {
    pub fn bucket(&self) -> ResourceRef {
        self.bucket
    }

    pub fn event(&self) -> EventType {
        self.event
    }

    pub fn destination(&self) -> DestinationKind {
        self.destination
    }

    pub fn address(&self) -> &str {
        &self.binding.address
    }

    pub fn filters(&self) -> &[FilterRule] {
        &self.filters
    }

    pub fn binding(&self) -> &Rc<BindingResult> {
        &self.binding
    }
}

/// The main graph handle. Single-threaded: every mutation happens through
/// `&mut self` and later calls observe earlier ones.
#[derive(Debug, Clone, Default)]
pub struct DeploymentGraph {
    topology: Topology,
    cache: BindingCache,
    subscriptions: Vec<SubscriptionRecord>,
    notifications: Vec<NotificationRecord>,
}

impl DeploymentGraph {
    pub fn new(settings: GraphSettings) -> Self {
        DeploymentGraph {
            topology: Topology::new(settings),
            ..Default::default()
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn settings(&self) -> &GraphSettings {
        self.topology.settings()
    }

    /// Add a stack. Unset environment dimensions are taken from the graph
    /// settings.
    pub fn add_stack(&mut self, name: &str, env: Environment) -> Result<StackId, BindingError> {
        self.topology.add_stack(name, env)
    }

    pub fn stack(&self, id: StackId) -> Result<&Stack, BindingError> {
        self.topology.stack(id)
    }

    pub fn resource(&self, r: ResourceRef) -> Result<&ResourceNode, BindingError> {
        self.topology.resource(r)
    }

    pub fn add_topic(&mut self, stack: StackId, name: &str) -> Result<ResourceRef, BindingError> {
        self.topology.insert(stack, ResourceKind::Topic, name, None, None)
    }

    pub fn add_queue(&mut self, stack: StackId, name: &str) -> Result<ResourceRef, BindingError> {
        self.topology.insert(stack, ResourceKind::Queue, name, None, None)
    }

    /// A queue encrypted with `key`. Bindings to it also grant the delivering
    /// service use of the key.
    pub fn add_encrypted_queue(
        &mut self,
        stack: StackId,
        name: &str,
        key: ResourceRef,
    ) -> Result<ResourceRef, BindingError> {
        if !key.is(ResourceKind::Key) {
            return Err(BindingError::construction(format!(
                "a queue must be encrypted with a Key, got {key}"
            )));
        }
        self.topology
            .insert(stack, ResourceKind::Queue, name, None, Some(key))
    }

    pub fn add_function(&mut self, stack: StackId, name: &str) -> Result<ResourceRef, BindingError> {
        self.topology.insert(stack, ResourceKind::Function, name, None, None)
    }

    pub fn add_bucket(&mut self, stack: StackId, name: &str) -> Result<ResourceRef, BindingError> {
        self.topology.insert(stack, ResourceKind::Bucket, name, None, None)
    }

    pub fn add_key(&mut self, stack: StackId, name: &str) -> Result<ResourceRef, BindingError> {
        self.topology.insert(stack, ResourceKind::Key, name, None, None)
    }

    pub fn add_delivery_stream(
        &mut self,
        stack: StackId,
        name: &str,
    ) -> Result<ResourceRef, BindingError> {
        self.topology
            .insert(stack, ResourceKind::DeliveryStream, name, None, None)
    }

    /// Reference an existing resource by ARN. Imported resources never get a
    /// policy document and are not rendered. Importing the same ARN into a
    /// stack twice returns the first handle.
    pub fn import_resource(
        &mut self,
        stack: StackId,
        kind: ResourceKind,
        arn: &str,
    ) -> Result<ResourceRef, BindingError> {
        let arn: Arn = arn.parse()?;
        if arn.service() != kind.service() {
            return Err(BindingError::InvalidFormat(format!(
                "ARN '{arn}' belongs to service '{}', not to a {kind}",
                arn.service()
            )));
        }
        if let Some(existing) = self.topology.resources.iter().find(|r| {
            r.stack() == stack && r.is_imported() && r.kind() == kind && *r.arn() == arn
        }) {
            return Ok(existing.handle());
        }
        let name = arn
            .resource()
            .rsplit([':', '/'])
            .next()
            .unwrap_or_default()
            .to_string();
        self.topology.insert(stack, kind, &name, Some(arn), None)
    }

    /// Append a statement to the resource's own policy. A refusal is reported
    /// in the result, not as an error.
    pub fn add_to_resource_policy(
        &mut self,
        r: ResourceRef,
        statement: PolicyStatement,
    ) -> Result<AddToResourcePolicyResult, BindingError> {
        self.topology.add_to_resource_policy(r, statement)
    }

    pub fn policy_document(&self, r: ResourceRef) -> Result<Option<&PolicyDocument>, BindingError> {
        Ok(self.topology.resource(r)?.policy_document())
    }

    /// Bind through the cache without materializing anything.
    pub fn bind(
        &mut self,
        binder: &Binder,
        target: ResourceRef,
    ) -> Result<Rc<BindingResult>, BindingError> {
        self.cache.get_or_bind(&mut self.topology, binder, target)
    }

    pub fn binding_cache(&self) -> &BindingCache {
        &self.cache
    }

    /// Subscribe `binder` to `topic`. Adding the same subscriber twice is a
    /// no-op returning the first binding.
    pub fn add_subscription(
        &mut self,
        topic: ResourceRef,
        binder: Binder,
    ) -> Result<Rc<BindingResult>, BindingError> {
        self.expect_target(topic, ResourceKind::Topic)?;
        if let Some(dlq) = binder.options().and_then(|o| o.dead_letter_queue) {
            self.topology.resource(dlq)?;
        }

        let binding = self.bind(&binder, topic)?;
        if self
            .subscriptions
            .iter()
            .any(|s| Rc::ptr_eq(&s.binding, &binding))
        {
            return Ok(binding);
        }

        let BindingConfig::Subscription { descriptor, owner } = &binding.config else {
            return Err(BindingError::construction(format!(
                "{binding} is not a subscription"
            )));
        };

        let mut depends_on = binding.dependencies.clone();
        if let Some(dlq) = descriptor.dead_letter_target() {
            let topic_arn = self.topology.resource(topic)?.arn().to_string();
            let dlq_arn = self.topology.resource(dlq)?.arn().to_string();
            let statement = PolicyStatement::builder()
                .principal(PolicyPrincipal::service(ResourceKind::Topic.service_principal()))
                .action("sqs:SendMessage")
                .resource(dlq_arn)
                .condition("ArnEquals", "aws:SourceArn", topic_arn)
                .build()?;
            grant(&mut self.topology, dlq, statement, &mut depends_on)?;
        }

        let owner_name = self.topology.stack(*owner)?.name().to_string();
        info!(
            event = "Subscription",
            phase = "Materialized",
            topic = topic.to_string(),
            protocol = descriptor.protocol().to_string(),
            endpoint = descriptor.endpoint(),
            owner = owner_name
        );
        self.subscriptions.push(SubscriptionRecord {
            topic,
            owner: *owner,
            descriptor: descriptor.clone(),
            binding: Rc::clone(&binding),
            depends_on,
        });
        Ok(binding)
    }

    /// Deliver `event` on `bucket` to `binder`. Identical repeats are
    /// deduplicated; the destination is bound once per bucket.
    pub fn add_event_notification(
        &mut self,
        bucket: ResourceRef,
        event: EventType,
        binder: Binder,
        filters: &[NotificationKeyFilter],
    ) -> Result<Rc<BindingResult>, BindingError> {
        self.expect_target(bucket, ResourceKind::Bucket)?;
        let filters = filter_rules(filters)?;

        let binding = self.bind(&binder, bucket)?;
        let Some(destination) = binding.destination() else {
            return Err(BindingError::construction(format!(
                "{binding} is not a notification destination"
            )));
        };

        let duplicate = self.notifications.iter().any(|n| {
            n.bucket == bucket
                && n.event == event
                && Rc::ptr_eq(&n.binding, &binding)
                && n.filters == filters
        });
        if !duplicate {
            info!(
                event = "Notification",
                phase = "Materialized",
                bucket = bucket.to_string(),
                kind = event.to_string(),
                destination = binding.address
            );
            self.notifications.push(NotificationRecord {
                bucket,
                event,
                destination,
                filters,
                binding: Rc::clone(&binding),
            });
        }
        Ok(binding)
    }

    pub fn subscriptions(&self) -> &[SubscriptionRecord] {
        &self.subscriptions
    }

    pub fn notifications(&self) -> &[NotificationRecord] {
        &self.notifications
    }

    /// Render every stack into its ordered manifest.
    pub fn manifest(&self) -> Manifest {
        manifest::render(&self.topology, &self.subscriptions, &self.notifications)
    }

    fn expect_target(&self, r: ResourceRef, kind: ResourceKind) -> Result<(), BindingError> {
        self.topology.resource(r)?;
        if r.is(kind) {
            Ok(())
        } else {
            Err(BindingError::construction(format!(
                "expected a {kind} target, got {r}"
            )))
        }
    }
}

#[cfg(test)]
mod tests;
