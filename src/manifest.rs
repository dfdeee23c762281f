//! Ordered, per-stack rendering of a deployment graph.
//!
//! Each stack lists its owned resources in creation order, each followed by
//! its policy, then the subscriptions placed in the stack, then one
//! notification configuration per bucket.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::graph::{NotificationRecord, SubscriptionRecord, Topology};
use crate::traits::PolicyHolder;
use crate::types::{
    DestinationKind, Environment, PolicyStatement, ResourceKind, ResourceNode, ResourceRef,
    StackId,
};

pub const NOTIFICATIONS_TYPE: &str = "Custom::S3BucketNotifications";
pub const SUBSCRIPTION_TYPE: &str = "AWS::SNS::Subscription";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    pub logical_id: String,
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ManifestEntry {
    fn new(logical_id: impl Into<String>, resource_type: &str, properties: Value) -> Self {
        ManifestEntry {
            logical_id: logical_id.into(),
            resource_type: resource_type.to_string(),
            properties,
            depends_on: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    pub name: String,
    pub environment: Environment,
    pub resources: Vec<ManifestEntry>,
}

impl StackManifest {
    pub fn entry(&self, logical_id: &str) -> Option<&ManifestEntry> {
        self.resources.iter().find(|e| e.logical_id == logical_id)
    }

    pub fn entries_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a ManifestEntry> {
        self.resources
            .iter()
            .filter(move |e| e.resource_type == resource_type)
    }

    pub fn logical_ids(&self) -> Vec<&str> {
        self.resources.iter().map(|e| e.logical_id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    pub stacks: Vec<StackManifest>,
}

impl Manifest {
    pub fn stack(&self, name: &str) -> Option<&StackManifest> {
        self.stacks.iter().find(|s| s.name == name)
    }
}

/// `orders-queue` becomes `OrdersQueue`.
pub fn logical_id(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Logical ids handed out within one stack. A clash takes the lowest free
/// numeric suffix, so entries rendered earlier keep their ids.
#[derive(Debug, Default)]
struct LogicalIds {
    taken: HashSet<String>,
    policies: HashMap<ResourceRef, Vec<String>>,
}

impl LogicalIds {
    fn claim(&mut self, base: String) -> String {
        let mut id = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(id.clone()) {
            id = format!("{base}{suffix}");
            suffix += 1;
        }
        id
    }

    /// Ids of the entries carrying `r`'s policy, once `r` is rendered.
    fn policy_ids(&self, r: ResourceRef) -> &[String] {
        self.policies.get(&r).map(Vec::as_slice).unwrap_or_default()
    }
}

pub(crate) fn render(
    topology: &Topology,
    subscriptions: &[SubscriptionRecord],
    notifications: &[NotificationRecord],
) -> Manifest {
    let stacks = topology
        .stacks()
        .iter()
        .map(|stack| {
            let mut ids = LogicalIds::default();
            let mut resources = Vec::new();
            for node in topology
                .resources()
                .iter()
                .filter(|n| n.stack() == stack.id() && !n.is_imported())
            {
                let id = ids.claim(logical_id(node.name()));
                let policies = policy_entries(node, &id, &mut ids);
                let policy_ids = match node.kind() {
                    ResourceKind::Key if node.policy_document().is_some() => vec![id.clone()],
                    _ => policies.iter().map(|e| e.logical_id.clone()).collect(),
                };
                ids.policies.insert(node.handle(), policy_ids);
                resources.push(resource_entry(topology, node, id));
                resources.extend(policies);
            }
            for record in subscriptions.iter().filter(|s| s.owner() == stack.id()) {
                resources.extend(subscription_entry(topology, record, &mut ids));
            }
            resources.extend(notification_entries(
                topology,
                stack.id(),
                notifications,
                &mut ids,
            ));

            StackManifest {
                name: stack.name().to_string(),
                environment: stack.env().clone(),
                resources,
            }
        })
        .collect();
    Manifest { stacks }
}

fn resource_entry(topology: &Topology, node: &ResourceNode, id: String) -> ManifestEntry {
    let mut properties = Map::new();
    match node.kind() {
        ResourceKind::Topic => {
            properties.insert("TopicName".into(), json!(node.name()));
        }
        ResourceKind::Queue => {
            properties.insert("QueueName".into(), json!(node.name()));
            if let Some(key) = node.encryption_key().and_then(|k| topology.resource(k).ok()) {
                properties.insert("KmsMasterKeyId".into(), json!(key.arn().to_string()));
            }
        }
        ResourceKind::Function => {
            properties.insert("FunctionName".into(), json!(node.name()));
        }
        ResourceKind::Bucket => {
            properties.insert("BucketName".into(), json!(node.name()));
        }
        ResourceKind::Key => {
            if let Some(doc) = node.policy_document() {
                properties.insert("KeyPolicy".into(), json!(doc));
            }
        }
        ResourceKind::DeliveryStream => {
            properties.insert("DeliveryStreamName".into(), json!(node.name()));
        }
    }
    ManifestEntry::new(id, node.kind().cfn_type(),
        Value::Object(properties),
    )
}

fn permission_id(resource_id: &str, index: usize, statement: &PolicyStatement) -> String {
    let suffix = match statement.sid() {
        Some(sid) => logical_id(sid),
        None => format!("Permission{index}"),
    };
    format!("{resource_id}{suffix}")
}

fn source_condition(statement: &PolicyStatement, operator_key: &[(&str, &str)]) -> Option<Value> {
    operator_key
        .iter()
        .find_map(|(op, key)| statement.condition(op, key).cloned())
}

fn policy_entries(
    node: &ResourceNode,
    resource_id: &str,
    ids: &mut LogicalIds,
) -> Vec<ManifestEntry> {
    let (Some(doc), Some(policy_type)) = (node.policy_document(), node.kind().policy_cfn_type())
    else {
        return Vec::new();
    };
    let arn = node.arn().to_string();

    match node.kind() {
        ResourceKind::Function => doc
            .statements()
            .iter()
            .enumerate()
            .map(|(i, statement)| {
                let mut properties = Map::new();
                properties.insert(
                    "Action".into(),
                    json!(statement.actions().first().cloned().unwrap_or_default()),
                );
                properties.insert("FunctionName".into(), json!(arn));
                if let Some(principal) = statement.principals().first() {
                    properties.insert("Principal".into(), json!(principal.value()));
                }
                if let Some(source) = source_condition(
                    statement,
                    &[("ArnLike", "aws:SourceArn"), ("ArnEquals", "aws:SourceArn")],
                ) {
                    properties.insert("SourceArn".into(), source);
                }
                if let Some(account) =
                    source_condition(statement, &[("StringEquals", "aws:SourceAccount")])
                {
                    properties.insert("SourceAccount".into(), account);
                }
                ManifestEntry::new(
                    ids.claim(permission_id(resource_id, i, statement)),
                    policy_type,
                    Value::Object(properties),
                )
            })
            .collect(),
        kind => {
            let mut properties = Map::new();
            properties.insert("PolicyDocument".into(), json!(doc));
            match kind {
                ResourceKind::Topic => properties.insert("Topics".into(), json!([arn])),
                ResourceKind::Queue => properties.insert("Queues".into(), json!([arn])),
                _ => properties.insert("Bucket".into(), json!(node.name())),
            };
            vec![ManifestEntry::new(
                ids.claim(format!("{resource_id}Policy")),
                policy_type,
                Value::Object(properties),
            )]
        }
    }
}

/// Policy entries of `deps` that live in `stack`. Dependencies on other
/// stacks are ordered by the stacks themselves.
fn depends_on(
    topology: &Topology,
    stack: StackId,
    deps: &[ResourceRef],
    ids: &LogicalIds,
) -> Vec<String> {
    deps.iter()
        .filter(|r| topology.resource(**r).is_ok_and(|node| node.stack() == stack))
        .flat_map(|r| ids.policy_ids(*r))
        .unique()
        .cloned()
        .collect()
}

fn subscription_entry(
    topology: &Topology,
    record: &SubscriptionRecord,
    ids: &mut LogicalIds,
) -> Option<ManifestEntry> {
    let topic = topology.resource(record.topic()).ok()?;
    let descriptor = record.descriptor();

    let mut properties = Map::new();
    properties.insert("Protocol".into(), json!(descriptor.protocol().to_string()));
    properties.insert("TopicArn".into(), json!(topic.arn().to_string()));
    properties.insert("Endpoint".into(), json!(descriptor.endpoint()));
    if let Some(policy) = descriptor.filter_policy() {
        properties.insert("FilterPolicy".into(), policy.to_value());
    }
    if descriptor.raw_delivery() {
        properties.insert("RawMessageDelivery".into(), json!(true));
    }
    if let Some(dlq) = descriptor
        .dead_letter_target()
        .and_then(|r| topology.resource(r).ok())
    {
        properties.insert(
            "RedrivePolicy".into(),
            json!({"deadLetterTargetArn": dlq.arn().to_string()}),
        );
    }
    if let Some(region) = descriptor.region() {
        properties.insert("Region".into(), json!(region));
    }
    if let Some(role) = descriptor.cross_account_role_arn() {
        properties.insert("SubscriptionRoleArn".into(), json!(role));
    }

    let id = ids.claim(format!(
        "{}{}Subscription",
        logical_id(topic.name()),
        logical_id(&record.binding().subscriber)
    ));
    let mut entry = ManifestEntry::new(id, SUBSCRIPTION_TYPE, Value::Object(properties));
    entry.depends_on = depends_on(topology, record.owner(), record.depends_on(), ids);
    Some(entry)
}

fn notification_entries(
    topology: &Topology,
    stack: StackId,
    notifications: &[NotificationRecord],
    ids: &mut LogicalIds,
) -> Vec<ManifestEntry> {
    let by_bucket = notifications
        .iter()
        .filter(|n| {
            topology
                .resource(n.bucket())
                .is_ok_and(|bucket| bucket.stack() == stack)
        })
        .into_group_map_by(|n| n.bucket());

    notifications
        .iter()
        .map(|n| n.bucket())
        .unique()
        .filter_map(|bucket| {
            let records = by_bucket.get(&bucket)?;
            let node = topology.resource(bucket).ok()?;
            Some(notification_entry(topology, node, records, ids))
        })
        .collect()
}

fn notification_entry(
    topology: &Topology,
    bucket: &ResourceNode,
    records: &[&NotificationRecord],
    ids: &mut LogicalIds,
) -> ManifestEntry {
    let mut queues = Vec::new();
    let mut functions = Vec::new();
    let mut topics = Vec::new();
    let mut deps = Vec::new();

    for record in records {
        let (list, arn_key) = match record.destination() {
            DestinationKind::Queue => (&mut queues, "QueueArn"),
            DestinationKind::Function => (&mut functions, "LambdaFunctionArn"),
            DestinationKind::Topic => (&mut topics, "TopicArn"),
        };
        let mut config = Map::new();
        config.insert("Events".into(), json!([record.event()]));
        config.insert(arn_key.into(), json!(record.address()));
        if !record.filters().is_empty() {
            config.insert(
                "Filter".into(),
                json!({"Key": {"FilterRules": record.filters()}}),
            );
        }
        list.push(Value::Object(config));
        deps.extend(record.binding().dependencies.iter().copied());
    }

    let mut configuration = Map::new();
    for (key, list) in [
        ("QueueConfigurations", queues),
        ("LambdaFunctionConfigurations", functions),
        ("TopicConfigurations", topics),
    ] {
        if !list.is_empty() {
            configuration.insert(key.into(), Value::Array(list));
        }
    }

    let mut entry = ManifestEntry::new(
        ids.claim(format!("{}Notifications", logical_id(bucket.name()))),
        NOTIFICATIONS_TYPE,
        json!({
            "BucketName": bucket.name(),
            "NotificationConfiguration": configuration,
        }),
    );
    entry.depends_on = depends_on(topology, bucket.stack(), &deps, ids);
    entry
}
