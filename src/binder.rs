//! Subscribers and event destinations.
//!
//! A [`Binder`] describes "deliver to X". Binding it to a topic or bucket
//! resolves X's address relative to the target and grants the target's
//! service permission on X's own policy. The target's policy is never
//! touched.

use tracing::{debug, info, warn};

use crate::error::BindingError;
use crate::graph::Topology;
use crate::manifest::logical_id;
use crate::subscription::{SubscriptionDescriptor, SubscriptionOptions, SubscriptionProtocol};
use crate::types::{
    BindingConfig, BindingResult, DestinationKind, PolicyPrincipal, PolicyStatement,
    ResourceKind, ResourceNode, ResourceRef,
};

const SOURCE_ARN: &str = "aws:SourceArn";
const SOURCE_ACCOUNT: &str = "aws:SourceAccount";

/// The subscriber half of a binding cache key: the arena handle for
/// resources, the protocol and address for endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriberKey {
    Resource(ResourceRef),
    Endpoint {
        protocol: SubscriptionProtocol,
        endpoint: String,
    },
}

/// Every kind of subscriber or destination a target accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Binder {
    QueueDelivery {
        queue: ResourceRef,
        options: SubscriptionOptions,
    },
    FunctionInvoke {
        function: ResourceRef,
        options: SubscriptionOptions,
    },
    /// Only valid as a bucket notification destination
    BroadcastTopic { topic: ResourceRef },
    /// URL, email, SMS and mobile endpoints
    GenericEndpoint {
        endpoint: String,
        protocol: SubscriptionProtocol,
        options: SubscriptionOptions,
    },
    FirehoseStream {
        stream: ResourceRef,
        options: SubscriptionOptions,
    },
}

fn expect_kind(r: ResourceRef, kind: ResourceKind) -> Result<(), BindingError> {
    if r.is(kind) {
        Ok(())
    } else {
        Err(BindingError::construction(format!(
            "expected a {kind} handle, got {r}"
        )))
    }
}

impl Binder {
    pub fn queue(queue: ResourceRef) -> Result<Self, BindingError> {
        Self::queue_with(queue, SubscriptionOptions::default())
    }

    pub fn queue_with(queue: ResourceRef, options: SubscriptionOptions) -> Result<Self, BindingError> {
        expect_kind(queue, ResourceKind::Queue)?;
        Ok(Binder::QueueDelivery { queue, options })
    }

    pub fn function(function: ResourceRef) -> Result<Self, BindingError> {
        Self::function_with(function, SubscriptionOptions::default())
    }

    pub fn function_with(
        function: ResourceRef,
        options: SubscriptionOptions,
    ) -> Result<Self, BindingError> {
        expect_kind(function, ResourceKind::Function)?;
        Ok(Binder::FunctionInvoke { function, options })
    }

    pub fn topic(topic: ResourceRef) -> Result<Self, BindingError> {
        expect_kind(topic, ResourceKind::Topic)?;
        Ok(Binder::BroadcastTopic { topic })
    }

    /// An HTTP or HTTPS endpoint; the protocol follows the URL scheme.
    pub fn url(url: impl Into<String>, options: SubscriptionOptions) -> Result<Self, BindingError> {
        let url = url.into();
        let protocol = if url.starts_with("https://") {
            SubscriptionProtocol::Https
        } else if url.starts_with("http://") {
            SubscriptionProtocol::Http
        } else {
            return Err(BindingError::construction(format!(
                "URL '{url}' must start with https:// or http://"
            )));
        };
        Self::endpoint(url, protocol, options)
    }

    pub fn email(
        address: impl Into<String>,
        json: bool,
        options: SubscriptionOptions,
    ) -> Result<Self, BindingError> {
        let protocol = if json {
            SubscriptionProtocol::EmailJson
        } else {
            SubscriptionProtocol::Email
        };
        Self::endpoint(address, protocol, options)
    }

    pub fn sms(number: impl Into<String>, options: SubscriptionOptions) -> Result<Self, BindingError> {
        Self::endpoint(number, SubscriptionProtocol::Sms, options)
    }

    /// Any endpoint that is not a resource in the graph.
    pub fn endpoint(
        endpoint: impl Into<String>,
        protocol: SubscriptionProtocol,
        options: SubscriptionOptions,
    ) -> Result<Self, BindingError> {
        if matches!(
            protocol,
            SubscriptionProtocol::QueueDelivery
                | SubscriptionProtocol::FunctionInvoke
                | SubscriptionProtocol::FirehoseStream
        ) {
            return Err(BindingError::construction(format!(
                "{protocol} subscribers must be bound through their resource handle"
            )));
        }
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(BindingError::construction(
                "a subscription endpoint must be non-empty",
            ));
        }
        Ok(Binder::GenericEndpoint {
            endpoint,
            protocol,
            options,
        })
    }

    /// A delivery stream subscriber. The role ARN is checked here so a
    /// missing one fails before any binding is attempted.
    pub fn firehose(stream: ResourceRef, options: SubscriptionOptions) -> Result<Self, BindingError> {
        expect_kind(stream, ResourceKind::DeliveryStream)?;
        if options.subscription_role_arn.is_none() {
            return Err(BindingError::construction(
                "a subscription role ARN is required for firehose subscriptions",
            ));
        }
        Ok(Binder::FirehoseStream { stream, options })
    }

    /// The resource this binder delivers to, if it is one.
    pub fn subscriber(&self) -> Option<ResourceRef> {
        match self {
            Binder::QueueDelivery { queue, .. } => Some(*queue),
            Binder::FunctionInvoke { function, .. } => Some(*function),
            Binder::BroadcastTopic { topic } => Some(*topic),
            Binder::FirehoseStream { stream, .. } => Some(*stream),
            Binder::GenericEndpoint { .. } => None,
        }
    }

    pub(crate) fn options(&self) -> Option<&SubscriptionOptions> {
        match self {
            Binder::QueueDelivery { options, .. }
            | Binder::FunctionInvoke { options, .. }
            | Binder::GenericEndpoint { options, .. }
            | Binder::FirehoseStream { options, .. } => Some(options),
            Binder::BroadcastTopic { .. } => None,
        }
    }

    pub fn key(&self) -> SubscriberKey {
        match self {
            Binder::GenericEndpoint {
                endpoint, protocol, ..
            } => SubscriberKey::Endpoint {
                protocol: *protocol,
                endpoint: endpoint.clone(),
            },
            Binder::QueueDelivery { queue: r, .. }
            | Binder::FunctionInvoke { function: r, .. }
            | Binder::BroadcastTopic { topic: r }
            | Binder::FirehoseStream { stream: r, .. } => SubscriberKey::Resource(*r),
        }
    }

    /// Readable subscriber name for logs and binding results.
    pub fn identity(&self, topology: &Topology) -> Result<String, BindingError> {
        match (self, self.subscriber()) {
            (_, Some(r)) => Ok(topology.resource(r)?.path().to_string()),
            (Binder::GenericEndpoint { endpoint, protocol, .. }, None) => {
                Ok(format!("{protocol}:{endpoint}"))
            }
            (_, None) => Err(BindingError::construction("binder without a subscriber")),
        }
    }

    /// Bind to `target`, granting permissions on the subscriber's own policy.
    /// Not cached; go through the binding cache for idempotency.
    pub(crate) fn bind(
        &self,
        topology: &mut Topology,
        target: ResourceRef,
    ) -> Result<BindingResult, BindingError> {
        let subscriber = self.identity(topology)?;
        debug!(
            event = "Bind",
            phase = "Resolve",
            subscriber = subscriber,
            target = target.to_string()
        );

        let result = match (self, target.kind) {
            (Binder::QueueDelivery { queue, options }, ResourceKind::Topic) => {
                queue_subscription(topology, *queue, target, options, subscriber)?
            }
            (Binder::FunctionInvoke { function, options }, ResourceKind::Topic) => {
                function_subscription(topology, *function, target, options, subscriber)?
            }
            (Binder::GenericEndpoint { endpoint, protocol, options }, ResourceKind::Topic) => {
                endpoint_subscription(topology, endpoint, *protocol, target, options, subscriber)?
            }
            (Binder::FirehoseStream { stream, options }, ResourceKind::Topic) => {
                firehose_subscription(topology, *stream, target, options, subscriber)?
            }
            (Binder::QueueDelivery { queue, .. }, ResourceKind::Bucket) => {
                self.require_default_options()?;
                queue_destination(topology, *queue, target, subscriber)?
            }
            (Binder::FunctionInvoke { function, .. }, ResourceKind::Bucket) => {
                self.require_default_options()?;
                function_destination(topology, *function, target, subscriber)?
            }
            (Binder::BroadcastTopic { topic }, ResourceKind::Bucket) => {
                topic_destination(topology, *topic, target, subscriber)?
            }
            (binder, kind) => {
                return Err(BindingError::construction(format!(
                    "{} cannot be bound to a {kind}",
                    binder.describe()
                )));
            }
        };

        info!(
            event = "Bind",
            phase = "Bound",
            subscriber = result.subscriber,
            target = target.to_string(),
            dependencies = result.dependencies.len()
        );
        Ok(result)
    }

    fn require_default_options(&self) -> Result<(), BindingError> {
        match self.options() {
            Some(options) if !options.is_default() => Err(BindingError::construction(
                "subscription options do not apply to bucket notifications",
            )),
            _ => Ok(()),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Binder::QueueDelivery { .. } => "a queue subscriber",
            Binder::FunctionInvoke { .. } => "a function subscriber",
            Binder::BroadcastTopic { .. } => "a topic destination",
            Binder::GenericEndpoint { .. } => "an endpoint subscriber",
            Binder::FirehoseStream { .. } => "a firehose subscriber",
        }
    }
}

/// Resolve the subscriber's ARN as seen from the target. Fails when exactly
/// one side knows its account or region: the reference cannot be rendered
/// without the caller naming the missing environment.
fn resolve_address(
    topology: &Topology,
    subscriber: ResourceRef,
    target: ResourceRef,
) -> Result<String, BindingError> {
    let sub = topology.resource(subscriber)?;
    let tgt = topology.resource(target)?;
    let (s, t) = (sub.env(), tgt.env());

    if s.account.is_some() != t.account.is_some() {
        return Err(BindingError::resolution(format!(
            "cannot reference {sub} from {tgt}: exactly one of them has a concrete account; \
             give both an explicit account"
        )));
    }
    if s.region.is_some() != t.region.is_some() {
        return Err(BindingError::resolution(format!(
            "cannot reference {sub} from {tgt}: exactly one of them has a concrete region; \
             give both an explicit region"
        )));
    }
    Ok(sub.arn().to_string())
}

/// `App/orders` becomes `AppOrders`.
fn node_unique_id(node: &ResourceNode) -> String {
    logical_id(node.path())
}

/// Append `statement` to `holder`'s policy and record the dependable. A
/// refusal (imported resource) is logged and the binding carries on.
pub(crate) fn grant(
    topology: &mut Topology,
    holder: ResourceRef,
    statement: PolicyStatement,
    dependencies: &mut Vec<ResourceRef>,
) -> Result<(), BindingError> {
    let actions = statement.actions().join(",");
    let outcome = topology.add_to_resource_policy(holder, statement)?;
    match outcome.policy_dependable {
        Some(dependable) if outcome.succeeded => {
            debug!(
                event = "Bind",
                phase = "Grant",
                holder = holder.to_string(),
                actions = actions
            );
            dependencies.push(dependable);
        }
        _ => warn!(
            event = "Bind",
            phase = "Grant",
            holder = holder.to_string(),
            actions = actions,
            granted = false
        ),
    }
    Ok(())
}

fn grant_key_usage(
    topology: &mut Topology,
    subscriber: ResourceRef,
    principal: &str,
    actions: &[&str],
    source_arn: Option<&str>,
    dependencies: &mut Vec<ResourceRef>,
) -> Result<(), BindingError> {
    let Some(key) = topology.resource(subscriber)?.encryption_key() else {
        return Ok(());
    };
    let mut statement = PolicyStatement::builder()
        .principal(PolicyPrincipal::service(principal))
        .actions(actions.iter().copied())
        .resource("*");
    if let Some(arn) = source_arn {
        statement = statement.condition("ArnEquals", SOURCE_ARN, arn);
    }
    grant(topology, key, statement.build()?, dependencies)
}

fn subscription_result(
    topology: &Topology,
    subscriber: String,
    target: ResourceRef,
    address: String,
    descriptor: SubscriptionDescriptor,
    owner_of: ResourceRef,
    dependencies: Vec<ResourceRef>,
) -> Result<BindingResult, BindingError> {
    let owner = topology.resource(owner_of)?.stack();
    Ok(BindingResult {
        subscriber,
        target,
        address,
        config: BindingConfig::Subscription { descriptor, owner },
        dependencies,
    })
}

/// Options with the cross-region qualifier filled in, plus the region the
/// subscription is deployed to. Subscriptions placed in the subscriber's
/// stack name the topic's region when it differs.
fn placed_options(
    topology: &Topology,
    subscriber: ResourceRef,
    topic: ResourceRef,
    options: &SubscriptionOptions,
) -> Result<(SubscriptionOptions, Option<String>), BindingError> {
    let deployed_region = topology.resource(subscriber)?.env().region.clone();
    let topic_region = topology.resource(topic)?.env().region.clone();
    let mut options = options.clone();
    if options.region.is_none() {
        options.region = topic_region;
    }
    Ok((options, deployed_region))
}

fn queue_subscription(
    topology: &mut Topology,
    queue: ResourceRef,
    topic: ResourceRef,
    options: &SubscriptionOptions,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let address = resolve_address(topology, queue, topic)?;
    let topic_arn = topology.resource(topic)?.arn().to_string();
    let principal = ResourceKind::Topic.service_principal();

    let (options, deployed_region) = placed_options(topology, queue, topic, options)?;
    let descriptor = SubscriptionDescriptor::build(
        address.clone(),
        SubscriptionProtocol::QueueDelivery,
        &options,
        deployed_region.as_deref(),
    )?;

    let mut dependencies = Vec::new();
    let statement = PolicyStatement::builder()
        .principal(PolicyPrincipal::service(principal.clone()))
        .action("sqs:SendMessage")
        .resource(address.clone())
        .condition("ArnEquals", SOURCE_ARN, topic_arn.clone())
        .build()?;
    grant(topology, queue, statement, &mut dependencies)?;
    grant_key_usage(
        topology,
        queue,
        &principal,
        &["kms:Decrypt", "kms:GenerateDataKey"],
        Some(&topic_arn),
        &mut dependencies,
    )?;

    subscription_result(topology, subscriber, topic, address, descriptor, queue, dependencies)
}

fn function_subscription(
    topology: &mut Topology,
    function: ResourceRef,
    topic: ResourceRef,
    options: &SubscriptionOptions,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let address = resolve_address(topology, function, topic)?;
    let (topic_arn, sid) = {
        let node = topology.resource(topic)?;
        (node.arn().to_string(), format!("AllowInvoke:{}", node_unique_id(node)))
    };

    let (options, deployed_region) = placed_options(topology, function, topic, options)?;
    let descriptor = SubscriptionDescriptor::build(
        address.clone(),
        SubscriptionProtocol::FunctionInvoke,
        &options,
        deployed_region.as_deref(),
    )?;

    let mut dependencies = Vec::new();
    let statement = PolicyStatement::builder()
        .sid(sid)
        .principal(PolicyPrincipal::service(ResourceKind::Topic.service_principal()))
        .action("lambda:InvokeFunction")
        .resource(address.clone())
        .condition("ArnLike", SOURCE_ARN, topic_arn)
        .build()?;
    grant(topology, function, statement, &mut dependencies)?;

    subscription_result(topology, subscriber, topic, address, descriptor, function, dependencies)
}

fn endpoint_subscription(
    topology: &Topology,
    endpoint: &str,
    protocol: SubscriptionProtocol,
    topic: ResourceRef,
    options: &SubscriptionOptions,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let deployed_region = topology.resource(topic)?.env().region.clone();
    let descriptor =
        SubscriptionDescriptor::build(endpoint, protocol, options, deployed_region.as_deref())?;
    subscription_result(
        topology,
        subscriber,
        topic,
        endpoint.to_string(),
        descriptor,
        topic,
        Vec::new(),
    )
}

fn firehose_subscription(
    topology: &Topology,
    stream: ResourceRef,
    topic: ResourceRef,
    options: &SubscriptionOptions,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let address = resolve_address(topology, stream, topic)?;
    let deployed_region = topology.resource(topic)?.env().region.clone();
    let descriptor = SubscriptionDescriptor::build(
        address.clone(),
        SubscriptionProtocol::FirehoseStream,
        options,
        deployed_region.as_deref(),
    )?;
    subscription_result(topology, subscriber, topic, address, descriptor, topic, Vec::new())
}

fn notification_result(
    subscriber: String,
    bucket: ResourceRef,
    address: String,
    destination: DestinationKind,
    dependencies: Vec<ResourceRef>,
) -> BindingResult {
    BindingResult {
        subscriber,
        target: bucket,
        address,
        config: BindingConfig::Notification { destination },
        dependencies,
    }
}

fn queue_destination(
    topology: &mut Topology,
    queue: ResourceRef,
    bucket: ResourceRef,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let address = resolve_address(topology, queue, bucket)?;
    let bucket_arn = topology.resource(bucket)?.arn().to_string();
    let principal = ResourceKind::Bucket.service_principal();

    let mut dependencies = Vec::new();
    let statement = PolicyStatement::builder()
        .principal(PolicyPrincipal::service(principal.clone()))
        .actions(["sqs:SendMessage", "sqs:GetQueueAttributes", "sqs:GetQueueUrl"])
        .resource(address.clone())
        .condition("ArnLike", SOURCE_ARN, bucket_arn)
        .build()?;
    grant(topology, queue, statement, &mut dependencies)?;
    grant_key_usage(
        topology,
        queue,
        &principal,
        &["kms:GenerateDataKey*", "kms:Decrypt"],
        None,
        &mut dependencies,
    )?;

    Ok(notification_result(
        subscriber,
        bucket,
        address,
        DestinationKind::Queue,
        dependencies,
    ))
}

fn function_destination(
    topology: &mut Topology,
    function: ResourceRef,
    bucket: ResourceRef,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let address = resolve_address(topology, function, bucket)?;
    let (bucket_arn, bucket_account, sid) = {
        let node = topology.resource(bucket)?;
        (
            node.arn().to_string(),
            node.env().account.clone(),
            format!("AllowBucketNotificationsTo{}", node_unique_id(node)),
        )
    };

    let mut statement = PolicyStatement::builder()
        .sid(sid)
        .principal(PolicyPrincipal::service(ResourceKind::Bucket.service_principal()))
        .action("lambda:InvokeFunction")
        .resource(address.clone())
        .condition("ArnLike", SOURCE_ARN, bucket_arn);
    if let Some(account) = bucket_account {
        statement = statement.condition("StringEquals", SOURCE_ACCOUNT, account);
    }

    let mut dependencies = Vec::new();
    grant(topology, function, statement.build()?, &mut dependencies)?;

    Ok(notification_result(
        subscriber,
        bucket,
        address,
        DestinationKind::Function,
        dependencies,
    ))
}

fn topic_destination(
    topology: &mut Topology,
    topic: ResourceRef,
    bucket: ResourceRef,
    subscriber: String,
) -> Result<BindingResult, BindingError> {
    let address = resolve_address(topology, topic, bucket)?;
    let bucket_arn = topology.resource(bucket)?.arn().to_string();

    let mut dependencies = Vec::new();
    let statement = PolicyStatement::builder()
        .principal(PolicyPrincipal::service(ResourceKind::Bucket.service_principal()))
        .action("sns:Publish")
        .resource(address.clone())
        .condition("ArnLike", SOURCE_ARN, bucket_arn)
        .build()?;
    grant(topology, topic, statement, &mut dependencies)?;

    Ok(notification_result(
        subscriber,
        bucket,
        address,
        DestinationKind::Topic,
        dependencies,
    ))
}
