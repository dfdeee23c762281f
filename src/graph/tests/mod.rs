use super::*;
use crate::filter::{Condition, FilterPolicy};
use crate::subscription::{SubscriptionOptions, SubscriptionProtocol};
use serde_json::json;

mod notifications;

const ACCOUNT: &str = "123456789012";
const TOPIC_ARN: &str = "arn:aws:sns:us-east-1:123456789012:orders";
const QUEUE_ARN: &str = "arn:aws:sqs:us-east-1:123456789012:jobs";
const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:handler";
const BUCKET_ARN: &str = "arn:aws:s3:::uploads";

fn graph() -> DeploymentGraph {
    DeploymentGraph::new(GraphSettings::default())
}

fn app(graph: &mut DeploymentGraph) -> StackId {
    graph
        .add_stack("App", Environment::new(ACCOUNT, "us-east-1"))
        .unwrap()
}

/// A graph with one stack holding the `orders` topic and the `jobs` queue.
fn topic_and_queue() -> (DeploymentGraph, ResourceRef, ResourceRef) {
    let mut graph = graph();
    let stack = app(&mut graph);
    let topic = graph.add_topic(stack, "orders").unwrap();
    let queue = graph.add_queue(stack, "jobs").unwrap();
    (graph, topic, queue)
}

fn statements_json(graph: &DeploymentGraph, r: ResourceRef) -> serde_json::Value {
    let doc = graph.policy_document(r).unwrap().unwrap();
    serde_json::to_value(doc.statements()).unwrap()
}

#[test]
fn test_stack_inherits_default_environment() {
    let mut graph = DeploymentGraph::new(GraphSettings {
        default_account: Some(ACCOUNT.to_string()),
        default_region: Some("eu-north-1".to_string()),
        ..Default::default()
    });
    let stack = graph
        .add_stack(
            "App",
            Environment {
                account: None,
                region: Some("us-west-2".to_string()),
            },
        )
        .unwrap();
    assert_eq!(
        graph.stack(stack).unwrap().env(),
        &Environment::new(ACCOUNT, "us-west-2")
    );

    let topic = graph.add_topic(stack, "orders").unwrap();
    assert_eq!(
        graph.resource(topic).unwrap().arn().to_string(),
        "arn:aws:sns:us-west-2:123456789012:orders"
    );
}

#[test]
fn test_agnostic_stack_renders_pseudo_references() {
    let mut graph = graph();
    let stack = graph.add_stack("Shared", Environment::agnostic()).unwrap();
    let queue = graph.add_queue(stack, "jobs").unwrap();
    assert_eq!(
        graph.resource(queue).unwrap().arn().to_string(),
        "arn:aws:sqs:${AWS::Region}:${AWS::AccountId}:jobs"
    );
}

#[test]
fn test_stack_and_resource_names_are_unique() {
    let mut graph = graph();
    let stack = app(&mut graph);
    assert!(
        graph
            .add_stack("App", Environment::agnostic())
            .unwrap_err()
            .is_construction()
    );
    assert!(graph.add_stack("", Environment::agnostic()).is_err());

    graph.add_topic(stack, "orders").unwrap();
    assert!(graph.add_queue(stack, "orders").unwrap_err().is_construction());
    assert!(graph.add_queue(stack, "").unwrap_err().is_construction());

    let other = graph.add_stack("Other", Environment::agnostic()).unwrap();
    assert!(graph.add_topic(other, "orders").is_ok());
}

#[test]
fn test_names_cannot_contain_path_separator() {
    let mut graph = graph();
    let stack = app(&mut graph);
    assert!(graph.add_queue(stack, "a/b").unwrap_err().is_construction());
    assert!(
        graph
            .add_stack("App/a", Environment::agnostic())
            .unwrap_err()
            .is_construction()
    );
    assert!(graph.topology().resources().is_empty());
    assert_eq!(graph.topology().stacks().len(), 1);
}

#[test]
fn test_unknown_stack() {
    let mut graph = graph();
    let err = graph.add_topic(ArenaId::new(4), "orders").unwrap_err();
    assert!(matches!(err, BindingError::UnknownResource(_)));
}

#[test]
fn test_import_resource() {
    let mut graph = graph();
    let stack = app(&mut graph);

    let function = graph
        .import_resource(
            stack,
            ResourceKind::Function,
            "arn:aws:lambda:eu-west-1:210987654321:function:external",
        )
        .unwrap();
    let node = graph.resource(function).unwrap();
    assert!(node.is_imported());
    assert_eq!(node.name(), "external");
    assert_eq!(node.env(), &Environment::new("210987654321", "eu-west-1"));

    let bucket = graph
        .import_resource(stack, ResourceKind::Bucket, "arn:aws:s3:::archive")
        .unwrap();
    assert_eq!(
        graph.resource(bucket).unwrap().env(),
        &Environment::new(ACCOUNT, "us-east-1")
    );
}

#[test]
fn test_imports_are_identified_by_arn() {
    let mut graph = graph();
    let stack = app(&mut graph);
    let owned = graph.add_queue(stack, "jobs").unwrap();
    let first = graph
        .import_resource(stack, ResourceKind::Queue, "arn:aws:sqs:us-east-1:111111111111:jobs")
        .unwrap();
    let second = graph
        .import_resource(stack, ResourceKind::Queue, "arn:aws:sqs:eu-west-1:222222222222:jobs")
        .unwrap();
    assert_ne!(first, second);
    assert_ne!(owned, first);
    assert_eq!(
        graph.resource(second).unwrap().env(),
        &Environment::new("222222222222", "eu-west-1")
    );

    let again = graph
        .import_resource(stack, ResourceKind::Queue, "arn:aws:sqs:us-east-1:111111111111:jobs")
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(graph.topology().resources().len(), 3);
    assert!(graph.add_queue(stack, "jobs").unwrap_err().is_construction());
}

#[test]
fn test_import_rejects_wrong_service_and_bad_arns() {
    let mut graph = graph();
    let stack = app(&mut graph);
    let err = graph
        .import_resource(stack, ResourceKind::Queue, TOPIC_ARN)
        .unwrap_err();
    assert!(matches!(err, BindingError::InvalidFormat(_)));

    let err = graph
        .import_resource(stack, ResourceKind::Topic, "not-an-arn")
        .unwrap_err();
    assert!(matches!(err, BindingError::InvalidFormat(_)));
}

#[test]
fn test_encrypted_queue_requires_a_key() {
    let mut graph = graph();
    let stack = app(&mut graph);
    let topic = graph.add_topic(stack, "orders").unwrap();
    let err = graph.add_encrypted_queue(stack, "jobs", topic).unwrap_err();
    assert!(err.is_construction());

    let key = graph.add_key(stack, "cmk").unwrap();
    let queue = graph.add_encrypted_queue(stack, "jobs", key).unwrap();
    assert_eq!(graph.resource(queue).unwrap().encryption_key(), Some(key));
}
