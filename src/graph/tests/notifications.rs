use super::*;
use crate::types::EventType;

fn bucket_graph() -> (DeploymentGraph, StackId, ResourceRef) {
    let mut graph = graph();
    let stack = app(&mut graph);
    let bucket = graph.add_bucket(stack, "uploads").unwrap();
    (graph, stack, bucket)
}

#[test]
fn test_queue_destination() {
    let (mut graph, stack, bucket) = bucket_graph();
    let queue = graph.add_queue(stack, "jobs").unwrap();

    let binding = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[NotificationKeyFilter::prefix("images/")],
        )
        .unwrap();
    assert_eq!(binding.destination(), Some(DestinationKind::Queue));
    assert_eq!(binding.address, QUEUE_ARN);

    assert_eq!(
        statements_json(&graph, queue),
        json!([{
            "Effect": "Allow",
            "Principal": {"Service": "s3.amazonaws.com"},
            "Action": ["sqs:SendMessage", "sqs:GetQueueAttributes", "sqs:GetQueueUrl"],
            "Resource": QUEUE_ARN,
            "Condition": {"ArnLike": {"aws:SourceArn": BUCKET_ARN}}
        }])
    );

    let record = &graph.notifications()[0];
    assert_eq!(record.event(), EventType::ObjectCreated);
    assert_eq!(record.destination(), DestinationKind::Queue);
    assert_eq!(
        record.filters(),
        &[FilterRule {
            name: "prefix",
            value: "images/".to_string()
        }]
    );
    assert!(graph.policy_document(bucket).unwrap().is_none());
}

#[test]
fn test_function_destination() {
    let (mut graph, stack, bucket) = bucket_graph();
    let function = graph.add_function(stack, "handler").unwrap();

    graph
        .add_event_notification(
            bucket,
            EventType::ObjectRemoved,
            Binder::function(function).unwrap(),
            &[],
        )
        .unwrap();

    assert_eq!(
        statements_json(&graph, function),
        json!([{
            "Sid": "AllowBucketNotificationsToAppUploads",
            "Effect": "Allow",
            "Principal": {"Service": "s3.amazonaws.com"},
            "Action": "lambda:InvokeFunction",
            "Resource": FUNCTION_ARN,
            "Condition": {
                "ArnLike": {"aws:SourceArn": BUCKET_ARN},
                "StringEquals": {"aws:SourceAccount": ACCOUNT}
            }
        }])
    );
}

#[test]
fn test_topic_destination() {
    let (mut graph, stack, bucket) = bucket_graph();
    let topic = graph.add_topic(stack, "orders").unwrap();

    let binding = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreatedPut,
            Binder::topic(topic).unwrap(),
            &[NotificationKeyFilter::suffix(".jpg")],
        )
        .unwrap();
    assert_eq!(binding.destination(), Some(DestinationKind::Topic));
    assert_eq!(
        statements_json(&graph, topic),
        json!([{
            "Effect": "Allow",
            "Principal": {"Service": "s3.amazonaws.com"},
            "Action": "sns:Publish",
            "Resource": TOPIC_ARN,
            "Condition": {"ArnLike": {"aws:SourceArn": BUCKET_ARN}}
        }])
    );
}

#[test]
fn test_encrypted_queue_destination_grants_key_usage() {
    let (mut graph, stack, bucket) = bucket_graph();
    let key = graph.add_key(stack, "cmk").unwrap();
    let queue = graph.add_encrypted_queue(stack, "jobs", key).unwrap();

    let binding = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[],
        )
        .unwrap();
    assert_eq!(binding.dependencies, vec![queue, key]);
    assert_eq!(
        statements_json(&graph, key),
        json!([{
            "Effect": "Allow",
            "Principal": {"Service": "s3.amazonaws.com"},
            "Action": ["kms:GenerateDataKey*", "kms:Decrypt"],
            "Resource": "*"
        }])
    );
}

#[test]
fn test_destination_is_bound_once_per_bucket() {
    let (mut graph, stack, bucket) = bucket_graph();
    let queue = graph.add_queue(stack, "jobs").unwrap();

    let created = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[],
        )
        .unwrap();
    let removed = graph
        .add_event_notification(
            bucket,
            EventType::ObjectRemoved,
            Binder::queue(queue).unwrap(),
            &[],
        )
        .unwrap();

    assert!(Rc::ptr_eq(&created, &removed));
    assert_eq!(graph.notifications().len(), 2);
    assert_eq!(graph.policy_document(queue).unwrap().unwrap().len(), 1);
}

#[test]
fn test_identical_notifications_are_deduplicated() {
    let (mut graph, stack, bucket) = bucket_graph();
    let queue = graph.add_queue(stack, "jobs").unwrap();

    for _ in 0..3 {
        graph
            .add_event_notification(
                bucket,
                EventType::ObjectCreated,
                Binder::queue(queue).unwrap(),
                &[NotificationKeyFilter::prefix("a/")],
            )
            .unwrap();
    }
    graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[NotificationKeyFilter::prefix("b/")],
        )
        .unwrap();

    assert_eq!(graph.notifications().len(), 2);
}

#[test]
fn test_invalid_key_filters_fail_before_binding() {
    let (mut graph, stack, bucket) = bucket_graph();
    let queue = graph.add_queue(stack, "jobs").unwrap();

    let err = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[
                NotificationKeyFilter::prefix("a/"),
                NotificationKeyFilter::prefix("b/"),
            ],
        )
        .unwrap_err();
    assert!(err.is_construction());

    let err = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[NotificationKeyFilter::default()],
        )
        .unwrap_err();
    assert!(err.is_construction());

    assert!(graph.binding_cache().is_empty());
    assert!(graph.policy_document(queue).unwrap().is_none());
}

#[test]
fn test_subscription_options_do_not_apply_to_buckets() {
    let (mut graph, stack, bucket) = bucket_graph();
    let queue = graph.add_queue(stack, "jobs").unwrap();

    let options = SubscriptionOptions::default().raw_message_delivery(true);
    let err = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::queue_with(queue, options).unwrap(),
            &[],
        )
        .unwrap_err();
    assert!(err.is_construction());
    assert!(graph.policy_document(queue).unwrap().is_none());
}

#[test]
fn test_endpoints_are_not_bucket_destinations() {
    let (mut graph, _, bucket) = bucket_graph();
    let err = graph
        .add_event_notification(
            bucket,
            EventType::ObjectCreated,
            Binder::url("https://example.com", SubscriptionOptions::default()).unwrap(),
            &[],
        )
        .unwrap_err();
    assert!(err.is_construction());
}

#[test]
fn test_notification_target_must_be_a_bucket() {
    let (mut graph, stack, _) = bucket_graph();
    let topic = graph.add_topic(stack, "orders").unwrap();
    let queue = graph.add_queue(stack, "jobs").unwrap();

    let err = graph
        .add_event_notification(
            topic,
            EventType::ObjectCreated,
            Binder::queue(queue).unwrap(),
            &[],
        )
        .unwrap_err();
    assert!(err.is_construction());
}
