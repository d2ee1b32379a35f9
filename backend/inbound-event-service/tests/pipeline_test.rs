/// Pipeline tests over in-memory collaborators
mod common;

use common::{CountingHook, GatewayBehavior, Harness, ScriptedGateway};
use inbound_event_service::consumers::{DeliveryHandler, DeliveryOutcome};
use inbound_event_service::domain::{InboundDelivery, InboundEvent};
use inbound_event_service::error::ProcessingError;
use resilience::{RetryConfig, RetryExecutor};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

fn delivery(event_id: &str, key: &str, data: &str) -> InboundDelivery {
    InboundDelivery {
        event_id: event_id.to_string(),
        key: key.to_string(),
        event: InboundEvent::new(data),
    }
}

// ==================== Idempotence ====================

#[tokio::test]
async fn test_sequential_duplicates_have_single_effect() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Succeed));
    let event = InboundEvent::new("hello");

    let first = harness.processor.process("E1", "K1", &event).await;
    let second = harness.processor.process("E1", "K1", &event).await;
    let third = harness.processor.process("E1", "K1", &event).await;

    assert!(first.is_ok());
    assert!(second.unwrap_err().is_duplicate());
    assert!(third.unwrap_err().is_duplicate());

    assert_eq!(harness.gateway.call_count(), 1);
    assert_eq!(harness.publisher.messages().len(), 1);
    assert_eq!(harness.store.inserted.load(Ordering::SeqCst), 1);
    assert_eq!(harness.store.len(), 1);
}

#[tokio::test]
async fn test_hello_scenario() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Succeed));
    let event = InboundEvent::new("hello");

    harness.processor.process("E1", "K1", &event).await.unwrap();

    assert_eq!(
        harness.publisher.messages(),
        vec![("K1".to_string(), "hello".to_string())]
    );
    assert_eq!(*harness.gateway.keys.lock().unwrap(), vec!["K1".to_string()]);
    assert!(harness.store.contains("E1"));

    let again = harness.processor.process("E1", "K1", &event).await;

    assert!(matches!(again, Err(ProcessingError::Duplicate { ref event_id }) if event_id == "E1"));
    assert_eq!(harness.publisher.messages().len(), 1, "No additional outbound message");
}

#[tokio::test]
async fn test_distinct_events_are_each_processed() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Succeed));

    for (id, key) in [("E1", "K1"), ("E2", "K1"), ("E3", "K2")] {
        harness
            .processor
            .process(id, key, &InboundEvent::new("payload"))
            .await
            .unwrap();
    }

    assert_eq!(harness.gateway.call_count(), 3);
    assert_eq!(harness.publisher.messages().len(), 3);
    assert_eq!(harness.store.len(), 3);
}

// ==================== Race Window ====================

#[tokio::test]
async fn test_concurrent_deliveries_both_publish_one_records() {
    let barrier = Arc::new(Barrier::new(2));
    let harness = Harness::new(
        ScriptedGateway::new(GatewayBehavior::Succeed).blocking_on(barrier.clone()),
    );
    let event = InboundEvent::new("hello");

    // Both pass the lookup before either is released from the downstream call
    let (a, b) = tokio::join!(
        harness.processor.process("E1", "K1", &event),
        harness.processor.process("E1", "K1", &event),
    );

    assert_eq!(harness.store.exists_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.gateway.call_count(), 2);
    assert_eq!(harness.publisher.messages().len(), 2, "Both deliveries publish");

    assert_eq!(harness.store.inserted.load(Ordering::SeqCst), 1);
    assert_eq!(harness.store.conflicts.load(Ordering::SeqCst), 1);

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_duplicate()))
            .count(),
        1
    );
}

// ==================== Failure Paths ====================

#[tokio::test]
async fn test_fatal_downstream_leaves_no_record() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Fatal));

    let err = harness
        .processor
        .process("E1", "K1", &InboundEvent::new("hello"))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(harness.publisher.messages().is_empty());
    assert!(!harness.store.contains("E1"));
}

#[tokio::test]
async fn test_retryable_downstream_leaves_no_record() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Retryable));

    let err = harness
        .processor
        .process("E1", "K1", &InboundEvent::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProcessingError::Retryable(_)));
    assert!(harness.publisher.messages().is_empty());
    assert_eq!(harness.store.len(), 0);
}

// ==================== Retry Bound ====================

#[tokio::test(start_paused = true)]
async fn test_always_retryable_is_invoked_five_times() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Retryable));
    let hook = CountingHook::default();
    let retry = RetryExecutor::new(
        RetryConfig::fixed(5, Duration::from_millis(6000)),
        hook.clone(),
    );
    let handler = DeliveryHandler::new(harness.processor.clone(), retry);

    let outcome = handler.handle(&delivery("E1", "K1", "hello")).await;

    assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 5 });
    assert_eq!(harness.gateway.call_count(), 5, "No 6th invocation");
    assert_eq!(harness.store.exists_calls.load(Ordering::SeqCst), 5);
    assert_eq!(hook.fired.load(Ordering::SeqCst), 1);
    assert!(hook
        .last_error
        .lock()
        .unwrap()
        .as_deref()
        .is_some_and(|e| e.contains("503")));
    assert!(harness.publisher.messages().is_empty());
}

#[tokio::test]
async fn test_handler_outcomes() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Succeed));
    let hook = CountingHook::default();
    let retry = RetryExecutor::new(RetryConfig::fixed(5, Duration::from_millis(1)), hook.clone());
    let handler = DeliveryHandler::new(harness.processor.clone(), retry);

    assert_eq!(
        handler.handle(&delivery("E1", "K1", "hello")).await,
        DeliveryOutcome::Processed
    );
    assert_eq!(
        handler.handle(&delivery("E1", "K1", "hello")).await,
        DeliveryOutcome::Duplicate
    );
    assert_eq!(hook.fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_drops_fatal_without_retry() {
    let harness = Harness::new(ScriptedGateway::new(GatewayBehavior::Fatal));
    let hook = CountingHook::default();
    let retry = RetryExecutor::new(RetryConfig::fixed(5, Duration::from_millis(1)), hook.clone());
    let handler = DeliveryHandler::new(harness.processor.clone(), retry);

    let outcome = handler.handle(&delivery("E1", "K1", "hello")).await;

    assert_eq!(outcome, DeliveryOutcome::Dropped);
    assert_eq!(harness.gateway.call_count(), 1);
    assert_eq!(hook.fired.load(Ordering::SeqCst), 0);
}
