//! V. Whole-call scenarios.
//!
//! Rules covered:
//! - 28. Attached foreground: direct delivery, no dispatch, one notification
//! - 29. Detached foreground: dispatch within 500 ms carrying the number
//! - 30. Detached foreground with a slow-starting consumer still delivers
//! - 31. The telephony listener only relays while attached
//! - 32. Blocked calls reach the consumer with their decision, whichever
//!   of listener and screening hook reports the call first

use super::harness::{eventually, MockRuntime, PipelineBuilder, ScriptedClassifier, StaticCallLog};
use crate::call_log::CallKind;
use crate::call::{CallDetails, CallState, TelephonySignal};
use crate::decision::ScreeningDecision;
use crate::dispatcher::DispatchOutcome;
use std::time::{Duration, Instant};

const NUMBER: &str = "+15551234567";

fn incoming() -> CallDetails {
    CallDetails::from_handle(format!("tel:{NUMBER}"))
}

/// Rule 28: Attached foreground: direct delivery, no dispatch, one notification
#[tokio::test]
async fn rule_28_attached_call_delivered_directly() {
    let p = PipelineBuilder::new().attached().start();

    p.warden.on_signal(&TelephonySignal::ringing(Some(NUMBER)));
    let decision = p.warden.on_screen_call(&incoming()).await;
    assert_eq!(decision, ScreeningDecision::allow());

    assert!(eventually(Duration::from_millis(500), || p.foreground.count() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(p.foreground.count(), 1);
    assert_eq!(p.runtime.attempts(), 0);
    assert!(p.sink.reports().is_empty());

    let shown = p.notifier.shown();
    assert_eq!(shown.len(), 1);
    assert!(shown[0].body.contains(NUMBER), "body: {}", shown[0].body);

    let updates = p.foreground.decision_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].decision, Some(decision));

    p.warden.shutdown().await;
}

/// Rule 29: Detached foreground: dispatch within 500 ms carrying the number
#[tokio::test]
async fn rule_29_detached_call_dispatched() {
    let p = PipelineBuilder::new().start();

    let started = Instant::now();
    let outcome = p.warden.screen_call(&incoming()).await;

    assert!(eventually(Duration::from_millis(500), || p.runtime.attempts() >= 1).await);
    let revivals = p.runtime.revivals();
    let first = &revivals[0];
    assert!(first.at.duration_since(started) < Duration::from_millis(500));

    let reports = p.sink.wait_for(1, Duration::from_secs(1)).await;
    assert_eq!(reports[0].outcome, DispatchOutcome::Delivered);
    assert_eq!(reports[0].call_id, outcome.event.call_id());

    assert_eq!(
        first.payload.phone_number.as_deref(),
        outcome.event.phone_number().as_str()
    );
    assert_eq!(first.payload.phone_number.as_deref(), Some(NUMBER));
    assert_eq!(first.payload.decision, Some(outcome.decision));
    assert_eq!(p.foreground.count(), 0);
    assert!(p.notifier.shown().is_empty());
}

/// Rule 29: A withheld number is filled in from the call log for the payload
#[tokio::test]
async fn rule_29_withheld_number_resolved_for_dispatch() {
    let p = PipelineBuilder::new()
        .call_log(StaticCallLog::new(vec![
            StaticCallLog::entry("+15550000009", CallKind::Missed, 300),
            StaticCallLog::entry(NUMBER, CallKind::Incoming, 200),
        ]))
        .start();

    let outcome = p.warden.screen_call(&CallDetails { handle: None }).await;
    assert!(!outcome.event.phone_number().is_known());

    let reports = p.sink.wait_for(1, Duration::from_secs(1)).await;
    assert_eq!(reports[0].outcome, DispatchOutcome::Delivered);
    let revivals = p.runtime.revivals();
    assert_eq!(revivals[0].payload.phone_number.as_deref(), Some(NUMBER));
}

/// Rule 30: Detached foreground with a slow-starting consumer still delivers
#[tokio::test]
async fn rule_30_revival_retried_until_delivered() {
    let p = PipelineBuilder::new()
        .runtime(MockRuntime::failing_then_delivering(2))
        .start();

    p.warden.on_screen_call(&incoming()).await;

    let reports = p.sink.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, DispatchOutcome::Delivered);
    assert_eq!(reports[0].attempts, 3);
    assert_eq!(p.runtime.attempts(), 3);
}

/// Rule 31: The telephony listener only relays while attached
#[tokio::test]
async fn rule_31_listener_scoped_to_foreground() {
    let p = PipelineBuilder::new().start();

    // Detached: the listener still tracks state but leaves relaying to screening.
    let event = p
        .warden
        .on_signal(&TelephonySignal::ringing(Some(NUMBER)))
        .unwrap();
    assert_eq!(event.state(), CallState::Ringing);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(p.runtime.attempts(), 0);

    p.warden.on_signal(&TelephonySignal::idle());

    // Attached: the next call is delivered from the listener alone.
    p.warden.lifecycle().on_resume(p.foreground.clone());
    assert_eq!(p.notifier.channels().len(), 1);
    p.warden.on_signal(&TelephonySignal::ringing(Some("+15557654321")));
    assert!(eventually(Duration::from_millis(500), || p.foreground.count() == 1).await);
    assert_eq!(p.foreground.deliveries()[0].message, "Incoming call from: +15557654321");
    p.warden.on_signal(&TelephonySignal::idle());

    // Paused again: nothing reaches the foreground.
    p.warden.lifecycle().on_pause();
    p.warden.lifecycle().on_destroy();
    p.warden.on_signal(&TelephonySignal::ringing(Some(NUMBER)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(p.foreground.count(), 1);
    assert_eq!(p.warden.call_state(), CallState::Ringing);
}

/// Rule 32: Blocked calls reach the consumer with their decision
#[tokio::test]
async fn rule_32_blocked_call_reported() {
    let p = PipelineBuilder::new()
        .attached()
        .classifier(ScriptedClassifier::answering(ScreeningDecision::block()))
        .start();

    let decision = p.warden.on_screen_call(&incoming()).await;
    assert!(decision.blocks());

    assert!(eventually(Duration::from_millis(500), || p.foreground.count() == 1).await);
    assert_eq!(
        p.foreground.deliveries()[0].decision,
        Some(ScreeningDecision::block())
    );

    // The platform rejects the call; it never goes off-hook.
    p.warden.on_signal(&TelephonySignal::idle());
    assert_eq!(p.warden.call_state(), CallState::Idle);
    p.warden.shutdown().await;
}

/// Rule 32: A call blocked after the listener reported it still reaches the
/// consumer with its decision
#[tokio::test]
async fn rule_32_listener_first_blocked_call_reported() {
    let p = PipelineBuilder::new()
        .attached()
        .classifier(ScriptedClassifier::answering(ScreeningDecision::block()))
        .start();

    p.warden.on_signal(&TelephonySignal::ringing(Some(NUMBER)));
    let decision = p.warden.on_screen_call(&incoming()).await;
    assert!(decision.blocks());

    assert!(
        eventually(Duration::from_millis(500), || {
            p.foreground.decision_updates().len() == 1
        })
        .await
    );
    let deliveries = p.foreground.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].decision, None);
    assert_eq!(deliveries[1].decision, Some(ScreeningDecision::block()));
    assert_eq!(deliveries[0].call, deliveries[1].call);
    assert_eq!(p.notifier.shown().len(), 1);
    p.warden.shutdown().await;
}
