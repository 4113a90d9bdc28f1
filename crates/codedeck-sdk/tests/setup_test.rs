// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Optimistic session setup: pending token, navigation, delayed provisioning.

mod common;

use std::sync::Arc;
use std::time::Duration;

use codedeck_sdk::storage::{CONTAINER_TOKEN_KEY, load_token};
use codedeck_sdk::{
    ClientStorage, MemoryStorage, NotificationLevel, SessionToken, SetupOrchestrator,
    SetupOutcome, SetupRequest,
};
use common::{
    EventLog, RecordingNavigator, RecordingNotifier, ScriptedBackend, SetupReply, settle,
};

struct Fixture {
    log: EventLog,
    backend: Arc<ScriptedBackend>,
    storage: Arc<MemoryStorage>,
    navigator: Arc<RecordingNavigator>,
    notifier: Arc<RecordingNotifier>,
    orchestrator: SetupOrchestrator,
}

impl Fixture {
    fn new() -> Self {
        let log = EventLog::default();
        let backend = ScriptedBackend::with_log(log.clone());
        let storage = Arc::new(MemoryStorage::new());
        let navigator = RecordingNavigator::new(log.clone());
        let notifier = RecordingNotifier::new();
        let orchestrator = SetupOrchestrator::new(
            backend.clone(),
            storage.clone(),
            navigator.clone(),
            notifier.clone(),
        );

        Self {
            log,
            backend,
            storage,
            navigator,
            notifier,
            orchestrator,
        }
    }
}

fn request() -> SetupRequest {
    SetupRequest::new("two-sum").with_question_id("q-17")
}

#[tokio::test(start_paused = true)]
async fn test_navigation_precedes_provisioning() {
    let f = Fixture::new();

    let handle = f.orchestrator.setup_codebase(request()).unwrap();
    let pending = handle.pending_token().clone();

    // navigation is synchronous; provisioning has not started
    assert_eq!(f.log.entries(), vec![format!("navigate:{}", pending)]);
    settle().await;
    assert!(f.backend.setup_requests().is_empty());

    handle.outcome().await.unwrap();
    assert_eq!(
        f.log.entries(),
        vec![format!("navigate:{}", pending), "setup:q-17".to_string()]
    );

    let destination = f.navigator.destinations.lock().unwrap()[0].clone();
    assert_eq!(destination.problem_id, "two-sum");
    assert_eq!(destination.question_id.as_deref(), Some("q-17"));
    assert_eq!(destination.token, pending);
}

#[tokio::test(start_paused = true)]
async fn test_pending_token_is_stored_before_provisioning() {
    let f = Fixture::new();

    let handle = f.orchestrator.setup_codebase(request()).unwrap();

    assert!(handle.pending_token().is_pending());
    assert_eq!(
        load_token(f.storage.as_ref()).unwrap().as_ref(),
        Some(handle.pending_token())
    );
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_token_replaces_pending() {
    let f = Fixture::new();
    let tokens = f.orchestrator.tokens();

    let handle = f.orchestrator.setup_codebase(request()).unwrap();
    let outcome = handle.outcome().await.unwrap();

    let confirmed = SessionToken::Confirmed("real-token".to_string());
    assert_eq!(
        outcome,
        SetupOutcome::Provisioned {
            token: confirmed.clone(),
            container_url: Some("https://containers.test/c1".to_string()),
        }
    );
    assert_eq!(
        f.storage.get(CONTAINER_TOKEN_KEY).unwrap().as_deref(),
        Some("real-token")
    );
    assert_eq!(tokens.borrow().as_ref(), Some(&confirmed));

    let sent = f.backend.setup_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].question_id, "q-17");
    assert_eq!(sent[0].language, "c");
}

#[tokio::test(start_paused = true)]
async fn test_response_without_token_keeps_pending() {
    let f = Fixture::new();
    f.backend.set_setup_reply(SetupReply::NoToken);

    let handle = f.orchestrator.setup_codebase(request()).unwrap();
    let pending = handle.pending_token().clone();
    let outcome = handle.outcome().await.unwrap();

    assert_eq!(
        outcome,
        SetupOutcome::Unconfirmed {
            container_url: None
        }
    );
    assert_eq!(load_token(f.storage.as_ref()).unwrap(), Some(pending));
    assert!(f.notifier.all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_question_id_notifies_without_calling_backend() {
    let f = Fixture::new();

    let handle = f
        .orchestrator
        .setup_codebase(SetupRequest::new("two-sum"))
        .unwrap();
    let pending = handle.pending_token().clone();
    let outcome = handle.outcome().await.unwrap();

    assert!(matches!(outcome, SetupOutcome::Failed(_)));
    assert!(f.backend.setup_requests().is_empty());

    let notifications = f.notifier.all();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);
    assert!(notifications[0].dismissible);

    // no rollback: navigation happened and the pending token stays
    assert_eq!(f.navigator.destinations.lock().unwrap().len(), 1);
    assert_eq!(load_token(f.storage.as_ref()).unwrap(), Some(pending));
}

#[tokio::test(start_paused = true)]
async fn test_backend_failure_becomes_notification() {
    let f = Fixture::new();
    f.backend.set_setup_reply(SetupReply::Fail(503));

    let handle = f.orchestrator.setup_codebase(request()).unwrap();
    let outcome = handle.outcome().await.unwrap();

    match outcome {
        SetupOutcome::Failed(reason) => assert!(reason.contains("503")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(f.notifier.all().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_setups_are_not_deduplicated() {
    let f = Fixture::new();

    let first = f.orchestrator.setup_codebase(request()).unwrap();
    let second = f.orchestrator.setup_codebase(request()).unwrap();
    assert_ne!(first.pending_token(), second.pending_token());

    first.outcome().await.unwrap();
    second.outcome().await.unwrap();

    assert_eq!(f.backend.setup_requests().len(), 2);
    assert_eq!(f.navigator.destinations.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_provision_delay_is_honoured() {
    let log = EventLog::default();
    let backend = ScriptedBackend::with_log(log.clone());
    let orchestrator = SetupOrchestrator::new(
        backend.clone(),
        Arc::new(MemoryStorage::new()),
        RecordingNavigator::new(log),
        RecordingNotifier::new(),
    )
    .with_provision_delay(Duration::from_secs(2));

    let _handle = orchestrator.setup_codebase(request()).unwrap();

    tokio::time::sleep(Duration::from_millis(1900)).await;
    settle().await;
    assert!(backend.setup_requests().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(backend.setup_requests().len(), 1);
}

#[test]
fn test_setup_outside_runtime_fails() {
    let f = Fixture::new();
    assert!(f.orchestrator.setup_codebase(request()).is_err());
    assert!(f.navigator.destinations.lock().unwrap().is_empty());
}
