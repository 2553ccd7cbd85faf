use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use core_dataapi::StatementState;
use tokio_util::sync::CancellationToken;

use super::fake::{STATEMENT_ID, ScriptedDataApi};
use crate::backoff::BackoffPolicy;
use crate::error::DriverError;
use crate::models::{Interruption, QueryContext};
use crate::poller::StatusPoller;

fn fast_policy() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(1), 2)
}

#[tokio::test(start_paused = true)]
async fn test_wait_call_count_matches_attempts() {
    for polls in [1, 10] {
        let service = Arc::new(ScriptedDataApi::finishing_after(polls));
        let poller = StatusPoller::new(service.clone(), fast_policy());
        poller
            .wait(&QueryContext::new(), STATEMENT_ID)
            .await
            .unwrap_or_else(|err| panic!("wait failed: {err}"));
        assert_eq!(service.describes(), polls);
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_failure_carries_remote_reason() {
    for polls in [1, 10] {
        let service = Arc::new(ScriptedDataApi::failing_after(polls, "X"));
        let poller = StatusPoller::new(service.clone(), fast_policy());
        let Err(err) = poller.wait(&QueryContext::new(), STATEMENT_ID).await else {
            panic!("statement failure expected");
        };
        assert_eq!(err.to_string(), "X");
        assert!(matches!(
            err,
            DriverError::StatementFailed {
                state: StatementState::Failed,
                ..
            }
        ));
        assert_eq!(service.describes(), polls);
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_aborted_is_failure() {
    let service = Arc::new(ScriptedDataApi::terminating_after(
        2,
        StatementState::Aborted,
        Some("aborted by user".to_string()),
    ));
    let poller = StatusPoller::new(service, fast_policy());
    let err = poller
        .wait(&QueryContext::new(), STATEMENT_ID)
        .await
        .err();
    assert!(matches!(
        err,
        Some(DriverError::StatementFailed {
            state: StatementState::Aborted,
            ref reason,
            ..
        }) if reason.as_str() == "aborted by user"
    ));
}

#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn test_wait_backoff_doubles_until_ceiling() {
    let service = Arc::new(ScriptedDataApi::finishing_after(6));
    let policy = BackoffPolicy::new(Duration::from_millis(200), Duration::from_millis(1000), 2);
    let poller = StatusPoller::new(service.clone(), policy);
    poller
        .wait(&QueryContext::new(), STATEMENT_ID)
        .await
        .unwrap();

    let times = service.describe_times.lock().unwrap().clone();
    let gaps: Vec<u128> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).as_millis())
        .collect();
    let expected = [200, 400, 800, 1000, 1000];
    assert_eq!(gaps.len(), expected.len());
    for (gap, want) in gaps.into_iter().zip(expected) {
        assert!((want..=want + 1).contains(&gap), "gap {gap}ms, expected {want}ms");
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_interrupted_by_cancellation() {
    let service = Arc::new(ScriptedDataApi::finishing_after(100));
    let poller = StatusPoller::new(service.clone(), BackoffPolicy::default());
    let token = CancellationToken::new();
    let ctx = QueryContext::new().with_cancellation_token(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
    });
    let err = poller.wait(&ctx, STATEMENT_ID).await.err();
    assert!(matches!(
        err,
        Some(DriverError::Interrupted {
            cause: Interruption::Cancelled
        })
    ));
    assert!(canceller.await.is_ok());
    // polls at 0ms and 200ms, cancelled during the 400ms wait
    assert_eq!(service.describes(), 2);
    assert_eq!(service.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_interrupted_by_deadline() {
    let service = Arc::new(ScriptedDataApi::finishing_after(100));
    let poller = StatusPoller::new(service.clone(), BackoffPolicy::default());
    let ctx = QueryContext::new().with_timeout(Duration::from_secs(1));
    let err = poller.wait(&ctx, STATEMENT_ID).await.err();
    assert!(err.as_ref().is_some_and(DriverError::is_interrupted));
    insta::assert_snapshot!(err.map(|e| e.to_string()).unwrap_or_default(), @"Query interrupted: deadline exceeded");
    assert_eq!(service.cancel_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_status_transport_error_is_distinct() {
    let mut service = super::MockDataApi::new();
    service
        .expect_describe_statement()
        .times(1)
        .returning(|_| Err(super::fake::remote_error("DescribeStatement", "access denied")));
    let poller = StatusPoller::new(Arc::new(service), fast_policy());
    let err = poller.wait(&QueryContext::new(), STATEMENT_ID).await.err();
    assert!(matches!(err, Some(DriverError::PollTransport { .. })));
    insta::assert_snapshot!(err.map(|e| e.to_string()).unwrap_or_default(), @"Unable to get status of statement statement-1: DescribeStatement failed: access denied");
}
