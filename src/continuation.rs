//! Continuation Prompter (C8): synchronous request-reply over the
//! Event Sink, correlated by generated ids. Modeled as a
//! `tokio::sync::oneshot` channel registered in a process-wide pending
//! map, mirroring how the former provider task raced a cancellation
//! flag against stream progress -- here the race is the decision
//! channel against the parent call deadline.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use once_cell::sync::Lazy;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::event_sink::EventSink;
use crate::model::{ContinuationDecision, ContinuationReason, ContinuationRequest, ContinuationResolved};

type PendingMap = Mutex<HashMap<String, oneshot::Sender<ContinuationDecision>>>;

static PENDING: Lazy<PendingMap> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Issue a continuation request and block (up to `deadline`) for the
/// matching `ResolveContinuation` call. Exactly one outstanding request
/// per session is expected by the loop's own sequencing (SPEC_FULL
/// §4.8); this prompter does not itself enforce that invariant.
pub async fn request(
    sink: &dyn EventSink,
    session_id: &str,
    reason: ContinuationReason,
    iteration: Option<u32>,
    limit: Option<u32>,
    failure_count: Option<u32>,
    failure_limit: Option<u32>,
    tool_name: Option<String>,
    detail: Option<String>,
    deadline: Duration,
) -> Result<ContinuationDecision, String> {
    let request_id = Uuid::new_v4().to_string();
    let (tx, rx) = oneshot::channel();
    PENDING.lock().unwrap_or_else(|e| e.into_inner()).insert(request_id.clone(), tx);

    let payload = ContinuationRequest {
        session_id: session_id.to_string(),
        request_id: request_id.clone(),
        reason,
        iteration,
        limit,
        failure_count,
        failure_limit,
        tool_name,
        detail,
    };
    sink.continuation_request(&payload);

    let decision = tokio::select! {
        result = rx => result.map_err(|_| "continuation request cancelled".to_string())?,
        _ = tokio::time::sleep(deadline) => {
            PENDING.lock().unwrap_or_else(|e| e.into_inner()).remove(&request_id);
            return Err("continuation request timed out waiting for a decision".to_string());
        }
    };

    let resolved = ContinuationResolved {
        session_id: session_id.to_string(),
        request_id,
        reason: Some(reason),
        decision,
    };
    sink.continuation_resolved(&resolved);

    Ok(decision)
}

/// Resolve a pending continuation request -- called from the
/// `ResolveContinuation` Host Bridge command. Returns an error if no
/// request with that id is outstanding (already resolved, or unknown).
pub fn resolve(request_id: &str, decision: ContinuationDecision) -> Result<(), String> {
    let sender = PENDING
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(request_id)
        .ok_or_else(|| "no pending continuation request with that id".to_string())?;
    sender
        .send(decision)
        .map_err(|_| "continuation request receiver already dropped".to_string())
}

/// Injection point for the Dialogue Loop (C7): decouples the loop from
/// the blocking `request` prompt-reply so callers (and tests) can supply
/// an alternative policy without the loop knowing which one is in play.
#[allow(clippy::too_many_arguments)]
pub trait Prompter: Send + Sync {
    fn prompt<'a>(
        &'a self,
        sink: &'a dyn EventSink,
        session_id: &'a str,
        reason: ContinuationReason,
        iteration: Option<u32>,
        limit: Option<u32>,
        failure_count: Option<u32>,
        failure_limit: Option<u32>,
        tool_name: Option<String>,
        detail: Option<String>,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ContinuationDecision, String>> + Send + 'a>>;
}

/// Production prompter: blocks on a real `ResolveContinuation` round trip.
pub struct InteractivePrompter;

impl Prompter for InteractivePrompter {
    #[allow(clippy::too_many_arguments)]
    fn prompt<'a>(
        &'a self,
        sink: &'a dyn EventSink,
        session_id: &'a str,
        reason: ContinuationReason,
        iteration: Option<u32>,
        limit: Option<u32>,
        failure_count: Option<u32>,
        failure_limit: Option<u32>,
        tool_name: Option<String>,
        detail: Option<String>,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ContinuationDecision, String>> + Send + 'a>> {
        Box::pin(request(
            sink,
            session_id,
            reason,
            iteration,
            limit,
            failure_count,
            failure_limit,
            tool_name,
            detail,
            deadline,
        ))
    }
}

/// Test-default prompter (SPEC_FULL §4.8): always continues, via
/// `auto_continue`, with no blocking round trip.
pub struct AutoContinuePrompter;

impl Prompter for AutoContinuePrompter {
    #[allow(clippy::too_many_arguments)]
    fn prompt<'a>(
        &'a self,
        sink: &'a dyn EventSink,
        session_id: &'a str,
        reason: ContinuationReason,
        _iteration: Option<u32>,
        _limit: Option<u32>,
        _failure_count: Option<u32>,
        _failure_limit: Option<u32>,
        _tool_name: Option<String>,
        _detail: Option<String>,
        _deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ContinuationDecision, String>> + Send + 'a>> {
        Box::pin(async move { Ok(auto_continue(sink, session_id, reason).await) })
    }
}

/// Test/default prompter: immediately returns `continue` without
/// touching the pending map or emitting events.
pub async fn auto_continue(sink: &dyn EventSink, session_id: &str, reason: ContinuationReason) -> ContinuationDecision {
    let request_id = Uuid::new_v4().to_string();
    sink.continuation_request(&ContinuationRequest {
        session_id: session_id.to_string(),
        request_id: request_id.clone(),
        reason,
        iteration: None,
        limit: None,
        failure_count: None,
        failure_limit: None,
        tool_name: None,
        detail: None,
    });
    sink.continuation_resolved(&ContinuationResolved {
        session_id: session_id.to_string(),
        request_id,
        reason: Some(reason),
        decision: ContinuationDecision::Continue,
    });
    ContinuationDecision::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::NullEventSink;

    #[tokio::test]
    async fn resolve_before_deadline_returns_the_decision() {
        let sink = NullEventSink;
        let session_id = "s1".to_string();
        let handle = tokio::spawn(async move {
            request(
                &sink,
                &session_id,
                ContinuationReason::IterationLimit,
                Some(30),
                Some(30),
                None,
                None,
                None,
                None,
                Duration::from_secs(5),
            )
            .await
        });

        // Give the request task a moment to register, then resolve it.
        // Poll the pending map instead of sleeping an arbitrary amount.
        let request_id = loop {
            let guard = PENDING.lock().unwrap();
            if let Some(id) = guard.keys().next().cloned() {
                break id;
            }
            drop(guard);
            tokio::task::yield_now().await;
        };

        resolve(&request_id, ContinuationDecision::Continue).unwrap();
        let decision = handle.await.unwrap().unwrap();
        assert_eq!(decision, ContinuationDecision::Continue);
    }

    #[tokio::test]
    async fn resolve_unknown_id_errors() {
        assert!(resolve("not-a-real-id", ContinuationDecision::Cancel).is_err());
    }

    #[tokio::test]
    async fn deadline_elapses_without_a_decision() {
        let sink = NullEventSink;
        let result = request(
            &sink,
            "s1",
            ContinuationReason::ToolFailures,
            None,
            None,
            Some(5),
            Some(5),
            Some("shell".to_string()),
            Some("boom".to_string()),
            Duration::from_millis(20),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn auto_continue_always_returns_continue() {
        let sink = NullEventSink;
        let decision = auto_continue(&sink, "s1", ContinuationReason::IterationLimit).await;
        assert_eq!(decision, ContinuationDecision::Continue);
    }

    #[tokio::test]
    async fn auto_continue_prompter_dispatches_through_the_trait_object() {
        let sink = NullEventSink;
        let prompter: &dyn Prompter = &AutoContinuePrompter;
        let decision = prompter
            .prompt(
                &sink,
                "s1",
                ContinuationReason::ToolFailures,
                None,
                None,
                Some(5),
                Some(5),
                Some("shell".to_string()),
                Some("boom".to_string()),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(decision, ContinuationDecision::Continue);
    }

    #[tokio::test]
    async fn interactive_prompter_dispatches_to_the_blocking_request() {
        let sink = NullEventSink;
        let prompter: &dyn Prompter = &InteractivePrompter;
        let result = prompter
            .prompt(
                &sink,
                "s1",
                ContinuationReason::IterationLimit,
                Some(30),
                Some(30),
                None,
                None,
                None,
                None,
                Duration::from_millis(20),
            )
            .await;
        assert!(result.is_err());
    }
}
