//! Pending-request registry: correlates outbound requests with their
//! eventual responses.
//!
//! Each registered request owns a one-shot completion channel, a timeout
//! task, and an optional progress-token binding. Exactly one terminal
//! transition fires per entry (complete, cancel, fail, or timeout) and the
//! timer is stopped on whichever one wins.
//!
//! Completed, cancelled, and failed entries linger as inert records (so
//! repeated transitions are no-ops and `state_of` can answer) until
//! `clear_stale` sweeps them; a timeout removes its entry outright so a
//! late response surfaces as `UnknownResponseId`. Stopping the session
//! drains everything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::{CorrelationError, McpError, McpResult, ProtocolError, TransportError};
use crate::messages::{JsonRpcResponse, ProgressToken, RequestId, RequestMethod};

/// Lifecycle state of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Awaiting a response
    Pending,
    /// Response arrived and decoded
    Completed,
    /// Cancelled before a response arrived
    Cancelled,
    /// Failed: server error, decode error, or timeout
    Failed,
}

/// Type-erased completion sink: decodes the JSON `result` into the
/// request's declared result type at completion time.
type Completer = Box<dyn FnOnce(McpResult<Value>) -> Result<(), ProtocolError> + Send>;

struct PendingEntry {
    method: RequestMethod,
    state: RequestState,
    completer: Option<Completer>,
    timer: Option<JoinHandle<()>>,
    progress_token: Option<ProgressToken>,
    /// Detail of the failure, kept for idempotent re-reports.
    failure: Option<String>,
}

impl PendingEntry {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RequestId, PendingEntry>,
    progress: HashMap<ProgressToken, RequestId>,
}

impl Inner {
    fn drop_progress_binding(&mut self, entry: &PendingEntry) {
        if let Some(token) = &entry.progress_token {
            self.progress.remove(token);
        }
    }
}

/// Registry of in-flight outbound requests.
///
/// The map is shared with the per-entry timer tasks, which only ever fire
/// the timeout transition.
#[derive(Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<Inner>>,
}

impl PendingRequests {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and receive the typed completion channel.
    ///
    /// The entry is created `Pending` with a timer that fires
    /// `Timeout{id, method}` after `timeout`, and must be registered
    /// *before* the frame is written so an immediate response cannot be
    /// lost.
    ///
    /// Id rules: an id already in flight is a [`DuplicateRequestId`]; id
    /// `1` is reserved for `initialize` and any other method using it is a
    /// [`ReusedRequestId`].
    ///
    /// [`DuplicateRequestId`]: CorrelationError::DuplicateRequestId
    /// [`ReusedRequestId`]: CorrelationError::ReusedRequestId
    pub async fn register<T>(
        &self,
        id: RequestId,
        method: RequestMethod,
        timeout: Option<Duration>,
    ) -> McpResult<oneshot::Receiver<McpResult<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if id.is_reserved() && method != RequestMethod::Initialize {
            return Err(CorrelationError::ReusedRequestId(id).into());
        }

        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.entries.get(&id) {
            if existing.state == RequestState::Pending {
                return Err(CorrelationError::DuplicateRequestId(id).into());
            }
            // stale terminal record; the id is no longer in flight
        }

        let (tx, rx) = oneshot::channel::<McpResult<T>>();
        let method_name = method.as_str();
        let completer: Completer = Box::new(move |outcome| match outcome {
            Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(typed) => {
                    let _ = tx.send(Ok(typed));
                    Ok(())
                }
                Err(e) => {
                    let err = ProtocolError::InvalidResponse {
                        detail: format!("result for {method_name} did not decode: {e}"),
                    };
                    let _ = tx.send(Err(err.clone().into()));
                    Err(err)
                }
            },
            Err(err) => {
                let _ = tx.send(Err(err));
                Ok(())
            }
        });

        let timer = timeout.map(|after| {
            let shared = Arc::clone(&self.inner);
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                fire_timeout(&shared, &id).await;
            })
        });

        inner.entries.insert(
            id,
            PendingEntry {
                method,
                state: RequestState::Pending,
                completer: Some(completer),
                timer,
                progress_token: None,
                failure: None,
            },
        );
        Ok(rx)
    }

    /// Bind a progress token to a pending request.
    ///
    /// Tokens are unique across active requests; a token already bound
    /// elsewhere is a [`CorrelationError::DuplicateProgressToken`].
    pub async fn register_progress(
        &self,
        token: ProgressToken,
        id: &RequestId,
    ) -> McpResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.progress.contains_key(&token) {
            return Err(CorrelationError::DuplicateProgressToken(token.to_string()).into());
        }
        let entry = inner
            .entries
            .get_mut(id)
            .filter(|e| e.state == RequestState::Pending)
            .ok_or_else(|| CorrelationError::UnknownRequestId(id.clone()))?;
        entry.progress_token = Some(token.clone());
        inner.progress.insert(token, id.clone());
        Ok(())
    }

    /// The request a progress token is bound to, if any.
    pub async fn progress_owner(&self, token: &ProgressToken) -> Option<RequestId> {
        self.inner.lock().await.progress.get(token).cloned()
    }

    /// Deliver a response to its pending request.
    ///
    /// Decodes the `result` into the declared result type; a decode
    /// failure transitions the entry to `Failed` and the waiter observes
    /// the decode error. Terminal entries make this a logged no-op; an id
    /// never registered is [`CorrelationError::UnknownResponseId`].
    pub async fn complete(&self, response: JsonRpcResponse) -> McpResult<()> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .get_mut(&response.id)
            .ok_or_else(|| CorrelationError::UnknownResponseId(response.id.clone()))?;

        match entry.state {
            RequestState::Pending => {}
            RequestState::Cancelled => {
                tracing::debug!(id = %response.id, "response for already-cancelled request");
                return Ok(());
            }
            RequestState::Completed => {
                tracing::debug!(id = %response.id, "duplicate response ignored");
                return Ok(());
            }
            RequestState::Failed => {
                tracing::debug!(
                    id = %response.id,
                    failure = entry.failure.as_deref().unwrap_or("unknown"),
                    "response for already-failed request"
                );
                return Ok(());
            }
        }

        entry.stop_timer();
        let completer = entry.completer.take().expect("pending entry has completer");
        match completer(Ok(response.result)) {
            Ok(()) => entry.state = RequestState::Completed,
            Err(decode_err) => {
                tracing::warn!(id = %response.id, error = %decode_err, "result decode failed");
                entry.state = RequestState::Failed;
                entry.failure = Some(decode_err.to_string());
            }
        }
        let entry = inner.entries.get(&response.id).expect("entry still present");
        let token_cleanup = entry.progress_token.clone();
        if let Some(token) = token_cleanup {
            inner.progress.remove(&token);
        }
        Ok(())
    }

    /// Cancel a pending request: the waiter observes
    /// [`CorrelationError::RequestCancelled`].
    ///
    /// Cancelling an already-cancelled request is a no-op; a completed or
    /// failed one is [`CorrelationError::CannotCancel`], as is the
    /// reserved `initialize` request.
    pub async fn cancel(&self, id: &RequestId) -> McpResult<()> {
        if id.is_reserved() {
            return Err(CorrelationError::CannotCancel {
                reason: "the initialize request cannot be cancelled".to_string(),
            }
            .into());
        }

        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| CorrelationError::UnknownRequestId(id.clone()))?;

        match entry.state {
            RequestState::Pending => {}
            RequestState::Cancelled => return Ok(()),
            RequestState::Completed => {
                return Err(CorrelationError::CannotCancel {
                    reason: format!("request {id} already completed"),
                }
                .into())
            }
            RequestState::Failed => {
                return Err(CorrelationError::CannotCancel {
                    reason: format!("request {id} already failed"),
                }
                .into())
            }
        }

        entry.stop_timer();
        let completer = entry.completer.take().expect("pending entry has completer");
        let _ = completer(Err(CorrelationError::RequestCancelled(id.clone()).into()));
        entry.state = RequestState::Cancelled;
        let token_cleanup = entry.progress_token.take();
        if let Some(token) = token_cleanup {
            inner.progress.remove(&token);
        }
        Ok(())
    }

    /// Fail a pending request with the given error (server error frame,
    /// send failure). No-op on terminal entries; an id never registered is
    /// [`CorrelationError::UnknownResponseId`].
    pub async fn fail(&self, id: &RequestId, error: McpError) -> McpResult<()> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| CorrelationError::UnknownResponseId(id.clone()))?;

        if entry.state != RequestState::Pending {
            tracing::debug!(id = %id, "fail on non-pending request ignored");
            return Ok(());
        }

        entry.stop_timer();
        entry.failure = Some(error.to_string());
        let completer = entry.completer.take().expect("pending entry has completer");
        let _ = completer(Err(error));
        entry.state = RequestState::Failed;
        let token_cleanup = entry.progress_token.take();
        if let Some(token) = token_cleanup {
            inner.progress.remove(&token);
        }
        Ok(())
    }

    /// Remove a request that was never sent (the send itself failed).
    /// The caller reports the send error; the waiter channel just closes.
    pub async fn discard(&self, id: &RequestId) {
        let mut inner = self.inner.lock().await;
        if let Some(mut entry) = inner.entries.remove(id) {
            entry.stop_timer();
            inner.drop_progress_binding(&entry);
        }
    }

    /// Fail every outstanding pending request and empty the registry.
    /// Used on fatal transport failure.
    pub async fn fail_all(&self, error: impl Fn(&RequestId) -> McpError) {
        let mut inner = self.inner.lock().await;
        for (id, mut entry) in inner.entries.drain() {
            entry.stop_timer();
            if let Some(completer) = entry.completer.take() {
                let _ = completer(Err(error(&id)));
            }
        }
        inner.progress.clear();
    }

    /// Cancel every outstanding pending request and empty the registry.
    /// Used on orderly disconnect.
    pub async fn cancel_all(&self) {
        self.fail_all(|id| CorrelationError::RequestCancelled(id.clone()).into())
            .await;
    }

    /// The state of a registered request, if it is still tracked.
    pub async fn state_of(&self, id: &RequestId) -> Option<RequestState> {
        self.inner.lock().await.entries.get(id).map(|e| e.state)
    }

    /// Drop terminal records, retaining only pending entries.
    pub async fn clear_stale(&self) {
        self.inner
            .lock()
            .await
            .entries
            .retain(|_, entry| entry.state == RequestState::Pending);
    }

    /// Number of tracked entries (pending and terminal records).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether the registry tracks no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

/// Timeout transition, fired by a timer task: fails the waiter with
/// `Timeout{id, method}` and removes the entry, so a late response falls
/// through as `UnknownResponseId`.
async fn fire_timeout(shared: &Mutex<Inner>, id: &RequestId) {
    let mut inner = shared.lock().await;
    let Some(entry) = inner.entries.get(id) else {
        return;
    };
    if entry.state != RequestState::Pending {
        return;
    }
    let mut entry = inner.entries.remove(id).expect("entry just observed");
    inner.drop_progress_binding(&entry);
    drop(inner);

    let op = format!("id: {id} method: {}", entry.method);
    tracing::warn!(id = %id, method = %entry.method, "request timed out");
    let completer = entry.completer.take().expect("pending entry has completer");
    let _ = completer(Err(TransportError::Timeout { op }.into()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::messages::EmptyResult;
    use crate::messages::tools::ListToolsResult;

    fn registry() -> Arc<PendingRequests> {
        Arc::new(PendingRequests::new())
    }

    #[tokio::test]
    async fn complete_delivers_typed_result() {
        let registry = registry();
        let rx = registry
            .register::<ListToolsResult>(RequestId::from("t-1"), RequestMethod::ToolsList, None)
            .await
            .unwrap();

        registry
            .complete(JsonRpcResponse::new("t-1", json!({"tools": []})))
            .await
            .unwrap();

        let result = rx.await.unwrap().unwrap();
        assert!(result.tools.is_empty());
        assert_eq!(
            registry.state_of(&RequestId::from("t-1")).await,
            Some(RequestState::Completed)
        );
    }

    #[tokio::test]
    async fn decode_failure_fails_the_entry() {
        let registry = registry();
        let rx = registry
            .register::<ListToolsResult>(RequestId::from("t-1"), RequestMethod::ToolsList, None)
            .await
            .unwrap();

        registry
            .complete(JsonRpcResponse::new("t-1", json!({"tools": "not-a-list"})))
            .await
            .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            McpError::Protocol(ProtocolError::InvalidResponse { .. })
        ));
        assert_eq!(
            registry.state_of(&RequestId::from("t-1")).await,
            Some(RequestState::Failed)
        );
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let registry = registry();
        let _rx = registry
            .register::<EmptyResult>(RequestId::from("t-1"), RequestMethod::Ping, None)
            .await
            .unwrap();
        let err = registry
            .register::<EmptyResult>(RequestId::from("t-1"), RequestMethod::Ping, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::DuplicateRequestId(_))
        ));
    }

    #[tokio::test]
    async fn id_one_is_reserved_for_initialize() {
        let registry = registry();
        let err = registry
            .register::<EmptyResult>(RequestId::Number(1), RequestMethod::Ping, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::ReusedRequestId(_))
        ));

        // string "1" is not the reserved id
        assert!(registry
            .register::<EmptyResult>(RequestId::from("1"), RequestMethod::Ping, None)
            .await
            .is_ok());

        assert!(registry
            .register::<crate::messages::InitializeResult>(
                RequestId::Number(1),
                RequestMethod::Initialize,
                None
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_idempotent() {
        let registry = registry();
        let rx = registry
            .register::<EmptyResult>(RequestId::from("req-7"), RequestMethod::Ping, None)
            .await
            .unwrap();

        registry.cancel(&RequestId::from("req-7")).await.unwrap();
        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::RequestCancelled(_))
        ));

        // idempotent
        registry.cancel(&RequestId::from("req-7")).await.unwrap();

        // a late response for a cancelled request is a no-op
        registry
            .complete(JsonRpcResponse::new("req-7", json!({})))
            .await
            .unwrap();
        assert_eq!(
            registry.state_of(&RequestId::from("req-7")).await,
            Some(RequestState::Cancelled)
        );
    }

    #[tokio::test]
    async fn cancel_after_completion_is_rejected() {
        let registry = registry();
        let _rx = registry
            .register::<EmptyResult>(RequestId::from("t-1"), RequestMethod::Ping, None)
            .await
            .unwrap();
        registry
            .complete(JsonRpcResponse::new("t-1", json!({})))
            .await
            .unwrap();

        let err = registry.cancel(&RequestId::from("t-1")).await.unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::CannotCancel { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_of_initialize_is_rejected() {
        let registry = registry();
        let err = registry.cancel(&RequestId::Number(1)).await.unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::CannotCancel { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_the_waiter_and_removes_the_entry() {
        let registry = registry();
        let rx = registry
            .register::<ListToolsResult>(
                RequestId::from("t-1"),
                RequestMethod::ToolsList,
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_millis(60)).await;
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(
            err.to_string(),
            "transport error: operation timed out: id: t-1 method: tools/list"
        );

        // the entry is gone: a late reply is an unknown response id
        let late = registry
            .complete(JsonRpcResponse::new("t-1", json!({"tools": []})))
            .await
            .unwrap_err();
        assert!(matches!(
            late,
            McpError::Correlation(CorrelationError::UnknownResponseId(_))
        ));
        assert_eq!(registry.state_of(&RequestId::from("t-1")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_stops_the_timer() {
        let registry = registry();
        let rx = registry
            .register::<EmptyResult>(
                RequestId::from("t-1"),
                RequestMethod::Ping,
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        registry
            .complete(JsonRpcResponse::new("t-1", json!({})))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;

        assert!(rx.await.unwrap().is_ok());
        assert_eq!(
            registry.state_of(&RequestId::from("t-1")).await,
            Some(RequestState::Completed)
        );
    }

    #[tokio::test]
    async fn unknown_response_id_is_an_error() {
        let registry = registry();
        let err = registry
            .complete(JsonRpcResponse::new("ghost", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::UnknownResponseId(_))
        ));
    }

    #[tokio::test]
    async fn progress_tokens_are_unique_across_active_requests() {
        let registry = registry();
        let _rx1 = registry
            .register::<EmptyResult>(RequestId::from("a"), RequestMethod::Ping, None)
            .await
            .unwrap();
        let _rx2 = registry
            .register::<EmptyResult>(RequestId::from("b"), RequestMethod::Ping, None)
            .await
            .unwrap();

        let token = ProgressToken::from("tok-1");
        registry
            .register_progress(token.clone(), &RequestId::from("a"))
            .await
            .unwrap();
        let err = registry
            .register_progress(token.clone(), &RequestId::from("b"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            McpError::Correlation(CorrelationError::DuplicateProgressToken(_))
        ));

        assert_eq!(
            registry.progress_owner(&token).await,
            Some(RequestId::from("a"))
        );

        // cancelling the request drops the binding
        registry.cancel(&RequestId::from("a")).await.unwrap();
        assert_eq!(registry.progress_owner(&token).await, None);
    }

    #[tokio::test]
    async fn fail_all_empties_the_registry() {
        let registry = registry();
        let rx1 = registry
            .register::<EmptyResult>(RequestId::from("a"), RequestMethod::Ping, None)
            .await
            .unwrap();
        let rx2 = registry
            .register::<EmptyResult>(RequestId::from("b"), RequestMethod::Ping, None)
            .await
            .unwrap();

        registry
            .fail_all(|_| TransportError::NotConnected.into())
            .await;

        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn clear_stale_retains_only_pending() {
        let registry = registry();
        let _rx1 = registry
            .register::<EmptyResult>(RequestId::from("done"), RequestMethod::Ping, None)
            .await
            .unwrap();
        let _rx2 = registry
            .register::<EmptyResult>(RequestId::from("live"), RequestMethod::Ping, None)
            .await
            .unwrap();

        registry
            .complete(JsonRpcResponse::new("done", json!({})))
            .await
            .unwrap();
        assert_eq!(registry.len().await, 2);

        registry.clear_stale().await;
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            registry.state_of(&RequestId::from("live")).await,
            Some(RequestState::Pending)
        );
        assert_eq!(registry.state_of(&RequestId::from("done")).await, None);
    }
}
