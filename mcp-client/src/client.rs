//! High-level MCP client: session lifecycle, typed requests, and the
//! inbound dispatcher.
//!
//! The client owns all mutable session state (the state machine, the
//! pending-request registry, and the notifications channel) behind
//! per-instance locks; suspension happens outside them. A single
//! long-lived dispatcher task consumes the transport's inbound frames and
//! routes them: responses and errors to the registry, server requests to
//! the user-supplied handlers, notifications inward (`cancelled`,
//! `progress`) or out to the subscriber stream.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::correlation::{PendingRequests, RequestState};
use crate::error::{CorrelationError, McpError, McpResult, ProtocolError, TransportError};
use crate::messages::{
    CallToolRequest, CallToolResult, CancelledNotification, ClientCapabilities, ClientRequest,
    CreateMessageParams, CreateMessageResult, GetPromptRequest, GetPromptResult, Implementation,
    InitializeRequest, InitializeResult, JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListPromptsRequest, ListPromptsResult,
    ListResourcesRequest, ListResourcesResult, ListRootsResult, ListToolsRequest, ListToolsResult,
    LogLevel, LoggingMessageNotification, NotificationMethod, PingRequest, ProgressNotification,
    ProgressToken, ProtocolVersion, ReadResourceRequest, ReadResourceResult, RequestId,
    RequestMethod, RequestMeta, ResourceUpdatedNotification, ServerCapabilities,
    ServerNotification, SetLevelRequest,
};
use crate::session::SessionState;
use crate::transport::{create_transport, Transport, TransportConfig, TransportOptions};

/// Handler for server-initiated `sampling/createMessage` requests.
///
/// Supplying one (and the matching capability) lets the server run LLM
/// completions through this client.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    /// Produce a completion for the server's sampling request.
    async fn create_message(&self, params: CreateMessageParams) -> McpResult<CreateMessageResult>;
}

/// Handler for server-initiated `roots/list` requests.
#[async_trait]
pub trait RootsHandler: Send + Sync {
    /// List the roots this client exposes to the server.
    async fn list_roots(&self) -> McpResult<ListRootsResult>;
}

/// Callback invoked for progress notifications whose token is registered.
pub type ProgressCallback = Arc<dyn Fn(ProgressNotification) + Send + Sync>;

#[derive(Clone, Default)]
struct Handlers {
    sampling: Option<Arc<dyn SamplingHandler>>,
    roots: Option<Arc<dyn RootsHandler>>,
    progress: Option<ProgressCallback>,
}

/// Per-request options for [`McpClient::send_request_with_options`].
#[derive(Default)]
pub struct RequestOptions {
    /// Explicit request id; generated when absent.
    pub id: Option<RequestId>,
    /// Progress token to carry in the request's `_meta`.
    pub progress_token: Option<ProgressToken>,
    /// Per-request deadline; the transport send timeout when absent.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Use a specific request id.
    pub fn id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a progress token.
    pub fn progress_token(mut self, token: ProgressToken) -> Self {
        self.progress_token = Some(token);
        self
    }

    /// Set a per-request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An MCP client over a byte-framed transport.
pub struct McpClient {
    options: TransportOptions,
    client_info: Implementation,
    capabilities: ClientCapabilities,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    state: Arc<RwLock<SessionState>>,
    pending: Arc<PendingRequests>,
    handlers: Handlers,
    server_info: RwLock<Option<Implementation>>,
    notifications_tx: mpsc::UnboundedSender<ServerNotification>,
    notifications_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerNotification>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicI64,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient").finish_non_exhaustive()
    }
}

impl McpClient {
    /// Create a client over an already-constructed transport.
    pub fn new(
        transport: Box<dyn Transport>,
        options: TransportOptions,
        client_info: Implementation,
    ) -> Self {
        let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();
        Self {
            options,
            client_info,
            capabilities: ClientCapabilities::default(),
            transport: Arc::new(Mutex::new(transport)),
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            pending: Arc::new(PendingRequests::new()),
            handlers: Handlers::default(),
            server_info: RwLock::new(None),
            notifications_tx,
            notifications_rx: Mutex::new(Some(notifications_rx)),
            dispatcher: Mutex::new(None),
            // id 1 is reserved for initialize
            next_id: AtomicI64::new(2),
        }
    }

    /// Start building a client.
    pub fn builder() -> McpClientBuilder {
        McpClientBuilder::new()
    }

    /// The current session state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// The capabilities this client advertises.
    pub fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    /// The server's capabilities; available once the session is running.
    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.state.read().await.server_capabilities().cloned()
    }

    /// The server's implementation info; available once the session is
    /// running.
    pub async fn server_info(&self) -> Option<Implementation> {
        self.server_info.read().await.clone()
    }

    /// The state of a tracked request.
    pub async fn state_of(&self, id: &RequestId) -> Option<RequestState> {
        self.pending.state_of(id).await
    }

    /// Drop terminal request records, retaining only pending ones.
    pub async fn clear_stale(&self) {
        self.pending.clear_stale().await;
    }

    /// Take the server-notification stream. Single consumer; a second call
    /// fails.
    pub async fn notifications(
        &self,
    ) -> McpResult<mpsc::UnboundedReceiver<ServerNotification>> {
        self.notifications_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| {
                TransportError::InvalidState {
                    reason: "notification stream already taken".to_string(),
                }
                .into()
            })
    }

    /// Connect the transport and run the initialize handshake.
    ///
    /// Drives disconnected → connecting → initializing → running. Calling
    /// while not disconnected returns immediately without any transition.
    pub async fn connect(&self) -> McpResult<()> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Disconnected {
                tracing::debug!(state = %*state, "connect() while not disconnected is a no-op");
                return Ok(());
            }
            *state = SessionState::Connecting;
        }
        tracing::info!("connecting MCP client");

        let inbound = {
            let mut transport = self.transport.lock().await;
            if let Err(e) = transport.start().await {
                self.fail_session(format!("transport start failed: {e}")).await;
                return Err(e);
            }
            match transport.inbound() {
                Ok(inbound) => inbound,
                Err(e) => {
                    self.fail_session(format!("no inbound stream: {e}")).await;
                    return Err(e);
                }
            }
        };

        *self.state.write().await = SessionState::Initializing;
        self.spawn_dispatcher(inbound).await;

        // initialize with the reserved id, bypassing the running-state gate
        let receiver = self
            .pending
            .register::<InitializeResult>(
                RequestId::INITIALIZE,
                RequestMethod::Initialize,
                Some(self.options.send_timeout),
            )
            .await?;

        let request = InitializeRequest {
            protocol_version: ProtocolVersion::current(),
            capabilities: self.capabilities.clone(),
            client_info: self.client_info.clone(),
        };
        let message = JsonRpcMessage::Request(JsonRpcRequest::new(
            RequestId::INITIALIZE,
            RequestMethod::Initialize.as_str(),
            serde_json::to_value(&request)?,
        ));
        if let Err(e) = self.send_frame(message, None).await {
            self.pending.discard(&RequestId::INITIALIZE).await;
            self.fail_session(format!("initialize send failed: {e}")).await;
            return Err(e);
        }

        let result = match receiver.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.fail_session(format!("initialize failed: {e}")).await;
                return Err(e);
            }
            Err(_) => {
                let err: McpError =
                    CorrelationError::NoResponse(RequestId::INITIALIZE).into();
                self.fail_session(format!("initialize failed: {err}")).await;
                return Err(err);
            }
        };

        if result.protocol_version != ProtocolVersion::current() {
            let err = ProtocolError::UnsupportedVersion {
                version: result.protocol_version.to_string(),
                expected: ProtocolVersion::CURRENT.to_string(),
            };
            self.fail_session(err.to_string()).await;
            return Err(err.into());
        }

        let message = JsonRpcMessage::Notification(JsonRpcNotification::without_params(
            NotificationMethod::Initialized.as_str(),
        ));
        if let Err(e) = self.send_frame(message, None).await {
            self.fail_session(format!("initialized notification failed: {e}"))
                .await;
            return Err(e);
        }

        *self.server_info.write().await = Some(result.server_info.clone());
        *self.state.write().await = SessionState::Running {
            server_capabilities: result.capabilities.clone(),
        };
        tracing::info!(server = %result.server_info.name, "MCP session running");
        Ok(())
    }

    /// Disconnect: stop the transport and cancel everything in flight.
    pub async fn disconnect(&self) -> McpResult<()> {
        {
            let mut state = self.state.write().await;
            if *state == SessionState::Disconnected {
                return Ok(());
            }
            *state = SessionState::Disconnected;
        }
        tracing::info!("disconnecting MCP client");

        *self.server_info.write().await = None;
        let stopped = self.transport.lock().await.stop().await;
        self.pending.cancel_all().await;

        if let Some(dispatcher) = self.dispatcher.lock().await.take() {
            // the closed inbound stream ends the task; give it a moment
            if tokio::time::timeout(Duration::from_secs(1), dispatcher)
                .await
                .is_err()
            {
                tracing::warn!("dispatcher did not stop in time");
            }
        }
        stopped
    }

    /// Send a typed request and await its typed result.
    pub async fn send_request<R: ClientRequest>(&self, request: R) -> McpResult<R::Result> {
        self.send_request_with_options(request, RequestOptions::default())
            .await
    }

    /// Send a typed request with an explicit id, progress token, or
    /// deadline.
    pub async fn send_request_with_options<R: ClientRequest>(
        &self,
        request: R,
        options: RequestOptions,
    ) -> McpResult<R::Result> {
        let method = R::METHOD;
        self.state.read().await.check_request(method)?;

        let id = options
            .id
            .unwrap_or_else(|| RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst)));
        let timeout = options.timeout.unwrap_or(self.options.send_timeout);

        let mut params = serde_json::to_value(&request)?;
        if let Some(token) = &options.progress_token {
            attach_progress_meta(&mut params, token)?;
        }

        // register before writing to the wire so an immediate response
        // cannot be lost
        let receiver = self
            .pending
            .register::<R::Result>(id.clone(), method, Some(timeout))
            .await?;

        if let Some(token) = options.progress_token {
            if let Err(e) = self.pending.register_progress(token.clone(), &id).await {
                tracing::warn!(token = %token, error = %e, "progress token not recorded");
            }
        }

        let message =
            JsonRpcMessage::Request(JsonRpcRequest::new(id.clone(), method.as_str(), params));
        if let Err(e) = self.send_frame(message, Some(timeout)).await {
            self.pending.discard(&id).await;
            return Err(e);
        }

        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CorrelationError::NoResponse(id).into()),
        }
    }

    /// Send a client-origin notification.
    pub async fn send_notification<P: Serialize>(
        &self,
        method: NotificationMethod,
        params: Option<P>,
    ) -> McpResult<()> {
        self.state.read().await.check_notification(method)?;
        let notification = match params {
            Some(params) => {
                JsonRpcNotification::new(method.as_str(), serde_json::to_value(params)?)
            }
            None => JsonRpcNotification::without_params(method.as_str()),
        };
        self.send_frame(JsonRpcMessage::Notification(notification), None)
            .await
    }

    /// Reply to a server-originated request.
    pub async fn send_response(&self, request_id: RequestId, result: Value) -> McpResult<()> {
        if !self.state.read().await.is_running() {
            return Err(ProtocolError::NotConnected.into());
        }
        self.send_frame(
            JsonRpcMessage::Response(JsonRpcResponse::new(request_id, result)),
            None,
        )
        .await
    }

    /// Cancel an in-flight request and tell the server.
    ///
    /// The waiter observes [`CorrelationError::RequestCancelled`]; the
    /// peer receives `notifications/cancelled` with the id and reason.
    pub async fn cancel_request(
        &self,
        id: &RequestId,
        reason: Option<String>,
    ) -> McpResult<()> {
        self.pending.cancel(id).await?;
        self.send_notification(
            NotificationMethod::Cancelled,
            Some(CancelledNotification {
                request_id: id.clone(),
                reason,
            }),
        )
        .await
    }

    // Typed convenience wrappers.

    /// `ping`
    pub async fn ping(&self) -> McpResult<()> {
        self.send_request(PingRequest::default()).await.map(|_| ())
    }

    /// `tools/list`
    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResult> {
        self.send_request(ListToolsRequest { cursor }).await
    }

    /// `tools/call`
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
    ) -> McpResult<CallToolResult> {
        self.send_request(CallToolRequest {
            name: name.into(),
            arguments,
        })
        .await
    }

    /// `resources/list`
    pub async fn list_resources(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourcesResult> {
        self.send_request(ListResourcesRequest { cursor }).await
    }

    /// `resources/read`
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        self.send_request(ReadResourceRequest { uri: uri.into() })
            .await
    }

    /// `prompts/list`
    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResult> {
        self.send_request(ListPromptsRequest { cursor }).await
    }

    /// `prompts/get`
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<std::collections::HashMap<String, String>>,
    ) -> McpResult<GetPromptResult> {
        self.send_request(GetPromptRequest {
            name: name.into(),
            arguments,
        })
        .await
    }

    /// `logging/setLevel`
    pub async fn set_log_level(&self, level: LogLevel) -> McpResult<()> {
        self.send_request(SetLevelRequest { level })
            .await
            .map(|_| ())
    }

    // Internals.

    async fn fail_session(&self, error: String) {
        tracing::error!(error = %error, "session failed");
        *self.state.write().await = SessionState::Failed { error };
        self.pending
            .fail_all(|_| TransportError::NotConnected.into())
            .await;
    }

    async fn send_frame(&self, message: JsonRpcMessage, timeout: Option<Duration>) -> McpResult<()> {
        let frame = message.to_bytes()?;
        self.transport.lock().await.send(frame, timeout).await
    }

    async fn spawn_dispatcher(&self, inbound: crate::transport::InboundFrames) {
        let ctx = DispatcherContext {
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            pending: Arc::clone(&self.pending),
            handlers: self.handlers.clone(),
            capabilities: self.capabilities.clone(),
            notifications: self.notifications_tx.clone(),
        };
        let handle = tokio::spawn(run_dispatcher(inbound, ctx));
        *self.dispatcher.lock().await = Some(handle);
    }
}

/// Inject `_meta.progressToken` into a request's params object.
fn attach_progress_meta(params: &mut Value, token: &ProgressToken) -> McpResult<()> {
    let meta = serde_json::to_value(RequestMeta {
        progress_token: Some(token.clone()),
    })?;
    match params {
        Value::Object(map) => {
            map.insert("_meta".to_string(), meta);
            Ok(())
        }
        Value::Null => {
            *params = json!({ "_meta": meta });
            Ok(())
        }
        other => Err(ProtocolError::InvalidParams {
            method: "request".to_string(),
            detail: format!("params must be an object to carry _meta, got {other}"),
        }
        .into()),
    }
}

struct DispatcherContext {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    state: Arc<RwLock<SessionState>>,
    pending: Arc<PendingRequests>,
    handlers: Handlers,
    capabilities: ClientCapabilities,
    notifications: mpsc::UnboundedSender<ServerNotification>,
}

impl DispatcherContext {
    async fn reply(&self, message: JsonRpcMessage) {
        let frame = match message.to_bytes() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode reply");
                return;
            }
        };
        if let Err(e) = self.transport.lock().await.send(frame, None).await {
            tracing::warn!(error = %e, "failed to send reply");
        }
    }

    async fn fail_session(&self, error: String) {
        tracing::error!(error = %error, "dispatcher failing session");
        *self.state.write().await = SessionState::Failed { error };
        self.pending
            .fail_all(|_| TransportError::NotConnected.into())
            .await;
        let _ = self.transport.lock().await.stop().await;
    }
}

/// The long-lived inbound loop: decode, classify, route.
async fn run_dispatcher(mut inbound: crate::transport::InboundFrames, ctx: DispatcherContext) {
    tracing::debug!("dispatcher started");

    while let Some(item) = inbound.recv().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                ctx.fail_session(format!("transport failed: {e}")).await;
                return;
            }
        };

        match JsonRpcMessage::from_slice(&frame) {
            Ok(message) => dispatch_message(&ctx, message).await,
            Err(e) => {
                // the stream is no longer trustworthy
                ctx.fail_session(format!("undecodable inbound frame: {e}"))
                    .await;
                return;
            }
        }
    }

    // stream ended; quiet on orderly shutdown, fatal otherwise
    let orderly = matches!(*ctx.state.read().await, SessionState::Disconnected);
    if orderly {
        tracing::debug!("dispatcher stopped after disconnect");
    } else {
        ctx.fail_session("transport closed unexpectedly".to_string())
            .await;
    }
}

async fn dispatch_message(ctx: &DispatcherContext, message: JsonRpcMessage) {
    match message {
        JsonRpcMessage::Response(response) => {
            if let Err(e) = ctx.pending.complete(response).await {
                tracing::warn!(error = %e, "dropping response");
            }
        }
        JsonRpcMessage::Error(error) => dispatch_error(ctx, error).await,
        JsonRpcMessage::Request(request) => dispatch_server_request(ctx, request).await,
        JsonRpcMessage::Notification(notification) => {
            dispatch_server_notification(ctx, notification).await
        }
    }
}

/// Server JSON-RPC errors: associate by id when present and fail that
/// pending entry; otherwise log. Session state never changes.
async fn dispatch_error(ctx: &DispatcherContext, error: JsonRpcErrorResponse) {
    let Some(id) = error.id else {
        tracing::warn!(code = error.error.code, message = %error.error.message, "server error without id");
        return;
    };
    let server_error: McpError = ProtocolError::ServerError {
        code: error.error.code,
        message: error.error.message,
        data: error.error.data,
    }
    .into();
    if let Err(e) = ctx.pending.fail(&id, server_error).await {
        tracing::warn!(id = %id, error = %e, "dropping error response");
    }
}

async fn dispatch_server_request(ctx: &DispatcherContext, request: JsonRpcRequest) {
    let method = match request.method.parse::<RequestMethod>() {
        Ok(method) if method.is_server_origin() => method,
        Ok(_) | Err(_) => {
            tracing::warn!(method = %request.method, "unknown server request method");
            ctx.reply(JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                request.id,
                JsonRpcError::method_not_found(request.method),
            )))
            .await;
            return;
        }
    };

    match method {
        RequestMethod::Ping => {
            ctx.reply(JsonRpcMessage::Response(JsonRpcResponse::new(
                request.id,
                json!({}),
            )))
            .await;
        }
        RequestMethod::SamplingCreateMessage => {
            let handler = match (&ctx.capabilities.sampling, &ctx.handlers.sampling) {
                (Some(_), Some(handler)) => Arc::clone(handler),
                _ => {
                    tracing::warn!(
                        "{}",
                        ProtocolError::UnsupportedCapability {
                            method: request.method.clone()
                        }
                    );
                    ctx.reply(unsupported_capability_reply(request.id, &request.method))
                        .await;
                    return;
                }
            };
            let params = match request.params_as::<CreateMessageParams>() {
                Ok(params) => params,
                Err(e) => {
                    ctx.reply(JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                        request.id,
                        JsonRpcError::invalid_params(e.to_string()),
                    )))
                    .await;
                    return;
                }
            };
            let reply = match handler.create_message(params).await {
                Ok(result) => match serde_json::to_value(result) {
                    Ok(value) => JsonRpcMessage::Response(JsonRpcResponse::new(request.id, value)),
                    Err(e) => JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                        request.id,
                        JsonRpcError::internal_error(e.to_string()),
                    )),
                },
                Err(e) => JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                    request.id,
                    JsonRpcError::internal_error(e.to_string()),
                )),
            };
            ctx.reply(reply).await;
        }
        RequestMethod::RootsList => {
            let handler = match (&ctx.capabilities.roots, &ctx.handlers.roots) {
                (Some(_), Some(handler)) => Arc::clone(handler),
                _ => {
                    tracing::warn!(
                        "{}",
                        ProtocolError::UnsupportedCapability {
                            method: request.method.clone()
                        }
                    );
                    ctx.reply(unsupported_capability_reply(request.id, &request.method))
                        .await;
                    return;
                }
            };
            let reply = match handler.list_roots().await {
                Ok(result) => match serde_json::to_value(result) {
                    Ok(value) => JsonRpcMessage::Response(JsonRpcResponse::new(request.id, value)),
                    Err(e) => JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                        request.id,
                        JsonRpcError::internal_error(e.to_string()),
                    )),
                },
                Err(e) => JsonRpcMessage::Error(JsonRpcErrorResponse::new(
                    request.id,
                    JsonRpcError::internal_error(e.to_string()),
                )),
            };
            ctx.reply(reply).await;
        }
        _ => unreachable!("is_server_origin covers ping, sampling, roots"),
    }
}

fn unsupported_capability_reply(id: RequestId, method: &str) -> JsonRpcMessage {
    JsonRpcMessage::Error(JsonRpcErrorResponse::new(
        id,
        JsonRpcError::new(
            -32601,
            "Method not found",
            Some(Value::String(format!(
                "capability not negotiated for {method}"
            ))),
        ),
    ))
}

async fn dispatch_server_notification(ctx: &DispatcherContext, notification: JsonRpcNotification) {
    let method = match notification.method.parse::<NotificationMethod>() {
        Ok(method) => method,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring notification");
            return;
        }
    };

    match method {
        NotificationMethod::Cancelled => {
            let cancelled = match notification.params_as::<CancelledNotification>() {
                Ok(cancelled) => cancelled,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed cancelled notification");
                    return;
                }
            };
            // cancellations naming the reserved initialize id are ignored
            if cancelled.request_id.is_reserved() {
                tracing::debug!("ignoring cancellation of the initialize request");
                return;
            }
            match ctx.pending.cancel(&cancelled.request_id).await {
                Ok(()) => {
                    tracing::debug!(
                        id = %cancelled.request_id,
                        reason = cancelled.reason.as_deref().unwrap_or(""),
                        "request cancelled by server"
                    );
                }
                Err(e) => {
                    // unknown or finished: a no-op by contract
                    tracing::debug!(id = %cancelled.request_id, error = %e, "cancellation ignored");
                }
            }
        }
        NotificationMethod::Progress => {
            let progress = match notification.params_as::<ProgressNotification>() {
                Ok(progress) => progress,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed progress notification");
                    return;
                }
            };
            if ctx
                .pending
                .progress_owner(&progress.progress_token)
                .await
                .is_none()
            {
                tracing::warn!(token = %progress.progress_token, "progress for unknown token");
                return;
            }
            if let Some(callback) = &ctx.handlers.progress {
                callback(progress);
            } else {
                tracing::debug!(token = %progress.progress_token, "progress with no callback");
            }
        }
        NotificationMethod::ResourcesListChanged => {
            let _ = ctx.notifications.send(ServerNotification::ResourcesListChanged);
        }
        NotificationMethod::ResourcesUpdated => {
            match notification.params_as::<ResourceUpdatedNotification>() {
                Ok(updated) => {
                    let _ = ctx
                        .notifications
                        .send(ServerNotification::ResourcesUpdated(updated));
                }
                Err(e) => tracing::warn!(error = %e, "malformed resources/updated notification"),
            }
        }
        NotificationMethod::PromptsListChanged => {
            let _ = ctx.notifications.send(ServerNotification::PromptsListChanged);
        }
        NotificationMethod::ToolsListChanged => {
            let _ = ctx.notifications.send(ServerNotification::ToolsListChanged);
        }
        NotificationMethod::Message => {
            match notification.params_as::<LoggingMessageNotification>() {
                Ok(message) => {
                    let _ = ctx.notifications.send(ServerNotification::Message(message));
                }
                Err(e) => tracing::warn!(error = %e, "malformed log message notification"),
            }
        }
        NotificationMethod::Initialized | NotificationMethod::RootsListChanged => {
            tracing::warn!(method = %method, "client-origin notification from server ignored");
        }
    }
}

/// Builder for [`McpClient`].
pub struct McpClientBuilder {
    transport_config: Option<TransportConfig>,
    transport: Option<Box<dyn Transport>>,
    options: TransportOptions,
    client_info: Implementation,
    handlers: Handlers,
}

impl McpClientBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self {
            transport_config: None,
            transport: None,
            options: TransportOptions::default(),
            client_info: Implementation::new(
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
            ),
            handlers: Handlers::default(),
        }
    }

    /// Select the transport by configuration.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = Some(config);
        self
    }

    /// Use an already-constructed transport.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the transport options.
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the client implementation info.
    pub fn client_info(mut self, info: Implementation) -> Self {
        self.client_info = info;
        self
    }

    /// Handle server `sampling/createMessage` requests. Advertises the
    /// sampling capability.
    pub fn sampling_handler(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.handlers.sampling = Some(handler);
        self
    }

    /// Handle server `roots/list` requests. Advertises the roots
    /// capability.
    pub fn roots_handler(mut self, handler: Arc<dyn RootsHandler>) -> Self {
        self.handlers.roots = Some(handler);
        self
    }

    /// Receive progress notifications for registered tokens.
    pub fn progress_callback(
        mut self,
        callback: impl Fn(ProgressNotification) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.progress = Some(Arc::new(callback));
        self
    }

    /// Build the client. Capabilities mirror the supplied handlers.
    pub fn build(self) -> McpResult<McpClient> {
        let transport = match (self.transport, self.transport_config) {
            (Some(transport), _) => transport,
            (None, Some(config)) => create_transport(config, self.options.clone())?,
            (None, None) => {
                return Err(crate::error::ConfigError::MissingParameter {
                    parameter: "transport".to_string(),
                }
                .into())
            }
        };

        let mut capabilities = ClientCapabilities::default();
        if self.handlers.sampling.is_some() {
            capabilities = capabilities.with_sampling();
        }
        if self.handlers.roots.is_some() {
            capabilities = capabilities.with_roots();
        }

        let mut client = McpClient::new(transport, self.options, self.client_info);
        client.capabilities = capabilities;
        client.handlers = self.handlers;
        Ok(client)
    }
}

impl Default for McpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
