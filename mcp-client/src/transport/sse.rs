//! SSE client transport: a long-lived GET event stream for inbound frames
//! and short-lived POSTs for outbound frames.
//!
//! The POST URL is not configured; it is discovered in-band: the server's
//! first `endpoint` event carries a URL (absolute or relative to the SSE
//! URL) that all subsequent sends POST to. Sends that arrive before
//! discovery wait up to the send deadline for the endpoint to appear.
//!
//! The event stream is parsed line by line per the event-stream grammar;
//! `retry:` directives update the reconnect base delay used by the POST
//! retry schedule.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

use super::{check_frame_size, InboundFrames, InboundSender, Transport, TransportState};
use super::{SseConfig, TransportOptions};
use crate::error::{McpResult, TransportError};

/// One line of an SSE stream, classified by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// Empty line: dispatch the buffered event
    Blank,
    /// `event:`: sets the pending event type
    Event(String),
    /// `data:`: appends to the pending payload
    Data(String),
    /// `id:`: opaque event id
    Id(String),
    /// `retry:`: reconnect delay in milliseconds
    Retry(u64),
    /// `:`: comment, ignored
    Comment(String),
    /// Anything else, ignored
    Unknown(String),
}

impl SseLine {
    /// Classify one line (without its trailing newline).
    pub fn parse(line: &str) -> Self {
        if line.is_empty() {
            return Self::Blank;
        }
        if let Some(rest) = line.strip_prefix(':') {
            return Self::Comment(strip_leading_space(rest).to_string());
        }
        if let Some(rest) = line.strip_prefix("event:") {
            return Self::Event(strip_leading_space(rest).to_string());
        }
        if let Some(rest) = line.strip_prefix("data:") {
            return Self::Data(strip_leading_space(rest).to_string());
        }
        if let Some(rest) = line.strip_prefix("id:") {
            return Self::Id(strip_leading_space(rest).to_string());
        }
        if let Some(rest) = line.strip_prefix("retry:") {
            return match strip_leading_space(rest).parse::<u64>() {
                Ok(ms) => Self::Retry(ms),
                Err(_) => Self::Unknown(line.to_string()),
            };
        }
        Self::Unknown(line.to_string())
    }

    /// Format this line back to its wire form. Inverse of [`parse`] for all
    /// variants except `Unknown`.
    ///
    /// [`parse`]: Self::parse
    pub fn format(&self) -> String {
        match self {
            Self::Blank => String::new(),
            Self::Event(v) => format!("event: {v}"),
            Self::Data(v) => format!("data: {v}"),
            Self::Id(v) => format!("id: {v}"),
            Self::Retry(ms) => format!("retry: {ms}"),
            Self::Comment(v) => format!(": {v}"),
            Self::Unknown(v) => v.clone(),
        }
    }
}

fn strip_leading_space(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

/// A dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `"message"` when the stream did not name one.
    pub event_type: String,
    /// Accumulated UTF-8 payload; multiple `data:` lines join with `\n`.
    pub data: String,
    /// Last seen event id, if any.
    pub id: Option<String>,
}

/// Accumulates lines into events, dispatching on each blank line.
#[derive(Debug, Default)]
pub struct EventAccumulator {
    event_type: Option<String>,
    data: Option<String>,
    last_id: Option<String>,
}

impl EventAccumulator {
    /// Feed one classified line; returns an event when a blank line
    /// completes one.
    pub fn push(&mut self, line: SseLine) -> Option<SseEvent> {
        match line {
            SseLine::Blank => {
                let event_type = self.event_type.take();
                let data = self.data.take();
                if event_type.is_none() && data.is_none() {
                    return None;
                }
                Some(SseEvent {
                    event_type: event_type.unwrap_or_else(|| "message".to_string()),
                    data: data.unwrap_or_default(),
                    id: self.last_id.clone(),
                })
            }
            SseLine::Event(v) => {
                self.event_type = Some(v);
                None
            }
            SseLine::Data(v) => {
                match &mut self.data {
                    Some(buf) => {
                        buf.push('\n');
                        buf.push_str(&v);
                    }
                    None => self.data = Some(v),
                }
                None
            }
            SseLine::Id(v) => {
                self.last_id = Some(v);
                None
            }
            SseLine::Retry(_) | SseLine::Comment(_) | SseLine::Unknown(_) => None,
        }
    }
}

/// SSE transport to a remote MCP server.
pub struct SseTransport {
    config: SseConfig,
    options: TransportOptions,
    http: Client,
    state: Arc<StdMutex<TransportState>>,
    inbound: Option<InboundFrames>,
    reader: Option<JoinHandle<()>>,
    post_url: Option<watch::Receiver<Option<Url>>>,
    /// Effective reconnect base delay; `retry:` directives update it.
    retry_base: Arc<StdMutex<Duration>>,
}

impl SseTransport {
    /// Create a new SSE transport. No network traffic happens until
    /// `start()`.
    pub fn new(config: SseConfig, options: TransportOptions) -> McpResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = key
                .parse::<HeaderName>()
                .map_err(|e| TransportError::InvalidState {
                    reason: format!("invalid header name '{key}': {e}"),
                })?;
            let value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidState {
                reason: format!("invalid header value for '{key}': {e}"),
            })?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(|e| TransportError::InvalidState {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let retry_base = Arc::new(StdMutex::new(options.retry_policy.base_delay));

        Ok(Self {
            config,
            options,
            http,
            state: Arc::new(StdMutex::new(TransportState::Disconnected)),
            inbound: None,
            reader: None,
            post_url: None,
            retry_base,
        })
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// The discovered POST URL, if the `endpoint` event has arrived.
    pub fn post_url(&self) -> Option<Url> {
        self.post_url.as_ref().and_then(|rx| rx.borrow().clone())
    }

    /// Wait until the POST URL is known, bounded by `deadline`.
    async fn wait_for_post_url(&self, deadline: Duration) -> McpResult<Url> {
        let mut rx = self
            .post_url
            .clone()
            .ok_or(TransportError::NotConnected)?;

        let wait = async {
            loop {
                if let Some(url) = rx.borrow_and_update().clone() {
                    return Ok(url);
                }
                if rx.changed().await.is_err() {
                    return Err(TransportError::OperationFailed {
                        detail: "endpoint discovery cancelled: transport stopped".to_string(),
                    });
                }
            }
        };

        match tokio::time::timeout(deadline, wait).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(TransportError::Timeout {
                op: "endpoint discovery".to_string(),
            }
            .into()),
        }
    }

    /// Reader task: consume the event stream and feed the inbound channel.
    async fn read_stream(
        response: reqwest::Response,
        tx: InboundSender,
        endpoint_tx: watch::Sender<Option<Url>>,
        base_url: Url,
        state: Arc<StdMutex<TransportState>>,
        retry_base: Arc<StdMutex<Duration>>,
        max_message_size: usize,
    ) {
        let mut stream = response.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut accumulator = EventAccumulator::default();

        loop {
            match stream.next().await {
                Some(Ok(chunk)) => {
                    for &byte in chunk.iter() {
                        if byte != b'\n' {
                            line_buf.push(byte);
                            continue;
                        }
                        let line = String::from_utf8_lossy(&line_buf);
                        let line = line.trim_end_matches('\r');
                        let parsed = SseLine::parse(line);
                        line_buf.clear();

                        match parsed {
                            SseLine::Retry(ms) => {
                                tracing::debug!(retry_ms = ms, "server updated retry delay");
                                *retry_base.lock().expect("retry lock poisoned") =
                                    Duration::from_millis(ms);
                            }
                            SseLine::Comment(comment) => {
                                tracing::debug!(comment = %comment, "SSE comment");
                            }
                            SseLine::Unknown(raw) => {
                                tracing::debug!(line = %raw, "ignoring unknown SSE line");
                            }
                            other => {
                                if let Some(event) = accumulator.push(other) {
                                    if !Self::dispatch_event(
                                        event,
                                        &tx,
                                        &endpoint_tx,
                                        &base_url,
                                        max_message_size,
                                    ) {
                                        tracing::debug!("inbound receiver dropped, stopping read");
                                        return;
                                    }
                                }
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    let err = TransportError::OperationFailed {
                        detail: format!("event stream error: {e}"),
                    };
                    tracing::error!(error = %err, "SSE stream failed");
                    *state.lock().expect("state lock poisoned") =
                        TransportState::Failed(err.clone());
                    let _ = tx.send(Err(err.into()));
                    return;
                }
                None => {
                    let err = TransportError::OperationFailed {
                        detail: "event stream ended unexpectedly".to_string(),
                    };
                    tracing::warn!("SSE stream closed by server");
                    *state.lock().expect("state lock poisoned") =
                        TransportState::Failed(err.clone());
                    let _ = tx.send(Err(err.into()));
                    return;
                }
            }
        }
    }

    /// Route one dispatched event. Returns false when the inbound receiver
    /// is gone.
    fn dispatch_event(
        event: SseEvent,
        tx: &InboundSender,
        endpoint_tx: &watch::Sender<Option<Url>>,
        base_url: &Url,
        max_message_size: usize,
    ) -> bool {
        if event.event_type == "endpoint" {
            match base_url.join(event.data.trim()) {
                Ok(url) => {
                    tracing::info!(post_url = %url, "discovered endpoint");
                    let _ = endpoint_tx.send(Some(url));
                }
                Err(e) => {
                    tracing::warn!(data = %event.data, error = %e, "unusable endpoint event");
                }
            }
            return true;
        }

        if event.data.len() > max_message_size {
            return tx
                .send(Err(TransportError::MessageTooLarge {
                    limit: max_message_size,
                }
                .into()))
                .is_ok();
        }

        tracing::debug!(event_type = %event.event_type, bytes = event.data.len(), "SSE event");
        tx.send(Ok(Bytes::from(event.data.into_bytes()))).is_ok()
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&mut self) -> McpResult<()> {
        match self.state() {
            TransportState::Connected => return Ok(()),
            TransportState::Disconnected => {}
            other => {
                return Err(TransportError::InvalidState {
                    reason: format!("cannot start transport while {other}"),
                }
                .into())
            }
        }

        self.set_state(TransportState::Connecting);
        tracing::info!(url = %self.config.url, "connecting SSE transport");

        let request = self
            .http
            .get(self.config.url.clone())
            .header(ACCEPT, "text/event-stream");

        let response = match tokio::time::timeout(self.options.connect_timeout, request.send())
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = TransportError::ConnectionFailed {
                    detail: e.to_string(),
                };
                self.set_state(TransportState::Failed(err.clone()));
                return Err(err.into());
            }
            Err(_) => {
                let err = TransportError::Timeout {
                    op: "SSE connect".to_string(),
                };
                self.set_state(TransportState::Failed(err.clone()));
                return Err(err.into());
            }
        };

        if response.status() != StatusCode::OK {
            let err = TransportError::OperationFailed {
                detail: format!("SSE endpoint returned {}", response.status()),
            };
            self.set_state(TransportState::Failed(err.clone()));
            return Err(err.into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (endpoint_tx, endpoint_rx) = watch::channel(None);

        self.inbound = Some(rx);
        self.post_url = Some(endpoint_rx);

        let state = Arc::clone(&self.state);
        let retry_base = Arc::clone(&self.retry_base);
        let base_url = self.config.url.clone();
        let max_message_size = self.options.max_message_size;

        self.reader = Some(tokio::spawn(Self::read_stream(
            response,
            tx,
            endpoint_tx,
            base_url,
            state,
            retry_base,
            max_message_size,
        )));

        self.set_state(TransportState::Connected);
        tracing::info!("SSE transport connected");
        Ok(())
    }

    async fn stop(&mut self) -> McpResult<()> {
        if self.state() == TransportState::Disconnected {
            return Ok(());
        }

        self.set_state(TransportState::Disconnecting);

        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }

        // dropping the watch sender (inside the reader) rejects any
        // endpoint waiters; dropping the inbound sender finishes the stream
        self.post_url = None;
        self.inbound = None;

        self.set_state(TransportState::Disconnected);
        tracing::info!("SSE transport disconnected");
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    fn inbound(&mut self) -> McpResult<InboundFrames> {
        self.inbound
            .take()
            .ok_or_else(|| {
                TransportError::InvalidState {
                    reason: "inbound stream unavailable: not started or already taken".to_string(),
                }
                .into()
            })
    }

    async fn send(&mut self, frame: Bytes, timeout: Option<Duration>) -> McpResult<()> {
        if self.state() != TransportState::Connected {
            return Err(TransportError::NotConnected.into());
        }
        check_frame_size(&frame, self.options.max_message_size)?;

        let deadline = timeout.unwrap_or(self.options.send_timeout);
        let url = self.wait_for_post_url(deadline).await?;

        let policy = self
            .options
            .retry_policy
            .clone()
            .with_base_delay(*self.retry_base.lock().expect("retry lock poisoned"));

        let http = self.http.clone();
        policy
            .with_retry("POST", || {
                let request = http
                    .post(url.clone())
                    .header(CONTENT_TYPE, "application/json")
                    .timeout(deadline)
                    .body(frame.clone());
                async move {
                    let response = request.send().await.map_err(|e| {
                        if e.is_timeout() {
                            TransportError::Timeout {
                                op: "POST send".to_string(),
                            }
                        } else {
                            TransportError::OperationFailed {
                                detail: format!("POST failed: {e}"),
                            }
                        }
                    })?;
                    if !response.status().is_success() {
                        return Err(TransportError::OperationFailed {
                            detail: format!("POST returned {}", response.status()),
                        }
                        .into());
                    }
                    Ok(())
                }
            })
            .await
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
