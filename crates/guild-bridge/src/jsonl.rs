//! JSON-lines worker transport
//!
//! Talks to a worker over a pair of byte streams, one JSON object per
//! line. Usually those are the stdin/stdout of a child process.
//!
//! Outgoing:
//! `{"type":"request","operation_id":..,"action":..,"mode":..,"args":{..}}`
//!
//! Incoming:
//! - `{"type":"reply","operation_id":..,"body":{..}}` answers a request
//! - `{"type":"completion","operation_id":..,"status":..,..}` is forwarded
//!   to the completion sink
//! - `{"type":"log","level":..,"message":..}` is re-emitted as a trace event

use async_trait::async_trait;
use dashmap::DashMap;
use guild_core::{CompletionEvent, GuildError, GuildResult, OperationId};
use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::queue::CompletionSink;
use crate::transport::{WorkerRequest, WorkerTransport};

type PendingReplies = DashMap<OperationId, oneshot::Sender<Value>>;

#[derive(Serialize)]
struct RequestLine<'a> {
    #[serde(rename = "type")]
    line_type: &'static str,
    #[serde(flatten)]
    request: &'a WorkerRequest,
}

/// Removes a request's reply slot however the wait ends.
struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    operation_id: OperationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.operation_id);
    }
}

/// Shared between the transport handle and its reader task.
struct Inbound {
    pending: PendingReplies,
    sink: Mutex<Option<CompletionSink>>,
    closed: AtomicBool,
}

impl Inbound {
    fn route(&self, line: &str) {
        let mut value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unparseable worker line: {}", e);
                return;
            }
        };
        let line_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match line_type.as_str() {
            "reply" => self.route_reply(value),
            "completion" => {
                if let Some(object) = value.as_object_mut() {
                    object.remove("type");
                }
                self.route_completion(value);
            }
            "log" => {
                let message = value.get("message").and_then(Value::as_str).unwrap_or("");
                debug!(target: "guild::worker", "{}", message);
            }
            other => warn!(line_type = other, "Ignoring worker line of unknown type"),
        }
    }

    fn route_reply(&self, mut value: Value) {
        let operation_id = value
            .get("operation_id")
            .and_then(Value::as_str)
            .and_then(|id| OperationId::parse(id).ok());
        let Some(operation_id) = operation_id else {
            warn!("Worker reply without a valid operation id");
            return;
        };
        let body = value
            .get_mut("body")
            .map(Value::take)
            .unwrap_or(Value::Null);

        match self.pending.remove(&operation_id) {
            Some((_, sender)) => {
                trace!(operation_id = %operation_id, "Matched worker reply");
                if sender.send(body).is_err() {
                    warn!(operation_id = %operation_id, "Reply arrived after the caller gave up");
                }
            }
            None => warn!(operation_id = %operation_id, "Reply for unknown request"),
        }
    }

    fn route_completion(&self, value: Value) {
        let event = match CompletionEvent::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                warn!("Ignoring unreadable completion event: {}", e);
                return;
            }
        };
        let sink = self.sink.lock().ok().and_then(|guard| guard.clone());
        match sink {
            Some(sink) => {
                if let Err(e) = sink.post(event) {
                    warn!("Dropping completion event: {}", e);
                }
            }
            None => warn!("Dropping completion event; no sink subscribed"),
        }
    }

    /// Fail waiting requests and stop the dispatcher; nothing can
    /// complete once the worker's output is gone.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders wakes every waiter with an error.
        self.pending.clear();
        if let Some(sink) = self.sink.lock().ok().and_then(|guard| guard.clone()) {
            post_shutdown(&sink);
        }
    }
}

/// [`WorkerTransport`] over newline-delimited JSON.
pub struct JsonLinesTransport {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    inbound: Arc<Inbound>,
    reader: JoinHandle<()>,
    child: Option<Child>,
}

impl JsonLinesTransport {
    /// Speak to a worker over `reader`/`writer`.
    ///
    /// Must be called inside a tokio runtime; a reader task is spawned.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let inbound = Arc::new(Inbound {
            pending: DashMap::new(),
            sink: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        let reader = tokio::spawn(read_lines(reader, Arc::clone(&inbound)));

        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            inbound,
            reader,
            child: None,
        }
    }

    /// Launch `program` and speak to it over its stdin/stdout.
    ///
    /// The worker's stderr is inherited. The child is killed when the
    /// transport is dropped.
    pub fn spawn(program: &str, args: &[String]) -> GuildResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GuildError::Transport("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GuildError::Transport("worker stdout unavailable".to_string()))?;

        info!(program, pid = child.id(), "Worker process started");
        let mut transport = Self::new(stdout, stdin);
        transport.child = Some(child);
        Ok(transport)
    }

    /// Process id of the spawned worker, if any.
    pub fn worker_pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub fn is_closed(&self) -> bool {
        self.inbound.closed.load(Ordering::Acquire)
    }

    async fn write_line(&self, request: &WorkerRequest) -> GuildResult<()> {
        let mut line = serde_json::to_string(&RequestLine {
            line_type: "request",
            request,
        })?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Drop for JsonLinesTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn post_shutdown(sink: &CompletionSink) {
    warn!("Worker stream ended; posting shutdown sentinel");
    if let Err(e) = sink.shutdown() {
        debug!("Shutdown sentinel not queued: {}", e);
    }
}

async fn read_lines<R>(reader: R, inbound: Arc<Inbound>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    inbound.route(&line);
                }
            }
            Ok(None) => {
                warn!("Worker closed its output stream");
                break;
            }
            Err(e) => {
                warn!("Failed to read from worker: {}", e);
                break;
            }
        }
    }
    inbound.close();
}

#[async_trait]
impl WorkerTransport for JsonLinesTransport {
    async fn dispatch(&self, request: WorkerRequest) -> GuildResult<Value> {
        if self.is_closed() {
            return Err(GuildError::Transport("worker connection closed".to_string()));
        }

        let operation_id = request.operation_id.clone();
        let (tx, rx) = oneshot::channel();
        self.inbound.pending.insert(operation_id.clone(), tx);
        let _guard = PendingGuard {
            pending: &self.inbound.pending,
            operation_id: operation_id.clone(),
        };
        if self.is_closed() {
            return Err(GuildError::Transport("worker connection closed".to_string()));
        }

        self.write_line(&request).await?;
        debug!(operation_id = %operation_id, action = %request.action, "Request sent to worker");

        rx.await
            .map_err(|_| GuildError::Transport("worker closed before replying".to_string()))
    }

    fn subscribe(&self, sink: CompletionSink) {
        match self.inbound.sink.lock() {
            Ok(mut slot) => *slot = Some(sink.clone()),
            Err(_) => warn!("Completion sink slot poisoned; subscription ignored"),
        }
        // Set the slot first so a concurrent close cannot miss this sink.
        if self.is_closed() {
            post_shutdown(&sink);
        }
    }
}
