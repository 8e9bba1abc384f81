//! Bridge between the host and the sandboxed Python worker.
//!
//! The worker itself is an external collaborator: it receives a source
//! string and an input payload and answers with an output payload or an
//! error. This crate owns the wire contract and the host-side plumbing —
//! requests flow over channels so a fault in user code can take down the
//! worker without touching the host.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

/// Default deadline for a single execution request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A request to execute Python code in the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub id: Ulid,
    pub code: String,
    pub input: serde_json::Value,
}

impl ExecuteRequest {
    pub fn new(code: impl Into<String>, input: serde_json::Value) -> Self {
        Self { id: Ulid::new(), code: code.into(), input }
    }
}

/// The worker's answer to an [`ExecuteRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteReply {
    Output { output: serde_json::Value },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("python worker did not answer within {0:?}")]
    Timeout(Duration),
    #[error("python worker is gone")]
    WorkerGone,
}

struct Job {
    request: ExecuteRequest,
    reply: oneshot::Sender<ExecuteReply>,
}

/// Host-side handle to a Python worker.
///
/// Cloneable; all clones feed the same worker. When the worker dies the
/// channel closes and every in-flight request resolves to
/// [`BridgeError::WorkerGone`].
#[derive(Clone)]
pub struct WorkerHandle {
    jobs: mpsc::Sender<Job>,
    timeout: Duration,
}

impl WorkerHandle {
    /// Spawn a worker on its own thread. The executor closure stands in for
    /// the sandboxed interpreter; it sees one request at a time.
    pub fn spawn<F>(mut executor: F) -> Self
    where
        F: FnMut(ExecuteRequest) -> ExecuteReply + Send + 'static,
    {
        let (jobs, mut inbox) = mpsc::channel::<Job>(32);
        thread::spawn(move || {
            while let Some(job) = inbox.blocking_recv() {
                let reply = executor(job.request);
                // The caller may have timed out and dropped the receiver.
                let _ = job.reply.send(reply);
            }
        });
        Self { jobs, timeout: DEFAULT_TIMEOUT }
    }

    /// Override the per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request to the worker and await its reply.
    ///
    /// A request that outlives the deadline is abandoned; the worker is
    /// considered wedged and replaceable at that point.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteReply, BridgeError> {
        let id = request.id;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.jobs
            .send(Job { request, reply: reply_tx })
            .await
            .map_err(|_| BridgeError::WorkerGone)?;
        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                tracing::warn!(%id, "python worker dropped a request");
                Err(BridgeError::WorkerGone)
            }
            Err(_) => {
                tracing::warn!(%id, timeout = ?self.timeout, "python execution timed out");
                Err(BridgeError::Timeout(self.timeout))
            }
        }
    }
}

/// A worker that echoes its input back; used in tests and as a stand-in
/// until a real sandbox is attached.
pub fn spawn_echo_worker() -> WorkerHandle {
    WorkerHandle::spawn(|request| ExecuteReply::Output { output: request.input })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn echo_worker_round_trip() {
        let worker = spawn_echo_worker();
        let reply = worker
            .execute(ExecuteRequest::new("print(x)", json!({"x": 1})))
            .await
            .unwrap();
        assert_eq!(reply, ExecuteReply::Output { output: json!({"x": 1}) });
    }

    #[tokio::test]
    async fn user_error_comes_back_as_reply() {
        let worker = WorkerHandle::spawn(|_| ExecuteReply::Error {
            message: "NameError: name 'x' is not defined".to_owned(),
        });
        let reply = worker
            .execute(ExecuteRequest::new("print(x)", json!(null)))
            .await
            .unwrap();
        assert!(matches!(reply, ExecuteReply::Error { .. }));
    }

    #[tokio::test]
    async fn worker_panic_does_not_crash_the_host() {
        let worker = WorkerHandle::spawn(|_| panic!("interpreter blew up"));
        let error = worker
            .execute(ExecuteRequest::new("1/0", json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(error, BridgeError::WorkerGone));
    }

    #[tokio::test]
    async fn slow_worker_times_out() {
        let worker = WorkerHandle::spawn(|request| {
            thread::sleep(Duration::from_millis(200));
            ExecuteReply::Output { output: request.input }
        })
        .with_timeout(Duration::from_millis(10));
        let error = worker
            .execute(ExecuteRequest::new("while True: pass", json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(error, BridgeError::Timeout(_)));
    }

    #[test]
    fn request_wire_format_is_stable() {
        let reply: ExecuteReply =
            serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        assert_eq!(reply, ExecuteReply::Error { message: "boom".to_owned() });
    }
}
