//! Code execution behind the license gate.
//!
//! All thinc and Python runs funnel through [`Dispatcher`], which checks
//! the caller's license status before any interpreter sees the code. A
//! non-active user is refused up front; the Python worker never receives
//! the request.

use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;

use rocthinc_bridge::{BridgeError, ExecuteReply, ExecuteRequest, WorkerHandle};
use rocthinc_license::{Action, Denied, LicenseError, LicenseStore, authorize};
use thinc::engine::{EngineError, RunOutcome};
use thinc::Canvas;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Denied(#[from] Denied),
    #[error(transparent)]
    License(#[from] LicenseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("python error: {0}")]
    Python(String),
}

/// Gated entry point for everything that executes user code.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<LicenseStore>,
    python: WorkerHandle,
}

impl Dispatcher {
    pub fn new(store: Arc<LicenseStore>, python: WorkerHandle) -> Self {
        Self { store, python }
    }

    fn gate(&self, user_email: &str, action: Action) -> Result<(), ExecuteError> {
        let status = self.store.status(user_email)?;
        authorize(status, action)?;
        Ok(())
    }

    /// Run a thinc program against a canvas on behalf of a user.
    pub fn run_thinc(
        &self,
        user_email: &str,
        canvas: &mut Canvas,
        filename: &str,
        code: &str,
    ) -> Result<RunOutcome, ExecuteError> {
        self.gate(user_email, Action::RunThinc)?;
        Ok(thinc::run(canvas, filename, code)?)
    }

    /// Run a named code block already on the canvas.
    pub fn run_block(
        &self,
        user_email: &str,
        canvas: &mut Canvas,
        name: &str,
    ) -> Result<RunOutcome, ExecuteError> {
        self.gate(user_email, Action::RunThinc)?;
        Ok(thinc::run_block(canvas, name)?)
    }

    /// Send Python code to the sandboxed worker on behalf of a user.
    pub async fn run_python(
        &self,
        user_email: &str,
        code: &str,
        input: Json,
    ) -> Result<Json, ExecuteError> {
        self.gate(user_email, Action::RunPython)?;
        match self.python.execute(ExecuteRequest::new(code, input)).await? {
            ExecuteReply::Output { output } => Ok(output),
            ExecuteReply::Error { message } => Err(ExecuteError::Python(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use rocthinc_license::LicenseStatus;
    use serde_json::json;

    fn dispatcher_with_counter() -> (Dispatcher, Arc<LicenseStore>, Arc<AtomicUsize>) {
        let store = Arc::new(LicenseStore::open_in_memory().unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let worker = WorkerHandle::spawn(move |request| {
            seen.fetch_add(1, Ordering::SeqCst);
            ExecuteReply::Output { output: request.input }
        });
        (Dispatcher::new(Arc::clone(&store), worker), store, calls)
    }

    #[tokio::test]
    async fn unlicensed_user_never_reaches_the_worker() {
        let (dispatcher, _store, calls) = dispatcher_with_counter();
        let error = dispatcher
            .run_python("stranger@example.com", "print(1)", json!(null))
            .await
            .unwrap_err();
        assert!(matches!(error, ExecuteError::Denied(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_user_is_refused() {
        let (dispatcher, store, calls) = dispatcher_with_counter();
        store.record("user@example.com", LicenseStatus::Active, Some("pro")).unwrap();
        store.record("user@example.com", LicenseStatus::Expired, None).unwrap();

        let error = dispatcher
            .run_python("user@example.com", "print(1)", json!(null))
            .await
            .unwrap_err();
        assert!(matches!(error, ExecuteError::Denied(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn active_user_runs_python() {
        let (dispatcher, store, calls) = dispatcher_with_counter();
        store.record("user@example.com", LicenseStatus::Active, Some("pro")).unwrap();

        let output = dispatcher
            .run_python("user@example.com", "output = input", json!({"n": 3}))
            .await
            .unwrap();
        assert_eq!(output, json!({"n": 3}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn python_user_error_surfaces() {
        let store = Arc::new(LicenseStore::open_in_memory().unwrap());
        store.record("user@example.com", LicenseStatus::Active, None).unwrap();
        let worker = WorkerHandle::spawn(|_| ExecuteReply::Error {
            message: "ZeroDivisionError: division by zero".to_owned(),
        });
        let dispatcher = Dispatcher::new(store, worker);

        let error = dispatcher
            .run_python("user@example.com", "1/0", json!(null))
            .await
            .unwrap_err();
        assert!(matches!(error, ExecuteError::Python(_)));
    }

    #[test]
    fn thinc_is_gated_too() {
        let (dispatcher, store, _calls) = dispatcher_with_counter();
        let mut canvas = Canvas::new();

        let error = dispatcher
            .run_thinc("stranger@example.com", &mut canvas, "page.thinc", "1 + 2")
            .unwrap_err();
        assert!(matches!(error, ExecuteError::Denied(_)));

        store.record("user@example.com", LicenseStatus::Active, None).unwrap();
        let outcome = dispatcher
            .run_thinc("user@example.com", &mut canvas, "page.thinc", "1 + 2")
            .unwrap();
        assert_eq!(outcome.result, thinc::Value::Number(3.0));
    }
}
