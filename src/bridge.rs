//! Sync/async bridge
//!
//! The terminal front end is a plain blocking loop. Network work (connect,
//! catalog fetch, one agent turn, close) is async. Each session owns one
//! current-thread Tokio runtime, built once and reused for every call, and
//! blocks on it for the duration of a single operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// How long shutdown waits for cancelled tasks to unwind
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors creating the session runtime
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to start async runtime: {0}")]
    Startup(#[from] std::io::Error),
}

/// Session-scoped runtime that runs one future at a time to completion
pub struct SessionRuntime {
    runtime: tokio::runtime::Runtime,
}

impl SessionRuntime {
    pub fn new() -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name("dbt-chat-session")
            .build()?;
        Ok(Self { runtime })
    }

    /// Block the calling thread until `future` completes and return its output.
    ///
    /// Errors inside the output are returned unchanged.
    ///
    /// # Panics
    ///
    /// Must not be called from inside an async context; Tokio refuses to
    /// nest `block_on`.
    pub fn run<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Spawn background work on the session runtime.
    ///
    /// It only makes progress while some `run` call is blocking, and is
    /// cancelled by `shutdown`.
    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Cancel pending work and stop the runtime.
    pub fn shutdown(self) {
        self.runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
        tracing::debug!("Session runtime stopped");
    }
}

/// Settle the result of a teardown step.
///
/// Failures accepted by `is_benign` are expected while tearing down and are
/// only logged at debug level; anything else is logged as a warning. Neither
/// is returned to the caller.
pub fn settle_teardown<E: Display>(
    step: &str,
    result: Result<(), E>,
    is_benign: impl Fn(&E) -> bool,
) {
    match result {
        Ok(()) => {}
        Err(e) if is_benign(&e) => tracing::debug!("Ignoring benign {} failure: {}", step, e),
        Err(e) => tracing::warn!("{} failed: {}", step, e),
    }
}
