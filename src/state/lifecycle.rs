//! The request lifecycle wrapper.
//!
//! Every fallible editor and generation action runs through
//! [`StateManager::with_loading`], which owns the global busy flag, the status
//! label and the error banner for the duration of the call.

use super::StateManager;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

/// Banner text when a wrapped operation fails with an empty message
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Banner text when a chat send fails with an empty message
pub const CHAT_FALLBACK_ERROR_MESSAGE: &str = "Error in chat.";

/// Render an error for the banner, substituting `fallback` for a blank message
pub fn error_message(err: &impl Display, fallback: &str) -> String {
    let message = err.to_string();
    let trimmed = message.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

impl StateManager {
    /// Run `action` as the single in-flight operation.
    ///
    /// Sets `busy` and the status `label` and clears any prior error, then awaits
    /// the action. A failure is logged and becomes the error banner. Busy and label
    /// are cleared afterwards regardless of the outcome.
    ///
    /// Mutual exclusion is not enforced here; the view disables its triggers while
    /// [`AppState::is_busy`](crate::models::AppState::is_busy) is true.
    ///
    /// # Arguments
    /// * `label` - Status text shown while the action runs
    /// * `action` - Zero-argument async operation
    ///
    /// # Returns
    /// `Some(value)` on success, `None` on failure
    pub async fn with_loading<T, E, F, Fut>(&self, label: impl Into<String>, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let label = label.into();
        tracing::info!("{}", label);
        self.metrics.record_operation_started();

        self.update(|state| {
            state.status.busy = true;
            state.status.label = label.clone();
            state.status.error = None;
        });

        let started = Instant::now();
        let result = action().await;
        self.metrics.record_operation_time(started.elapsed());

        let (value, failure) = match result {
            Ok(value) => (Some(value), None),
            Err(err) => {
                let message = error_message(&err, FALLBACK_ERROR_MESSAGE);
                tracing::error!("{} failed: {}", label.trim_end_matches("..."), message);
                self.metrics.record_operation_failed();
                (None, Some(message))
            }
        };

        self.update(|state| {
            state.status.busy = false;
            state.status.label.clear();
            if failure.is_some() {
                state.status.error = failure;
            }
        });

        value
    }
}
