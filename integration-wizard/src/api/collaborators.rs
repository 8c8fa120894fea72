// External collaborators of the wizard engine.
//
// The engine never talks to the network itself. Submission, edit-mode fetches and user
// notifications go through the traits below; hosts plug in their HTTP client and toast
// layer, tests plug in stubs.

use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::flows::FlowKind;
use crate::payload::SubmissionPayload;
use crate::utils::logging::mask_secrets_in_json;

/// Error returned by the submission collaborator.
/// Keeps the user-facing message separate from internal details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{user_message}")]
pub struct SubmissionError {
    /// Safe to show in the UI
    pub user_message: String,
    /// For logs only
    pub internal_details: String,
}

impl SubmissionError {
    pub fn new(user_message: impl Into<String>, internal_details: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            internal_details: internal_details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{kind} integration '{id}' was not found")]
    NotFound { kind: FlowKind, id: String },

    #[error("{kind} integrations cannot be opened for editing")]
    Unsupported { kind: FlowKind },

    #[error("failed to load {kind} integration '{id}': {details}")]
    Backend {
        kind: FlowKind,
        id: String,
        details: String,
    },
}

/// Terminal submission call. Invoked once per submit attempt.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmissionError>;
}

/// Loads an existing backend record for edit mode.
#[async_trait]
pub trait IntegrationFetcher: Send + Sync {
    async fn fetch_existing(&self, kind: FlowKind, id: &str) -> Result<Value, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub detail: String,
    pub severity: Severity,
    pub duration_ms: u64,
}

/// Opaque user-notification sink (snackbar, toast, terminal line).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Routes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Error => error!(
                "[PHASE: notification] {}: {} ({}ms)",
                n.title, n.detail, n.duration_ms
            ),
            Severity::Warning => warn!(
                "[PHASE: notification] {}: {} ({}ms)",
                n.title, n.detail, n.duration_ms
            ),
            Severity::Success | Severity::Info => info!(
                "[PHASE: notification] {}: {} ({}ms)",
                n.title, n.detail, n.duration_ms
            ),
        }
    }
}

/// Submitter that records payloads instead of sending them.
///
/// `failing(n)` rejects the first `n` attempts, which is how retry paths are exercised
/// without a backend.
#[derive(Debug, Default)]
pub struct DryRunSubmitter {
    failures_remaining: AtomicU32,
    call_count: AtomicU32,
    recorded: Mutex<Vec<SubmissionPayload>>,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(times),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Payloads that were accepted, in submission order.
    pub fn recorded(&self) -> Vec<SubmissionPayload> {
        match self.recorded.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Submitter for DryRunSubmitter {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmissionError> {
        let attempt = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "[PHASE: submission] [STEP: dry_run] attempt={} {} {} body={}",
            attempt,
            payload.method(),
            payload.path(),
            mask_secrets_in_json(payload.body())
        );

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(SubmissionError::new(
                "The integration service is unavailable. Please try again.",
                format!("dry-run failure injected on attempt {}", attempt),
            ));
        }

        match self.recorded.lock() {
            Ok(mut guard) => guard.push(payload.clone()),
            Err(poisoned) => poisoned.into_inner().push(payload.clone()),
        }
        Ok(())
    }
}
