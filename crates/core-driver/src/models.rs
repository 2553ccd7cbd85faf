use std::future::Future;
use std::time::Duration;

use core_dataapi::{StatementDescription, StatementState};
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a blocking driver call gave up before the remote side answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Interruption {
    #[strum(serialize = "cancelled by caller")]
    Cancelled,
    #[strum(serialize = "deadline exceeded")]
    DeadlineExceeded,
}

/// Caller-side cancellation signal and optional deadline for one call.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Runs `fut` unless the context is cancelled or its deadline passes first.
    /// An already cancelled context never polls `fut`.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interruption> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interruption::Cancelled),
            () = deadline => Err(Interruption::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

/// Statement status as seen by an external scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QueryStatus {
    Submitted,
    Running,
    Finished,
    Failed { reason: String },
    Canceled { reason: String },
}

impl QueryStatus {
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed { .. } | Self::Canceled { .. }
        )
    }
}

impl From<&StatementDescription> for QueryStatus {
    fn from(description: &StatementDescription) -> Self {
        let reason = || description.error.clone().unwrap_or_default();
        match description.state {
            StatementState::Submitted | StatementState::Picked => Self::Submitted,
            StatementState::Started => Self::Running,
            StatementState::Finished => Self::Finished,
            StatementState::Failed => Self::Failed { reason: reason() },
            StatementState::Aborted => Self::Canceled { reason: reason() },
        }
    }
}
