use std::sync::Arc;

use core_dataapi::{DataApiService, StatementDescription, StatementState};
use snafu::ResultExt;

use crate::backoff::BackoffPolicy;
use crate::error::{self as driver_error, DriverResult};
use crate::models::QueryContext;

/// Drives a statement to a terminal state, waiting with exponential backoff
/// between status calls.
#[derive(Clone)]
pub struct StatusPoller {
    service: Arc<dyn DataApiService>,
    policy: BackoffPolicy,
}

impl StatusPoller {
    #[must_use]
    pub fn new(service: Arc<dyn DataApiService>, policy: BackoffPolicy) -> Self {
        Self { service, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// One status call, without interpreting the state.
    pub async fn status(&self, ctx: &QueryContext, id: &str) -> DriverResult<StatementDescription> {
        ctx.guard(self.service.describe_statement(id))
            .await?
            .context(driver_error::PollTransportSnafu { id })
    }

    /// Polls immediately, then after each non-terminal answer waits the next
    /// backoff delay. Interruption leaves the remote statement untouched.
    #[tracing::instrument(name = "StatusPoller::wait", level = "debug", skip(self, ctx), err)]
    pub async fn wait(&self, ctx: &QueryContext, id: &str) -> DriverResult<()> {
        let mut backoff = self.policy.start();
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let description = self.status(ctx, id).await?;
            match description.state {
                StatementState::Finished => {
                    tracing::debug!(statement_id = id, attempt, "Statement finished");
                    return Ok(());
                }
                state @ (StatementState::Failed | StatementState::Aborted) => {
                    return driver_error::StatementFailedSnafu {
                        id,
                        state,
                        reason: description.error.unwrap_or_default(),
                    }
                    .fail();
                }
                state => {
                    let delay = backoff.next_delay();
                    tracing::trace!(
                        statement_id = id,
                        %state,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Statement still running"
                    );
                    ctx.guard(tokio::time::sleep(delay)).await?;
                }
            }
        }
    }
}
