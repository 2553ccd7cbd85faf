use std::sync::Arc;

use core_dataapi::{DataApiService, ExecuteStatementRequest, StatementId, StatementTarget};
use snafu::ResultExt;

use crate::error::{self as driver_error, DriverResult};
use crate::models::QueryContext;

/// Sends SQL to the remote service. Submissions are never retried.
#[derive(Clone)]
pub struct StatementSubmitter {
    service: Arc<dyn DataApiService>,
    with_event: bool,
}

impl StatementSubmitter {
    #[must_use]
    pub fn new(service: Arc<dyn DataApiService>, with_event: bool) -> Self {
        Self {
            service,
            with_event,
        }
    }

    #[tracing::instrument(
        name = "StatementSubmitter::execute",
        level = "debug",
        skip(self, ctx, target),
        fields(database = %target.database),
        err
    )]
    pub async fn execute(
        &self,
        ctx: &QueryContext,
        sql: &str,
        target: &StatementTarget,
    ) -> DriverResult<StatementId> {
        let request =
            ExecuteStatementRequest::new(sql, target.clone()).with_event(self.with_event);
        let id = ctx
            .guard(self.service.execute_statement(&request))
            .await?
            .context(driver_error::SubmissionSnafu)?;
        tracing::debug!(statement_id = %id, "Statement submitted");
        Ok(id)
    }
}
