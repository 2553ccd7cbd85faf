use core_dataapi::{DataApiError, DataApiService};
use snafu::ResultExt;

use crate::error::{self as driver_error, DriverResult};
use crate::models::QueryContext;

/// Remote wording for cancelling a statement that already completed.
/// The service offers no structured code for this case.
pub const ALREADY_FINISHED_MESSAGE: &str = "already in FINISHED state";

/// Whether a cancel failure only means the statement completed first.
#[must_use]
pub fn is_already_finished(err: &DataApiError) -> bool {
    err.remote_message()
        .is_some_and(|message| message.contains(ALREADY_FINISHED_MESSAGE))
}

#[tracing::instrument(name = "cancel_statement", level = "debug", skip(service, ctx), err)]
pub async fn cancel_statement(
    service: &dyn DataApiService,
    ctx: &QueryContext,
    id: &str,
) -> DriverResult<()> {
    match ctx.guard(service.cancel_statement(id)).await? {
        Err(err) if is_already_finished(&err) => {
            tracing::debug!(statement_id = id, "Statement already finished, nothing to cancel");
            Ok(())
        }
        res => res.context(driver_error::CancelSnafu { id }),
    }
}
