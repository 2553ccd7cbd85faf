use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use core_dataapi::{DataApiService, StatementId, StatementTarget};

use crate::backoff::BackoffPolicy;
use crate::cancel;
use crate::error::{self as driver_error, DriverResult};
use crate::models::{QueryContext, QueryStatus};
use crate::poller::StatusPoller;
use crate::rows::Rows;
use crate::statement::StatementSubmitter;

pub const PING_SQL: &str = "SELECT 1";

/// Job-handle contract for schedulers that poll many statements themselves.
#[async_trait::async_trait]
pub trait AsyncDb: Send + Sync {
    async fn start_query(&self, ctx: &QueryContext, sql: &str) -> DriverResult<StatementId>;
    /// Id of a statement already running `sql`, if the backend can tell.
    async fn get_query_id(&self, ctx: &QueryContext, sql: &str)
    -> DriverResult<Option<StatementId>>;
    async fn query_status(&self, ctx: &QueryContext, id: &str) -> DriverResult<QueryStatus>;
    async fn cancel_query(&self, ctx: &QueryContext, id: &str) -> DriverResult<()>;
    async fn get_rows(&self, ctx: &QueryContext, id: &str) -> DriverResult<Rows>;
}

/// A driver connection bound to one statement target.
pub struct Connection {
    name: String,
    service: Arc<dyn DataApiService>,
    target: StatementTarget,
    submitter: StatementSubmitter,
    poller: StatusPoller,
    closed: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connection {
    #[must_use]
    pub fn new(
        name: String,
        service: Arc<dyn DataApiService>,
        target: StatementTarget,
        with_event: bool,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            name,
            submitter: StatementSubmitter::new(service.clone(), with_event),
            poller: StatusPoller::new(service.clone(), policy),
            service,
            target,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn target(&self) -> &StatementTarget {
        &self.target
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.is_closed() {
            return driver_error::ConnectionClosedSnafu.fail();
        }
        Ok(())
    }

    /// Submits `sql`, waits for it to finish and opens its rows.
    #[tracing::instrument(
        name = "Connection::query",
        level = "debug",
        skip(self, ctx),
        fields(connection = %self.name),
        err
    )]
    pub async fn query(&self, ctx: &QueryContext, sql: &str) -> DriverResult<Rows> {
        self.ensure_open()?;
        let id = self.submitter.execute(ctx, sql, &self.target).await?;
        self.poller.wait(ctx, &id).await?;
        Rows::open(self.service.clone(), ctx, id).await
    }

    #[tracing::instrument(
        name = "Connection::ping",
        level = "debug",
        skip(self, ctx),
        fields(connection = %self.name),
        err
    )]
    pub async fn ping(&self, ctx: &QueryContext) -> DriverResult<()> {
        let mut rows = self.query(ctx, PING_SQL).await?;
        rows.close();
        Ok(())
    }

    pub fn begin(&self) -> DriverResult<Infallible> {
        driver_error::NotSupportedSnafu {
            feature: "begin statements",
        }
        .fail()
    }

    pub fn prepare(&self, _sql: &str) -> DriverResult<Infallible> {
        driver_error::NotSupportedSnafu {
            feature: "prepared statements",
        }
        .fail()
    }

    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(connection = %self.name, "Connection closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl AsyncDb for Connection {
    #[tracing::instrument(
        name = "AsyncDb::start_query",
        level = "debug",
        skip(self, ctx),
        fields(connection = %self.name),
        err
    )]
    async fn start_query(&self, ctx: &QueryContext, sql: &str) -> DriverResult<StatementId> {
        self.ensure_open()?;
        self.submitter.execute(ctx, sql, &self.target).await
    }

    async fn get_query_id(
        &self,
        _ctx: &QueryContext,
        _sql: &str,
    ) -> DriverResult<Option<StatementId>> {
        // Statements cannot be looked up by SQL text.
        Ok(None)
    }

    #[tracing::instrument(
        name = "AsyncDb::query_status",
        level = "debug",
        skip(self, ctx),
        fields(connection = %self.name),
        err
    )]
    async fn query_status(&self, ctx: &QueryContext, id: &str) -> DriverResult<QueryStatus> {
        self.ensure_open()?;
        let description = self.poller.status(ctx, id).await?;
        let status = QueryStatus::from(&description);
        tracing::debug!(statement_id = id, state = %description.state, %status, "Query status");
        Ok(status)
    }

    #[tracing::instrument(
        name = "AsyncDb::cancel_query",
        level = "debug",
        skip(self, ctx),
        fields(connection = %self.name),
        err
    )]
    async fn cancel_query(&self, ctx: &QueryContext, id: &str) -> DriverResult<()> {
        self.ensure_open()?;
        cancel::cancel_statement(self.service.as_ref(), ctx, id).await
    }

    #[tracing::instrument(
        name = "AsyncDb::get_rows",
        level = "debug",
        skip(self, ctx),
        fields(connection = %self.name),
        err
    )]
    async fn get_rows(&self, ctx: &QueryContext, id: &str) -> DriverResult<Rows> {
        self.ensure_open()?;
        Rows::open(self.service.clone(), ctx, id.to_string()).await
    }
}
