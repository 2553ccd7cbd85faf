use std::collections::VecDeque;
use std::sync::Arc;

use core_dataapi::{ColumnMetadata, DataApiService, Field, ResultPage, StatementId};
use futures::Stream;
use snafu::ResultExt;

use crate::decoder::{self, NativeType, Value};
use crate::error::{self as driver_error, DriverResult};
use crate::models::QueryContext;

/// Pull-based iterator over the rows of a finished statement.
///
/// Pages are fetched lazily by continuation token. A page may be empty and
/// still carry a token, so only a missing token ends the stream. Column
/// metadata comes from the first page and stays fixed. Not meant for
/// concurrent `next` calls.
pub struct Rows {
    service: Arc<dyn DataApiService>,
    ctx: QueryContext,
    statement_id: StatementId,
    columns: Vec<ColumnMetadata>,
    buffer: VecDeque<Vec<Field>>,
    next_token: Option<String>,
    done: bool,
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("statement_id", &self.statement_id)
            .field("columns", &self.columns)
            .field("buffered", &self.buffer.len())
            .field("next_token", &self.next_token)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Rows {
    /// Fetches the first page. Fails if that fetch fails.
    #[tracing::instrument(name = "Rows::open", level = "debug", skip(service, ctx), err)]
    pub async fn open(
        service: Arc<dyn DataApiService>,
        ctx: &QueryContext,
        statement_id: StatementId,
    ) -> DriverResult<Self> {
        let mut rows = Self {
            service,
            ctx: ctx.clone(),
            statement_id,
            columns: Vec::new(),
            buffer: VecDeque::new(),
            next_token: None,
            done: false,
        };
        let page = rows.fetch_page(None).await?;
        rows.absorb(page);
        Ok(rows)
    }

    async fn fetch_page(&self, next_token: Option<String>) -> DriverResult<ResultPage> {
        tracing::trace!(statement_id = %self.statement_id, ?next_token, "Fetching result page");
        self.ctx
            .guard(
                self.service
                    .get_statement_result(&self.statement_id, next_token),
            )
            .await?
            .context(driver_error::FetchResultSnafu {
                id: &self.statement_id,
            })
    }

    fn absorb(&mut self, page: ResultPage) {
        if self.columns.is_empty() {
            self.columns = page.columns;
        }
        self.buffer.extend(page.records);
        self.next_token = page.next_token.filter(|token| !token.is_empty());
    }

    /// Next decoded row, or `None` at the end of the stream.
    pub async fn next(&mut self) -> DriverResult<Option<Vec<Value>>> {
        loop {
            if self.done {
                return Ok(None);
            }
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(decoder::decode_row(&self.columns, &record)?));
            }
            let Some(token) = self.next_token.take() else {
                self.done = true;
                return Ok(None);
            };
            let page = self.fetch_page(Some(token)).await?;
            self.absorb(page);
        }
    }

    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn column_metadata(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    #[must_use]
    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    #[must_use]
    pub fn is_nullable(&self, index: usize) -> Option<bool> {
        self.columns.get(index).map(|c| c.nullable)
    }

    #[must_use]
    pub fn native_type(&self, index: usize) -> Option<NativeType> {
        self.columns.get(index).map(decoder::native_type_of)
    }

    #[must_use]
    pub fn database_type_name(&self, index: usize) -> Option<&'static str> {
        self.columns.get(index).map(decoder::database_type_name_of)
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.done
    }

    /// Marks the iterator exhausted. Safe to call more than once.
    pub fn close(&mut self) {
        self.done = true;
        self.buffer.clear();
        self.next_token = None;
    }

    pub fn into_stream(self) -> impl Stream<Item = DriverResult<Vec<Value>>> + Send {
        futures::stream::try_unfold(self, |mut rows| async move {
            Ok(rows.next().await?.map(|row| (row, rows)))
        })
    }
}
