use crate::error::DataApiResult;
use crate::models::{ExecuteStatementRequest, ResultPage, StatementDescription, StatementId};

/// Remote statement-oriented SQL service.
///
/// Statements are submitted and identified by an opaque id; completion is
/// discovered with [`DataApiService::describe_statement`] and results are
/// fetched afterwards page by page.
#[async_trait::async_trait]
pub trait DataApiService: Send + Sync {
    async fn execute_statement(
        &self,
        request: &ExecuteStatementRequest,
    ) -> DataApiResult<StatementId>;

    async fn describe_statement(&self, id: &str) -> DataApiResult<StatementDescription>;

    async fn cancel_statement(&self, id: &str) -> DataApiResult<()>;

    async fn get_statement_result(
        &self,
        id: &str,
        next_token: Option<String>,
    ) -> DataApiResult<ResultPage>;
}
