#![allow(clippy::unwrap_used, clippy::expect_used)]


mod poller;

use async_trait::async_trait;
use core_dataapi::{
    DataApiResult, DataApiService, ExecuteStatementRequest, ResultPage, StatementDescription,
    StatementId,
};
use mockall::mock;

mock! {
    pub DataApi {}

    #[async_trait]
    impl DataApiService for DataApi {
        async fn execute_statement(&self, request: &ExecuteStatementRequest) -> DataApiResult<StatementId>;
        async fn describe_statement(&self, id: &str) -> DataApiResult<StatementDescription>;
        async fn cancel_statement(&self, id: &str) -> DataApiResult<()>;
        async fn get_statement_result(&self, id: &str, next_token: Option<String>) -> DataApiResult<ResultPage>;
    }
}
