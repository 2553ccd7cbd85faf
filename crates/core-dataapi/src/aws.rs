use std::str::FromStr;

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_redshiftdata::Client;
use aws_sdk_redshiftdata::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_redshiftdata::types as sdk;

use crate::error::{self as dataapi_error, DataApiError, DataApiResult};
use crate::models::{
    ColumnMetadata, ExecuteStatementRequest, Field, ResultPage, StatementDescription,
    StatementId, StatementState,
};
use crate::service::DataApiService;
use crate::settings::DataSourceSettings;

/// [`DataApiService`] backed by the AWS Redshift Data API.
#[derive(Debug, Clone)]
pub struct RedshiftDataClient {
    client: Client,
}

impl RedshiftDataClient {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds an SDK client from the region, endpoint override and static
    /// keys of the data source. Without keys the default provider chain is used.
    pub async fn from_settings(settings: &DataSourceSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = settings.effective_region() {
            loader = loader.region(Region::new(region.to_string()));
        }
        if let Some(endpoint) = settings.endpoint.as_deref().filter(|e| !e.is_empty()) {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            loader = loader.credentials_provider(Credentials::from_keys(
                access_key.clone(),
                secret_key.clone(),
                None,
            ));
        }
        let config = loader.load().await;
        tracing::debug!(region = ?config.region(), "Redshift Data API client configured");
        Self::new(Client::new(&config))
    }
}

fn service_error<E>(operation: &'static str, err: &SdkError<E>) -> DataApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    DataApiError::Service {
        operation,
        code: err.code().map(ToString::to_string),
        message: err
            .message()
            .map_or_else(|| DisplayErrorContext(err).to_string(), ToString::to_string),
    }
}

fn parse_state(status: &str) -> DataApiResult<StatementState> {
    StatementState::from_str(status).map_err(|_| DataApiError::Service {
        operation: "DescribeStatement",
        code: None,
        message: format!("unexpected statement status {status}"),
    })
}

fn convert_column(column: &sdk::ColumnMetadata) -> ColumnMetadata {
    ColumnMetadata {
        name: column.name().unwrap_or_default().to_string(),
        type_name: column.type_name().map(ToString::to_string),
        nullable: column.nullable() != 0,
    }
}

fn convert_field(field: &sdk::Field) -> Field {
    match field {
        sdk::Field::IsNull(v) => Field::IsNull(*v),
        sdk::Field::LongValue(v) => Field::LongValue(*v),
        sdk::Field::DoubleValue(v) => Field::DoubleValue(*v),
        sdk::Field::StringValue(v) => Field::StringValue(v.clone()),
        sdk::Field::BooleanValue(v) => Field::BooleanValue(*v),
        sdk::Field::BlobValue(v) => Field::BlobValue(v.as_ref().to_vec()),
        _ => {
            tracing::warn!("result field of unknown kind");
            Field::Unknown
        }
    }
}

#[async_trait::async_trait]
impl DataApiService for RedshiftDataClient {
    #[tracing::instrument(
        name = "RedshiftDataClient::execute_statement",
        level = "debug",
        skip(self, request),
        fields(database = %request.target.database),
        err
    )]
    async fn execute_statement(
        &self,
        request: &ExecuteStatementRequest,
    ) -> DataApiResult<StatementId> {
        let target = &request.target;
        let output = self
            .client
            .execute_statement()
            .sql(&request.sql)
            .database(&target.database)
            .set_cluster_identifier(target.cluster_identifier().map(ToString::to_string))
            .set_workgroup_name(target.workgroup_name().map(ToString::to_string))
            .set_secret_arn(target.secret_arn().map(ToString::to_string))
            .set_db_user(target.db_user().map(ToString::to_string))
            .with_event(request.with_event)
            .send()
            .await
            .map_err(|e| service_error("ExecuteStatement", &e))?;
        output.id().map(ToString::to_string).ok_or_else(|| {
            dataapi_error::MissingFieldSnafu {
                operation: "ExecuteStatement",
                field: "id",
            }
            .build()
        })
    }

    #[tracing::instrument(
        name = "RedshiftDataClient::describe_statement",
        level = "debug",
        skip(self),
        err
    )]
    async fn describe_statement(&self, id: &str) -> DataApiResult<StatementDescription> {
        let output = self
            .client
            .describe_statement()
            .id(id)
            .send()
            .await
            .map_err(|e| service_error("DescribeStatement", &e))?;
        let status = output.status().ok_or_else(|| {
            dataapi_error::MissingFieldSnafu {
                operation: "DescribeStatement",
                field: "status",
            }
            .build()
        })?;
        Ok(StatementDescription {
            id: id.to_string(),
            state: parse_state(status.as_str())?,
            error: output.error().map(ToString::to_string),
        })
    }

    #[tracing::instrument(
        name = "RedshiftDataClient::cancel_statement",
        level = "debug",
        skip(self),
        err
    )]
    async fn cancel_statement(&self, id: &str) -> DataApiResult<()> {
        self.client
            .cancel_statement()
            .id(id)
            .send()
            .await
            .map_err(|e| service_error("CancelStatement", &e))?;
        Ok(())
    }

    #[tracing::instrument(
        name = "RedshiftDataClient::get_statement_result",
        level = "debug",
        skip(self),
        err
    )]
    async fn get_statement_result(
        &self,
        id: &str,
        next_token: Option<String>,
    ) -> DataApiResult<ResultPage> {
        let output = self
            .client
            .get_statement_result()
            .id(id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| service_error("GetStatementResult", &e))?;
        Ok(ResultPage {
            columns: output.column_metadata().iter().map(convert_column).collect(),
            records: output
                .records()
                .iter()
                .map(|row| row.iter().map(convert_field).collect())
                .collect(),
            next_token: output.next_token().map(ToString::to_string),
            total_num_rows: Some(output.total_num_rows()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_redshiftdata::primitives::Blob;

    #[test]
    fn test_convert_column() {
        let column = sdk::ColumnMetadata::builder()
            .name("time")
            .type_name("int4")
            .nullable(1)
            .build();
        assert_eq!(convert_column(&column), ColumnMetadata::new("time", "int4"));

        let untyped = convert_column(&sdk::ColumnMetadata::builder().name("x").build());
        assert_eq!(untyped.type_name, None);
        assert!(!untyped.nullable);
    }

    #[test]
    fn test_convert_field() {
        assert_eq!(
            convert_field(&sdk::Field::LongValue(3)),
            Field::LongValue(3)
        );
        assert_eq!(
            convert_field(&sdk::Field::StringValue("s".to_string())),
            Field::StringValue("s".to_string())
        );
        assert_eq!(
            convert_field(&sdk::Field::BlobValue(Blob::new(vec![1, 2]))),
            Field::BlobValue(vec![1, 2])
        );
        assert_eq!(convert_field(&sdk::Field::IsNull(true)), Field::IsNull(true));
    }

    #[test]
    fn test_parse_state() {
        assert_eq!(
            parse_state(sdk::StatusString::Aborted.as_str()).ok(),
            Some(StatementState::Aborted)
        );
        assert_eq!(
            parse_state("STARTED").ok(),
            Some(StatementState::Started)
        );
        assert!(parse_state("ALL").is_err());
    }

    #[tokio::test]
    async fn test_from_settings_uses_static_keys() {
        let settings = DataSourceSettings {
            region: "us-east-2".to_string(),
            access_key: Some("AK".to_string()),
            secret_key: Some("SK".to_string()),
            ..Default::default()
        };
        let client = RedshiftDataClient::from_settings(&settings).await;
        assert_eq!(
            client.client.config().region().map(ToString::to_string),
            Some("us-east-2".to_string())
        );
    }
}
