use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub type StatementId = String;

/// Lifecycle of a statement as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Submitted,
    Picked,
    Started,
    Finished,
    Failed,
    Aborted,
}

impl StatementState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Aborted)
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        !self.is_terminal()
    }

    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementDescription {
    pub id: StatementId,
    pub state: StatementState,
    /// Only meaningful when `state` is a terminal failure.
    pub error: Option<String>,
}

impl StatementDescription {
    #[must_use]
    pub fn new(id: impl Into<StatementId>, state: StatementState) -> Self {
        Self {
            id: id.into(),
            state,
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Where a statement runs: a provisioned cluster or a serverless workgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Compute {
    Cluster { identifier: String },
    Workgroup { name: String },
}

/// Who the statement runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Identity {
    ManagedSecret {
        arn: String,
    },
    /// `db_user` is `None` when the caller's IAM identity is used (serverless).
    TemporaryCredentials {
        db_user: Option<String>,
    },
}

/// Connection-target parameters. Exactly one compute and one identity path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementTarget {
    pub database: String,
    pub compute: Compute,
    pub identity: Identity,
}

impl StatementTarget {
    #[must_use]
    pub fn cluster_identifier(&self) -> Option<&str> {
        match &self.compute {
            Compute::Cluster { identifier } => Some(identifier),
            Compute::Workgroup { .. } => None,
        }
    }

    #[must_use]
    pub fn workgroup_name(&self) -> Option<&str> {
        match &self.compute {
            Compute::Workgroup { name } => Some(name),
            Compute::Cluster { .. } => None,
        }
    }

    #[must_use]
    pub fn secret_arn(&self) -> Option<&str> {
        match &self.identity {
            Identity::ManagedSecret { arn } => Some(arn),
            Identity::TemporaryCredentials { .. } => None,
        }
    }

    #[must_use]
    pub fn db_user(&self) -> Option<&str> {
        match &self.identity {
            Identity::TemporaryCredentials { db_user } => db_user.as_deref(),
            Identity::ManagedSecret { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteStatementRequest {
    pub sql: String,
    pub target: StatementTarget,
    pub with_event: bool,
}

impl ExecuteStatementRequest {
    #[must_use]
    pub fn new(sql: impl Into<String>, target: StatementTarget) -> Self {
        Self {
            sql: sql.into(),
            target,
            with_event: false,
        }
    }

    #[must_use]
    pub const fn with_event(mut self, with_event: bool) -> Self {
        self.with_event = with_event;
        self
    }
}
