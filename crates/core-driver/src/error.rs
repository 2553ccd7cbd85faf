use core_dataapi::{DataApiError, StatementState};
use snafu::prelude::*;

use crate::models::Interruption;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DriverError {
    #[snafu(display("Statement submission failed: {source}"))]
    Submission { source: DataApiError },

    #[snafu(display("Unable to get status of statement {id}: {source}"))]
    PollTransport { id: String, source: DataApiError },

    /// Displays the remote reason unmodified.
    #[snafu(display("{reason}"))]
    StatementFailed {
        id: String,
        state: StatementState,
        reason: String,
    },

    #[snafu(display("Unable to fetch result of statement {id}: {source}"))]
    FetchResult { id: String, source: DataApiError },

    #[snafu(display("Unable to cancel statement {id}: {source}"))]
    Cancel { id: String, source: DataApiError },

    #[snafu(transparent)]
    Decode { source: DecodeError },

    #[snafu(display("Query interrupted: {cause}"))]
    Interrupted { cause: Interruption },

    #[snafu(display("redshift driver doesn't support {feature}"))]
    NotSupported { feature: &'static str },

    #[snafu(display("Connection is closed"))]
    ConnectionClosed,

    #[snafu(transparent)]
    Settings { source: DataApiError },
}

impl From<Interruption> for DriverError {
    fn from(cause: Interruption) -> Self {
        Self::Interrupted { cause }
    }
}

impl DriverError {
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("column {column} has no declared type name"))]
    MissingTypeName { column: String },

    #[snafu(display("column {column} has unsupported type {type_name}"))]
    UnsupportedType { column: String, type_name: String },

    #[snafu(display("column {column} with type {type_name} could not be converted"))]
    Conversion {
        column: String,
        type_name: String,
        field: &'static str,
    },

    #[snafu(display("column {column} with type {type_name} could not be parsed as float: {source}"))]
    ParseFloat {
        column: String,
        type_name: String,
        source: std::num::ParseFloatError,
    },

    #[snafu(display("column {column} with type {type_name} could not be parsed: {source}"))]
    ParseTemporal {
        column: String,
        type_name: String,
        source: chrono::ParseError,
    },

    #[snafu(display("column {column} with type {type_name} has invalid zone offset {offset}"))]
    InvalidOffset {
        column: String,
        type_name: String,
        offset: String,
    },

    #[snafu(display("column {column} with type {type_name}: value {value} is out of range"))]
    IntegerOutOfRange {
        column: String,
        type_name: String,
        value: i64,
    },

    #[snafu(display("column {column}: {seconds} is not a valid unix timestamp"))]
    InvalidEpoch { column: String, seconds: i64 },

    #[snafu(display("row has {fields} fields but {columns} columns"))]
    RowWidth { fields: usize, columns: usize },
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
