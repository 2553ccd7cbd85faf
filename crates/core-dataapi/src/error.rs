use snafu::prelude::*;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum DataApiError {
    #[snafu(display("{operation} failed: {message}"))]
    Service {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    #[snafu(display("{operation} response is missing {field}"))]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[snafu(display("Invalid data source settings: {reason}"))]
    InvalidSettings { reason: String },

    #[snafu(display("Unable to parse data source settings: {source}"))]
    SettingsParse { source: serde_json::Error },

    #[snafu(display("Data source settings validation failed: {source}"))]
    SettingsValidation {
        source: validator::ValidationErrors,
    },
}

impl DataApiError {
    /// Remote message text, kept verbatim for the service variant.
    #[must_use]
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Service { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

pub type DataApiResult<T> = std::result::Result<T, DataApiError>;
