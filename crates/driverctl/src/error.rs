use std::path::PathBuf;

use core_dataapi::DataApiError;
use core_driver::DriverError;
use snafu::prelude::*;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Unable to read settings file {}: {source}", path.display()))]
    ReadSettings {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse settings file {}: {source}", path.display()))]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to encode settings: {source}"))]
    EncodeSettings { source: serde_json::Error },

    #[snafu(display("{source}"))]
    Settings { source: DataApiError },

    #[snafu(display("{source}"))]
    Driver { source: DriverError },

    #[snafu(display("Unable to write output: {source}"))]
    Output { source: std::io::Error },

    #[snafu(display("Unable to serialize output: {source}"))]
    Serialize { source: serde_json::Error },
}

pub type CliResult<T> = std::result::Result<T, CliError>;
