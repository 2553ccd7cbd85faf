use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use core_dataapi::{DataSourceSettings, ManagedSecret};
use core_driver::QueryContext;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{self as cli_error, CliResult};

#[derive(Parser, Debug)]
#[command(version, about = "Run SQL through the Redshift Data API driver", long_about = None)]
pub struct CliOpts {
    #[arg(
        short,
        long,
        env = "REDSHIFT_SETTINGS_FILE",
        help = "Data source settings file (.json, .yaml or .yml)"
    )]
    pub settings: Option<PathBuf>,

    #[arg(long, env = "AWS_REGION", help = "AWS Region")]
    pub region: Option<String>,

    #[arg(
        long,
        env = "REDSHIFT_DATA_ENDPOINT",
        help = "Redshift Data API endpoint override"
    )]
    pub endpoint: Option<String>,

    #[arg(
        long,
        env = "AWS_ACCESS_KEY_ID",
        hide_env_values = true,
        requires = "secret_access_key",
        help = "AWS Access Key ID",
        help_heading = "Credentials"
    )]
    access_key_id: Option<String>,

    #[arg(
        long,
        env = "AWS_SECRET_ACCESS_KEY",
        hide_env_values = true,
        requires = "access_key_id",
        help = "AWS Secret Access Key",
        help_heading = "Credentials"
    )]
    secret_access_key: Option<String>,

    #[arg(
        long,
        env = "REDSHIFT_SECRET_ARN",
        help = "Secrets Manager ARN holding database credentials",
        help_heading = "Credentials"
    )]
    pub secret_arn: Option<String>,

    #[arg(
        long,
        env = "REDSHIFT_DB_USER",
        help = "Database user for temporary credentials (provisioned clusters)",
        help_heading = "Credentials"
    )]
    pub db_user: Option<String>,

    #[arg(long, env = "REDSHIFT_DATABASE", help = "Database name", help_heading = "Target")]
    pub database: Option<String>,

    #[arg(
        long,
        env = "REDSHIFT_CLUSTER_IDENTIFIER",
        conflicts_with = "workgroup_name",
        help = "Provisioned cluster identifier",
        help_heading = "Target"
    )]
    pub cluster_identifier: Option<String>,

    #[arg(
        long,
        env = "REDSHIFT_WORKGROUP_NAME",
        help = "Serverless workgroup name, implies --serverless",
        help_heading = "Target"
    )]
    pub workgroup_name: Option<String>,

    #[arg(
        long,
        env = "REDSHIFT_SERVERLESS",
        help = "Target a serverless workgroup",
        help_heading = "Target"
    )]
    pub serverless: bool,

    #[arg(
        long,
        env = "REDSHIFT_WITH_EVENT",
        help = "Send an event to EventBridge when the statement completes"
    )]
    pub with_event: bool,

    #[arg(
        long,
        env = "QUERY_TIMEOUT_SECS",
        help = "Give up waiting on the statement after this many seconds"
    )]
    pub timeout_secs: Option<u64>,

    #[arg(
        long,
        value_enum,
        env = "TRACING_LEVEL",
        default_value = "info",
        help = "Tracing level, it can be overrided by *RUST_LOG* env var"
    )]
    pub tracing_level: TracingLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a statement and print its rows
    Query { sql: String },
    /// Run `SELECT 1`
    Ping,
    /// Submit a statement and print its id without waiting
    Start { sql: String },
    /// Print the status of a statement
    Status { id: String },
    /// Print the rows of a finished statement
    Rows { id: String },
    /// Cancel a statement
    Cancel { id: String },
}

impl CliOpts {
    /// Settings file first, then command line and environment overrides.
    pub fn data_source_settings(&self) -> CliResult<DataSourceSettings> {
        let json = match &self.settings {
            Some(path) => read_settings_file(path)?,
            None => Vec::new(),
        };
        let mut secure = HashMap::new();
        if let (Some(access_key), Some(secret_key)) = (&self.access_key_id, &self.secret_access_key)
        {
            secure.insert("accessKey".to_string(), access_key.clone());
            secure.insert("secretKey".to_string(), secret_key.clone());
        }
        let mut settings =
            DataSourceSettings::load(&json, &secure).context(cli_error::SettingsSnafu)?;

        let mut args = HashMap::new();
        if let Some(region) = &self.region {
            args.insert("region".to_string(), region.clone());
        }
        if let Some(database) = &self.database {
            args.insert("database".to_string(), database.clone());
        }
        settings.apply(&args);

        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = Some(endpoint.clone());
        }
        if let Some(identifier) = &self.cluster_identifier {
            settings.cluster_identifier.clone_from(identifier);
            settings.use_serverless = false;
        }
        if let Some(workgroup) = &self.workgroup_name {
            settings.workgroup_name.clone_from(workgroup);
            settings.use_serverless = true;
        }
        if self.serverless {
            settings.use_serverless = true;
        }
        if let Some(arn) = &self.secret_arn {
            settings.use_managed_secret = true;
            settings.managed_secret = Some(ManagedSecret {
                name: String::new(),
                arn: arn.clone(),
            });
        }
        if let Some(db_user) = &self.db_user {
            settings.db_user.clone_from(db_user);
            if self.secret_arn.is_none() {
                settings.use_managed_secret = false;
            }
        }
        if self.with_event {
            settings.with_event = true;
        }
        settings.check().context(cli_error::SettingsSnafu)?;
        Ok(settings)
    }

    pub fn query_context(&self, cancel: CancellationToken) -> QueryContext {
        let ctx = QueryContext::new().with_cancellation_token(cancel);
        match self.timeout_secs {
            Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
            None => ctx,
        }
    }
}

/// Returns the settings as JSON bytes, converting YAML files.
fn read_settings_file(path: &Path) -> CliResult<Vec<u8>> {
    let content = std::fs::read(path).context(cli_error::ReadSettingsSnafu { path })?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if !is_yaml {
        return Ok(content);
    }
    let value: serde_json::Value =
        serde_yaml::from_slice(&content).context(cli_error::ParseYamlSnafu { path })?;
    serde_json::to_vec(&value).context(cli_error::EncodeSettingsSnafu)
}

#[derive(Debug, Clone, ValueEnum)]
pub enum TracingLevel {
    Off,
    Info,
    Debug,
    Trace,
}

#[allow(clippy::from_over_into)]
impl Into<LevelFilter> for TracingLevel {
    fn into(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use core_dataapi::DataApiError;

    /// Parses command line arguments only, ignoring the process environment.
    fn try_parse(args: &[&str]) -> Result<CliOpts, clap::Error> {
        let mut argv = vec!["driverctl"];
        argv.extend_from_slice(args);
        let matches = CliOpts::command()
            .mut_args(|arg| arg.env(None::<&'static str>))
            .try_get_matches_from(argv)?;
        CliOpts::from_arg_matches(&matches)
    }

    fn parse(args: &[&str]) -> CliOpts {
        try_parse(args).unwrap()
    }

    #[test]
    fn test_parse_subcommands() {
        let opts = parse(&["--database", "dev", "query", "select 1"]);
        assert_eq!(
            opts.command,
            Command::Query {
                sql: "select 1".to_string()
            }
        );
        assert_eq!(
            parse(&["status", "abc"]).command,
            Command::Status {
                id: "abc".to_string()
            }
        );
        assert!(try_parse(&[]).is_err());
        assert!(
            try_parse(&[
                "--cluster-identifier",
                "c",
                "--workgroup-name",
                "w",
                "ping"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_serverless_secret_target() {
        let opts = parse(&[
            "--workgroup-name",
            "wg",
            "--database",
            "dev",
            "--secret-arn",
            "arn:secret",
            "--with-event",
            "ping",
        ]);
        let settings = opts.data_source_settings().unwrap();
        assert!(settings.use_serverless);
        assert!(settings.with_event);
        let target = settings.statement_target().unwrap();
        assert_eq!(target.workgroup_name(), Some("wg"));
        assert_eq!(target.secret_arn(), Some("arn:secret"));
        assert_eq!(target.db_user(), None);
    }

    #[test]
    fn test_cluster_db_user_target() {
        let opts = parse(&[
            "--cluster-identifier",
            "c1",
            "--database",
            "dev",
            "--db-user",
            "admin",
            "--region",
            "eu-west-1",
            "ping",
        ]);
        let settings = opts.data_source_settings().unwrap();
        assert_eq!(settings.region, "eu-west-1");
        let target = settings.statement_target().unwrap();
        assert_eq!(target.cluster_identifier(), Some("c1"));
        assert_eq!(target.db_user(), Some("admin"));
    }

    #[test]
    fn test_secret_outranks_db_user() {
        let opts = parse(&[
            "--cluster-identifier",
            "c1",
            "--database",
            "dev",
            "--secret-arn",
            "arn:secret",
            "--db-user",
            "admin",
            "ping",
        ]);
        let settings = opts.data_source_settings().unwrap();
        assert!(settings.use_managed_secret);
        let target = settings.statement_target().unwrap();
        assert_eq!(target.cluster_identifier(), Some("c1"));
        assert_eq!(target.secret_arn(), Some("arn:secret"));
        assert_eq!(target.db_user(), None);
    }

    #[test]
    fn test_missing_settings_file() {
        let opts = parse(&["--settings", "/nonexistent/settings.json", "ping"]);
        assert!(matches!(
            opts.data_source_settings(),
            Err(cli_error::CliError::ReadSettings { .. })
        ));
    }

    #[test]
    fn test_settings_files() {
        let dir = std::env::temp_dir().join(format!("driverctl-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let yaml = dir.join("settings.yaml");
        std::fs::write(&yaml, "clusterIdentifier: c\ndatabase: dev\ndbUser: admin\n").unwrap();
        let settings = read_settings_file(&yaml).unwrap();
        let settings = DataSourceSettings::load(&settings, &HashMap::new()).unwrap();
        assert_eq!(settings.cluster_identifier, "c");
        assert_eq!(settings.db_user, "admin");

        let json = dir.join("settings.json");
        std::fs::write(&json, r#"{"workgroupName":"wg","useServerless":true}"#).unwrap();
        let opts = parse(&["--settings", json.to_str().unwrap(), "--database", "dev", "ping"]);
        let settings = opts.data_source_settings().unwrap();
        assert_eq!(settings.statement_target().unwrap().workgroup_name(), Some("wg"));

        let broken = dir.join("broken.yml");
        std::fs::write(&broken, "a: [").unwrap();
        assert!(matches!(
            read_settings_file(&broken),
            Err(cli_error::CliError::ParseYaml { .. })
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let opts = parse(&["--endpoint", "not a url", "ping"]);
        assert!(matches!(
            opts.data_source_settings(),
            Err(cli_error::CliError::Settings {
                source: DataApiError::SettingsValidation { .. }
            })
        ));
    }

    #[test]
    fn test_timeout_sets_deadline() {
        let opts = parse(&["--timeout-secs", "5", "ping"]);
        assert!(opts.query_context(CancellationToken::new()).deadline().is_some());
        let opts = parse(&["ping"]);
        assert!(opts.query_context(CancellationToken::new()).deadline().is_none());
    }
}
