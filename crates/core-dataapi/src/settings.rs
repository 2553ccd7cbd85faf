use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use validator::{Validate, ValidationError};

use crate::error::{self as dataapi_error, DataApiResult};
use crate::models::{Compute, Identity, StatementTarget};

/// Connection-argument value that selects the data source's own default.
pub const DEFAULT_KEY: &str = "__default";

#[derive(Validate, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSecret {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_arn"))]
    pub arn: String,
}

/// Empty is allowed here; the target resolution decides whether it is needed.
fn validate_arn(arn: &str) -> Result<(), ValidationError> {
    if arn.is_empty() || arn.starts_with("arn:") {
        return Ok(());
    }
    Err(ValidationError::new("Secret ARN must start with 'arn:'"))
}

#[derive(Validate, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSourceSettings {
    pub region: String,
    pub default_region: String,
    #[validate(url)]
    pub endpoint: Option<String>,
    pub cluster_identifier: String,
    pub workgroup_name: String,
    pub database: String,
    pub use_serverless: bool,
    pub use_managed_secret: bool,
    pub with_event: bool,
    pub db_user: String,
    #[serde(alias = "ManagedSecret")]
    #[validate(nested)]
    pub managed_secret: Option<ManagedSecret>,
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl fmt::Debug for DataSourceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceSettings")
            .field("region", &self.region)
            .field("default_region", &self.default_region)
            .field("endpoint", &self.endpoint)
            .field("cluster_identifier", &self.cluster_identifier)
            .field("workgroup_name", &self.workgroup_name)
            .field("database", &self.database)
            .field("use_serverless", &self.use_serverless)
            .field("use_managed_secret", &self.use_managed_secret)
            .field("with_event", &self.with_event)
            .field("db_user", &self.db_user)
            .field("managed_secret", &self.managed_secret)
            .field("access_key", &self.access_key.as_ref().map(|_| "***"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl DataSourceSettings {
    /// Builds settings from the data source JSON body plus its decrypted
    /// secure fields. A body of one byte or less is treated as empty.
    pub fn load(json: &[u8], secure: &HashMap<String, String>) -> DataApiResult<Self> {
        let mut settings = if json.len() > 1 {
            serde_json::from_slice::<Self>(json).context(dataapi_error::SettingsParseSnafu)?
        } else {
            Self::default()
        };
        settings.access_key = secure.get("accessKey").cloned();
        settings.secret_key = secure.get("secretKey").cloned();
        settings.check()?;
        Ok(settings)
    }

    /// Field-level validation, also used after settings are changed in place.
    pub fn check(&self) -> DataApiResult<()> {
        self.validate()
            .context(dataapi_error::SettingsValidationSnafu)
    }

    /// Applies per-query connection arguments (`region`, `database`).
    pub fn apply(&mut self, args: &HashMap<String, String>) {
        if let Some(region) = args.get("region").filter(|r| !r.is_empty()) {
            if region == DEFAULT_KEY {
                self.region.clone_from(&self.default_region);
            } else {
                self.region.clone_from(region);
            }
        }
        if let Some(database) = args
            .get("database")
            .filter(|d| !d.is_empty() && d.as_str() != DEFAULT_KEY)
        {
            self.database.clone_from(database);
        }
    }

    /// Region to talk to, falling back to the default region.
    #[must_use]
    pub fn effective_region(&self) -> Option<&str> {
        [&self.region, &self.default_region]
            .into_iter()
            .find(|r| !r.is_empty() && r.as_str() != DEFAULT_KEY)
            .map(String::as_str)
    }

    /// Resolves the connection target. Precedence:
    /// serverless + secret, serverless + caller identity,
    /// provisioned + secret, provisioned + database user.
    pub fn statement_target(&self) -> DataApiResult<StatementTarget> {
        let database = require(&self.database, "database")?;
        let compute = if self.use_serverless {
            Compute::Workgroup {
                name: require(&self.workgroup_name, "workgroupName")?,
            }
        } else {
            Compute::Cluster {
                identifier: require(&self.cluster_identifier, "clusterIdentifier")?,
            }
        };
        let identity = if self.use_managed_secret {
            let arn = self
                .managed_secret
                .as_ref()
                .map(|s| s.arn.as_str())
                .unwrap_or_default();
            Identity::ManagedSecret {
                arn: require(arn, "managedSecret.arn")?,
            }
        } else if self.use_serverless {
            Identity::TemporaryCredentials { db_user: None }
        } else {
            Identity::TemporaryCredentials {
                db_user: Some(require(&self.db_user, "dbUser")?),
            }
        };
        Ok(StatementTarget {
            database,
            compute,
            identity,
        })
    }
}

fn require(value: &str, field: &str) -> DataApiResult<String> {
    if value.is_empty() {
        return dataapi_error::InvalidSettingsSnafu {
            reason: format!("{field} is required"),
        }
        .fail();
    }
    Ok(value.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::DataApiError;

    fn settings(use_serverless: bool, use_managed_secret: bool) -> DataSourceSettings {
        DataSourceSettings {
            cluster_identifier: "cluster".to_string(),
            workgroup_name: "workgroup".to_string(),
            database: "db".to_string(),
            db_user: "user".to_string(),
            use_serverless,
            use_managed_secret,
            managed_secret: Some(ManagedSecret {
                name: "secret".to_string(),
                arn: "arn:secret".to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_target_priority_table() {
        let cases = [
            (true, true, Some("workgroup"), None, Some("arn:secret"), None),
            (true, false, Some("workgroup"), None, None, None),
            (false, true, None, Some("cluster"), Some("arn:secret"), None),
            (false, false, None, Some("cluster"), None, Some("user")),
        ];
        for (serverless, secret, workgroup, cluster, arn, user) in cases {
            let target = settings(serverless, secret).statement_target().unwrap();
            assert_eq!(target.database, "db");
            assert_eq!(target.workgroup_name(), workgroup);
            assert_eq!(target.cluster_identifier(), cluster);
            assert_eq!(target.secret_arn(), arn);
            assert_eq!(target.db_user(), user);
        }
    }

    #[test]
    fn test_target_missing_identifier() {
        let mut s = settings(true, false);
        s.workgroup_name.clear();
        let err = s.statement_target().unwrap_err();
        assert!(matches!(err, DataApiError::InvalidSettings { .. }));
        insta::assert_snapshot!(err.to_string(), @"Invalid data source settings: workgroupName is required");

        let mut s = settings(false, true);
        s.managed_secret = None;
        assert!(s.statement_target().is_err());
    }

    #[test]
    fn test_load() {
        let json = br#"{"clusterIdentifier":"c","database":"dev","useManagedSecret":true,
            "withEvent":true,"ManagedSecret":{"name":"n","arn":"arn:x"},"region":"us-east-1"}"#;
        let secure = HashMap::from([
            ("accessKey".to_string(), "AK".to_string()),
            ("secretKey".to_string(), "SK".to_string()),
        ]);
        let s = DataSourceSettings::load(json, &secure).unwrap();
        assert_eq!(s.cluster_identifier, "c");
        assert!(s.with_event);
        assert_eq!(s.managed_secret.as_ref().map(|m| m.arn.as_str()), Some("arn:x"));
        assert_eq!(s.access_key.as_deref(), Some("AK"));
        assert_eq!(s.secret_key.as_deref(), Some("SK"));
        assert!(!format!("{s:?}").contains("SK"));
    }

    #[test]
    fn test_load_empty_body_and_errors() {
        let s = DataSourceSettings::load(b"{", &HashMap::new()).unwrap();
        assert_eq!(s, DataSourceSettings::default());

        let err = DataSourceSettings::load(b"{not json}", &HashMap::new()).unwrap_err();
        assert!(matches!(err, DataApiError::SettingsParse { .. }));

        let err = DataSourceSettings::load(br#"{"endpoint":"not a url"}"#, &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, DataApiError::SettingsValidation { .. }));

        let err = DataSourceSettings::load(
            br#"{"ManagedSecret":{"name":"n","arn":"secret"}}"#,
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DataApiError::SettingsValidation { .. }));

        // empty secret with managed secrets turned off
        let s = DataSourceSettings::load(
            br#"{"ManagedSecret":{"name":"","arn":""}}"#,
            &HashMap::new(),
        )
        .unwrap();
        assert!(!s.use_managed_secret);
    }

    #[test]
    fn test_apply() {
        let mut s = DataSourceSettings {
            region: "eu-west-1".to_string(),
            default_region: "us-east-2".to_string(),
            database: "dev".to_string(),
            ..Default::default()
        };
        s.apply(&HashMap::from([
            ("region".to_string(), DEFAULT_KEY.to_string()),
            ("database".to_string(), DEFAULT_KEY.to_string()),
        ]));
        assert_eq!(s.region, "us-east-2");
        assert_eq!(s.database, "dev");

        s.apply(&HashMap::from([
            ("region".to_string(), "ap-south-1".to_string()),
            ("database".to_string(), "prod".to_string()),
        ]));
        assert_eq!(s.region, "ap-south-1");
        assert_eq!(s.database, "prod");
        assert_eq!(s.effective_region(), Some("ap-south-1"));
    }
}
