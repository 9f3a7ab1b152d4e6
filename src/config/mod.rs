use anyhow::{anyhow, Context, Result};
use envmnt::{ExpandOptions, ExpansionType};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::{fmt, fs};

/// Environments a command may target.
pub const ENVIRONMENTS: &[&str] = &["dev", "staging", "production"];

/// Database engine behind the managed instances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Postgresql,
    Mongodb,
    None,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatabaseType::Postgresql => write!(f, "postgresql"),
            DatabaseType::Mongodb => write!(f, "mongodb"),
            DatabaseType::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "postgresql" => Ok(DatabaseType::Postgresql),
            "mongodb" => Ok(DatabaseType::Mongodb),
            "none" => Ok(DatabaseType::None),
            other => Err(anyhow!(
                "unknown database type `{}`, expected: postgresql, mongodb or none",
                other
            )),
        }
    }
}

/// Runtime properties shared by every subcommand.
///
/// Precedence, lowest to highest: built-in defaults, the config file, `CLI_*`
/// environment variables, command-line flags. Values may reference other
/// environment variables as `${VAR}` or `${VAR:default}`.
///
/// For example:
///
/// ```yaml
/// environment: staging
/// gcp_project: my-project
/// gcp_region: us-central1
/// database_type: postgresql
/// service_account_base: my-app-gsa
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Properties {
    pub environment: String,
    pub gcp_project: String,
    pub gcp_region: String,
    pub database_type: DatabaseType,
    pub service_account_base: String,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            gcp_project: "change-here".to_string(),
            gcp_region: "change-here".to_string(),
            database_type: DatabaseType::None,
            service_account_base: "change-here-gsa".to_string(),
        }
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", serde_yaml::to_string(&self).unwrap())
    }
}

impl Properties {
    /// Load properties from an optional config file, apply `CLI_*` environment
    /// overrides, then expand `${VAR}` references in the values.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut properties = match config_file {
            Some(path) if path.exists() => {
                debug!("Using config file: {}", path.display());
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found. Using defaults and environment variables.",
                    path.display()
                );
                Self::default()
            }
            None => Self::default(),
        };

        properties.apply_env_overrides()?;
        properties.expand_env_vars();

        Ok(properties)
    }

    // Environment variables use the CLI_ prefix to avoid conflicts
    fn apply_env_overrides(&mut self) -> Result<()> {
        if envmnt::exists("CLI_ENVIRONMENT") {
            self.environment = envmnt::get_or("CLI_ENVIRONMENT", "");
        }
        if envmnt::exists("CLI_GCP_PROJECT") {
            self.gcp_project = envmnt::get_or("CLI_GCP_PROJECT", "");
        }
        if envmnt::exists("CLI_GCP_REGION") {
            self.gcp_region = envmnt::get_or("CLI_GCP_REGION", "");
        }
        if envmnt::exists("CLI_DATABASE_TYPE") {
            self.database_type = envmnt::get_or("CLI_DATABASE_TYPE", "").parse()?;
        }
        if envmnt::exists("CLI_GSA_BASE_ACCOUNT") {
            self.service_account_base = envmnt::get_or("CLI_GSA_BASE_ACCOUNT", "");
        }
        Ok(())
    }

    // Expand environment variables in the string fields.
    // For example: gcp_project: ${GCP_PROJECT:my-default-project}
    fn expand_env_vars(&mut self) {
        for field in [
            &mut self.environment,
            &mut self.gcp_project,
            &mut self.gcp_region,
            &mut self.service_account_base,
        ] {
            let options = ExpandOptions {
                expansion_type: Some(ExpansionType::UnixBracketsWithDefaults),
                default_to_empty: false,
            };
            *field = envmnt::expand(field, Some(options));

            // Most likely the user forgot to export the variable
            if field.contains("${") {
                warn!(
                    "Value may not have fully expanded environment variables: {}",
                    field
                );
            }
        }
    }

    /// Derived Google service account email.
    pub fn service_account_email(&self) -> String {
        format!(
            "{}@{}.iam.gserviceaccount.com",
            self.service_account_base, self.gcp_project
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !ENVIRONMENTS.contains(&self.environment.as_str()) {
            return Err(anyhow!(
                "invalid environment: {}, expected: {:?}",
                self.environment,
                ENVIRONMENTS
            ));
        }

        for (name, value) in [
            ("gcp-project", &self.gcp_project),
            ("gcp-region", &self.gcp_region),
        ] {
            if value.is_empty() || *value == "change-here" {
                return Err(anyhow!("{} must be set", name));
            }
            if *value != value.to_lowercase() {
                return Err(anyhow!("{} must be lowercase: {}", name, value));
            }
        }

        if self.service_account_base.is_empty() || self.service_account_base.len() > 30 {
            return Err(anyhow!(
                "service account base name must be 1-30 characters: {}",
                self.service_account_base
            ));
        }
        if self.service_account_base.contains('_') {
            return Err(anyhow!(
                "service account base name must not contain underscores: {}",
                self.service_account_base
            ));
        }

        Ok(())
    }

    /// Field list for debug output, statically enumerated.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("environment", self.environment.clone()),
            ("gcp_project", self.gcp_project.clone()),
            ("gcp_region", self.gcp_region.clone()),
            ("database_type", self.database_type.to_string()),
            ("service_account_base", self.service_account_base.clone()),
            ("service_account_email", self.service_account_email()),
        ]
    }

    pub fn log_fields(&self) {
        for (name, value) in self.fields() {
            debug!("Field: {}, Value: {}", name, value);
        }
    }
}
