use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use civic_common::{Address, ErrorKind};
use civic_governance::{ProposalConfig, SchemeAddresses, SchemeVariant};
use civic_influence::FormulaConfig;

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Well-known addresses of the organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConfig {
    /// Scheme registered with every capability when the controller is created
    pub initial_scheme: Address,
    /// Account allowed to mint, burn and retune influence
    pub influence_owner: Address,
    /// Addresses the proposal engine builds batches against
    pub governance: SchemeAddresses,
}

/// Main Civic configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivicConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub addresses: AddressConfig,
    #[serde(default)]
    pub influence: FormulaConfig,
    #[serde(default)]
    pub proposals: ProposalConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_config_path() -> String {
    "/etc/civic/civic.yaml".to_string()
}

impl CivicConfig {
    /// Load configuration from environment variables.
    ///
    /// `CIVIC_CONFIG_FILE` (default `/etc/civic/civic.yaml`) is read if it
    /// exists; otherwise the configuration is assembled from `CIVIC_*`
    /// variables over the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: CivicConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log level is empty".to_string()));
        }
        if self.addresses.initial_scheme.is_zero() {
            return Err(ConfigError::Invalid("initial scheme address is not set".to_string()));
        }
        if self.addresses.influence_owner.is_zero() {
            return Err(ConfigError::Invalid("influence owner address is not set".to_string()));
        }
        self.addresses
            .governance
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.influence
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.proposals
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = lookup("CIVIC_CONFIG_FILE").unwrap_or_else(default_config_path);
        if Path::new(&config_path).exists() {
            return Self::from_file(&config_path);
        }

        let addresses = AddressConfig {
            initial_scheme: required(&lookup, "CIVIC_INITIAL_SCHEME")?,
            influence_owner: required(&lookup, "CIVIC_INFLUENCE_OWNER")?,
            governance: SchemeAddresses {
                scheme: required(&lookup, "CIVIC_SCHEME_ADDRESS")?,
                avatar: required(&lookup, "CIVIC_AVATAR_ADDRESS")?,
                multisend: required(&lookup, "CIVIC_MULTISEND_ADDRESS")?,
                permission_registry: required(&lookup, "CIVIC_PERMISSION_REGISTRY_ADDRESS")?,
            },
        };

        let formula = FormulaConfig::default();
        let influence = FormulaConfig {
            exponent: optional(&lookup, "CIVIC_INFLUENCE_EXPONENT")?.unwrap_or(formula.exponent),
            linear_multiplier: optional::<Decimal, _>(&lookup, "CIVIC_LINEAR_MULTIPLIER")?
                .unwrap_or(formula.linear_multiplier),
            exponential_multiplier: optional::<Decimal, _>(&lookup, "CIVIC_EXPONENTIAL_MULTIPLIER")?
                .unwrap_or(formula.exponential_multiplier),
        };

        let defaults = ProposalConfig::default();
        let variant = match lookup("CIVIC_SCHEME_VARIANT") {
            Some(raw) => parse_variant(&raw)?,
            None => defaults.variant,
        };
        let proposals = ProposalConfig {
            voting_period: optional(&lookup, "CIVIC_VOTING_PERIOD")?.unwrap_or(defaults.voting_period),
            time_for_execution: optional(&lookup, "CIVIC_TIME_FOR_EXECUTION")?
                .unwrap_or(defaults.time_for_execution),
            quorum_bps: optional(&lookup, "CIVIC_QUORUM_BPS")?.unwrap_or(defaults.quorum_bps),
            variant,
        };

        let config = CivicConfig {
            log_level: lookup("CIVIC_LOG_LEVEL").unwrap_or_else(default_log_level),
            addresses,
            influence,
            proposals,
        };
        config.validate()?;
        Ok(config)
    }
}

fn required<T, F>(lookup: &F, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key)?.ok_or_else(|| ConfigError::EnvVarNotFound(key.to_string()))
}

fn optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

fn parse_variant(raw: &str) -> Result<SchemeVariant> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "standard" => Ok(SchemeVariant::Standard),
        "enforced_binary" => Ok(SchemeVariant::EnforcedBinary),
        "options_can_fail" => Ok(SchemeVariant::OptionsCanFail),
        other => Err(ConfigError::InvalidEnvVar(
            "CIVIC_SCHEME_VARIANT".to_string(),
            format!("unknown variant {}", other),
        )),
    }
}
