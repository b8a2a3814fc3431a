// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Client configuration.
//!
//! Configuration is loaded once at process start from:
//! 1. A TOML document (file or string)
//! 2. Environment variables (`COSMOS_STORE_*` prefix)
//!
//! Environment variables take precedence over the document. A missing or invalid
//! setting is a [`ErrorKind::Configuration`] error and prevents the client from starting.

use std::{fmt, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{Error, ErrorKind, Result};

/// Environment variable prefix
const ENV_PREFIX: &str = "COSMOS_STORE";

const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 10;
const DEFAULT_MAX_RETRY_WAIT: Duration = Duration::from_secs(10);

/// The read consistency requested from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    Session,
    ConsistentPrefix,
    Eventual,
}

impl ConsistencyLevel {
    /// The value sent in the `x-ms-consistency-level` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::ConsistentPrefix => "ConsistentPrefix",
            ConsistencyLevel::Eventual => "Eventual",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "strong" => ConsistencyLevel::Strong,
            "boundedstaleness" => ConsistencyLevel::BoundedStaleness,
            "session" => ConsistencyLevel::Session,
            "consistentprefix" => ConsistencyLevel::ConsistentPrefix,
            "eventual" => ConsistencyLevel::Eventual,
            _ => {
                return Err(Error::new(ErrorKind::Configuration(format!(
                    "unknown consistency level '{s}'"
                ))))
            }
        };
        Ok(level)
    }
}

/// How the client talks to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    Direct,
    Gateway,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Direct => f.write_str("Direct"),
            ConnectionMode::Gateway => f.write_str("Gateway"),
        }
    }
}

impl FromStr for ConnectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ConnectionMode::Direct),
            "gateway" => Ok(ConnectionMode::Gateway),
            _ => Err(Error::new(ErrorKind::Configuration(format!(
                "unknown connection mode '{s}'"
            )))),
        }
    }
}

/// Limits applied when the store throttles a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryOptions {
    /// How many times a throttled or transiently failed request is retried.
    pub max_attempts: u32,
    /// The cumulative back-off allowed across all retries of one request.
    pub max_wait: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            max_wait: DEFAULT_MAX_RETRY_WAIT,
        }
    }
}

/// Immutable connection settings for a [`CosmosStoreClient`](crate::CosmosStoreClient).
#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    pub database_id: String,
    pub endpoint: Url,
    pub auth_key: String,
    pub consistency_level: ConsistencyLevel,
    pub connection_mode: ConnectionMode,
    pub max_connection_limit: usize,
    /// Throughput (request units per second) provisioned on newly created containers.
    pub initial_throughput: u32,
    pub retry: RetryOptions,
}

// The auth key never appears in logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("database_id", &self.database_id)
            .field("endpoint", &self.endpoint.as_str())
            .field("auth_key", &"<redacted>")
            .field("consistency_level", &self.consistency_level)
            .field("connection_mode", &self.connection_mode)
            .field("max_connection_limit", &self.max_connection_limit)
            .field("initial_throughput", &self.initial_throughput)
            .field("retry", &self.retry)
            .finish()
    }
}

/// The settings as they appear in the TOML document, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    database_id: Option<String>,
    endpoint_url: Option<String>,
    auth_key: Option<String>,
    consistency_level: Option<String>,
    connection_mode: Option<String>,
    initial_throughput: Option<u32>,
    max_connection_limit: Option<usize>,
    #[serde(default)]
    retry: RawRetry,
    /// Environment overrides that could not be parsed.
    #[serde(skip)]
    invalid_env: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRetry {
    max_attempts: Option<u32>,
    max_wait_seconds: Option<u64>,
}

impl ClientConfig {
    /// Loads configuration from a TOML file, applying environment overrides.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::full(
                ErrorKind::Configuration(format!("cannot read '{}'", path.display())),
                e,
                "failed to read configuration file",
            )
        })?;
        Self::load_from_str(&content)
    }

    /// Loads configuration from a TOML string, applying environment overrides.
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        Self::load_with_env(toml_content, |name| std::env::var(name).ok())
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::load_from_str("")
    }

    /// Loads configuration using `lookup` to resolve environment overrides.
    pub(crate) fn load_with_env(
        toml_content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut raw: RawConfig = toml::from_str(toml_content).map_err(|e| {
            Error::full(
                ErrorKind::Configuration(e.message().to_string()),
                e,
                "failed to parse configuration",
            )
        })?;
        raw.apply_env_overrides(lookup);
        raw.validate()
    }
}

impl RawConfig {
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}_{suffix}")).filter(|value| !value.is_empty())
        };

        if let Some(val) = var("DATABASE_ID") {
            self.database_id = Some(val);
        }
        if let Some(val) = var("ENDPOINT_URL") {
            self.endpoint_url = Some(val);
        }
        if let Some(val) = var("AUTH_KEY") {
            self.auth_key = Some(val);
        }
        if let Some(val) = var("CONSISTENCY_LEVEL") {
            self.consistency_level = Some(val);
        }
        if let Some(val) = var("CONNECTION_MODE") {
            self.connection_mode = Some(val);
        }
        if let Some(val) = var("INITIAL_THROUGHPUT") {
            self.initial_throughput = self.parse_env("INITIAL_THROUGHPUT", &val);
        }
        if let Some(val) = var("MAX_CONNECTION_LIMIT") {
            self.max_connection_limit = self.parse_env("MAX_CONNECTION_LIMIT", &val);
        }
        if let Some(val) = var("RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = self.parse_env("RETRY_MAX_ATTEMPTS", &val);
        }
        if let Some(val) = var("RETRY_MAX_WAIT_SECONDS") {
            self.retry.max_wait_seconds = self.parse_env("RETRY_MAX_WAIT_SECONDS", &val);
        }
    }

    fn parse_env<T: FromStr>(&mut self, suffix: &str, value: &str) -> Option<T> {
        let parsed = value.trim().parse().ok();
        if parsed.is_none() {
            self.invalid_env.push(format!("{ENV_PREFIX}_{suffix}"));
        }
        parsed
    }

    fn validate(self) -> Result<ClientConfig> {
        if let Some(name) = self.invalid_env.first() {
            return Err(invalid(&format!("{name} is not a valid number")));
        }
        let database_id = required(self.database_id, "database_id")?;
        let endpoint_url = required(self.endpoint_url, "endpoint_url")?;
        let auth_key = required(self.auth_key, "auth_key")?;
        let consistency_level = required(self.consistency_level, "consistency_level")?.parse()?;
        let connection_mode = required(self.connection_mode, "connection_mode")?.parse()?;

        let endpoint = Url::parse(&endpoint_url).map_err(|e| {
            Error::full(
                ErrorKind::Configuration(format!("invalid endpoint_url '{endpoint_url}'")),
                e,
                "failed to parse endpoint",
            )
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(invalid("endpoint_url must be an http or https URL"));
        }

        let initial_throughput = match self.initial_throughput {
            Some(throughput) if throughput >= 400 => throughput,
            Some(_) => return Err(invalid("initial_throughput must be at least 400")),
            None => return Err(missing("initial_throughput")),
        };
        let max_connection_limit = match self.max_connection_limit {
            Some(0) => return Err(invalid("max_connection_limit must be positive")),
            Some(limit) => limit,
            None => return Err(missing("max_connection_limit")),
        };

        let defaults = RetryOptions::default();
        let retry = RetryOptions {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts),
            max_wait: self
                .retry
                .max_wait_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_wait),
        };

        Ok(ClientConfig {
            database_id,
            endpoint,
            auth_key,
            consistency_level,
            connection_mode,
            max_connection_limit,
            initial_throughput,
            retry,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(missing(name)),
    }
}

fn missing(name: &str) -> Error {
    Error::new(ErrorKind::Configuration(format!(
        "missing required setting '{name}'"
    )))
}

fn invalid(message: &str) -> Error {
    Error::new(ErrorKind::Configuration(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
database_id = "planetzine"
endpoint_url = "https://planetzine.documents.azure.com:443/"
auth_key = "c2VjcmV0"
consistency_level = "Session"
connection_mode = "Gateway"
initial_throughput = 400
max_connection_limit = 50

[retry]
max_attempts = 3
max_wait_seconds = 5
"#;

    fn load(toml: &str, env: &[(&str, &str)]) -> Result<ClientConfig> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::load_with_env(toml, |name| env.get(name).cloned())
    }

    #[test]
    fn loads_full_document() {
        let config = load(SAMPLE, &[]).unwrap();
        assert_eq!(config.database_id, "planetzine");
        assert_eq!(config.consistency_level, ConsistencyLevel::Session);
        assert_eq!(config.connection_mode, ConnectionMode::Gateway);
        assert_eq!(config.initial_throughput, 400);
        assert_eq!(config.max_connection_limit, 50);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.max_wait, Duration::from_secs(5));
    }

    #[test]
    fn env_overrides_document() {
        let config = load(
            SAMPLE,
            &[
                ("COSMOS_STORE_CONSISTENCY_LEVEL", "eventual"),
                ("COSMOS_STORE_DATABASE_ID", "other"),
            ],
        )
        .unwrap();
        assert_eq!(config.consistency_level, ConsistencyLevel::Eventual);
        assert_eq!(config.database_id, "other");
    }

    #[test]
    fn retry_defaults_apply() {
        let toml = SAMPLE.split("[retry]").next().unwrap();
        let config = load(toml, &[]).unwrap();
        assert_eq!(config.retry, RetryOptions::default());
        assert_eq!(config.retry.max_attempts, 10);
    }

    #[test]
    fn missing_setting_is_configuration_error() {
        let toml = SAMPLE.replace("auth_key = \"c2VjcmV0\"\n", "");
        let err = load(&toml, &[]).unwrap_err();
        match err.kind() {
            ErrorKind::Configuration(message) => assert!(message.contains("auth_key")),
            other => panic!("unexpected error kind {other:?}"),
        }
    }

    #[test]
    fn invalid_enum_is_configuration_error() {
        let err = load(SAMPLE, &[("COSMOS_STORE_CONNECTION_MODE", "carrier-pigeon")]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Configuration(_)));
    }

    #[test]
    fn unparseable_number_from_env_is_rejected() {
        let err = load(SAMPLE, &[("COSMOS_STORE_MAX_CONNECTION_LIMIT", "lots")]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Configuration(_)));
    }

    #[test]
    fn debug_redacts_auth_key() {
        let config = load(SAMPLE, &[]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("<redacted>"));
    }
}
