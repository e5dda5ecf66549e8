//! Provider connection configuration.
//!
//! Values come from the provider configuration block first and fall back to
//! environment variables. They are resolved once per `configure` call.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Default NGC API endpoint.
pub const DEFAULT_NGC_ENDPOINT: &str = "https://api.ngc.nvidia.com";

/// Default interval between deployment status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Environment variable for the API endpoint.
pub const ENV_NGC_ENDPOINT: &str = "NGC_ENDPOINT";
/// Environment variable for the API key.
pub const ENV_NGC_API_KEY: &str = "NGC_API_KEY";
/// Environment variable for the org.
pub const ENV_NGC_ORG: &str = "NGC_ORG";
/// Environment variable for the team.
pub const ENV_NGC_TEAM: &str = "NGC_TEAM";

/// Resolved provider configuration.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base endpoint of the NGC API.
    pub ngc_endpoint: String,
    /// API key sent as a bearer token.
    pub ngc_api_key: String,
    /// Org owning the functions.
    pub ngc_org: String,
    /// Optional team scope within the org.
    pub ngc_team: Option<String>,
    /// Interval between deployment status polls.
    pub deployment_poll_interval: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("ngc_endpoint", &self.ngc_endpoint)
            .field("ngc_api_key", &"<redacted>")
            .field("ngc_org", &self.ngc_org)
            .field("ngc_team", &self.ngc_team)
            .field("deployment_poll_interval", &self.deployment_poll_interval)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    ngc_endpoint: Option<String>,
    ngc_api_key: Option<String>,
    ngc_org: Option<String>,
    ngc_team: Option<String>,
    deployment_poll_interval: Option<String>,
}

impl ProviderConfig {
    /// Resolve configuration against the process environment.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    ///
    /// Explicit, non-empty config values win over the environment.
    pub fn resolve<F>(config: &Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = match config {
            Value::Null => RawConfig::default(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| ProviderError::Configuration(format!("invalid provider config: {}", e)))?,
        };

        let pick = |explicit: Option<String>, key: &str| {
            explicit
                .filter(|v| !v.is_empty())
                .or_else(|| env(key).filter(|v| !v.is_empty()))
        };

        let ngc_endpoint = pick(raw.ngc_endpoint, ENV_NGC_ENDPOINT)
            .unwrap_or_else(|| DEFAULT_NGC_ENDPOINT.to_string());
        let ngc_api_key = pick(raw.ngc_api_key, ENV_NGC_API_KEY).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "ngc_api_key must be set in the provider block or via {}",
                ENV_NGC_API_KEY
            ))
        })?;
        let ngc_org = pick(raw.ngc_org, ENV_NGC_ORG).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "ngc_org must be set in the provider block or via {}",
                ENV_NGC_ORG
            ))
        })?;
        let ngc_team = pick(raw.ngc_team, ENV_NGC_TEAM);

        let deployment_poll_interval = match raw.deployment_poll_interval {
            Some(interval) => humantime::parse_duration(&interval).map_err(|e| {
                ProviderError::Configuration(format!(
                    "invalid deployment_poll_interval \"{}\": {}",
                    interval, e
                ))
            })?,
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            ngc_endpoint,
            ngc_api_key,
            ngc_org,
            ngc_team,
            deployment_poll_interval,
        })
    }

    /// Base URL of the NVCF API scoped to the configured org and team.
    pub fn nvcf_base_url(&self) -> String {
        let endpoint = self.ngc_endpoint.trim_end_matches('/');
        match &self.ngc_team {
            Some(team) => format!("{}/v2/orgs/{}/teams/{}", endpoint, self.ngc_org, team),
            None => format!("{}/v2/orgs/{}", endpoint, self.ngc_org),
        }
    }

    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection settings for the NGC API")
            .with_attribute(
                "ngc_endpoint",
                Attribute::optional_string().with_description(format!(
                    "NGC API endpoint. Defaults to {} or ${}",
                    DEFAULT_NGC_ENDPOINT, ENV_NGC_ENDPOINT
                )),
            )
            .with_attribute(
                "ngc_api_key",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("NGC API key. Defaults to ${}", ENV_NGC_API_KEY)),
            )
            .with_attribute(
                "ngc_org",
                Attribute::optional_string()
                    .with_description(format!("NGC org. Defaults to ${}", ENV_NGC_ORG)),
            )
            .with_attribute(
                "ngc_team",
                Attribute::optional_string()
                    .with_description(format!("NGC team. Defaults to ${}", ENV_NGC_TEAM)),
            )
            .with_attribute(
                "deployment_poll_interval",
                Attribute::optional_string()
                    .with_description("Interval between deployment status checks, e.g. \"30s\""),
            )
    }
}
