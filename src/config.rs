//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::platform::GuildId;

/// Process configuration, read once at startup.
#[derive(Debug)]
pub struct Config {
    /// Base URL of the platform's HTTP API.
    pub base_url: String,
    /// Guild all operations are scoped to.
    pub home_guild: GuildId,
    /// Credential for the primary (fallback) session.
    pub primary_credential: SecretString,
    /// Ordered worker credentials; order determines worker ids.
    pub worker_credentials: Vec<SecretString>,
    /// Delay between worker startups to avoid a connection storm.
    pub startup_stagger: Duration,
    /// Session keepalive ping interval.
    pub heartbeat_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: required("DEPUTY_API_URL")?,
            home_guild: GuildId(parse_u64("DEPUTY_HOME_GUILD", &required("DEPUTY_HOME_GUILD")?)?),
            primary_credential: SecretString::from(required("DEPUTY_TOKEN")?),
            worker_credentials: parse_credential_list(
                &std::env::var("DEPUTY_WORKER_TOKENS").unwrap_or_default(),
            ),
            startup_stagger: Duration::from_millis(parse_u64(
                "DEPUTY_STARTUP_STAGGER_MS",
                &std::env::var("DEPUTY_STARTUP_STAGGER_MS").unwrap_or_else(|_| "500".to_string()),
            )?),
            heartbeat_interval: Duration::from_secs(parse_u64(
                "DEPUTY_HEARTBEAT_SECS",
                &std::env::var("DEPUTY_HEARTBEAT_SECS").unwrap_or_else(|_| "30".to_string()),
            )?),
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got {raw:?}"),
        })
}

/// Split a comma-separated credential list, skipping empty entries.
fn parse_credential_list(raw: &str) -> Vec<SecretString> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| SecretString::from(entry.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_list_splits_and_trims() {
        let list = parse_credential_list(" tok-a , tok-b ,, tok-c ");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn credential_list_empty_input() {
        assert!(parse_credential_list("").is_empty());
        assert!(parse_credential_list(" , ,").is_empty());
    }

    #[test]
    fn u64_parse_rejects_garbage() {
        assert_eq!(parse_u64("KEY", "42").unwrap(), 42);
        assert_eq!(parse_u64("KEY", " 42 ").unwrap(), 42);
        assert!(matches!(
            parse_u64("KEY", "forty-two"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
