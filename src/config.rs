//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::assets::{ASSETS_DIR_ENV, AssetManager, TEMPLATES_DIR_ENV};
use crate::error::ConfigError;
use crate::formatters::HelpTable;

/// Outgoing webhook settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as a bearer token when set.
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot name, used in log lines and the startup banner.
    pub name: String,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Reply through this webhook instead of stdout.
    pub webhook: Option<WebhookConfig>,
    /// Wrap width of the help table's usage column.
    pub help_usage_width: usize,
    /// Wrap width of the help table's description column.
    pub help_description_width: usize,
    pub assets_dir: Option<String>,
    pub templates_dir: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "homebot".to_string(),
            log_filter: "info".to_string(),
            webhook: None,
            help_usage_width: 40,
            help_description_width: 80,
            assets_dir: None,
            templates_dir: None,
        }
    }
}

impl BotConfig {
    /// Read the configuration from `HOMEBOT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let webhook = match var("HOMEBOT_WEBHOOK_URL") {
            Some(url) => Some(WebhookConfig {
                url,
                token: var("HOMEBOT_WEBHOOK_TOKEN").map(SecretString::from),
                timeout: Duration::from_secs(parse(&var, "HOMEBOT_WEBHOOK_TIMEOUT_SECS", 10)?),
            }),
            None => None,
        };

        Ok(Self {
            name: var("HOMEBOT_NAME").unwrap_or(defaults.name),
            log_filter: var("HOMEBOT_LOG").unwrap_or(defaults.log_filter),
            webhook,
            help_usage_width: parse(&var, "HOMEBOT_HELP_USAGE_WIDTH", defaults.help_usage_width)?,
            help_description_width: parse(
                &var,
                "HOMEBOT_HELP_DESCRIPTION_WIDTH",
                defaults.help_description_width,
            )?,
            assets_dir: var(ASSETS_DIR_ENV),
            templates_dir: var(TEMPLATES_DIR_ENV),
        })
    }

    /// Asset manager honouring the configured directory overrides.
    pub fn asset_manager(&self) -> AssetManager {
        AssetManager::with_overrides(None, self.assets_dir.clone(), self.templates_dir.clone())
    }

    pub fn help_table(&self) -> HelpTable {
        HelpTable::with_widths(self.help_usage_width, self.help_description_width)
    }
}

fn parse<T, V>(var: &V, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}
