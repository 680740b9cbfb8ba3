use std::fmt;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{HasteError, Result};

pub const DEFAULT_IDENTITY_URL: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_CONFIG_FILE: &str = "haste.toml";

/// Credential document sent to the identity service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    #[default]
    ApiKey,
    Password,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub username: String,
    pub api_key: String,
    pub region: String,
    pub auth_method: AuthMethod,
    pub tenant: Option<String>,
    pub identity_url: String,
    pub concurrency: usize,
    /// Use the catalog's internalURL (service net) instead of publicURL
    pub internal_url: bool,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_key: String::new(),
            region: String::new(),
            auth_method: AuthMethod::default(),
            tenant: None,
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            internal_url: false,
            verbose: false,
            json_logs: false,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("auth_method", &self.auth_method)
            .field("tenant", &self.tenant)
            .field("identity_url", &self.identity_url)
            .field("concurrency", &self.concurrency)
            .field("internal_url", &self.internal_url)
            .field("verbose", &self.verbose)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl AppConfig {
    /// Assemble the configuration: defaults, then the TOML file, then the
    /// environment, then command-line overrides. The result is validated.
    pub fn new<T: Serialize>(config_file: Option<&Path>, cli_args: Option<&T>) -> Result<Self> {
        let config: AppConfig = Self::figment(config_file, cli_args).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment<T: Serialize>(config_file: Option<&Path>, cli_args: Option<&T>) -> Figment {
        let file = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(openstack_env())
            .merge(Env::prefixed("HASTE_"));

        if let Some(args) = cli_args {
            figment = figment.merge(Serialized::defaults(args));
        }

        figment
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(HasteError::config(
                "username is required (--username or OS_USERNAME)",
            ));
        }
        if self.api_key.is_empty() {
            return Err(HasteError::config(
                "API key is required (--api-key or OS_PASSWORD)",
            ));
        }
        if self.region.is_empty() {
            return Err(HasteError::config(
                "region is required (--region or OS_REGION_NAME)",
            ));
        }
        if self.concurrency == 0 {
            return Err(HasteError::InvalidConcurrency);
        }
        Ok(())
    }
}

/// The conventional OpenStack client variables.
fn openstack_env() -> Env {
    Env::raw()
        .only(&["OS_USERNAME", "OS_PASSWORD", "OS_REGION_NAME"])
        .map(|key| {
            if key == "OS_USERNAME" {
                "username".into()
            } else if key == "OS_PASSWORD" {
                "api_key".into()
            } else {
                "region".into()
            }
        })
}
