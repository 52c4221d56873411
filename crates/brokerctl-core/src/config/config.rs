//! Profile configuration for broker clusters
//!
//! Configuration is stored in TOML with any number of named profiles. Each
//! profile describes how to reach one cluster and is turned into the
//! [`ClientConfig`] handed to the broker library.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::credential::CredentialStore;
use super::error::{ConfigError, Result};
use crate::auth::{OAUTHBEARER_CONFIG, SASL_MECHANISMS};
use crate::broker::ClientConfig;
use crate::worker::DEFAULT_CONCURRENCY;

/// Environment variable that overrides a profile's stored SASL password
pub const SASL_PASSWORD_ENV: &str = "BROKERCTL_SASL_PASSWORD";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    /// Map of profile name -> profile configuration
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Connection settings for one cluster
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Profile {
    /// Comma-separated `host:port` list
    pub bootstrap_servers: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_protocol: Option<SecurityProtocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_username: Option<String>,
    /// Plaintext, `keyring:<key>` reference, or `${VAR}` reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauthbearer_config: Option<String>,
    /// Default timeout for admin operations run with this profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    /// Operations allowed in flight at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Extra client properties passed through unchanged
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxSettings>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityProtocol {
    Plaintext,
    Ssl,
    SaslPlaintext,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }
}

impl std::fmt::Display for SecurityProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityProtocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plaintext" => Ok(SecurityProtocol::Plaintext),
            "ssl" => Ok(SecurityProtocol::Ssl),
            "sasl_plaintext" => Ok(SecurityProtocol::SaslPlaintext),
            "sasl_ssl" => Ok(SecurityProtocol::SaslSsl),
            other => Err(format!("unknown security protocol '{}'", other)),
        }
    }
}

/// Settings for the in-process sandbox cluster
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SandboxSettings {
    /// JSON snapshot loaded before and saved after each command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
    /// Simulated delivery delay for every result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl SandboxSettings {
    /// State file path with `~` expanded
    pub fn state_path(&self) -> Option<PathBuf> {
        self.state_file
            .as_deref()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.unwrap_or(0))
    }
}

impl Profile {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            ..Default::default()
        }
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox.is_some()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn dispatcher_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    /// Resolve the SASL password, if any
    ///
    /// `BROKERCTL_SASL_PASSWORD` wins over the stored value; `keyring:`
    /// references are looked up in the OS keyring.
    pub fn resolve_sasl_password(&self) -> Result<Option<String>> {
        let store = CredentialStore::new();
        match &self.sasl_password {
            Some(value) => store
                .get_credential(value, Some(SASL_PASSWORD_ENV))
                .map(Some),
            None => Ok(std::env::var(SASL_PASSWORD_ENV).ok()),
        }
    }

    /// Build the client properties for this profile
    ///
    /// Explicit `properties` are applied first so the typed fields win.
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let mut config: ClientConfig = self
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        config.set("bootstrap.servers", &self.bootstrap_servers);
        if let Some(client_id) = &self.client_id {
            config.set("client.id", client_id);
        }
        if let Some(protocol) = self.security_protocol {
            config.set("security.protocol", protocol.as_str());
        }
        if let Some(mechanism) = &self.sasl_mechanism {
            config.set(SASL_MECHANISMS, mechanism);
        }
        if let Some(username) = &self.sasl_username {
            config.set("sasl.username", username);
        }
        if let Some(password) = self.resolve_sasl_password()? {
            config.set("sasl.password", &password);
        }
        if let Some(oauth) = &self.oauthbearer_config {
            config.set(OAUTHBEARER_CONFIG, oauth);
        }
        if let Some(ms) = self.request_timeout_ms {
            config.set("request.timeout.ms", &ms.to_string());
        }
        Ok(config)
    }

    /// Check the profile for values the broker would reject anyway
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |message: &str| ConfigError::InvalidProfile {
            name: name.to_string(),
            message: message.to_string(),
        };

        if self.bootstrap_servers.trim().is_empty() {
            return Err(invalid("bootstrap_servers must not be empty"));
        }
        if self.concurrency == Some(0) {
            return Err(invalid("concurrency must be at least 1"));
        }
        if self.sasl_username.is_some() && self.sasl_mechanism.is_none() {
            return Err(invalid("sasl_username requires sasl_mechanism"));
        }
        Ok(())
    }
}

impl Config {
    /// Resolve the profile to use
    ///
    /// Resolution order: explicit name, `default_profile`, then the only
    /// configured profile.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile {
            if !self.profiles.contains_key(name) {
                return Err(ConfigError::ProfileNotFound {
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }

        if let Some(ref default) = self.default_profile {
            return Ok(default.clone());
        }

        let names: Vec<&String> = self.list_profiles().into_iter().map(|(n, _)| n).collect();
        match names.as_slice() {
            [] => Err(ConfigError::NoProfiles {
                suggestion: "Use 'brokerctl profile set' to create a profile.".to_string(),
            }),
            [only] => Ok((*only).clone()),
            many => Err(ConfigError::NoProfiles {
                suggestion: format!(
                    "No default profile among: {}. Use 'brokerctl profile default <name>' or --profile.",
                    many.iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }),
        }
    }

    /// Resolve and fetch a profile
    pub fn profile(&self, explicit_profile: Option<&str>) -> Result<(String, &Profile)> {
        let name = self.resolve_profile(explicit_profile)?;
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.clone() })?;
        Ok((name, profile))
    }

    /// Load configuration from the standard location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        let expanded_content = Self::expand_env_vars(&content);
        let config: Config = toml::from_str(&expanded_content)?;
        Ok(config)
    }

    /// Save configuration to the standard location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content).map_err(|e| ConfigError::SaveError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profiles sorted by name
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        let mut profiles: Vec<_> = self.profiles.iter().collect();
        profiles.sort_by_key(|(name, _)| *name);
        profiles
    }

    /// Get the path to the configuration file
    ///
    /// On Linux: ~/.config/brokerctl/config.toml. On macOS the Linux-style
    /// path is used when it exists, else the platform directory.
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(base_dirs) = BaseDirs::new() {
                let linux_style_path = base_dirs
                    .home_dir()
                    .join(".config")
                    .join("brokerctl")
                    .join("config.toml");
                if linux_style_path
                    .parent()
                    .map(|p| p.exists())
                    .unwrap_or(false)
                {
                    return Ok(linux_style_path);
                }
            }
        }

        let proj_dirs =
            ProjectDirs::from("dev", "brokerctl", "brokerctl").ok_or(ConfigError::ConfigDirError)?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Expand `${VAR}` and `${VAR:-default}` references
    ///
    /// Unset variables without a default are left as written, so profiles
    /// that are not in use never fail to load.
    fn expand_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok()).to_string()
    }
}
