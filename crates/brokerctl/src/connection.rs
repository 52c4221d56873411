//! Turning profiles into connected admin clients

use crate::error::{BrokerCtlError, Result as CliResult};
use anyhow::Context;
use brokerctl_core::config::{Config, Profile};
use brokerctl_core::memory::{ClusterState, MemoryBroker};
use brokerctl_core::{AdminClient, Broker, DEFAULT_GROUP_TIMEOUT};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Loaded configuration plus where it came from
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl ConnectionManager {
    pub fn with_config_path(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Save the configuration to the path it was loaded from
    pub fn save_config(&self) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            self.config
                .save_to_path(path)
                .context("Failed to save configuration")?;
        } else {
            self.config.save().context("Failed to save configuration")?;
        }
        Ok(())
    }

    /// Path shown to the user for the active config file
    pub fn display_path(&self) -> Option<PathBuf> {
        self.config_path
            .clone()
            .or_else(|| Config::config_path().ok())
    }

    /// Resolve a profile and open a connected session against it
    pub async fn open_session(&self, profile_name: Option<&str>) -> CliResult<Session> {
        let (name, profile) = self.config.profile(profile_name)?;
        info!("Using profile: {}", name);
        profile.validate(&name)?;

        let (broker, sandbox) = Self::broker_for(&name, profile)?;
        let client_config = profile.to_client_config()?;
        trace!(
            keys = ?client_config.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            "client config resolved"
        );

        let client = AdminClient::builder(broker, client_config)
            .concurrency(profile.dispatcher_concurrency())
            .build();
        client.connect().await?;
        debug!(client = %client.name().await?, "connected");

        Ok(Session {
            client,
            sandbox,
            default_timeout: profile.request_timeout().unwrap_or(DEFAULT_GROUP_TIMEOUT),
        })
    }

    fn broker_for(name: &str, profile: &Profile) -> CliResult<(Arc<dyn Broker>, Option<Sandbox>)> {
        let Some(settings) = &profile.sandbox else {
            return Err(BrokerCtlError::NoBinding {
                name: name.to_string(),
                message: "this build only bundles the in-process sandbox cluster".to_string(),
            });
        };

        let state_path = settings.state_path();
        let state = match &state_path {
            Some(path) if path.exists() => {
                debug!("Loading sandbox state from {}", path.display());
                ClusterState::load(path)?
            }
            _ => ClusterState::default(),
        };

        let broker = MemoryBroker::builder()
            .state(state)
            .latency(settings.latency())
            .build();
        let sandbox = Sandbox {
            broker: broker.clone(),
            state_path,
        };
        Ok((Arc::new(broker), Some(sandbox)))
    }
}

struct Sandbox {
    broker: MemoryBroker,
    state_path: Option<PathBuf>,
}

/// A connected client for the duration of one command
pub struct Session {
    pub client: AdminClient,
    sandbox: Option<Sandbox>,
    default_timeout: Duration,
}

impl Session {
    /// Timeout from the command line, else the profile's default
    pub fn timeout(&self, timeout_ms: Option<u64>) -> Duration {
        timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout)
    }

    /// Shut the client down and persist sandbox state
    pub async fn finish(self) -> CliResult<()> {
        self.client.shutdown().await?;
        if let Some(Sandbox {
            broker,
            state_path: Some(path),
        }) = self.sandbox
        {
            debug!("Saving sandbox state to {}", path.display());
            broker.state().save(&path)?;
        }
        Ok(())
    }
}
