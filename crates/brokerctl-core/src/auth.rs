//! Authentication hooks run around handle creation

use crate::broker::{BrokerHandle, ClientConfig, EventQueue};
use crate::error::{CoreError, Result};
use tracing::debug;

pub const SASL_MECHANISMS: &str = "sasl.mechanisms";
pub const OAUTHBEARER_CONFIG: &str = "sasl.oauthbearer.config";
pub const OAUTHBEARER: &str = "OAUTHBEARER";

/// Hook points before and after a client handle exists
pub trait AuthHook: Send + Sync {
    /// Adjust or validate the configuration before the handle is created
    fn configure(&self, config: &mut ClientConfig) -> Result<()>;

    /// Finish setup once the handle and its background queue exist
    fn enable_background(
        &self,
        config: &ClientConfig,
        handle: &dyn BrokerHandle,
        queue: &dyn EventQueue,
    ) -> Result<()>;
}

/// SASL OAUTHBEARER setup. Inactive for any other mechanism.
#[derive(Debug, Default, Clone, Copy)]
pub struct OAuthBearerSetup {
    refresh_callback: bool,
}

impl OAuthBearerSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens are supplied by a user token-refresh callback
    pub fn with_refresh_callback(mut self) -> Self {
        self.refresh_callback = true;
        self
    }

    fn applies(config: &ClientConfig) -> bool {
        config
            .get(SASL_MECHANISMS)
            .is_some_and(|m| m.eq_ignore_ascii_case(OAUTHBEARER))
    }
}

impl AuthHook for OAuthBearerSetup {
    fn configure(&self, config: &mut ClientConfig) -> Result<()> {
        if !Self::applies(config) {
            return Ok(());
        }
        if !self.refresh_callback && !config.contains(OAUTHBEARER_CONFIG) {
            return Err(CoreError::Auth(format!(
                "{} requires a token refresh callback or {}",
                OAUTHBEARER, OAUTHBEARER_CONFIG
            )));
        }
        debug!(
            refresh_callback = self.refresh_callback,
            "configured OAUTHBEARER authentication"
        );
        Ok(())
    }

    fn enable_background(
        &self,
        config: &ClientConfig,
        handle: &dyn BrokerHandle,
        queue: &dyn EventQueue,
    ) -> Result<()> {
        if !Self::applies(config) {
            return Ok(());
        }
        handle
            .enable_sasl_background_callbacks(queue)
            .map_err(|e| CoreError::Auth(e.to_string()))
    }
}
