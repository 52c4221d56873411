//! Profile configuration shared by the library and the CLI
//!
// Nested config module mirrors the file layout
#![allow(clippy::module_inception)]
//!
//! - Multiple named profiles, one per cluster
//! - `${VAR}` / `${VAR:-default}` expansion when loading
//! - SASL passwords in plaintext, from the environment, or in the OS keyring
//!   (feature `secure-storage`)
//! - Platform-specific config file location

pub mod config;
pub mod credential;
pub mod error;

pub use config::{Config, Profile, SASL_PASSWORD_ENV, SandboxSettings, SecurityProtocol};
pub use credential::{CredentialStorage, CredentialStore};
pub use error::{ConfigError, Result};
