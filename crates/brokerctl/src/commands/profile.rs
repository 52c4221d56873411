//! Profile management command implementations

use crate::cli::{OutputFormat, ProfileCommands, ProfileSetArgs};
use crate::connection::ConnectionManager;
use crate::error::{BrokerCtlError, Result as CliResult};
use crate::output;
use anyhow::Context;
use brokerctl_core::config::{CredentialStore, Profile, SandboxSettings};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, info};

const MASK: &str = "********";

pub fn handle_profile_command(
    cmd: &ProfileCommands,
    conn_mgr: &mut ConnectionManager,
    output_format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    match cmd {
        ProfileCommands::List => handle_list(conn_mgr, output_format, query),
        ProfileCommands::Path => handle_path(conn_mgr, output_format),
        ProfileCommands::Show { name } => handle_show(conn_mgr, name, output_format, query),
        ProfileCommands::Set(args) => handle_set(conn_mgr, args),
        ProfileCommands::Remove { name } => handle_remove(conn_mgr, name),
        ProfileCommands::Default { name } => handle_default(conn_mgr, name),
        ProfileCommands::Validate => handle_validate(conn_mgr, output_format),
    }
}

#[derive(Serialize)]
struct ProfileSummary<'a> {
    name: &'a str,
    bootstrap_servers: &'a str,
    security_protocol: String,
    sasl_mechanism: Option<&'a str>,
    sandbox: bool,
    default: bool,
}

fn handle_list(
    conn_mgr: &ConnectionManager,
    output_format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    let config = &conn_mgr.config;
    let profiles = config.list_profiles();
    debug!("Found {} profiles", profiles.len());

    if profiles.is_empty() && output::resolve_format(output_format, query) == OutputFormat::Table {
        println!("No profiles configured.");
        println!("Use 'brokerctl profile set' to create a profile.");
        return Ok(());
    }

    let summaries: Vec<ProfileSummary<'_>> = profiles
        .iter()
        .map(|(name, profile)| ProfileSummary {
            name,
            bootstrap_servers: &profile.bootstrap_servers,
            security_protocol: profile
                .security_protocol
                .map(|p| p.to_string())
                .unwrap_or_else(|| "plaintext".to_string()),
            sasl_mechanism: profile.sasl_mechanism.as_deref(),
            sandbox: profile.is_sandbox(),
            default: config.default_profile.as_deref() == Some(name.as_str()),
        })
        .collect();

    output::print_output(&summaries, output_format, query)
}

fn handle_path(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    let path = conn_mgr
        .display_path()
        .ok_or_else(|| BrokerCtlError::Configuration("cannot determine config path".into()))?;

    match output_format {
        OutputFormat::Json | OutputFormat::Yaml => output::print_output(
            serde_json::json!({ "config_path": path.display().to_string() }),
            output_format,
            None,
        ),
        _ => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Copy of a profile that is safe to print
fn redacted(profile: &Profile) -> Profile {
    let mut shown = profile.clone();
    if let Some(password) = &shown.sasl_password
        && !CredentialStore::is_keyring_reference(password)
    {
        shown.sasl_password = Some(MASK.to_string());
    }
    shown
}

fn handle_show(
    conn_mgr: &ConnectionManager,
    name: &str,
    output_format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    let profile = conn_mgr
        .config
        .profiles
        .get(name)
        .ok_or_else(|| BrokerCtlError::ProfileNotFound {
            name: name.to_string(),
        })?;

    let mut value = serde_json::to_value(redacted(profile))?;
    if let serde_json::Value::Object(ref mut obj) = value {
        obj.insert("name".to_string(), name.into());
        obj.insert(
            "default".to_string(),
            (conn_mgr.config.default_profile.as_deref() == Some(name)).into(),
        );
    }
    output::print_output(value, output_format, query)
}

fn handle_set(conn_mgr: &mut ConnectionManager, args: &ProfileSetArgs) -> CliResult<()> {
    let name = &args.name;
    debug!("Setting profile '{}'", name);

    let password = match (&args.sasl_username, &args.sasl_password) {
        (Some(_), Some(password)) => Some(password.clone()),
        (Some(user), None) if !is_oauthbearer(args.sasl_mechanism.as_deref()) => Some(
            rpassword::prompt_password(format!("SASL password for {}: ", user))
                .context("Failed to read password")?,
        ),
        _ => None,
    };

    #[cfg(feature = "secure-storage")]
    let password = match password {
        Some(password) if args.use_keyring => {
            let reference = CredentialStore::new()
                .store_credential(&format!("{}-sasl-password", name), &password)
                .context("Failed to store SASL password in keyring")?;
            println!("SASL password stored in OS keyring");
            Some(reference)
        }
        other => other,
    };

    let profile = Profile {
        bootstrap_servers: args.bootstrap_servers.clone(),
        client_id: args.client_id.clone(),
        security_protocol: args.security_protocol,
        sasl_mechanism: args.sasl_mechanism.clone(),
        sasl_username: args.sasl_username.clone(),
        sasl_password: password,
        oauthbearer_config: args.oauthbearer_config.clone(),
        request_timeout_ms: args.request_timeout_ms,
        concurrency: args.concurrency.map(|c| c as usize),
        properties: args.properties.iter().cloned().collect(),
        sandbox: args.sandbox_state.as_ref().map(|path| SandboxSettings {
            state_file: Some(path.clone()),
            latency_ms: args.sandbox_latency_ms,
        }),
    };
    profile.validate(name)?;

    let replaced = conn_mgr.config.profiles.contains_key(name);
    conn_mgr.config.set_profile(name.clone(), profile);
    if conn_mgr.config.default_profile.is_none() && conn_mgr.config.profiles.len() == 1 {
        conn_mgr.config.default_profile = Some(name.clone());
    }
    conn_mgr.save_config()?;

    info!("Profile '{}' saved", name);
    println!(
        "Profile '{}' {}",
        name,
        if replaced { "updated" } else { "created" }
    );
    Ok(())
}

fn is_oauthbearer(mechanism: Option<&str>) -> bool {
    mechanism.is_some_and(|m| m.eq_ignore_ascii_case("OAUTHBEARER"))
}

fn handle_remove(conn_mgr: &mut ConnectionManager, name: &str) -> CliResult<()> {
    let removed = conn_mgr
        .config
        .remove_profile(name)
        .ok_or_else(|| BrokerCtlError::ProfileNotFound {
            name: name.to_string(),
        })?;

    if let Some(password) = &removed.sasl_password {
        CredentialStore::new().delete_credential(password)?;
    }
    conn_mgr.save_config()?;

    println!("Profile '{}' removed", name);
    Ok(())
}

fn handle_default(conn_mgr: &mut ConnectionManager, name: &str) -> CliResult<()> {
    if !conn_mgr.config.profiles.contains_key(name) {
        return Err(BrokerCtlError::ProfileNotFound {
            name: name.to_string(),
        });
    }
    conn_mgr.config.default_profile = Some(name.to_string());
    conn_mgr.save_config()?;

    println!("Default profile set to '{}'", name);
    Ok(())
}

#[derive(Serialize)]
struct ValidationReport {
    config_path: Option<String>,
    profiles: Vec<ProfileCheck>,
    default_profile: Option<String>,
    valid: bool,
}

#[derive(Serialize)]
struct ProfileCheck {
    name: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn handle_validate(conn_mgr: &ConnectionManager, output_format: OutputFormat) -> CliResult<()> {
    let config = &conn_mgr.config;

    let mut profiles = Vec::new();
    for (name, profile) in config.list_profiles() {
        let result = profile
            .validate(name)
            .and_then(|_| profile.to_client_config().map(drop));
        profiles.push(ProfileCheck {
            name: name.clone(),
            valid: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        });
    }

    let default_ok = config
        .default_profile
        .as_ref()
        .is_none_or(|name| config.profiles.contains_key(name));
    let report = ValidationReport {
        config_path: conn_mgr.display_path().map(|p| p.display().to_string()),
        valid: default_ok && profiles.iter().all(|p| p.valid),
        default_profile: config.default_profile.clone(),
        profiles,
    };

    match output_format {
        OutputFormat::Json | OutputFormat::Yaml => {
            output::print_output(&report, output_format, None)?
        }
        _ => print_report(&report, default_ok),
    }

    if report.valid {
        Ok(())
    } else {
        Err(BrokerCtlError::Configuration(
            "configuration has invalid entries".to_string(),
        ))
    }
}

fn print_report(report: &ValidationReport, default_ok: bool) {
    let ok = "\u{2713}".green();
    let bad = "\u{2717}".red();

    if let Some(path) = &report.config_path {
        println!("Configuration file: {}", path);
    }
    println!("{} Found {} profile(s)", ok, report.profiles.len());
    println!();

    for check in &report.profiles {
        match &check.error {
            None => println!("Profile '{}': {} Valid", check.name, ok),
            Some(err) => println!("Profile '{}': {} {}", check.name, bad, err),
        }
    }

    if let Some(default) = &report.default_profile {
        println!();
        if default_ok {
            println!("{} Default profile: {}", ok, default);
        } else {
            println!("{} Default profile '{}' does not exist", bad, default);
        }
    }

    println!();
    if report.valid {
        println!("{} Configuration is valid", ok);
    } else {
        println!("{} Configuration has errors", bad);
    }
}
