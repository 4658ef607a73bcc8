//! CLI configuration: thin wrapper around `cuecast_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--url, --password-env, --timeout).

use std::time::Duration;

use cuecast_core::ClientConfig;
use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use cuecast_config::{
    Config, Defaults, Profile, config_path, load_config, load_config_or_default, save_config,
};

/// Everything a connected command needs, resolved once.
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub defaults: Defaults,
    pub client: ClientConfig,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Load config, pick the profile, and apply flag overrides.
///
/// Flags beat profile values; the profile beats built-in defaults.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);
    let mut profile = cfg.profile(&profile_name).map_err(|e| match e {
        cuecast_config::ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
            available: available_profiles(&cfg),
            name: profile,
        },
        other => other.into(),
    })?;

    // 1. URL (flag > env > profile)
    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }

    let mut client =
        cuecast_config::profile_to_client_config(&profile, &profile_name, &cfg.defaults)?;

    // 2. Password (named env var from the flag wins over the profile chain)
    if let Some(ref env_name) = global.password_env {
        let value = std::env::var(env_name).map_err(|_| CliError::Validation {
            field: "password-env".into(),
            reason: format!("environment variable {env_name} is not set"),
        })?;
        client.password = Some(SecretString::from(value));
    }

    // 3. Timeout
    if let Some(secs) = global.timeout {
        client.call_timeout = Duration::from_secs(secs);
    }

    Ok(Resolved {
        profile_name,
        profile,
        defaults: cfg.defaults,
        client,
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}
