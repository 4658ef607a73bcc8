//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn check_ws_url(field: &str, raw: &str) -> Result<(), CliError> {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => Ok(()),
        _ => Err(CliError::Validation {
            field: field.into(),
            reason: format!("expected a ws:// or wss:// URL, got '{raw}'"),
        }),
    }
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Password")]
    password: String,
    #[tabled(rename = "Streamer.bot")]
    streamerbot: String,
    #[tabled(rename = "Rules")]
    rules: String,
}

impl ProfileRow {
    fn new(name: &str, profile: &Profile, is_default: bool) -> Self {
        let password = match (&profile.password_env, &profile.password) {
            (Some(var), _) => format!("env {var}"),
            (None, Some(_)) => "plaintext".into(),
            (None, None) => "keyring / none".into(),
        };
        let streamerbot = match &profile.streamerbot {
            Some(bot) if bot.enabled => bot.url.clone(),
            Some(_) => "disabled".into(),
            None => "-".into(),
        };
        Self {
            name: if is_default {
                format!("{name} *")
            } else {
                name.to_owned()
            },
            url: profile.url.clone(),
            password,
            streamerbot,
            rules: profile
                .rules
                .as_ref()
                .map_or_else(|| "-".into(), |p| p.display().to_string()),
        }
    }
}

/// Copy of the config with plaintext passwords blanked.
fn masked(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, profile)| {
            let mut profile = profile.clone();
            if profile.password.is_some() {
                profile.password = Some("********".into());
            }
            (name.clone(), profile)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: cfg.defaults.clone(),
        profiles,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = masked(&config::load_config()?);
            let default = cfg.active_profile_name().to_owned();
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| {
                    let mut names: Vec<_> = c.profiles.keys().collect();
                    names.sort();
                    let rows: Vec<ProfileRow> = names
                        .into_iter()
                        .map(|name| ProfileRow::new(name, &c.profiles[name], *name == default))
                        .collect();
                    if rows.is_empty() {
                        format!(
                            "No profiles configured; using {} for 'default'. Run: cuecast config init",
                            Profile::default().url
                        )
                    } else {
                        output::render_table(&rows)
                    }
                },
                |c| {
                    let mut names: Vec<_> = c.profiles.keys().cloned().collect();
                    names.sort();
                    names.join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            cfg.profile(&profile_name).map_err(|_| CliError::ProfileNotFound {
                name: profile_name.clone(),
                available: config::available_profiles(&cfg),
            })?;

            let secret = rpassword::prompt_password("OBS websocket password: ").map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            cuecast_config::store_password(&profile_name, &secret)?;
            eprintln!("\u{2713} Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path();
    eprintln!("cuecast configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let mut cfg = config::load_config_or_default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    if cfg.profiles.contains_key(&profile_name)
        && !util::confirm(
            &format!("Profile '{profile_name}' exists. Overwrite it?"),
            global.yes,
        )?
    {
        eprintln!("Aborted.");
        return Ok(());
    }

    let url: String = Input::new()
        .with_prompt("OBS websocket URL")
        .default(Profile::default().url)
        .interact_text()
        .map_err(prompt_err)?;
    check_ws_url("url", &url)?;

    let mut profile = Profile {
        url,
        ..Profile::default()
    };

    let password =
        rpassword::prompt_password("OBS websocket password (empty for none): ").map_err(prompt_err)?;
    if !password.is_empty() {
        let choices = &[
            "Store in system keyring (recommended)",
            "Save to config file (plaintext)",
        ];
        let selection = Select::new()
            .with_prompt("Where to store the password?")
            .items(choices)
            .default(0)
            .interact()
            .map_err(prompt_err)?;
        if selection == 0 {
            cuecast_config::store_password(&profile_name, &password)?;
            eprintln!("   \u{2713} Password stored in system keyring");
        } else {
            profile.password = Some(password);
        }
    }

    let wants_bot = Confirm::new()
        .with_prompt("Connect automation rules to Streamer.bot?")
        .default(false)
        .interact()
        .map_err(prompt_err)?;
    if wants_bot {
        let bot_url: String = Input::new()
            .with_prompt("Streamer.bot websocket URL")
            .default("ws://127.0.0.1:8080/".into())
            .interact_text()
            .map_err(prompt_err)?;
        check_ws_url("streamerbot.url", &bot_url)?;
        profile.streamerbot = Some(cuecast_config::StreamerBotProfile {
            url: bot_url,
            enabled: true,
        });
    }

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    let written = config::save_config(&cfg)?;
    eprintln!("\n\u{2713} Configuration written to {}", written.display());
    eprintln!("  Active profile: {}", cfg.active_profile_name());
    eprintln!("\n  Test it: cuecast status");
    Ok(())
}
