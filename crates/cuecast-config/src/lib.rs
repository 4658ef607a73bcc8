//! Shared configuration for the cuecast CLI and other front ends.
//!
//! TOML profiles, OBS password resolution (env + keyring + plaintext),
//! automation rules files, and translation into `cuecast_core` runtime
//! config. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cuecast_api::StreamerBotConfig;
use cuecast_core::{
    AutomationRule, CacheTtl, ClientConfig, ExecutorConfig, ReconnectPolicy, RetryPolicy,
    ThrottleConfig,
};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Keyring service name; entries are keyed `<profile>/obs-password`.
pub const KEYRING_SERVICE: &str = "cuecast";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to read rules from {path}: {reason}")]
    Rules { path: PathBuf, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named OBS profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    /// Look up a profile. The implicit `default` profile always exists and
    /// points at a local OBS.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => Err(ConfigError::UnknownProfile {
                profile: name.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Pause between batch steps in milliseconds.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    15
}
fn default_step_delay_ms() -> u64 {
    100
}

/// A named OBS profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// obs-websocket URL (e.g., "ws://127.0.0.1:4455").
    #[serde(default = "default_url")]
    pub url: String,

    /// OBS websocket password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Reconnect automatically after the connection drops.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Override the reconnect budget.
    pub max_reconnect_attempts: Option<u32>,

    /// Override the call timeout (seconds).
    pub timeout: Option<u64>,

    /// Drop no-op actions from batches instead of failing them.
    #[serde(default)]
    pub skip_redundant: bool,

    /// Automation rules file (JSON).
    pub rules: Option<PathBuf>,

    /// Streamer.bot WebSocket server, if automation actions target it.
    pub streamerbot: Option<StreamerBotProfile>,

    /// Reconnect backoff overrides.
    pub reconnect: Option<ReconnectProfile>,

    /// Cache lifetime overrides.
    pub cache: Option<CacheProfile>,

    /// Rule engine retry and throttle overrides.
    pub automation: Option<AutomationProfile>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            url: default_url(),
            password: None,
            password_env: None,
            auto_reconnect: true,
            max_reconnect_attempts: None,
            timeout: None,
            skip_redundant: false,
            rules: None,
            streamerbot: None,
            reconnect: None,
            cache: None,
            automation: None,
        }
    }
}

/// `[profiles.<name>.reconnect]`: unset keys keep the built-in backoff.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReconnectProfile {
    pub initial_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub max_delay_ms: Option<u64>,
}

/// `[profiles.<name>.cache]`: time-to-live per query category.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheProfile {
    pub scene_list_ms: Option<u64>,
    pub sources_ms: Option<u64>,
    pub status_ms: Option<u64>,
    pub default_ms: Option<u64>,
}

/// `[profiles.<name>.automation]`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AutomationProfile {
    /// Total attempts per action, including the first.
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    /// At most one rule pass per event name inside this window.
    pub throttle_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamerBotProfile {
    #[serde(default = "default_streamerbot_url")]
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_url() -> String {
    "ws://127.0.0.1:4455".into()
}
fn default_streamerbot_url() -> String {
    "ws://127.0.0.1:8080/".into()
}
fn default_true() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "cuecast", "cuecast").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cuecast");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. Layers: built-in defaults, then the TOML
/// file (if present), then `CUECAST_`-prefixed env vars with `__` as the
/// nesting separator (`CUECAST_DEFAULTS__TIMEOUT=30`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CUECAST_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the OBS password for a profile.
///
/// Order: the profile's `password_env` variable, the system keyring, then
/// plaintext in the config. `None` means authentication is off.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile
        .password
        .as_ref()
        .map(|pw| SecretString::from(pw.clone()))
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/obs-password")
}

// ── Translation into runtime config ─────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected a ws:// or wss:// URL, got scheme '{other}'"),
        }),
    }
}

/// Build a `ClientConfig` from a profile, no CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let url = parse_url("url", &profile.url)?;
    let mut config = ClientConfig::new(url);
    config.password = resolve_password(profile, profile_name);
    config.call_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.auto_reconnect = profile.auto_reconnect;
    if let Some(attempts) = profile.max_reconnect_attempts {
        config.reconnect.max_attempts = attempts;
    }
    if let Some(reconnect) = &profile.reconnect {
        apply_reconnect(&mut config.reconnect, reconnect)?;
    }
    if let Some(cache) = &profile.cache {
        apply_cache(&mut config.cache_ttl, cache);
    }
    Ok(config)
}

fn apply_reconnect(policy: &mut ReconnectPolicy, from: &ReconnectProfile) -> Result<(), ConfigError> {
    if let Some(ms) = from.initial_delay_ms {
        policy.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = from.max_delay_ms {
        policy.max_delay = Duration::from_millis(ms);
    }
    if let Some(multiplier) = from.multiplier {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::Validation {
                field: "reconnect.multiplier".into(),
                reason: format!("must be a number >= 1, got {multiplier}"),
            });
        }
        policy.multiplier = multiplier;
    }
    if policy.initial_delay > policy.max_delay {
        return Err(ConfigError::Validation {
            field: "reconnect.initial_delay_ms".into(),
            reason: "must not exceed reconnect.max_delay_ms".into(),
        });
    }
    Ok(())
}

fn apply_cache(ttl: &mut CacheTtl, from: &CacheProfile) {
    let set = |slot: &mut Duration, ms: Option<u64>| {
        if let Some(ms) = ms {
            *slot = Duration::from_millis(ms);
        }
    };
    set(&mut ttl.scene_list, from.scene_list_ms);
    set(&mut ttl.sources, from.sources_ms);
    set(&mut ttl.status, from.status_ms);
    set(&mut ttl.default, from.default_ms);
}

pub fn executor_config(profile: &Profile, defaults: &Defaults) -> ExecutorConfig {
    ExecutorConfig {
        step_delay: Duration::from_millis(defaults.step_delay_ms),
        skip_redundant: profile.skip_redundant,
    }
}

/// Rule engine retry and throttle for a profile.
pub fn automation_config(profile: &Profile) -> Result<(RetryPolicy, ThrottleConfig), ConfigError> {
    let mut retry = RetryPolicy::default();
    let mut throttle = ThrottleConfig::default();
    if let Some(auto) = &profile.automation {
        if let Some(attempts) = auto.retry_attempts {
            if attempts == 0 {
                return Err(ConfigError::Validation {
                    field: "automation.retry_attempts".into(),
                    reason: "must be at least 1".into(),
                });
            }
            retry.max_attempts = attempts;
        }
        if let Some(ms) = auto.retry_delay_ms {
            retry.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = auto.throttle_ms {
            throttle.window = Duration::from_millis(ms);
        }
    }
    Ok((retry, throttle))
}

/// Streamer.bot connection settings, if configured and enabled.
pub fn streamerbot_config(profile: &Profile) -> Result<Option<StreamerBotConfig>, ConfigError> {
    match &profile.streamerbot {
        Some(sb) if sb.enabled => {
            let url = parse_url("streamerbot.url", &sb.url)?;
            Ok(Some(StreamerBotConfig::new(url)))
        }
        _ => Ok(None),
    }
}

// ── Rules files ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RulesFile {
    Bare(Vec<AutomationRule>),
    Wrapped { rules: Vec<AutomationRule> },
}

/// Load automation rules from a JSON file: either an array of rules or an
/// object with a `rules` array.
pub fn load_rules(path: &Path) -> Result<Vec<AutomationRule>, ConfigError> {
    let rules_err = |reason: String| ConfigError::Rules {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| rules_err(e.to_string()))?;
    let file: RulesFile = serde_json::from_str(&raw).map_err(|e| rules_err(e.to_string()))?;
    let rules = match file {
        RulesFile::Bare(rules) | RulesFile::Wrapped { rules } => rules,
    };

    let mut seen = std::collections::HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(rules_err(format!("duplicate rule id '{}'", rule.id)));
        }
    }
    debug!(path = %path.display(), count = rules.len(), "rules loaded");
    Ok(rules)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.active_profile_name(), "default");
        assert_eq!(config.defaults.timeout, 15);
        assert_eq!(config.profile("default").unwrap().url, "ws://127.0.0.1:4455");
    }

    #[test]
    fn profiles_load_from_toml() {
        let file = write_temp(
            r#"
default_profile = "studio"

[defaults]
timeout = 20

[profiles.studio]
url = "ws://10.0.0.5:4455"
password = "hunter2"
max_reconnect_attempts = 8
skip_redundant = true

[profiles.studio.streamerbot]
url = "ws://10.0.0.5:8080/"
"#,
        );
        let config = load_config_from(file.path()).unwrap();
        let profile = config.profile(config.active_profile_name()).unwrap();

        let client = profile_to_client_config(&profile, "studio", &config.defaults).unwrap();
        assert_eq!(client.url.as_str(), "ws://10.0.0.5:4455/");
        assert_eq!(client.call_timeout, Duration::from_secs(20));
        assert_eq!(client.reconnect.max_attempts, 8);
        assert!(executor_config(&profile, &config.defaults).skip_redundant);
        assert!(streamerbot_config(&profile).unwrap().is_some());
    }

    #[test]
    fn policy_tables_override_defaults() {
        let file = write_temp(
            r#"
[profiles.default.reconnect]
initial_delay_ms = 250
multiplier = 2.0

[profiles.default.cache]
scene_list_ms = 10000

[profiles.default.automation]
retry_attempts = 5
throttle_ms = 1000
"#,
        );
        let config = load_config_from(file.path()).unwrap();
        let profile = config.profile("default").unwrap();

        let client = profile_to_client_config(&profile, "default", &config.defaults).unwrap();
        assert_eq!(client.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(client.reconnect.delay(2), Duration::from_secs(1));
        assert_eq!(client.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(client.cache_ttl.scene_list, Duration::from_secs(10));
        assert_eq!(client.cache_ttl.status, Duration::from_secs(1));

        let (retry, throttle) = automation_config(&profile).unwrap();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.delay, Duration::from_secs(1));
        assert_eq!(throttle.window, Duration::from_secs(1));
    }

    #[test]
    fn bad_policy_values_are_rejected() {
        let shrinking = Profile {
            reconnect: Some(ReconnectProfile {
                multiplier: Some(0.5),
                ..ReconnectProfile::default()
            }),
            ..Profile::default()
        };
        let err = profile_to_client_config(&shrinking, "default", &Defaults::default()).unwrap_err();
        assert!(err.to_string().contains("reconnect.multiplier"));

        let no_attempts = Profile {
            automation: Some(AutomationProfile {
                retry_attempts: Some(0),
                ..AutomationProfile::default()
            }),
            ..Profile::default()
        };
        assert!(automation_config(&no_attempts).is_err());
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[defaults]\ntimeout = 20\n")?;
            jail.set_env("CUECAST_DEFAULTS__TIMEOUT", "45");
            let config = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(config.defaults.timeout, 45);
            Ok(())
        });
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CUECAST_TEST_OBS_PASSWORD", "from-env");
            let profile = Profile {
                password_env: Some("CUECAST_TEST_OBS_PASSWORD".into()),
                password: Some("from-file".into()),
                ..Profile::default()
            };
            let secret = resolve_password(&profile, "jail").unwrap();
            assert_eq!(secrecy::ExposeSecret::expose_secret(&secret), "from-env");
            Ok(())
        });
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.profile("nope"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn http_url_is_rejected() {
        let profile = Profile {
            url: "http://127.0.0.1:4455".into(),
            ..Profile::default()
        };
        let err = profile_to_client_config(&profile, "default", &Defaults::default()).unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn rules_load_in_both_shapes() {
        let rule = r#"{
            "id": "brb",
            "name": "BRB music",
            "trigger": { "eventName": "CurrentProgramSceneChanged", "eventData": { "sceneName": "BRB" } },
            "actions": [ { "type": "streamerbot", "data": { "actionName": "Play BRB" } } ]
        }"#;
        let bare = write_temp(&format!("[{rule}]"));
        let wrapped = write_temp(&format!(r#"{{ "rules": [{rule}] }}"#));

        let a = load_rules(bare.path()).unwrap();
        let b = load_rules(wrapped.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].trigger.event_name, "CurrentProgramSceneChanged");
        assert!(a[0].enabled);
    }

    #[test]
    fn duplicate_rule_ids_are_rejected() {
        let file = write_temp(
            r#"[
                { "id": "x", "name": "one", "trigger": { "eventName": "A" }, "actions": [] },
                { "id": "x", "name": "two", "trigger": { "eventName": "B" }, "actions": [] }
            ]"#,
        );
        let err = load_rules(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate rule id 'x'"));
    }
}
