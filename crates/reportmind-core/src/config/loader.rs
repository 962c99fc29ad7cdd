//! Config loader — reads `~/.reportmind/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.reportmind/config.json`
//! 3. Environment variables `REPORTMIND_<SECTION>__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderFlavor};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `REPORTMIND_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `REPORTMIND_AGENT__MODEL`, `__MAX_TOKENS`, `__TEMPERATURE`,
///   `__MODEL_TIMEOUT_SECS`, `__TEXT_TOOL_CALL_FALLBACK`
/// - `REPORTMIND_AGENT__COMPACTION__THRESHOLD`, `__KEEP_RECENT`
/// - `REPORTMIND_PROVIDER__FLAVOR`, `__API_KEY`, `__API_BASE`, `__API_VERSION`,
///   `__DEPLOYMENT`
/// - `REPORTMIND_TOOLS__PYTHON`, `__SCRIPTS_DIR`, `__DATA_DIR`, `__TIMEOUT_SECS`
/// - `REPORTMIND_ATTACHMENTS__RAW_DIR`, `REPORTMIND_ATTACHMENTS__AUTH__CLIENT_ID`,
///   `REPORTMIND_ATTACHMENTS__AUTH__CLIENT_SECRET`
/// - `REPORTMIND_SESSIONS__PERSIST`, `__DIR`
fn apply_env_overrides(mut config: Config) -> Config {
    // Agent
    override_string("REPORTMIND_AGENT__MODEL", &mut config.agent.model);
    override_parsed("REPORTMIND_AGENT__MAX_TOKENS", &mut config.agent.max_tokens);
    override_parsed("REPORTMIND_AGENT__TEMPERATURE", &mut config.agent.temperature);
    override_parsed(
        "REPORTMIND_AGENT__MODEL_TIMEOUT_SECS",
        &mut config.agent.model_timeout_secs,
    );
    override_bool(
        "REPORTMIND_AGENT__TEXT_TOOL_CALL_FALLBACK",
        &mut config.agent.text_tool_call_fallback,
    );
    override_parsed(
        "REPORTMIND_AGENT__COMPACTION__THRESHOLD",
        &mut config.agent.compaction.threshold,
    );
    override_parsed(
        "REPORTMIND_AGENT__COMPACTION__KEEP_RECENT",
        &mut config.agent.compaction.keep_recent,
    );

    // Provider
    if let Ok(val) = std::env::var("REPORTMIND_PROVIDER__FLAVOR") {
        match val.to_lowercase().as_str() {
            "openai" => config.provider.flavor = ProviderFlavor::OpenAi,
            "azure" => config.provider.flavor = ProviderFlavor::Azure,
            other => warn!("Ignoring unknown provider flavor '{}'", other),
        }
    }
    override_string("REPORTMIND_PROVIDER__API_KEY", &mut config.provider.api_key);
    if let Ok(val) = std::env::var("REPORTMIND_PROVIDER__API_BASE") {
        config.provider.api_base = Some(val);
    }
    override_string(
        "REPORTMIND_PROVIDER__API_VERSION",
        &mut config.provider.api_version,
    );
    if let Ok(val) = std::env::var("REPORTMIND_PROVIDER__DEPLOYMENT") {
        config.provider.deployment = Some(val);
    }

    // Tools
    override_string("REPORTMIND_TOOLS__PYTHON", &mut config.tools.python);
    override_string("REPORTMIND_TOOLS__SCRIPTS_DIR", &mut config.tools.scripts_dir);
    override_string("REPORTMIND_TOOLS__DATA_DIR", &mut config.tools.data_dir);
    override_parsed("REPORTMIND_TOOLS__TIMEOUT_SECS", &mut config.tools.timeout_secs);

    // Attachments
    override_string("REPORTMIND_ATTACHMENTS__RAW_DIR", &mut config.attachments.raw_dir);
    override_string(
        "REPORTMIND_ATTACHMENTS__AUTH__CLIENT_ID",
        &mut config.attachments.auth.client_id,
    );
    override_string(
        "REPORTMIND_ATTACHMENTS__AUTH__CLIENT_SECRET",
        &mut config.attachments.auth.client_secret,
    );

    // Sessions
    override_bool("REPORTMIND_SESSIONS__PERSIST", &mut config.sessions.persist);
    override_string("REPORTMIND_SESSIONS__DIR", &mut config.sessions.dir);

    config
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(val) = std::env::var(var) {
        *target = val;
    }
}

fn override_bool(var: &str, target: &mut bool) {
    if let Ok(val) = std::env::var(var) {
        *target = val == "true" || val == "1";
    }
}

fn override_parsed<T: FromStr>(var: &str, target: &mut T) {
    if let Ok(val) = std::env::var(var) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("Ignoring unparsable value for {}: '{}'", var, val),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
