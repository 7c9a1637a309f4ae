use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::Context;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Defaults, then the config file, then the environment. CLI flags are applied by the caller.
pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match parse_file_settings(&raw) {
            Ok(file_cfg) => apply_overrides(&mut settings, |key| file_cfg.get(key).cloned()),
            Err(err) => tracing::warn!(
                path = %config_path.display(),
                error = %err,
                "config: ignoring unreadable file"
            ),
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Reads a flat `key = value` table. Non-string values are kept in their TOML spelling.
pub fn parse_file_settings(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let table: toml::Table = toml::from_str(raw).context("config file is not valid TOML")?;
    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("server_url") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("poll_interval_ms") {
        set_poll_interval(settings, &v);
    }
}

pub fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("GAME_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = lookup("APP__POLL_INTERVAL_MS") {
        set_poll_interval(settings, &v);
    }
}

fn set_poll_interval(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => settings.poll_interval_ms = parsed,
        _ => tracing::warn!(value = raw, "config: ignoring invalid poll interval"),
    }
}

pub fn normalize_server_url(raw_server_url: &str) -> anyhow::Result<String> {
    let raw_server_url = raw_server_url.trim().trim_end_matches('/');

    if raw_server_url.is_empty() {
        return Ok(DEFAULT_SERVER_URL.to_string());
    }

    let server_url = if raw_server_url.contains("://") {
        raw_server_url.to_string()
    } else {
        format!("http://{raw_server_url}")
    };

    Url::parse(&server_url)
        .with_context(|| format!("invalid server url '{raw_server_url}'"))?;
    Ok(server_url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
