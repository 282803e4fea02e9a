use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "tracker.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub service_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub log_filter: String,
    pub operator: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:5000/api".into(),
            poll_interval_ms: 500,
            request_timeout_ms: 5000,
            log_filter: "info".into(),
            operator: "admin".into(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

/// Defaults, then `tracker.toml` (or `config_path`), then environment
/// variables. For each setting the `APP__` variable wins over the plain one.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw)
                    .with_context(|| format!("invalid config file {DEFAULT_CONFIG_FILE}"))?;
            }
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok())?;
    settings.service_url = normalize_service_url(&settings.service_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<()> {
    let file_cfg: HashMap<String, toml::Value> = toml::from_str(raw)?;
    for (key, value) in &file_cfg {
        match value {
            toml::Value::String(text) => apply_value(settings, key, text)?,
            other => apply_value(settings, key, &other.to_string())?,
        }
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    for key in [
        "service_url",
        "poll_interval_ms",
        "request_timeout_ms",
        "log_filter",
        "operator",
    ] {
        let plain = key.to_ascii_uppercase();
        let prefixed = format!("APP__{plain}");
        for name in [plain, prefixed] {
            if let Some(value) = lookup(&name) {
                apply_value(settings, key, &value).with_context(|| format!("invalid {name}"))?;
            }
        }
    }
    Ok(())
}

fn apply_value(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "service_url" => settings.service_url = value.to_string(),
        "poll_interval_ms" => {
            settings.poll_interval_ms = value
                .trim()
                .parse()
                .with_context(|| format!("poll_interval_ms must be a number, got {value:?}"))?;
        }
        "request_timeout_ms" => {
            settings.request_timeout_ms = value
                .trim()
                .parse()
                .with_context(|| format!("request_timeout_ms must be a number, got {value:?}"))?;
        }
        "log_filter" => settings.log_filter = value.to_string(),
        "operator" => settings.operator = value.to_string(),
        _ => {}
    }
    Ok(())
}

pub fn normalize_service_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Settings::default().service_url);
    }
    let parsed = Url::parse(raw).with_context(|| format!("invalid service url '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("service url must use http or https, got '{raw}'");
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
