use std::{fs, io, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::{DEFAULT_CHANNEL_COUNT, DEFAULT_CONTROLLER_NAME};

pub const DEFAULT_CONFIG_FILE: &str = "pwmctl.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub name: String,
    pub channels: u32,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: DEFAULT_CONTROLLER_NAME.into(),
            channels: DEFAULT_CHANNEL_COUNT,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    name: Option<String>,
    channels: Option<u32>,
    log: Option<String>,
}

/// Defaults, then the config file, then environment variables.
///
/// An explicit `path` must exist; the default `pwmctl.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let raw = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?,
        ),
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to read '{DEFAULT_CONFIG_FILE}'")));
            }
        },
    };

    if let Some(raw) = raw {
        let file_cfg: FileSettings = toml::from_str(&raw).context("invalid pwmctl config")?;
        apply_file(&mut settings, file_cfg);
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.name {
        settings.name = v;
    }
    if let Some(v) = file_cfg.channels {
        settings.channels = v;
    }
    if let Some(v) = file_cfg.log {
        settings.log_filter = v;
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PWMCTL_NAME") {
        settings.name = v;
    }
    if let Some(v) = lookup("APP__NAME") {
        settings.name = v;
    }

    for key in ["PWMCTL_CHANNELS", "APP__CHANNELS"] {
        if let Some(v) = lookup(key) {
            if let Ok(parsed) = v.trim().parse::<u32>() {
                settings.channels = parsed;
            }
        }
    }

    if let Some(v) = lookup("PWMCTL_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = lookup("APP__LOG") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
