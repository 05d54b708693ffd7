use std::{collections::HashMap, time::Duration};

use client_core::ClientSettings;
use tracing::warn;

pub const SETTINGS_FILE: &str = "console.toml";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8443";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub server_url: String,
    pub client: ClientSettings,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            client: ClientSettings::default(),
        }
    }
}

fn millis(raw: &str) -> Option<Duration> {
    raw.parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Layers defaults, then the settings file, then environment overrides.
pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ConsoleSettings {
    let mut settings = ConsoleSettings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("server_url") {
                    settings.server_url = v.clone();
                }
                if let Some(v) = file_cfg.get("mutation_timeout_ms").and_then(|v| millis(v)) {
                    settings.client.mutation_timeout = v;
                }
                if let Some(v) = file_cfg.get("reconnect_initial_ms").and_then(|v| millis(v)) {
                    settings.client.reconnect.initial = v;
                }
                if let Some(v) = file_cfg.get("reconnect_max_ms").and_then(|v| millis(v)) {
                    settings.client.reconnect.max = v;
                }
            }
            Err(error) => warn!(%error, "ignoring unreadable {SETTINGS_FILE}"),
        }
    }

    if let Some(v) = env("CONSOLE__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("CONSOLE__MUTATION_TIMEOUT_MS").and_then(|v| millis(&v)) {
        settings.client.mutation_timeout = v;
    }

    if settings.client.reconnect.max < settings.client.reconnect.initial {
        settings.client.reconnect.max = settings.client.reconnect.initial;
    }
    settings
}
