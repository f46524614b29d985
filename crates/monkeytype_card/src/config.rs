use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CardError, Result};

pub const DEFAULT_THEMES_URL: &str =
    "https://raw.githubusercontent.com/monkeytypegame/monkeytype/master/frontend/static/themes";
pub const DEFAULT_PROFILE_API_URL: &str = "https://api.monkeytype.com";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_OUTPUT: &str = "stats.svg";

pub const ENV_PREFIX: &str = "MONKEYTYPE_CARD_";

const KEY_THEMES_URL: &str = "THEMES_URL";
const KEY_PROFILE_API_URL: &str = "PROFILE_API_URL";
const KEY_THEME_TIMEOUT_MS: &str = "THEME_TIMEOUT_MS";
const KEY_STATS_TIMEOUT_MS: &str = "STATS_TIMEOUT_MS";
const KEY_BIND: &str = "BIND";
const KEY_OUTPUT: &str = "OUTPUT";

const KNOWN_KEYS: [&str; 6] = [
    KEY_THEMES_URL,
    KEY_PROFILE_API_URL,
    KEY_THEME_TIMEOUT_MS,
    KEY_STATS_TIMEOUT_MS,
    KEY_BIND,
    KEY_OUTPUT,
];

/// Runtime settings shared by the `generate` and `serve` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub themes_url: String,
    pub profile_api_url: String,
    pub theme_timeout: Duration,
    pub stats_timeout: Duration,
    pub bind: String,
    pub output: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            themes_url: DEFAULT_THEMES_URL.to_string(),
            profile_api_url: DEFAULT_PROFILE_API_URL.to_string(),
            // Hosted functions have tight deadlines; keep the theme lookup short.
            theme_timeout: Duration::from_secs(2),
            stats_timeout: Duration::from_secs(3),
            bind: DEFAULT_BIND.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl Settings {
    /// Defaults, then the optional config file, then `MONKEYTYPE_CARD_*`
    /// environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(path) = config_file {
            let content = fs::read_to_string(path).map_err(|error| {
                CardError::invalid(format!(
                    "cannot read config file {}: {error}",
                    path.display()
                ))
            })?;
            settings.apply(&ConfigValues::from_content(&content))?;
        }

        settings.apply(&ConfigValues::from_env())?;
        Ok(settings)
    }

    pub fn apply(&mut self, values: &ConfigValues) -> Result<()> {
        if let Some(url) = values.get(KEY_THEMES_URL) {
            self.themes_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = values.get(KEY_PROFILE_API_URL) {
            self.profile_api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = values.get_millis(KEY_THEME_TIMEOUT_MS)? {
            self.theme_timeout = timeout;
        }
        if let Some(timeout) = values.get_millis(KEY_STATS_TIMEOUT_MS)? {
            self.stats_timeout = timeout;
        }
        if let Some(bind) = values.get(KEY_BIND) {
            self.bind = bind.to_string();
        }
        if let Some(output) = values.get(KEY_OUTPUT) {
            self.output = PathBuf::from(output);
        }
        Ok(())
    }
}

/// Flat key/value configuration, either from an env-style file or from the
/// process environment with the prefix stripped.
#[derive(Debug, Clone, Default)]
pub struct ConfigValues {
    pub values: BTreeMap<String, String>,
}

impl ConfigValues {
    #[must_use]
    pub fn from_content(content: &str) -> Self {
        Self {
            values: parse_config_content(content),
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let values = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(ENV_PREFIX)?;
                KNOWN_KEYS
                    .contains(&key)
                    .then(|| (key.to_string(), value))
            })
            .collect();
        Self { values }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn get_millis(&self, key: &str) -> Result<Option<Duration>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let millis = raw
            .parse::<u64>()
            .map_err(|_| CardError::invalid(format!("{key} must be milliseconds, got {raw:?}")))?;
        if millis == 0 {
            return Err(CardError::invalid(format!("{key} must be at least 1")));
        }
        Ok(Some(Duration::from_millis(millis)))
    }
}

#[must_use]
pub fn parse_config_content(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim().to_string();
        let mut value = value_raw.trim().to_string();

        if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            value = value[1..value.len() - 1].to_string();
        }

        values.insert(key, value);
    }

    values
}
