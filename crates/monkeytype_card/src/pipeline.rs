//! The single card pipeline shared by the HTTP endpoint and the CLI.
//!
//! resolve theme → fetch personal best → render. Stats failures never escape:
//! they zero the numbers and are reported next to the card.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::MonkeytypeClient;
use crate::config::Settings;
use crate::error::{CardError, Result};
use crate::render::{RenderParams, mode_label, render_svg};
use crate::stats::{ProfileSource, StatsFetcher};
use crate::theme::{DEFAULT_THEME_NAME, Theme, ThemeCache, ThemeResolver, ThemeSource};

pub const DEFAULT_USERNAME: &str = "Guest";
pub const DEFAULT_MODE: &str = "time";
pub const DEFAULT_LENGTH: &str = "60";

/// Plain parameters for one card, already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRequest {
    pub username: String,
    pub theme: String,
    pub mode: String,
    pub length: String,
    pub transparent: bool,
}

impl Default for CardRequest {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            theme: DEFAULT_THEME_NAME.to_string(),
            mode: DEFAULT_MODE.to_string(),
            length: DEFAULT_LENGTH.to_string(),
            transparent: false,
        }
    }
}

impl CardRequest {
    /// Builds a request where missing or empty values take their defaults.
    #[must_use]
    pub fn from_optional(
        username: Option<&str>,
        theme: Option<&str>,
        mode: Option<&str>,
        length: Option<&str>,
        transparent: bool,
    ) -> Self {
        fn or_default(value: Option<&str>, default: &str) -> String {
            value
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
                .to_string()
        }

        Self {
            username: or_default(username, DEFAULT_USERNAME),
            theme: or_default(theme, DEFAULT_THEME_NAME),
            mode: or_default(mode, DEFAULT_MODE),
            length: or_default(length, DEFAULT_LENGTH),
            transparent,
        }
    }

    #[must_use]
    pub fn mode_label(&self) -> String {
        mode_label(&self.mode, &self.length)
    }
}

#[derive(Debug)]
pub struct CardOutcome {
    pub svg: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub theme: Theme,
    /// Why the numbers are zero, when they are zero because of a failure.
    pub stats_error: Option<CardError>,
}

pub struct CardService {
    themes: ThemeResolver,
    stats: StatsFetcher,
}

impl CardService {
    #[must_use]
    pub fn new(
        themes: Arc<dyn ThemeSource>,
        profiles: Arc<dyn ProfileSource>,
        cache: Arc<ThemeCache>,
    ) -> Self {
        Self {
            themes: ThemeResolver::new(themes, cache),
            stats: StatsFetcher::new(profiles),
        }
    }

    /// Service backed by the real upstreams.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Arc::new(MonkeytypeClient::new(settings)?);
        Ok(Self::new(
            Arc::clone(&client) as Arc<dyn ThemeSource>,
            client,
            Arc::new(ThemeCache::new()),
        ))
    }

    #[must_use]
    pub fn theme_cache(&self) -> &ThemeCache {
        self.themes.cache()
    }

    /// Always produces a well-formed card.
    pub fn generate(&self, request: &CardRequest) -> CardOutcome {
        let theme = self.themes.resolve(&request.theme);

        let fetched = self
            .stats
            .fetch(&request.username, &request.mode, &request.length);
        let (wpm, accuracy, stats_error) = match fetched {
            Ok(record) => (record.wpm, record.acc, None),
            Err(error) => {
                warn!(
                    user = %request.username,
                    mode = %request.mode,
                    length = %request.length,
                    %error,
                    "stats unavailable, rendering zeros"
                );
                (0.0, 0.0, Some(error))
            }
        };

        let label = request.mode_label();
        let svg = render_svg(&RenderParams {
            username: &request.username,
            mode_label: &label,
            wpm,
            accuracy,
            theme: &theme,
            transparent: request.transparent,
        });

        info!(
            user = %request.username,
            theme = %theme.name,
            mode = %label,
            wpm,
            accuracy,
            "card generated"
        );

        CardOutcome {
            svg,
            wpm,
            accuracy,
            theme,
            stats_error,
        }
    }
}
