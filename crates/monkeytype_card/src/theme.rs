//! Theme resolution: cached, fetched from the Monkeytype theme stylesheets,
//! or the built-in `dark` palette when the network lets us down.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex_lite::Regex;
use tracing::{debug, warn};

use crate::error::Result;

pub const DEFAULT_THEME_NAME: &str = "dark";

const DEFAULT_BG: &str = "#2c2e31";
const DEFAULT_MAIN: &str = "#e2b714";
const DEFAULT_SUB: &str = "#646669";
const DEFAULT_TEXT: &str = "#d1d0c5";

static COLOR_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"--([a-z-]+)-color:\s*(#[0-9a-fA-F]{3,8})").expect("color declaration regex")
});

/// A named four-color palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub bg: String,
    pub main: String,
    pub sub: String,
    pub text: String,
}

impl Theme {
    /// The built-in palette, used whenever a theme cannot be fetched.
    #[must_use]
    pub fn fallback() -> Self {
        Self::with_default_colors(DEFAULT_THEME_NAME)
    }

    #[must_use]
    pub fn with_default_colors(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bg: DEFAULT_BG.to_string(),
            main: DEFAULT_MAIN.to_string(),
            sub: DEFAULT_SUB.to_string(),
            text: DEFAULT_TEXT.to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Theme names in the upstream repository use underscores where people type
/// spaces (`serika dark` → `serika_dark`).
#[must_use]
pub fn normalize_theme_name(name: &str) -> String {
    name.replace(' ', "_")
}

/// Extracts `--{bg,main,sub,text}-color` declarations from a stylesheet.
/// Colors that are not declared keep their default value.
#[must_use]
pub fn parse_theme_css(name: &str, css: &str) -> Theme {
    let mut theme = Theme::with_default_colors(name);

    for captures in COLOR_DECLARATION.captures_iter(css) {
        let (Some(key), Some(color)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let slot = match key.as_str() {
            "bg" => &mut theme.bg,
            "main" => &mut theme.main,
            "sub" => &mut theme.sub,
            "text" => &mut theme.text,
            _ => continue,
        };
        *slot = color.as_str().to_string();
    }

    theme
}

/// Where theme stylesheets come from.
pub trait ThemeSource: Send + Sync {
    /// Returns the stylesheet text for an already-normalized theme name.
    /// Transport failures and non-200 responses are errors.
    fn fetch_stylesheet(&self, name: &str) -> Result<String>;
}

/// Process-lifetime theme cache keyed by normalized name. No eviction.
#[derive(Debug, Default)]
pub struct ThemeCache {
    entries: RwLock<HashMap<String, Theme>>,
}

impl ThemeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Theme> {
        // Entries are inserted whole, so a poisoned lock still holds valid data.
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    pub fn insert(&self, theme: Theme) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(theme.name.clone(), theme);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ThemeResolver {
    source: Arc<dyn ThemeSource>,
    cache: Arc<ThemeCache>,
}

impl ThemeResolver {
    #[must_use]
    pub fn new(source: Arc<dyn ThemeSource>, cache: Arc<ThemeCache>) -> Self {
        Self { source, cache }
    }

    #[must_use]
    pub fn cache(&self) -> &ThemeCache {
        &self.cache
    }

    /// Never fails. Fetch failures fall back to [`Theme::fallback`] and are not
    /// cached, so the next request tries the network again.
    pub fn resolve(&self, name: &str) -> Theme {
        let name = normalize_theme_name(name);

        if let Some(theme) = self.cache.get(&name) {
            debug!(theme = %name, "theme cache hit");
            return theme;
        }

        let css = match self.source.fetch_stylesheet(&name) {
            Ok(css) => css,
            Err(error) => {
                warn!(theme = %name, %error, "theme fetch failed, using default palette");
                return Theme::fallback();
            }
        };

        let theme = parse_theme_css(&name, &css);
        debug!(theme = %name, bg = %theme.bg, main = %theme.main, "theme resolved");
        self.cache.insert(theme.clone());
        theme
    }
}
