use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use tracing::debug;

use crate::config::Settings;
use crate::error::{CardError, Result};
use crate::stats::{Profile, ProfileSource};
use crate::theme::ThemeSource;

/// Blocking HTTP access to the theme stylesheets and the public profile API.
///
/// Must be built outside of an async runtime; the server builds it before
/// starting tokio.
#[derive(Debug, Clone)]
pub struct MonkeytypeClient {
    client: Client,
    themes_url: String,
    profile_api_url: String,
    theme_timeout: Duration,
    stats_timeout: Duration,
}

impl MonkeytypeClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.theme_timeout.min(settings.stats_timeout))
            .user_agent(concat!("monkeytype_card/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Both bases must be http(s) URLs that accept path segments.
        segment_url(&settings.themes_url, &[])?;
        segment_url(&settings.profile_api_url, &[])?;

        Ok(Self {
            client,
            themes_url: settings.themes_url.clone(),
            profile_api_url: settings.profile_api_url.clone(),
            theme_timeout: settings.theme_timeout,
            stats_timeout: settings.stats_timeout,
        })
    }

    pub fn theme_url(&self, name: &str) -> Result<Url> {
        let file = format!("{name}.css");
        segment_url(&self.themes_url, &[file.as_str()])
    }

    pub fn profile_url(&self, username: &str) -> Result<Url> {
        segment_url(&self.profile_api_url, &["users", username, "profile"])
    }

    fn get_text(&self, url: Url, timeout: Duration) -> Result<String> {
        debug!(%url, ?timeout, "upstream request");
        let response = self.client.get(url.clone()).timeout(timeout).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(CardError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }
}

impl ThemeSource for MonkeytypeClient {
    fn fetch_stylesheet(&self, name: &str) -> Result<String> {
        let url = self.theme_url(name)?;
        self.get_text(url, self.theme_timeout)
    }
}

impl ProfileSource for MonkeytypeClient {
    fn fetch_profile(&self, username: &str) -> Result<Profile> {
        let url = self.profile_url(username)?;
        let body = self.get_text(url, self.stats_timeout)?;
        Profile::from_json(&body)
    }
}

/// Appends percent-encoded path segments to `base`.
fn segment_url(base: &str, segments: &[&str]) -> Result<Url> {
    let invalid = || CardError::InvalidUrl {
        url: base.to_string(),
    };
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
