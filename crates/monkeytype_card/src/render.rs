use v_htmlescape::escape;

use crate::theme::Theme;

pub const CARD_WIDTH: u32 = 400;
pub const CARD_HEIGHT: u32 = 150;

const TRANSPARENT_FILL: &str = "none";

#[derive(Debug, Clone)]
pub struct RenderParams<'a> {
    pub username: &'a str,
    pub mode_label: &'a str,
    pub wpm: f64,
    pub accuracy: f64,
    pub theme: &'a Theme,
    pub transparent: bool,
}

/// `"<mode> <length>"`, as shown next to the username.
#[must_use]
pub fn mode_label(mode: &str, length: &str) -> String {
    format!("{mode} {length}")
}

/// Fixed-layout 400x150 card. Only colors, the two labels and the two numbers
/// vary; user-supplied text is escaped.
#[must_use]
pub fn render_svg(params: &RenderParams<'_>) -> String {
    let theme = params.theme;
    let bg = if params.transparent {
        TRANSPARENT_FILL
    } else {
        theme.bg.as_str()
    };
    let main = &theme.main;
    let sub = &theme.sub;
    let text = &theme.text;
    let username = escape(params.username);
    let mode_label = escape(params.mode_label);
    let wpm = params.wpm;
    let accuracy = params.accuracy;

    format!(
        r#"<svg width="{CARD_WIDTH}" height="{CARD_HEIGHT}" viewBox="0 0 {CARD_WIDTH} {CARD_HEIGHT}" fill="none" xmlns="http://www.w3.org/2000/svg">
    <style>
        .header {{ font: 800 20px 'Segoe UI', Ubuntu, Sans-Serif; fill: {main}; }}
        .stat-label {{ font: 600 14px 'Segoe UI', Ubuntu, Sans-Serif; fill: {sub}; }}
        .stat-value {{ font: 700 28px 'Segoe UI', Ubuntu, Sans-Serif; fill: {main}; }}
        .bg {{ fill: {bg}; rx: 10px; }}
        .sub-info {{ font: 600 12px 'Segoe UI', Ubuntu, Sans-Serif; fill: {text}; opacity: 0.9; }}
    </style>
    <rect width="{CARD_WIDTH}" height="{CARD_HEIGHT}" class="bg"/>
    <text x="25" y="35" class="header">Monkeytype Stats</text>
    <text x="375" y="35" text-anchor="end" class="sub-info">@{username} ({mode_label})</text>
    <text x="25" y="80" class="stat-label">Highest WPM</text>
    <text x="180" y="80" class="stat-value">{wpm:.0}</text>
    <text x="25" y="115" class="stat-label">Accuracy</text>
    <text x="180" y="115" class="stat-value">{accuracy:.2}%</text>
</svg>"#
    )
}
