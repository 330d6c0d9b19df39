//! Rendering configuration types.

use serde::{Deserialize, Serialize};

/// Default document header.
pub const DEFAULT_HEADER: &str = "<?xml version='1.0' ?>\n<events>\n";

/// Default document footer.
pub const DEFAULT_FOOTER: &str = "</events>\n";

/// Header and footer text bracketing a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_footer")]
    pub footer: String,
}

fn default_header() -> String {
    DEFAULT_HEADER.to_string()
}

fn default_footer() -> String {
    DEFAULT_FOOTER.to_string()
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            header: default_header(),
            footer: default_footer(),
        }
    }
}

/// Mail body color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTheme {
    #[default]
    Light,
    Dark,
}

impl ReportTheme {
    pub(crate) fn palette(&self) -> (&'static str, &'static str, &'static str) {
        // (background, text, border)
        match self {
            ReportTheme::Light => ("#ffffff", "#111827", "#e5e7eb"),
            ReportTheme::Dark => ("#111827", "#f9fafb", "#374151"),
        }
    }
}

/// HTML body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Heading shown above the event table.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub theme: ReportTheme,
    /// Minify the HTML in release builds.
    #[serde(default = "default_true")]
    pub minify: bool,
    #[serde(default)]
    pub layout: Layout,
}

fn default_true() -> bool {
    true
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            title: None,
            theme: ReportTheme::default(),
            minify: true,
            layout: Layout::default(),
        }
    }
}

impl ReportConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_theme(mut self, theme: ReportTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Heading to display, falling back to a generic one.
    pub fn heading(&self) -> &str {
        self.title.as_deref().unwrap_or("Logging events")
    }
}
