// File: src/config.rs
// Purpose: Router configuration parsed from the [router] table of rhtml.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Placeholder replaced by a route's title in `title_template`
pub const TITLE_PLACEHOLDER: &str = "{title}";

/// Router configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// How long loader results are replayed when a route sets no stale
    /// time of its own (0 = always reload)
    #[serde(default)]
    pub default_stale_time_ms: u64,

    /// Whether route metadata is written to the document head
    #[serde(default = "default_true")]
    pub apply_metadata: bool,

    /// Document title template, e.g. `"{title} | My App"`
    #[serde(default)]
    pub title_template: Option<String>,
}

/// On-disk layout: the router settings live under `[router]`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    router: RouterConfig,
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_stale_time_ms: 0,
            apply_metadata: true,
            title_template: None,
        }
    }
}

impl RouterConfig {
    /// Load the `[router]` table from a TOML file
    ///
    /// A missing or empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from default path (./rhtml.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("rhtml.toml")
    }

    /// Parse the `[router]` table out of TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.router)
    }

    pub fn default_stale_time(&self) -> Duration {
        Duration::from_millis(self.default_stale_time_ms)
    }

    /// Applies `title_template` to a route title
    pub fn format_title(&self, title: &str) -> String {
        match &self.title_template {
            Some(template) if template.contains(TITLE_PLACEHOLDER) => {
                template.replace(TITLE_PLACEHOLDER, title)
            }
            _ => title.to_string(),
        }
    }
}
