use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use crate::images::{DEFAULT_CAPACITY, DEFAULT_MAX_PIXEL_SIZE};
use crate::list::ListOptions;

const DEFAULT_BASE_URL: &str = "https://webapi.autodoc.ru/api/news";

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub feed: FeedConfigFile,
    pub images: ImagesConfigFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedConfigFile {
    pub base_url: Option<String>,
    pub page_size: Option<u32>,
    pub clear_filter_on_reload: Option<bool>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImagesConfigFile {
    pub capacity: Option<usize>,
    pub max_pixel_size: Option<u32>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub feed: FeedConfig,
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub base_url: String,
    pub page_size: u32,
    pub clear_filter_on_reload: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagesConfig {
    pub capacity: usize,
    pub max_pixel_size: u32,
}

impl FeedConfig {
    pub fn list_options(&self) -> ListOptions {
        ListOptions {
            page_size: self.page_size,
            clear_filter_on_reload: self.clear_filter_on_reload,
        }
    }
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, base_url: Option<String>, page_size: Option<u32>) {
        if let Some(ref v) = base_url {
            debug!("config: CLI override base_url={v}");
            self.feed.base_url = base_url;
        }
        if let Some(v) = page_size {
            debug!("config: CLI override page_size={v}");
            self.feed.page_size = page_size;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let config = Config {
            feed: FeedConfig {
                base_url: self.feed.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
                page_size: self.feed.page_size.unwrap_or(15).max(1),
                clear_filter_on_reload: self.feed.clear_filter_on_reload.unwrap_or(false),
                timeout: Duration::from_secs(self.feed.timeout_secs.unwrap_or(15)),
            },
            images: ImagesConfig {
                capacity: self.images.capacity.unwrap_or(DEFAULT_CAPACITY),
                max_pixel_size: self.images.max_pixel_size.unwrap_or(DEFAULT_MAX_PIXEL_SIZE),
            },
        };
        info!(
            "config: resolved base_url={}, page_size={}, clear_filter_on_reload={}, \
             timeout={}s, image_capacity={}, max_pixel_size={}",
            config.feed.base_url,
            config.feed.page_size,
            config.feed.clear_filter_on_reload,
            config.feed.timeout.as_secs(),
            config.images.capacity,
            config.images.max_pixel_size,
        );
        config
    }
}

/// Resolve the XDG config path.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("livescroll-news").join("config.toml"))
}

/// Load the config file at `explicit`, or at the XDG location.
///
/// Returns `ConfigFile::default()` if no file exists.  Returns an error if
/// the file exists but cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let path = match explicit.map(Path::to_path_buf).or_else(config_path) {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            parse_config(&text).map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}

pub fn parse_config(text: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml() {
        let resolved = parse_config("").unwrap().resolve();
        assert_eq!(resolved.feed.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.feed.page_size, 15);
        assert!(!resolved.feed.clear_filter_on_reload);
        assert_eq!(resolved.feed.timeout, Duration::from_secs(15));
        assert_eq!(resolved.images.capacity, 200);
        assert_eq!(resolved.images.max_pixel_size, 350);
    }

    #[test]
    fn full_toml() {
        let cfg = parse_config(
            r#"
[feed]
base_url = "http://localhost:8080/news"
page_size = 30
clear_filter_on_reload = true
timeout_secs = 3

[images]
capacity = 50
max_pixel_size = 128
"#,
        )
        .unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.feed.base_url, "http://localhost:8080/news");
        assert_eq!(resolved.feed.page_size, 30);
        assert!(resolved.feed.clear_filter_on_reload);
        assert_eq!(resolved.feed.timeout, Duration::from_secs(3));
        assert_eq!(resolved.images.capacity, 50);
        assert_eq!(resolved.images.max_pixel_size, 128);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let resolved = parse_config("[images]\ncapacity = 10\n").unwrap().resolve();
        assert_eq!(resolved.images.capacity, 10);
        assert_eq!(resolved.images.max_pixel_size, 350);
        assert_eq!(resolved.feed.page_size, 15);
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg = parse_config("[feed]\npage_size = 30\n").unwrap();
        cfg.merge_cli(Some("http://example.com/news".into()), Some(5));
        let resolved = cfg.resolve();
        assert_eq!(resolved.feed.base_url, "http://example.com/news");
        assert_eq!(resolved.feed.page_size, 5);
    }

    #[test]
    fn cli_none_keeps_file_values() {
        let mut cfg = parse_config("[feed]\npage_size = 30\n").unwrap();
        cfg.merge_cli(None, None);
        assert_eq!(cfg.resolve().feed.page_size, 30);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let resolved = parse_config("[feed]\npage_size = 0\n").unwrap().resolve();
        assert_eq!(resolved.feed.page_size, 1);
    }

    #[test]
    fn list_options_follow_feed_config() {
        let resolved = parse_config("[feed]\npage_size = 7\nclear_filter_on_reload = true\n")
            .unwrap()
            .resolve();
        assert_eq!(
            resolved.feed.list_options(),
            ListOptions {
                page_size: 7,
                clear_filter_on_reload: true,
            }
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(parse_config("[feed]\npage_size = \"many\"\n").is_err());
    }

    #[test]
    fn missing_explicit_file_uses_defaults() {
        let cfg = load_config(Some(Path::new("/nonexistent/livescroll-news.toml"))).unwrap();
        assert!(cfg.feed.base_url.is_none());
    }
}
