use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::feed::{FeedError, FeedSource};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "DeadlineHub";
const APP_NAME: &str = "deadline-hub";

pub const CONFIG_ENV: &str = "DEADLINE_HUB_CONFIG";
pub const FEED_ENV: &str = "DEADLINE_HUB_FEED";

pub const DEFAULT_FEED_URL: &str =
    "https://raw.githubusercontent.com/mr-devs/deadline-hub/refs/heads/main/data/deadlines.json";

const MIN_TICK_RATE_MS: u64 = 50;
const MAX_TICK_RATE_MS: u64 = 1_000;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load();
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load();
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub cache_dir: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Default destination for `.ics` exports.
    pub export_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let cache_dir = project_dirs.cache_dir().to_path_buf();
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dirs.data_local_dir().join("state"));
        let log_dir = state_dir.join("logs");
        let export_dir = project_dirs.data_dir().join("exports");

        Ok(Self {
            config_dir,
            config_file,
            cache_dir,
            state_dir,
            log_dir,
            export_dir,
        })
    }

    /// Every path under one directory; used for throwaway setups.
    pub fn rooted(root: &Path) -> Self {
        let config_dir = root.join("config");
        let state_dir = root.join("state");
        Self {
            config_file: config_dir.join("config.toml"),
            config_dir,
            cache_dir: root.join("cache"),
            log_dir: state_dir.join("logs"),
            state_dir,
            export_dir: root.join("exports"),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedOptions,
    pub display: DisplayOptions,
    pub tick_rate_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedOptions::default(),
            display: DisplayOptions::default(),
            tick_rate_ms: 250,
        }
    }
}

impl AppConfig {
    fn post_load(&mut self) {
        let clamped = self.tick_rate_ms.clamp(MIN_TICK_RATE_MS, MAX_TICK_RATE_MS);
        if clamped != self.tick_rate_ms {
            tracing::warn!(self.tick_rate_ms, clamped, "tick rate out of range, clamping");
            self.tick_rate_ms = clamped;
        }
        if self.display.facet_visible_limit == 0 {
            tracing::warn!("facet_visible_limit must be positive, using 10");
            self.display.facet_visible_limit = 10;
        }
        if self.feed.timeout_secs == 0 {
            tracing::warn!("feed timeout of 0s would never succeed, using 20s");
            self.feed.timeout_secs = 20;
        }
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    /// The feed to load, honouring the `DEADLINE_HUB_FEED` override.
    pub fn feed_source(&self) -> Result<FeedSource, FeedError> {
        let override_value = env::var(FEED_ENV).ok();
        self.feed.source(override_value.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedOptions {
    pub url: Option<String>,
    /// Local JSON file; only used when `url` is unset.
    pub path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            url: Some(DEFAULT_FEED_URL.to_string()),
            path: None,
            timeout_secs: 20,
        }
    }
}

impl FeedOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn source(&self, override_value: Option<&str>) -> Result<FeedSource, FeedError> {
        FeedSource::resolve(override_value, self.url.as_deref(), self.path.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub default_view: ViewMode,
    pub show_past: bool,
    /// Facet values shown before "show more".
    pub facet_visible_limit: usize,
    pub notes_preview_chars: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            default_view: ViewMode::Cards,
            show_past: false,
            facet_visible_limit: 10,
            notes_preview_chars: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Cards,
    List,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Cards
    }
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Cards => ViewMode::List,
            ViewMode::List => ViewMode::Cards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult<T = ()> = anyhow::Result<T>;

    #[test]
    fn first_run_writes_default_config() -> TestResult {
        let dir = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted(dir.path()));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert!(loader.paths().log_dir.is_dir());
        assert_eq!(cfg.feed.url.as_deref(), Some(DEFAULT_FEED_URL));
        assert_eq!(cfg.display.facet_visible_limit, 10);
        assert_eq!(cfg.display.default_view, ViewMode::Cards);

        let reloaded = loader.load_or_init()?;
        assert_eq!(reloaded.tick_rate_ms, cfg.tick_rate_ms);
        assert_eq!(reloaded.feed.timeout_secs, 20);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults_and_clamps() -> TestResult {
        let dir = TempDir::new()?;
        let paths = ConfigPaths::rooted(dir.path());
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(
            &paths.config_file,
            "tick_rate_ms = 5\n[display]\ndefault_view = \"list\"\nfacet_visible_limit = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.tick_rate_ms, MIN_TICK_RATE_MS);
        assert_eq!(cfg.display.default_view, ViewMode::List);
        assert_eq!(cfg.display.facet_visible_limit, 10);
        assert_eq!(cfg.display.notes_preview_chars, 60);
        Ok(())
    }

    #[test]
    fn malformed_file_reports_context() -> TestResult {
        let dir = TempDir::new()?;
        let paths = ConfigPaths::rooted(dir.path());
        fs::create_dir_all(&paths.config_dir)?;
        fs::write(&paths.config_file, "tick_rate_ms = \"fast\"")?;
        let err = ConfigLoader::with_paths(paths).load().unwrap_err();
        assert_eq!(err.to_string(), "parsing config toml");
        Ok(())
    }

    #[test]
    fn feed_override_beats_configured_url() -> TestResult {
        let options = FeedOptions::default();
        assert_eq!(
            options.source(Some("./local.json"))?,
            FeedSource::Path(PathBuf::from("./local.json"))
        );
        assert_eq!(
            options.source(None)?,
            FeedSource::Url(DEFAULT_FEED_URL.to_string())
        );
        Ok(())
    }

    #[test]
    fn view_mode_toggles() {
        assert_eq!(ViewMode::Cards.toggled(), ViewMode::List);
        assert_eq!(ViewMode::List.toggled().to_string(), "Cards");
    }
}
