//! Loader for MapWatch configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are added; `MAPWATCH_`-prefixed
//! environment variables always win (`__` separates nested keys, e.g.
//! `MAPWATCH_HTTP__TIMEOUT_SECS=30`; `MAPWATCH_SERVERS` and `MAPWATCH_MAPS`
//! take comma-separated lists). String values may reference `${VAR}`, which
//! is expanded after merging, except under `extract` where `$` belongs to
//! the regex syntax.
use config::{Config, ConfigError, Environment, File};
use mapwatch_common::observability::{LogConfig, LogFormat, expand_home};
use mapwatch_extract::ExtractionRules;
use mapwatch_extract::rules::{
    ExtractError, IMAGE_URL_PATTERN, MAP_NAME_PATTERN, PLAYERS_PATTERN,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const CUSTOM_RULES_VERSION: &str = "custom";

#[derive(Debug, Clone, Deserialize)]
pub struct MapwatchConfig {
    #[serde(default)]
    pub version: Option<String>,
    /// Listing pages to poll, in priority order for tie-breaks.
    #[serde(default)]
    pub servers: Vec<String>,
    /// Map names that trigger an alert when running on the busiest server.
    #[serde(default)]
    pub maps: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_notify_cooldown_secs")]
    pub notify_cooldown_secs: u64,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub watchlist_path: Option<PathBuf>,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub extract: Option<ExtractSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub stderr: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Pattern overrides; missing fields fall back to the built-in patterns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractSettings {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub map_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub players: Option<String>,
}

fn default_poll_interval_secs() -> u64 {
    150
}
fn default_notify_cooldown_secs() -> u64 {
    900
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_retries() -> usize {
    2
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: false,
            filter: default_log_filter(),
        }
    }
}

impl Default for MapwatchConfig {
    fn default() -> Self {
        Self {
            version: None,
            servers: Vec::new(),
            maps: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            notify_cooldown_secs: default_notify_cooldown_secs(),
            http: HttpSettings::default(),
            watchlist_path: None,
            log: LogSettings::default(),
            extract: None,
        }
    }
}

impl MapwatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn notify_cooldown(&self) -> Duration {
        Duration::from_secs(self.notify_cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Where the watch list is persisted; defaults to `<data dir>/mapwatch/watchlist.json`.
    pub fn watchlist_path(&self) -> PathBuf {
        match &self.watchlist_path {
            Some(p) => expand_home(p),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mapwatch")
                .join("watchlist.json"),
        }
    }

    pub fn log_config(&self, app_name: &'static str) -> LogConfig {
        LogConfig {
            app_name,
            log_dir: self.log.dir.clone(),
            emit_stderr: self.log.stderr,
            format: self.log.format,
            default_filter: self.log.filter.clone(),
        }
    }

    /// Compiled extraction rules: the built-in set unless `extract` overrides any pattern.
    ///
    /// ```
    /// use mapwatch_config::MapwatchConfigLoader;
    ///
    /// let cfg = MapwatchConfigLoader::new()
    ///     .with_yaml_str("extract:\n  players: 'online: (\\d+)'")
    ///     .load()
    ///     .unwrap();
    /// let rules = cfg.extraction_rules().unwrap();
    /// assert_eq!(rules.version(), "custom");
    /// ```
    pub fn extraction_rules(&self) -> Result<Arc<ExtractionRules>, ExtractError> {
        let Some(ex) = &self.extract else {
            return Ok(ExtractionRules::builtin());
        };
        let rules = ExtractionRules::from_patterns(
            ex.version.as_deref().unwrap_or(CUSTOM_RULES_VERSION),
            ex.map_name.as_deref().unwrap_or(MAP_NAME_PATTERN),
            ex.image_url.as_deref().unwrap_or(IMAGE_URL_PATTERN),
            ex.players.as_deref().unwrap_or(PLAYERS_PATTERN),
        )?;
        Ok(Arc::new(rules))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Message(
                "poll_interval_secs must be greater than zero".into(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "http.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level keys whose strings are taken literally.
const LITERAL_SECTIONS: &[&str] = &["extract"];

/// Expand `${VAR}` references throughout the merged config, skipping the
/// [`LITERAL_SECTIONS`].
fn expand_env_in_config(root: &mut Value) {
    match root {
        Value::Object(sections) => sections
            .iter_mut()
            .filter(|(key, _)| !LITERAL_SECTIONS.contains(&key.as_str()))
            .for_each(|(_, section)| expand_env_in_value(section)),
        other => expand_env_in_value(other),
    }
}

/// Expand `${VAR}` references in every string of a config subtree.
fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => *s = expand_to_fixpoint(s),
        Value::Array(items) => items.iter_mut().for_each(expand_env_in_value),
        Value::Object(fields) => fields.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Variables may reference other variables; stop once nothing changes or the
/// depth cap is hit. Unknown variables stay literal.
fn expand_to_fixpoint(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
        let Ok(next) = shellexpand::env(&current) else {
            break;
        };
        if next == current {
            break;
        }
        current = next.into_owned();
    }
    current
}

/// Layers YAML sources under `MAPWATCH_*` environment overrides.
pub struct MapwatchConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for MapwatchConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MapwatchConfigLoader {
    /// Start with no files; sources added later are layered under the environment.
    ///
    /// ```
    /// use mapwatch_config::MapwatchConfigLoader;
    ///
    /// let config = MapwatchConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nservers: []")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.poll_interval_secs, 150);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Add a config file that must exist. Format follows the file extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`with_file`](Self::with_file) but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML document.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` references and validate the result.
    ///
    /// ```
    /// use mapwatch_config::MapwatchConfigLoader;
    ///
    /// let config = MapwatchConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// servers:
    ///   - "http://example.com/server/1"
    /// maps: ["Dust Bowl", "Gorge"]
    /// notify_cooldown_secs: 600
    /// http:
    ///   retries: 4
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.servers.len(), 1);
    /// assert_eq!(config.maps, vec!["Dust Bowl", "Gorge"]);
    /// assert_eq!(config.notify_cooldown_secs, 600);
    /// assert_eq!(config.http.retries, 4);
    /// assert_eq!(config.http.timeout_secs, 15);
    /// ```
    pub fn load(self) -> Result<MapwatchConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("MAPWATCH")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("servers")
                    .with_list_parse_key("maps"),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_config(&mut v);

        let typed: MapwatchConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}
