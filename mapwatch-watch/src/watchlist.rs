use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("map name must not be blank")]
    BlankMap,
    #[error("not an http(s) URL: {0}")]
    InvalidServerUrl(String),
    #[error("no entry at index {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("watch list I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("watch list at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Servers to poll and maps to be alerted about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub maps: Vec<String>,
}

impl Watchlist {
    /// Add a map name. Returns `false` when it is already watched.
    pub fn add_map(&mut self, name: &str) -> Result<bool, WatchlistError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WatchlistError::BlankMap);
        }
        if self.is_watched(name) {
            return Ok(false);
        }
        self.maps.push(name.to_string());
        Ok(true)
    }

    pub fn remove_map(&mut self, index: usize) -> Result<String, WatchlistError> {
        remove_at(&mut self.maps, index)
    }

    /// Add a server page URL. Returns `false` when it is already polled.
    pub fn add_server(&mut self, url: &str) -> Result<bool, WatchlistError> {
        let url = url.trim();
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(WatchlistError::InvalidServerUrl(url.to_string())),
        }
        if self.servers.iter().any(|s| s == url) {
            return Ok(false);
        }
        self.servers.push(url.to_string());
        Ok(true)
    }

    pub fn remove_server(&mut self, index: usize) -> Result<String, WatchlistError> {
        remove_at(&mut self.servers, index)
    }

    pub fn is_watched(&self, map: &str) -> bool {
        self.maps.iter().any(|m| m == map)
    }

    /// Fold in entries from another source (e.g. the config file), skipping
    /// duplicates and logging entries that are not valid.
    pub fn merge<'a>(
        &mut self,
        servers: impl IntoIterator<Item = &'a String>,
        maps: impl IntoIterator<Item = &'a String>,
    ) {
        for s in servers {
            if let Err(e) = self.add_server(s) {
                tracing::warn!(server = %s, error = %e, "watchlist.merge.skip_server");
            }
        }
        for m in maps {
            if let Err(e) = self.add_map(m) {
                tracing::warn!(map = %m, error = %e, "watchlist.merge.skip_map");
            }
        }
    }
}

fn remove_at(list: &mut Vec<String>, index: usize) -> Result<String, WatchlistError> {
    if index >= list.len() {
        return Err(WatchlistError::IndexOutOfRange {
            index,
            len: list.len(),
        });
    }
    Ok(list.remove(index))
}

/// JSON file holding a [`Watchlist`] between runs.
#[derive(Debug, Clone)]
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty watch list.
    pub fn load(&self) -> Result<Watchlist, WatchlistError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "watchlist.load.missing");
                return Ok(Watchlist::default());
            }
            Err(source) => return Err(self.io_err(source)),
        };
        serde_json::from_str(&raw).map_err(|source| WatchlistError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Write through a sibling temp file so a crash never leaves half a list.
    pub fn save(&self, list: &Watchlist) -> Result<(), WatchlistError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(list).map_err(|source| WatchlistError::Json {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        tracing::debug!(
            path = %self.path.display(),
            servers = list.servers.len(),
            maps = list.maps.len(),
            "watchlist.saved"
        );
        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> WatchlistError {
        WatchlistError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
