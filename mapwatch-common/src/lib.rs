//! Common types and utilities shared across MapWatch crates.
//!
//! This crate holds the page-source error type used by the watcher and the
//! observability helpers used by the binary and the integration tests. The
//! extraction core does not depend on it.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`MapwatchError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use mapwatch_common::MapwatchError;
//!
//! let err = MapwatchError::Fetch {
//!     url: "http://example.com/server/1".into(),
//!     message: "timed out".into(),
//! };
//! assert_eq!(err.to_string(), "Fetch failed for http://example.com/server/1: timed out");
//! ```

pub mod observability;

/// Error types used across the MapWatch system.
#[derive(thiserror::Error, Debug)]
pub enum MapwatchError {
    /// A server page could not be retrieved.
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },
}

/// Convenient alias for results that use [`MapwatchError`].
pub type Result<T> = std::result::Result<T, MapwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}

    #[test]
    fn fetch_error_names_the_server() {
        let err = MapwatchError::Fetch {
            url: "http://a.example.com/".into(),
            message: "connection refused".into(),
        };
        assert_error(&err);
        assert!(err.to_string().contains("http://a.example.com/"));
    }
}
