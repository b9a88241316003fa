//! Server polling on top of the extraction core.
//!
//! A [`Watcher`] fetches every server in the [`Watchlist`], extracts the
//! current map and player count, picks the busiest server and raises a
//! [`MapAlert`] through a [`Notifier`] when that server runs a watched map.
//! The watch list itself is persisted by [`WatchlistStore`].

pub mod alert;
pub mod server;
pub mod source;
pub mod watcher;
pub mod watchlist;

pub use alert::{AlertGate, LogNotifier, MapAlert, Notifier};
pub use server::{PlayerCount, ServerInfo, busiest};
pub use source::{HttpPageSource, PageSource};
pub use watcher::{FetchFailure, RefreshReport, Watcher};
pub use watchlist::{Watchlist, WatchlistError, WatchlistStore};
