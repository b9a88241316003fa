use crate::alert::{AlertGate, MapAlert, Notifier};
use crate::server::{ServerInfo, busiest};
use crate::source::PageSource;
use crate::watchlist::{Watchlist, WatchlistStore};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use mapwatch_extract::Extractor;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A server whose page could not be fetched this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub url: String,
    pub error: String,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Successfully refreshed servers, in watch-list order.
    pub servers: Vec<ServerInfo>,
    pub failures: Vec<FetchFailure>,
    pub alert: Option<MapAlert>,
}

impl RefreshReport {
    pub fn busiest(&self) -> Option<&ServerInfo> {
        busiest(&self.servers)
    }
}

/// Polls the watched servers and raises alerts for watched maps.
pub struct Watcher {
    source: Arc<dyn PageSource>,
    extractor: Extractor,
    notifier: Arc<dyn Notifier>,
    watchlist: Watchlist,
    gate: AlertGate,
    reload: Option<(WatchlistStore, Watchlist)>,
}

impl Watcher {
    pub fn new(
        source: Arc<dyn PageSource>,
        extractor: Extractor,
        notifier: Arc<dyn Notifier>,
        watchlist: Watchlist,
        cooldown: Duration,
    ) -> Self {
        Self {
            source,
            extractor,
            notifier,
            watchlist,
            gate: AlertGate::new(cooldown),
            reload: None,
        }
    }

    /// Re-read `store` at the start of every refresh so edits made while the
    /// watcher runs take effect on the next cycle. `pinned` entries (from the
    /// config file) are merged into each reloaded list.
    pub fn reload_from(mut self, store: WatchlistStore, pinned: Watchlist) -> Self {
        self.reload = Some((store, pinned));
        self
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    /// Fetch every server concurrently, pick the busiest and alert if it runs a watched map.
    ///
    /// A failed fetch only drops that server from this cycle.
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> RefreshReport {
        self.reload_watchlist();
        let fetches = self.watchlist.servers.iter().map(|url| {
            let source = Arc::clone(&self.source);
            async move { (url.as_str(), source.fetch(url).await) }
        });
        let results = join_all(fetches).await;

        let mut servers = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (url, result) in results {
            match result {
                Ok(html) => {
                    let fields = self.extractor.extract_all(Some(&html));
                    if fields.is_empty() {
                        tracing::warn!(
                            server = %url,
                            rules = self.extractor.rules().version(),
                            "watch.page_unrecognised"
                        );
                    }
                    servers.push(ServerInfo::from_fields(url, fields, now));
                }
                Err(e) => {
                    tracing::warn!(server = %url, error = %e, "watch.fetch_failed");
                    failures.push(FetchFailure {
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let alert = self.check_alert(&servers, now);
        if let Some(alert) = &alert {
            self.notifier.notify(alert);
        }

        RefreshReport {
            servers,
            failures,
            alert,
        }
    }

    fn reload_watchlist(&mut self) {
        let Some((store, pinned)) = &self.reload else {
            return;
        };
        match store.load() {
            Ok(mut list) => {
                list.merge(&pinned.servers, &pinned.maps);
                if list != self.watchlist {
                    tracing::info!(
                        servers = list.servers.len(),
                        maps = list.maps.len(),
                        "watch.watchlist_reloaded"
                    );
                    self.watchlist = list;
                }
            }
            // Keep polling the last good list.
            Err(e) => tracing::warn!(error = %e, "watch.watchlist_reload_failed"),
        }
    }

    fn check_alert(&mut self, servers: &[ServerInfo], now: DateTime<Utc>) -> Option<MapAlert> {
        let top = busiest(servers)?;
        let map = top.active_map.as_deref()?;
        if !self.watchlist.is_watched(map) {
            return None;
        }
        if !self.gate.admit(map, now) {
            tracing::debug!(map, server = %top.url, "watch.alert_suppressed");
            return None;
        }
        Some(MapAlert {
            map: map.to_string(),
            server_url: top.url.clone(),
            players: top.players.to_string(),
            map_image_url: top.map_image_url.clone(),
            at: now,
        })
    }

    /// Refresh now and then every `interval` until `cancel` fires.
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            servers = self.watchlist.servers.len(),
            maps = self.watchlist.maps.len(),
            interval_secs = interval.as_secs(),
            "watch.started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Shutdown must not wait for the slowest server.
                    let report = tokio::select! {
                        _ = cancel.cancelled() => break,
                        report = self.refresh(Utc::now()) => report,
                    };
                    match report.busiest() {
                        Some(top) => tracing::info!(
                            server = %top.url,
                            map = top.active_map.as_deref().unwrap_or("-"),
                            players = %top.players,
                            refreshed = report.servers.len(),
                            failed = report.failures.len(),
                            "watch.cycle"
                        ),
                        None => tracing::warn!(
                            failed = report.failures.len(),
                            "watch.cycle.no_servers"
                        ),
                    }
                }
            }
        }
        tracing::info!("watch.stopped");
    }
}
