use anyhow::{Context, Result};
use mapwatch_config::MapwatchConfig;
use mapwatch_extract::{Extractor, PageFields};
use mapwatch_http::HttpClient;
use mapwatch_watch::{
    HttpPageSource, LogNotifier, MapAlert, Notifier, RefreshReport, Watcher, Watchlist,
    WatchlistStore,
};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::ListAction;

/// Prints alerts to stdout and records them in the log.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, alert: &MapAlert) {
        LogNotifier.notify(alert);
        println!("{}", render_alert(alert));
    }
}

fn extractor(cfg: &MapwatchConfig) -> Result<Extractor> {
    let rules = cfg
        .extraction_rules()
        .context("extract patterns in configuration are invalid")?;
    Ok(Extractor::with_rules(rules))
}

fn load_watchlist(cfg: &MapwatchConfig) -> Result<(WatchlistStore, Watchlist)> {
    let store = WatchlistStore::new(cfg.watchlist_path());
    let list = store
        .load()
        .with_context(|| format!("reading watch list {}", store.path().display()))?;
    Ok((store, list))
}

fn build_watcher(cfg: &MapwatchConfig) -> Result<Watcher> {
    let (store, mut list) = load_watchlist(cfg)?;
    let pinned = Watchlist {
        servers: cfg.servers.clone(),
        maps: cfg.maps.clone(),
    };
    list.merge(&pinned.servers, &pinned.maps);
    if list.servers.is_empty() {
        anyhow::bail!("no servers to watch; add one with `mapwatch servers add <URL>`");
    }

    let client = HttpClient::new()?
        .with_timeout(cfg.request_timeout())
        .with_retries(cfg.http.retries);

    Ok(Watcher::new(
        Arc::new(HttpPageSource::new(client)),
        extractor(cfg)?,
        Arc::new(ConsoleNotifier),
        list,
        cfg.notify_cooldown(),
    )
    .reload_from(store, pinned))
}

pub async fn watch(cfg: &MapwatchConfig) -> Result<()> {
    let watcher = build_watcher(cfg)?;
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, stopping");
            on_signal.cancel();
        }
    });

    println!(
        "Watching {} server(s) every {}s; Ctrl-C to stop.",
        watcher.watchlist().servers.len(),
        cfg.poll_interval_secs
    );
    watcher.run(cfg.poll_interval(), cancel).await;
    Ok(())
}

pub async fn check(cfg: &MapwatchConfig, json: bool) -> Result<()> {
    let mut watcher = build_watcher(cfg)?;
    let report = watcher.refresh(chrono::Utc::now()).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

pub fn extract(cfg: &MapwatchConfig, file: Option<&Path>, json: bool) -> Result<()> {
    let html = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading HTML from stdin")?;
            buf
        }
    };

    let fields = extractor(cfg)?.extract_all(Some(&html));
    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        print!("{}", render_fields(&fields));
    }
    Ok(())
}

pub fn edit_maps(cfg: &MapwatchConfig, action: ListAction) -> Result<()> {
    let (store, mut list) = load_watchlist(cfg)?;
    let changed = match action {
        ListAction::List => false,
        ListAction::Add { value } => {
            let added = list.add_map(&value)?;
            if !added {
                println!("'{}' is already watched", value.trim());
            }
            added
        }
        ListAction::Remove { index } => {
            let removed = list.remove_map(index)?;
            println!("removed '{removed}'");
            true
        }
    };
    if changed {
        store.save(&list)?;
    }
    print!("{}", render_list("Maps", &list.maps));
    Ok(())
}

pub fn edit_servers(cfg: &MapwatchConfig, action: ListAction) -> Result<()> {
    let (store, mut list) = load_watchlist(cfg)?;
    let changed = match action {
        ListAction::List => false,
        ListAction::Add { value } => {
            let added = list.add_server(&value)?;
            if !added {
                println!("'{}' is already polled", value.trim());
            }
            added
        }
        ListAction::Remove { index } => {
            let removed = list.remove_server(index)?;
            println!("removed '{removed}'");
            true
        }
    };
    if changed {
        store.save(&list)?;
    }
    print!("{}", render_list("Servers", &list.servers));
    Ok(())
}

fn render_fields(fields: &PageFields) -> String {
    format!(
        "map:     {}\nimage:   {}\nplayers: {}\n",
        fields.map_name, fields.image_url, fields.players
    )
}

fn render_list(title: &str, items: &[String]) -> String {
    let mut out = format!("{title}:\n");
    if items.is_empty() {
        out.push_str("  (none)\n");
    }
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("  [{i}] {item}\n"));
    }
    out
}

fn render_alert(alert: &MapAlert) -> String {
    format!(
        "Favourite map is running: {} on {} ({} players)",
        alert.map, alert.server_url, alert.players
    )
}

fn render_report(report: &RefreshReport) -> String {
    let mut out = String::new();
    for s in &report.servers {
        out.push_str(&format!(
            "{}  map={}  players={}\n",
            s.url,
            s.active_map.as_deref().unwrap_or("?"),
            s.players_text.as_deref().unwrap_or("?")
        ));
    }
    for f in &report.failures {
        out.push_str(&format!("{}  FAILED: {}\n", f.url, f.error));
    }
    match report.busiest() {
        Some(top) => out.push_str(&format!(
            "busiest: {} ({})\n",
            top.url,
            top.active_map.as_deref().unwrap_or("unknown map")
        )),
        None => out.push_str("busiest: none reachable\n"),
    }
    if let Some(alert) = &report.alert {
        out.push_str(&render_alert(alert));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapwatch_extract::ExtractedField;
    use mapwatch_watch::{FetchFailure, PlayerCount, ServerInfo};

    #[test]
    fn fields_render_with_not_found_marker() {
        let fields = PageFields {
            map_name: ExtractedField::found("Dust Bowl"),
            image_url: ExtractedField::NotFound,
            players: ExtractedField::found("12/24"),
        };
        assert_eq!(
            render_fields(&fields),
            "map:     Dust Bowl\nimage:   not found\nplayers: 12/24\n"
        );
    }

    #[test]
    fn empty_list_renders_placeholder() {
        assert_eq!(render_list("Maps", &[]), "Maps:\n  (none)\n");
        assert_eq!(
            render_list("Maps", &["a".into(), "b".into()]),
            "Maps:\n  [0] a\n  [1] b\n"
        );
    }

    #[test]
    fn report_lists_failures_and_busiest() {
        let report = RefreshReport {
            servers: vec![ServerInfo {
                url: "http://a/".into(),
                active_map: Some("pl_upward".into()),
                map_image_url: None,
                players_text: Some("3/24".into()),
                players: PlayerCount::parse("3/24"),
                refreshed_at: chrono::Utc::now(),
            }],
            failures: vec![FetchFailure {
                url: "http://b/".into(),
                error: "timed out".into(),
            }],
            alert: None,
        };
        let out = render_report(&report);
        assert!(out.contains("http://a/  map=pl_upward  players=3/24"));
        assert!(out.contains("http://b/  FAILED: timed out"));
        assert!(out.ends_with("busiest: http://a/ (pl_upward)\n"));
    }

    #[test]
    fn list_edits_are_persisted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = MapwatchConfig {
            watchlist_path: Some(tmp.path().join("wl.json")),
            ..Default::default()
        };

        edit_maps(&cfg, ListAction::Add { value: "pl_upward".into() }).unwrap();
        edit_servers(&cfg, ListAction::Add { value: "http://a.example.com/".into() }).unwrap();
        edit_maps(&cfg, ListAction::Add { value: "cp_granary".into() }).unwrap();
        edit_maps(&cfg, ListAction::Remove { index: 0 }).unwrap();

        let (_, list) = load_watchlist(&cfg).unwrap();
        assert_eq!(list.maps, vec!["cp_granary"]);
        assert_eq!(list.servers, vec!["http://a.example.com/"]);
    }

    #[test]
    fn listing_does_not_write_the_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("data").join("wl.json");
        let cfg = MapwatchConfig {
            watchlist_path: Some(path.clone()),
            ..Default::default()
        };

        edit_maps(&cfg, ListAction::List).unwrap();
        edit_servers(&cfg, ListAction::List).unwrap();
        assert!(!path.exists());
        assert!(!tmp.path().join("data").exists());

        edit_maps(&cfg, ListAction::Add { value: "pl_upward".into() }).unwrap();
        let written = std::fs::metadata(&path).unwrap().modified().unwrap();
        edit_maps(&cfg, ListAction::Add { value: "pl_upward".into() }).unwrap();
        edit_maps(&cfg, ListAction::List).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), written);
    }

    #[test]
    fn watcher_needs_at_least_one_server() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = MapwatchConfig {
            watchlist_path: Some(tmp.path().join("wl.json")),
            ..Default::default()
        };
        assert!(build_watcher(&cfg).is_err());
    }
}
