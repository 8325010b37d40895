pub(crate) mod catalog;
mod display;
mod freshness;
pub(crate) mod media;
mod notify;
mod progress;

#[cfg(test)]
mod tests;

use std::thread;
use std::time::Duration as StdDuration;

use anyhow::{Result, bail};
use chrono::Utc;

use crate::cli::{Cli, Command, ItemArgs, TargetArgs};
use crate::config::Config;
use crate::db::Database;
use crate::store::KvStore;

use self::catalog::{CatalogCache, HttpSource};
use self::display::{describe_item, episode_label, format_progress, print_progress_table};
use self::freshness::ContentFreshnessTracker;
use self::media::{CatalogItem, MediaKind};
use self::notify::NewContentDetector;
use self::progress::{ProgressReport, WatchKey, WatchProgressTracker};

pub fn run(cli: Cli, config: &Config) -> Result<()> {
    let db = open_db(config)?;
    let source = HttpSource::default();
    let catalog = CatalogCache::new(&db, &source, config.endpoints.clone(), config.cache_ttl);

    match cli.command {
        Command::Save {
            target,
            episode_name,
            percent,
            position,
            duration,
            completed,
        } => {
            let report = ProgressReport {
                key: episode_key(&target)?,
                episode_name,
                progress_percent: percent,
                current_time_seconds: position,
                total_duration_seconds: duration,
                completed,
            };
            run_save(&db, report)?
        }
        Command::Show { target } => run_show(&db, &episode_key(&target)?),
        Command::Continue => run_continue(&db),
        Command::List => run_list(&db),
        Command::Dismiss { target } => run_dismiss(&db, &dismiss_key(&target)),
        Command::Clear { id } => run_clear(&db, id),
        Command::ClearAll => run_clear_all(&db),
        Command::Seen => run_seen(&db, &catalog)?,
        Command::New => run_new(&db, &catalog)?,
        Command::IsNew { item } => run_is_new(&db, &catalog_item(&item)),
        Command::Viewed { item } => run_viewed(&db, &catalog_item(&item)),
        Command::Catalog => run_catalog(&catalog)?,
        Command::Locate { id } => run_locate(&catalog, id)?,
        Command::Watch {
            interval,
            max_polls,
        } => run_watch(&catalog, StdDuration::from_secs(interval), max_polls),
    }

    Ok(())
}

fn run_save(store: &dyn KvStore, report: ProgressReport) -> Result<()> {
    let mut tracker = WatchProgressTracker::load(store);
    let record = tracker.save_progress(report, Utc::now());
    let label = episode_label(record);
    if label.is_empty() {
        println!(
            "Saved {} {}: {}",
            record.media_kind,
            record.title_id,
            format_progress(record)
        );
    } else {
        println!(
            "Saved {} {} {}: {}",
            record.media_kind,
            record.title_id,
            label,
            format_progress(record)
        );
    }
    Ok(())
}

fn run_show(store: &dyn KvStore, key: &WatchKey) {
    let tracker = WatchProgressTracker::load(store);
    match tracker.get_progress(key) {
        Some(record) => print_progress_table(std::slice::from_ref(record)),
        None => println!("No progress stored for {} {}.", key.media_kind, key.title_id),
    }
}

fn run_continue(store: &dyn KvStore) {
    let tracker = WatchProgressTracker::load(store);
    let rows = tracker.continue_watching(Utc::now());
    if rows.is_empty() {
        println!("Nothing to continue.");
        return;
    }
    print_progress_table(&rows);
}

fn run_list(store: &dyn KvStore) {
    let tracker = WatchProgressTracker::load(store);
    if tracker.records().is_empty() {
        println!("No tracked progress yet. Run `streamtrack save` first.");
        return;
    }
    print_progress_table(tracker.records());
}

fn run_dismiss(store: &dyn KvStore, key: &WatchKey) {
    let mut tracker = WatchProgressTracker::load(store);
    let removed = tracker.remove_from_continue_watching(key);
    println!(
        "Removed {removed} record(s) for {} {}.",
        key.media_kind, key.title_id
    );
}

fn run_clear(store: &dyn KvStore, title_id: u64) {
    let mut tracker = WatchProgressTracker::load(store);
    let removed = tracker.clear_progress(title_id);
    println!("Cleared {removed} record(s) for id {title_id}.");
}

fn run_clear_all(store: &dyn KvStore) {
    let mut tracker = WatchProgressTracker::load(store);
    tracker.clear_all_progress();
    println!("Cleared all progress.");
}

fn run_seen(store: &dyn KvStore, catalog: &CatalogCache<'_>) -> Result<()> {
    let items = catalog.items(Utc::now())?;
    let mut tracker = ContentFreshnessTracker::load(store);
    tracker.update_seen_content(&items, Utc::now());
    let state = tracker.state();
    println!(
        "Seen {} movies and {} series.",
        state.movie_ids.len(),
        state.series_ids.len()
    );
    Ok(())
}

fn run_new(store: &dyn KvStore, catalog: &CatalogCache<'_>) -> Result<()> {
    let items = catalog.items(Utc::now())?;
    let tracker = ContentFreshnessTracker::load(store);
    let fresh = tracker.get_new_content(&items, Utc::now());
    if fresh.is_empty() {
        println!("No new content.");
        return Ok(());
    }
    for item in &fresh {
        println!("{}", describe_item(item));
    }
    Ok(())
}

fn run_is_new(store: &dyn KvStore, item: &CatalogItem) {
    let tracker = ContentFreshnessTracker::load(store);
    let verdict = if tracker.is_new_content(item, Utc::now()) {
        "new"
    } else {
        "not new"
    };
    println!("{}: {verdict}", describe_item(item));
}

fn run_viewed(store: &dyn KvStore, item: &CatalogItem) {
    let mut tracker = ContentFreshnessTracker::load(store);
    if tracker.mark_as_viewed(item) {
        println!("Marked {} as viewed.", describe_item(item));
    } else {
        println!("{} was already seen.", describe_item(item));
    }
}

fn run_catalog(catalog: &CatalogCache<'_>) -> Result<()> {
    let now = Utc::now();
    let movies = catalog.movie_ids(now)?;
    let series = catalog.series_ids(now)?;
    println!("Movies ({}): {}", movies.len(), join_ids(&movies));
    println!("Series ({}): {}", series.len(), join_ids(&series));
    Ok(())
}

fn run_locate(catalog: &CatalogCache<'_>, title_id: u64) -> Result<()> {
    match catalog.movie_watch_url(title_id, Utc::now())? {
        Some(url) => println!("{url}"),
        None => println!("No watch URL for movie {title_id}."),
    }
    Ok(())
}

fn run_watch(catalog: &CatalogCache<'_>, interval: StdDuration, max_polls: Option<u32>) {
    let mut detector = NewContentDetector::new();
    let mut polls = 0_u32;
    log::info!("polling catalog every {}s", interval.as_secs());

    loop {
        for item in poll_once(catalog, &mut detector) {
            println!("New {}", describe_item(&item));
        }
        polls += 1;
        if max_polls.is_some_and(|max| polls >= max) {
            break;
        }
        thread::sleep(interval);
    }
}

/// One revalidation per kind, then a diff against whatever is stored. A failed
/// refresh falls back to the stored copy rather than fetching again.
fn poll_once(
    catalog: &CatalogCache<'_>,
    detector: &mut NewContentDetector,
) -> Vec<CatalogItem> {
    let now = Utc::now();
    for kind in [MediaKind::Movie, MediaKind::Series] {
        match catalog.refresh(kind, now) {
            Ok(true) => log::info!("{kind} catalog updated"),
            Ok(false) => log::debug!("{kind} catalog unchanged"),
            Err(err) => log::warn!("failed to refresh {kind} catalog: {err}"),
        }
    }

    match (
        catalog.cached_ids(MediaKind::Movie),
        catalog.cached_ids(MediaKind::Series),
    ) {
        (Some(movies), Some(series)) => detector.observe(&movies, &series),
        _ => {
            log::warn!("catalog unavailable, skipping poll");
            Vec::new()
        }
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Series lookups are per episode, so both numbers must be present.
fn episode_key(target: &TargetArgs) -> Result<WatchKey> {
    match (target.kind, target.season, target.episode) {
        (MediaKind::Movie, _, _) => Ok(WatchKey::movie(target.id)),
        (MediaKind::Series, Some(season), Some(episode)) => {
            Ok(WatchKey::episode(target.id, season, episode))
        }
        (MediaKind::Series, _, _) => {
            bail!("--season and --episode are required for series")
        }
    }
}

fn dismiss_key(target: &TargetArgs) -> WatchKey {
    WatchKey {
        title_id: target.id,
        media_kind: target.kind,
        season_number: target.season,
        episode_number: target.episode,
    }
}

fn catalog_item(item: &ItemArgs) -> CatalogItem {
    CatalogItem::bare(item.id, item.kind)
}

fn open_db(config: &Config) -> Result<Database> {
    let db = Database::open(&config.db_path)?;
    db.migrate()?;
    Ok(db)
}
