use std::cell::Cell;
use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use super::catalog::{CatalogCache, CatalogEndpoints, CatalogSource};
use super::freshness::{ContentFreshnessTracker, SEEN_CONTENT_KEY};
use super::media::{CatalogItem, MediaKind};
use super::notify::NewContentDetector;
use super::poll_once;
use super::progress::{COMPLETION_THRESHOLD, ProgressReport, WatchKey, WatchProgressTracker};
use crate::db::Database;
use crate::http::{FetchError, FetchOutcome};
use crate::store::KvStore;
use crate::store::memory::MemoryStore;

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-04-01T00:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

fn report(key: WatchKey, percent: f64) -> ProgressReport {
    ProgressReport {
        key,
        episode_name: None,
        progress_percent: Some(percent),
        current_time_seconds: 0,
        total_duration_seconds: 0,
        completed: false,
    }
}

#[derive(Debug, Clone)]
struct Step {
    key: WatchKey,
    percent: f64,
    completed: bool,
    advance_hours: i64,
}

fn arb_key() -> impl Strategy<Value = WatchKey> {
    prop_oneof![
        (1u64..6).prop_map(WatchKey::movie),
        (1u64..6, 1u32..3, 1u32..4)
            .prop_map(|(id, season, episode)| WatchKey::episode(id, season, episode)),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    (arb_key(), 0.0f64..=100.0, any::<bool>(), 0i64..=72).prop_map(
        |(key, percent, completed, advance_hours)| Step {
            key,
            percent,
            completed,
            advance_hours,
        },
    )
}

proptest! {
    #[test]
    fn saves_keep_one_record_per_identity(steps in prop::collection::vec(arb_step(), 1..40)) {
        let store = MemoryStore::new();
        let mut tracker = WatchProgressTracker::load(&store);
        let mut now = base_time();

        for step in &steps {
            now += Duration::hours(step.advance_hours);
            let mut next = report(step.key, step.percent);
            next.completed = step.completed;
            let saved = tracker.save_progress(next, now).clone();

            prop_assert_eq!(saved.progress_percent, step.percent);
            if step.percent >= COMPLETION_THRESHOLD || step.completed {
                prop_assert!(saved.completed);
            }
            let found = tracker.get_progress(&step.key).expect("just saved");
            prop_assert_eq!(found, &saved);
        }

        let mut identities = HashSet::new();
        for record in tracker.records() {
            let identity = (
                record.media_kind,
                record.title_id,
                record.season_number,
                record.episode_number,
            );
            prop_assert!(identities.insert(identity), "duplicate identity {:?}", identity);
        }
    }

    #[test]
    fn stale_completed_records_never_survive_a_save(steps in prop::collection::vec(arb_step(), 1..40)) {
        let store = MemoryStore::new();
        let mut tracker = WatchProgressTracker::load(&store);
        let mut now = base_time();

        for step in &steps {
            now += Duration::hours(step.advance_hours);
            let mut next = report(step.key, step.percent);
            next.completed = step.completed;
            tracker.save_progress(next, now);

            let cutoff = now - Duration::days(7);
            for record in tracker.records() {
                prop_assert!(!record.completed || record.last_watched_at > cutoff);
            }
            let stamps: Vec<_> = tracker.records().iter().map(|r| r.last_watched_at).collect();
            prop_assert!(stamps.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }

    #[test]
    fn continue_watching_has_one_row_per_series(steps in prop::collection::vec(arb_step(), 1..40)) {
        let store = MemoryStore::new();
        let mut tracker = WatchProgressTracker::load(&store);
        let mut now = base_time();

        for step in &steps {
            now += Duration::hours(step.advance_hours);
            tracker.save_progress(report(step.key, step.percent), now);
        }

        let rows = tracker.continue_watching(now);
        prop_assert!(rows.len() <= 10);
        let mut series = HashSet::new();
        for row in &rows {
            prop_assert!(!row.completed);
            if row.media_kind == MediaKind::Series {
                prop_assert!(series.insert(row.title_id));
            }
        }
    }
}

#[test]
fn dismissing_series_clears_every_prior_episode() {
    let store = MemoryStore::new();
    let mut tracker = WatchProgressTracker::load(&store);
    let now = base_time();
    let episodes = [(1, 1), (1, 2), (2, 1), (3, 5)];
    for (offset, (season, episode)) in episodes.iter().enumerate() {
        tracker.save_progress(
            report(WatchKey::episode(77, *season, *episode), 40.0),
            now + Duration::minutes(offset as i64),
        );
    }

    tracker.remove_from_continue_watching(&WatchKey {
        title_id: 77,
        media_kind: MediaKind::Series,
        season_number: None,
        episode_number: None,
    });

    for (season, episode) in episodes {
        assert!(
            tracker
                .get_progress(&WatchKey::episode(77, season, episode))
                .is_none()
        );
    }
    let reloaded = WatchProgressTracker::load(&store);
    assert!(reloaded.records().is_empty());
}

#[test]
fn movie_scenario_moves_out_of_continue_watching_once_finished() {
    let store = MemoryStore::new();
    let mut tracker = WatchProgressTracker::load(&store);
    let now = base_time();

    tracker.save_progress(report(WatchKey::movie(42), 45.0), now);
    assert!(!tracker.get_progress(&WatchKey::movie(42)).expect("saved").completed);

    tracker.save_progress(report(WatchKey::movie(42), 85.0), now + Duration::minutes(30));
    assert!(tracker.get_progress(&WatchKey::movie(42)).expect("saved").completed);
    assert!(
        tracker
            .continue_watching(now + Duration::minutes(30))
            .iter()
            .all(|row| row.title_id != 42)
    );
}

#[test]
fn freshness_scenarios() {
    let store = MemoryStore::new();
    let mut tracker = ContentFreshnessTracker::load(&store);
    let now = base_time();

    tracker.update_seen_content(&[CatalogItem::bare(7, MediaKind::Movie)], now);
    assert!(!tracker.is_new_content(&CatalogItem::bare(7, MediaKind::Movie), now));
    assert!(tracker.is_new_content(&CatalogItem::bare(8, MediaKind::Movie), now));

    let later = now + Duration::days(8);
    assert!(
        tracker
            .get_new_content(&[CatalogItem::bare(8, MediaKind::Movie)], later)
            .is_empty()
    );
}

#[test]
fn trackers_share_one_sqlite_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db = Database::open(&dir.path().join("streamtrack.db")).expect("open database");
    db.migrate().expect("migrate");
    let now = base_time();

    {
        let mut progress = WatchProgressTracker::load(&db);
        progress.save_progress(report(WatchKey::episode(3, 1, 2), 20.0), now);
        let mut freshness = ContentFreshnessTracker::load(&db);
        freshness.update_seen_content(&[CatalogItem::bare(3, MediaKind::Series)], now);
    }

    let progress = WatchProgressTracker::load(&db);
    assert_eq!(progress.continue_watching(now).len(), 1);
    let freshness = ContentFreshnessTracker::load(&db);
    assert!(!freshness.is_new_content(&CatalogItem::bare(3, MediaKind::Series), now));

    let raw = db.get(SEEN_CONTENT_KEY).expect("read").expect("persisted");
    assert!(raw.contains("\"seriesIds\":[3]"));
}

/// Catalog server that can be taken down, publishing movies `1..=newest_movie`.
#[derive(Default)]
struct SwitchableSource {
    down: Cell<bool>,
    newest_movie: Cell<u64>,
    calls: Cell<usize>,
}

impl CatalogSource for SwitchableSource {
    fn fetch(&self, url: &str, _etag: Option<&str>) -> Result<FetchOutcome, FetchError> {
        self.calls.set(self.calls.get() + 1);
        if self.down.get() {
            return Err(FetchError::Exhausted {
                attempts: 3,
                last: "connection refused".to_string(),
            });
        }
        let body = if url.ends_with("movies.json") {
            let movies: serde_json::Map<_, _> = (1..=self.newest_movie.get())
                .map(|id| (id.to_string(), serde_json::json!({})))
                .collect();
            serde_json::json!({ "catalog": { "movies": movies } })
        } else {
            serde_json::json!({ "40": {} })
        };
        Ok(FetchOutcome::Fresh {
            body: body.to_string(),
            etag: None,
        })
    }
}

#[test]
fn poll_fetches_each_kind_once_even_when_the_server_is_down() {
    let store = MemoryStore::new();
    let source = SwitchableSource::default();
    source.newest_movie.set(2);
    let endpoints = CatalogEndpoints {
        movies_url: "https://catalog.test/movies.json".to_string(),
        series_url: "https://catalog.test/series.json".to_string(),
        movie_map_pointer: "/catalog/movies".to_string(),
    };
    let catalog = CatalogCache::new(&store, &source, endpoints, Duration::zero());
    let mut detector = NewContentDetector::new();

    assert!(poll_once(&catalog, &mut detector).is_empty());
    assert_eq!(source.calls.get(), 2);

    source.down.set(true);
    assert!(poll_once(&catalog, &mut detector).is_empty());
    assert_eq!(source.calls.get(), 4);

    source.down.set(false);
    source.newest_movie.set(3);
    let added = poll_once(&catalog, &mut detector);
    assert_eq!(source.calls.get(), 6);
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].title_id, 3);
    assert_eq!(added[0].media_kind, MediaKind::Movie);
}
