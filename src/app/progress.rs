use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::media::MediaKind;
use crate::store::{KvStore, load_document, save_document};

pub(crate) const PROGRESS_KEY: &str = "watch_progress";

/// Percentage at or above which a report counts as a finished watch.
pub(crate) const COMPLETION_THRESHOLD: f64 = 80.0;
const COMPLETED_RETENTION_DAYS: i64 = 7;
const CONTINUE_WATCHING_DAYS: i64 = 30;
const CONTINUE_WATCHING_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WatchProgressRecord {
    pub(crate) title_id: u64,
    pub(crate) media_kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) season_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) episode_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) episode_name: Option<String>,
    pub(crate) progress_percent: f64,
    pub(crate) current_time_seconds: u64,
    pub(crate) total_duration_seconds: u64,
    pub(crate) completed: bool,
    pub(crate) last_watched_at: DateTime<Utc>,
}

impl WatchProgressRecord {
    fn matches(&self, key: &WatchKey) -> bool {
        if self.title_id != key.title_id || self.media_kind != key.media_kind {
            return false;
        }
        match key.media_kind {
            MediaKind::Movie => true,
            MediaKind::Series => {
                self.season_number == key.season_number
                    && self.episode_number == key.episode_number
            }
        }
    }
}

/// Identity of a record. Season and episode only take part for series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WatchKey {
    pub(crate) title_id: u64,
    pub(crate) media_kind: MediaKind,
    pub(crate) season_number: Option<u32>,
    pub(crate) episode_number: Option<u32>,
}

impl WatchKey {
    pub(crate) fn movie(title_id: u64) -> Self {
        Self {
            title_id,
            media_kind: MediaKind::Movie,
            season_number: None,
            episode_number: None,
        }
    }

    pub(crate) fn episode(title_id: u64, season: u32, episode: u32) -> Self {
        Self {
            title_id,
            media_kind: MediaKind::Series,
            season_number: Some(season),
            episode_number: Some(episode),
        }
    }
}

/// A playback position report from the player.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProgressReport {
    pub(crate) key: WatchKey,
    pub(crate) episode_name: Option<String>,
    /// When absent, derived from the two second counters.
    pub(crate) progress_percent: Option<f64>,
    pub(crate) current_time_seconds: u64,
    pub(crate) total_duration_seconds: u64,
    pub(crate) completed: bool,
}

impl ProgressReport {
    pub(crate) fn percent(&self) -> f64 {
        let raw = match self.progress_percent {
            Some(percent) => percent,
            None if self.total_duration_seconds == 0 => 0.0,
            None => {
                self.current_time_seconds as f64 / self.total_duration_seconds as f64 * 100.0
            }
        };
        if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

pub(crate) struct WatchProgressTracker<'a> {
    store: &'a dyn KvStore,
    records: Vec<WatchProgressRecord>,
}

impl<'a> WatchProgressTracker<'a> {
    pub(crate) fn load(store: &'a dyn KvStore) -> Self {
        let records = load_document(store, PROGRESS_KEY).unwrap_or_default();
        Self { store, records }
    }

    /// Newest first.
    pub(crate) fn records(&self) -> &[WatchProgressRecord] {
        &self.records
    }

    pub(crate) fn save_progress(
        &mut self,
        report: ProgressReport,
        now: DateTime<Utc>,
    ) -> &WatchProgressRecord {
        let progress_percent = report.percent();
        let key = report.key;
        let record = WatchProgressRecord {
            title_id: key.title_id,
            media_kind: key.media_kind,
            season_number: key.season_number,
            episode_number: key.episode_number,
            episode_name: report.episode_name,
            progress_percent,
            current_time_seconds: report.current_time_seconds,
            total_duration_seconds: report.total_duration_seconds,
            completed: progress_percent >= COMPLETION_THRESHOLD || report.completed,
            last_watched_at: now,
        };

        match self.records.iter().position(|existing| existing.matches(&key)) {
            Some(idx) => self.records[idx] = record,
            None => self.records.insert(0, record),
        }

        let cutoff = now - Duration::days(COMPLETED_RETENTION_DAYS);
        self.records
            .retain(|existing| !existing.completed || existing.last_watched_at > cutoff);
        self.records
            .sort_by(|left, right| right.last_watched_at.cmp(&left.last_watched_at));

        self.persist();

        // The saved record carries `now`, the newest timestamp, so it survives
        // the prune and is found again after the sort.
        let idx = self
            .records
            .iter()
            .position(|existing| existing.matches(&key))
            .unwrap_or(0);
        &self.records[idx]
    }

    pub(crate) fn get_progress(&self, key: &WatchKey) -> Option<&WatchProgressRecord> {
        self.records.iter().find(|record| record.matches(key))
    }

    /// In-progress titles from the last 30 days, one row per title.
    pub(crate) fn continue_watching(&self, now: DateTime<Utc>) -> Vec<WatchProgressRecord> {
        let cutoff = now - Duration::days(CONTINUE_WATCHING_DAYS);
        let mut latest: Vec<WatchProgressRecord> = Vec::new();
        let mut slots: HashMap<(MediaKind, u64), usize> = HashMap::new();

        for record in self
            .records
            .iter()
            .filter(|record| !record.completed && record.last_watched_at > cutoff)
        {
            match slots.get(&(record.media_kind, record.title_id)) {
                Some(&idx) => {
                    if record.last_watched_at > latest[idx].last_watched_at {
                        latest[idx] = record.clone();
                    }
                }
                None => {
                    slots.insert((record.media_kind, record.title_id), latest.len());
                    latest.push(record.clone());
                }
            }
        }

        latest.sort_by(|left, right| right.last_watched_at.cmp(&left.last_watched_at));
        latest.truncate(CONTINUE_WATCHING_LIMIT);
        latest
    }

    /// Dismisses a row. Dismissing a series drops every episode of it so an
    /// older episode cannot take the row back.
    pub(crate) fn remove_from_continue_watching(&mut self, key: &WatchKey) -> usize {
        let before = self.records.len();
        match key.media_kind {
            MediaKind::Movie => self.records.retain(|record| !record.matches(key)),
            MediaKind::Series => self.records.retain(|record| {
                !(record.media_kind == MediaKind::Series && record.title_id == key.title_id)
            }),
        }
        let removed = before - self.records.len();
        self.persist();
        removed
    }

    pub(crate) fn clear_progress(&mut self, title_id: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|record| record.title_id != title_id);
        let removed = before - self.records.len();
        self.persist();
        removed
    }

    pub(crate) fn clear_all_progress(&mut self) {
        self.records.clear();
        self.persist();
    }

    fn persist(&self) {
        save_document(self.store, PROGRESS_KEY, &self.records);
    }
}
