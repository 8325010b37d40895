use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::media::{CatalogItem, MediaKind};
use crate::store::{KvStore, load_document, save_document};

pub(crate) const SEEN_CONTENT_KEY: &str = "seen_content";
const FRESHNESS_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentFreshnessRecord {
    #[serde(default)]
    pub(crate) movie_ids: BTreeSet<u64>,
    #[serde(default)]
    pub(crate) series_ids: BTreeSet<u64>,
    #[serde(default)]
    pub(crate) last_update: Option<DateTime<Utc>>,
}

impl ContentFreshnessRecord {
    fn ids(&self, kind: MediaKind) -> &BTreeSet<u64> {
        match kind {
            MediaKind::Movie => &self.movie_ids,
            MediaKind::Series => &self.series_ids,
        }
    }

    fn ids_mut(&mut self, kind: MediaKind) -> &mut BTreeSet<u64> {
        match kind {
            MediaKind::Movie => &mut self.movie_ids,
            MediaKind::Series => &mut self.series_ids,
        }
    }

    /// The window is whole-collection: it is keyed on the last catalog
    /// observation, not on when an individual title first showed up.
    fn window_open(&self, now: DateTime<Utc>) -> bool {
        self.last_update
            .is_some_and(|last| last > now - Duration::days(FRESHNESS_WINDOW_DAYS))
    }
}

pub(crate) struct ContentFreshnessTracker<'a> {
    store: &'a dyn KvStore,
    state: ContentFreshnessRecord,
}

impl<'a> ContentFreshnessTracker<'a> {
    pub(crate) fn load(store: &'a dyn KvStore) -> Self {
        let state = load_document(store, SEEN_CONTENT_KEY).unwrap_or_default();
        Self { store, state }
    }

    pub(crate) fn state(&self) -> &ContentFreshnessRecord {
        &self.state
    }

    pub(crate) fn update_seen_content(&mut self, items: &[CatalogItem], now: DateTime<Utc>) {
        if items.is_empty() {
            return;
        }
        for item in items {
            self.state.ids_mut(item.media_kind).insert(item.title_id);
        }
        self.state.last_update = Some(now);
        self.persist();
    }

    pub(crate) fn get_new_content(
        &self,
        items: &[CatalogItem],
        now: DateTime<Utc>,
    ) -> Vec<CatalogItem> {
        if !self.state.window_open(now) {
            return Vec::new();
        }
        items
            .iter()
            .filter(|item| !self.is_seen(item))
            .cloned()
            .collect()
    }

    pub(crate) fn is_new_content(&self, item: &CatalogItem, now: DateTime<Utc>) -> bool {
        self.state.window_open(now) && !self.is_seen(item)
    }

    /// Returns whether the id was not yet in the seen-set.
    pub(crate) fn mark_as_viewed(&mut self, item: &CatalogItem) -> bool {
        let inserted = self.state.ids_mut(item.media_kind).insert(item.title_id);
        if inserted {
            self.persist();
        }
        inserted
    }

    fn is_seen(&self, item: &CatalogItem) -> bool {
        self.state.ids(item.media_kind).contains(&item.title_id)
    }

    fn persist(&self) {
        save_document(self.store, SEEN_CONTENT_KEY, &self.state);
    }
}
