use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::media::{CatalogItem, MediaKind};
use crate::http::{FetchError, FetchOutcome, RetryPolicy, get_conditional_with_retries};
use crate::store::{KvStore, load_document, save_document};

pub(crate) trait CatalogSource {
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HttpSource {
    pub(crate) policy: RetryPolicy,
}

impl CatalogSource for HttpSource {
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError> {
        get_conditional_with_retries(url, etag, self.policy)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CatalogEndpoints {
    pub(crate) movies_url: String,
    pub(crate) series_url: String,
    /// JSON pointer to the id -> watch URL map inside the movies document.
    pub(crate) movie_map_pointer: String,
}

impl CatalogEndpoints {
    fn url(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Movie => &self.movies_url,
            MediaKind::Series => &self.series_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedCatalog {
    body: Value,
    fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
}

fn cache_key(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "catalog:movies",
        MediaKind::Series => "catalog:series",
    }
}

/// Catalog documents cached in the key-value store, revalidated with the
/// server's ETag once older than the TTL.
pub(crate) struct CatalogCache<'a> {
    store: &'a dyn KvStore,
    source: &'a dyn CatalogSource,
    endpoints: CatalogEndpoints,
    ttl: Duration,
}

impl<'a> CatalogCache<'a> {
    pub(crate) fn new(
        store: &'a dyn KvStore,
        source: &'a dyn CatalogSource,
        endpoints: CatalogEndpoints,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            source,
            endpoints,
            ttl,
        }
    }

    /// Cached body while fresh; otherwise revalidates, falling back to the
    /// stale body when the fetch fails.
    pub(crate) fn load(&self, kind: MediaKind, now: DateTime<Utc>) -> Result<Value, FetchError> {
        let cached: Option<CachedCatalog> = load_document(self.store, cache_key(kind));
        if let Some(entry) = &cached
            && now - entry.fetched_at < self.ttl
        {
            return Ok(entry.body.clone());
        }

        let stale = cached.as_ref().map(|entry| entry.body.clone());
        match self.revalidate(kind, cached, now) {
            Ok((entry, _)) => Ok(entry.body),
            Err(err) => match stale {
                Some(body) => {
                    log::warn!("using cached {kind} catalog after fetch error: {err}");
                    Ok(body)
                }
                None => Err(err),
            },
        }
    }

    /// Revalidates regardless of age. Returns whether the document changed.
    pub(crate) fn refresh(&self, kind: MediaKind, now: DateTime<Utc>) -> Result<bool, FetchError> {
        let cached: Option<CachedCatalog> = load_document(self.store, cache_key(kind));
        let (_, changed) = self.revalidate(kind, cached, now)?;
        Ok(changed)
    }

    fn revalidate(
        &self,
        kind: MediaKind,
        cached: Option<CachedCatalog>,
        now: DateTime<Utc>,
    ) -> Result<(CachedCatalog, bool), FetchError> {
        let url = self.endpoints.url(kind);
        let etag = cached.as_ref().and_then(|entry| entry.etag.as_deref());
        let outcome = self.source.fetch(url, etag)?;

        let (entry, changed) = match (outcome, cached) {
            (FetchOutcome::NotModified, Some(mut entry)) => {
                entry.fetched_at = now;
                (entry, false)
            }
            (FetchOutcome::NotModified, None) => {
                return Err(FetchError::Status {
                    status: 304,
                    detail: " (no cached copy to revalidate)".to_string(),
                });
            }
            (FetchOutcome::Fresh { body, etag }, cached) => {
                let body: Value =
                    serde_json::from_str(&body).map_err(|source| FetchError::InvalidJson {
                        url: url.to_string(),
                        source,
                    })?;
                let changed = cached.is_none_or(|entry| entry.body != body);
                (
                    CachedCatalog {
                        body,
                        fetched_at: now,
                        etag,
                    },
                    changed,
                )
            }
        };

        save_document(self.store, cache_key(kind), &entry);
        Ok((entry, changed))
    }

    pub(crate) fn movie_ids(&self, now: DateTime<Utc>) -> Result<Vec<u64>, FetchError> {
        let body = self.load(MediaKind::Movie, now)?;
        Ok(self.ids_in(MediaKind::Movie, &body))
    }

    pub(crate) fn series_ids(&self, now: DateTime<Utc>) -> Result<Vec<u64>, FetchError> {
        let body = self.load(MediaKind::Series, now)?;
        Ok(self.ids_in(MediaKind::Series, &body))
    }

    /// Ids of the stored document, whatever its age. Never fetches.
    pub(crate) fn cached_ids(&self, kind: MediaKind) -> Option<Vec<u64>> {
        let cached: CachedCatalog = load_document(self.store, cache_key(kind))?;
        Some(self.ids_in(kind, &cached.body))
    }

    fn ids_in(&self, kind: MediaKind, body: &Value) -> Vec<u64> {
        match kind {
            MediaKind::Movie => ids_from_map(body.pointer(&self.endpoints.movie_map_pointer)),
            MediaKind::Series => ids_from_map(Some(body)),
        }
    }

    /// Movies first, then series, each highest id first.
    pub(crate) fn items(&self, now: DateTime<Utc>) -> Result<Vec<CatalogItem>, FetchError> {
        let movies = self.movie_ids(now)?;
        let series = self.series_ids(now)?;
        Ok(movies
            .into_iter()
            .map(|id| CatalogItem::bare(id, MediaKind::Movie))
            .chain(
                series
                    .into_iter()
                    .map(|id| CatalogItem::bare(id, MediaKind::Series)),
            )
            .collect())
    }

    pub(crate) fn movie_watch_url(
        &self,
        title_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, FetchError> {
        let body = self.load(MediaKind::Movie, now)?;
        let url = body
            .pointer(&self.endpoints.movie_map_pointer)
            .and_then(|map| map.get(title_id.to_string()))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        Ok(url)
    }
}

/// Numeric keys of an id map, highest id first.
pub(crate) fn ids_from_map(map: Option<&Value>) -> Vec<u64> {
    let Some(Value::Object(entries)) = map else {
        return Vec::new();
    };
    let mut ids: Vec<u64> = entries
        .keys()
        .filter_map(|key| key.trim().parse::<u64>().ok())
        .filter(|id| *id > 0)
        .collect();
    ids.sort_unstable_by(|left, right| right.cmp(left));
    ids.dedup();
    ids
}
