use std::collections::HashSet;

use super::media::{CatalogItem, MediaKind};

/// Turns successive catalog snapshots into "added to the catalog" events.
/// The first snapshot only establishes the baseline.
#[derive(Debug, Default)]
pub(crate) struct NewContentDetector {
    baseline: Option<Snapshot>,
    reported: HashSet<(MediaKind, u64)>,
}

#[derive(Debug)]
struct Snapshot {
    movies: HashSet<u64>,
    series: HashSet<u64>,
}

impl NewContentDetector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn observe(&mut self, movie_ids: &[u64], series_ids: &[u64]) -> Vec<CatalogItem> {
        let current = Snapshot {
            movies: movie_ids.iter().copied().collect(),
            series: series_ids.iter().copied().collect(),
        };

        let Some(previous) = self.baseline.replace(current) else {
            self.reported.extend(movie_ids.iter().map(|id| (MediaKind::Movie, *id)));
            self.reported
                .extend(series_ids.iter().map(|id| (MediaKind::Series, *id)));
            log::info!(
                "new-content detector seeded with {} movies and {} series",
                movie_ids.len(),
                series_ids.len()
            );
            return Vec::new();
        };

        let mut added = Vec::new();
        for (kind, ids, known) in [
            (MediaKind::Movie, movie_ids, &previous.movies),
            (MediaKind::Series, series_ids, &previous.series),
        ] {
            for id in ids {
                if known.contains(id) || !self.reported.insert((kind, *id)) {
                    continue;
                }
                log::info!("new {kind} in catalog: {id}");
                added.push(CatalogItem::bare(*id, kind));
            }
        }
        added
    }
}
