use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum MediaKind {
    Movie,
    Series,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => f.pad("movie"),
            MediaKind::Series => f.pad("series"),
        }
    }
}

/// A title as handed over by the catalog, annotated but never reshaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CatalogItem {
    pub(crate) title_id: u64,
    pub(crate) media_kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) rating: Option<f64>,
}

impl CatalogItem {
    pub(crate) fn bare(title_id: u64, media_kind: MediaKind) -> Self {
        Self {
            title_id,
            media_kind,
            title: None,
            poster_path: None,
            rating: None,
        }
    }
}
