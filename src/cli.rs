use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::app::media::MediaKind;

pub(crate) const DEFAULT_MOVIES_URL: &str = "https://raw.githubusercontent.com/fenixvf/server-json/refs/heads/main/filmes-series-tavernastream-default-rtdb-export.json";
pub(crate) const DEFAULT_SERIES_URL: &str = "https://raw.githubusercontent.com/fenixvf/server-json/refs/heads/main/series-tavernastream-default-rtdb-export.json";
pub(crate) const DEFAULT_MOVIE_MAP_POINTER: &str = "/catalogo-filmes-tavernastream/filmes";

#[derive(Debug, Parser)]
#[command(
    name = "streamtrack",
    version,
    about = "Track watch progress and new catalog content"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (defaults to the platform data directory)
    #[arg(long, env = "STREAMTRACK_DB", global = true)]
    pub db: Option<PathBuf>,

    #[arg(long, env = "STREAMTRACK_MOVIES_URL", default_value = DEFAULT_MOVIES_URL, global = true)]
    pub movies_url: String,

    #[arg(long, env = "STREAMTRACK_SERIES_URL", default_value = DEFAULT_SERIES_URL, global = true)]
    pub series_url: String,

    /// JSON pointer to the movie id map inside the movies document
    #[arg(long, default_value = DEFAULT_MOVIE_MAP_POINTER, global = true)]
    pub movie_map_pointer: String,

    /// Seconds a fetched catalog is served without revalidation
    #[arg(long, default_value_t = 10, global = true)]
    pub cache_ttl: u64,
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    #[arg(long)]
    pub id: u64,

    #[arg(long, value_enum)]
    pub kind: MediaKind,

    #[arg(long)]
    pub season: Option<u32>,

    #[arg(long)]
    pub episode: Option<u32>,
}

#[derive(Debug, Args)]
pub struct ItemArgs {
    #[arg(long)]
    pub id: u64,

    #[arg(long, value_enum)]
    pub kind: MediaKind,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a playback position
    Save {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long)]
        episode_name: Option<String>,

        /// Progress percentage; derived from --position/--duration when omitted
        #[arg(long)]
        percent: Option<f64>,

        #[arg(long, default_value_t = 0)]
        position: u64,

        #[arg(long, default_value_t = 0)]
        duration: u64,

        /// Mark as finished regardless of percentage
        #[arg(long)]
        completed: bool,
    },
    /// Show stored progress for one title or episode
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the continue-watching row
    Continue,
    /// List every stored progress record
    List,
    /// Remove a title from continue watching (all episodes for series)
    Dismiss {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Forget all progress for a title id
    Clear {
        #[arg(long)]
        id: u64,
    },
    /// Forget all progress
    ClearAll,
    /// Record the current catalog as seen
    Seen,
    /// List catalog titles not yet seen
    New,
    /// Check whether one title counts as new
    IsNew {
        #[command(flatten)]
        item: ItemArgs,
    },
    /// Mark one title as seen without refreshing the window
    Viewed {
        #[command(flatten)]
        item: ItemArgs,
    },
    /// Print catalog ids
    Catalog,
    /// Print the watch URL of a movie
    Locate {
        #[arg(long)]
        id: u64,
    },
    /// Poll the catalog and report titles as they are added
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,

        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<u32>,
    },
}
