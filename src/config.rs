use std::path::PathBuf;

use anyhow::{Result, ensure};
use chrono::Duration;

use crate::app::catalog::CatalogEndpoints;
use crate::cli::GlobalArgs;
use crate::paths::database_file_path;

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) db_path: PathBuf,
    pub(crate) endpoints: CatalogEndpoints,
    pub(crate) cache_ttl: Duration,
    pub(crate) log_filter: &'static str,
}

impl Config {
    pub(crate) fn from_args(args: &GlobalArgs) -> Result<Self> {
        let db_path = match &args.db {
            Some(path) => path.clone(),
            None => database_file_path()?,
        };
        ensure!(
            args.movie_map_pointer.is_empty() || args.movie_map_pointer.starts_with('/'),
            "movie map pointer must be empty or start with '/': {}",
            args.movie_map_pointer
        );
        let cache_ttl = i64::try_from(args.cache_ttl)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        Ok(Self {
            db_path,
            endpoints: CatalogEndpoints {
                movies_url: args.movies_url.clone(),
                series_url: args.series_url.clone(),
                movie_map_pointer: args.movie_map_pointer.clone(),
            },
            cache_ttl,
            log_filter: log_filter(args.verbose),
        })
    }
}

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, DEFAULT_MOVIE_MAP_POINTER};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn explicit_db_path_and_defaults() {
        let cli = parse(&["streamtrack", "--db", "/tmp/st.db", "continue"]);
        let config = Config::from_args(&cli.global).expect("config");
        assert_eq!(config.db_path, PathBuf::from("/tmp/st.db"));
        assert_eq!(config.endpoints.movie_map_pointer, DEFAULT_MOVIE_MAP_POINTER);
        assert_eq!(config.cache_ttl, Duration::seconds(10));
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn verbosity_raises_log_level() {
        let cli = parse(&["streamtrack", "--db", "/tmp/st.db", "-vv", "list"]);
        let config = Config::from_args(&cli.global).expect("config");
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn rejects_relative_pointer() {
        let cli = parse(&[
            "streamtrack",
            "--db",
            "/tmp/st.db",
            "--movie-map-pointer",
            "movies",
            "catalog",
        ]);
        assert!(Config::from_args(&cli.global).is_err());
    }
}
