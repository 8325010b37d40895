use chrono::{DateTime, Local, Utc};

use super::media::{CatalogItem, MediaKind};
use super::progress::WatchProgressRecord;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_watched_at(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M %:z")
        .to_string()
}

/// `S1E3 Title` for episodes, empty for movies.
pub(crate) fn episode_label(record: &WatchProgressRecord) -> String {
    if record.media_kind == MediaKind::Movie {
        return String::new();
    }
    let code = match (record.season_number, record.episode_number) {
        (Some(season), Some(episode)) => format!("S{season}E{episode}"),
        (Some(season), None) => format!("S{season}"),
        (None, Some(episode)) => format!("E{episode}"),
        (None, None) => String::new(),
    };
    match record.episode_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() && !code.is_empty() => format!("{code} {name}"),
        Some(name) if !name.is_empty() => name.to_string(),
        _ => code,
    }
}

pub(crate) fn format_progress(record: &WatchProgressRecord) -> String {
    let mut out = format!("{:.0}%", record.progress_percent);
    if record.total_duration_seconds > 0 {
        out.push_str(&format!(
            " ({}/{})",
            format_clock(record.current_time_seconds),
            format_clock(record.total_duration_seconds)
        ));
    }
    if record.completed {
        out.push_str(" done");
    }
    out
}

pub(crate) fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub(crate) fn print_progress_table(records: &[WatchProgressRecord]) {
    println!(
        "{:<10} {:<8} {:<32} {:<24} {:<22}",
        "ID", "KIND", "EPISODE", "PROGRESS", "LAST WATCHED"
    );
    for record in records {
        println!(
            "{:<10} {:<8} {:<32} {:<24} {:<22}",
            record.title_id,
            record.media_kind,
            truncate(&episode_label(record), 32),
            format_progress(record),
            format_watched_at(&record.last_watched_at)
        );
    }
}

pub(crate) fn describe_item(item: &CatalogItem) -> String {
    match item.title.as_deref() {
        Some(title) => format!("{} {} {}", item.media_kind, item.title_id, truncate(title, 40)),
        None => format!("{} {}", item.media_kind, item.title_id),
    }
}
