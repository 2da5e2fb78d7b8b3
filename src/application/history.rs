use crate::domain::models::{Cycle, CycleStatus};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const MONTH: i64 = 30 * DAY;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryItem {
    pub id: String,
    pub task: String,
    pub duration: String,
    pub started_at: String,
    pub started_relative: String,
    pub status: CycleStatus,
    pub status_label: String,
}

/// Read-only rows for the history view, most recent cycle first.
pub fn history_items(cycles: &[Cycle], now: DateTime<Utc>, tz: Tz) -> Vec<HistoryItem> {
    cycles
        .iter()
        .rev()
        .map(|cycle| {
            let status = cycle.status();
            HistoryItem {
                id: cycle.id.clone(),
                task: cycle.task.clone(),
                duration: duration_label(cycle.planned_minutes),
                started_at: cycle
                    .started_at
                    .with_timezone(&tz)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                started_relative: relative_to_now(cycle.started_at, now),
                status,
                status_label: status.label().to_string(),
            }
        })
        .collect()
}

pub fn duration_label(minutes: u32) -> String {
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

pub fn relative_to_now(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - time).num_seconds();
    let distance = format_distance(delta.abs());
    if delta >= 0 {
        format!("{distance} ago")
    } else {
        format!("in {distance}")
    }
}

/// Rounds a distance in seconds to the coarse wording used for timestamps.
pub fn format_distance(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let minutes = (seconds as f64 / MINUTE as f64).round() as i64;

    if seconds < 30 {
        return "less than a minute".to_string();
    }
    if seconds < 90 {
        return "1 minute".to_string();
    }
    if seconds < 45 * MINUTE {
        return format!("{minutes} minutes");
    }
    if seconds < 90 * MINUTE {
        return "about 1 hour".to_string();
    }
    if seconds < DAY {
        let hours = (seconds as f64 / HOUR as f64).round() as i64;
        return format!("about {hours} hours");
    }
    if seconds < 42 * HOUR {
        return "1 day".to_string();
    }
    if seconds < MONTH {
        let days = (seconds as f64 / DAY as f64).round() as i64;
        return format!("{days} days");
    }
    if seconds < 45 * DAY {
        return "about 1 month".to_string();
    }
    if seconds < 60 * DAY {
        return "about 2 months".to_string();
    }

    let months = (seconds as f64 / MONTH as f64).round() as i64;
    if months < 12 {
        return format!("{months} months");
    }

    let years = months / 12;
    let remainder = months % 12;
    let unit = |count: i64| if count == 1 { "year" } else { "years" };
    if remainder < 3 {
        format!("about {years} {}", unit(years))
    } else if remainder < 9 {
        format!("over {years} {}", unit(years))
    } else {
        format!("almost {} {}", years + 1, unit(years + 1))
    }
}
