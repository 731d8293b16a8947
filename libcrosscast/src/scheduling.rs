//! Schedule time parsing
//!
//! Accepted forms, tried in order:
//! - RFC 3339: `2025-11-20T15:00:00Z`
//! - Local wall-clock time: `2025-11-20 15:00` or `2025-11-20T15:00`
//! - Relative durations: `30m`, `2h`, `1day`
//! - Natural language: `tomorrow`, `next monday 10am`
//!
//! Past times are accepted; such a job is due immediately.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};

use crate::{CrosscastError, Result};

const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a schedule string relative to `now`
///
/// # Errors
///
/// `InvalidInput` if the string matches none of the accepted forms.
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CrosscastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Some(dt) = parse_local(input) {
        return Ok(dt);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(now + duration);
    }

    if let Ok(dt) = parse_natural_language(input, now) {
        return Ok(dt);
    }

    Err(CrosscastError::InvalidInput(format!(
        "Could not parse schedule time '{}'. Try '2025-11-20 15:00', '2h', or 'tomorrow'",
        input
    )))
}

fn parse_local(input: &str) -> Option<DateTime<Utc>> {
    LOCAL_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(input, format).ok()?;
        // DST gaps have no local mapping; ambiguous times take the earlier one
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| CrosscastError::InvalidInput(format!("Could not parse duration: {}", e)))?;

    Duration::from_std(std_duration)
        .map_err(|_| CrosscastError::InvalidInput("Duration out of range".to_string()))
}

fn parse_natural_language(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us)
        .map_err(|e| CrosscastError::InvalidInput(format!("Could not parse time: {}", e)))
}

/// Human description of the gap between `now` and `at`, e.g. `in 2h 5m`
pub fn format_time_until(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = at - now;
    if diff.num_seconds() <= 0 {
        return "due now".to_string();
    }

    let days = diff.num_days();
    let hours = diff.num_hours() % 24;
    let minutes = diff.num_minutes() % 60;

    if days > 0 {
        format!("in {}d {}h", days, hours)
    } else if hours > 0 {
        format!("in {}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("in {}m", minutes)
    } else {
        format!("in {}s", diff.num_seconds())
    }
}
