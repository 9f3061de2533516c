use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::types::{ChannelStatus, Livestream, NotifyDecision};

/// Start-time field aliases, consulted in priority order.
pub const START_TIME_FIELDS: &[&str] = &[
    "started_at",
    "startedAt",
    "created_at",
    "createdAt",
    "start_time",
    "stream_started_at",
];

/// Zone-less formats tried after RFC 3339. All are read as UTC.
pub const START_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a start timestamp. Returns `None` for anything unrecognised.
pub fn parse_start_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // A trailing literal `Z` is a zero UTC offset.
    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(stem) => format!("{stem}+00:00"),
        None => raw.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    START_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// First parseable start time among [`START_TIME_FIELDS`], with the alias it came from.
pub fn extract_start_time(live: &Livestream) -> Option<(&'static str, DateTime<Utc>)> {
    START_TIME_FIELDS.iter().find_map(|&key| {
        let parsed = live
            .fields
            .get(key)
            .and_then(Value::as_str)
            .and_then(parse_start_time);
        if parsed.is_none() && live.fields.contains_key(key) {
            debug!("Unparseable start time under \"{key}\": {}", live.fields[key]);
        }
        parsed.map(|ts| (key, ts))
    })
}

/// Decide whether this poll should produce a notification.
///
/// Live with a start time: notify iff `now - start <= window` (equality
/// notifies). Live without a usable start time: always notify.
pub fn evaluate(status: &ChannelStatus, window: Duration, now: DateTime<Utc>) -> NotifyDecision {
    let Some(live) = &status.livestream else {
        return NotifyDecision::NotLive;
    };

    match extract_start_time(live) {
        Some((_, started_at)) => {
            let elapsed = now - started_at;
            if elapsed <= window {
                NotifyDecision::Notify {
                    started_at: Some(started_at),
                }
            } else {
                info!(
                    "Stream started {} minutes ago (> {}m), skipping notify",
                    elapsed.num_minutes(),
                    window.num_minutes()
                );
                NotifyDecision::OutsideWindow {
                    started_at,
                    elapsed_secs: elapsed.num_seconds(),
                }
            }
        }
        None => {
            info!("No start timestamp from Kick, notifying anyway (may duplicate)");
            NotifyDecision::Notify { started_at: None }
        }
    }
}
