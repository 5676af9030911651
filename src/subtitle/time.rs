//! SRT timestamps: `HH:MM:SS,mmm` with an unbounded hour field.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{AudiosubError, Result};

const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_SECOND: u64 = 1_000;

/// Format an offset in seconds as an SRT timestamp.
///
/// Milliseconds are rounded half away from zero and carry into the seconds
/// field. Hours never wrap. Negative or non-finite input is rejected.
pub fn format_timestamp(seconds: f64) -> Result<String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(AudiosubError::InvalidTimestamp(format!(
            "{seconds} is not a valid subtitle offset"
        )));
    }

    let total_ms = (seconds * 1000.0).round();
    if total_ms > u64::MAX as f64 {
        return Err(AudiosubError::InvalidTimestamp(format!(
            "{seconds} is out of range"
        )));
    }
    let total_ms = total_ms as u64;

    let hours = total_ms / MS_PER_HOUR;
    let minutes = (total_ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let secs = (total_ms % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = total_ms % MS_PER_SECOND;

    Ok(format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis))
}

/// Format a timeline offset.
pub fn format_duration(d: Duration) -> Result<String> {
    format_timestamp(d.as_secs_f64())
}

/// The millisecond a timeline offset is written as.
pub fn to_millis(d: Duration) -> u64 {
    (d.as_secs_f64() * 1000.0).round() as u64
}

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2,}):([0-5]\d):([0-5]\d),(\d{3})$").expect("Invalid regex")
    })
}

/// Parse an SRT timestamp back into seconds.
pub fn parse_timestamp(s: &str) -> Result<f64> {
    let caps = timestamp_regex()
        .captures(s.trim())
        .ok_or_else(|| AudiosubError::InvalidTimestamp(format!("'{s}' is not HH:MM:SS,mmm")))?;

    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|e| AudiosubError::InvalidTimestamp(format!("'{s}': {e}")))
    };

    let total_ms = field(1)? * MS_PER_HOUR
        + field(2)? * MS_PER_MINUTE
        + field(3)? * MS_PER_SECOND
        + field(4)?;

    Ok(total_ms as f64 / 1000.0)
}
