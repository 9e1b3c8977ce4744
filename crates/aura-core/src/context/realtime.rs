//! Current date facts injected into every prompt.

use chrono::{DateTime, Datelike, Utc};

/// Northern-hemisphere meteorological season for a month (1-12).
pub fn season(month: u32) -> &'static str {
    match month {
        12 | 1 | 2 => "Winter",
        3..=5 => "Spring",
        6..=8 => "Summer",
        _ => "Autumn",
    }
}

pub fn real_world_context(now: DateTime<Utc>) -> String {
    format!(
        "CURRENT REAL-WORLD CONTEXT:\n\
         - Current Date/Time: {}\n\
         - Day: {}\n\
         - Month: {}\n\
         - Year: {}\n\
         - Season: {} (Northern Hemisphere)\n\
         - Week of Year: {}\n\
         - Day of Year: {}",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        now.format("%A"),
        now.format("%B"),
        now.year(),
        season(now.month()),
        now.iso_week().week(),
        now.ordinal(),
    )
}
