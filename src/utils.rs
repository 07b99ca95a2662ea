//! Clock and calendar helpers shared across the exchange.

use std::time::{SystemTime, UNIX_EPOCH};

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Current wall-clock time as integer milliseconds since the Unix epoch.
pub fn current_time_millis() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        // Clock before the epoch; treat as epoch rather than panic.
        Err(_) => 0,
    }
}

/// Truncate a millisecond timestamp down to the preceding UTC midnight.
///
/// Uses euclidean remainder so pre-epoch timestamps still land on the
/// midnight at or before them.
pub fn midnight_utc(timestamp_ms: i64) -> i64 {
    timestamp_ms - timestamp_ms.rem_euclid(DAY_MS)
}
