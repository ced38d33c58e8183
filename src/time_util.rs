//! Thin wrapper around [`time::OffsetDateTime`] so call sites read `now()`
//! instead of repeating `OffsetDateTime::now_utc()`, and so the soft-delete
//! grace-period arithmetic has one place to live.

use time::{Duration, OffsetDateTime};

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn add_days(from: OffsetDateTime, days: i64) -> OffsetDateTime {
    from + Duration::days(days)
}
