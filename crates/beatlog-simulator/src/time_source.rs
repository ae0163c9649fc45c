//! Calendar time for BPM records

use std::time::Duration;

use embedded_sdmmc::{TimeSource, Timestamp};
use time::OffsetDateTime;

use crate::clock::SimClock;

/// Wall-clock time as seen by the simulated device.
///
/// The calendar starts at `start` and advances with `clock`, so in virtual
/// mode a simulated minute moves the record timestamps by one minute.
#[derive(Debug, Clone)]
pub struct CalendarTime<C> {
    start: OffsetDateTime,
    clock: C,
}

impl<C: SimClock> CalendarTime<C> {
    pub fn new(start: OffsetDateTime, clock: C) -> Self {
        Self { start, clock }
    }

    pub fn now(&self) -> OffsetDateTime {
        self.start + self.clock.elapsed()
    }
}

/// Local time if the offset can be determined, UTC otherwise.
///
/// Call before spawning threads; the local offset is unavailable afterwards
/// on some platforms.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Convert to the FAT timestamp representation, clamping years outside 1970..=2225.
pub fn to_timestamp(at: OffsetDateTime) -> Timestamp {
    Timestamp {
        year_since_1970: (at.year() - 1970).clamp(0, i32::from(u8::MAX)) as u8,
        zero_indexed_month: u8::from(at.month()) - 1,
        zero_indexed_day: at.day() - 1,
        hours: at.hour(),
        minutes: at.minute(),
        seconds: at.second(),
    }
}

impl<C: SimClock> TimeSource for CalendarTime<C> {
    fn get_timestamp(&self) -> Timestamp {
        to_timestamp(self.now())
    }
}

/// Elapsed time formatted as `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
