//! Source of "now" and "today".
//!
//! The session state machine is keyed by calendar day, so the day has to be
//! injectable: tests pin it, and the CLI lets a user backfill yesterday.

use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies the current time to the database.
pub trait Clock: Send + Sync {
    /// Current time as Unix milliseconds.
    fn now_millis(&self) -> i64;

    /// The user's current calendar day.
    fn today(&self) -> NaiveDate;
}

/// Wall-clock time in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Local::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one calendar day.
///
/// `now_millis` starts at noon of that day and advances by one millisecond
/// per call, so records written through it keep a strict order.
#[derive(Debug)]
pub struct FixedClock {
    day: Mutex<NaiveDate>,
    tick: AtomicI64,
}

impl FixedClock {
    /// Pins the clock to `day`.
    #[must_use]
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: Mutex::new(day),
            tick: AtomicI64::new(noon_millis(day)),
        }
    }

    /// Moves the clock to another day; time restarts at that day's noon
    /// unless that would go backwards.
    pub fn set_day(&self, day: NaiveDate) {
        *self.day.lock() = day;
        self.tick.fetch_max(noon_millis(day), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.tick.fetch_add(1, Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        *self.day.lock()
    }
}

fn noon_millis(day: NaiveDate) -> i64 {
    let noon = day.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map_or_else(|| noon.and_utc().timestamp_millis(), |t| t.timestamp_millis())
}
