//! Clock abstraction for deriving the time-of-day signal.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use crate::signals::{DayPeriod, Season, TimeOfDay};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a fixed instant (tests, offline replays).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

impl DayPeriod {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=7 => DayPeriod::Dawn,
            8..=11 => DayPeriod::Morning,
            12..=16 => DayPeriod::Afternoon,
            17..=20 => DayPeriod::Evening,
            _ => DayPeriod::Night,
        }
    }
}

impl Season {
    /// Northern-hemisphere meteorological season for a month (1-12).
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

impl TimeOfDay {
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        let hour = at.hour();
        Self {
            hour,
            period: DayPeriod::from_hour(hour),
            season: Season::from_month(at.month()),
        }
    }

    /// Read the time of day from a clock.
    pub fn now(clock: &dyn Clock) -> Self {
        Self::from_datetime(clock.now())
    }
}
