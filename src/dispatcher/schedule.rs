//! Time-window predicates deciding whether a job runs on a given tick

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

fn default_daily_hour() -> u32 {
    9
}

fn default_weekly_day() -> Weekday {
    Weekday::Mon
}

fn default_weekly_hour() -> u32 {
    8
}

/// When a job is eligible to run (all hours UTC)
///
/// ```json
/// {"every": "always"}
/// {"every": "daily", "hour": 9}
/// {"every": "weekly", "day": "Mon", "hour": 8}
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum Schedule {
    /// Runs on every tick
    #[default]
    Always,

    /// Runs when the tick falls in the configured hour
    Daily {
        #[serde(default = "default_daily_hour")]
        hour: u32,
    },

    /// Runs when the tick falls in the configured hour of the configured day
    Weekly {
        #[serde(default = "default_weekly_day")]
        day: Weekday,
        #[serde(default = "default_weekly_hour")]
        hour: u32,
    },
}

impl Schedule {
    pub fn daily(hour: u32) -> Self {
        Schedule::Daily { hour }
    }

    pub fn weekly(day: Weekday, hour: u32) -> Self {
        Schedule::Weekly { day, hour }
    }

    /// Whether a tick at `now` falls inside this schedule's window
    ///
    /// Depends on nothing but `now`; a tick that never arrives for the
    /// matching hour means the job simply does not run that cycle.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match *self {
            Schedule::Always => true,
            Schedule::Daily { hour } => now.hour() == hour,
            Schedule::Weekly { day, hour } => now.weekday() == day && now.hour() == hour,
        }
    }

    /// The configured hour, if the schedule has one
    pub fn hour(&self) -> Option<u32> {
        match *self {
            Schedule::Always => None,
            Schedule::Daily { hour } | Schedule::Weekly { hour, .. } => Some(hour),
        }
    }

    /// Human-readable description used in report messages
    pub fn describe(&self) -> String {
        match self {
            Schedule::Always => "every tick".to_string(),
            Schedule::Daily { hour } => format!("daily at {hour:02}:00 UTC"),
            Schedule::Weekly { day, hour } => format!("weekly on {day} at {hour:02}:00 UTC"),
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
