use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{HeaterError, Result};

// --- Default setpoints (°F) ---
pub const DAY_TEMP: f64 = 62.5; // Power saving, people are up and moving
pub const NIGHT_TEMP: f64 = 71.8;

// --- Day window, local hours [start, end) ---
pub const DAY_START_HOUR: u32 = 10;
pub const DAY_END_HOUR: u32 = 18;

pub const TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Night,
}

/// Single day/night split evaluated in the install location's zone.
#[derive(Debug, Clone)]
pub struct Schedule {
    tz: Tz,
    day_start_hour: u32,
    day_end_hour: u32,
    day_temp: f64,
    night_temp: f64,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            tz: TIMEZONE,
            day_start_hour: DAY_START_HOUR,
            day_end_hour: DAY_END_HOUR,
            day_temp: DAY_TEMP,
            night_temp: NIGHT_TEMP,
        }
    }
}

impl Schedule {
    pub fn new(
        tz: Tz,
        day_start_hour: u32,
        day_end_hour: u32,
        day_temp: f64,
        night_temp: f64,
    ) -> Result<Self> {
        if day_start_hour >= day_end_hour || day_end_hour > 24 {
            return Err(HeaterError::Config(format!(
                "day window [{}, {}) is not a valid hour range",
                day_start_hour, day_end_hour
            )));
        }
        if !day_temp.is_finite() || !night_temp.is_finite() {
            return Err(HeaterError::Config(format!(
                "default temperatures must be finite (day {}, night {})",
                day_temp, night_temp
            )));
        }
        Ok(Schedule {
            tz,
            day_start_hour,
            day_end_hour,
            day_temp,
            night_temp,
        })
    }

    /// The only place a timestamp gets classified; every caller goes through here.
    pub fn period(&self, t: DateTime<Utc>) -> Period {
        let hour = t.with_timezone(&self.tz).hour();
        if hour >= self.day_start_hour && hour < self.day_end_hour {
            Period::Day
        } else {
            Period::Night
        }
    }

    pub fn is_daytime(&self, t: DateTime<Utc>) -> bool {
        self.period(t) == Period::Day
    }

    pub fn default_temp(&self, t: DateTime<Utc>) -> f64 {
        match self.period(t) {
            Period::Day => self.day_temp,
            Period::Night => self.night_temp,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn day_temp(&self) -> f64 {
        self.day_temp
    }

    pub fn night_temp(&self) -> f64 {
        self.night_temp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn classifies_winter_evening_as_night() {
        let schedule = Schedule::default();
        assert_eq!(schedule.period(at("2019-01-12T22:04:32-08:00")), Period::Night);
        assert_eq!(schedule.default_temp(at("2019-01-12T22:04:32-08:00")), NIGHT_TEMP);
    }

    #[test]
    fn classifies_late_morning_as_day() {
        let schedule = Schedule::default();
        assert!(schedule.is_daytime(at("2019-01-12T11:04:32-08:00")));
        assert_eq!(schedule.default_temp(at("2019-01-12T11:04:32-08:00")), DAY_TEMP);
    }

    #[test]
    fn window_is_half_open() {
        let schedule = Schedule::default();
        assert!(!schedule.is_daytime(at("2019-01-12T09:59:59-08:00")));
        assert!(schedule.is_daytime(at("2019-01-12T10:00:00-08:00")));
        assert!(schedule.is_daytime(at("2019-01-12T17:59:59-08:00")));
        assert!(!schedule.is_daytime(at("2019-01-12T18:00:00-08:00")));
    }

    #[test]
    fn uses_local_wall_clock_not_utc() {
        let schedule = Schedule::default();
        // 17:30 UTC is 09:30 PST in January but 10:30 PDT in July.
        assert!(!schedule.is_daytime(at("2019-01-12T17:30:00Z")));
        assert!(schedule.is_daytime(at("2019-07-12T17:30:00Z")));
    }

    #[test]
    fn custom_window_and_zone() {
        let schedule = Schedule::new(chrono_tz::Europe::Prague, 8, 20, 18.0, 21.0).unwrap();
        assert!(schedule.is_daytime(at("2024-01-10T08:30:00+01:00")));
        assert!(!schedule.is_daytime(at("2024-01-10T20:00:00+01:00")));
        assert_eq!(schedule.default_temp(at("2024-01-10T23:00:00+01:00")), 21.0);
    }

    #[test]
    fn rejects_inverted_window() {
        assert!(Schedule::new(TIMEZONE, 18, 10, DAY_TEMP, NIGHT_TEMP).is_err());
        assert!(Schedule::new(TIMEZONE, 10, 25, DAY_TEMP, NIGHT_TEMP).is_err());
        assert!(Schedule::new(TIMEZONE, 10, 18, f64::NAN, NIGHT_TEMP).is_err());
    }
}
