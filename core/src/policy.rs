use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{HeaterError, Result};
use crate::schedule::Schedule;

/// Margin around the setpoint, °F. Keeps the relay from chattering when the
/// reading sits right at the target.
pub const HYSTERESIS: f64 = 0.2;

/// Slack for the threshold comparisons, so `68.1 - 0.2` still matches a `67.9` reading.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    /// Leave the relay exactly as it is.
    NoAction,
}

/// Bang-bang thermostat with a day/night default and time-bounded overrides.
///
/// Readings at or above `desired + hysteresis` switch the heater off, readings
/// at or below `desired - hysteresis` switch it on, anything strictly between
/// leaves it alone.
#[derive(Debug, Clone)]
pub struct HeaterPolicy {
    schedule: Schedule,
    hysteresis: f64,
    desired_temp: f64,
    enabled: bool,
    override_until: Option<DateTime<Utc>>,
    last_updated_at: DateTime<Utc>,
    last_temp_reading: f64,
}

impl HeaterPolicy {
    pub fn new(schedule: Schedule, hysteresis: f64, now: DateTime<Utc>, temp: f64) -> Self {
        let desired_temp = schedule.default_temp(now);
        HeaterPolicy {
            schedule,
            hysteresis,
            desired_temp,
            enabled: true,
            override_until: None,
            last_updated_at: now,
            last_temp_reading: temp,
        }
    }

    pub fn refresh(&mut self, now: DateTime<Utc>, temp: f64) -> Command {
        // An override pins the setpoint across period changes until it runs out.
        if let Some(limit) = self.override_until {
            if now >= limit {
                self.override_until = None;
                self.desired_temp = self.schedule.default_temp(now);
                info!(%limit, desired_temp = self.desired_temp, "override expired");
            }
        } else {
            let before = self.schedule.period(self.last_updated_at);
            let after = self.schedule.period(now);
            if before != after {
                self.desired_temp = self.schedule.default_temp(now);
                info!(
                    from = ?before,
                    to = ?after,
                    desired_temp = self.desired_temp,
                    "schedule period changed"
                );
            }
        }

        self.last_updated_at = now;
        self.last_temp_reading = temp;
        self.command_for(temp)
    }

    fn command_for(&self, temp: f64) -> Command {
        if !self.enabled {
            return Command::Off;
        }
        let margin = self.hysteresis - THRESHOLD_TOLERANCE;
        let delta = temp - self.desired_temp;
        if delta >= margin {
            Command::Off
        } else if delta <= -margin {
            Command::On
        } else {
            Command::NoAction
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Overwrites the setpoint. Does not touch the override timer.
    pub fn set_desired_temp(&mut self, temp: f64) -> Result<()> {
        if !temp.is_finite() {
            return Err(HeaterError::InvalidSetpoint(format!(
                "{} is not a finite temperature",
                temp
            )));
        }
        self.desired_temp = temp;
        Ok(())
    }

    /// Arms the override timer; the current setpoint holds until `expiry`.
    pub fn set_override_until(&mut self, expiry: DateTime<Utc>) {
        self.override_until = Some(expiry);
    }

    /// Drops an active override and goes back to the default for `now`.
    pub fn clear_override(&mut self, now: DateTime<Utc>) {
        if self.override_until.take().is_some() {
            self.desired_temp = self.schedule.default_temp(now);
        }
    }

    pub fn desired_temp(&self) -> f64 {
        self.desired_temp
    }

    pub fn hysteresis(&self) -> f64 {
        self.hysteresis
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn override_until(&self) -> Option<DateTime<Utc>> {
        self.override_until
    }

    pub fn last_updated_at(&self) -> DateTime<Utc> {
        self.last_updated_at
    }

    pub fn last_temp_reading(&self) -> f64 {
        self.last_temp_reading
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }
}

/// Parses a user supplied temperature such as `"71.5"`.
pub fn parse_setpoint(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| HeaterError::InvalidSetpoint(format!("{:?}: {}", raw, e)))?;
    if !value.is_finite() {
        return Err(HeaterError::InvalidSetpoint(format!(
            "{:?} is not a finite temperature",
            raw
        )));
    }
    Ok(value)
}
