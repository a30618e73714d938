use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{HeaterError, Result};
use crate::policy::{Command, HeaterPolicy, HYSTERESIS};
use crate::relay::Relay;
use crate::schedule::{Period, Schedule};
use crate::sensor::TemperatureSource;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<StdMutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Arc::new(StdMutex::new(now)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }

    pub fn clock(&self) -> Clock {
        let this = self.clone();
        Arc::new(move || this.now())
    }
}

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub schedule: Schedule,
    pub hysteresis: f64,
    /// How long a manual setpoint holds before the schedule takes over again.
    pub override_duration: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        ControlSettings {
            schedule: Schedule::default(),
            hysteresis: HYSTERESIS,
            override_duration: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaterStatus {
    pub desired_temp: f64,
    pub temp: f64,
    pub enabled: bool,
    pub heater_on: bool,
    pub hysteresis: f64,
    pub period: Period,
    pub override_until: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    pub sensor_ok: bool,
}

struct Inner {
    policy: HeaterPolicy,
    relay: Box<dyn Relay>,
    sensor_ok: bool,
}

/// Owns the policy and the relay behind one lock. Sensor read, decision and
/// relay dispatch of a refresh all happen while the lock is held.
pub struct Controller {
    inner: Mutex<Inner>,
    sensor: Box<dyn TemperatureSource>,
    clock: Clock,
    override_duration: Duration,
}

impl Controller {
    pub async fn start(
        settings: ControlSettings,
        mut relay: Box<dyn Relay>,
        sensor: Box<dyn TemperatureSource>,
        clock: Clock,
    ) -> Result<Self> {
        if !(settings.hysteresis.is_finite() && settings.hysteresis > 0.0) {
            return Err(HeaterError::Config(format!(
                "hysteresis must be positive, got {}",
                settings.hysteresis
            )));
        }
        relay.initialize()?;

        let (temp, sensor_ok) = match sensor.read_temperature().await {
            Ok(temp) => (temp, true),
            Err(e) => {
                warn!(error = %e, "initial temperature read failed");
                (0.0, false)
            }
        };
        let now = clock();
        let policy = HeaterPolicy::new(settings.schedule, settings.hysteresis, now, temp);
        info!(
            desired_temp = policy.desired_temp(),
            period = ?policy.schedule().period(now),
            temp,
            "heater controller started"
        );

        Ok(Controller {
            inner: Mutex::new(Inner {
                policy,
                relay,
                sensor_ok,
            }),
            sensor,
            clock,
            override_duration: settings.override_duration,
        })
    }

    pub async fn refresh(&self) -> HeaterStatus {
        let mut inner = self.inner.lock().await;
        self.refresh_locked(&mut inner).await
    }

    pub async fn enable(&self) -> HeaterStatus {
        let mut inner = self.inner.lock().await;
        inner.policy.enable();
        info!("heater enabled");
        self.refresh_locked(&mut inner).await
    }

    pub async fn disable(&self) -> HeaterStatus {
        let mut inner = self.inner.lock().await;
        inner.policy.disable();
        info!("heater disabled");
        self.refresh_locked(&mut inner).await
    }

    /// Manual setpoint, held for the override duration.
    pub async fn set_desired_temp(&self, temp: f64) -> Result<HeaterStatus> {
        let mut inner = self.inner.lock().await;
        inner.policy.set_desired_temp(temp)?;
        let until = (self.clock)() + self.override_duration;
        inner.policy.set_override_until(until);
        info!(desired_temp = temp, %until, "manual setpoint");
        Ok(self.refresh_locked(&mut inner).await)
    }

    pub async fn clear_override(&self) -> HeaterStatus {
        let mut inner = self.inner.lock().await;
        let now = (self.clock)();
        inner.policy.clear_override(now);
        info!(desired_temp = inner.policy.desired_temp(), "override cleared");
        self.refresh_locked(&mut inner).await
    }

    /// Current state without touching the sensor or the relay.
    pub async fn status(&self) -> HeaterStatus {
        let inner = self.inner.lock().await;
        snapshot(&inner)
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.relay.shutdown()
    }

    async fn refresh_locked(&self, inner: &mut Inner) -> HeaterStatus {
        let now = (self.clock)();
        match self.sensor.read_temperature().await {
            Ok(temp) => {
                inner.sensor_ok = true;
                let command = inner.policy.refresh(now, temp);
                dispatch(inner.relay.as_mut(), command, now, temp);
            }
            Err(e) => {
                // Unknown temperature: never leave the heater running.
                inner.sensor_ok = false;
                warn!(error = %e, "forcing heater off");
                if let Err(e) = inner.relay.turn_off() {
                    error!(error = %e, "failed to turn heater off");
                }
            }
        }
        snapshot(inner)
    }
}

fn dispatch(relay: &mut dyn Relay, command: Command, now: DateTime<Utc>, temp: f64) {
    let result = match command {
        Command::On => {
            info!(%now, temp, "turn heater on");
            relay.turn_on()
        }
        Command::Off => {
            info!(%now, temp, "turn heater off");
            relay.turn_off()
        }
        Command::NoAction => {
            debug!(%now, temp, "don't do anything");
            Ok(())
        }
    };
    if let Err(e) = result {
        error!(error = %e, ?command, "relay command failed");
    }
}

fn snapshot(inner: &Inner) -> HeaterStatus {
    let policy = &inner.policy;
    HeaterStatus {
        desired_temp: policy.desired_temp(),
        temp: policy.last_temp_reading(),
        enabled: policy.is_enabled(),
        heater_on: inner.relay.is_on(),
        hysteresis: policy.hysteresis(),
        period: policy.schedule().period(policy.last_updated_at()),
        override_until: policy.override_until(),
        last_updated_at: policy.last_updated_at(),
        sensor_ok: inner.sensor_ok,
    }
}
