//! Heater decision engine and the collaborators it drives.
//!
//! [`policy::HeaterPolicy`] turns `(time, temperature, user overrides)` into a
//! [`policy::Command`]. [`controller::Controller`] wraps it in a lock together
//! with the relay and the temperature source so that every refresh is atomic.

pub mod controller;
pub mod error;
pub mod policy;
pub mod relay;
pub mod schedule;
pub mod sensor;

pub use controller::{system_clock, Clock, ControlSettings, Controller, HeaterStatus, ManualClock};
pub use error::{HeaterError, Result};
pub use policy::{parse_setpoint, Command, HeaterPolicy, HYSTERESIS};
pub use relay::{MockRelay, Relay, SysfsRelay};
pub use schedule::{Period, Schedule};
pub use sensor::{FailingSensor, FixedSensor, HttpSensor, TemperatureSource};
