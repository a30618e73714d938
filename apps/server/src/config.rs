use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use heater_core::relay::{GPIO_PIN, SYSFS_GPIO_ROOT};
use heater_core::schedule::{DAY_END_HOUR, DAY_START_HOUR, DAY_TEMP, NIGHT_TEMP};
use heater_core::sensor::SENSOR_URL;
use heater_core::{
    ControlSettings, FixedSensor, HttpSensor, MockRelay, Relay, Schedule, SysfsRelay,
    TemperatureSource, HYSTERESIS,
};

pub const DEFAULT_CONFIG_PATH: &str = "heater.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub sensor: SensorSettings,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorSettings {
    #[serde(default = "default_sensor_url")]
    pub url: String,
    #[serde(default = "default_sensor_timeout_secs")]
    pub timeout_secs: u64,
    /// Use a fixed reading instead of polling the sensor box.
    #[serde(default)]
    pub mock: bool,
    #[serde(default = "default_mock_temp")]
    pub mock_temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u32,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_day_start_hour")]
    pub day_start_hour: u32,
    #[serde(default = "default_day_end_hour")]
    pub day_end_hour: u32,
    #[serde(default = "default_day_temp")]
    pub day_temp: f64,
    #[serde(default = "default_night_temp")]
    pub night_temp: f64,
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_override_minutes")]
    pub override_minutes: u32,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("apps/server/static")
}

fn default_sensor_url() -> String {
    SENSOR_URL.to_owned()
}

fn default_sensor_timeout_secs() -> u64 {
    5
}

fn default_mock_temp() -> f64 {
    FixedSensor::DEFAULT_TEMP
}

fn default_gpio_pin() -> u32 {
    GPIO_PIN
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(SYSFS_GPIO_ROOT)
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_owned()
}

fn default_day_start_hour() -> u32 {
    DAY_START_HOUR
}

fn default_day_end_hour() -> u32 {
    DAY_END_HOUR
}

fn default_day_temp() -> f64 {
    DAY_TEMP
}

fn default_night_temp() -> f64 {
    NIGHT_TEMP
}

fn default_hysteresis() -> f64 {
    HYSTERESIS
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_override_minutes() -> u32 {
    60
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            enable_cors: default_true(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            url: default_sensor_url(),
            timeout_secs: default_sensor_timeout_secs(),
            mock: false,
            mock_temp: default_mock_temp(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            gpio_pin: default_gpio_pin(),
            sysfs_root: default_sysfs_root(),
            mock: false,
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            day_start_hour: default_day_start_hour(),
            day_end_hour: default_day_end_hour(),
            day_temp: default_day_temp(),
            night_temp: default_night_temp(),
            hysteresis: default_hysteresis(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            override_minutes: default_override_minutes(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path, else `heater.toml` in the working directory, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))
            }
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        let s = &self.schedule;
        if s.day_start_hour >= s.day_end_hour || s.day_end_hour > 24 {
            bail!(
                "schedule.day_start_hour ({}) must be before schedule.day_end_hour ({}) and within 0..=24",
                s.day_start_hour,
                s.day_end_hour
            );
        }
        if !s.day_temp.is_finite() || !s.night_temp.is_finite() {
            bail!("schedule.day_temp and schedule.night_temp must be finite");
        }
        if !(s.hysteresis.is_finite() && s.hysteresis > 0.0) {
            bail!("schedule.hysteresis must be a positive number");
        }
        if self.control.refresh_interval_secs == 0 {
            bail!("control.refresh_interval_secs must be at least 1");
        }
        if self.control.override_minutes == 0 {
            bail!("control.override_minutes must be at least 1");
        }
        if self.sensor.mock && !self.sensor.mock_temp.is_finite() {
            bail!("sensor.mock_temp must be finite");
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        let name = &self.schedule.timezone;
        name.parse::<Tz>()
            .map_err(|_| anyhow!("unknown schedule.timezone: {}", name))
    }

    pub fn control_settings(&self) -> Result<ControlSettings> {
        let s = &self.schedule;
        let schedule = Schedule::new(
            self.timezone()?,
            s.day_start_hour,
            s.day_end_hour,
            s.day_temp,
            s.night_temp,
        )?;
        Ok(ControlSettings {
            schedule,
            hysteresis: s.hysteresis,
            override_duration: chrono::Duration::minutes(i64::from(self.control.override_minutes)),
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.control.refresh_interval_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    pub fn build_relay(&self) -> Box<dyn Relay> {
        if self.relay.mock {
            Box::new(MockRelay::new())
        } else {
            Box::new(SysfsRelay::new(&self.relay.sysfs_root, self.relay.gpio_pin))
        }
    }

    pub fn build_sensor(&self) -> Result<Box<dyn TemperatureSource>> {
        if self.sensor.mock {
            return Ok(Box::new(FixedSensor::new(self.sensor.mock_temp)));
        }
        let sensor = HttpSensor::new(
            self.sensor.url.clone(),
            Duration::from_secs(self.sensor.timeout_secs),
        )?;
        Ok(Box::new(sensor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.sensor.url, "http://tsensor:5000/");
        assert_eq!(config.relay.gpio_pin, 18);
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::Los_Angeles);

        let settings = config.control_settings().unwrap();
        assert_eq!(settings.hysteresis, 0.2);
        assert_eq!(settings.override_duration, chrono::Duration::hours(1));
        assert_eq!(settings.schedule.night_temp(), 71.8);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [sensor]
            mock = true
            mock_temp = 68.5

            [schedule]
            timezone = "Europe/Prague"
            night_temp = 20.5
            hysteresis = 0.3

            [control]
            override_minutes = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.server.enable_cors);
        assert!(config.sensor.mock);
        assert!(!config.relay.mock);
        assert_eq!(config.schedule.day_start_hour, 10);

        let settings = config.control_settings().unwrap();
        assert_eq!(settings.schedule.timezone(), chrono_tz::Europe::Prague);
        assert_eq!(settings.schedule.night_temp(), 20.5);
        assert_eq!(settings.schedule.day_temp(), 62.5);
        assert_eq!(settings.override_duration, chrono::Duration::hours(2));
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            "[schedule]\ntimezone = \"Mars/Olympus_Mons\"",
            "[schedule]\nday_start_hour = 18\nday_end_hour = 10",
            "[schedule]\nday_end_hour = 25",
            "[schedule]\nhysteresis = 0.0",
            "[schedule]\nhysteresis = -0.2",
            "[control]\nrefresh_interval_secs = 0",
            "[control]\noverride_minutes = 0",
            "[schedule]\nday_temp = nan",
        ];
        for case in cases {
            assert!(Config::from_toml(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(Config::from_toml("[server\nport = 1").is_err());
        assert!(Config::from_toml("[server]\nport = \"five thousand\"").is_err());
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heater.toml");
        std::fs::write(&path, "[relay]\nmock = true\ngpio_pin = 23\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.relay.mock);
        assert_eq!(config.relay.gpio_pin, 23);
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[tokio::test]
    async fn mock_collaborators() {
        let config = Config::from_toml("[sensor]\nmock = true\nmock_temp = 66.0\n[relay]\nmock = true").unwrap();
        let sensor = config.build_sensor().unwrap();
        assert_eq!(sensor.read_temperature().await.unwrap(), 66.0);
        let relay = config.build_relay();
        assert!(!relay.is_on());
    }
}
