use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{HeaterError, Result};

pub const SENSOR_URL: &str = "http://tsensor:5000/";

#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn read_temperature(&self) -> Result<f64>;
}

/// Polls a sensor box that answers `GET /` with a bare decimal, e.g. `71.3`.
#[derive(Debug, Clone)]
pub struct HttpSensor {
    client: reqwest::Client,
    url: String,
}

impl HttpSensor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HeaterError::Config(format!("http client: {}", e)))?;
        Ok(HttpSensor {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn unavailable(e: reqwest::Error) -> HeaterError {
    HeaterError::SensorUnavailable(e.to_string())
}

#[async_trait]
impl TemperatureSource for HttpSensor {
    async fn read_temperature(&self) -> Result<f64> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?;
        let body = response.text().await.map_err(unavailable)?;
        parse_reading(&body)
    }
}

pub fn parse_reading(body: &str) -> Result<f64> {
    let temp: f64 = body
        .trim()
        .parse()
        .map_err(|e| HeaterError::SensorUnavailable(format!("bad reading {:?}: {}", body, e)))?;
    if !temp.is_finite() {
        return Err(HeaterError::SensorUnavailable(format!(
            "bad reading {:?}",
            body
        )));
    }
    Ok(temp)
}

/// Always reports the same (settable) temperature.
#[derive(Debug)]
pub struct FixedSensor {
    bits: AtomicU64,
}

impl FixedSensor {
    pub const DEFAULT_TEMP: f64 = 75.99;

    pub fn new(temp: f64) -> Self {
        FixedSensor {
            bits: AtomicU64::new(temp.to_bits()),
        }
    }

    pub fn set(&self, temp: f64) {
        self.bits.store(temp.to_bits(), Ordering::SeqCst);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

impl Default for FixedSensor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEMP)
    }
}

#[async_trait]
impl TemperatureSource for FixedSensor {
    async fn read_temperature(&self) -> Result<f64> {
        Ok(self.get())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSensor;

#[async_trait]
impl TemperatureSource for FailingSensor {
    async fn read_temperature(&self) -> Result<f64> {
        Err(HeaterError::SensorUnavailable("sensor offline".to_string()))
    }
}
