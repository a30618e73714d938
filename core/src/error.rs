use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeaterError {
    /// Temperature could not be obtained (network or parse failure).
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// A user supplied setpoint that is not a usable temperature.
    #[error("invalid setpoint: {0}")]
    InvalidSetpoint(String),

    #[error("gpio{pin}: {source}")]
    Gpio {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HeaterError>;
