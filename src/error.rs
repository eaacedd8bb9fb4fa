//! Error types
//!
//! The fusion arithmetic itself never fails. Errors only arise from invalid
//! configuration and from the external collaborators (sensor source,
//! calibration store) that the facade drives.

use core::fmt;

/// Result type for facade operations that talk to a sensor source
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Invalid configuration values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Averaging window must contain at least one sample
    EmptyWindow,
    /// Calibration needs at least one round
    NoRounds,
    /// Gyroscope instance count is zero or above `MAX_GYRO_INSTANCES`
    GyroInstanceCount,
    /// Convergence tolerance must be finite and positive
    Tolerance,
    /// Gains must be finite and non-negative
    Gain,
    /// Gyroscope sensitivity must be finite and positive
    Sensitivity,
    /// Maximum sample period must be finite and positive
    SamplePeriod,
    /// A barometer was supplied for a board configured without one
    NoBarometer,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyWindow => write!(f, "calibration window must not be empty"),
            ConfigError::NoRounds => write!(f, "calibration needs at least one round"),
            ConfigError::GyroInstanceCount => write!(f, "unsupported gyroscope instance count"),
            ConfigError::Tolerance => write!(f, "convergence tolerance must be positive"),
            ConfigError::Gain => write!(f, "filter gains must be finite and non-negative"),
            ConfigError::Sensitivity => write!(f, "gyroscope sensitivity must be positive"),
            ConfigError::SamplePeriod => write!(f, "maximum sample period must be positive"),
            ConfigError::NoBarometer => write!(f, "board has no barometer"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Error for facade operations. Wraps the sensor source error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// The raw-sample source failed
    Source(E),
    /// The requested operation needs a configuration change first
    Config(ConfigError),
}

impl<E> From<ConfigError> for Error<E> {
    fn from(error: ConfigError) -> Self {
        Error::Config(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Source(e) => write!(f, "sensor source error: {:?}", e),
            Error::Config(e) => write!(f, "configuration error: {}", e),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}
