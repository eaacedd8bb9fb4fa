//! Hardware variant configuration
//!
//! Everything that differs between boards (available sensors, tuned gains,
//! mounting, temperature curves) is gathered in one immutable
//! [`BoardConfig`] handed to [`Imu::new`](crate::Imu::new). The filter
//! itself only sees the derived [`FilterSettings`].

use crate::axes::AxesAlignment;
use crate::error::ConfigError;
use crate::math::InvSqrtMode;
use crate::temperature::{TemperatureCoefficients, TemperatureModel};
use crate::types::{CalibrationSettings, FilterSettings, GainPair, MagneticErrorScope};

/// LSB per deg/s of an MPU-6000/6050 at the +-2000 deg/s range
pub const MPU_GYRO_SENSITIVITY: f32 = 16.4;

/// LSB per deg/s of an ITG-3200
pub const ITG3200_GYRO_SENSITIVITY: f32 = 14.375;

/// Board description
///
/// # Example
/// ```
/// use imu_fusion::{Board, BoardConfig, GainPair};
///
/// // Start from a preset and retune the gains
/// let config = BoardConfig {
///     gains: GainPair::from_kp_ki(1.0, 0.0),
///     ..Board::FreeImuV04.config()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BoardConfig {
    pub name: &'static str,
    pub has_magnetometer: bool,
    pub has_barometer: bool,
    /// Default feedback gains, restored on reset
    pub gains: GainPair,
    /// Mounting of the magnetometer relative to the accelerometer/gyroscope
    pub magnetometer_alignment: AxesAlignment,
    /// Raw gyroscope LSB per deg/s
    pub gyro_sensitivity: f32,
    /// Temperature (sensor units) at and above which the polynomial
    /// correction is not applied
    pub temperature_break: f32,
    pub temperature_coefficients: TemperatureCoefficients,
    /// Whether temperature compensation starts enabled
    pub temperature_compensation: bool,
    pub inv_sqrt_mode: InvSqrtMode,
    pub magnetic_error_scope: MagneticErrorScope,
    /// Upper bound on the integration step in seconds
    pub max_sample_period: f32,
    pub calibration: CalibrationSettings,
}

impl BoardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gains.validate()?;
        if !(self.gyro_sensitivity.is_finite() && self.gyro_sensitivity > 0.0) {
            return Err(ConfigError::Sensitivity);
        }
        if !(self.max_sample_period.is_finite() && self.max_sample_period > 0.0) {
            return Err(ConfigError::SamplePeriod);
        }
        self.calibration.validate()
    }

    /// Settings for the orientation filter on this board
    pub fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            gains: self.gains,
            inv_sqrt_mode: self.inv_sqrt_mode,
            has_magnetometer: self.has_magnetometer,
            magnetic_error_scope: self.magnetic_error_scope,
        }
    }

    /// Temperature model in its initial enabled state
    pub fn temperature_model(&self) -> TemperatureModel {
        let mut model = TemperatureModel::new(self.temperature_coefficients, self.temperature_break);
        model.set_enabled(self.temperature_compensation);
        model
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Board::Generic.config()
    }
}

impl From<Board> for BoardConfig {
    fn from(board: Board) -> Self {
        board.config()
    }
}

/// Supported board presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Board {
    /// FreeIMU v0.4: MPU-6050, HMC5883L, MS5611
    FreeImuV04,
    /// DFRobot 10DOF: ADXL345, ITG-3200, HMC5883L, BMP085
    DfRobot,
    /// Generic MPU-6050 breakout (GY-521 and similar), six axes only
    GenericMpu6050,
    /// SparkFun 9DOF sensor stick SEN-10724
    SparkFun10724,
    /// DIY Drones ArduIMU+ V3: MPU-6000, HMC5883L
    ArduImuV3,
    /// Nine-axis board with aligned sensors and no temperature fit
    Generic,
}

impl Board {
    pub const ALL: [Board; 6] = [
        Board::FreeImuV04,
        Board::DfRobot,
        Board::GenericMpu6050,
        Board::SparkFun10724,
        Board::ArduImuV3,
        Board::Generic,
    ];

    pub fn config(self) -> BoardConfig {
        let base = BoardConfig {
            name: "Generic",
            has_magnetometer: true,
            has_barometer: false,
            gains: GainPair::default(),
            magnetometer_alignment: AxesAlignment::PxPyPz,
            gyro_sensitivity: MPU_GYRO_SENSITIVITY,
            temperature_break: -1000.0,
            temperature_coefficients: TemperatureCoefficients::NONE,
            temperature_compensation: false,
            inv_sqrt_mode: InvSqrtMode::default(),
            magnetic_error_scope: MagneticErrorScope::default(),
            max_sample_period: 0.5,
            calibration: CalibrationSettings::default(),
        };

        match self {
            Board::FreeImuV04 => BoardConfig {
                name: "FreeIMU v0.4",
                has_barometer: true,
                gains: GainPair::from_kp_ki(0.75, 0.1625),
                temperature_coefficients: TemperatureCoefficients::FREEIMU_V04,
                ..base
            },
            Board::DfRobot => BoardConfig {
                name: "DFROBOT",
                has_barometer: true,
                gains: GainPair::from_kp_ki(0.5, 0.0),
                gyro_sensitivity: ITG3200_GYRO_SENSITIVITY,
                // 32 degrees Celsius
                temperature_break: 3200.0,
                temperature_coefficients: TemperatureCoefficients::DFROBOT,
                ..base
            },
            Board::GenericMpu6050 => BoardConfig {
                name: "GEN MPU6050",
                has_magnetometer: false,
                gains: GainPair::from_kp_ki(0.5, 0.05),
                ..base
            },
            Board::SparkFun10724 => BoardConfig {
                name: "SparkFun 10724",
                magnetometer_alignment: AxesAlignment::PyNxPz,
                gyro_sensitivity: ITG3200_GYRO_SENSITIVITY,
                ..base
            },
            Board::ArduImuV3 => BoardConfig {
                name: "DIY Drones ArduIMU+ V3",
                magnetometer_alignment: AxesAlignment::NxNyPz,
                ..base
            },
            Board::Generic => base,
        }
    }
}
