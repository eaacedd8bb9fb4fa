//! Temperature-dependent bias compensation
//!
//! Zero-rate and zero-g offsets of MEMS sensors drift with die temperature.
//! Each of the nine fused channels carries a cubic fitted against
//! temperature; the fitted offset is subtracted from the raw reading while
//! the sensor is colder than the board's temperature break. Above the break
//! the fit is not trusted and no polynomial correction is applied.

use nalgebra::Vector3;

/// Fused sensor channels, in raw-sample order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    AccelerometerX,
    AccelerometerY,
    AccelerometerZ,
    GyroscopeX,
    GyroscopeY,
    GyroscopeZ,
    MagnetometerX,
    MagnetometerY,
    MagnetometerZ,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::AccelerometerX,
        Channel::AccelerometerY,
        Channel::AccelerometerZ,
        Channel::GyroscopeX,
        Channel::GyroscopeY,
        Channel::GyroscopeZ,
        Channel::MagnetometerX,
        Channel::MagnetometerY,
        Channel::MagnetometerZ,
    ];

    /// Position in the nine-element coefficient arrays
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Gyroscope axis (0..3) for gyroscope channels
    pub const fn gyroscope_axis(self) -> Option<usize> {
        match self {
            Channel::GyroscopeX => Some(0),
            Channel::GyroscopeY => Some(1),
            Channel::GyroscopeZ => Some(2),
            _ => None,
        }
    }
}

/// Cubic correction curves for the nine channels
///
/// `offset(T) = cubic*T^3 + quadratic*T^2 + linear*T + constant`, with `T`
/// in the board's native temperature unit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureCoefficients {
    pub cubic: [f32; 9],
    pub quadratic: [f32; 9],
    pub linear: [f32; 9],
    pub constant: [f32; 9],
}

impl TemperatureCoefficients {
    /// No correction on any channel
    pub const NONE: Self = Self {
        cubic: [0.0; 9],
        quadratic: [0.0; 9],
        linear: [0.0; 9],
        constant: [0.0; 9],
    };

    /// MPU-6050 at FreeIMU v0.4 default scales, raw temperature register units.
    /// Magnetometer channels are not fitted.
    pub const FREEIMU_V04: Self = Self {
        cubic: [0.0, 0.0, -1.618_18e-9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        quadratic: [
            4.798_083e-7, -7.104_3e-8, -1.899_41e-5, -4.387_634e-8, -1.779_335e-8, 4.216_745e-9,
            0.0, 0.0, 0.0,
        ],
        linear: [
            1.801_522e-2, -5.200_081e-3, -1.462_879e-1, -5.878_346e-4, 1.172_002e-3,
            -6.897_733e-5, 0.0, 0.0, 0.0,
        ],
        constant: [
            -45.61, -45.24, -305.58, 6.699_801, 8.341_212, -21.711_55, 0.0, 0.0, 0.0,
        ],
    };

    /// ADXL345/ITG3200 (DFRobot 10DOF), temperature in hundredths of a degree
    /// Celsius (the fit was made in degrees, hence the 1e-2 / 1e-4 factors).
    /// Magnetometer channels are not fitted.
    pub const DFROBOT: Self = Self {
        cubic: [0.0; 9],
        quadratic: [
            0.007_829_365e-4, -0.000_977_670_5e-4, 0.012_714_37e-4, -0.012_142_85e-4,
            0.006_151_32e-4, 0.002_638_248e-4, 0.0, 0.0, 0.0,
        ],
        linear: [
            -0.330_832_467e-2, -0.094_520_615e-2, -0.596_090_25e-2, -2.145_808_24e-2,
            -4.689_511_87e-2, -2.832_623_092e-2, 0.0, 0.0, 0.0,
        ],
        constant: [
            5.648_888, 9.784_001, 2.775_708, 60.710_09, 109.328_766, 85.639_595, 0.0, 0.0, 0.0,
        ],
    };

    /// Evaluate the fitted offset for one channel
    #[inline]
    pub fn evaluate(&self, channel: Channel, temperature: f32) -> f32 {
        let i = channel.index();
        let t = temperature;
        self.cubic[i] * (t * t * t) + self.quadratic[i] * (t * t) + self.linear[i] * t
            + self.constant[i]
    }
}

impl Default for TemperatureCoefficients {
    fn default() -> Self {
        Self::NONE
    }
}

/// Temperature compensation model
///
/// When disabled, gyroscope channels fall back to the static bias found by
/// [`GyroBiasCalibrator`](crate::GyroBiasCalibrator); the two mechanisms
/// never stack on the same reading.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_fusion::{Channel, TemperatureCoefficients, TemperatureModel};
///
/// let mut model = TemperatureModel::new(TemperatureCoefficients::FREEIMU_V04, -1000.0);
/// model.set_enabled(true);
///
/// let corrected = model.correct(Channel::GyroscopeX, 12.0, -2500.0, Vector3::zeros());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureModel {
    coefficients: TemperatureCoefficients,
    temperature_break: f32,
    enabled: bool,
}

impl TemperatureModel {
    /// Create a disabled model
    pub fn new(coefficients: TemperatureCoefficients, temperature_break: f32) -> Self {
        Self {
            coefficients,
            temperature_break,
            enabled: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn temperature_break(&self) -> f32 {
        self.temperature_break
    }

    pub fn coefficients(&self) -> &TemperatureCoefficients {
        &self.coefficients
    }

    /// Whether the polynomial applies at this temperature
    pub fn is_active(&self, temperature: f32) -> bool {
        self.enabled && temperature < self.temperature_break
    }

    /// Offset to subtract from a raw reading of `channel`
    ///
    /// - enabled, below the break: the fitted polynomial
    /// - enabled, at or above the break: zero
    /// - disabled: the static gyroscope bias for gyroscope channels, zero
    ///   for the others
    pub fn offset(&self, channel: Channel, temperature: f32, static_gyro_bias: Vector3<f32>) -> f32 {
        if self.enabled {
            if temperature < self.temperature_break {
                self.coefficients.evaluate(channel, temperature)
            } else {
                0.0
            }
        } else {
            channel
                .gyroscope_axis()
                .map_or(0.0, |axis| static_gyro_bias[axis])
        }
    }

    /// Raw reading with its offset removed
    #[inline]
    pub fn correct(
        &self,
        channel: Channel,
        raw: f32,
        temperature: f32,
        static_gyro_bias: Vector3<f32>,
    ) -> f32 {
        raw - self.offset(channel, temperature, static_gyro_bias)
    }

    /// Offsets for all nine channels at once
    pub fn offsets(&self, temperature: f32, static_gyro_bias: Vector3<f32>) -> [f32; 9] {
        Channel::ALL.map(|channel| self.offset(channel, temperature, static_gyro_bias))
    }
}
