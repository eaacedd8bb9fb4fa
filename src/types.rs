//! Core types and settings for the orientation filter

use crate::error::ConfigError;
use crate::math::{DEG_TO_RAD, InvSqrtMode, triple_to_degrees};

/// Proportional and integral feedback gains
///
/// Both gains use the "two-times" convention: the values stored here are
/// `2 * Kp` and `2 * Ki`, which is also the unit boards are tuned in.
///
/// # Example
/// ```
/// use imu_fusion::GainPair;
///
/// // Kp = 0.75, Ki = 0.1625
/// let gains = GainPair::from_kp_ki(0.75, 0.1625);
/// assert_eq!(gains.two_kp, 1.5);
/// assert_eq!(gains.two_ki, 0.325);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GainPair {
    /// Twice the proportional gain. Governs convergence towards the
    /// accelerometer/magnetometer reference.
    pub two_kp: f32,
    /// Twice the integral gain. Governs convergence of gyroscope bias.
    /// Zero disables the integral term and holds its accumulator at zero.
    pub two_ki: f32,
}

impl GainPair {
    pub const fn new(two_kp: f32, two_ki: f32) -> Self {
        Self { two_kp, two_ki }
    }

    pub const fn from_kp_ki(kp: f32, ki: f32) -> Self {
        Self::new(2.0 * kp, 2.0 * ki)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |g: f32| g.is_finite() && g >= 0.0;
        if valid(self.two_kp) && valid(self.two_ki) {
            Ok(())
        } else {
            Err(ConfigError::Gain)
        }
    }
}

impl Default for GainPair {
    fn default() -> Self {
        Self::from_kp_ki(0.5, 0.1)
    }
}

/// How the magnetic-field error combines with the gravity error
///
/// The magnetometer and accelerometer corrections share one error
/// accumulator. This decides what the magnetometer contributes to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MagneticErrorScope {
    /// The accumulator starts at zero every step. A valid magnetometer
    /// reading adds its field error and a valid accelerometer reading adds
    /// its gravity error; both feed back into the angular rate.
    #[default]
    Combined,
    /// The field error is computed for a valid reading but never reaches
    /// the feedback, so heading is integrated from the gyroscope alone.
    Discarded,
}

/// Orientation filter settings
///
/// # Example
/// ```
/// use imu_fusion::{FilterSettings, GainPair, InvSqrtMode, OrientationFilter};
///
/// let settings = FilterSettings {
///     gains: GainPair::from_kp_ki(0.5, 0.0),
///     inv_sqrt_mode: InvSqrtMode::Exact,
///     ..Default::default()
/// };
/// let filter = OrientationFilter::with_settings(settings);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FilterSettings {
    /// Feedback gains (two-times convention)
    pub gains: GainPair,
    /// Reciprocal square root used for every normalisation
    pub inv_sqrt_mode: InvSqrtMode,
    /// Whether magnetometer readings take part in the correction
    pub has_magnetometer: bool,
    /// Magnetometer contribution to the error accumulator
    pub magnetic_error_scope: MagneticErrorScope,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            gains: GainPair::default(),
            inv_sqrt_mode: InvSqrtMode::default(),
            has_magnetometer: true,
            magnetic_error_scope: MagneticErrorScope::default(),
        }
    }
}

/// Gyroscope bias calibration settings
///
/// # Example
/// ```
/// use imu_fusion::CalibrationSettings;
///
/// let settings = CalibrationSettings {
///     window_size: 150,   // longer windows on a noisy gyro
///     ..Default::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationSettings {
    /// Samples averaged per round
    pub window_size: usize,
    /// Upper bound on averaging rounds
    pub max_rounds: usize,
    /// Convergence threshold on the difference between consecutive round
    /// averages, in raw gyroscope units ("0.1 bit")
    pub tolerance: f32,
    /// Number of independent gyroscope instances calibrated together
    pub gyro_count: usize,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            window_size: 75,
            max_rounds: 10,
            tolerance: 0.1 * DEG_TO_RAD,
            gyro_count: 1,
        }
    }
}

impl CalibrationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.gyro_count == 0 || self.gyro_count > crate::bias::MAX_GYRO_INSTANCES {
            return Err(ConfigError::GyroInstanceCount);
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::Tolerance);
        }
        Ok(())
    }
}

/// Euler angles in the aerospace (Z-Y-X) sequence
///
/// Consecutive rotations: yaw about Z, then pitch about the new Y, then
/// roll about the new X.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EulerAngles {
    /// Psi
    pub yaw: f32,
    /// Theta
    pub pitch: f32,
    /// Phi
    pub roll: f32,
}

impl EulerAngles {
    pub fn to_degrees(self) -> Self {
        let [yaw, pitch, roll] = triple_to_degrees([self.yaw, self.pitch, self.roll]);
        Self { yaw, pitch, roll }
    }
}

/// Yaw, pitch and roll measured against the estimated gravity vector
///
/// This is not an Euler representation. Pitch is the angle between the
/// Earth ground plane and the sensor X axis, roll the angle between the
/// ground plane and the sensor Y axis. Under combined rotations these differ
/// from [`EulerAngles`] pitch and roll.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct YawPitchRoll {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl YawPitchRoll {
    pub fn to_degrees(self) -> Self {
        let [yaw, pitch, roll] = triple_to_degrees([self.yaw, self.pitch, self.roll]);
        Self { yaw, pitch, roll }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_pair_two_times_convention() {
        let gains = GainPair::from_kp_ki(0.5, 0.05);
        assert_eq!(gains.two_kp, 1.0);
        assert_eq!(gains.two_ki, 0.1);
    }

    #[test]
    fn test_gain_validation() {
        assert!(GainPair::new(1.0, 0.0).validate().is_ok());
        assert_eq!(GainPair::new(-1.0, 0.0).validate(), Err(ConfigError::Gain));
        assert_eq!(GainPair::new(1.0, f32::NAN).validate(), Err(ConfigError::Gain));
    }

    #[test]
    fn test_calibration_settings_defaults() {
        let settings = CalibrationSettings::default();
        assert_eq!(settings.window_size, 75);
        assert_eq!(settings.max_rounds, 10);
        assert_eq!(settings.gyro_count, 1);
        assert!((settings.tolerance - 0.001_745_329).abs() < 1e-7);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_calibration_settings_validation() {
        let base = CalibrationSettings::default();
        let empty = CalibrationSettings { window_size: 0, ..base };
        let no_rounds = CalibrationSettings { max_rounds: 0, ..base };
        let no_gyros = CalibrationSettings { gyro_count: 0, ..base };
        let too_many = CalibrationSettings {
            gyro_count: crate::bias::MAX_GYRO_INSTANCES + 1,
            ..base
        };
        let bad_tolerance = CalibrationSettings { tolerance: 0.0, ..base };

        assert_eq!(empty.validate(), Err(ConfigError::EmptyWindow));
        assert_eq!(no_rounds.validate(), Err(ConfigError::NoRounds));
        assert_eq!(no_gyros.validate(), Err(ConfigError::GyroInstanceCount));
        assert_eq!(too_many.validate(), Err(ConfigError::GyroInstanceCount));
        assert_eq!(bad_tolerance.validate(), Err(ConfigError::Tolerance));
    }

    #[test]
    fn test_angle_degree_conversion() {
        let euler = EulerAngles {
            yaw: core::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            roll: -core::f32::consts::FRAC_PI_4,
        }
        .to_degrees();
        assert!((euler.yaw - 90.0).abs() < 1e-4);
        assert!((euler.roll + 45.0).abs() < 1e-4);
    }
}
