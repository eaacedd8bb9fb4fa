//! Static sensor calibration
//!
//! Offsets and scale factors are determined by an external calibration
//! procedure and handed to the fusion core at startup. Only the gyroscope
//! bias is ever rewritten at run time (by the bias calibrator).

use nalgebra::Vector3;

/// Signature byte marking a valid calibration image
pub const EEPROM_SIGNATURE: u8 = 0x19;

/// Length of a calibration image: signature, six `i16` offsets, six `f32` scales
pub const EEPROM_IMAGE_LEN: usize = 1 + 6 * 2 + 6 * 4;

/// Per-axis calibration for all sensors
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationProfile {
    /// Subtracted from raw accelerometer readings (raw units)
    pub accelerometer_offset: Vector3<f32>,
    /// Raw accelerometer readings are divided by this after offset removal
    pub accelerometer_scale: Vector3<f32>,
    /// Hard-iron offset subtracted from raw magnetometer readings
    pub magnetometer_offset: Vector3<f32>,
    /// Raw magnetometer readings are divided by this after offset removal
    pub magnetometer_scale: Vector3<f32>,
    /// Static gyroscope bias in raw units
    pub gyroscope_bias: Vector3<f32>,
}

impl Default for CalibrationProfile {
    /// Neutral calibration: zero offsets, unit scales
    fn default() -> Self {
        Self {
            accelerometer_offset: Vector3::zeros(),
            accelerometer_scale: Vector3::new(1.0, 1.0, 1.0),
            magnetometer_offset: Vector3::zeros(),
            magnetometer_scale: Vector3::new(1.0, 1.0, 1.0),
            gyroscope_bias: Vector3::zeros(),
        }
    }
}

impl CalibrationProfile {
    /// `(raw - offset) / scale` per axis
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use imu_fusion::CalibrationProfile;
    ///
    /// let profile = CalibrationProfile {
    ///     accelerometer_offset: Vector3::new(10.0, -20.0, 30.0),
    ///     accelerometer_scale: Vector3::new(2.0, 2.0, 2.0),
    ///     ..Default::default()
    /// };
    /// let calibrated = profile.apply_accelerometer(Vector3::new(110.0, 80.0, 230.0));
    /// assert_eq!(calibrated, Vector3::new(50.0, 50.0, 100.0));
    /// ```
    pub fn apply_accelerometer(&self, raw: Vector3<f32>) -> Vector3<f32> {
        (raw - self.accelerometer_offset).component_div(&self.accelerometer_scale)
    }

    /// `(raw - offset) / scale` per axis
    pub fn apply_magnetometer(&self, raw: Vector3<f32>) -> Vector3<f32> {
        (raw - self.magnetometer_offset).component_div(&self.magnetometer_scale)
    }

    /// Replace the accelerometer/magnetometer part, keeping the gyroscope bias
    pub fn with_stored(self, stored: StoredCalibration) -> Self {
        let to_f32 = |v: [i16; 3]| Vector3::new(v[0] as f32, v[1] as f32, v[2] as f32);
        Self {
            accelerometer_offset: to_f32(stored.accelerometer_offset),
            accelerometer_scale: Vector3::from(stored.accelerometer_scale),
            magnetometer_offset: to_f32(stored.magnetometer_offset),
            magnetometer_scale: Vector3::from(stored.magnetometer_scale),
            gyroscope_bias: self.gyroscope_bias,
        }
    }
}

/// Accelerometer/magnetometer calibration as kept in non-volatile storage
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredCalibration {
    pub accelerometer_offset: [i16; 3],
    pub magnetometer_offset: [i16; 3],
    pub accelerometer_scale: [f32; 3],
    pub magnetometer_scale: [f32; 3],
}

impl StoredCalibration {
    /// Decode a calibration image
    ///
    /// Layout (little endian): signature byte, accelerometer offsets xyz and
    /// magnetometer offsets xyz as `i16`, then accelerometer scales xyz and
    /// magnetometer scales xyz as `f32`. Returns `None` when the signature
    /// is missing or the image is too short.
    pub fn from_eeprom(image: &[u8]) -> Option<Self> {
        if image.len() < EEPROM_IMAGE_LEN || image[0] != EEPROM_SIGNATURE {
            return None;
        }

        let body = &image[1..];
        let offset = |i: usize| i16::from_le_bytes([body[2 * i], body[2 * i + 1]]);
        let scale = |i: usize| {
            let at = 12 + 4 * i;
            f32::from_le_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]])
        };

        Some(Self {
            accelerometer_offset: [offset(0), offset(1), offset(2)],
            magnetometer_offset: [offset(3), offset(4), offset(5)],
            accelerometer_scale: [scale(0), scale(1), scale(2)],
            magnetometer_scale: [scale(3), scale(4), scale(5)],
        })
    }

    /// Encode into the image layout read by [`StoredCalibration::from_eeprom`]
    pub fn to_eeprom(&self) -> [u8; EEPROM_IMAGE_LEN] {
        let mut image = [0u8; EEPROM_IMAGE_LEN];
        image[0] = EEPROM_SIGNATURE;

        let offsets = self.accelerometer_offset.iter().chain(self.magnetometer_offset.iter());
        for (i, value) in offsets.enumerate() {
            image[1 + 2 * i..3 + 2 * i].copy_from_slice(&value.to_le_bytes());
        }
        let scales = self.accelerometer_scale.iter().chain(self.magnetometer_scale.iter());
        for (i, value) in scales.enumerate() {
            image[13 + 4 * i..17 + 4 * i].copy_from_slice(&value.to_le_bytes());
        }
        image
    }
}

/// Persistent calibration storage
///
/// Read once at startup. `Ok(None)` means nothing valid is stored and the
/// neutral calibration should be used.
pub trait CalibrationStore {
    type Error;

    fn load(&mut self) -> Result<Option<StoredCalibration>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredCalibration {
        StoredCalibration {
            accelerometer_offset: [12, -34, 560],
            magnetometer_offset: [-7, 8, -900],
            accelerometer_scale: [16384.0, 16390.5, 16201.25],
            magnetometer_scale: [1.5, 0.75, 1.125],
        }
    }

    #[test]
    fn test_neutral_profile_is_identity() {
        let profile = CalibrationProfile::default();
        let raw = Vector3::new(100.0, -200.0, 300.0);

        assert_eq!(profile.apply_accelerometer(raw), raw);
        assert_eq!(profile.apply_magnetometer(raw), raw);
        assert_eq!(profile.gyroscope_bias, Vector3::zeros());
    }

    #[test]
    fn test_magnetometer_offset_then_scale() {
        let profile = CalibrationProfile {
            magnetometer_offset: Vector3::new(10.0, 20.0, 30.0),
            magnetometer_scale: Vector3::new(2.0, 4.0, 0.5),
            ..Default::default()
        };
        let calibrated = profile.apply_magnetometer(Vector3::new(110.0, 220.0, 330.0));

        assert_eq!(calibrated, Vector3::new(50.0, 50.0, 600.0));
    }

    #[test]
    fn test_with_stored_keeps_gyroscope_bias() {
        let profile = CalibrationProfile {
            gyroscope_bias: Vector3::new(1.0, 2.0, 3.0),
            ..Default::default()
        }
        .with_stored(stored());

        assert_eq!(profile.gyroscope_bias, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(profile.accelerometer_offset, Vector3::new(12.0, -34.0, 560.0));
        assert_eq!(profile.magnetometer_scale, Vector3::new(1.5, 0.75, 1.125));
    }

    #[test]
    fn test_eeprom_image_decodes() {
        let image = stored().to_eeprom();
        assert_eq!(image[0], EEPROM_SIGNATURE);
        assert_eq!(&image[1..3], &12i16.to_le_bytes());
        assert_eq!(StoredCalibration::from_eeprom(&image), Some(stored()));
    }

    #[test]
    fn test_eeprom_without_signature_is_ignored() {
        let mut image = stored().to_eeprom();
        image[0] = 0xFF;
        assert_eq!(StoredCalibration::from_eeprom(&image), None);
    }

    #[test]
    fn test_short_eeprom_image_is_ignored() {
        let image = stored().to_eeprom();
        assert_eq!(StoredCalibration::from_eeprom(&image[..EEPROM_IMAGE_LEN - 1]), None);
        assert_eq!(StoredCalibration::from_eeprom(&[]), None);
    }
}
