//! Sensor axis alignment
//!
//! Some boards mount a sensor rotated relative to the body frame. The
//! alignment maps a reading from the sensor frame into the body frame so
//! every sensor agrees before fusion.

use nalgebra::Vector3;

/// Mounting orientation of a sensor relative to the body frame
///
/// Variant names give the body axes in terms of sensor axes: `PyNxPz`
/// means body X = +sensor Y, body Y = -sensor X, body Z = +sensor Z.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_fusion::AxesAlignment;
///
/// // Magnetometer rotated 90 degrees about Z on the carrier board
/// let body = AxesAlignment::PyNxPz.apply(Vector3::new(10.0, 20.0, 30.0));
/// assert_eq!(body, Vector3::new(20.0, -10.0, 30.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxesAlignment {
    /// Sensor axes coincide with body axes
    #[default]
    PxPyPz,
    /// Rotated +90 degrees about Z
    PyNxPz,
    /// Rotated 180 degrees about Z
    NxNyPz,
    /// Rotated -90 degrees about Z
    NyPxPz,
    /// Mounted upside down (180 degrees about X)
    PxNyNz,
}

impl AxesAlignment {
    /// Source axis and sign for each body axis
    const fn mapping(self) -> [(usize, f32); 3] {
        match self {
            AxesAlignment::PxPyPz => [(0, 1.0), (1, 1.0), (2, 1.0)],
            AxesAlignment::PyNxPz => [(1, 1.0), (0, -1.0), (2, 1.0)],
            AxesAlignment::NxNyPz => [(0, -1.0), (1, -1.0), (2, 1.0)],
            AxesAlignment::NyPxPz => [(1, -1.0), (0, 1.0), (2, 1.0)],
            AxesAlignment::PxNyNz => [(0, 1.0), (1, -1.0), (2, -1.0)],
        }
    }

    /// Map a sensor-frame reading into the body frame
    #[inline]
    pub fn apply(self, sensor: Vector3<f32>) -> Vector3<f32> {
        let [x, y, z] = self.mapping();
        Vector3::new(
            sensor[x.0] * x.1,
            sensor[y.0] * y.1,
            sensor[z.0] * z.1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AxesAlignment; 5] = [
        AxesAlignment::PxPyPz,
        AxesAlignment::PyNxPz,
        AxesAlignment::NxNyPz,
        AxesAlignment::NyPxPz,
        AxesAlignment::PxNyNz,
    ];

    #[test]
    fn test_identity_alignment() {
        let sensor = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(AxesAlignment::PxPyPz.apply(sensor), sensor);
    }

    #[test]
    fn test_specific_alignments() {
        let sensor = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(AxesAlignment::PyNxPz.apply(sensor), Vector3::new(2.0, -1.0, 3.0));
        assert_eq!(AxesAlignment::NxNyPz.apply(sensor), Vector3::new(-1.0, -2.0, 3.0));
        assert_eq!(AxesAlignment::NyPxPz.apply(sensor), Vector3::new(-2.0, 1.0, 3.0));
        assert_eq!(AxesAlignment::PxNyNz.apply(sensor), Vector3::new(1.0, -2.0, -3.0));
    }

    #[test]
    fn test_alignments_preserve_magnitude() {
        let sensor = Vector3::new(1.0f32, -2.0, 3.0);
        for alignment in ALL {
            let result = alignment.apply(sensor);
            assert!(
                (result.norm() - sensor.norm()).abs() < 1e-6,
                "Alignment {:?} changed magnitude",
                alignment
            );
        }
    }

    #[test]
    fn test_quarter_turns_are_inverse() {
        let v = Vector3::new(0.1, -0.2, 0.3);
        let recovered = AxesAlignment::NyPxPz.apply(AxesAlignment::PyNxPz.apply(v));
        assert!((recovered - v).norm() < 1e-6);
    }
}
