//! Sensor collaborators
//!
//! Chip drivers live outside this crate. The fusion core only needs a
//! source of raw integer samples and, optionally, a barometer.

use core::convert::Infallible;

use nalgebra::Vector3;

/// Standard sea-level pressure in millibar
pub const SEA_LEVEL_PRESSURE: f32 = 1013.25;

/// One raw reading of every fused sensor
///
/// Magnetometer axes are zero when the board has no magnetometer.
/// Temperature is in hundredths of a degree Celsius or raw register units
/// depending on the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSample {
    pub accelerometer: [i16; 3],
    pub gyroscope: [i16; 3],
    pub magnetometer: [i16; 3],
    pub temperature: i16,
}

impl RawSample {
    /// Build from the ten-value driver layout: accelerometer xyz, gyroscope
    /// xyz, magnetometer xyz, temperature
    pub fn from_array(raw: [i16; 10]) -> Self {
        Self {
            accelerometer: [raw[0], raw[1], raw[2]],
            gyroscope: [raw[3], raw[4], raw[5]],
            magnetometer: [raw[6], raw[7], raw[8]],
            temperature: raw[9],
        }
    }

    pub fn to_array(&self) -> [i16; 10] {
        let [ax, ay, az] = self.accelerometer;
        let [gx, gy, gz] = self.gyroscope;
        let [mx, my, mz] = self.magnetometer;
        [ax, ay, az, gx, gy, gz, mx, my, mz, self.temperature]
    }

    /// The nine fused channels as floats, in raw-sample order
    pub fn channels(&self) -> [f32; 9] {
        let raw = self.to_array();
        core::array::from_fn(|i| raw[i] as f32)
    }

    pub fn gyroscope_vector(&self) -> Vector3<f32> {
        let [x, y, z] = self.gyroscope;
        Vector3::new(x as f32, y as f32, z as f32)
    }
}

/// Raw-sample source (accelerometer, gyroscope, magnetometer, temperature)
pub trait ImuSource {
    type Error;

    fn read_raw(&mut self) -> Result<RawSample, Self::Error>;

    /// One raw gyroscope reading per instance
    ///
    /// The default serves every slot from the single gyroscope in
    /// [`ImuSource::read_raw`]. Boards with several gyroscopes override this.
    fn read_gyro_instances(&mut self, readings: &mut [Vector3<f32>]) -> Result<(), Self::Error> {
        let gyroscope = self.read_raw()?.gyroscope_vector();
        readings.fill(gyroscope);
        Ok(())
    }
}

/// Barometric pressure sensor
pub trait Barometer {
    type Error;

    /// Temperature in degrees Celsius
    fn temperature(&mut self) -> Result<f32, Self::Error>;

    /// Pressure in millibar
    fn pressure(&mut self) -> Result<f32, Self::Error>;

    /// Altitude in metres above the level where pressure is
    /// `sea_level_pressure` millibar
    fn altitude(&mut self, sea_level_pressure: f32) -> Result<f32, Self::Error> {
        let temperature = self.temperature()?;
        let pressure = self.pressure()?;
        Ok(pressure_altitude(sea_level_pressure, pressure, temperature))
    }
}

/// Hypsometric altitude estimate in metres
///
/// # Example
/// ```
/// use imu_fusion::{pressure_altitude, SEA_LEVEL_PRESSURE};
///
/// let altitude = pressure_altitude(SEA_LEVEL_PRESSURE, 899.0, 15.0);
/// assert!((altitude - 1020.0).abs() < 5.0);
/// ```
pub fn pressure_altitude(sea_level_pressure: f32, pressure: f32, temperature: f32) -> f32 {
    (libm::powf(sea_level_pressure / pressure, 1.0 / 5.257) - 1.0) * (temperature + 273.15) / 0.0065
}

/// Placeholder for boards without a barometer; cannot be constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoBarometer {}

impl Barometer for NoBarometer {
    type Error = Infallible;

    fn temperature(&mut self) -> Result<f32, Self::Error> {
        match *self {}
    }

    fn pressure(&mut self) -> Result<f32, Self::Error> {
        match *self {}
    }
}
