//! Sensor fusion facade
//!
//! [`Imu`] owns the raw-sample source, the clock, the calibration and the
//! orientation filter. Every orientation query reads one sample, calibrates
//! it and advances the filter, so the caller's polling cadence is the
//! filter's sample rate.

use embedded_hal::digital::OutputPin;
use nalgebra::{UnitQuaternion, Vector3};

use crate::bias::{BiasReport, GyroBiasCalibrator, GyroSampler};
use crate::board::BoardConfig;
use crate::calibration::{CalibrationProfile, CalibrationStore};
use crate::clock::{MonotonicClock, SampleClock};
use crate::error::{ConfigError, Error, Result};
use crate::filter::OrientationFilter;
use crate::math::DEG_TO_RAD;
use crate::sensor::{Barometer, ImuSource, NoBarometer, RawSample};
use crate::temperature::TemperatureModel;
use crate::types::{EulerAngles, GainPair, YawPitchRoll};

/// One calibrated reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedSample {
    /// Accelerometer in the unit defined by the calibration scale (g for a
    /// scale in LSB/g)
    pub accelerometer: Vector3<f32>,
    /// Angular rate in degrees per second
    pub gyroscope: Vector3<f32>,
    /// Magnetic field in the body frame; zero on boards without a
    /// magnetometer
    pub magnetometer: Vector3<f32>,
    /// Raw temperature reading in sensor units
    pub temperature: f32,
}

/// Gyroscope readings for the bias calibrator, straight from the source
struct SourceSampler<'a, S>(&'a mut S);

impl<S: ImuSource> GyroSampler for SourceSampler<'_, S> {
    type Error = S::Error;

    fn read_gyros(&mut self, readings: &mut [Vector3<f32>]) -> core::result::Result<(), S::Error> {
        self.0.read_gyro_instances(readings)
    }
}

/// Attitude and heading reference for one board
///
/// # Example
/// ```
/// use imu_fusion::{Board, Imu, ImuSource, MonotonicClock, RawSample};
///
/// struct Level;
///
/// impl ImuSource for Level {
///     type Error = ();
///
///     fn read_raw(&mut self) -> Result<RawSample, ()> {
///         Ok(RawSample::from_array([30, -20, 16384, 2, -1, 3, 0, 0, 0, -1500]))
///     }
/// }
///
/// struct Ticker(u64);
///
/// impl MonotonicClock for Ticker {
///     fn now_micros(&mut self) -> u64 {
///         self.0 += 10_000;
///         self.0
///     }
/// }
///
/// let mut imu = Imu::new(Level, Ticker(0), Board::GenericMpu6050.config()).unwrap();
/// imu.estimate_bias(&mut imu_fusion::NoIndicator).unwrap();
///
/// for _ in 0..100 {
///     imu.update().unwrap();
/// }
/// let angles = imu.euler_degrees().unwrap();
/// assert!(angles.pitch.abs() < 1.0);
/// ```
pub struct Imu<S, C, B = NoBarometer> {
    source: S,
    clock: C,
    barometer: Option<B>,
    config: BoardConfig,
    filter: OrientationFilter,
    sample_clock: SampleClock,
    temperature: TemperatureModel,
    calibration: CalibrationProfile,
}

impl<S, C> Imu<S, C, NoBarometer>
where
    S: ImuSource,
    C: MonotonicClock,
{
    /// Create the facade with neutral calibration and the identity
    /// orientation
    pub fn new(source: S, clock: C, config: BoardConfig) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        log_info!("imu configured for {}", config.name);

        Ok(Self {
            source,
            clock,
            barometer: None,
            filter: OrientationFilter::with_settings(config.filter_settings()),
            sample_clock: SampleClock::new(config.max_sample_period),
            temperature: config.temperature_model(),
            calibration: CalibrationProfile::default(),
            config,
        })
    }

    /// Attach a barometer; only allowed on boards that have one
    pub fn with_barometer<B: Barometer>(
        self,
        barometer: B,
    ) -> core::result::Result<Imu<S, C, B>, ConfigError> {
        if !self.config.has_barometer {
            return Err(ConfigError::NoBarometer);
        }

        Ok(Imu {
            source: self.source,
            clock: self.clock,
            barometer: Some(barometer),
            config: self.config,
            filter: self.filter,
            sample_clock: self.sample_clock,
            temperature: self.temperature,
            calibration: self.calibration,
        })
    }
}

impl<S, C, B> Imu<S, C, B>
where
    S: ImuSource,
    C: MonotonicClock,
{
    /// Load accelerometer/magnetometer calibration from persistent storage
    ///
    /// Returns `true` when stored values were applied. Without stored
    /// values the neutral calibration is used. The gyroscope bias is kept
    /// either way.
    pub fn load_calibration<T: CalibrationStore>(
        &mut self,
        store: &mut T,
    ) -> core::result::Result<bool, T::Error> {
        match store.load()? {
            Some(stored) => {
                self.calibration = self.calibration.with_stored(stored);
                log_info!("stored calibration loaded");
                Ok(true)
            }
            None => {
                self.calibration = CalibrationProfile {
                    gyroscope_bias: self.calibration.gyroscope_bias,
                    ..CalibrationProfile::default()
                };
                log_info!("no stored calibration, using neutral values");
                Ok(false)
            }
        }
    }

    pub fn set_calibration(&mut self, calibration: CalibrationProfile) {
        self.calibration = calibration;
    }

    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }

    /// Read one raw sample without calibration
    pub fn raw_values(&mut self) -> Result<RawSample, S::Error> {
        self.source.read_raw().map_err(|e| {
            log_error!("raw sample read failed");
            Error::Source(e)
        })
    }

    /// Read and calibrate one sample
    pub fn values(&mut self) -> Result<CalibratedSample, S::Error> {
        let raw = self.raw_values()?;
        Ok(self.calibrate(&raw))
    }

    /// Calibrate a raw sample
    ///
    /// Temperature offsets are removed first, then the static offsets and
    /// scales. Gyroscope channels use the temperature polynomial when
    /// compensation is enabled and the static bias otherwise, and are
    /// converted to degrees per second. The magnetometer is finally
    /// rotated into the body frame.
    pub fn calibrate(&self, raw: &RawSample) -> CalibratedSample {
        let temperature = raw.temperature as f32;
        let offsets = self.temperature.offsets(temperature, self.calibration.gyroscope_bias);
        let channels = raw.channels();
        let corrected = |first: usize| {
            Vector3::new(
                channels[first] - offsets[first],
                channels[first + 1] - offsets[first + 1],
                channels[first + 2] - offsets[first + 2],
            )
        };

        let magnetometer = if self.config.has_magnetometer {
            let body = self.calibration.apply_magnetometer(corrected(6));
            self.config.magnetometer_alignment.apply(body)
        } else {
            Vector3::zeros()
        };

        CalibratedSample {
            accelerometer: self.calibration.apply_accelerometer(corrected(0)),
            gyroscope: corrected(3) / self.config.gyro_sensitivity,
            magnetometer,
            temperature,
        }
    }

    /// Read a sample, advance the filter and return the orientation
    ///
    /// The first call after construction or [`Self::reset`] only starts the
    /// sample clock and does not integrate.
    pub fn update(&mut self) -> Result<UnitQuaternion<f32>, S::Error> {
        let sample = self.values()?;
        let now = self.clock.now_micros();

        if let Some(delta_time) = self.sample_clock.tick(now) {
            self.filter.update(
                sample.gyroscope * DEG_TO_RAD,
                sample.accelerometer,
                sample.magnetometer,
                delta_time,
            );
        }

        Ok(self.filter.quaternion())
    }

    /// Update, then return Euler angles in radians
    pub fn euler(&mut self) -> Result<EulerAngles, S::Error> {
        self.update()?;
        Ok(self.filter.euler())
    }

    pub fn euler_degrees(&mut self) -> Result<EulerAngles, S::Error> {
        Ok(self.euler()?.to_degrees())
    }

    /// Update, then return gravity-referenced yaw/pitch/roll in radians
    pub fn yaw_pitch_roll(&mut self) -> Result<YawPitchRoll, S::Error> {
        self.update()?;
        Ok(self.filter.yaw_pitch_roll())
    }

    pub fn yaw_pitch_roll_degrees(&mut self) -> Result<YawPitchRoll, S::Error> {
        Ok(self.yaw_pitch_roll()?.to_degrees())
    }

    /// Read a sample and remove the expected gravity from its acceleration
    ///
    /// Meaningful when the accelerometer calibration scale yields g.
    pub fn linear_acceleration(&mut self) -> Result<Vector3<f32>, S::Error> {
        let sample = self.values()?;
        Ok(self.filter.gravity_compensate(sample.accelerometer))
    }

    /// Determine the static gyroscope bias; the device must be still
    ///
    /// Blocks for up to the configured number of averaging windows. The
    /// first gyroscope instance's bias becomes the static bias.
    pub fn estimate_bias<P: OutputPin>(&mut self, indicator: &mut P) -> Result<BiasReport, S::Error> {
        let calibrator = GyroBiasCalibrator::new(self.config.calibration)?;
        let report = calibrator
            .estimate(&mut SourceSampler(&mut self.source), indicator)
            .map_err(Error::Source)?;

        self.calibration.gyroscope_bias = report.primary();
        Ok(report)
    }

    /// Switch temperature compensation
    ///
    /// Enabling clears the static gyroscope bias, since the polynomial
    /// replaces it. Disabling re-estimates the static bias, which blocks
    /// like [`Self::estimate_bias`]. If that estimation fails, compensation
    /// stays enabled and the calibration is left untouched.
    pub fn set_temperature_compensation<P: OutputPin>(
        &mut self,
        enabled: bool,
        indicator: &mut P,
    ) -> Result<(), S::Error> {
        if enabled {
            self.calibration.gyroscope_bias = Vector3::zeros();
        } else {
            self.estimate_bias(indicator)?;
        }

        self.temperature.set_enabled(enabled);
        log_info!("temperature compensation enabled: {}", enabled);
        Ok(())
    }

    pub fn temperature_model(&self) -> &TemperatureModel {
        &self.temperature
    }

    /// Identity orientation, cleared integral feedback, board gains and a
    /// restarted sample clock
    pub fn reset(&mut self) {
        self.filter.reset();
        self.sample_clock.reset();
        log_info!("orientation reset");
    }

    /// Identity orientation only
    pub fn reset_quaternion(&mut self) {
        self.filter.reset_quaternion();
    }

    pub fn set_gains(&mut self, gains: GainPair) -> core::result::Result<(), ConfigError> {
        gains.validate()?;
        self.filter.set_gains(gains);
        Ok(())
    }

    pub fn filter(&self) -> &OrientationFilter {
        &self.filter
    }

    pub fn sample_clock(&self) -> &SampleClock {
        &self.sample_clock
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn barometer(&mut self) -> Option<&mut B> {
        self.barometer.as_mut()
    }

    /// Give back the collaborators
    pub fn release(self) -> (S, C, Option<B>) {
        (self.source, self.clock, self.barometer)
    }
}

impl<S, C, B> Imu<S, C, B>
where
    S: ImuSource,
    C: MonotonicClock,
    B: Barometer,
{
    /// Barometric altitude in metres
    pub fn altitude(&mut self, sea_level_pressure: f32) -> Result<f32, B::Error> {
        let barometer = self
            .barometer
            .as_mut()
            .ok_or(Error::Config(ConfigError::NoBarometer))?;
        barometer.altitude(sea_level_pressure).map_err(Error::Source)
    }
}
