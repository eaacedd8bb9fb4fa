//! Gyroscope bias calibration
//!
//! Determines the steady-state zero-rate offset of one or more gyroscopes
//! while the device is held still. Each round averages a window of raw
//! samples; the estimate is accepted once two consecutive round averages
//! agree within the tolerance. A gyroscope that never settles falls back to
//! the best pair of rounds seen.

use embedded_hal::digital::{ErrorType, OutputPin};
use heapless::Vec;
use nalgebra::Vector3;

use crate::error::ConfigError;
use crate::types::CalibrationSettings;

/// Upper bound on gyroscope instances calibrated together
pub const MAX_GYRO_INSTANCES: usize = 4;

/// Source of raw gyroscope readings, one per instance
pub trait GyroSampler {
    type Error;

    /// Fill `readings` with one raw sample per gyroscope instance
    fn read_gyros(&mut self, readings: &mut [Vector3<f32>]) -> Result<(), Self::Error>;
}

/// Convergence state of a single gyroscope instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiasEstimator {
    last_average: Vector3<f32>,
    best_average: Vector3<f32>,
    best_difference: f32,
    offset: Vector3<f32>,
    converged: bool,
}

impl Default for BiasEstimator {
    fn default() -> Self {
        Self {
            last_average: Vector3::zeros(),
            best_average: Vector3::zeros(),
            best_difference: 0.0,
            offset: Vector3::zeros(),
            converged: false,
        }
    }
}

impl BiasEstimator {
    /// Feed the window average of `round` (counted from zero)
    ///
    /// Returns whether this instance has converged. Once converged the
    /// estimator ignores further rounds.
    pub fn observe(&mut self, round: usize, average: Vector3<f32>, tolerance: f32) -> bool {
        if self.converged {
            return true;
        }

        let difference = (self.last_average - average).norm();
        let blend = (average + self.last_average) * 0.5;

        if round == 0 {
            self.best_difference = difference;
            self.best_average = average;
        } else if difference < tolerance {
            self.offset = blend;
            self.converged = true;
        } else if difference < self.best_difference {
            self.best_difference = difference;
            self.best_average = blend;
        }

        self.last_average = average;
        self.converged
    }

    /// Current bias estimate: the converged value, or the best-so-far blend
    pub fn offset(&self) -> Vector3<f32> {
        if self.converged {
            self.offset
        } else {
            self.best_average
        }
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Smallest difference between consecutive round averages seen so far
    pub fn best_difference(&self) -> f32 {
        self.best_difference
    }
}

/// Outcome of a bias estimation run
#[derive(Debug, Clone, PartialEq)]
pub struct BiasReport {
    /// Bias per gyroscope instance, raw units
    pub offsets: Vec<Vector3<f32>, MAX_GYRO_INSTANCES>,
    /// Whether every instance converged within the round bound
    pub converged: bool,
    /// Rounds actually run
    pub rounds: usize,
}

impl BiasReport {
    /// Bias of the first gyroscope instance
    pub fn primary(&self) -> Vector3<f32> {
        self.offsets.first().copied().unwrap_or_else(Vector3::zeros)
    }
}

/// Windowed-average gyroscope bias calibrator
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use imu_fusion::{CalibrationSettings, GyroBiasCalibrator, GyroSampler, NoIndicator};
///
/// struct Stationary;
///
/// impl GyroSampler for Stationary {
///     type Error = ();
///
///     fn read_gyros(&mut self, readings: &mut [Vector3<f32>]) -> Result<(), ()> {
///         readings.fill(Vector3::new(-12.0, 7.0, 3.0));
///         Ok(())
///     }
/// }
///
/// let calibrator = GyroBiasCalibrator::new(CalibrationSettings::default()).unwrap();
/// let report = calibrator.estimate(&mut Stationary, &mut NoIndicator).unwrap();
/// assert!(report.converged);
/// assert_eq!(report.primary(), Vector3::new(-12.0, 7.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroBiasCalibrator {
    settings: CalibrationSettings,
}

impl GyroBiasCalibrator {
    pub fn new(settings: CalibrationSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    /// Average one window of samples for every instance
    ///
    /// On its own this is a quick single-pass zeroing with no convergence
    /// check.
    pub fn window_average<S: GyroSampler>(
        &self,
        sampler: &mut S,
    ) -> Result<Vec<Vector3<f32>, MAX_GYRO_INSTANCES>, S::Error> {
        let count = self.settings.gyro_count;
        let mut readings = [Vector3::zeros(); MAX_GYRO_INSTANCES];
        let mut sums = [Vector3::zeros(); MAX_GYRO_INSTANCES];

        for _ in 0..self.settings.window_size {
            sampler.read_gyros(&mut readings[..count])?;
            for (sum, reading) in sums.iter_mut().zip(&readings[..count]) {
                *sum += reading;
            }
        }

        let samples = self.settings.window_size as f32;
        Ok(sums[..count].iter().map(|sum| sum / samples).collect())
    }

    /// Run the bounded convergence procedure
    ///
    /// `indicator` is driven high for the duration of the run and low
    /// afterwards, including when the sampler fails. Non-convergence is not
    /// an error; the report carries the best estimate found.
    pub fn estimate<S, P>(&self, sampler: &mut S, indicator: &mut P) -> Result<BiasReport, S::Error>
    where
        S: GyroSampler,
        P: OutputPin,
    {
        drive(indicator, true);
        let report = self.converge(sampler);
        drive(indicator, false);
        report
    }

    fn converge<S: GyroSampler>(&self, sampler: &mut S) -> Result<BiasReport, S::Error> {
        let count = self.settings.gyro_count;
        let mut estimators = [BiasEstimator::default(); MAX_GYRO_INSTANCES];
        let mut rounds = 0;

        for round in 0..self.settings.max_rounds {
            let averages = self.window_average(sampler)?;
            rounds += 1;

            let mut all_converged = true;
            for (instance, (estimator, average)) in
                estimators[..count].iter_mut().zip(&averages).enumerate()
            {
                let was_converged = estimator.is_converged();
                let converged = estimator.observe(round, *average, self.settings.tolerance);
                if converged && !was_converged {
                    log_debug!("gyro {} converged in round {}", instance, round);
                }
                all_converged &= converged;
            }

            if all_converged {
                break;
            }
        }

        let estimators = &estimators[..count];
        for (instance, estimator) in estimators.iter().enumerate() {
            if !estimator.is_converged() {
                log_warn!(
                    "gyro {} did not converge, best difference {}",
                    instance,
                    estimator.best_difference()
                );
            }
        }

        let converged = estimators.iter().all(BiasEstimator::is_converged);
        log_info!("gyro bias estimated after {} rounds, converged: {}", rounds, converged);

        Ok(BiasReport {
            offsets: estimators.iter().map(BiasEstimator::offset).collect(),
            converged,
            rounds,
        })
    }
}

fn drive<P: OutputPin>(indicator: &mut P, active: bool) {
    let result = if active {
        indicator.set_high()
    } else {
        indicator.set_low()
    };
    if result.is_err() {
        log_warn!("calibration indicator write failed");
    }
}

/// Indicator for setups without a status pin
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl ErrorType for NoIndicator {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoIndicator {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
