#![cfg_attr(not(test), no_std)]

//! IMU fusion - attitude estimation for small inertial measurement units
//!
//! Estimates the orientation of a rigid body from a 3-axis accelerometer, a
//! 3-axis gyroscope and an optional 3-axis magnetometer, at sensor rate, on a
//! microcontroller.
//!
//! # Features
//!
//! - Mahony complementary filter with proportional-integral feedback
//! - Run-time selectable fast reciprocal square root
//! - Iterative gyroscope bias calibration with best-effort fallback
//! - Temperature compensation with per-channel cubic correction curves
//! - Board presets replacing compile-time variant selection
//! - Euler angles and gravity-referenced yaw/pitch/roll
//! - `#![no_std]`, logging through `defmt` behind the `defmt` feature
//!
//! # Quick Start
//!
//! ```rust
//! use nalgebra::Vector3;
//! use imu_fusion::OrientationFilter;
//!
//! let mut filter = OrientationFilter::new();
//!
//! // Calibrated readings
//! let gyroscope = Vector3::new(0.001, 0.002, 0.003);   // rad/s
//! let accelerometer = Vector3::new(0.01, -0.02, 1.0);  // g
//! let magnetometer = Vector3::new(0.3, 0.02, -0.4);    // any unit
//!
//! filter.update(gyroscope, accelerometer, magnetometer, 0.01); // 10 ms
//!
//! let quaternion = filter.quaternion();
//! let angles = filter.euler().to_degrees();
//! ```
//!
//! With drivers at hand, [`Imu`] runs the full pipeline from raw integer
//! samples: temperature and static calibration, sample timing, filter
//! update and angle queries.

#[macro_use]
mod logging;

mod axes;
pub mod bias;
pub mod board;
pub mod calibration;
mod clock;
pub mod error;
mod filter;
mod imu;
mod math;
pub mod sensor;
pub mod temperature;
mod types;

pub use axes::AxesAlignment;
pub use bias::{BiasEstimator, BiasReport, GyroBiasCalibrator, GyroSampler, MAX_GYRO_INSTANCES, NoIndicator};
pub use board::{Board, BoardConfig};
pub use calibration::{CalibrationProfile, CalibrationStore, StoredCalibration};
pub use clock::{MonotonicClock, SampleClock};
pub use error::{ConfigError, Error};
pub use filter::OrientationFilter;
pub use imu::{CalibratedSample, Imu};
pub use math::{DEG_TO_RAD, InvSqrtMode, RAD_TO_DEG, checked_inv_sqrt, inv_sqrt};
pub use sensor::{Barometer, ImuSource, NoBarometer, RawSample, SEA_LEVEL_PRESSURE, pressure_altitude};
pub use temperature::{Channel, TemperatureCoefficients, TemperatureModel};
pub use types::*;
