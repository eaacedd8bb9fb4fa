//! Complementary quaternion orientation filter
//!
//! Mahony-style filter with proportional-integral feedback. The measured
//! gravity direction (and, in nine-axis mode, the measured magnetic field)
//! is compared against the direction predicted by the current quaternion;
//! the cross-product error is fed back into the angular rate before the
//! quaternion is integrated and re-normalised.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::math::{InvSqrtMode, checked_inv_sqrt};
use crate::types::{EulerAngles, FilterSettings, GainPair, MagneticErrorScope, YawPitchRoll};

/// Orientation filter state
///
/// Owns the quaternion and the integral feedback. One instance per body;
/// there is no shared state between instances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationFilter {
    settings: FilterSettings,
    /// Active gains, initially `settings.gains`
    gains: GainPair,
    quaternion: UnitQuaternion<f32>,
    integral_feedback: Vector3<f32>,
}

/// Pairwise quaternion products shared by every term of one update
struct Products {
    q0q0: f32,
    q0q1: f32,
    q0q2: f32,
    q0q3: f32,
    q1q1: f32,
    q1q2: f32,
    q1q3: f32,
    q2q2: f32,
    q2q3: f32,
    q3q3: f32,
}

impl Products {
    fn new(q: &Quaternion<f32>) -> Self {
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);
        Self {
            q0q0: q0 * q0,
            q0q1: q0 * q1,
            q0q2: q0 * q2,
            q0q3: q0 * q3,
            q1q1: q1 * q1,
            q1q2: q1 * q2,
            q1q3: q1 * q3,
            q2q2: q2 * q2,
            q2q3: q2 * q3,
            q3q3: q3 * q3,
        }
    }

    /// Half of the gravity direction predicted in the sensor frame
    fn half_gravity(&self) -> Vector3<f32> {
        Vector3::new(
            self.q1q3 - self.q0q2,
            self.q0q1 + self.q2q3,
            self.q0q0 - 0.5 + self.q3q3,
        )
    }

    /// Half of the magnetic field direction predicted in the sensor frame,
    /// given a normalised measurement
    fn half_magnetic(&self, m: &Vector3<f32>) -> Vector3<f32> {
        // Measured field rotated into the Earth frame
        let hx = 2.0
            * (m.x * (0.5 - self.q2q2 - self.q3q3)
                + m.y * (self.q1q2 - self.q0q3)
                + m.z * (self.q1q3 + self.q0q2));
        let hy = 2.0
            * (m.x * (self.q1q2 + self.q0q3)
                + m.y * (0.5 - self.q1q1 - self.q3q3)
                + m.z * (self.q2q3 - self.q0q1));
        let bx = libm::sqrtf(hx * hx + hy * hy);
        let bz = 2.0
            * (m.x * (self.q1q3 - self.q0q2)
                + m.y * (self.q2q3 + self.q0q1)
                + m.z * (0.5 - self.q1q1 - self.q2q2));

        Vector3::new(
            bx * (0.5 - self.q2q2 - self.q3q3) + bz * (self.q1q3 - self.q0q2),
            bx * (self.q1q2 - self.q0q3) + bz * (self.q0q1 + self.q2q3),
            bx * (self.q0q2 + self.q1q3) + bz * (0.5 - self.q1q1 - self.q2q2),
        )
    }
}

/// A zero on any axis marks a reading as not yet valid
#[inline]
fn is_valid_reading(v: &Vector3<f32>) -> bool {
    v.x != 0.0 && v.y != 0.0 && v.z != 0.0
}

#[inline]
fn normalize(v: Vector3<f32>, mode: InvSqrtMode) -> Option<Vector3<f32>> {
    checked_inv_sqrt(v.norm_squared(), mode).map(|r| v * r)
}

impl OrientationFilter {
    /// Create a filter at the identity orientation with default settings
    pub fn new() -> Self {
        Self::with_settings(FilterSettings::default())
    }

    pub fn with_settings(settings: FilterSettings) -> Self {
        Self {
            settings,
            gains: settings.gains,
            quaternion: UnitQuaternion::identity(),
            integral_feedback: Vector3::zeros(),
        }
    }

    /// Advance the filter by one sample
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in radians per second
    /// * `accelerometer` - Specific force, any unit (only the direction is used)
    /// * `magnetometer` - Magnetic field, any unit; ignored unless the filter
    ///   is configured with a magnetometer
    /// * `delta_time` - Time since the previous sample in seconds
    ///
    /// A reading with a zero on any axis contributes no correction. Returns
    /// `false` when the step was skipped, either because `delta_time` is not
    /// a positive finite number or because the integrated quaternion
    /// degenerated (zero, overflowing or non-finite norm). A skipped step
    /// leaves the state untouched.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use imu_fusion::OrientationFilter;
    ///
    /// let mut filter = OrientationFilter::new();
    /// let stepped = filter.update(
    ///     Vector3::new(0.01, -0.02, 0.0),
    ///     Vector3::new(0.02, -0.01, 0.98),
    ///     Vector3::new(0.3, 0.05, -0.4),
    ///     0.01,
    /// );
    /// assert!(stepped);
    /// ```
    pub fn update(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        magnetometer: Vector3<f32>,
        delta_time: f32,
    ) -> bool {
        if !(delta_time.is_finite() && delta_time > 0.0) {
            log_warn!("filter step skipped, sample period {}", delta_time);
            return false;
        }

        let mode = self.settings.inv_sqrt_mode;
        let q = *self.quaternion.quaternion();
        let products = Products::new(&q);
        let mut half_error = Vector3::zeros();

        if self.settings.has_magnetometer && is_valid_reading(&magnetometer) {
            if let Some(m) = normalize(magnetometer, mode) {
                let field_error = m.cross(&products.half_magnetic(&m));
                if self.settings.magnetic_error_scope == MagneticErrorScope::Combined {
                    half_error += field_error;
                }
            }
        }

        if is_valid_reading(&accelerometer) {
            if let Some(a) = normalize(accelerometer, mode) {
                half_error += a.cross(&products.half_gravity());
            }
        }

        let mut rate = gyroscope;
        let mut integral_feedback = self.integral_feedback;
        if is_valid_reading(&half_error) {
            if self.gains.two_ki > 0.0 {
                integral_feedback += half_error * (self.gains.two_ki * delta_time);
                rate += integral_feedback;
            } else {
                integral_feedback = Vector3::zeros();
            }
            rate += half_error * self.gains.two_kp;
        }

        // Quaternion rate kinematics, first-order step
        let g = rate * (0.5 * delta_time);
        let w = q.w + (-q.i * g.x - q.j * g.y - q.k * g.z);
        let x = q.i + (q.w * g.x + q.j * g.z - q.k * g.y);
        let y = q.j + (q.w * g.y - q.i * g.z + q.k * g.x);
        let z = q.k + (q.w * g.z + q.i * g.y - q.j * g.x);

        match checked_inv_sqrt(w * w + x * x + y * y + z * z, mode) {
            Some(r) => {
                self.quaternion =
                    UnitQuaternion::new_unchecked(Quaternion::new(w * r, x * r, y * r, z * r));
                self.integral_feedback = integral_feedback;
                true
            }
            None => {
                log_warn!("filter step skipped, degenerate quaternion");
                false
            }
        }
    }

    /// Six-axis update (gyroscope and accelerometer only)
    pub fn update_no_magnetometer(
        &mut self,
        gyroscope: Vector3<f32>,
        accelerometer: Vector3<f32>,
        delta_time: f32,
    ) -> bool {
        self.update(gyroscope, accelerometer, Vector3::zeros(), delta_time)
    }

    /// Current orientation of the sensor frame relative to the Earth frame
    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.quaternion
    }

    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f32>) {
        self.quaternion = quaternion;
    }

    /// Accumulated integral feedback in radians per second
    pub fn integral_feedback(&self) -> Vector3<f32> {
        self.integral_feedback
    }

    /// Expected gravity direction in the sensor frame (unit length)
    pub fn gravity(&self) -> Vector3<f32> {
        let q = self.quaternion.quaternion();
        Vector3::new(
            2.0 * (q.i * q.k - q.w * q.j),
            2.0 * (q.w * q.i + q.j * q.k),
            q.w * q.w - q.i * q.i - q.j * q.j + q.k * q.k,
        )
    }

    /// Remove the expected gravity direction from an accelerometer reading
    ///
    /// `accelerometer` must be in g. The result is the linear acceleration
    /// in the sensor frame.
    pub fn gravity_compensate(&self, accelerometer: Vector3<f32>) -> Vector3<f32> {
        accelerometer - self.gravity()
    }

    /// Euler angles in radians, aerospace (Z-Y-X) sequence
    pub fn euler(&self) -> EulerAngles {
        let q = self.quaternion.quaternion();
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

        EulerAngles {
            yaw: libm::atan2f(2.0 * q1 * q2 - 2.0 * q0 * q3, 2.0 * q0 * q0 + 2.0 * q1 * q1 - 1.0),
            pitch: -libm::asinf((2.0 * q1 * q3 + 2.0 * q0 * q2).clamp(-1.0, 1.0)),
            roll: libm::atan2f(2.0 * q2 * q3 - 2.0 * q0 * q1, 2.0 * q0 * q0 + 2.0 * q3 * q3 - 1.0),
        }
    }

    /// Yaw, pitch and roll in radians, pitch and roll taken from the
    /// gravity vector
    ///
    /// See [`YawPitchRoll`] for how this differs from [`Self::euler`].
    pub fn yaw_pitch_roll(&self) -> YawPitchRoll {
        let q = self.quaternion.quaternion();
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);
        let g = self.gravity();

        YawPitchRoll {
            yaw: libm::atan2f(2.0 * q1 * q2 - 2.0 * q0 * q3, 2.0 * q0 * q0 + 2.0 * q1 * q1 - 1.0),
            pitch: libm::atanf(g.x / libm::sqrtf(g.y * g.y + g.z * g.z)),
            roll: libm::atanf(g.y / libm::sqrtf(g.x * g.x + g.z * g.z)),
        }
    }

    /// Return to the identity orientation, clear the integral feedback and
    /// restore the configured gains
    pub fn reset(&mut self) {
        self.quaternion = UnitQuaternion::identity();
        self.integral_feedback = Vector3::zeros();
        self.gains = self.settings.gains;
        log_debug!("filter reset");
    }

    /// Return to the identity orientation only
    pub fn reset_quaternion(&mut self) {
        self.quaternion = UnitQuaternion::identity();
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Replace the settings; the active gains become `settings.gains`
    pub fn set_settings(&mut self, settings: FilterSettings) {
        self.settings = settings;
        self.set_gains(settings.gains);
    }

    /// Currently active gains
    pub fn gains(&self) -> GainPair {
        self.gains
    }

    /// Change the active gains until the next [`Self::reset`]
    ///
    /// A zero integral gain clears the integral feedback immediately.
    pub fn set_gains(&mut self, gains: GainPair) {
        self.gains = gains;
        if gains.two_ki <= 0.0 {
            self.integral_feedback = Vector3::zeros();
        }
    }
}

impl Default for OrientationFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::FRAC_PI_4;

    const DT: f32 = 0.01;

    /// Deterministic pseudo-random inputs in [-1, 1)
    struct Lcg(u32);

    impl Lcg {
        fn next(&mut self) -> f32 {
            self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (self.0 >> 8) as f32 / (1u32 << 23) as f32 - 1.0
        }

        fn vector(&mut self, scale: f32) -> Vector3<f32> {
            Vector3::new(self.next(), self.next(), self.next()) * scale
        }
    }

    fn exact_settings(gains: GainPair) -> FilterSettings {
        FilterSettings {
            gains,
            inv_sqrt_mode: InvSqrtMode::Exact,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_filter() {
        let filter = OrientationFilter::new();
        assert_eq!(filter.quaternion(), UnitQuaternion::identity());
        assert_eq!(filter.integral_feedback(), Vector3::zeros());
        assert_eq!(filter.gravity(), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_unit_norm_after_every_update() {
        for mode in [InvSqrtMode::Refined, InvSqrtMode::Exact] {
            let mut filter = OrientationFilter::with_settings(FilterSettings {
                inv_sqrt_mode: mode,
                ..Default::default()
            });
            let mut rng = Lcg(7);

            for _ in 0..2000 {
                filter.update(rng.vector(3.0), rng.vector(1.5), rng.vector(0.6), DT);
                let norm = filter.quaternion().quaternion().norm();
                assert!((norm - 1.0).abs() < 1e-3, "{:?} norm {}", mode, norm);
            }
        }
    }

    #[test]
    fn test_rest_converges_to_measured_gravity() {
        let mut filter = OrientationFilter::with_settings(exact_settings(GainPair::new(2.0, 0.0)));
        filter.set_quaternion(UnitQuaternion::from_euler_angles(0.3, 0.0, 0.0));
        let accelerometer = Vector3::new(0.2, -0.3, 0.93);

        for _ in 0..5000 {
            filter.update_no_magnetometer(Vector3::zeros(), accelerometer, DT);
        }
        let settled = filter.quaternion();
        assert!((filter.gravity() - accelerometer.normalize()).norm() < 1e-3);

        for _ in 0..500 {
            filter.update_no_magnetometer(Vector3::zeros(), accelerometer, DT);
        }
        assert!(filter.quaternion().angle_to(&settled) < 1e-3);
    }

    #[test]
    fn test_identity_is_fixed_point_for_level_gravity() {
        let mut filter = OrientationFilter::new();
        for _ in 0..1000 {
            assert!(filter.update_no_magnetometer(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0), DT));
        }
        assert!(filter.quaternion().angle() < 1e-6);
    }

    #[test]
    fn test_zero_integral_gain_holds_integrator_at_zero() {
        let mut filter = OrientationFilter::with_settings(FilterSettings {
            gains: GainPair::new(1.0, 0.0),
            ..Default::default()
        });
        let mut rng = Lcg(42);

        for _ in 0..1000 {
            filter.update(rng.vector(2.0), rng.vector(1.0), rng.vector(0.5), DT);
            assert_eq!(filter.integral_feedback(), Vector3::zeros());
        }
    }

    #[test]
    fn test_integral_feedback_cancels_gyroscope_bias() {
        let mut filter = OrientationFilter::with_settings(exact_settings(GainPair::new(2.0, 0.2)));
        let bias = Vector3::new(0.01, -0.02, 0.005);
        let accelerometer = Vector3::new(0.2, -0.3, 0.93);
        let magnetometer = Vector3::new(0.3, 0.1, -0.5);

        for _ in 0..5000 {
            filter.update(bias, accelerometer, magnetometer, DT);
        }
        assert!(
            (filter.integral_feedback() + bias).norm() < 2e-3,
            "integral {:?}",
            filter.integral_feedback()
        );
    }

    #[test]
    fn test_set_gains_zero_ki_clears_integrator() {
        let mut filter = OrientationFilter::with_settings(exact_settings(GainPair::new(2.0, 0.5)));
        for _ in 0..100 {
            filter.update_no_magnetometer(Vector3::new(0.1, 0.1, 0.1), Vector3::new(0.2, -0.3, 0.93), DT);
        }
        assert_ne!(filter.integral_feedback(), Vector3::zeros());

        filter.set_gains(GainPair::new(2.0, 0.0));
        assert_eq!(filter.integral_feedback(), Vector3::zeros());
    }

    #[test]
    fn test_invalid_readings_contribute_nothing() {
        let gyro = Vector3::new(0.1, -0.2, 0.3);
        let mut reference = OrientationFilter::new();
        let mut filter = OrientationFilter::new();

        // Pure gyro integration as reference: feedback disabled by zero gains
        reference.set_gains(GainPair::new(0.0, 0.0));
        reference.update(gyro, Vector3::new(0.5, 0.5, 0.5), Vector3::new(0.5, 0.5, 0.5), DT);

        filter.update(gyro, Vector3::new(0.0, 0.2, 0.9), Vector3::new(0.3, 0.0, 0.1), DT);

        assert_eq!(filter.quaternion(), reference.quaternion());
    }

    #[test]
    fn test_magnetometer_ignored_without_one_configured() {
        let settings = FilterSettings {
            has_magnetometer: false,
            ..Default::default()
        };
        let mut with_field = OrientationFilter::with_settings(settings);
        let mut without_field = OrientationFilter::with_settings(settings);
        let accelerometer = Vector3::new(0.1, 0.2, 0.95);

        with_field.update(Vector3::zeros(), accelerometer, Vector3::new(0.4, -0.1, 0.3), DT);
        without_field.update_no_magnetometer(Vector3::zeros(), accelerometer, DT);

        assert_eq!(with_field.quaternion(), without_field.quaternion());
    }

    #[test]
    fn test_discarded_field_error_matches_six_axis() {
        let discarded = FilterSettings {
            magnetic_error_scope: MagneticErrorScope::Discarded,
            ..Default::default()
        };
        let mut nine_axis = OrientationFilter::with_settings(discarded);
        let mut six_axis = OrientationFilter::with_settings(discarded);
        let mut combined = OrientationFilter::new();
        let gyro = Vector3::new(0.02, 0.01, -0.03);
        let accelerometer = Vector3::new(0.1, 0.2, 0.95);
        let magnetometer = Vector3::new(0.4, -0.1, 0.3);

        for _ in 0..10 {
            nine_axis.update(gyro, accelerometer, magnetometer, DT);
            six_axis.update_no_magnetometer(gyro, accelerometer, DT);
            combined.update(gyro, accelerometer, magnetometer, DT);
        }

        assert_eq!(nine_axis.quaternion(), six_axis.quaternion());
        assert_ne!(combined.quaternion(), six_axis.quaternion());
    }

    #[test]
    fn test_invalid_sample_period_skips_step() {
        let mut filter = OrientationFilter::new();
        let gyro = Vector3::new(1.0, 1.0, 1.0);

        for delta_time in [0.0, -0.01, f32::NAN, f32::INFINITY] {
            assert!(!filter.update_no_magnetometer(gyro, Vector3::zeros(), delta_time));
        }
        assert_eq!(filter.quaternion(), UnitQuaternion::identity());
    }

    #[test]
    fn test_degenerate_quaternion_keeps_previous_state() {
        let mut filter = OrientationFilter::new();
        filter.update_no_magnetometer(Vector3::new(0.5, 0.0, 0.0), Vector3::zeros(), DT);
        let before = filter.quaternion();

        // Norm squared overflows f32
        assert!(!filter.update_no_magnetometer(Vector3::repeat(1e30), Vector3::zeros(), DT));
        assert_eq!(filter.quaternion(), before);

        assert!(!filter.update_no_magnetometer(Vector3::repeat(f32::NAN), Vector3::zeros(), DT));
        assert_eq!(filter.quaternion(), before);

        assert!(filter.update_no_magnetometer(Vector3::zeros(), Vector3::zeros(), DT));
    }

    #[test]
    fn test_degenerate_accelerometer_is_skipped() {
        let mut filter = OrientationFilter::new();
        let huge = Vector3::repeat(f32::MAX);

        assert!(filter.update_no_magnetometer(Vector3::zeros(), huge, DT));
        assert_eq!(filter.quaternion(), UnitQuaternion::identity());
        assert_eq!(filter.integral_feedback(), Vector3::zeros());
    }

    #[test]
    fn test_euler_and_gravity_conventions_diverge_under_combined_rotation() {
        let mut filter = OrientationFilter::new();
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_4);
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_4);
        filter.set_quaternion(yaw * pitch);

        let euler = filter.euler().to_degrees();
        let ypr = filter.yaw_pitch_roll().to_degrees();

        assert!((euler.yaw - ypr.yaw).abs() < 1e-3);
        assert!((euler.pitch + 30.0).abs() < 1e-2, "euler pitch {}", euler.pitch);
        assert!((euler.roll - 35.264).abs() < 1e-2, "euler roll {}", euler.roll);
        assert!((ypr.pitch + 45.0).abs() < 1e-2, "ypr pitch {}", ypr.pitch);
        assert!(ypr.roll.abs() < 1e-2, "ypr roll {}", ypr.roll);
        assert!((euler.pitch - ypr.pitch).abs() > 10.0);
        assert!((euler.roll - ypr.roll).abs() > 10.0);
    }

    #[test]
    fn test_conventions_agree_for_single_axis_pitch() {
        let mut filter = OrientationFilter::new();
        filter.set_quaternion(UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4));

        let euler = filter.euler();
        let ypr = filter.yaw_pitch_roll();

        assert!((euler.pitch + 0.4).abs() < 1e-5);
        assert!((euler.pitch - ypr.pitch).abs() < 1e-5);
        assert!((euler.roll - ypr.roll).abs() < 1e-5);
    }

    #[test]
    fn test_gravity_compensation() {
        let filter = OrientationFilter::new();
        let linear = filter.gravity_compensate(Vector3::new(0.1, -0.2, 1.3));
        assert!((linear - Vector3::new(0.1, -0.2, 0.3)).norm() < 1e-6);
    }

    #[test]
    fn test_reset_restores_configured_gains() {
        let mut filter = OrientationFilter::with_settings(exact_settings(GainPair::new(1.5, 0.325)));
        for _ in 0..50 {
            filter.update_no_magnetometer(Vector3::new(0.2, 0.1, 0.0), Vector3::new(0.2, -0.3, 0.93), DT);
        }
        filter.set_gains(GainPair::new(4.0, 0.5));

        filter.reset_quaternion();
        assert_eq!(filter.quaternion(), UnitQuaternion::identity());
        assert_ne!(filter.integral_feedback(), Vector3::zeros());
        assert_eq!(filter.gains(), GainPair::new(4.0, 0.5));

        filter.reset();
        assert_eq!(filter.integral_feedback(), Vector3::zeros());
        assert_eq!(filter.gains(), GainPair::new(1.5, 0.325));
    }
}
