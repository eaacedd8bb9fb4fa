//! Numeric primitives shared by the filter and the calibration code

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Reciprocal square root strategy
///
/// Selected at run time so a deployment can trade cycle count against
/// accuracy without rebuilding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InvSqrtMode {
    /// Magic-constant seed with a single Newton-Raphson step.
    ///
    /// Cheapest and least accurate (about 0.18% worst case). Known to make
    /// gradient-style filters unstable on noisy input; kept for compatibility.
    ///
    /// Does not hold the filter's 1e-3 unit-norm tolerance: after
    /// renormalisation the quaternion norm can be off by up to about 2e-3.
    Classic,
    /// Magic-constant seed with a tuned refinement polynomial.
    ///
    /// Lower worst-case error than [`InvSqrtMode::Classic`] at the same cost.
    #[default]
    Refined,
    /// `1 / sqrt(x)` from the platform math library.
    Exact,
}

const CLASSIC_MAGIC: u32 = 0x5f37_5a86;
const REFINED_MAGIC: u32 = 0x5f1f_1412;

/// Approximate `1 / sqrt(x)`
///
/// `x` must be positive. Zero, negative and non-finite inputs produce
/// meaningless values (NaN or infinity for [`InvSqrtMode::Exact`], garbage
/// for the bit-level modes); use [`checked_inv_sqrt`] when the input is not
/// known to be valid.
///
/// # Example
/// ```
/// use imu_fusion::{inv_sqrt, InvSqrtMode};
///
/// let r = inv_sqrt(4.0, InvSqrtMode::Refined);
/// assert!((r - 0.5).abs() < 1e-3);
/// ```
#[inline]
pub fn inv_sqrt(x: f32, mode: InvSqrtMode) -> f32 {
    match mode {
        InvSqrtMode::Classic => {
            let y = f32::from_bits(CLASSIC_MAGIC.wrapping_sub(x.to_bits() >> 1));
            y * (1.5 - (x * 0.5 * y * y))
        }
        InvSqrtMode::Refined => {
            let tmp = f32::from_bits(REFINED_MAGIC.wrapping_sub(x.to_bits() >> 1));
            tmp * (1.690_002_3 - 0.714_158_17 * x * tmp * tmp)
        }
        InvSqrtMode::Exact => 1.0 / libm::sqrtf(x),
    }
}

/// [`inv_sqrt`] guarded against inputs outside its domain
///
/// Returns `None` unless `x` is finite and strictly positive.
#[inline]
pub fn checked_inv_sqrt(x: f32, mode: InvSqrtMode) -> Option<f32> {
    if x.is_finite() && x > 0.0 {
        Some(inv_sqrt(x, mode))
    } else {
        None
    }
}

/// Convert a yaw/pitch/roll style triple from radians to degrees
#[inline]
pub(crate) fn triple_to_degrees(values: [f32; 3]) -> [f32; 3] {
    values.map(|v| v * RAD_TO_DEG)
}
