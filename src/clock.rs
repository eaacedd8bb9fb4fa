//! Sample timing
//!
//! The integration step is derived from the wall-clock time between two
//! consecutive filter updates.

/// Free-running microsecond clock
pub trait MonotonicClock {
    /// Microseconds since an arbitrary epoch. Must never go backwards.
    fn now_micros(&mut self) -> u64;
}

/// Tracks the time between updates
///
/// # Example
/// ```
/// use imu_fusion::SampleClock;
///
/// let mut clock = SampleClock::new(0.5);
/// assert_eq!(clock.tick(1_000), None); // first sample only sets the reference
/// assert_eq!(clock.tick(11_000), Some(0.01));
/// assert_eq!(clock.frequency(), Some(100.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleClock {
    last_update: Option<u64>,
    period: Option<f32>,
    max_period: f32,
}

impl SampleClock {
    /// `max_period` bounds the integration step in seconds
    pub fn new(max_period: f32) -> Self {
        Self {
            last_update: None,
            period: None,
            max_period,
        }
    }

    /// Register an update at `now_us`
    ///
    /// Returns the elapsed time in seconds since the previous update, or
    /// `None` for the very first update and for updates that arrive with no
    /// measurable time elapsed. A timestamp earlier than the reference is
    /// ignored and the reference kept. Elapsed times above the maximum
    /// period are clamped.
    pub fn tick(&mut self, now_us: u64) -> Option<f32> {
        let Some(previous) = self.last_update else {
            self.last_update = Some(now_us);
            return None;
        };

        if now_us <= previous {
            log_trace!("no time elapsed since last sample");
            return None;
        }
        self.last_update = Some(now_us);
        let elapsed_us = now_us - previous;

        let mut period = elapsed_us as f32 / 1_000_000.0;
        if period > self.max_period {
            log_debug!("sample period {} clamped to {}", period, self.max_period);
            period = self.max_period;
        }

        self.period = Some(period);
        Some(period)
    }

    /// Sample frequency in Hz derived from the last accepted period
    pub fn frequency(&self) -> Option<f32> {
        self.period.map(|period| 1.0 / period)
    }

    /// Last accepted period in seconds
    pub fn period(&self) -> Option<f32> {
        self.period
    }

    pub fn max_period(&self) -> f32 {
        self.max_period
    }

    /// Forget the reference time; the next tick is treated as the first
    pub fn reset(&mut self) {
        self.last_update = None;
        self.period = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_has_no_period() {
        let mut clock = SampleClock::new(0.5);
        assert_eq!(clock.tick(5_000_000), None);
        assert_eq!(clock.frequency(), None);
    }

    #[test]
    fn test_period_and_frequency() {
        let mut clock = SampleClock::new(0.5);
        clock.tick(0);
        let period = clock.tick(2_500).unwrap();

        assert!((period - 0.0025).abs() < 1e-7);
        assert!((clock.frequency().unwrap() - 400.0).abs() < 1e-2);
    }

    #[test]
    fn test_zero_elapsed_is_skipped() {
        let mut clock = SampleClock::new(0.5);
        clock.tick(1_000);
        clock.tick(2_000);

        assert_eq!(clock.tick(2_000), None);
        // Last accepted period survives a skipped tick
        assert_eq!(clock.period(), Some(0.001));
        assert_eq!(clock.tick(3_000), Some(0.001));
    }

    #[test]
    fn test_long_gap_is_clamped() {
        let mut clock = SampleClock::new(0.05);
        clock.tick(0);
        assert_eq!(clock.tick(3_000_000), Some(0.05));
    }

    #[test]
    fn test_backwards_time_keeps_reference() {
        let mut clock = SampleClock::new(0.5);
        clock.tick(100_000);
        assert_eq!(clock.tick(110_000), Some(0.01));

        assert_eq!(clock.tick(50_000), None);
        // Back at the reference: still no time has elapsed
        assert_eq!(clock.tick(110_000), None);
        assert_eq!(clock.tick(120_000), Some(0.01));
    }

    #[test]
    fn test_reset() {
        let mut clock = SampleClock::new(0.5);
        clock.tick(0);
        clock.tick(1_000);
        clock.reset();

        assert_eq!(clock.period(), None);
        assert_eq!(clock.tick(2_000), None);
    }
}
