use imu_fusion::{Board, Imu, ImuSource, MonotonicClock, NoIndicator, RawSample};

const SAMPLE_PERIOD_US: u64 = 10_000; // 10 ms sample period

/// Stands in for the sensor drivers
struct Sensors;

impl ImuSource for Sensors {
    type Error = ();

    fn read_raw(&mut self) -> Result<RawSample, ()> {
        // replace this with real accelerometer, gyroscope, magnetometer and
        // temperature registers
        Ok(RawSample::from_array([0, 0, 16384, 12, -7, 4, 220, 0, -380, -1500]))
    }
}

/// Stands in for a hardware timer
struct Timer(u64);

impl MonotonicClock for Timer {
    fn now_micros(&mut self) -> u64 {
        self.0 += SAMPLE_PERIOD_US;
        self.0
    }
}

fn main() {
    let mut imu = Imu::new(Sensors, Timer(0), Board::FreeImuV04.config()).unwrap();

    // keep the board still while the gyroscope bias is measured
    let report = imu.estimate_bias(&mut NoIndicator).unwrap();
    println!("Gyroscope bias: {:?} (converged: {})", report.primary(), report.converged);

    for _ in 0..10 {
        // this loop should repeat each time new sensor data is available
        let angles = imu.euler_degrees().unwrap();

        println!(
            "Yaw: {:.2}, Pitch: {:.2}, Roll: {:.2}",
            angles.yaw, angles.pitch, angles.roll
        );
    }
}
