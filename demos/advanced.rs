//! Full pipeline on a simulated board
//!
//! A FreeIMU v0.4 rocks in pitch while slowly turning in yaw. Raw samples
//! are synthesised with gyroscope bias and noise, the bias is calibrated
//! while the board is still, and then the filter tracks the motion. Results
//! are written to `orientation.csv` and plotted to `orientation.png`,
//! comparing the Euler angles with the gravity-referenced pitch and roll.
//!
//! Run with: `cargo run --example advanced`

use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;

use imu_fusion::{Board, CalibrationProfile, Imu, ImuSource, MonotonicClock, NoIndicator, RawSample};
use nalgebra::{UnitQuaternion, Vector3};
use plotters::prelude::*;
use rand::prelude::*;
use rand_pcg::Pcg64;
use serde::Serialize;

const SAMPLE_PERIOD_US: u64 = 10_000;
const DURATION_S: f32 = 60.0;

const ACCEL_LSB_PER_G: f32 = 16384.0;
const GYRO_LSB_PER_DPS: f32 = 16.4;
const MAG_LSB_PER_UNIT: f32 = 400.0;
const GYRO_BIAS_LSB: [f32; 3] = [12.0, -7.0, 4.0];

/// Pitch rocks between 0 and 60 degrees, yaw sweeps out to 120 degrees
fn attitude(t: f32) -> (f32, f32, f32, f32) {
    let pitch_amplitude = 30f32.to_radians();
    let yaw_amplitude = 60f32.to_radians();
    let (pitch_rate, yaw_rate) = (0.8, 0.15);

    let pitch = pitch_amplitude * (1.0 - (pitch_rate * t).cos());
    let pitch_dot = pitch_amplitude * pitch_rate * (pitch_rate * t).sin();
    let yaw = yaw_amplitude * (1.0 - (yaw_rate * t).cos());
    let yaw_dot = yaw_amplitude * yaw_rate * (yaw_rate * t).sin();

    (yaw, pitch, yaw_dot, pitch_dot)
}

/// Synthesises raw samples for the attitude at the shared time
struct SimulatedBoard {
    time_us: Rc<Cell<u64>>,
    rng: Pcg64,
}

impl SimulatedBoard {
    fn noise(&mut self, amplitude: f32) -> f32 {
        self.rng.random_range(-amplitude..amplitude)
    }
}

impl ImuSource for SimulatedBoard {
    type Error = ();

    fn read_raw(&mut self) -> Result<RawSample, ()> {
        let t = self.time_us.get() as f32 * 1e-6;
        let (yaw, pitch, yaw_dot, pitch_dot) = attitude(t);

        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw)
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), pitch);
        let to_body = rotation.inverse();

        let gravity = to_body * Vector3::z();
        let field = to_body * Vector3::new(0.55, 0.0, -0.83);
        let rate = Vector3::new(-pitch.sin() * yaw_dot, pitch_dot, pitch.cos() * yaw_dot).map(f32::to_degrees);

        let mut raw = [0i16; 10];
        for axis in 0..3 {
            raw[axis] = (gravity[axis] * ACCEL_LSB_PER_G + self.noise(40.0)) as i16;
            raw[axis + 3] = (rate[axis] * GYRO_LSB_PER_DPS + GYRO_BIAS_LSB[axis] + self.noise(3.0)) as i16;
            raw[axis + 6] = (field[axis] * MAG_LSB_PER_UNIT + self.noise(4.0)) as i16;
        }
        raw[9] = -1500;

        Ok(RawSample::from_array(raw))
    }
}

/// Advances the shared time by one sample period per reading
struct SimulatedTimer(Rc<Cell<u64>>);

impl MonotonicClock for SimulatedTimer {
    fn now_micros(&mut self) -> u64 {
        let now = self.0.get() + SAMPLE_PERIOD_US;
        self.0.set(now);
        now
    }
}

#[derive(Debug, Serialize)]
struct Record {
    time: f32,
    true_yaw: f32,
    true_pitch: f32,
    euler_yaw: f32,
    euler_pitch: f32,
    euler_roll: f32,
    ypr_pitch: f32,
    ypr_roll: f32,
}

fn main() -> Result<(), Box<dyn Error>> {
    let time_us = Rc::new(Cell::new(0));
    let board = SimulatedBoard {
        time_us: time_us.clone(),
        rng: Pcg64::seed_from_u64(11),
    };

    let mut imu = Imu::new(board, SimulatedTimer(time_us), Board::FreeImuV04.config())?;
    imu.set_calibration(CalibrationProfile {
        accelerometer_scale: Vector3::repeat(ACCEL_LSB_PER_G),
        magnetometer_scale: Vector3::repeat(MAG_LSB_PER_UNIT),
        ..Default::default()
    });

    // The shared time only advances once updates start, so the board is
    // still during calibration
    let report = imu.estimate_bias(&mut NoIndicator).map_err(|e| format!("{}", e))?;
    println!(
        "Gyroscope bias {:.2?} after {} rounds (converged: {})",
        report.primary(),
        report.rounds,
        report.converged
    );

    let samples = (DURATION_S * 1e6 / SAMPLE_PERIOD_US as f32) as usize;
    let mut records = Vec::with_capacity(samples);

    for i in 0..samples {
        imu.update().map_err(|e| format!("{}", e))?;

        let time = i as f32 * SAMPLE_PERIOD_US as f32 * 1e-6;
        let (yaw, pitch, _, _) = attitude(time);
        let euler = imu.filter().euler().to_degrees();
        let ypr = imu.filter().yaw_pitch_roll().to_degrees();

        if i % 1000 == 0 {
            println!(
                "t={:5.1}s true=({:6.1},{:6.1}) euler=({:6.1},{:6.1},{:6.1}) ypr pitch/roll=({:6.1},{:6.1})",
                time,
                yaw.to_degrees(),
                pitch.to_degrees(),
                euler.yaw,
                euler.pitch,
                euler.roll,
                ypr.pitch,
                ypr.roll
            );
        }

        records.push(Record {
            time,
            true_yaw: yaw.to_degrees(),
            true_pitch: pitch.to_degrees(),
            euler_yaw: euler.yaw,
            euler_pitch: euler.pitch,
            euler_roll: euler.roll,
            ypr_pitch: ypr.pitch,
            ypr_roll: ypr.roll,
        });
    }

    let mut writer = csv::Writer::from_path("orientation.csv")?;
    for record in &records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    println!("Samples written to orientation.csv");

    plot(&records)?;
    println!("Plot saved to orientation.png");
    Ok(())
}

fn plot(records: &[Record]) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new("orientation.png", (1000, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(450);

    let end = records.last().map_or(DURATION_S, |r| r.time);

    let mut chart = ChartBuilder::on(&upper)
        .caption("Pitch and roll", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0f32..end, -90f32..90f32)?;
    chart.configure_mesh().y_desc("Degrees").draw()?;

    let series: [(&str, fn(&Record) -> f32, RGBColor); 5] = [
        ("True pitch", |r| r.true_pitch, BLACK),
        ("Euler pitch", |r| r.euler_pitch, RED),
        ("Euler roll", |r| r.euler_roll, MAGENTA),
        ("Gravity pitch", |r| r.ypr_pitch, BLUE),
        ("Gravity roll", |r| r.ypr_roll, CYAN),
    ];
    for (label, value, color) in series {
        chart
            .draw_series(LineSeries::new(records.iter().map(|r| (r.time, value(r))), &color))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
    }
    chart.configure_series_labels().border_style(BLACK).draw()?;

    let mut chart = ChartBuilder::on(&lower)
        .caption("Yaw", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0f32..end, -180f32..180f32)?;
    chart.configure_mesh().x_desc("Time (s)").y_desc("Degrees").draw()?;

    chart
        .draw_series(LineSeries::new(records.iter().map(|r| (r.time, r.true_yaw)), &BLACK))?
        .label("True yaw")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLACK));
    chart
        .draw_series(LineSeries::new(records.iter().map(|r| (r.time, r.euler_yaw)), &RED))?
        .label("Euler yaw")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], RED));
    chart.configure_series_labels().border_style(BLACK).draw()?;

    root.present()?;
    Ok(())
}
