//! Rotation sensor access.
//!
//! Desktop hosts have no rotation-vector hardware, so the only backend here is
//! a simulated sweep. A registration delivers samples on its own thread until
//! it is unregistered or dropped.

use crate::domain::orientation::rotation_vector_for_azimuth;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub type SampleListener = Box<dyn FnMut([f64; 4]) + Send + 'static>;

pub trait RotationSensor {
    fn name(&self) -> &str;

    /// Start delivering raw rotation-vector samples to `listener`
    fn register(&self, listener: SampleListener) -> Result<SensorRegistration>;
}

/// Active listener registration; dropping it stops delivery
pub struct SensorRegistration {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SensorRegistration {
    pub fn unregister(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            debug!("Sensor listener unregistered");
        }
    }
}

impl Drop for SensorRegistration {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

/// Device turning slowly clockwise with a little wobble
pub struct SimulatedRotationSensor {
    pub period: Duration,
    pub degrees_per_second: f64,
    pub start_azimuth: f64,
}

impl Default for SimulatedRotationSensor {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(200),
            degrees_per_second: 6.0,
            start_azimuth: 0.0,
        }
    }
}

impl SimulatedRotationSensor {
    pub fn azimuth_at(&self, elapsed: Duration) -> f64 {
        let t = elapsed.as_secs_f64();
        self.start_azimuth + self.degrees_per_second * t + 4.0 * (t * 0.7).sin()
    }
}

impl RotationSensor for SimulatedRotationSensor {
    fn name(&self) -> &str {
        "simulated rotation vector"
    }

    fn register(&self, mut listener: SampleListener) -> Result<SensorRegistration> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let sensor = SimulatedRotationSensor {
            period: self.period,
            degrees_per_second: self.degrees_per_second,
            start_azimuth: self.start_azimuth,
        };

        let worker = std::thread::Builder::new()
            .name("rotation-sensor".into())
            .spawn(move || {
                let started = Instant::now();
                while !flag.load(Ordering::Acquire) {
                    let azimuth = sensor.azimuth_at(started.elapsed());
                    listener(rotation_vector_for_azimuth(azimuth));
                    std::thread::sleep(sensor.period);
                }
            })?;

        info!("Registered listener on {}", self.name());
        Ok(SensorRegistration {
            stop,
            worker: Some(worker),
        })
    }
}
