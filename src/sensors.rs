// sensors.rs — orientation sample ingestion
//
// The engine only needs a stream of (tracker id, unit quaternion) samples; the
// actual transport (serial/UDP drivers, device discovery) lives outside this
// crate. What ships here is the channel plumbing plus a mock source that
// synthesizes multiple trackers with slow heading drift, so resets have real
// drift to correct during development.

use chrono::Utc;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

/// One raw orientation reading as it arrives from a tracker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationData {
    pub timestamp: f64,
    pub tracker_id: String,
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RotationData {
    pub fn quaternion(&self) -> Quaternion<f64> {
        Quaternion::new(self.w, self.x, self.y, self.z)
    }
}

/// Feed mock multi-tracker samples into the channel at `rate_hz`.
///
/// Each tracker holds a distinct base heading and accumulates
/// `drift_rad_per_sec` of heading drift plus a small tilt wobble, which is
/// roughly what an uncorrected consumer-grade IMU stream looks like.
pub async fn rotation_loop(
    tx: Sender<RotationData>,
    tracker_count: usize,
    rate_hz: u64,
    drift_rad_per_sec: f64,
) {
    let period = Duration::from_micros(1_000_000 / rate_hz.max(1));
    let mut ticker = interval(period);
    let mut sample_count = 0u64;
    let start = Utc::now();

    loop {
        ticker.tick().await;
        let elapsed = Utc::now().signed_duration_since(start).num_milliseconds() as f64 / 1000.0;

        for index in 0..tracker_count {
            let sample = mock_rotation(index, tracker_count, elapsed, drift_rad_per_sec);
            match tx.try_send(sample) {
                Ok(_) => {
                    sample_count += 1;
                    if sample_count % 1000 == 0 {
                        eprintln!("[sensors] {} samples", sample_count);
                    }
                }
                Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                    eprintln!("[sensors] Channel closed after {} samples", sample_count);
                    return;
                }
                Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                    // Channel full, drop this sample
                }
            }
        }
    }
}

fn mock_rotation(
    index: usize,
    tracker_count: usize,
    elapsed: f64,
    drift_rad_per_sec: f64,
) -> RotationData {
    let base_heading = index as f64 * std::f64::consts::TAU / tracker_count.max(1) as f64;
    let heading = base_heading + drift_rad_per_sec * elapsed;
    let wobble = 0.08 * (0.5 * elapsed + index as f64).sin();

    let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), heading)
        * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), wobble);

    RotationData {
        timestamp: now_ts(),
        tracker_id: format!("tracker-{}", index),
        w: q.w,
        x: q.i,
        y: q.j,
        z: q.k,
    }
}

pub fn now_ts() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_rotation_is_unit() {
        for index in 0..5 {
            let sample = mock_rotation(index, 5, 12.5, 0.01);
            let norm = sample.quaternion().norm();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mock_trackers_have_distinct_ids() {
        let a = mock_rotation(0, 3, 0.0, 0.0);
        let b = mock_rotation(1, 3, 0.0, 0.0);
        assert_ne!(a.tracker_id, b.tracker_id);
    }

    #[test]
    fn test_drift_moves_heading() {
        let early = mock_rotation(0, 1, 0.0, 0.05);
        let late = mock_rotation(0, 1, 10.0, 0.05);
        assert_ne!(early.quaternion(), late.quaternion());
    }
}
