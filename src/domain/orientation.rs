//! Rotation-vector to azimuth conversion
//!
//! Follows the usual mobile sensor convention: the rotation vector is the
//! vector part of a unit quaternion (x, y, z) with an optional scalar part w.

use crate::domain::direction::normalize_degrees;
use crate::domain::heading::HeadingSlot;
use std::sync::Arc;
use tracing::debug;

/// Row-major 3x3 rotation matrix
pub type RotationMatrix = [f64; 9];

/// Orientation angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Rotation around the -Z axis, 0 when the device points at north
    pub azimuth: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Build a rotation matrix from a raw rotation-vector sample.
///
/// Returns `None` when fewer than three components are present. When the
/// scalar part is missing it is reconstructed from the unit-length constraint.
pub fn rotation_matrix_from_vector(vector: &[f64]) -> Option<RotationMatrix> {
    if vector.len() < 3 {
        return None;
    }
    let (q1, q2, q3) = (vector[0], vector[1], vector[2]);
    let q0 = match vector.get(3) {
        Some(&w) => w,
        None => {
            let w = 1.0 - q1 * q1 - q2 * q2 - q3 * q3;
            if w > 0.0 {
                w.sqrt()
            } else {
                0.0
            }
        }
    };

    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    Some([
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    ])
}

pub fn orientation_from_matrix(r: &RotationMatrix) -> Orientation {
    Orientation {
        azimuth: r[1].atan2(r[4]),
        pitch: (-r[7]).clamp(-1.0, 1.0).asin(),
        roll: (-r[6]).atan2(r[8]),
    }
}

/// Convert an azimuth in radians into degrees within [0, 360)
pub fn azimuth_degrees(azimuth_radians: f64) -> f64 {
    let mut degrees = azimuth_radians.to_degrees();
    if degrees < 0.0 {
        degrees += 360.0;
    }
    normalize_degrees(degrees)
}

/// Rotation vector describing a device lying flat and pointing at `azimuth`
/// degrees. Used by simulated sensors.
pub fn rotation_vector_for_azimuth(azimuth_degrees: f64) -> [f64; 4] {
    // Azimuth is measured around -Z, so rotate by the negated angle
    let half = -azimuth_degrees.to_radians() / 2.0;
    [0.0, 0.0, half.sin(), half.cos()]
}

/// Keeps the latest azimuth derived from rotation-vector samples.
///
/// Every sample overwrites the previous value. Optional exponential
/// smoothing can be enabled with a factor in (0, 1); `None` disables it.
pub struct SensorFallbackReader {
    slot: Arc<HeadingSlot>,
    smoothing: Option<f64>,
    current: Option<f64>,
}

impl SensorFallbackReader {
    pub fn new(slot: Arc<HeadingSlot>, smoothing: Option<f64>) -> Self {
        Self {
            slot,
            smoothing: smoothing.filter(|a| *a > 0.0 && *a < 1.0),
            current: None,
        }
    }

    /// Handle one raw hardware sample and return the stored azimuth
    pub fn on_rotation_vector(&mut self, vector: &[f64]) -> Option<f64> {
        let Some(matrix) = rotation_matrix_from_vector(vector) else {
            debug!("Ignoring rotation vector with {} components", vector.len());
            return None;
        };
        let raw = azimuth_degrees(orientation_from_matrix(&matrix).azimuth);

        let value = match (self.smoothing, self.current) {
            (Some(alpha), Some(previous)) => {
                // Shortest signed difference so 359 -> 1 does not sweep backwards
                let delta = (raw - previous + 540.0).rem_euclid(360.0) - 180.0;
                normalize_degrees(previous + alpha * delta)
            }
            _ => raw,
        };

        self.current = Some(value);
        self.slot.store(value);
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::direction::Octant;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    #[test]
    fn test_negative_azimuth_wraps() {
        let degrees = azimuth_degrees((-30.0f64).to_radians());
        assert_close(degrees, 330.0);
        assert_eq!(Octant::classify(degrees), Octant::Northwest);
    }

    #[test]
    fn test_identity_vector_points_north() {
        let matrix = rotation_matrix_from_vector(&[0.0, 0.0, 0.0, 1.0]).unwrap();
        let orientation = orientation_from_matrix(&matrix);
        assert_close(orientation.azimuth, 0.0);
        assert_close(orientation.pitch, 0.0);
        assert_close(orientation.roll, 0.0);
    }

    #[test]
    fn test_scalar_part_reconstructed() {
        let half = 15.0f64.to_radians();
        let with_w = rotation_matrix_from_vector(&[0.0, 0.0, half.sin(), half.cos()]).unwrap();
        let without_w = rotation_matrix_from_vector(&[0.0, 0.0, half.sin()]).unwrap();
        for (a, b) in with_w.iter().zip(without_w.iter()) {
            assert_close(*a, *b);
        }
    }

    #[test]
    fn test_rotation_about_z_gives_negated_azimuth() {
        // +30° about Z is a device turned 30° counter-clockwise, i.e. heading 330
        let half = 15.0f64.to_radians();
        let matrix = rotation_matrix_from_vector(&[0.0, 0.0, half.sin(), half.cos()]).unwrap();
        let orientation = orientation_from_matrix(&matrix);
        assert_close(orientation.azimuth, (-30.0f64).to_radians());
        assert_close(azimuth_degrees(orientation.azimuth), 330.0);
    }

    #[test]
    fn test_short_vector_rejected() {
        let slot = Arc::new(HeadingSlot::new());
        let mut reader = SensorFallbackReader::new(slot.clone(), None);
        assert_eq!(reader.on_rotation_vector(&[0.1, 0.2]), None);
        assert_eq!(slot.load(), None);
    }

    #[test]
    fn test_reader_overwrites_without_smoothing() {
        let slot = Arc::new(HeadingSlot::new());
        let mut reader = SensorFallbackReader::new(slot.clone(), None);
        for azimuth in [10.0, 200.0, 95.0] {
            reader.on_rotation_vector(&rotation_vector_for_azimuth(azimuth));
            assert_close(slot.load().unwrap(), azimuth);
        }
    }

    #[test]
    fn test_smoothing_takes_short_way_round() {
        let slot = Arc::new(HeadingSlot::new());
        let mut reader = SensorFallbackReader::new(slot.clone(), Some(0.5));
        reader.on_rotation_vector(&rotation_vector_for_azimuth(350.0));
        let value = reader.on_rotation_vector(&rotation_vector_for_azimuth(30.0)).unwrap();
        assert_close(value, 10.0);
        assert_close(slot.load().unwrap(), 10.0);
    }
}
