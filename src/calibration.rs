// calibration.rs — per-tracker orientation reset and mounting calibration
//
// Everything in this module is independent of:
//   - tokio / async runtime
//   - the ingestion transport and the HTTP trigger surface
//   - File I/O and logging
//
// It takes a raw sensor quaternion plus the stored corrections in, and
// produces a corrected body-frame orientation out. That keeps it unit-testable
// with synthetic orientations and lets the transport layers be swapped without
// touching calibration math.
//
// The corrected output is always
//
//     corrected = yaw_reset_fix * full_reset_fix * raw * mounting_fix
//
// Left factors apply world-frame corrections outside the raw reading; the
// right factor applies the physical mounting offset in the sensor's own frame.
// There is no hidden accumulation: the three quaternions plus two flags below
// are the whole calibration state.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

use crate::error::{ResetError, ResetResult};
use crate::math::{heading_of, yaw_of, yaw_quat};

/// Allowed deviation of a reference quaternion's norm from 1.
pub const UNIT_NORM_TOLERANCE: f64 = 1e-4;

/// Correction quaternions for one tracker.
///
/// Owned exclusively by that tracker; mutated only by the three reset
/// operations, read by `apply_correction` on every sample.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationState {
    /// Established by the most recent full reset. Corrects tilt and heading
    /// drift accumulated since the sensor's internal reference was set.
    pub full_reset_fix: UnitQuaternion<f64>,
    /// Established by the most recent yaw-only reset. Always a pure yaw
    /// rotation; corrects heading drift without disturbing tilt correction.
    pub yaw_reset_fix: UnitQuaternion<f64>,
    /// Established by the most recent mounting reset. Encodes the fixed
    /// physical offset between the sensor package and the body segment's
    /// anatomical forward direction.
    pub mounting_fix: UnitQuaternion<f64>,
    /// True until the first successful full reset.
    pub needs_reset: bool,
    /// True until the first successful mounting reset.
    pub needs_mounting: bool,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            full_reset_fix: UnitQuaternion::identity(),
            yaw_reset_fix: UnitQuaternion::identity(),
            mounting_fix: UnitQuaternion::identity(),
            needs_reset: true,
            needs_mounting: true,
        }
    }
}

/// Map a raw sensor orientation to the corrected body-frame orientation.
///
/// Pure and allocation-free; invoked at the full incoming sample rate.
pub fn apply_correction(
    raw: &UnitQuaternion<f64>,
    state: &CalibrationState,
) -> UnitQuaternion<f64> {
    state.yaw_reset_fix * state.full_reset_fix * raw * state.mounting_fix
}

/// Check a caller-supplied reference orientation before any state mutation.
///
/// Rejects NaN/infinite components and norms off unit length by more than
/// `UNIT_NORM_TOLERANCE`; the survivors are renormalized to soak up encoding
/// round-off.
pub fn validate_reference(reference: &Quaternion<f64>) -> ResetResult<UnitQuaternion<f64>> {
    if !reference.coords.iter().all(|c| c.is_finite()) {
        return Err(ResetError::InvalidReferenceOrientation);
    }
    if (reference.norm() - 1.0).abs() > UNIT_NORM_TOLERANCE {
        return Err(ResetError::InvalidReferenceOrientation);
    }
    Ok(UnitQuaternion::new_normalize(*reference))
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full reset: stand straight, face the reference yaw.
    ///
    /// Rebuilds `full_reset_fix` so the corrected output at `raw` is exactly
    /// the reference's yaw with zero tilt, and drops any accumulated yaw-only
    /// correction, which a full reset supersedes. `mounting_fix` is untouched.
    pub fn reset_full(&mut self, raw: &UnitQuaternion<f64>, reference: &UnitQuaternion<f64>) {
        let pose = raw * self.mounting_fix;
        self.full_reset_fix = yaw_quat(yaw_of(reference)) * pose.inverse();
        self.yaw_reset_fix = UnitQuaternion::identity();
        self.needs_reset = false;
    }

    /// Yaw-only reset: periodic heading-drift correction.
    ///
    /// Replaces `yaw_reset_fix` with the pure yaw rotation that brings the
    /// corrected yaw at `raw` to the reference's yaw, holding the other two
    /// fixes. A pure-yaw left factor shifts only the yaw term of the Y-Z-X
    /// decomposition, so established tilt and mounting corrections survive.
    pub fn reset_yaw(&mut self, raw: &UnitQuaternion<f64>, reference: &UnitQuaternion<f64>) {
        let uncorrected = self.full_reset_fix * raw * self.mounting_fix;
        let delta = yaw_of(reference) - yaw_of(&uncorrected);
        self.yaw_reset_fix = yaw_quat(delta);
    }

    /// Mounting reset: tracker physically pointed along the body segment's
    /// forward direction.
    ///
    /// The pose-level corrections currently in effect are applied to `raw`
    /// (without the mounting fix being replaced), the vertical axis is pushed
    /// through that rotation, and the heading of the resulting vector — minus
    /// the reference's yaw — becomes the new pure-yaw `mounting_fix`. Because
    /// only a heading is extracted, the result is correct for any of the
    /// eight canonical mounting directions.
    pub fn reset_mounting(&mut self, raw: &UnitQuaternion<f64>, reference: &UnitQuaternion<f64>) {
        let pose = self.yaw_reset_fix * self.full_reset_fix * raw;
        let swung_up = pose.transform_vector(&Vector3::y());
        let mounting_yaw = heading_of(&swung_up) - yaw_of(reference);
        self.mounting_fix = yaw_quat(mounting_yaw);
        self.needs_mounting = false;
    }
}
