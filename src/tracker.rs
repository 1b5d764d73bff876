// tracker.rs — per-tracker ownership of raw orientation + calibration state
//
// A tracker owns exactly two pieces of engine state: the most recent raw
// sample (no history) and its CalibrationState, kept as separate fields so
// correction application stays a free function over both. The registry
// serializes access from the ingestion path and the trigger surface; a reset
// always computes against the snapshot taken under that lock.

use nalgebra::{Quaternion, UnitQuaternion};
use serde::Serialize;
use std::collections::HashMap;

use crate::calibration::{apply_correction, validate_reference, CalibrationState};
use crate::error::{ResetError, ResetResult};
use crate::math::yaw_of;

/// Which of the three reset operations a trigger command requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetKind {
    Full,
    Yaw,
    Mounting,
}

impl ResetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetKind::Full => "full",
            ResetKind::Yaw => "yaw",
            ResetKind::Mounting => "mounting",
        }
    }
}

/// One body-worn tracker.
#[derive(Clone, Debug)]
pub struct Tracker {
    last_raw: Option<UnitQuaternion<f64>>,
    calibration: CalibrationState,
    samples_received: u64,
    resets_performed: u64,
    last_sample_timestamp: f64,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            last_raw: None,
            calibration: CalibrationState::new(),
            samples_received: 0,
            resets_performed: 0,
            last_sample_timestamp: 0.0,
        }
    }

    /// Store the latest raw sample. Only the most recent value is kept.
    pub fn update_raw(&mut self, raw: UnitQuaternion<f64>, timestamp: f64) {
        self.last_raw = Some(raw);
        self.samples_received += 1;
        self.last_sample_timestamp = timestamp;
    }

    /// Pull-based corrected orientation; `None` until the first sample.
    pub fn corrected(&self) -> Option<UnitQuaternion<f64>> {
        self.last_raw
            .map(|raw| apply_correction(&raw, &self.calibration))
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    /// Run one reset operation against the current raw sample.
    ///
    /// Validates the reference (identity when omitted) and checks sample
    /// availability before mutating anything, so a rejected reset leaves the
    /// calibration state exactly as it was.
    pub fn reset(&mut self, kind: ResetKind, reference: Option<Quaternion<f64>>) -> ResetResult<()> {
        let reference = match reference {
            Some(q) => validate_reference(&q)?,
            None => UnitQuaternion::identity(),
        };
        let raw = self.last_raw.ok_or(ResetError::NoRawOrientationAvailable)?;

        match kind {
            ResetKind::Full => self.calibration.reset_full(&raw, &reference),
            ResetKind::Yaw => self.calibration.reset_yaw(&raw, &reference),
            ResetKind::Mounting => self.calibration.reset_mounting(&raw, &reference),
        }
        self.resets_performed += 1;
        Ok(())
    }
}

/// Status snapshot of one tracker for the UI surface.
#[derive(Clone, Debug, Serialize)]
pub struct TrackerStatus {
    pub id: String,
    pub samples_received: u64,
    pub resets_performed: u64,
    pub needs_reset: bool,
    pub needs_mounting: bool,
    pub corrected_yaw_deg: Option<f64>,
    pub last_sample_timestamp: f64,
}

/// All trackers known to the server, keyed by tracker id.
///
/// Trackers are created on their first sample and destroyed on
/// deregistration. The registry itself holds no locking; the server wraps it
/// in one shared lock so ingestion, resets, and reads never interleave within
/// a tracker.
#[derive(Debug, Default)]
pub struct TrackerRegistry {
    trackers: HashMap<String, Tracker>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample, registering the tracker on first contact.
    pub fn ingest(&mut self, id: &str, raw: UnitQuaternion<f64>, timestamp: f64) {
        self.trackers
            .entry(id.to_string())
            .or_default()
            .update_raw(raw, timestamp);
    }

    pub fn reset(
        &mut self,
        id: &str,
        kind: ResetKind,
        reference: Option<Quaternion<f64>>,
    ) -> ResetResult<()> {
        let tracker = self
            .trackers
            .get_mut(id)
            .ok_or_else(|| ResetError::UnknownTracker(id.to_string()))?;
        tracker.reset(kind, reference)
    }

    pub fn corrected(&self, id: &str) -> Option<UnitQuaternion<f64>> {
        self.trackers.get(id).and_then(Tracker::corrected)
    }

    pub fn get(&self, id: &str) -> Option<&Tracker> {
        self.trackers.get(id)
    }

    /// Deregister a tracker, dropping its calibration state with it.
    pub fn remove(&mut self, id: &str) -> bool {
        self.trackers.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn statuses(&self) -> Vec<TrackerStatus> {
        let mut statuses: Vec<TrackerStatus> = self
            .trackers
            .iter()
            .map(|(id, tracker)| TrackerStatus {
                id: id.clone(),
                samples_received: tracker.samples_received,
                resets_performed: tracker.resets_performed,
                needs_reset: tracker.calibration.needs_reset,
                needs_mounting: tracker.calibration.needs_mounting,
                corrected_yaw_deg: tracker.corrected().map(|q| yaw_of(&q).to_degrees()),
                last_sample_timestamp: tracker.last_sample_timestamp,
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }
}
