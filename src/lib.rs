//! Body-worn tracker orientation server.
//!
//! Ingests raw orientation quaternions from multiple inertial trackers,
//! corrects them into a consistent body-relative frame through a per-tracker
//! reset and mounting-calibration engine, and exposes corrected orientations
//! plus the three reset commands to a remote UI.
//!
//! The engine proper lives in [`math`], [`calibration`] and [`tracker`];
//! [`sensors`] and [`server`] are the replaceable transport glue around it.

pub mod calibration;
pub mod error;
pub mod math;
pub mod sensors;
pub mod server;
pub mod tracker;
