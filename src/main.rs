use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use nalgebra::UnitQuaternion;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

use body_tracker_rs::sensors::{self, RotationData};
use body_tracker_rs::server::{self, SharedRegistry};
use body_tracker_rs::tracker::TrackerRegistry;

#[derive(Parser, Debug)]
#[command(name = "tracker_server")]
#[command(about = "Body tracker orientation server - reset and mounting calibration", long_about = None)]
struct Args {
    /// Port for the trigger/status HTTP interface
    #[arg(long, default_value = "8084")]
    port: u16,

    /// Number of mock trackers to simulate
    #[arg(long, default_value = "3")]
    trackers: usize,

    /// Sample rate per tracker (Hz)
    #[arg(long, default_value = "50")]
    rate_hz: u64,

    /// Simulated heading drift (rad/s)
    #[arg(long, default_value = "0.005")]
    drift: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] Body Tracker Server Starting", ts_now());
    println!("  Port: {}", args.port);
    println!("  Mock trackers: {}", args.trackers);
    println!("  Sample rate: {} Hz", args.rate_hz);
    println!("  Simulated drift: {} rad/s", args.drift);

    let registry: SharedRegistry = Arc::new(RwLock::new(TrackerRegistry::new()));

    let (rotation_tx, mut rotation_rx) = mpsc::channel::<RotationData>(500);

    let _sensor_handle = tokio::spawn(sensors::rotation_loop(
        rotation_tx,
        args.trackers,
        args.rate_hz,
        args.drift,
    ));

    let server_registry = registry.clone();
    let _server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(server_registry, args.port).await {
            log::error!("trigger interface failed: {}", err);
        }
    });

    // Ingestion drain loop: newest sample per tracker wins, nothing buffered.
    let mut ingested = 0u64;
    let mut dropped = 0u64;
    while let Some(sample) = rotation_rx.recv().await {
        let q = sample.quaternion();
        if !q.coords.iter().all(|c| c.is_finite()) || q.norm() < f64::EPSILON {
            dropped += 1;
            if dropped % 100 == 1 {
                log::warn!("dropped {} malformed samples so far", dropped);
            }
            continue;
        }
        let raw = UnitQuaternion::new_normalize(q);
        registry
            .write()
            .await
            .ingest(&sample.tracker_id, raw, sample.timestamp);

        ingested += 1;
        if ingested % 5000 == 0 {
            log::info!(
                "{} samples ingested across {} trackers",
                ingested,
                registry.read().await.len()
            );
        }
    }

    println!("[{}] Sample channel closed, shutting down", ts_now());
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
