//! Load a model description, feed it synthetic tracker output, run the standard pipeline
//! and export every trajectory as CSV.
//!
//! ```text
//! cargo run --example rigid_bones_demo -- [model.toml] [output.csv]
//! ```
//!
//! Set `RUST_LOG=debug` to see the per-bone statistics.
use std::env;

use camino::Utf8PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bonefit::actor::Actor;
use bonefit::biomechanics::{CalculationPipeline, RigidBoneEngine};
use bonefit::bonefit_errors::BonefitError;
use bonefit::constants::Position;
use bonefit::model_info::ModelInfo;

/// One row per frame: a swinging leg, then the two hand points.
fn synthetic_frames(num_frames: usize) -> Vec<Vec<Position>> {
    (0..num_frames)
        .map(|frame| {
            let t = frame as f64 / 30.0;
            let swing = 0.5 * (2.0 * std::f64::consts::PI * t).sin();
            let noise = 0.015 * (17.0 * t).sin();

            let left_hip = Position::new(0.1, 0.0, 1.0);
            let right_hip = Position::new(-0.1, 0.0, 1.0);
            let left_knee =
                left_hip + Position::new(0.0, swing.sin(), -swing.cos()) * (0.45 + noise);
            let left_ankle = left_knee + Position::new(0.0, 0.0, -1.0) * (0.42 - noise);

            vec![
                left_hip,
                right_hip,
                left_knee,
                left_ankle,
                Position::new(0.3, 0.0, 1.1),
                Position::new(0.3, 0.05, 1.1),
            ]
        })
        .collect()
}

fn main() -> Result<(), BonefitError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let model_path = Utf8PathBuf::from(
        args.next()
            .unwrap_or_else(|| "tests/data/humanoid_model.toml".to_string()),
    );
    let output_path = Utf8PathBuf::from(
        args.next()
            .unwrap_or_else(|| "rigid_bones_demo.csv".to_string()),
    );

    let model = ModelInfo::from_path(&model_path)?;
    let mut actor = Actor::from_model_info("demo_subject", &model)?;
    info!("{actor}");

    actor.add_tracked_points(&synthetic_frames(300))?;

    if let Some(body) = actor.aspect("body") {
        if let (Some(hierarchy), Some(xyz)) =
            (body.anatomical_structure().joint_hierarchy(), body.xyz())
        {
            for bone in RigidBoneEngine::new(hierarchy)?.bone_statistics(xyz)? {
                info!("{bone}");
            }
        }
    }

    for (aspect, messages) in actor.calculate(&CalculationPipeline::standard())? {
        for message in messages {
            println!("[{aspect}] {message}");
        }
    }

    actor.write_csv(&output_path)?;
    println!("Trajectories written to {output_path}");
    Ok(())
}
