//! Mimic AMP reference-motion CLI.
//!
//! - `inspect`: validate a configuration against its motion archive
//! - `reference`: dump a batch of reference observations as JSON
//! - `replay`: play the clip through the live feature path
//! - `convert`: re-save an archive in canonical form

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bevy::prelude::*;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mimic_amp::prelude::*;
use mimic_core::prelude::*;
use mimic_core::seed::REFERENCE_STREAM;
use mimic_motion::clip::MotionClip;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Reference motions and AMP observations.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration and print the observation layout.
    Inspect {
        /// AMP configuration (TOML).
        config: PathBuf,
    },

    /// Sample reference observations and print them as JSON.
    Reference {
        /// AMP configuration (TOML).
        config: PathBuf,

        /// Number of samples.
        #[arg(short = 'n', long, default_value_t = 8)]
        samples: usize,

        /// Override the configured seed.
        #[arg(short, long)]
        seed: Option<u64>,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Play the clip through the live path and compare with reference windows.
    Replay {
        /// AMP configuration (TOML).
        config: PathBuf,

        /// Number of simulation steps.
        #[arg(short = 'n', long, default_value_t = 60)]
        steps: usize,
    },

    /// Load an archive and write it back with `dt` and unit rotations.
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load(config_path: &Path) -> Result<(AmpConfig, Arc<MotionClip>)> {
    let config = AmpConfig::from_file(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let clip = MotionClip::load(&config.motion_file)
        .with_context(|| format!("loading {}", config.motion_file.display()))?;
    Ok((config, Arc::new(clip)))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_inspect(config_path: &Path) -> Result<()> {
    let (config, clip) = load(config_path)?;
    let provider = ReferenceMotionProvider::from_config(&config, Arc::clone(&clip), clip.dof_names())?;

    println!("motion: {}", config.motion_file.display());
    println!(
        "  frames={}, dt={:.5}s, duration={:.3}s",
        clip.num_frames(),
        clip.dt(),
        clip.duration()
    );
    println!("  joints={}, bodies={}", clip.num_dofs(), clip.body_names().len());
    println!();
    println!("reference body: {}", config.reference_body);
    println!("key bodies:     {}", config.key_body_names.join(", "));
    println!();
    println!("feature terms:");
    for term in provider.encoder().terms() {
        println!(
            "  {term:?}: {}",
            term.dim(provider.encoder().num_dofs(), provider.encoder().num_key_bodies())
        );
    }
    println!();
    println!(
        "feature_dim={}, history={}, observation_dim={}",
        provider.feature_dim(),
        provider.history(),
        provider.observation_dim()
    );
    Ok(())
}

fn run_reference(
    config_path: &Path,
    samples: usize,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let (config, clip) = load(config_path)?;
    let provider = ReferenceMotionProvider::from_config(&config, Arc::clone(&clip), clip.dof_names())?;
    let mut rng = SeedHierarchy::new(seed.unwrap_or(config.seed)).stream_rng(REFERENCE_STREAM);
    let batch = provider.collect_reference(&mut rng, samples);

    let json = serde_json::to_string(&batch)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), samples, "wrote reference batch");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn run_replay(config_path: &Path, steps: usize) -> Result<()> {
    let (config, clip) = load(config_path)?;
    let skeleton = KinematicSkeleton::new(
        config.num_envs,
        clip.dof_names().to_vec(),
        clip.body_names().to_vec(),
    )
    .with_root_body(&config.reference_body)?;

    let mut app = App::new();
    app.add_plugins(AmpPlugin::<KinematicSkeleton>::default());
    app.insert_resource(skeleton);
    insert_amp_resources::<KinematicSkeleton>(&mut app, &config, Arc::clone(&clip))?;
    app.finish();
    app.cleanup();

    // Envs start spread evenly over the clip.
    let offsets: Vec<f64> = (0..config.num_envs)
        .map(|e| clip.duration() * e as f64 / config.num_envs as f64)
        .collect();
    let mut times = offsets.clone();

    for step in 0..steps {
        for (t, offset) in times.iter_mut().zip(&offsets) {
            *t = offset + step as f64 * clip.dt();
        }
        let sampled = clip.sample(&times);
        {
            let mut sim = app.world_mut().resource_mut::<KinematicSkeleton>();
            for e in 0..times.len() {
                let env = EnvId::from_slot(e).context("env index overflow")?;
                sim.write_joint_state(env, sampled.dof_positions(e), sampled.dof_velocities(e));
                for (b, body) in sampled.bodies(e).iter().enumerate() {
                    sim.set_body(env, b, RawBodyState::from_body_state(body));
                }
            }
        }
        app.update();
    }

    let buffer = app.world().resource::<AmpObservationBuffer>();
    let runtime = app.world().resource::<AmpRuntime>();
    let reference = runtime.provider.collect_reference_at(&times);
    let mut max_err = 0.0_f32;
    for e in 0..times.len() {
        let live = buffer.window(EnvId::from_slot(e).context("env index overflow")?);
        for (a, b) in live.iter().zip(reference.row(e)) {
            max_err = max_err.max((a - b).abs());
        }
    }

    println!(
        "replayed {steps} steps over {} envs (clip duration {:.3}s)",
        config.num_envs,
        clip.duration()
    );
    if steps < config.num_amp_observations {
        println!("history not yet full ({steps} < {})", config.num_amp_observations);
    }
    println!("max |live - reference| = {max_err:.6}");
    Ok(())
}

fn run_convert(input: &Path, output: &Path) -> Result<()> {
    let clip = MotionClip::load(input).with_context(|| format!("loading {}", input.display()))?;
    clip.save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), "converted motion archive");
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { config } => run_inspect(&config),
        Commands::Reference {
            config,
            samples,
            seed,
            output,
        } => run_reference(&config, samples, seed, output.as_deref()),
        Commands::Replay { config, steps } => run_replay(&config, steps),
        Commands::Convert { input, output } => run_convert(&input, &output),
    }
}
