//! Kinetic CLI
//!
//! Headless front end for the motion engine:
//! - `spring` / `tween` sample a single trajectory
//! - `carousel` shows where a swipe release lands
//! - `scenario` runs a scripted JSON scenario and checks its assertions
//! - `config` prints the default engine configuration

mod scenario;
mod simulate;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kinetic_motion::{Easing, EngineConfig, TransitionSpec};
use scenario::Scenario;
use serde::Serialize;
use simulate::{CarouselLayout, Trace};
use std::path::PathBuf;
use tracing::Level;

/// Simulate motion trajectories and run headless scenarios
#[derive(Parser, Debug)]
#[command(name = "kinetic")]
#[command(about = "Simulate motion trajectories and run headless motion scenarios")]
#[command(version)]
struct Cli {
    /// Engine config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample a spring from one value to another
    Spring {
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        from: f32,

        #[arg(long, default_value_t = 100.0, allow_hyphen_values = true)]
        to: f32,

        /// Perceived duration in seconds
        #[arg(long, default_value_t = 0.3)]
        visual_duration: f32,

        /// 0 for no overshoot, toward 1 for more
        #[arg(long, default_value_t = 0.15)]
        bounce: f32,

        /// Use physical parameters instead of duration and bounce
        #[arg(long, requires = "damping")]
        stiffness: Option<f32>,

        #[arg(long, requires = "stiffness")]
        damping: Option<f32>,

        #[arg(long, default_value_t = 1.0)]
        mass: f32,

        #[arg(long, default_value_t = 60)]
        fps: u32,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 10.0)]
        max_secs: f32,
    },

    /// Sample an eased tween
    Tween {
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        from: f32,

        #[arg(long, default_value_t = 100.0, allow_hyphen_values = true)]
        to: f32,

        /// Duration in seconds
        #[arg(long, default_value_t = 0.3)]
        duration: f32,

        /// linear, easeIn, easeOut or easeInOut
        #[arg(long, default_value = "easeInOut")]
        easing: String,

        #[arg(long, default_value_t = 60)]
        fps: u32,
    },

    /// Decide which card a carousel release settles on
    Carousel {
        /// Drag offset at release, px
        #[arg(long, allow_hyphen_values = true)]
        offset: f32,

        /// Release velocity, px/s
        #[arg(long, allow_hyphen_values = true)]
        velocity: f32,

        /// Card the drag started on
        #[arg(long, default_value_t = 0)]
        index: usize,

        #[arg(long, default_value_t = 5)]
        cards: usize,

        #[arg(long, default_value_t = 240.0)]
        card_width: f32,

        #[arg(long, default_value_t = 16.0)]
        gap: f32,
    },

    /// Run a JSON scenario file
    Scenario {
        file: PathBuf,
    },

    /// Print the engine configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            EngineConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Spring {
            from,
            to,
            visual_duration,
            bounce,
            stiffness,
            damping,
            mass,
            fps,
            max_secs,
        } => {
            let spec = match (stiffness, damping) {
                (Some(stiffness), Some(damping)) => {
                    TransitionSpec::physics(stiffness, damping, mass)
                }
                _ => TransitionSpec::spring(visual_duration, bounce),
            };
            let trace = simulate::trajectory(&config, spec, from, to, fps, max_secs)?;
            print_trace(&trace, cli.json)
        }
        Commands::Tween {
            from,
            to,
            duration,
            easing,
            fps,
        } => {
            let easing: Easing = serde_json::from_value(serde_json::Value::String(easing.clone()))
                .with_context(|| format!("Unknown easing '{easing}'"))?;
            let spec = TransitionSpec::tween(duration, easing);
            let trace = simulate::trajectory(&config, spec, from, to, fps, duration * 2.0 + 1.0)?;
            print_trace(&trace, cli.json)
        }
        Commands::Carousel {
            offset,
            velocity,
            index,
            cards,
            card_width,
            gap,
        } => {
            let layout = CarouselLayout {
                card_width,
                gap,
                cards,
                index,
            };
            let decision = simulate::carousel_release(layout, offset, velocity)?;
            if cli.json {
                return print_json(&decision);
            }
            println!(
                "card {} -> {} (track offset {:.1}, step {:.1})",
                decision.from_index, decision.index, decision.target, decision.step
            );
            Ok(())
        }
        Commands::Scenario { file } => {
            let scenario = Scenario::load(&file)?;
            let outcome = scenario::run(&scenario, config)
                .with_context(|| format!("Scenario {} aborted", file.display()))?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                for failure in &outcome.failures {
                    println!("FAIL {failure}");
                }
                println!(
                    "{} passed, {} failed in {} frames ({:.3}s)",
                    outcome.passed,
                    outcome.failures.len(),
                    outcome.frames,
                    outcome.time
                );
            }
            if !outcome.is_success() {
                bail!("{} assertion(s) failed", outcome.failures.len());
            }
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_trace(trace: &Trace, json: bool) -> Result<()> {
    if json {
        return print_json(trace);
    }
    println!("{:>8}  {:>12}  {:>12}", "t", "value", "velocity");
    for sample in &trace.samples {
        println!(
            "{:>8.4}  {:>12.4}  {:>12.4}",
            sample.t, sample.value, sample.velocity
        );
    }
    match trace.settled_at {
        Some(at) => println!("settled at {at:.3}s, overshoot {:.3}", trace.overshoot),
        None => println!("did not settle, overshoot {:.3}", trace.overshoot),
    }
    Ok(())
}
