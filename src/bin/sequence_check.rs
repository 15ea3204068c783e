//! sequence_check - validate a recorded sequence before a patrol run
//!
//! This tool proves:
//! - The image, point-set and timestamp streams line up one-to-one
//! - Timestamps are non-decreasing (dwell times depend on it)
//! - Every frame decodes (with `--decode`)

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use patrol_fusion::ui::Ui;
use patrol_fusion::{FrameStore, PatrolConfig};

#[derive(Parser, Debug)]
#[command(
    name = "sequence_check",
    about = "Check alignment and decodability of a recorded patrol sequence"
)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "PATROL_CONFIG")]
    config: Option<PathBuf>,
    /// Decode every image and point set, not just the listings.
    #[arg(long)]
    decode: bool,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());
    let cfg = PatrolConfig::load(args.config.as_deref()).context("loading configuration")?;

    let store = {
        let _stage = ui.stage("Open sequence");
        FrameStore::from_config(&cfg.sequence)?
    };
    println!(
        "sequence_check: {} frames in {}",
        store.len(),
        cfg.sequence.sequence_root.display()
    );

    let mut regressions = 0usize;
    {
        let _stage = ui.stage("Check timestamps");
        for index in 1..store.len() {
            let (prev, cur) = (store.timestamp(index - 1)?, store.timestamp(index)?);
            if cur < prev {
                regressions += 1;
                println!("  timestamp regression at frame {}: {:.6} < {:.6}", index, cur, prev);
            }
        }
    }
    let last_index = store.len().saturating_sub(1);
    if let (Ok(first), Ok(last)) = (store.timestamp(0), store.timestamp(last_index)) {
        println!(
            "  time span: {:.3}s .. {:.3}s ({:.3}s)",
            first, last, last - first
        );
    }

    if args.decode {
        let _stage = ui.stage("Decode frames");
        let mut points = 0usize;
        for frame in store.frames() {
            let frame = frame?;
            points += frame.points.len();
            if args.verbose {
                println!(
                    "  frame {}: {}x{} points={} t={:.3}",
                    frame.index,
                    frame.width(),
                    frame.height(),
                    frame.points.len(),
                    frame.timestamp
                );
            }
        }
        println!("  decoded {} frames, {} points total", store.len(), points);
    }

    if regressions > 0 {
        return Err(anyhow!("{} timestamp regressions found", regressions));
    }
    println!("  OK");
    Ok(())
}
