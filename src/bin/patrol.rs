//! patrol - replay a recorded camera/lidar sequence through the fusion kernel
//!
//! This binary:
//! 1. Loads the TOML configuration (`--config` or `PATROL_CONFIG`)
//! 2. Opens the aligned frame store and the configured inference backend
//! 3. Runs fusion + zone dwell monitoring on every frame, in order
//! 4. Writes the patrol report (alert events + summary) when `--report` is set

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use patrol_fusion::ui::Ui;
use patrol_fusion::{PatrolConfig, Pipeline};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "PATROL_CONFIG")]
    config: Option<PathBuf>,
    /// Write the patrol report as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,
    /// Ignore play_fps and run as fast as possible.
    #[arg(long)]
    unpaced: bool,
    /// Skip per-event narration.
    #[arg(long)]
    no_narration: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        PatrolConfig::load(args.config.as_deref()).context("loading configuration")?
    };
    log::info!(
        "sequence={} backend={} zone={} [{:.2}..{:.2}]x[{:.2}..{:.2}] stay_time={:.1}s",
        cfg.sequence.sequence_root.display(),
        cfg.model.backend,
        cfg.fusion.danger_zone.name,
        cfg.fusion.danger_zone.x_min,
        cfg.fusion.danger_zone.x_max,
        cfg.fusion.danger_zone.y_min,
        cfg.fusion.danger_zone.y_max,
        cfg.alert.stay_time_threshold_s
    );

    let mut pipeline = {
        let _stage = ui.stage("Open sequence + backend");
        Pipeline::from_config(&cfg)?
            .with_max_frames(args.max_frames)
            .with_narration(!args.no_narration)
    };
    if args.unpaced {
        pipeline = pipeline.with_play_interval(0.0);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            stop.store(true, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;
    }

    let total = args
        .max_frames
        .map_or(pipeline.store().len(), |max| max.min(pipeline.store().len()));
    let mut sink = ui.replay_sink(total);
    let summary = pipeline.run(&mut sink, &stop)?;
    drop(sink);

    println!("patrol summary:");
    println!("  frames processed: {}", summary.frames_processed);
    println!("  alert ticks: {}", summary.alert_ticks);
    println!("  alert events: {}", summary.report.events.len());
    for event in &summary.report.events {
        println!(
            "    t={:.1}s {} in {} dwell={:.1}s distance={}",
            event.timestamp, event.class_name, event.zone_name, event.dwell_s, event.distance
        );
        if let Some(narration) = &event.narration {
            println!("      {}", narration);
        }
    }
    if summary.stopped_early {
        println!("  stopped early: yes");
    }
    println!("  summary: {}", summary.report.summary_text);

    if let Some(path) = &args.report {
        let _stage = ui.stage("Write report");
        let json = serde_json::to_vec_pretty(&summary.report)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        println!("  report: {}", path.display());
    }
    Ok(())
}
