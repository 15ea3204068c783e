//! Tick loop: Frame Store -> inference -> fusion -> zone monitor -> report.
//!
//! Ticks run strictly in frame order, one at a time. The zone monitor is fed
//! in timestamp order because dwell depends on it. Stop and pause requests
//! are only observed between ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::PatrolConfig;
use crate::detect::{create_backend, DetectionSet, DetectorBackend};
use crate::frame::Frame;
use crate::fusion::{FusionEngine, ZoneDecision, ZoneMonitor};
use crate::ingest::FrameStore;
use crate::report::{create_generator, AlertRecorder, ReportGenerator};
use crate::{AlertEvent, PatrolReport, Target};

const PAUSE_POLL: Duration = Duration::from_millis(50);

/// What the sink wants the driver to do after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    TogglePause,
    Quit,
}

/// Everything the core produced for one frame.
#[derive(Clone, Debug)]
pub struct TickOutcome {
    pub index: usize,
    pub timestamp: f64,
    pub detections: DetectionSet,
    pub targets: Vec<Target>,
    pub decision: ZoneDecision,
    /// Set only on the tick where the alert was raised.
    pub new_event: Option<AlertEvent>,
}

/// Consumer of tick results (renderer, recorder, log).
///
/// Sinks are owned by the caller and passed in explicitly; the core never
/// opens windows or other global handles.
pub trait FrameSink {
    fn render(&mut self, frame: &Frame, tick: &TickOutcome) -> Control;

    /// Polled while paused.
    fn idle(&mut self) -> Control {
        Control::Continue
    }
}

/// Sink that writes one structured log line per tick.
#[derive(Default)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn render(&mut self, frame: &Frame, tick: &TickOutcome) -> Control {
        let in_zone = tick.targets.iter().filter(|t| t.in_danger_zone).count();
        log::info!(
            "frame {} t={:.2} {}x{} detections={} in_zone={} dwell={:.1}s status={}",
            tick.index,
            tick.timestamp,
            frame.width(),
            frame.height(),
            tick.detections.detections.len(),
            in_zone,
            tick.decision.dwell_s,
            if tick.decision.alert { "ALERT" } else { "NORMAL" }
        );
        for target in &tick.targets {
            log::debug!(
                "  {} {} zone={} bbox=({:.0},{:.0},{:.0},{:.0})",
                target.class_name,
                target.distance,
                target.in_danger_zone,
                target.bbox.x1,
                target.bbox.y1,
                target.bbox.x2,
                target.bbox.y2
            );
        }
        Control::Continue
    }
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub frames_processed: usize,
    pub alert_ticks: usize,
    pub stopped_early: bool,
    pub report: PatrolReport,
}

pub struct Pipeline {
    store: FrameStore,
    backend: Box<dyn DetectorBackend>,
    engine: FusionEngine,
    monitor: ZoneMonitor,
    recorder: AlertRecorder,
    reporter: ReportGenerator,
    play_interval: Duration,
    max_frames: Option<usize>,
    narrate_events: bool,
}

impl Pipeline {
    /// Assemble a pipeline from parts. `backend` must already be loaded.
    pub fn new(
        store: FrameStore,
        backend: Box<dyn DetectorBackend>,
        engine: FusionEngine,
        monitor: ZoneMonitor,
        reporter: ReportGenerator,
    ) -> Self {
        let recorder = AlertRecorder::new(
            engine.danger_zone().name.clone(),
            monitor.watched_class().to_string(),
        );
        Self {
            store,
            backend,
            engine,
            monitor,
            recorder,
            reporter,
            play_interval: Duration::ZERO,
            max_frames: None,
            narrate_events: true,
        }
    }

    /// Open the sequence, build and load the backend, wire everything from config.
    pub fn from_config(cfg: &PatrolConfig) -> Result<Self> {
        let store = FrameStore::from_config(&cfg.sequence).context("opening frame store")?;
        let mut backend = create_backend(&cfg.model)?;
        backend
            .load()
            .with_context(|| format!("loading {} backend", backend.name()))?;
        log::info!("inference backend: {}", backend.name());

        let engine = FusionEngine::new(cfg.fusion.clone());
        let monitor = ZoneMonitor::with_class(
            cfg.alert.stay_time_threshold_s,
            cfg.alert.watched_class.clone(),
        );
        log::info!(
            "zone monitor: watching '{}' in {}, stay threshold {:.1}s",
            monitor.watched_class(),
            engine.danger_zone().name,
            monitor.threshold_s()
        );
        let reporter = ReportGenerator::new(create_generator(&cfg.report));
        Ok(Self::new(store, backend, engine, monitor, reporter)
            .with_play_interval(cfg.sequence.play_interval_s()))
    }

    pub fn with_play_interval(mut self, seconds: f64) -> Self {
        self.play_interval = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);
        self
    }

    pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Attach generated narration to each new alert event.
    pub fn with_narration(mut self, enabled: bool) -> Self {
        self.narrate_events = enabled;
        self
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Run the core on one frame.
    pub fn process(&mut self, frame: &Frame) -> Result<TickOutcome> {
        let detections = self
            .backend
            .infer(frame)
            .with_context(|| format!("inference on frame {}", frame.index))?;
        let targets = self
            .engine
            .fuse(&detections, &frame.points, frame.height(), frame.width());
        let decision = self.monitor.update(&targets, frame.timestamp);

        let narrate = self.narrate_events;
        let reporter = &self.reporter;
        let new_event = self
            .recorder
            .record(&targets, &decision, frame.timestamp)
            .map(|event| {
                if narrate {
                    let narration = reporter.describe_event(event);
                    event.narration = Some(narration);
                }
                log::warn!(
                    "ALERT t={:.2} {} in {} dwell={:.1}s distance={}",
                    event.timestamp,
                    event.class_name,
                    event.zone_name,
                    event.dwell_s,
                    event.distance
                );
                event.clone()
            });

        Ok(TickOutcome {
            index: frame.index,
            timestamp: frame.timestamp,
            detections,
            targets,
            decision,
            new_event,
        })
    }

    /// Replay the whole sequence (or `max_frames`) through the core.
    pub fn run(mut self, sink: &mut dyn FrameSink, stop: &AtomicBool) -> Result<RunSummary> {
        let limit = self
            .max_frames
            .map_or(self.store.len(), |max| max.min(self.store.len()));
        let mut paused = false;
        let mut frames_processed = 0;
        let mut alert_ticks = 0;
        let mut stopped_early = false;
        let mut index = 0;

        while index < limit {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested after {} frames", frames_processed);
                stopped_early = true;
                break;
            }
            if paused {
                match sink.idle() {
                    Control::Quit => {
                        stopped_early = true;
                        break;
                    }
                    Control::TogglePause => paused = false,
                    Control::Continue => {}
                }
                if paused {
                    std::thread::sleep(PAUSE_POLL.max(self.play_interval));
                    continue;
                }
            }

            let frame = self
                .store
                .get(index)
                .with_context(|| format!("reading frame {}", index))?;
            let outcome = self.process(&frame)?;
            index += 1;
            frames_processed += 1;
            if outcome.decision.alert {
                alert_ticks += 1;
            }

            match sink.render(&frame, &outcome) {
                Control::Quit => {
                    stopped_early = index < limit;
                    break;
                }
                Control::TogglePause => paused = !paused,
                Control::Continue => {}
            }
            drop(frame);

            if !self.play_interval.is_zero() && index < limit {
                std::thread::sleep(self.play_interval);
            }
        }

        let Pipeline {
            recorder, reporter, ..
        } = self;
        let report = reporter.summarize(recorder.finish());
        log::info!(
            "patrol finished: {} frames, {} alert ticks, {} events",
            frames_processed,
            alert_ticks,
            report.events.len()
        );
        Ok(RunSummary {
            frames_processed,
            alert_ticks,
            stopped_early,
            report,
        })
    }
}
