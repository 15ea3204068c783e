use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::pipeline::{Control, FrameSink, LogSink, TickOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Sink for the replay loop: a progress bar on a TTY, log lines otherwise.
    pub fn replay_sink(&self, total_frames: usize) -> ReplaySink {
        if !self.use_pretty() {
            return ReplaySink::Log(LogSink);
        }
        let bar = ProgressBar::new(total_frames as u64);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        ReplaySink::Progress(bar)
    }
}

pub enum ReplaySink {
    Log(LogSink),
    Progress(ProgressBar),
}

impl FrameSink for ReplaySink {
    fn render(&mut self, frame: &Frame, tick: &TickOutcome) -> Control {
        match self {
            ReplaySink::Log(sink) => sink.render(frame, tick),
            ReplaySink::Progress(bar) => {
                bar.inc(1);
                let status = if tick.decision.alert { "ALERT" } else { "NORMAL" };
                bar.set_message(format!(
                    "t={:.2}s targets={} dwell={:.1}s {}",
                    tick.timestamp,
                    tick.targets.len(),
                    tick.decision.dwell_s,
                    status
                ));
                if let Some(event) = &tick.new_event {
                    bar.println(format!(
                        "ALERT {} in {} at t={:.1}s ({})",
                        event.class_name, event.zone_name, event.timestamp, event.distance
                    ));
                }
                Control::Continue
            }
        }
    }
}

impl Drop for ReplaySink {
    fn drop(&mut self) {
        if let ReplaySink::Progress(bar) = self {
            bar.finish();
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_or_no_tty_uses_log_sink() {
        let ui = Ui::from_args(Some("plain"), true);
        assert!(matches!(ui.replay_sink(3), ReplaySink::Log(_)));
        let ui = Ui::from_args(Some("pretty"), false);
        assert!(matches!(ui.replay_sink(3), ReplaySink::Log(_)));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
