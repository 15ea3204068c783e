//! Alert events and patrol reports.
//!
//! The zone monitor's alert is level-triggered. `AlertRecorder` turns it into
//! one `AlertEvent` per episode: an event is created on the tick where the
//! alert goes from false to true, and the recorder re-arms only after the
//! alert drops back to false.

mod generator;

#[cfg(feature = "report-http")]
pub use generator::ChatCompletionGenerator;
pub use generator::{create_generator, TemplateGenerator, TextGenerator};

use crate::fusion::ZoneDecision;
use crate::{AlertEvent, Distance, PatrolReport, Target};

const EVENT_SYSTEM_PROMPT: &str = "You are a site patrol system. Describe the patrol event in \
one concise, professional sentence. Do not use the first person and do not add information \
that is not given.";
const SUMMARY_SYSTEM_PROMPT: &str = "You are a site patrol system. Summarize the patrol from the \
event records below in at most 120 words.";
const NO_EVENTS_SUMMARY: &str = "No notable anomalies were found during this patrol.";

// ----------------------------------------------------------------------------
// AlertRecorder
// ----------------------------------------------------------------------------

pub struct AlertRecorder {
    zone_name: String,
    watched_class: String,
    previous_alert: bool,
    events: Vec<AlertEvent>,
    start_time: Option<f64>,
    end_time: Option<f64>,
}

impl AlertRecorder {
    pub fn new(zone_name: impl Into<String>, watched_class: impl Into<String>) -> Self {
        Self {
            zone_name: zone_name.into(),
            watched_class: watched_class.into(),
            previous_alert: false,
            events: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }

    /// Observe one tick. Returns the new event when the alert was just raised.
    pub fn record(
        &mut self,
        targets: &[Target],
        decision: &ZoneDecision,
        timestamp: f64,
    ) -> Option<&mut AlertEvent> {
        self.start_time.get_or_insert(timestamp);
        self.end_time = Some(timestamp);

        let raised = decision.alert && !self.previous_alert;
        self.previous_alert = decision.alert;
        if !raised {
            return None;
        }

        let distance = targets
            .iter()
            .filter(|t| t.qualifies(&self.watched_class))
            .filter_map(|t| t.distance.meters())
            .min_by(f64::total_cmp)
            .map(Distance::Meters)
            .unwrap_or(Distance::Undefined);

        self.events.push(AlertEvent {
            timestamp,
            class_name: self.watched_class.clone(),
            distance,
            zone_name: self.zone_name.clone(),
            dwell_s: decision.dwell_s,
            narration: None,
        });
        self.events.last_mut()
    }

    /// Close the run. The summary text is filled in by [`ReportGenerator::summarize`].
    pub fn finish(self) -> PatrolReport {
        PatrolReport {
            events: self.events,
            start_time: self.start_time.unwrap_or(0.0),
            end_time: self.end_time.unwrap_or(0.0),
            summary_text: String::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// ReportGenerator
// ----------------------------------------------------------------------------

pub struct ReportGenerator {
    generator: Box<dyn TextGenerator>,
}

impl ReportGenerator {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn event_prompt(event: &AlertEvent) -> String {
        let distance = match event.distance {
            Distance::Meters(m) => format!("about {:.1} m away", m),
            Distance::Undefined => "at an unknown distance".to_string(),
        };
        format!(
            "At {:.1} s, a {} was found in zone {} {}, staying in the zone for about {:.1} s.",
            event.timestamp, event.class_name, event.zone_name, distance, event.dwell_s
        )
    }

    pub fn describe_event(&self, event: &AlertEvent) -> String {
        let user_prompt = format!(
            "Write a one-sentence event description from this record:\n{}",
            Self::event_prompt(event)
        );
        self.generator.generate(EVENT_SYSTEM_PROMPT, &user_prompt)
    }

    pub fn summarize(&self, mut report: PatrolReport) -> PatrolReport {
        if report.events.is_empty() {
            report.summary_text = NO_EVENTS_SUMMARY.to_string();
            return report;
        }
        let events_block = report
            .events
            .iter()
            .map(Self::event_prompt)
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = format!(
            "Events recorded during this patrol; give an overall summary:\n{}",
            events_block
        );
        report.summary_text = self.generator.generate(SUMMARY_SYSTEM_PROMPT, &user_prompt);
        report
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(Box::new(TemplateGenerator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;
    use std::sync::{Arc, Mutex};

    fn person(in_zone: bool, distance: Distance) -> Target {
        Target {
            class_name: "person".to_string(),
            distance,
            in_danger_zone: in_zone,
            bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
            timestamp: 0.0,
        }
    }

    fn decision(alert: bool, dwell_s: f64) -> ZoneDecision {
        ZoneDecision { alert, dwell_s }
    }

    struct CountingGenerator {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TextGenerator for CountingGenerator {
        fn generate(&self, _system_prompt: &str, user_prompt: &str) -> String {
            self.calls.lock().unwrap().push(user_prompt.to_string());
            "summary".to_string()
        }
    }

    #[test]
    fn one_event_per_alert_episode() {
        let mut recorder = AlertRecorder::new("gate", "person");
        let t = [person(true, Distance::Meters(4.0))];

        assert!(recorder.record(&t, &decision(false, 0.0), 0.0).is_none());
        assert!(recorder.record(&t, &decision(true, 2.0), 2.0).is_some());
        assert!(recorder.record(&t, &decision(true, 3.0), 3.0).is_none());
        assert!(recorder.record(&[], &decision(false, 0.0), 4.0).is_none());
        assert!(recorder.record(&t, &decision(true, 0.0), 5.0).is_some());

        let report = recorder.finish();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].dwell_s, 2.0);
        assert_eq!(report.events[0].zone_name, "gate");
        assert_eq!(report.start_time, 0.0);
        assert_eq!(report.end_time, 5.0);
    }

    #[test]
    fn event_distance_is_nearest_qualifying_target() {
        let mut recorder = AlertRecorder::new("gate", "person");
        let targets = [
            person(true, Distance::Undefined),
            person(true, Distance::Meters(6.0)),
            person(true, Distance::Meters(3.5)),
            person(false, Distance::Meters(1.0)),
        ];
        let event = recorder.record(&targets, &decision(true, 1.0), 1.0).unwrap();
        assert_eq!(event.distance, Distance::Meters(3.5));
    }

    #[test]
    fn event_distance_undefined_without_range_data() {
        let mut recorder = AlertRecorder::new("gate", "person");
        let event = recorder
            .record(&[person(true, Distance::Undefined)], &decision(true, 1.0), 1.0)
            .unwrap();
        assert_eq!(event.distance, Distance::Undefined);
        assert!(ReportGenerator::event_prompt(event).contains("unknown distance"));
    }

    #[test]
    fn event_prompt_formats_one_decimal() {
        let event = AlertEvent {
            timestamp: 12.345,
            class_name: "person".to_string(),
            distance: Distance::Meters(7.26),
            zone_name: "dock".to_string(),
            dwell_s: 3.04,
            narration: None,
        };
        let prompt = ReportGenerator::event_prompt(&event);
        assert!(prompt.contains("12.3 s"), "{prompt}");
        assert!(prompt.contains("about 7.3 m"), "{prompt}");
        assert!(prompt.contains("about 3.0 s"), "{prompt}");
        assert!(prompt.contains("zone dock"), "{prompt}");
    }

    #[test]
    fn empty_report_skips_generator() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let reporter = ReportGenerator::new(Box::new(CountingGenerator {
            calls: calls.clone(),
        }));
        let report = reporter.summarize(PatrolReport::default());
        assert_eq!(report.summary_text, NO_EVENTS_SUMMARY);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn summary_lists_every_event() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let reporter = ReportGenerator::new(Box::new(CountingGenerator {
            calls: calls.clone(),
        }));
        let mut recorder = AlertRecorder::new("gate", "person");
        let t = [person(true, Distance::Meters(2.0))];
        recorder.record(&t, &decision(true, 1.0), 1.0);
        recorder.record(&[], &decision(false, 0.0), 2.0);
        recorder.record(&t, &decision(true, 1.0), 3.0);

        let report = reporter.summarize(recorder.finish());
        assert_eq!(report.summary_text, "summary");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].lines().count(), 3);
    }
}
