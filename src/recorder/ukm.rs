use std::cell::RefCell;

use serde::Serialize;

use crate::clock::Duration;
use crate::event_metrics::{EventMetrics, EventType};
use crate::interval::TimeInterval;
use crate::sinks::{FrameReportTypes, LatencyReport, LatencyUkmSink};
use crate::stage::StageData;
use crate::trackers::ActiveTrackers;

#[derive(Debug, Clone, Serialize)]
pub struct CompositorLatencyRecord {
    pub report_types: FrameReportTypes,
    pub active_trackers: ActiveTrackers,
    pub stages: Vec<StageData>,
    pub blink: Vec<(&'static str, Duration)>,
    pub viz: Vec<(&'static str, TimeInterval)>,
}

impl From<&LatencyReport<'_>> for CompositorLatencyRecord {
    fn from(report: &LatencyReport<'_>) -> Self {
        Self {
            report_types: report.report_types,
            active_trackers: report.active_trackers,
            stages: report.stages.to_vec(),
            blink: report.blink.cursor().map(|(b, d)| (b.name(), d)).collect(),
            viz: report.viz.cursor(false).map(|(b, i)| (b.name(), i)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventLatencyRecord {
    pub event_type: EventType,
    /// From generation to the end of the frame.
    pub total_latency: Option<Duration>,
    pub stages: Vec<StageData>,
}

/// Structured per-frame records.
#[derive(Debug, Default)]
pub struct UkmRecorder {
    compositor_latency: RefCell<Vec<CompositorLatencyRecord>>,
    event_latency: RefCell<Vec<EventLatencyRecord>>,
}

#[derive(Debug, Serialize)]
pub struct UkmSummary {
    pub compositor_latency: Vec<CompositorLatencyRecord>,
    pub event_latency: Vec<EventLatencyRecord>,
}

impl UkmRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compositor_latency(&self) -> Vec<CompositorLatencyRecord> {
        self.compositor_latency.borrow().clone()
    }

    pub fn event_latency(&self) -> Vec<EventLatencyRecord> {
        self.event_latency.borrow().clone()
    }

    pub fn summary(&self) -> UkmSummary {
        UkmSummary {
            compositor_latency: self.compositor_latency(),
            event_latency: self.event_latency(),
        }
    }
}

impl LatencyUkmSink for UkmRecorder {
    fn report_compositor_latency(&self, report: &LatencyReport<'_>) {
        self.compositor_latency
            .borrow_mut()
            .push(report.into());
    }

    fn report_event_latency(&self, events: &[EventMetrics], report: &LatencyReport<'_>) {
        let end = report.stages.last().map(StageData::end);

        let mut records = self.event_latency.borrow_mut();
        for event in events {
            records.push(EventLatencyRecord {
                event_type: event.event_type,
                total_latency: end.map(|end| end.saturating_sub(event.generated_timestamp())),
                stages: report.stages.to_vec(),
            });
        }
    }
}
