use std::cell::{Cell, RefCell};

use serde::Serialize;

use crate::clock::{Duration, Timestamp};
use crate::sinks::{
    EventLatencyTracker, LatencyData, PredictorJankTracker, PresentationData,
    ScrollJankDroppedFrameTracker,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollDeltaPrediction {
    pub total_predicted_delta: f32,
    pub presentation_ts: Option<Timestamp>,
    pub interval: Duration,
    pub trace_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JankSummary {
    pub scroll_starts: usize,
    pub predictor_resets: usize,
    pub event_latencies: Vec<LatencyData>,
    pub predictions: Vec<ScrollDeltaPrediction>,
    pub presentations: Vec<PresentationData>,
}

/// Records what the input and scroll jank trackers are handed.
#[derive(Debug, Default)]
pub struct JankRecorder {
    latencies: RefCell<Vec<LatencyData>>,
    predictions: RefCell<Vec<ScrollDeltaPrediction>>,
    presentations: RefCell<Vec<PresentationData>>,
    scroll_starts: Cell<usize>,
    predictor_resets: Cell<usize>,
}

impl JankRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latencies(&self) -> Vec<LatencyData> {
        self.latencies.borrow().clone()
    }

    pub fn predictions(&self) -> Vec<ScrollDeltaPrediction> {
        self.predictions.borrow().clone()
    }

    pub fn presentations(&self) -> Vec<PresentationData> {
        self.presentations.borrow().clone()
    }

    pub fn scroll_starts(&self) -> usize {
        self.scroll_starts.get()
    }

    pub fn predictor_resets(&self) -> usize {
        self.predictor_resets.get()
    }

    pub fn summary(&self) -> JankSummary {
        JankSummary {
            scroll_starts: self.scroll_starts(),
            predictor_resets: self.predictor_resets(),
            event_latencies: self.latencies(),
            predictions: self.predictions(),
            presentations: self.presentations(),
        }
    }
}

impl EventLatencyTracker for JankRecorder {
    fn report_event_latency(&self, latencies: Vec<LatencyData>) {
        self.latencies.borrow_mut().extend(latencies);
    }
}

impl PredictorJankTracker for JankRecorder {
    fn reset_current_scroll_reporting(&self) {
        self.predictor_resets.set(self.predictor_resets.get() + 1);
    }

    fn report_latest_scroll_delta(
        &self,
        total_predicted_delta: f32,
        presentation_ts: Option<Timestamp>,
        interval: Duration,
        trace_id: Option<i64>,
    ) {
        self.predictions
            .borrow_mut()
            .push(ScrollDeltaPrediction {
                total_predicted_delta,
                presentation_ts,
                interval,
                trace_id,
            });
    }
}

impl ScrollJankDroppedFrameTracker for JankRecorder {
    fn on_scroll_started(&self) {
        self.scroll_starts.set(self.scroll_starts.get() + 1);
    }

    fn report_latest_presentation_data(&self, data: &PresentationData) {
        self.presentations.borrow_mut().push(data.clone());
    }
}
