//! Metrics sinks.
//!
//! A reporter never owns its outputs. Everything it emits goes through the
//! traits below, bundled in a `GlobalMetricsTrackers` handed to every
//! reporter at creation. Sinks take `&self` because the same sink is shared
//! by all live reporters; implementations use interior mutability.
//!
//! `crate::recorder` provides in-memory implementations.

use std::fmt::Display;
use std::rc::Rc;

use serde::Serialize;

use crate::breakdown::{ProcessedBlinkBreakdown, ProcessedVizBreakdown};
use crate::clock::{Duration, Timestamp};
use crate::event_metrics::{EventMetrics, EventType, InputType};
use crate::frame_info::{FrameInfo, SmoothEffectDrivingThread};
use crate::stage::StageData;
use crate::timing::BeginFrameArgs;
use crate::trackers::ActiveTrackers;

/// Histogram range, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramBucketing {
    pub min: u64,
    pub max: u64,
    pub count: usize,
    /// Appended to the histogram name when this bucketing is used.
    pub version_suffix: &'static str,
}

pub trait HistogramSink {
    /// Records `sample` in histogram `name`. `None` means the sink's default
    /// range.
    fn add_sample(&self, name: &str, bucketing: Option<&HistogramBucketing>, sample: i64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameReportType {
    NonDroppedFrame,
    MissedDeadlineFrame,
    DroppedFrame,
    CompositorOnlyFrame,
}

impl FrameReportType {
    const ALL: [FrameReportType; 4] = [
        FrameReportType::NonDroppedFrame,
        FrameReportType::MissedDeadlineFrame,
        FrameReportType::DroppedFrame,
        FrameReportType::CompositorOnlyFrame,
    ];
}

/// Set of `FrameReportType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "Vec<FrameReportType>")]
pub struct FrameReportTypes {
    bits: u8,
}

impl FrameReportTypes {
    pub fn insert(&mut self, t: FrameReportType) {
        self.bits |= 1 << t as u8;
    }

    pub fn contains(&self, t: FrameReportType) -> bool {
        self.bits & (1 << t as u8) != 0
    }

    pub fn any(&self) -> bool {
        self.bits != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = FrameReportType> + '_ {
        FrameReportType::ALL.into_iter().filter(|t| self.contains(*t))
    }
}

impl From<FrameReportTypes> for Vec<FrameReportType> {
    fn from(t: FrameReportTypes) -> Self {
        t.iter().collect()
    }
}

/// Everything a structured latency record is built from.
pub struct LatencyReport<'a> {
    pub report_types: FrameReportTypes,
    pub active_trackers: ActiveTrackers,
    pub stages: &'a [StageData],
    pub blink: &'a ProcessedBlinkBreakdown,
    pub viz: &'a ProcessedVizBreakdown,
}

/// Structured per-frame records (UKM-like).
pub trait LatencyUkmSink {
    fn report_compositor_latency(&self, report: &LatencyReport<'_>);
    fn report_event_latency(&self, events: &[EventMetrics], report: &LatencyReport<'_>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameState {
    PresentedAll,
    PresentedPartial,
    NoUpdateDesired,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameType {
    Forked,
    Backfill,
}

/// Annotation of the top-level span of a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReporterAnnotation {
    pub state: FrameState,
    pub frame_source: u64,
    pub frame_sequence: u64,
    pub layer_tree_host_id: i32,
    pub has_missing_content: bool,
    pub checkerboarded_needs_raster: bool,
    pub checkerboarded_needs_record: bool,
    pub affects_smoothness: bool,
    pub scroll_state: SmoothEffectDrivingThread,
    pub has_main_animation: bool,
    pub has_compositor_animation: bool,
    pub has_smooth_input_main: bool,
    pub has_high_latency: bool,
    pub frame_type: Option<FrameType>,
    pub surface_frame_trace_id: Option<i64>,
    pub display_trace_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollDeltasAnnotation {
    pub trace_ids_in_gpu_frame: Vec<i64>,
    pub segregated_original_deltas_in_gpu_frame_y: Vec<f32>,
    pub segregated_predicted_deltas_in_gpu_frame_y: Vec<f32>,
    pub event_count_in_gpu_frame: i32,
    pub original_delta_in_gpu_frame_y: f32,
    pub predicted_delta_in_gpu_frame_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceArgs {
    None,
    FrameReporter(Box<FrameReporterAnnotation>),
    /// Main-thread breakdown, as `(field, microseconds)` pairs.
    BlinkBreakdown(Vec<(&'static str, i64)>),
    ScrollDeltas(ScrollDeltasAnnotation),
    EventLatency { event_type: EventType },
}

/// Nested span sink. Spans on a track must be properly nested.
pub trait TraceSink {
    fn is_enabled(&self) -> bool {
        true
    }

    /// Returns a fresh track id.
    fn next_track_id(&self) -> u64;

    fn begin(&self, track: u64, name: &str, ts: Timestamp, args: TraceArgs);

    fn end(&self, track: u64, ts: Timestamp);

    fn instant(&self, name: &str, ts: Timestamp, args: TraceArgs);
}

/// Receives one result per reporter and orders them by frame.
pub trait FrameSorter {
    /// A reporter was created for `args`.
    fn add_new_frame(&self, args: &BeginFrameArgs);

    /// The reporter created for `args` reached its outcome.
    fn add_frame_result(&self, args: &BeginFrameArgs, info: &FrameInfo);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyData {
    pub event_type: EventType,
    pub total_latency: Duration,
    pub input_type: Option<InputType>,
}

pub trait EventLatencyTracker {
    fn report_event_latency(&self, latencies: Vec<LatencyData>);
}

pub trait PredictorJankTracker {
    fn reset_current_scroll_reporting(&self);

    fn report_latest_scroll_delta(
        &self,
        total_predicted_delta: f32,
        presentation_ts: Option<Timestamp>,
        interval: Duration,
        trace_id: Option<i64>,
    );
}

/// Scroll update summary handed to the scroll jank trackers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrollUpdateSample {
    pub event_type: EventType,
    pub generated: Timestamp,
    pub delta: f32,
    pub predicted_delta: f32,
    pub coalesced_event_count: i32,
    pub did_scroll: bool,
    pub trace_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationData {
    pub earliest: ScrollUpdateSample,
    pub latest: ScrollUpdateSample,
    pub last_coalesced_ts: Timestamp,
    pub presentation_ts: Option<Timestamp>,
    pub interval: Duration,
}

pub trait ScrollJankDroppedFrameTracker {
    fn on_scroll_started(&self);

    fn report_latest_presentation_data(&self, data: &PresentationData);
}

/// Decides whether a subsampled metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSampler {
    probability: f64,
}

impl MetricsSampler {
    pub const DEFAULT_PROBABILITY: f64 = 0.001;

    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn always() -> Self {
        Self::new(1.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn should_sample(&self) -> bool {
        if self.probability >= 1.0 {
            return true;
        }
        if self.probability <= 0.0 {
            return false;
        }
        rand::random::<f64>() < self.probability
    }
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROBABILITY)
    }
}

impl Display for MetricsSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p={}", self.probability)
    }
}

/// Sinks shared by all reporters of a pipeline.
#[derive(Clone)]
pub struct GlobalMetricsTrackers {
    pub frame_sorter: Rc<dyn FrameSorter>,
    pub histograms: Option<Rc<dyn HistogramSink>>,
    pub latency_ukm: Option<Rc<dyn LatencyUkmSink>>,
    pub trace: Option<Rc<dyn TraceSink>>,
    pub event_latency_tracker: Option<Rc<dyn EventLatencyTracker>>,
    pub predictor_jank_tracker: Option<Rc<dyn PredictorJankTracker>>,
    pub scroll_jank_dropped_frame_tracker: Option<Rc<dyn ScrollJankDroppedFrameTracker>>,
    pub sampler: MetricsSampler,
}

impl GlobalMetricsTrackers {
    /// Trackers with only a frame sorter.
    pub fn new(frame_sorter: Rc<dyn FrameSorter>) -> Self {
        Self {
            frame_sorter,
            histograms: None,
            latency_ukm: None,
            trace: None,
            event_latency_tracker: None,
            predictor_jank_tracker: None,
            scroll_jank_dropped_frame_tracker: None,
            sampler: MetricsSampler::default(),
        }
    }

    /// True if some sink consumes latency reports.
    pub fn wants_latency_reports(&self) -> bool {
        self.histograms.is_some() || self.latency_ukm.is_some() || self.event_latency_tracker.is_some()
    }

    pub fn trace_enabled(&self) -> Option<&Rc<dyn TraceSink>> {
        self.trace.as_ref().filter(|t| t.is_enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_types() {
        let mut t = FrameReportTypes::default();
        assert!(!t.any());

        t.insert(FrameReportType::NonDroppedFrame);
        t.insert(FrameReportType::MissedDeadlineFrame);

        assert!(t.contains(FrameReportType::MissedDeadlineFrame));
        assert!(!t.contains(FrameReportType::DroppedFrame));
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            r#"["NonDroppedFrame","MissedDeadlineFrame"]"#
        );
    }

    #[test]
    fn test_sampler_bounds() {
        assert!(MetricsSampler::always().should_sample());
        assert!(!MetricsSampler::new(0.0).should_sample());
        assert_eq!(MetricsSampler::new(3.0).probability(), 1.0);
    }
}
