//! Histogram emission.
//!
//! Names follow `CompositorLatency2[.<Tracker>].<Stage>[.<Breakdown>]` for
//! stage latencies and `EventLatency.<Event>[.<Device>].<Metric>` for input.

use super::{FrameReporter, ProcessedBreakdowns};
use crate::clock::{as_micros, signed_delta, signed_micros, Duration};
use crate::event_metrics::{DispatchStage, EventMetrics, EventType, ScrollType};
use crate::sinks::{FrameReportType, HistogramBucketing, HistogramSink, LatencyData};
use crate::stage::{StageData, StageType};
use crate::trackers::FrameSequenceTrackerType;

/// Stage latencies, in microseconds.
pub const COMPOSITOR_LATENCY_BUCKETING: HistogramBucketing = HistogramBucketing {
    min: 1,
    max: 350_000,
    count: 50,
    version_suffix: "",
};

/// Default range of event latencies, in microseconds.
pub const EVENT_LATENCY_BUCKETING: HistogramBucketing = HistogramBucketing {
    min: 1,
    max: 5_000_000,
    count: 100,
    version_suffix: "",
};

/// Percent of a vsync interval.
const VSYNC_RATIO_BUCKETING: HistogramBucketing = HistogramBucketing {
    min: 1,
    max: 100,
    count: 101,
    version_suffix: "",
};

const PAINT_AREA_BUCKETING: HistogramBucketing = HistogramBucketing {
    min: 0,
    max: 600_001,
    count: 50,
    version_suffix: "",
};

const PAINT_AREA_SCALE: f32 = 100_000.0;

/// Builds a compositor latency histogram name. `None` as tracker is the
/// general histogram.
///
/// ```
/// use frame_reporter::reporter::compositor_latency_histogram_name;
/// use frame_reporter::stage::StageType;
/// use frame_reporter::trackers::FrameSequenceTrackerType;
///
/// assert_eq!(
///     compositor_latency_histogram_name(None, StageType::Commit, None),
///     "CompositorLatency2.Commit"
/// );
/// assert_eq!(
///     compositor_latency_histogram_name(
///         Some(FrameSequenceTrackerType::WheelScroll),
///         StageType::SendBeginMainFrameToCommit,
///         Some("Animate"),
///     ),
///     "CompositorLatency2.WheelScroll.SendBeginMainFrameToCommit.Animate"
/// );
/// ```
pub fn compositor_latency_histogram_name(
    tracker: Option<FrameSequenceTrackerType>,
    stage: StageType,
    breakdown: Option<&str>,
) -> String {
    let mut name = String::from("CompositorLatency2.");
    if let Some(t) = tracker {
        name.push_str(t.name());
        name.push('.');
    }
    name.push_str(stage.name());
    if let Some(b) = breakdown {
        name.push('.');
        name.push_str(b);
    }
    name
}

fn report_compositor_sample(sink: &dyn HistogramSink, name: &str, latency: Duration) {
    sink.add_sample(name, Some(&COMPOSITOR_LATENCY_BUCKETING), as_micros(latency));
}

fn report_stage_with_breakdown(
    sink: &dyn HistogramSink,
    processed: &ProcessedBreakdowns,
    stage: &StageData,
    tracker: Option<FrameSequenceTrackerType>,
) {
    let stage_type = stage.stage_type;
    report_compositor_sample(
        sink,
        &compositor_latency_histogram_name(tracker, stage_type, None),
        stage.duration(),
    );

    match stage_type {
        StageType::SendBeginMainFrameToCommit => {
            for (breakdown, latency) in processed.blink.cursor() {
                let name = compositor_latency_histogram_name(tracker, stage_type, Some(breakdown.name()));
                report_compositor_sample(sink, &name, latency);
            }
        }
        StageType::SubmitCompositorFrameToPresentationCompositorFrame => {
            for (breakdown, interval) in processed.viz.cursor(false) {
                let name = compositor_latency_histogram_name(tracker, stage_type, Some(breakdown.name()));
                report_compositor_sample(sink, &name, interval.duration());
            }
        }
        _ => {}
    }
}

/// Records an event latency with the event's own bucketing, and with the
/// default one if it has none or if the metric is a guiding one.
fn report_event_latency_metric(
    sink: &dyn HistogramSink,
    name: &str,
    bucketing: Option<&HistogramBucketing>,
    latency_us: i64,
    guiding: bool,
) {
    if let Some(b) = bucketing {
        sink.add_sample(&format!("{name}{}", b.version_suffix), Some(b), latency_us);
    }
    if bucketing.is_none() || guiding {
        sink.add_sample(name, Some(&EVENT_LATENCY_BUCKETING), latency_us);
    }
}

/// Distance to the vsync as a percentage of the interval.
fn vsync_ratio(delta: i64, interval: Duration) -> i64 {
    (100.0 * delta.unsigned_abs() as f64 / interval as f64).ceil() as i64
}

fn report_vsync_ratio(sink: &dyn HistogramSink, base: &str, metric: &str, delta: i64, interval: Duration) {
    let side = if delta < 0 { "BeforeVSync" } else { "AfterVSync" };
    sink.add_sample(
        &format!("{base}.{metric}.{side}"),
        Some(&VSYNC_RATIO_BUCKETING),
        vsync_ratio(delta, interval),
    );
}

fn report_scroll_dispatch_metrics(
    sink: &dyn HistogramSink,
    base: &str,
    event: &EventMetrics,
    bucketing: Option<&HistogramBucketing>,
) {
    let generated = event.generated_timestamp();
    let args = event
        .scroll_begin_frame_args()
        .filter(|args| args.is_valid());

    if let Some(browser_main) = event.dispatch_stage_timestamp(DispatchStage::ArrivedInBrowserMain) {
        if let Some(b) = bucketing {
            sink.add_sample(
                &format!("{base}.GenerationToBrowserMain"),
                Some(b),
                signed_micros(signed_delta(generated, browser_main)),
            );
        }

        if let Some(args) = args {
            let delta = signed_delta(generated, args.frame_time);
            report_vsync_ratio(sink, base, "GenerationVsVsyncRatio", delta, args.interval);
        }
    }

    if let (Some(args), Some(arrived)) = (
        args,
        event.dispatch_stage_timestamp(DispatchStage::ArrivedInRendererCompositor),
    ) {
        let delta = signed_delta(args.frame_time, arrived);
        report_vsync_ratio(sink, base, "ArrivedInRendererVsVSyncRatio", delta, args.interval);
    }
}

fn report_event_histograms(sink: &dyn HistogramSink, event: &EventMetrics, total_latency: Duration) {
    let base = format!("EventLatency.{}", event.type_name());
    let bucketing = event.histogram_bucketing();
    let latency_us = as_micros(total_latency);

    if event.pinch_type().is_none() {
        report_event_latency_metric(sink, &format!("{base}.TotalLatency"), bucketing, latency_us, false);
    }

    let device = event
        .scroll_type()
        .map(|s| s.name())
        .or_else(|| event.pinch_type().map(|p| p.name()));
    if let Some(device) = device {
        let guiding = event.event_type == EventType::GestureScrollUpdate
            && event.scroll_type() == Some(ScrollType::Touchscreen);
        report_event_latency_metric(
            sink,
            &format!("{base}.{device}.TotalLatency"),
            bucketing,
            latency_us,
            guiding,
        );
    }

    if event.scroll_type().is_some() {
        report_scroll_dispatch_metrics(sink, &base, event, bucketing);
    }

    sink.add_sample("EventLatency.TotalLatency", Some(&EVENT_LATENCY_BUCKETING), latency_us);
}

impl FrameReporter {
    pub(super) fn report_compositor_latency_metrics(&self, processed: &ProcessedBreakdowns) {
        if !self.trackers.sampler.should_sample() {
            return;
        }

        if let Some(ukm) = &self.trackers.latency_ukm {
            ukm.report_compositor_latency(&self.latency_report(processed));
        }

        let Some(sink) = &self.trackers.histograms else {
            return;
        };
        let sink = sink.as_ref();
        let presented = self.report_types.contains(FrameReportType::NonDroppedFrame);

        for stage in self.timeline.history() {
            if presented {
                report_stage_with_breakdown(sink, processed, stage, None);
            }
            for tracker in self.active_trackers.iter() {
                report_stage_with_breakdown(sink, processed, stage, Some(tracker));
            }
        }

        self.report_ipc_thread_metrics(sink);
    }

    /// Latency of the begin-frame trip from the display compositor to this
    /// client, and of the main-thread queue behind it.
    fn report_ipc_thread_metrics(&self, sink: &dyn HistogramSink) {
        let (Some(dispatch), Some(arrival)) = (self.args.dispatch_time, self.args.client_arrival_time) else {
            return;
        };
        let frame_time = self.args.frame_time;
        let bucketing = Some(&COMPOSITOR_LATENCY_BUCKETING);

        let mut vsync_to_dispatch = 0;
        if dispatch > frame_time {
            vsync_to_dispatch = signed_delta(frame_time, dispatch);
            sink.add_sample(
                "CompositorLatency.IpcThread.FrameTimeToDispatch",
                bucketing,
                signed_micros(vsync_to_dispatch),
            );
        }

        let dispatch_to_client = signed_delta(dispatch, arrival);
        sink.add_sample(
            "CompositorLatency.IpcThread.DispatchToRenderer",
            bucketing,
            signed_micros(dispatch_to_client),
        );

        match (self.begin_main_frame_start, self.timeline.blink_start()) {
            (Some(main_start), Some(blink_start)) => {
                let queuing = signed_delta(blink_start, main_start);
                sink.add_sample(
                    "CompositorLatency.IpcThread.BeginMainFrameQueuing",
                    bucketing,
                    signed_micros(queuing),
                );
                sink.add_sample(
                    "CompositorLatency.IpcThread.MainThreadTotalLatency",
                    bucketing,
                    signed_micros(vsync_to_dispatch + dispatch_to_client + queuing),
                );
            }
            _ => sink.add_sample(
                "CompositorLatency.IpcThread.ImplThreadTotalLatency",
                bucketing,
                signed_micros(vsync_to_dispatch + dispatch_to_client),
            ),
        }
    }

    pub(super) fn report_event_latency_metrics(&self, processed: &ProcessedBreakdowns) {
        let Some(total) = self.timeline.total_latency() else {
            return;
        };
        let end = total.end();

        if let Some(ukm) = &self.trackers.latency_ukm {
            ukm.report_event_latency(&self.events_metrics, &self.latency_report(processed));
        }

        let mut latencies = Vec::new();
        for event in &self.events_metrics {
            let total_latency = end.saturating_sub(event.generated_timestamp());

            if let Some(sink) = &self.trackers.histograms {
                report_event_histograms(sink.as_ref(), event, total_latency);
            }

            if self.trackers.event_latency_tracker.is_some() {
                latencies.push(LatencyData {
                    event_type: event.event_type,
                    total_latency,
                    input_type: event.input_type(),
                });
            }
        }

        if let Some(tracker) = &self.trackers.event_latency_tracker {
            if !latencies.is_empty() {
                tracker.report_event_latency(latencies);
            }
        }
    }

    pub(super) fn report_paint_metric(&self, normalized_invalidated_area: f32) {
        if normalized_invalidated_area == 0.0 {
            return;
        }
        if let Some(sink) = &self.trackers.histograms {
            sink.add_sample(
                "Graphics.Paint.UI.NormalizedInvalidatedArea",
                Some(&PAINT_AREA_BUCKETING),
                (normalized_invalidated_area * PAINT_AREA_SCALE) as i64,
            );
        }
    }
}
