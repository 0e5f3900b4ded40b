use super::FrameReporter;
use crate::clock::Timestamp;
use crate::event_metrics::{EventMetrics, EventType, ScrollUpdateData};
use crate::sinks::{PresentationData, ScrollDeltasAnnotation, ScrollUpdateSample, TraceArgs};

type ScrollUpdate<'a> = (&'a EventMetrics, &'a ScrollUpdateData);

fn sample((event, update): ScrollUpdate<'_>) -> ScrollUpdateSample {
    ScrollUpdateSample {
        event_type: event.event_type,
        generated: event.generated_timestamp(),
        delta: update.delta,
        predicted_delta: update.predicted_delta,
        coalesced_event_count: update.coalesced_event_count,
        did_scroll: update.did_scroll,
        trace_id: update.trace_id,
    }
}

impl FrameReporter {
    fn scroll_deltas_annotation(&self, event_count: i32) -> ScrollDeltasAnnotation {
        let mut ret = ScrollDeltasAnnotation {
            trace_ids_in_gpu_frame: Vec::new(),
            segregated_original_deltas_in_gpu_frame_y: Vec::new(),
            segregated_predicted_deltas_in_gpu_frame_y: Vec::new(),
            event_count_in_gpu_frame: event_count,
            original_delta_in_gpu_frame_y: 0.0,
            predicted_delta_in_gpu_frame_y: 0.0,
        };

        for update in self.events_metrics.iter().filter_map(EventMetrics::as_scroll_update) {
            ret.original_delta_in_gpu_frame_y += update.delta;
            ret.predicted_delta_in_gpu_frame_y += update.predicted_delta;

            if let Some(trace_id) = update.trace_id {
                ret.trace_ids_in_gpu_frame.push(trace_id);
                ret.segregated_original_deltas_in_gpu_frame_y
                    .push(update.delta);
                ret.segregated_predicted_deltas_in_gpu_frame_y
                    .push(update.predicted_delta);
            }
        }

        ret
    }

    /// Hands the scroll updates presented by this frame to the scroll jank
    /// trackers.
    pub(super) fn report_scroll_jank_metrics(&self, termination_time: Timestamp) {
        let mut fling_input_count = 0;
        let mut normal_input_count = 0;
        let mut total_predicted_delta = 0.0f32;
        let mut is_scroll_start = false;
        let mut earliest: Option<ScrollUpdate<'_>> = None;
        let mut latest: Option<ScrollUpdate<'_>> = None;
        let mut last_coalesced_ts: Option<Timestamp> = None;

        for event in &self.events_metrics {
            let Some(update) = event.as_scroll_update() else {
                continue;
            };
            total_predicted_delta += update.predicted_delta;

            let generated = event.generated_timestamp();
            if earliest.map_or(true, |(e, _)| generated < e.generated_timestamp()) {
                earliest = Some((event, update));
            }

            match event.event_type {
                EventType::FirstGestureScrollUpdate => {
                    is_scroll_start = true;
                    normal_input_count += update.coalesced_event_count;
                }
                EventType::GestureScrollUpdate => normal_input_count += update.coalesced_event_count,
                EventType::InertialGestureScrollUpdate => fling_input_count += update.coalesced_event_count,
                _ => {}
            }

            if latest.map_or(true, |(l, _)| generated > l.generated_timestamp())
                && (update.did_scroll || is_scroll_start)
            {
                latest = Some((event, update));
            }

            last_coalesced_ts = Some(
                last_coalesced_ts.map_or(update.last_timestamp, |ts| ts.max(update.last_timestamp)),
            );
        }

        let (Some(earliest), Some(latest)) = (earliest, latest) else {
            return;
        };

        if is_scroll_start {
            if let Some(predictor) = &self.trackers.predictor_jank_tracker {
                predictor.reset_current_scroll_reporting();
            }
            if let Some(dropped) = &self.trackers.scroll_jank_dropped_frame_tracker {
                dropped.on_scroll_started();
            }
        }

        let presentation_ts = self.viz_breakdown.presentation_feedback.timestamp;

        if let Some(trace) = self.trackers.trace_enabled() {
            let annotation = self.scroll_deltas_annotation(fling_input_count + normal_input_count);
            trace.instant(
                "PresentedFrameInformation",
                presentation_ts.unwrap_or(termination_time),
                TraceArgs::ScrollDeltas(annotation),
            );
        }

        if let Some(predictor) = &self.trackers.predictor_jank_tracker {
            predictor.report_latest_scroll_delta(
                total_predicted_delta,
                presentation_ts,
                self.args.interval,
                latest.1.trace_id,
            );
        }

        if let Some(dropped) = &self.trackers.scroll_jank_dropped_frame_tracker {
            dropped.report_latest_presentation_data(&PresentationData {
                earliest: sample(earliest),
                latest: sample(latest),
                last_coalesced_ts: last_coalesced_ts.unwrap_or(latest.0.generated_timestamp()),
                presentation_ts,
                interval: self.args.interval,
            });
        }
    }
}
