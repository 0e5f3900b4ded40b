use super::{FrameReporter, ProcessedBreakdowns, HIGH_LATENCY_MIN};
use crate::clock::{as_micros, signed_delta, Timestamp};
use crate::frame_info::{FrameFinalState, FrameInfo};
use crate::sinks::{FrameReporterAnnotation, FrameState, FrameType, TraceArgs};
use crate::stage::StageType;

fn frame_state(info: &FrameInfo) -> FrameState {
    match info.final_state {
        FrameFinalState::NoUpdateDesired => FrameState::NoUpdateDesired,
        FrameFinalState::Dropped => FrameState::Dropped,
        FrameFinalState::PresentedAll => FrameState::PresentedAll,
        FrameFinalState::PresentedPartialOldMain | FrameFinalState::PresentedPartialNewMain => {
            FrameState::PresentedPartial
        }
    }
}

impl FrameReporter {
    fn frame_reporter_annotation(&self, info: &FrameInfo, termination_time: Timestamp) -> FrameReporterAnnotation {
        let frame_type = if self.is_forked {
            Some(FrameType::Forked)
        } else if self.is_backfill {
            Some(FrameType::Backfill)
        } else {
            None
        };

        FrameReporterAnnotation {
            state: frame_state(info),
            frame_source: self.args.frame_id.source_id,
            frame_sequence: self.args.frame_id.sequence_number,
            layer_tree_host_id: self.layer_tree_host_id,
            has_missing_content: info.checkerboarded_needs_raster || info.checkerboarded_needs_record,
            checkerboarded_needs_raster: info.checkerboarded_needs_raster,
            checkerboarded_needs_record: info.checkerboarded_needs_record,
            affects_smoothness: info.is_dropped_affecting_smoothness(),
            scroll_state: info.scroll_thread,
            has_main_animation: self.active_trackers.has_main_thread_animation(),
            has_compositor_animation: self.active_trackers.has_compositor_thread_animation(),
            has_smooth_input_main: self.events_metrics.iter().any(|e| e.has_smooth_input_event),
            has_high_latency: signed_delta(self.args.frame_time, termination_time) > HIGH_LATENCY_MIN as i64,
            frame_type,
            surface_frame_trace_id: self.args.trace_id,
            display_trace_id: self.viz_breakdown.presentation_feedback.display_trace_id,
        }
    }

    /// Emits the frame as a `PipelineReporter` span with one nested span per
    /// stage, and per display-compositor breakdown.
    pub(super) fn report_compositor_latency_trace_events(
        &self,
        info: &FrameInfo,
        processed: &ProcessedBreakdowns,
        termination_time: Timestamp,
    ) {
        if self.timeline.history().is_empty() {
            return;
        }

        if info.is_dropped_affecting_smoothness() {
            tracing::debug!(
                layer_tree_host_id = self.layer_tree_host_id,
                sequence = self.args.frame_id.sequence_number,
                frame_time = self.args.frame_time,
                "dropped frame affects smoothness"
            );
        }

        let Some(trace) = self.trackers.trace_enabled() else {
            return;
        };

        let track = trace.next_track_id();
        let annotation = self.frame_reporter_annotation(info, termination_time);
        trace.begin(
            track,
            "PipelineReporter",
            self.args.frame_time,
            TraceArgs::FrameReporter(Box::new(annotation)),
        );

        for stage in self.timeline.history() {
            if stage.start() >= termination_time {
                break;
            }
            if stage.interval.is_empty() {
                continue;
            }

            let args = if stage.stage_type == StageType::SendBeginMainFrameToCommit {
                TraceArgs::BlinkBreakdown(
                    processed
                        .blink
                        .cursor()
                        .map(|(b, latency)| (b.trace_field(), as_micros(latency)))
                        .collect(),
                )
            } else {
                TraceArgs::None
            };
            trace.begin(track, stage.stage_type.name(), stage.start(), args);

            if stage.stage_type == StageType::SubmitCompositorFrameToPresentationCompositorFrame {
                for (breakdown, interval) in processed.viz.cursor(true) {
                    if interval.is_empty() {
                        continue;
                    }
                    trace.begin(track, breakdown.trace_name(), interval.start(), TraceArgs::None);
                    trace.end(track, interval.end());
                }
            }

            trace.end(track, stage.end());
        }

        trace.end(track, termination_time);
    }

    /// One `EventLatency` span per input event, from its generation to the
    /// frame termination.
    pub(super) fn report_event_latency_trace_events(&self, termination_time: Timestamp) {
        let Some(trace) = self.trackers.trace_enabled() else {
            return;
        };

        for event in &self.events_metrics {
            let track = trace.next_track_id();
            trace.begin(
                track,
                "EventLatency",
                event.generated_timestamp(),
                TraceArgs::EventLatency {
                    event_type: event.event_type,
                },
            );
            trace.end(track, termination_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::NANOS_PER_MILLI;
    use crate::event_metrics::{EventMetrics, EventType};
    use crate::frame_info::FrameTerminationStatus;
    use crate::recorder::TraceRecord;
    use crate::reporter::tests::Fixture;
    use crate::sinks::TraceArgs;
    use crate::stage::StageType;
    use crate::timing::{FrameTimingDetails, SwapTimings};

    const MS: u64 = NANOS_PER_MILLI;

    #[test]
    fn test_pipeline_spans_nest() {
        let fx = Fixture::new();
        let r = fx.reporter(1, 0);
        {
            let mut m = r.borrow_mut();
            m.start_stage(StageType::BeginImplFrameToSendBeginMainFrame, 0);
            m.start_stage(StageType::Commit, 2 * MS);
            m.start_stage(StageType::EndCommitToActivation, 3 * MS);
            m.start_stage(StageType::Activation, 3 * MS);
            m.start_stage(StageType::SubmitCompositorFrameToPresentationCompositorFrame, 4 * MS);
            m.set_viz_breakdown(FrameTimingDetails {
                received_compositor_frame_timestamp: Some(5 * MS),
                draw_start_timestamp: Some(6 * MS),
                swap_timings: Some(SwapTimings {
                    swap_start: 7 * MS,
                    swap_end: 8 * MS,
                }),
                ..FrameTimingDetails::default()
            });
            m.add_events_metrics([EventMetrics::new(EventType::MousePressed, 0)]);
            m.terminate_frame(FrameTerminationStatus::PresentedFrame, 10 * MS);
        }
        drop(r);

        let spans = fx.recorders.trace.spans();
        let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "PipelineReporter",
                "BeginImplFrameToSendBeginMainFrame",
                "Commit",
                "Activation",
                "SubmitCompositorFrameToPresentationCompositorFrame",
                "SubmitToReceiveCompositorFrame",
                "ReceiveCompositorFrameToStartDraw",
                "StartDrawToSwapStart",
                "Swap",
                "EventLatency",
            ]
        );

        let pipeline = &spans[0];
        assert_eq!((pipeline.start, pipeline.end, pipeline.depth), (0, 10 * MS, 0));
        assert!(spans[1..9].iter().all(|s| s.track == pipeline.track));
        assert_eq!(spans[5].depth, 2);
        assert_eq!((spans[8].start, spans[8].end), (7 * MS, 8 * MS));

        let event = &spans[9];
        assert_ne!(event.track, pipeline.track);
        assert_eq!((event.start, event.end), (0, 10 * MS));
    }

    #[test]
    fn test_forked_annotation() {
        let fx = Fixture::new();
        let parent = fx.reporter(1, 0);
        {
            let mut m = parent.borrow_mut();
            m.start_stage(StageType::BeginImplFrameToSendBeginMainFrame, 0);
            m.start_stage(StageType::SendBeginMainFrameToCommit, MS);
            m.on_finish_impl_frame(2 * MS);
        }
        let fork = parent
            .borrow_mut()
            .copy_reporter_at_begin_impl_stage()
            .unwrap();
        fork.borrow_mut()
            .terminate_frame(FrameTerminationStatus::PresentedFrame, 100 * MS);
        drop(fork);

        let records = fx.recorders.trace.records();
        let annotation = records
            .iter()
            .find_map(|r| match r {
                TraceRecord::Begin {
                    args: TraceArgs::FrameReporter(a),
                    ..
                } => Some(a.clone()),
                _ => None,
            })
            .unwrap();

        assert_eq!(annotation.frame_type, Some(crate::sinks::FrameType::Forked));
        assert_eq!(annotation.state, crate::sinks::FrameState::PresentedPartial);
        assert!(annotation.has_high_latency);
        drop(parent);
    }
}
