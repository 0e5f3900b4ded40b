use std::collections::HashSet;
use std::rc::Rc;

use super::ReplayError;
use crate::clock::{ManualClock, Timestamp};
use crate::reporter::{FrameReporter, FrameReporterParams, ReporterHandle};
use crate::sinks::GlobalMetricsTrackers;
use crate::trace::{ReplayEvent, ReporterId, ReporterOp};
use crate::utils::Dispatcher;

/// Applies replay records to live reporters.
///
/// The engine holds one handle per reporter id, standing in for the driver
/// that recorded the trace. The clock is set to each record's timestamp
/// before the record is applied.
pub struct ReplayEngine {
    clock: Rc<ManualClock>,
    trackers: GlobalMetricsTrackers,
    layer_tree_host_id: i32,
    reporters: Dispatcher<ReporterId, ReporterHandle>,
    adopted: HashSet<ReporterId>,
    last_ts: Option<Timestamp>,
}

impl ReplayEngine {
    pub fn new(trackers: GlobalMetricsTrackers, layer_tree_host_id: i32) -> Self {
        Self {
            clock: Rc::new(ManualClock::new(0)),
            trackers,
            layer_tree_host_id,
            reporters: Dispatcher::new(),
            adopted: HashSet::new(),
            last_ts: None,
        }
    }

    fn reporter(&self, id: ReporterId) -> Result<&ReporterHandle, ReplayError> {
        self.reporters
            .get(&id)
            .ok_or(ReplayError::UnknownReporter(id))
    }

    fn check_new(&self, id: ReporterId) -> Result<(), ReplayError> {
        if self.reporters.contains(&id) {
            return Err(ReplayError::DuplicateReporter(id));
        }
        Ok(())
    }

    /// Applies one record. A record that fails has no effect.
    pub fn apply(&mut self, event: ReplayEvent) -> Result<(), ReplayError> {
        let ts = event.ts;
        let id = event.reporter;

        if let Some(last) = self.last_ts {
            if ts < last {
                return Err(ReplayError::NonMonotonic { ts, last });
            }
        }
        self.last_ts = Some(ts);
        self.clock.set(ts);

        match event.op {
            ReporterOp::Begin {
                args,
                active_trackers,
                smooth_thread,
                scrolling_thread,
            } => {
                self.check_new(id)?;
                let params = FrameReporterParams {
                    args,
                    active_trackers,
                    smooth_thread,
                    scrolling_thread,
                    layer_tree_host_id: self.layer_tree_host_id,
                };
                let handle = FrameReporter::create(params, self.trackers.clone(), self.clock.clone());
                self.reporters.insert(id, handle);
            }
            ReporterOp::Fork { child } => {
                self.check_new(child)?;
                let fork = self
                    .reporter(id)?
                    .borrow_mut()
                    .copy_reporter_at_begin_impl_stage();
                let fork = fork.ok_or(ReplayError::ForkRefused(id))?;
                self.reporters.insert(child, fork);
            }
            ReporterOp::SetDecider { decider } => {
                let reporter = self.reporter(id)?;
                if !reporter.set_partial_update_decider(self.reporter(decider)?) {
                    return Err(ReplayError::DeciderRefused { reporter: id, decider });
                }
            }
            ReporterOp::Adopt { child } => {
                if self.adopted.contains(&child) {
                    return Err(ReplayError::AlreadyAdopted(child));
                }
                let handle = self.reporter(child)?.clone();
                let adopted = child != id && self.reporter(id)?.borrow_mut().adopt_reporter(handle);
                if !adopted {
                    return Err(ReplayError::AdoptRefused { parent: id, child });
                }
                self.adopted.insert(child);
            }
            ReporterOp::Release => {
                self.reporters
                    .remove(&id)
                    .ok_or(ReplayError::UnknownReporter(id))?;
            }
            op => {
                let mut r = self.reporter(id)?.borrow_mut();
                match op {
                    ReporterOp::StartStage { stage } => r.start_stage(stage, ts),
                    ReporterOp::FinishImplFrame => r.on_finish_impl_frame(ts),
                    ReporterOp::AbortBeginMainFrame => r.on_abort_begin_main_frame(ts),
                    ReporterOp::DidNotProduceFrame { reason } => r.on_did_not_produce_frame(reason),
                    ReporterOp::BlinkBreakdown {
                        metrics,
                        begin_main_start,
                    } => r.set_blink_breakdown(metrics, begin_main_start),
                    ReporterOp::VizBreakdown { details } => r.set_viz_breakdown(details),
                    ReporterOp::AddEvents { events } => r.add_events_metrics(events),
                    ReporterOp::Flags(flags) => flags.apply_to(&mut r),
                    ReporterOp::Terminate { status } => r.terminate_frame(status, ts),
                    ReporterOp::Begin { .. }
                    | ReporterOp::Fork { .. }
                    | ReporterOp::SetDecider { .. }
                    | ReporterOp::Adopt { .. }
                    | ReporterOp::Release => {}
                }
            }
        }

        Ok(())
    }

    /// Releases every reporter still held, in id order.
    pub fn release_all(&mut self) {
        let mut ids: Vec<ReporterId> = self.reporters.keys().copied().collect();
        ids.sort_unstable();

        tracing::debug!(count = ids.len(), "releasing remaining reporters");

        for id in ids {
            self.reporters.remove(&id);
        }
    }

    pub fn live_reporters(&self) -> usize {
        self.reporters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_info::{FrameFinalState, FrameSkippedReason, FrameTerminationStatus};
    use crate::recorder::Recorders;
    use crate::sinks::MetricsSampler;
    use crate::stage::StageType;
    use crate::timing::{BeginFrameArgs, BeginFrameId};

    fn begin(ts: Timestamp, id: ReporterId, sequence: u64) -> ReplayEvent {
        ReplayEvent::new(
            ts,
            id,
            ReporterOp::Begin {
                args: BeginFrameArgs::new(BeginFrameId::new(1, sequence), ts, 16_000_000),
                active_trackers: Default::default(),
                smooth_thread: Default::default(),
                scrolling_thread: Default::default(),
            },
        )
    }

    fn op(ts: Timestamp, id: ReporterId, op: ReporterOp) -> ReplayEvent {
        ReplayEvent::new(ts, id, op)
    }

    #[test]
    fn test_forked_frame_replay() {
        let recorders = Recorders::new();
        let mut engine = ReplayEngine::new(recorders.trackers(MetricsSampler::always()), 1);

        let trace = vec![
            begin(0, 1, 1),
            op(0, 1, ReporterOp::StartStage { stage: StageType::BeginImplFrameToSendBeginMainFrame }),
            op(1_000, 1, ReporterOp::StartStage { stage: StageType::SendBeginMainFrameToCommit }),
            op(2_000, 1, ReporterOp::FinishImplFrame),
            op(2_000, 1, ReporterOp::Fork { child: 2 }),
            op(3_000, 2, ReporterOp::Terminate { status: FrameTerminationStatus::PresentedFrame }),
            op(3_000, 1, ReporterOp::Adopt { child: 2 }),
            op(3_000, 2, ReporterOp::Release),
            op(4_000, 1, ReporterOp::DidNotProduceFrame { reason: FrameSkippedReason::NoDamage }),
            op(4_000, 1, ReporterOp::Terminate { status: FrameTerminationStatus::DidNotProduceFrame }),
        ];
        for e in trace {
            engine.apply(e).unwrap();
        }
        assert_eq!(engine.live_reporters(), 1);

        engine.release_all();
        recorders.frames.flush();

        let frames = recorders.frames.sorted();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].reporters, 2);
        // The fork was presented after the parent cancelled its partial update.
        assert_eq!(frames[0].info.final_state, FrameFinalState::PresentedAll);
    }

    #[test]
    fn test_errors() {
        let recorders = Recorders::new();
        let mut engine = ReplayEngine::new(recorders.trackers(MetricsSampler::always()), 1);

        engine.apply(begin(10, 1, 1)).unwrap();
        assert_eq!(engine.apply(begin(10, 1, 2)), Err(ReplayError::DuplicateReporter(1)));
        assert_eq!(
            engine.apply(op(10, 7, ReporterOp::FinishImplFrame)),
            Err(ReplayError::UnknownReporter(7))
        );
        assert_eq!(
            engine.apply(op(10, 1, ReporterOp::Fork { child: 2 })),
            Err(ReplayError::ForkRefused(1))
        );
        assert_eq!(
            engine.apply(op(10, 1, ReporterOp::Adopt { child: 1 })),
            Err(ReplayError::AdoptRefused { parent: 1, child: 1 })
        );
        assert_eq!(
            engine.apply(op(5, 1, ReporterOp::FinishImplFrame)),
            Err(ReplayError::NonMonotonic { ts: 5, last: 10 })
        );
    }
}
