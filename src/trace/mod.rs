//! Replay traces.
//!
//! A replay trace records, in order, every operation a pipeline driver
//! issued on its frame reporters. Reporters are named by an id chosen by the
//! recorder; each record carries the time it happened at, which drives the
//! replay clock. Traces are stored as a JSON array with one record per line:
//!
//! ```text
//! [
//! {"ts": 1000, "reporter": 1, "op": "begin", "args": {"frame_id": {"source_id": 1, "sequence_number": 1}, "frame_time": 1000, "interval": 16666666}},
//! {"ts": 1000, "reporter": 1, "op": "start_stage", "stage": "BeginImplFrameToSendBeginMainFrame"},
//! {"ts": 9000, "reporter": 1, "op": "terminate", "status": "PresentedFrame"},
//! {"ts": 9000, "reporter": 1, "op": "release"}
//! ]
//! ```

pub mod reader;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::event_metrics::EventMetrics;
use crate::frame_info::{
    FrameSkippedReason, FrameTerminationStatus, SmoothEffectDrivingThread, SmoothThread,
};
use crate::reporter::FrameReporter;
use crate::stage::StageType;
use crate::timing::{BeginFrameArgs, BeginMainFrameMetrics, FrameTimingDetails};
use crate::trackers::ActiveTrackers;

pub type ReporterId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub ts: Timestamp,
    pub reporter: ReporterId,
    #[serde(flatten)]
    pub op: ReporterOp,
}

impl ReplayEvent {
    pub fn new(ts: Timestamp, reporter: ReporterId, op: ReporterOp) -> Self {
        Self { ts, reporter, op }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReporterOp {
    /// Creates the reporter.
    Begin {
        args: BeginFrameArgs,
        #[serde(default)]
        active_trackers: ActiveTrackers,
        #[serde(default)]
        smooth_thread: SmoothThread,
        #[serde(default)]
        scrolling_thread: SmoothEffectDrivingThread,
    },
    StartStage {
        stage: StageType,
    },
    FinishImplFrame,
    AbortBeginMainFrame,
    DidNotProduceFrame {
        reason: FrameSkippedReason,
    },
    BlinkBreakdown {
        #[serde(default)]
        metrics: BeginMainFrameMetrics,
        #[serde(default)]
        begin_main_start: Option<Timestamp>,
    },
    VizBreakdown {
        details: FrameTimingDetails,
    },
    AddEvents {
        events: Vec<EventMetrics>,
    },
    Flags(ReporterFlags),
    /// Forks the reporter; the fork is named `child`.
    Fork {
        child: ReporterId,
    },
    SetDecider {
        decider: ReporterId,
    },
    Adopt {
        child: ReporterId,
    },
    Terminate {
        status: FrameTerminationStatus,
    },
    /// The driver let go of the reporter.
    Release,
}

/// Reporter flags set by the driver. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterFlags {
    pub has_partial_update: Option<bool>,
    pub is_accompanied_by_main_thread_update: Option<bool>,
    pub want_new_tree: Option<bool>,
    pub created_new_tree: Option<bool>,
    pub invalidate_raster_scroll: Option<bool>,
    pub is_backfill: Option<bool>,
    pub checkerboarded_needs_raster: Option<bool>,
    pub checkerboarded_needs_record: Option<bool>,
    pub normalized_invalidated_area: Option<f32>,
    pub compositor_only: bool,
}

impl ReporterFlags {
    pub fn apply_to(&self, r: &mut FrameReporter) {
        if let Some(v) = self.has_partial_update {
            r.set_has_partial_update(v);
        }
        if let Some(v) = self.is_accompanied_by_main_thread_update {
            r.set_is_accompanied_by_main_thread_update(v);
        }
        if let Some(v) = self.want_new_tree {
            r.set_want_new_tree(v);
        }
        if let Some(v) = self.created_new_tree {
            r.set_created_new_tree(v);
        }
        if let Some(v) = self.invalidate_raster_scroll {
            r.set_invalidate_raster_scroll(v);
        }
        if let Some(v) = self.is_backfill {
            r.set_is_backfill(v);
        }
        if self.checkerboarded_needs_raster.is_some() || self.checkerboarded_needs_record.is_some() {
            r.set_checkerboarded(
                self.checkerboarded_needs_raster.unwrap_or_default(),
                self.checkerboarded_needs_record.unwrap_or_default(),
            );
        }
        if let Some(area) = self.normalized_invalidated_area {
            r.set_normalized_invalidated_area(area);
        }
        if self.compositor_only {
            r.enable_compositor_only_reporting();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let e: ReplayEvent =
            serde_json::from_str(r#"{"ts": 5, "reporter": 2, "op": "start_stage", "stage": "Commit"}"#).unwrap();
        assert_eq!(
            e,
            ReplayEvent::new(5, 2, ReporterOp::StartStage { stage: StageType::Commit })
        );

        let e: ReplayEvent = serde_json::from_str(r#"{"ts": 6, "reporter": 2, "op": "release"}"#).unwrap();
        assert_eq!(e.op, ReporterOp::Release);

        let e: ReplayEvent =
            serde_json::from_str(r#"{"ts": 7, "reporter": 2, "op": "flags", "want_new_tree": true}"#).unwrap();
        let ReporterOp::Flags(flags) = e.op else {
            panic!("not a flags record");
        };
        assert_eq!(flags.want_new_tree, Some(true));
        assert_eq!(flags.created_new_tree, None);
    }

    #[test]
    fn test_parse_begin_defaults() {
        let s = r#"{"ts": 0, "reporter": 1, "op": "begin",
                    "args": {"frame_id": {"source_id": 1, "sequence_number": 4}, "frame_time": 0, "interval": 16}}"#;
        let e: ReplayEvent = serde_json::from_str(s).unwrap();

        let ReporterOp::Begin {
            args,
            active_trackers,
            smooth_thread,
            ..
        } = e.op
        else {
            panic!("not a begin record");
        };
        assert_eq!(args.frame_id.sequence_number, 4);
        assert!(active_trackers.is_empty());
        assert_eq!(smooth_thread, SmoothThread::None);
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let r = serde_json::from_str::<ReplayEvent>(r#"{"ts": 0, "reporter": 1, "op": "explode"}"#);
        assert!(r.is_err());
    }
}
