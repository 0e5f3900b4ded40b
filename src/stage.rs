//! Frame pipeline stages.
//!
//! A frame's life is cut into consecutive stages. The `StageTimeline` keeps
//! the closed stages in the order they happened plus at most one open stage.
//! Opening a stage closes the previous one at the same instant, so that
//! closed stages tile the frame's lifetime without gaps.

use serde::{Deserialize, Serialize};

use crate::clock::{Duration, Timestamp};
use crate::interval::TimeInterval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageType {
    BeginImplFrameToSendBeginMainFrame,
    SendBeginMainFrameToCommit,
    Commit,
    EndCommitToActivation,
    Activation,
    EndActivateToSubmitCompositorFrame,
    SubmitCompositorFrameToPresentationCompositorFrame,
    /// Synthetic stage spanning the whole frame, appended when reporting.
    TotalLatency,
}

impl StageType {
    pub const ALL: [StageType; 8] = [
        StageType::BeginImplFrameToSendBeginMainFrame,
        StageType::SendBeginMainFrameToCommit,
        StageType::Commit,
        StageType::EndCommitToActivation,
        StageType::Activation,
        StageType::EndActivateToSubmitCompositorFrame,
        StageType::SubmitCompositorFrameToPresentationCompositorFrame,
        StageType::TotalLatency,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageType::BeginImplFrameToSendBeginMainFrame => "BeginImplFrameToSendBeginMainFrame",
            StageType::SendBeginMainFrameToCommit => "SendBeginMainFrameToCommit",
            StageType::Commit => "Commit",
            StageType::EndCommitToActivation => "EndCommitToActivation",
            StageType::Activation => "Activation",
            StageType::EndActivateToSubmitCompositorFrame => "EndActivateToSubmitCompositorFrame",
            StageType::SubmitCompositorFrameToPresentationCompositorFrame => {
                "SubmitCompositorFrameToPresentationCompositorFrame"
            }
            StageType::TotalLatency => "TotalLatency",
        }
    }
}

/// A closed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageData {
    pub stage_type: StageType,
    #[serde(flatten)]
    pub interval: TimeInterval,
}

impl StageData {
    pub fn new(stage_type: StageType, interval: TimeInterval) -> Self {
        Self {
            stage_type,
            interval,
        }
    }

    pub fn start(&self) -> Timestamp {
        self.interval.start()
    }

    pub fn end(&self) -> Timestamp {
        self.interval.end()
    }

    pub fn duration(&self) -> Duration {
        self.interval.duration()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenStage {
    stage_type: StageType,
    start: Timestamp,
}

/// Ordered stage history of one frame.
///
/// Two stage kinds latch a side timestamp the first time they are entered:
/// `SendBeginMainFrameToCommit` (main-thread start) and
/// `SubmitCompositorFrameToPresentationCompositorFrame` (display compositor
/// start). Breakdown tables are anchored on these.
#[derive(Debug, Default, Clone)]
pub struct StageTimeline {
    history: Vec<StageData>,
    current: Option<OpenStage>,
    blink_start: Option<Timestamp>,
    viz_start: Option<Timestamp>,
}

impl StageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a timeline with `stage_type` already open at `start`.
    pub fn with_open_stage(stage_type: StageType, start: Timestamp) -> Self {
        Self {
            current: Some(OpenStage { stage_type, start }),
            ..Self::default()
        }
    }

    /// Closes the open stage (if any) at `ts` and opens `stage_type` at `ts`.
    ///
    /// The caller is responsible for ignoring this after the frame was
    /// terminated.
    pub fn start_stage(&mut self, stage_type: StageType, ts: Timestamp) {
        self.end_current_stage(ts);

        match stage_type {
            StageType::SendBeginMainFrameToCommit => Self::latch(&mut self.blink_start, stage_type, ts),
            StageType::SubmitCompositorFrameToPresentationCompositorFrame => {
                Self::latch(&mut self.viz_start, stage_type, ts)
            }
            _ => {}
        }

        self.current = Some(OpenStage {
            stage_type,
            start: ts,
        });
    }

    fn latch(slot: &mut Option<Timestamp>, stage_type: StageType, ts: Timestamp) {
        match slot {
            Some(prev) => tracing::warn!(
                stage = stage_type.name(),
                first = *prev,
                again = ts,
                "stage entered twice, keeping first start"
            ),
            None => *slot = Some(ts),
        }
    }

    /// Closes the open stage at `ts`. No-op if no stage is open.
    pub fn end_current_stage(&mut self, ts: Timestamp) {
        if let Some(open) = self.current.take() {
            if ts < open.start {
                tracing::debug!(
                    stage = open.stage_type.name(),
                    start = open.start,
                    end = ts,
                    "stage closed before it started"
                );
            }
            self.history.push(StageData::new(
                open.stage_type,
                TimeInterval::clamped(open.start, ts),
            ));
        }
    }

    /// Appends the synthetic `TotalLatency` stage spanning the whole history.
    ///
    /// Returns false if there is no closed stage to span, or if the stage was
    /// already appended.
    pub fn append_total_latency(&mut self) -> bool {
        let (Some(first), Some(last)) = (self.history.first(), self.history.last()) else {
            return false;
        };

        if last.stage_type == StageType::TotalLatency {
            return false;
        }

        let total = TimeInterval::clamped(first.start(), last.end());
        self.history
            .push(StageData::new(StageType::TotalLatency, total));

        true
    }

    /// Sum of the durations of all closed stages.
    pub fn sum_of_intervals(&self) -> Duration {
        self.history
            .iter()
            .filter(|s| s.stage_type != StageType::TotalLatency)
            .map(StageData::duration)
            .sum()
    }

    /// Span from the first stage start to the last stage end.
    pub fn span(&self) -> Option<Duration> {
        let first = self.history.first()?;
        let last = self
            .history
            .iter()
            .rev()
            .find(|s| s.stage_type != StageType::TotalLatency)?;

        Some(last.end().saturating_sub(first.start()))
    }

    pub fn history(&self) -> &[StageData] {
        &self.history
    }

    pub fn first_stage(&self) -> Option<&StageData> {
        self.history.first()
    }

    pub fn total_latency(&self) -> Option<&StageData> {
        self.history
            .last()
            .filter(|s| s.stage_type == StageType::TotalLatency)
    }

    pub fn current_stage(&self) -> Option<(StageType, Timestamp)> {
        self.current.map(|s| (s.stage_type, s.start))
    }

    pub fn blink_start(&self) -> Option<Timestamp> {
        self.blink_start
    }

    pub fn viz_start(&self) -> Option<Timestamp> {
        self.viz_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_stages_tile_the_frame() {
        let mut t = StageTimeline::new();

        t.start_stage(StageType::BeginImplFrameToSendBeginMainFrame, 100);
        t.start_stage(StageType::SendBeginMainFrameToCommit, 130);
        t.start_stage(StageType::Commit, 170);
        t.start_stage(StageType::EndCommitToActivation, 171);
        t.end_current_stage(250);

        let kinds: Vec<StageType> = t.history().iter().map(|s| s.stage_type).collect();
        assert_eq!(
            kinds,
            vec![
                StageType::BeginImplFrameToSendBeginMainFrame,
                StageType::SendBeginMainFrameToCommit,
                StageType::Commit,
                StageType::EndCommitToActivation,
            ]
        );
        assert_eq!(t.sum_of_intervals(), 150);
        assert_eq!(t.span(), Some(150));
        assert!(t.current_stage().is_none());
    }

    #[test]
    fn test_side_timestamps_latch_once() {
        let mut t = StageTimeline::new();

        t.start_stage(StageType::SendBeginMainFrameToCommit, 10);
        t.start_stage(StageType::SubmitCompositorFrameToPresentationCompositorFrame, 20);
        t.start_stage(StageType::SendBeginMainFrameToCommit, 30);

        assert_eq!(t.blink_start(), Some(10));
        assert_eq!(t.viz_start(), Some(20));
    }

    #[test]
    fn test_total_latency_appended_once() {
        let mut t = StageTimeline::with_open_stage(StageType::BeginImplFrameToSendBeginMainFrame, 5);

        assert!(!t.append_total_latency());

        t.start_stage(StageType::EndActivateToSubmitCompositorFrame, 9);
        t.end_current_stage(20);

        assert!(t.append_total_latency());
        assert!(!t.append_total_latency());

        let total = t.total_latency().unwrap();
        assert_eq!(total.start(), 5);
        assert_eq!(total.end(), 20);
        assert_eq!(t.sum_of_intervals(), 15);
    }

    #[test]
    fn test_out_of_order_close_is_clamped() {
        let mut t = StageTimeline::new();

        t.start_stage(StageType::Commit, 50);
        t.end_current_stage(40);

        assert_eq!(t.history()[0].duration(), 0);
        assert_eq!(t.history()[0].start(), 50);
    }
}
