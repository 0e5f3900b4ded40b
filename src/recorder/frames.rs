use std::cell::RefCell;
use std::collections::VecDeque;

use serde::Serialize;

use crate::clock::Timestamp;
use crate::frame_info::{FrameFinalState, FrameInfo};
use crate::sinks::FrameSorter;
use crate::timing::{BeginFrameArgs, BeginFrameId};

/// Outcome of one begin-frame, merged over all of its reporters.
#[derive(Debug, Clone, Serialize)]
pub struct SortedFrame {
    pub frame_id: BeginFrameId,
    pub frame_time: Timestamp,
    pub reporters: usize,
    pub info: FrameInfo,
}

#[derive(Debug)]
struct PendingFrame {
    frame_id: BeginFrameId,
    frame_time: Timestamp,
    expected: usize,
    received: usize,
    info: Option<FrameInfo>,
}

impl PendingFrame {
    fn is_complete(&self) -> bool {
        self.received >= self.expected
    }
}

fn severity(state: FrameFinalState) -> u8 {
    match state {
        FrameFinalState::NoUpdateDesired => 0,
        FrameFinalState::PresentedAll => 1,
        FrameFinalState::PresentedPartialNewMain => 2,
        FrameFinalState::PresentedPartialOldMain => 3,
        FrameFinalState::Dropped => 4,
    }
}

/// Of two results for the same frame, keeps the worse one.
fn merge(current: Option<FrameInfo>, new: &FrameInfo) -> FrameInfo {
    match current {
        Some(c) if severity(c.final_state) >= severity(new.final_state) => c,
        _ => new.clone(),
    }
}

/// Releases frame results in begin-frame order, once every reporter created
/// for a frame reported.
#[derive(Debug, Default)]
pub struct FrameSequenceSorter {
    pending: RefCell<VecDeque<PendingFrame>>,
    sorted: RefCell<Vec<SortedFrame>>,
}

impl FrameSequenceSorter {
    pub fn new() -> Self {
        Self::default()
    }

    fn release(&self) {
        let mut pending = self.pending.borrow_mut();
        let mut sorted = self.sorted.borrow_mut();

        while pending.front().is_some_and(PendingFrame::is_complete) {
            let Some(frame) = pending.pop_front() else {
                break;
            };
            if let Some(info) = frame.info {
                sorted.push(SortedFrame {
                    frame_id: frame.frame_id,
                    frame_time: frame.frame_time,
                    reporters: frame.received,
                    info,
                });
            }
        }
    }

    /// Releases every pending frame, complete or not. Frames none of whose
    /// reporters reported are discarded.
    pub fn flush(&self) {
        let mut pending = self.pending.borrow_mut();
        let mut sorted = self.sorted.borrow_mut();

        for frame in pending.drain(..) {
            if frame.received < frame.expected {
                tracing::debug!(
                    sequence = frame.frame_id.sequence_number,
                    expected = frame.expected,
                    received = frame.received,
                    "flushing incomplete frame"
                );
            }
            if let Some(info) = frame.info {
                sorted.push(SortedFrame {
                    frame_id: frame.frame_id,
                    frame_time: frame.frame_time,
                    reporters: frame.received,
                    info,
                });
            }
        }
    }

    pub fn sorted(&self) -> Vec<SortedFrame> {
        self.sorted.borrow().clone()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl FrameSorter for FrameSequenceSorter {
    fn add_new_frame(&self, args: &BeginFrameArgs) {
        let mut pending = self.pending.borrow_mut();

        match pending.iter_mut().find(|f| f.frame_id == args.frame_id) {
            Some(frame) => frame.expected += 1,
            None => pending.push_back(PendingFrame {
                frame_id: args.frame_id,
                frame_time: args.frame_time,
                expected: 1,
                received: 0,
                info: None,
            }),
        }
    }

    fn add_frame_result(&self, args: &BeginFrameArgs, info: &FrameInfo) {
        {
            let mut pending = self.pending.borrow_mut();
            let Some(frame) = pending.iter_mut().find(|f| f.frame_id == args.frame_id) else {
                tracing::warn!(
                    sequence = args.frame_id.sequence_number,
                    "result for a frame that was never announced"
                );
                return;
            };
            frame.received += 1;
            frame.info = Some(merge(frame.info.take(), info));
        }

        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_info::{generate_frame_info, ClassifierInput, FrameTerminationStatus};

    fn args(sequence: u64) -> BeginFrameArgs {
        BeginFrameArgs::new(BeginFrameId::new(1, sequence), sequence * 16, 16)
    }

    fn info(status: FrameTerminationStatus) -> FrameInfo {
        generate_frame_info(&ClassifierInput {
            termination_status: status,
            ..ClassifierInput::default()
        })
    }

    #[test]
    fn test_in_order_release() {
        let s = FrameSequenceSorter::new();
        s.add_new_frame(&args(1));
        s.add_new_frame(&args(2));

        s.add_frame_result(&args(2), &info(FrameTerminationStatus::PresentedFrame));
        assert!(s.sorted().is_empty());

        s.add_frame_result(&args(1), &info(FrameTerminationStatus::DidNotPresentFrame));
        let sorted = s.sorted();
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].frame_id.sequence_number, 1);
        assert_eq!(sorted[0].info.final_state, FrameFinalState::Dropped);
        assert_eq!(sorted[1].info.final_state, FrameFinalState::PresentedAll);
    }

    #[test]
    fn test_forked_frame_waits_for_both() {
        let s = FrameSequenceSorter::new();
        s.add_new_frame(&args(1));
        s.add_new_frame(&args(1));

        s.add_frame_result(&args(1), &info(FrameTerminationStatus::PresentedFrame));
        assert!(s.sorted().is_empty());

        s.add_frame_result(&args(1), &info(FrameTerminationStatus::ReplacedByNewReporter));
        let sorted = s.sorted();
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].reporters, 2);
        assert_eq!(sorted[0].info.final_state, FrameFinalState::Dropped);
    }

    #[test]
    fn test_flush() {
        let s = FrameSequenceSorter::new();
        s.add_new_frame(&args(1));
        s.add_new_frame(&args(1));
        s.add_new_frame(&args(2));
        s.add_frame_result(&args(1), &info(FrameTerminationStatus::PresentedFrame));

        s.flush();
        assert_eq!(s.sorted().len(), 1);
        assert_eq!(s.pending_len(), 0);
    }
}
