//! Frame outcome classification.
//!
//! When a reporter is finalized, its termination status and a handful of
//! flags are condensed into a `FrameInfo`. Two generations of the frame
//! drop metrics disagree on what counts as dropped, so the outcome carries
//! one final state per interpretation:
//! - `final_state`: base interpretation.
//! - `final_state_raster_property`: a frame that wanted a new property tree
//!   but did not get one is dropped.
//! - `final_state_raster_scroll`: for raster-driven scrolls, a frame that did
//!   not pick up the raster invalidation is dropped.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameFinalState {
    NoUpdateDesired,
    Dropped,
    PresentedAll,
    PresentedPartialOldMain,
    PresentedPartialNewMain,
}

/// Threads driving a smooth animation or interaction in this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmoothThread {
    #[default]
    None,
    Main,
    Compositor,
    Both,
}

impl SmoothThread {
    pub fn includes_main(&self) -> bool {
        matches!(self, SmoothThread::Main | SmoothThread::Both)
    }
}

/// Thread driving the active scroll, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmoothEffectDrivingThread {
    #[default]
    Unknown,
    Main,
    Compositor,
    Raster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainThreadResponse {
    Included,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameTerminationStatus {
    /// Not terminated yet.
    #[default]
    Unknown,
    PresentedFrame,
    DidNotPresentFrame,
    DidNotProduceFrame,
    /// Superseded by a newer reporter for the same pipeline stage.
    ReplacedByNewReporter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSkippedReason {
    RecoverLatency,
    NoDamage,
    WaitingOnMain,
    DrawThrottled,
}

/// Final outcome of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    pub final_state: FrameFinalState,
    pub final_state_raster_property: FrameFinalState,
    pub final_state_raster_scroll: FrameFinalState,
    pub smooth_thread: SmoothThread,
    pub smooth_thread_raster_property: SmoothThread,
    pub scroll_thread: SmoothEffectDrivingThread,
    pub main_thread_response: MainThreadResponse,
    pub termination_time: Timestamp,
    pub sequence_number: u64,
    pub checkerboarded_needs_raster: bool,
    pub checkerboarded_needs_record: bool,
    pub did_raster_inducing_scroll: bool,
}

impl FrameInfo {
    /// True if the frame missed content that a smooth effect was waiting on.
    pub fn is_dropped_affecting_smoothness(&self) -> bool {
        match self.final_state {
            FrameFinalState::Dropped => self.smooth_thread != SmoothThread::None,
            FrameFinalState::PresentedPartialOldMain => self.smooth_thread.includes_main(),
            _ => false,
        }
    }
}

/// Reporter state the classifier looks at.
#[derive(Debug, Clone, Default)]
pub struct ClassifierInput {
    pub termination_status: FrameTerminationStatus,
    pub termination_time: Timestamp,
    pub frame_skip_reason: Option<FrameSkippedReason>,
    pub has_partial_update: bool,
    pub is_accompanied_by_main_thread_update: bool,
    pub want_new_tree: bool,
    pub created_new_tree: bool,
    pub invalidate_raster_scroll: bool,
    pub smooth_thread: SmoothThread,
    pub scrolling_thread: SmoothEffectDrivingThread,
    pub has_main_frame_start: bool,
    pub has_dependents: bool,
    pub checkerboarded_needs_raster: bool,
    pub checkerboarded_needs_record: bool,
    pub sequence_number: u64,
}

pub fn generate_frame_info(input: &ClassifierInput) -> FrameInfo {
    use FrameFinalState::*;

    let mut final_state = NoUpdateDesired;
    let mut final_state_raster_property = NoUpdateDesired;
    let mut final_state_raster_scroll = NoUpdateDesired;
    let mut smooth_thread = input.smooth_thread;
    let mut scroll_thread = input.scrolling_thread;

    let skipped_for = |r: FrameSkippedReason| input.frame_skip_reason == Some(r);
    let missed_new_tree = input.want_new_tree && !input.created_new_tree;
    let raster_scroll = input.scrolling_thread == SmoothEffectDrivingThread::Raster;

    match input.termination_status {
        FrameTerminationStatus::PresentedFrame => {
            final_state = match (input.has_partial_update, input.is_accompanied_by_main_thread_update) {
                (true, true) => PresentedPartialNewMain,
                (true, false) => PresentedPartialOldMain,
                (false, _) => PresentedAll,
            };

            final_state_raster_property = if missed_new_tree { Dropped } else { final_state };
            final_state_raster_scroll =
                if raster_scroll && input.invalidate_raster_scroll && !input.created_new_tree {
                    Dropped
                } else {
                    final_state
                };
        }
        FrameTerminationStatus::DidNotPresentFrame | FrameTerminationStatus::ReplacedByNewReporter => {
            final_state = Dropped;
            final_state_raster_property = Dropped;
            final_state_raster_scroll = Dropped;
        }
        FrameTerminationStatus::DidNotProduceFrame => {
            let no_update_expected_from_main = skipped_for(FrameSkippedReason::NoDamage);
            let no_update_expected_from_compositor =
                !input.has_partial_update && skipped_for(FrameSkippedReason::WaitingOnMain);

            final_state = if !no_update_expected_from_main && !no_update_expected_from_compositor {
                Dropped
            } else if skipped_for(FrameSkippedReason::DrawThrottled) {
                Dropped
            } else {
                NoUpdateDesired
            };

            final_state_raster_property = if missed_new_tree { Dropped } else { final_state };
            final_state_raster_scroll = if raster_scroll && !input.invalidate_raster_scroll {
                Dropped
            } else {
                final_state
            };

            // A compositor effect that ends waiting on main made no visual
            // change; the main-thread part is still dropped.
            if skipped_for(FrameSkippedReason::WaitingOnMain) {
                smooth_thread = match smooth_thread {
                    SmoothThread::Both => SmoothThread::Main,
                    SmoothThread::Compositor => SmoothThread::None,
                    other => other,
                };
                if scroll_thread == SmoothEffectDrivingThread::Compositor {
                    scroll_thread = SmoothEffectDrivingThread::Unknown;
                }
            }
        }
        FrameTerminationStatus::Unknown => {}
    }

    let main_thread_response = if skipped_for(FrameSkippedReason::NoDamage) || input.has_dependents {
        MainThreadResponse::Included
    } else if !input.has_main_frame_start || skipped_for(FrameSkippedReason::WaitingOnMain) {
        MainThreadResponse::Missing
    } else {
        MainThreadResponse::Included
    };

    FrameInfo {
        final_state,
        final_state_raster_property,
        final_state_raster_scroll,
        smooth_thread,
        smooth_thread_raster_property: input.smooth_thread,
        scroll_thread,
        main_thread_response,
        termination_time: input.termination_time,
        sequence_number: input.sequence_number,
        checkerboarded_needs_raster: input.checkerboarded_needs_raster,
        checkerboarded_needs_record: input.checkerboarded_needs_record,
        did_raster_inducing_scroll: input.invalidate_raster_scroll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(status: FrameTerminationStatus) -> ClassifierInput {
        ClassifierInput {
            termination_status: status,
            termination_time: 100,
            has_main_frame_start: true,
            ..ClassifierInput::default()
        }
    }

    #[test]
    fn test_presented() {
        let info = generate_frame_info(&input(FrameTerminationStatus::PresentedFrame));
        assert_eq!(info.final_state, FrameFinalState::PresentedAll);
        assert_eq!(info.final_state_raster_property, FrameFinalState::PresentedAll);
        assert_eq!(info.main_thread_response, MainThreadResponse::Included);

        let mut i = input(FrameTerminationStatus::PresentedFrame);
        i.has_partial_update = true;
        assert_eq!(
            generate_frame_info(&i).final_state,
            FrameFinalState::PresentedPartialOldMain
        );

        i.is_accompanied_by_main_thread_update = true;
        assert_eq!(
            generate_frame_info(&i).final_state,
            FrameFinalState::PresentedPartialNewMain
        );
    }

    #[test]
    fn test_presented_raster_variants() {
        let mut i = input(FrameTerminationStatus::PresentedFrame);
        i.want_new_tree = true;
        i.scrolling_thread = SmoothEffectDrivingThread::Raster;
        i.invalidate_raster_scroll = true;

        let info = generate_frame_info(&i);
        assert_eq!(info.final_state, FrameFinalState::PresentedAll);
        assert_eq!(info.final_state_raster_property, FrameFinalState::Dropped);
        assert_eq!(info.final_state_raster_scroll, FrameFinalState::Dropped);
        assert!(info.did_raster_inducing_scroll);

        i.created_new_tree = true;
        let info = generate_frame_info(&i);
        assert_eq!(info.final_state_raster_property, FrameFinalState::PresentedAll);
        assert_eq!(info.final_state_raster_scroll, FrameFinalState::PresentedAll);
    }

    #[test]
    fn test_not_presented_is_dropped() {
        for status in [
            FrameTerminationStatus::DidNotPresentFrame,
            FrameTerminationStatus::ReplacedByNewReporter,
        ] {
            let info = generate_frame_info(&input(status));
            assert_eq!(info.final_state, FrameFinalState::Dropped);
            assert_eq!(info.final_state_raster_property, FrameFinalState::Dropped);
            assert_eq!(info.final_state_raster_scroll, FrameFinalState::Dropped);
        }
    }

    #[test]
    fn test_did_not_produce() {
        let mut i = input(FrameTerminationStatus::DidNotProduceFrame);

        i.frame_skip_reason = Some(FrameSkippedReason::NoDamage);
        assert_eq!(generate_frame_info(&i).final_state, FrameFinalState::NoUpdateDesired);

        i.frame_skip_reason = Some(FrameSkippedReason::WaitingOnMain);
        assert_eq!(generate_frame_info(&i).final_state, FrameFinalState::NoUpdateDesired);

        i.has_partial_update = true;
        assert_eq!(generate_frame_info(&i).final_state, FrameFinalState::Dropped);

        i.has_partial_update = false;
        i.frame_skip_reason = Some(FrameSkippedReason::DrawThrottled);
        assert_eq!(generate_frame_info(&i).final_state, FrameFinalState::Dropped);

        i.frame_skip_reason = Some(FrameSkippedReason::RecoverLatency);
        assert_eq!(generate_frame_info(&i).final_state, FrameFinalState::Dropped);

        i.frame_skip_reason = None;
        assert_eq!(generate_frame_info(&i).final_state, FrameFinalState::Dropped);
    }

    #[test]
    fn test_did_not_produce_raster_scroll() {
        let mut i = input(FrameTerminationStatus::DidNotProduceFrame);
        i.frame_skip_reason = Some(FrameSkippedReason::NoDamage);
        i.scrolling_thread = SmoothEffectDrivingThread::Raster;

        let info = generate_frame_info(&i);
        assert_eq!(info.final_state, FrameFinalState::NoUpdateDesired);
        assert_eq!(info.final_state_raster_scroll, FrameFinalState::Dropped);

        i.invalidate_raster_scroll = true;
        assert_eq!(
            generate_frame_info(&i).final_state_raster_scroll,
            FrameFinalState::NoUpdateDesired
        );
    }

    #[test]
    fn test_waiting_on_main_narrows_threads() {
        let mut i = input(FrameTerminationStatus::DidNotProduceFrame);
        i.frame_skip_reason = Some(FrameSkippedReason::WaitingOnMain);
        i.smooth_thread = SmoothThread::Both;
        i.scrolling_thread = SmoothEffectDrivingThread::Compositor;

        let info = generate_frame_info(&i);
        assert_eq!(info.smooth_thread, SmoothThread::Main);
        assert_eq!(info.smooth_thread_raster_property, SmoothThread::Both);
        assert_eq!(info.scroll_thread, SmoothEffectDrivingThread::Unknown);
        assert_eq!(info.main_thread_response, MainThreadResponse::Missing);

        i.smooth_thread = SmoothThread::Compositor;
        assert_eq!(generate_frame_info(&i).smooth_thread, SmoothThread::None);
    }

    #[test]
    fn test_unknown_status() {
        let info = generate_frame_info(&input(FrameTerminationStatus::Unknown));

        assert_eq!(info.final_state, FrameFinalState::NoUpdateDesired);
        assert_eq!(info.final_state_raster_property, FrameFinalState::NoUpdateDesired);
        assert_eq!(info.final_state_raster_scroll, FrameFinalState::NoUpdateDesired);
    }

    #[test]
    fn test_main_thread_response() {
        let mut i = input(FrameTerminationStatus::PresentedFrame);
        i.has_main_frame_start = false;
        assert_eq!(generate_frame_info(&i).main_thread_response, MainThreadResponse::Missing);

        i.has_dependents = true;
        assert_eq!(generate_frame_info(&i).main_thread_response, MainThreadResponse::Included);

        i.has_dependents = false;
        i.frame_skip_reason = Some(FrameSkippedReason::NoDamage);
        assert_eq!(generate_frame_info(&i).main_thread_response, MainThreadResponse::Included);
    }

    #[test]
    fn test_affects_smoothness() {
        let mut i = input(FrameTerminationStatus::DidNotPresentFrame);
        assert!(!generate_frame_info(&i).is_dropped_affecting_smoothness());

        i.smooth_thread = SmoothThread::Compositor;
        assert!(generate_frame_info(&i).is_dropped_affecting_smoothness());

        let mut i = input(FrameTerminationStatus::PresentedFrame);
        i.smooth_thread = SmoothThread::Main;
        i.has_partial_update = true;
        assert!(generate_frame_info(&i).is_dropped_affecting_smoothness());
    }
}
