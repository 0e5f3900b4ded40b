//! Raw timing snapshots handed to a reporter.
//!
//! These are plain records filled by whoever drives the reporter (the
//! rendering loop, or the replay processor). A reporter copies them verbatim
//! and only derives breakdown tables from them when it is finalized.

use serde::{Deserialize, Serialize};

use crate::clock::{Duration, Timestamp};

/// Identifies a frame within a begin-frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BeginFrameId {
    pub source_id: u64,
    pub sequence_number: u64,
}

impl BeginFrameId {
    pub fn new(source_id: u64, sequence_number: u64) -> Self {
        Self {
            source_id,
            sequence_number,
        }
    }
}

/// The begin-frame descriptor a reporter was created for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BeginFrameArgs {
    pub frame_id: BeginFrameId,
    /// Vsync time the frame is aligned on.
    pub frame_time: Timestamp,
    #[serde(default)]
    pub deadline: Timestamp,
    /// Vsync interval.
    pub interval: Duration,
    /// When the display compositor dispatched the begin-frame.
    #[serde(default)]
    pub dispatch_time: Option<Timestamp>,
    /// When the begin-frame reached the client compositor.
    #[serde(default)]
    pub client_arrival_time: Option<Timestamp>,
    #[serde(default)]
    pub trace_id: Option<i64>,
}

impl BeginFrameArgs {
    pub fn new(frame_id: BeginFrameId, frame_time: Timestamp, interval: Duration) -> Self {
        Self {
            frame_id,
            frame_time,
            deadline: frame_time + interval,
            interval,
            ..Self::default()
        }
    }

    /// Args are usable as a vsync reference only with a positive interval.
    pub fn is_valid(&self) -> bool {
        self.interval > 0
    }
}

/// Main-thread phase durations of a main frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeginMainFrameMetrics {
    pub handle_input_events: Duration,
    pub animate: Duration,
    pub style_update: Duration,
    pub layout_update: Duration,
    pub accessibility: Duration,
    pub prepaint: Duration,
    pub compositing_inputs: Duration,
    pub paint: Duration,
    pub composite_commit: Duration,
    pub update_layers: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapTimings {
    pub swap_start: Timestamp,
    pub swap_end: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationFeedback {
    /// When the frame became visible.
    pub timestamp: Option<Timestamp>,
    pub available_timestamp: Option<Timestamp>,
    pub ready_timestamp: Option<Timestamp>,
    pub latch_timestamp: Option<Timestamp>,
    pub failed: bool,
    pub display_trace_id: Option<i64>,
}

/// Display-compositor timing of a submitted frame.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTimingDetails {
    pub received_compositor_frame_timestamp: Option<Timestamp>,
    pub draw_start_timestamp: Option<Timestamp>,
    pub swap_timings: Option<SwapTimings>,
    pub presentation_feedback: PresentationFeedback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_viz_details_parse() {
        let s = r#"{"received_compositor_frame_timestamp": 10, "swap_timings": {"swap_start": 20, "swap_end": 25}}"#;
        let d: FrameTimingDetails = serde_json::from_str(s).unwrap();

        assert_eq!(d.received_compositor_frame_timestamp, Some(10));
        assert_eq!(d.draw_start_timestamp, None);
        assert_eq!(
            d.swap_timings,
            Some(SwapTimings {
                swap_start: 20,
                swap_end: 25
            })
        );
        assert!(!d.presentation_feedback.failed);
    }

    #[test]
    fn test_args_defaults() {
        let s = r#"{"frame_id": {"source_id": 1, "sequence_number": 7}, "frame_time": 1000, "interval": 16000}"#;
        let args: BeginFrameArgs = serde_json::from_str(s).unwrap();

        assert!(args.is_valid());
        assert_eq!(args.frame_id, BeginFrameId::new(1, 7));
        assert_eq!(args.dispatch_time, None);
    }
}
