//! Stage breakdown tables.
//!
//! Two stages are split further: `SendBeginMainFrameToCommit` by main-thread
//! phase (`BlinkBreakdown`) and
//! `SubmitCompositorFrameToPresentationCompositorFrame` by display-compositor
//! step (`VizBreakdown`). Both tables are fixed arrays indexed by the
//! breakdown enum, built once from a raw snapshot and read through a cursor
//! that yields populated slots in enum order.

use crate::clock::{Duration, Timestamp};
use crate::interval::TimeInterval;
use crate::timing::{BeginMainFrameMetrics, FrameTimingDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlinkBreakdown {
    HandleInputEvents,
    Animate,
    StyleUpdate,
    LayoutUpdate,
    Accessibility,
    Prepaint,
    CompositingInputs,
    Paint,
    CompositeCommit,
    UpdateLayers,
    /// Queueing delay between sending the begin-main-frame and the main
    /// thread starting on it.
    BeginMainSentToStarted,
}

impl BlinkBreakdown {
    pub const COUNT: usize = 11;

    pub const ALL: [BlinkBreakdown; Self::COUNT] = [
        BlinkBreakdown::HandleInputEvents,
        BlinkBreakdown::Animate,
        BlinkBreakdown::StyleUpdate,
        BlinkBreakdown::LayoutUpdate,
        BlinkBreakdown::Accessibility,
        BlinkBreakdown::Prepaint,
        BlinkBreakdown::CompositingInputs,
        BlinkBreakdown::Paint,
        BlinkBreakdown::CompositeCommit,
        BlinkBreakdown::UpdateLayers,
        BlinkBreakdown::BeginMainSentToStarted,
    ];

    /// Suffix appended to the stage name in histogram names.
    pub fn name(&self) -> &'static str {
        match self {
            BlinkBreakdown::HandleInputEvents => "HandleInputEvents",
            BlinkBreakdown::Animate => "Animate",
            BlinkBreakdown::StyleUpdate => "StyleUpdate",
            BlinkBreakdown::LayoutUpdate => "LayoutUpdate",
            // Misspelled in the published histogram names.
            BlinkBreakdown::Accessibility => "AccessibiltyUpdate",
            BlinkBreakdown::Prepaint => "Prepaint",
            BlinkBreakdown::CompositingInputs => "CompositingInputs",
            BlinkBreakdown::Paint => "Paint",
            BlinkBreakdown::CompositeCommit => "CompositeCommit",
            BlinkBreakdown::UpdateLayers => "UpdateLayers",
            BlinkBreakdown::BeginMainSentToStarted => "BeginMainSentToStarted",
        }
    }

    /// Field name used in trace annotations.
    pub fn trace_field(&self) -> &'static str {
        match self {
            BlinkBreakdown::HandleInputEvents => "handle_input_events_us",
            BlinkBreakdown::Animate => "animate_us",
            BlinkBreakdown::StyleUpdate => "style_update_us",
            BlinkBreakdown::LayoutUpdate => "layout_update_us",
            BlinkBreakdown::Accessibility => "accessibility_update_us",
            BlinkBreakdown::Prepaint => "prepaint_us",
            BlinkBreakdown::CompositingInputs => "compositing_inputs_us",
            BlinkBreakdown::Paint => "paint_us",
            BlinkBreakdown::CompositeCommit => "composite_commit_us",
            BlinkBreakdown::UpdateLayers => "update_layers_us",
            BlinkBreakdown::BeginMainSentToStarted => "begin_main_sent_to_started_us",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VizBreakdown {
    SubmitToReceiveCompositorFrame,
    ReceivedCompositorFrameToStartDraw,
    StartDrawToSwapStart,
    SwapStartToSwapEnd,
    SwapEndToPresentationCompositorFrame,
    SwapStartToBufferAvailable,
    BufferAvailableToBufferReady,
    BufferReadyToLatch,
    LatchToSwapEnd,
}

impl VizBreakdown {
    pub const COUNT: usize = 9;

    pub const ALL: [VizBreakdown; Self::COUNT] = [
        VizBreakdown::SubmitToReceiveCompositorFrame,
        VizBreakdown::ReceivedCompositorFrameToStartDraw,
        VizBreakdown::StartDrawToSwapStart,
        VizBreakdown::SwapStartToSwapEnd,
        VizBreakdown::SwapEndToPresentationCompositorFrame,
        VizBreakdown::SwapStartToBufferAvailable,
        VizBreakdown::BufferAvailableToBufferReady,
        VizBreakdown::BufferReadyToLatch,
        VizBreakdown::LatchToSwapEnd,
    ];

    /// Suffix appended to the stage name in histogram names.
    pub fn name(&self) -> &'static str {
        match self {
            VizBreakdown::SubmitToReceiveCompositorFrame => "SubmitToReceiveCompositorFrame",
            VizBreakdown::ReceivedCompositorFrameToStartDraw => "ReceivedCompositorFrameToStartDraw",
            VizBreakdown::StartDrawToSwapStart => "StartDrawToSwapStart",
            VizBreakdown::SwapStartToSwapEnd => "SwapStartToSwapEnd",
            VizBreakdown::SwapEndToPresentationCompositorFrame => {
                "SwapEndToPresentationCompositorFrame"
            }
            VizBreakdown::SwapStartToBufferAvailable => "SwapStartToBufferAvailable",
            VizBreakdown::BufferAvailableToBufferReady => "BufferAvailableToBufferReady",
            VizBreakdown::BufferReadyToLatch => "BufferReadyToLatch",
            VizBreakdown::LatchToSwapEnd => "LatchToSwapEnd",
        }
    }

    /// Span name used in traces. Differs from `name` for two entries.
    pub fn trace_name(&self) -> &'static str {
        match self {
            VizBreakdown::ReceivedCompositorFrameToStartDraw => "ReceiveCompositorFrameToStartDraw",
            VizBreakdown::SwapStartToSwapEnd => "Swap",
            other => other.name(),
        }
    }
}

/// Main-thread breakdown of `SendBeginMainFrameToCommit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedBlinkBreakdown {
    list: [Option<Duration>; BlinkBreakdown::COUNT],
}

impl ProcessedBlinkBreakdown {
    /// Builds the table. It stays empty if the frame never reached the main
    /// thread (`blink_start` unset).
    pub fn new(
        blink_start: Option<Timestamp>,
        begin_main_start: Option<Timestamp>,
        metrics: &BeginMainFrameMetrics,
    ) -> Self {
        let mut ret = Self::default();

        let Some(blink_start) = blink_start else {
            return ret;
        };

        let copied = [
            (BlinkBreakdown::HandleInputEvents, metrics.handle_input_events),
            (BlinkBreakdown::Animate, metrics.animate),
            (BlinkBreakdown::StyleUpdate, metrics.style_update),
            (BlinkBreakdown::LayoutUpdate, metrics.layout_update),
            (BlinkBreakdown::Accessibility, metrics.accessibility),
            (BlinkBreakdown::Prepaint, metrics.prepaint),
            (BlinkBreakdown::CompositingInputs, metrics.compositing_inputs),
            (BlinkBreakdown::Paint, metrics.paint),
            (BlinkBreakdown::CompositeCommit, metrics.composite_commit),
            (BlinkBreakdown::UpdateLayers, metrics.update_layers),
        ];
        for (b, d) in copied {
            ret.list[b as usize] = Some(d);
        }

        ret.list[BlinkBreakdown::BeginMainSentToStarted as usize] =
            TimeInterval::between(Some(blink_start), begin_main_start).map(|i| i.duration());

        ret
    }

    pub fn get(&self, breakdown: BlinkBreakdown) -> Option<Duration> {
        self.list[breakdown as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.list.iter().all(Option::is_none)
    }

    pub fn cursor(&self) -> BlinkBreakdownCursor<'_> {
        BlinkBreakdownCursor::new(self)
    }
}

/// Cursor over the populated slots of a `ProcessedBlinkBreakdown`.
pub struct BlinkBreakdownCursor<'a> {
    owner: &'a ProcessedBlinkBreakdown,
    index: usize,
}

impl<'a> BlinkBreakdownCursor<'a> {
    fn new(owner: &'a ProcessedBlinkBreakdown) -> Self {
        let mut ret = Self { owner, index: 0 };
        ret.skip_empty();
        ret
    }

    fn skip_empty(&mut self) {
        while self.is_valid() && self.owner.list[self.index].is_none() {
            self.index += 1;
        }
    }

    pub fn is_valid(&self) -> bool {
        self.index < BlinkBreakdown::COUNT
    }

    pub fn advance(&mut self) {
        debug_assert!(self.is_valid());
        self.index += 1;
        self.skip_empty();
    }

    pub fn breakdown(&self) -> BlinkBreakdown {
        BlinkBreakdown::ALL[self.index]
    }

    pub fn latency(&self) -> Duration {
        self.owner.list[self.index].unwrap_or_default()
    }
}

impl Iterator for BlinkBreakdownCursor<'_> {
    type Item = (BlinkBreakdown, Duration);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_valid() {
            return None;
        }
        let ret = (self.breakdown(), self.latency());
        self.advance();
        Some(ret)
    }
}

/// Display-compositor breakdown of
/// `SubmitCompositorFrameToPresentationCompositorFrame`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedVizBreakdown {
    list: [Option<TimeInterval>; VizBreakdown::COUNT],
    buffer_ready_available: bool,
}

impl ProcessedVizBreakdown {
    /// Builds the table by walking the display pipeline in order. The walk
    /// stops at the first step whose upstream timestamp is missing or whose
    /// interval would be negative, leaving every later slot empty.
    pub fn new(viz_start: Option<Timestamp>, details: &FrameTimingDetails) -> Self {
        let mut ret = Self::default();
        ret.populate(viz_start, details);
        ret
    }

    fn set(&mut self, b: VizBreakdown, start: Option<Timestamp>, end: Option<Timestamp>) -> Option<()> {
        let i = TimeInterval::between(start, end)?;
        self.list[b as usize] = Some(i);
        Some(())
    }

    fn populate(&mut self, viz_start: Option<Timestamp>, details: &FrameTimingDetails) -> Option<()> {
        use VizBreakdown::*;

        let received = details.received_compositor_frame_timestamp;
        let draw_start = details.draw_start_timestamp;
        let feedback = &details.presentation_feedback;

        self.set(SubmitToReceiveCompositorFrame, viz_start, received)?;
        self.set(ReceivedCompositorFrameToStartDraw, received, draw_start)?;

        let swap = details.swap_timings?;
        let (swap_start, swap_end) = (Some(swap.swap_start), Some(swap.swap_end));
        self.set(StartDrawToSwapStart, draw_start, swap_start)?;
        self.set(SwapStartToSwapEnd, swap_start, swap_end)?;
        self.set(SwapEndToPresentationCompositorFrame, swap_end, feedback.timestamp)?;

        feedback.ready_timestamp?;

        // The finer split replaces SwapStartToSwapEnd only when complete.
        let split = [
            (SwapStartToBufferAvailable, swap_start, feedback.available_timestamp),
            (BufferAvailableToBufferReady, feedback.available_timestamp, feedback.ready_timestamp),
            (BufferReadyToLatch, feedback.ready_timestamp, feedback.latch_timestamp),
            (LatchToSwapEnd, feedback.latch_timestamp, swap_end),
        ];
        for (b, start, end) in split {
            self.set(b, start, end)?;
        }
        self.buffer_ready_available = true;

        Some(())
    }

    pub fn get(&self, breakdown: VizBreakdown) -> Option<TimeInterval> {
        self.list[breakdown as usize]
    }

    pub fn buffer_ready_available(&self) -> bool {
        self.buffer_ready_available
    }

    pub fn is_empty(&self) -> bool {
        self.list.iter().all(Option::is_none)
    }

    /// Returns a cursor over populated slots. With
    /// `skip_swap_start_to_swap_end_if_breakdown_available`, the coarse swap
    /// entry is skipped when the buffer-ready split is present.
    pub fn cursor(&self, skip_swap_start_to_swap_end_if_breakdown_available: bool) -> VizBreakdownCursor<'_> {
        VizBreakdownCursor::new(
            self,
            skip_swap_start_to_swap_end_if_breakdown_available && self.buffer_ready_available,
        )
    }
}

/// Cursor over the populated slots of a `ProcessedVizBreakdown`.
pub struct VizBreakdownCursor<'a> {
    owner: &'a ProcessedVizBreakdown,
    index: usize,
    skip_swap_start_to_swap_end: bool,
}

impl<'a> VizBreakdownCursor<'a> {
    fn new(owner: &'a ProcessedVizBreakdown, skip_swap_start_to_swap_end: bool) -> Self {
        let mut ret = Self {
            owner,
            index: 0,
            skip_swap_start_to_swap_end,
        };
        ret.skip_if_necessary();
        ret
    }

    fn skip_if_necessary(&mut self) {
        while self.is_valid()
            && (self.owner.list[self.index].is_none()
                || (self.skip_swap_start_to_swap_end
                    && self.breakdown() == VizBreakdown::SwapStartToSwapEnd))
        {
            self.index += 1;
        }
    }

    pub fn is_valid(&self) -> bool {
        self.index < VizBreakdown::COUNT
    }

    pub fn advance(&mut self) {
        debug_assert!(self.is_valid());
        self.index += 1;
        self.skip_if_necessary();
    }

    pub fn breakdown(&self) -> VizBreakdown {
        VizBreakdown::ALL[self.index]
    }

    pub fn interval(&self) -> TimeInterval {
        self.owner.list[self.index].unwrap_or(TimeInterval::clamped(0, 0))
    }
}

impl Iterator for VizBreakdownCursor<'_> {
    type Item = (VizBreakdown, TimeInterval);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_valid() {
            return None;
        }
        let ret = (self.breakdown(), self.interval());
        self.advance();
        Some(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{PresentationFeedback, SwapTimings};

    fn full_details() -> FrameTimingDetails {
        FrameTimingDetails {
            received_compositor_frame_timestamp: Some(110),
            draw_start_timestamp: Some(120),
            swap_timings: Some(SwapTimings {
                swap_start: 130,
                swap_end: 170,
            }),
            presentation_feedback: PresentationFeedback {
                timestamp: Some(180),
                available_timestamp: Some(140),
                ready_timestamp: Some(150),
                latch_timestamp: Some(160),
                ..PresentationFeedback::default()
            },
        }
    }

    #[test]
    fn test_blink_empty_without_main_thread() {
        let metrics = BeginMainFrameMetrics {
            paint: 7,
            ..BeginMainFrameMetrics::default()
        };
        let table = ProcessedBlinkBreakdown::new(None, Some(10), &metrics);

        assert!(table.is_empty());
        assert_eq!(table.cursor().count(), 0);
    }

    #[test]
    fn test_blink_breakdown() {
        let metrics = BeginMainFrameMetrics {
            animate: 3,
            paint: 7,
            ..BeginMainFrameMetrics::default()
        };
        let table = ProcessedBlinkBreakdown::new(Some(100), Some(104), &metrics);

        let entries: Vec<(BlinkBreakdown, Duration)> = table.cursor().collect();
        assert_eq!(entries.len(), BlinkBreakdown::COUNT);
        assert_eq!(entries[1], (BlinkBreakdown::Animate, 3));
        assert_eq!(entries[7], (BlinkBreakdown::Paint, 7));
        assert_eq!(
            entries.last(),
            Some(&(BlinkBreakdown::BeginMainSentToStarted, 4))
        );
    }

    #[test]
    fn test_blink_missing_main_start_skips_queueing_slot() {
        let table = ProcessedBlinkBreakdown::new(Some(100), None, &BeginMainFrameMetrics::default());
        let kinds: Vec<BlinkBreakdown> = table.cursor().map(|(b, _)| b).collect();

        assert_eq!(kinds.len(), BlinkBreakdown::COUNT - 1);
        assert!(!kinds.contains(&BlinkBreakdown::BeginMainSentToStarted));
    }

    #[test]
    fn test_viz_without_draw_start() {
        let details = FrameTimingDetails {
            received_compositor_frame_timestamp: Some(110),
            ..full_details()
        };
        let details = FrameTimingDetails {
            draw_start_timestamp: None,
            ..details
        };
        let table = ProcessedVizBreakdown::new(Some(100), &details);

        let entries: Vec<VizBreakdown> = table.cursor(false).map(|(b, _)| b).collect();
        assert_eq!(entries, vec![VizBreakdown::SubmitToReceiveCompositorFrame]);
        assert!(!table.buffer_ready_available());
    }

    #[test]
    fn test_viz_without_received_is_empty() {
        let details = FrameTimingDetails {
            received_compositor_frame_timestamp: None,
            draw_start_timestamp: None,
            ..full_details()
        };
        let table = ProcessedVizBreakdown::new(Some(100), &details);

        assert!(table.is_empty());
        assert_eq!(table.cursor(false).count(), 0);
    }

    #[test]
    fn test_viz_received_before_submit_is_empty() {
        let table = ProcessedVizBreakdown::new(Some(115), &full_details());

        assert!(table.is_empty());
    }

    #[test]
    fn test_viz_stops_at_negative_interval() {
        let mut details = full_details();
        details.draw_start_timestamp = Some(105);

        let table = ProcessedVizBreakdown::new(Some(100), &details);
        let entries: Vec<VizBreakdown> = table.cursor(false).map(|(b, _)| b).collect();

        assert_eq!(entries, vec![VizBreakdown::SubmitToReceiveCompositorFrame]);
    }

    #[test]
    fn test_viz_swap_skipped_only_with_buffer_split() {
        let table = ProcessedVizBreakdown::new(Some(100), &full_details());
        assert!(table.buffer_ready_available());

        let with_swap: Vec<VizBreakdown> = table.cursor(false).map(|(b, _)| b).collect();
        assert_eq!(with_swap.len(), VizBreakdown::COUNT);

        let skipped: Vec<VizBreakdown> = table.cursor(true).map(|(b, _)| b).collect();
        assert_eq!(skipped.len(), VizBreakdown::COUNT - 1);
        assert!(!skipped.contains(&VizBreakdown::SwapStartToSwapEnd));

        let mut details = full_details();
        details.presentation_feedback.ready_timestamp = None;
        let table = ProcessedVizBreakdown::new(Some(100), &details);
        let coarse: Vec<VizBreakdown> = table.cursor(true).map(|(b, _)| b).collect();

        assert!(!table.buffer_ready_available());
        assert_eq!(coarse.len(), 5);
        assert!(coarse.contains(&VizBreakdown::SwapStartToSwapEnd));
    }

    #[test]
    fn test_cursor_is_restartable() {
        let table = ProcessedVizBreakdown::new(Some(100), &full_details());

        let a: Vec<_> = table.cursor(true).collect();
        let b: Vec<_> = table.cursor(true).collect();

        assert_eq!(a, b);

        let mut c = table.cursor(false);
        assert!(c.is_valid());
        assert_eq!(c.breakdown(), VizBreakdown::SubmitToReceiveCompositorFrame);
        assert_eq!(c.interval().duration(), 10);
        c.advance();
        assert_eq!(c.breakdown(), VizBreakdown::ReceivedCompositorFrameToStartDraw);
    }
}
