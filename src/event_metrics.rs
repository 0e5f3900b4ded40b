//! Input events served by a frame.
//!
//! Each input event that produced (or is waiting on) a visual update is
//! attached to the reporter of the frame that shows it. Besides its type, an
//! event carries the timestamps of its trip through the input pipeline and,
//! for gestures, some extra payload used by the scroll jank metrics.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::sinks::HistogramBucketing;
use crate::timing::BeginFrameArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    MousePressed,
    MouseReleased,
    MouseWheel,
    KeyPressed,
    KeyReleased,
    TouchPressed,
    TouchReleased,
    TouchMoved,
    GestureScrollBegin,
    GestureScrollEnd,
    GestureScrollUpdate,
    FirstGestureScrollUpdate,
    InertialGestureScrollUpdate,
    GesturePinchBegin,
    GesturePinchEnd,
    GesturePinchUpdate,
    GestureTap,
    GestureTapDown,
    GestureDoubleTap,
    GestureLongPress,
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            EventType::MousePressed => "MousePressed",
            EventType::MouseReleased => "MouseReleased",
            EventType::MouseWheel => "MouseWheel",
            EventType::KeyPressed => "KeyPressed",
            EventType::KeyReleased => "KeyReleased",
            EventType::TouchPressed => "TouchPressed",
            EventType::TouchReleased => "TouchReleased",
            EventType::TouchMoved => "TouchMoved",
            EventType::GestureScrollBegin => "GestureScrollBegin",
            EventType::GestureScrollEnd => "GestureScrollEnd",
            EventType::GestureScrollUpdate => "GestureScrollUpdate",
            EventType::FirstGestureScrollUpdate => "FirstGestureScrollUpdate",
            EventType::InertialGestureScrollUpdate => "InertialGestureScrollUpdate",
            EventType::GesturePinchBegin => "GesturePinchBegin",
            EventType::GesturePinchEnd => "GesturePinchEnd",
            EventType::GesturePinchUpdate => "GesturePinchUpdate",
            EventType::GestureTap => "GestureTap",
            EventType::GestureTapDown => "GestureTapDown",
            EventType::GestureDoubleTap => "GestureDoubleTap",
            EventType::GestureLongPress => "GestureLongPress",
        }
    }

    pub fn is_scroll_update(&self) -> bool {
        matches!(
            self,
            EventType::GestureScrollUpdate
                | EventType::FirstGestureScrollUpdate
                | EventType::InertialGestureScrollUpdate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScrollType {
    Autoscroll,
    Scrollbar,
    Touchscreen,
    Wheel,
}

impl ScrollType {
    pub fn name(&self) -> &'static str {
        match self {
            ScrollType::Autoscroll => "Autoscroll",
            ScrollType::Scrollbar => "Scrollbar",
            ScrollType::Touchscreen => "Touchscreen",
            ScrollType::Wheel => "Wheel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinchType {
    Touchpad,
    Touchscreen,
}

impl PinchType {
    pub fn name(&self) -> &'static str {
        match self {
            PinchType::Touchpad => "Touchpad",
            PinchType::Touchscreen => "Touchscreen",
        }
    }
}

/// Device that produced a gesture, for per-device latency data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputType {
    Scroll(ScrollType),
    Pinch(PinchType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatchStage {
    Generated,
    ArrivedInBrowserMain,
    ArrivedInRendererCompositor,
    RendererCompositorStarted,
    RendererCompositorFinished,
    RendererMainStarted,
    RendererMainFinished,
}

/// Timestamps of an event's trip through the input pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DispatchTimestamps {
    pub generated: Timestamp,
    #[serde(default)]
    pub arrived_in_browser_main: Option<Timestamp>,
    #[serde(default)]
    pub arrived_in_renderer_compositor: Option<Timestamp>,
    #[serde(default)]
    pub renderer_compositor_started: Option<Timestamp>,
    #[serde(default)]
    pub renderer_compositor_finished: Option<Timestamp>,
    #[serde(default)]
    pub renderer_main_started: Option<Timestamp>,
    #[serde(default)]
    pub renderer_main_finished: Option<Timestamp>,
}

impl DispatchTimestamps {
    pub fn get(&self, stage: DispatchStage) -> Option<Timestamp> {
        match stage {
            DispatchStage::Generated => Some(self.generated),
            DispatchStage::ArrivedInBrowserMain => self.arrived_in_browser_main,
            DispatchStage::ArrivedInRendererCompositor => self.arrived_in_renderer_compositor,
            DispatchStage::RendererCompositorStarted => self.renderer_compositor_started,
            DispatchStage::RendererCompositorFinished => self.renderer_compositor_finished,
            DispatchStage::RendererMainStarted => self.renderer_main_started,
            DispatchStage::RendererMainFinished => self.renderer_main_finished,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollData {
    pub scroll_type: ScrollType,
    /// Begin-frame the event was dispatched under.
    #[serde(default)]
    pub begin_frame_args: Option<BeginFrameArgs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollUpdateData {
    pub scroll_type: ScrollType,
    #[serde(default)]
    pub begin_frame_args: Option<BeginFrameArgs>,
    #[serde(default)]
    pub delta: f32,
    #[serde(default)]
    pub predicted_delta: f32,
    #[serde(default = "one")]
    pub coalesced_event_count: i32,
    #[serde(default)]
    pub did_scroll: bool,
    /// Generation time of the last event coalesced into this one.
    pub last_timestamp: Timestamp,
    #[serde(default)]
    pub trace_id: Option<i64>,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinchData {
    pub pinch_type: PinchType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    #[default]
    Generic,
    Scroll(ScrollData),
    ScrollUpdate(ScrollUpdateData),
    Pinch(PinchData),
}

/// Bucketing used by the latency histograms of scroll events.
pub const SCROLL_LATENCY_BUCKETING: HistogramBucketing = HistogramBucketing {
    min: 1_000,
    max: 5_000_000,
    count: 100,
    version_suffix: ".v2",
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetrics {
    pub event_type: EventType,
    pub timestamps: DispatchTimestamps,
    /// The event cannot be shown before the main thread handled it.
    #[serde(default)]
    pub requires_main_thread_update: bool,
    #[serde(default)]
    pub has_smooth_input_event: bool,
    #[serde(default)]
    pub details: EventDetails,
}

impl EventMetrics {
    pub fn new(event_type: EventType, generated: Timestamp) -> Self {
        Self {
            event_type,
            timestamps: DispatchTimestamps {
                generated,
                ..DispatchTimestamps::default()
            },
            requires_main_thread_update: false,
            has_smooth_input_event: false,
            details: EventDetails::Generic,
        }
    }

    pub fn with_details(mut self, details: EventDetails) -> Self {
        self.details = details;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.event_type.name()
    }

    pub fn generated_timestamp(&self) -> Timestamp {
        self.timestamps.generated
    }

    pub fn dispatch_stage_timestamp(&self, stage: DispatchStage) -> Option<Timestamp> {
        self.timestamps.get(stage)
    }

    /// Scroll device, for both plain scroll events and scroll updates.
    pub fn scroll_type(&self) -> Option<ScrollType> {
        match &self.details {
            EventDetails::Scroll(s) => Some(s.scroll_type),
            EventDetails::ScrollUpdate(s) => Some(s.scroll_type),
            _ => None,
        }
    }

    pub fn pinch_type(&self) -> Option<PinchType> {
        match &self.details {
            EventDetails::Pinch(p) => Some(p.pinch_type),
            _ => None,
        }
    }

    pub fn input_type(&self) -> Option<InputType> {
        self.scroll_type()
            .map(InputType::Scroll)
            .or_else(|| self.pinch_type().map(InputType::Pinch))
    }

    pub fn as_scroll_update(&self) -> Option<&ScrollUpdateData> {
        match &self.details {
            EventDetails::ScrollUpdate(s) => Some(s),
            _ => None,
        }
    }

    /// Begin-frame args the scroll event was dispatched under.
    pub fn scroll_begin_frame_args(&self) -> Option<&BeginFrameArgs> {
        match &self.details {
            EventDetails::Scroll(s) => s.begin_frame_args.as_ref(),
            EventDetails::ScrollUpdate(s) => s.begin_frame_args.as_ref(),
            _ => None,
        }
    }

    /// Histogram bucketing specific to this event, if any. Events without
    /// one are reported with the default event latency bucketing.
    pub fn histogram_bucketing(&self) -> Option<&'static HistogramBucketing> {
        self.scroll_type().map(|_| &SCROLL_LATENCY_BUCKETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scroll_update() {
        let s = r#"{
            "event_type": "GestureScrollUpdate",
            "timestamps": {"generated": 10, "arrived_in_browser_main": 12},
            "details": {"kind": "scroll_update", "scroll_type": "Touchscreen", "delta": 4.0,
                        "predicted_delta": 5.0, "did_scroll": true, "last_timestamp": 11}
        }"#;
        let e: EventMetrics = serde_json::from_str(s).unwrap();

        assert_eq!(e.scroll_type(), Some(ScrollType::Touchscreen));
        assert_eq!(e.as_scroll_update().map(|s| s.coalesced_event_count), Some(1));
        assert_eq!(e.dispatch_stage_timestamp(DispatchStage::ArrivedInBrowserMain), Some(12));
        assert!(e.histogram_bucketing().is_some());
        assert!(!e.requires_main_thread_update);
    }

    #[test]
    fn test_generic_event() {
        let e = EventMetrics::new(EventType::KeyPressed, 5);

        assert_eq!(e.input_type(), None);
        assert!(e.histogram_bucketing().is_none());
        assert_eq!(e.dispatch_stage_timestamp(DispatchStage::Generated), Some(5));
    }
}
