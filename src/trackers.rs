//! Frame sequence trackers.
//!
//! A frame can be part of several ongoing interactions or animations at once
//! (a wheel scroll while a compositor animation runs, ...). Each one is a
//! tracker type; the set active when the frame began is carried by the
//! reporter and fans out its latency histograms per tracker.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrameSequenceTrackerType {
    CompositorAnimation,
    MainThreadAnimation,
    PinchZoom,
    RAF,
    TouchScroll,
    Video,
    WheelScroll,
    ScrollbarScroll,
    CustomTracker,
    CanvasAnimation,
    JSAnimation,
    SETMainThreadAnimation,
    SETCompositorAnimation,
    CompositorRasterAnimation,
    CompositorNativeAnimation,
}

impl FrameSequenceTrackerType {
    pub const COUNT: usize = 15;

    pub const ALL: [FrameSequenceTrackerType; Self::COUNT] = [
        FrameSequenceTrackerType::CompositorAnimation,
        FrameSequenceTrackerType::MainThreadAnimation,
        FrameSequenceTrackerType::PinchZoom,
        FrameSequenceTrackerType::RAF,
        FrameSequenceTrackerType::TouchScroll,
        FrameSequenceTrackerType::Video,
        FrameSequenceTrackerType::WheelScroll,
        FrameSequenceTrackerType::ScrollbarScroll,
        FrameSequenceTrackerType::CustomTracker,
        FrameSequenceTrackerType::CanvasAnimation,
        FrameSequenceTrackerType::JSAnimation,
        FrameSequenceTrackerType::SETMainThreadAnimation,
        FrameSequenceTrackerType::SETCompositorAnimation,
        FrameSequenceTrackerType::CompositorRasterAnimation,
        FrameSequenceTrackerType::CompositorNativeAnimation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FrameSequenceTrackerType::CompositorAnimation => "CompositorAnimation",
            FrameSequenceTrackerType::MainThreadAnimation => "MainThreadAnimation",
            FrameSequenceTrackerType::PinchZoom => "PinchZoom",
            FrameSequenceTrackerType::RAF => "RAF",
            FrameSequenceTrackerType::TouchScroll => "TouchScroll",
            FrameSequenceTrackerType::Video => "Video",
            FrameSequenceTrackerType::WheelScroll => "WheelScroll",
            FrameSequenceTrackerType::ScrollbarScroll => "ScrollbarScroll",
            FrameSequenceTrackerType::CustomTracker => "Custom",
            FrameSequenceTrackerType::CanvasAnimation => "CanvasAnimation",
            FrameSequenceTrackerType::JSAnimation => "JSAnimation",
            FrameSequenceTrackerType::SETMainThreadAnimation => "SETMainThreadAnimation",
            FrameSequenceTrackerType::SETCompositorAnimation => "SETCompositorAnimation",
            FrameSequenceTrackerType::CompositorRasterAnimation => "CompositorRasterAnimation",
            FrameSequenceTrackerType::CompositorNativeAnimation => "CompositorNativeAnimation",
        }
    }

    fn bit(&self) -> u32 {
        1 << (*self as u32)
    }
}

impl Display for FrameSequenceTrackerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of tracker types.
///
/// ```
/// use frame_reporter::trackers::{ActiveTrackers, FrameSequenceTrackerType};
///
/// let mut t = ActiveTrackers::default();
/// t.insert(FrameSequenceTrackerType::WheelScroll);
///
/// assert!(t.contains(FrameSequenceTrackerType::WheelScroll));
/// assert_eq!(t.iter().count(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FrameSequenceTrackerType>", into = "Vec<FrameSequenceTrackerType>")]
pub struct ActiveTrackers {
    bits: u32,
}

impl ActiveTrackers {
    pub fn insert(&mut self, t: FrameSequenceTrackerType) {
        self.bits |= t.bit();
    }

    pub fn contains(&self, t: FrameSequenceTrackerType) -> bool {
        self.bits & t.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Active tracker types, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = FrameSequenceTrackerType> + '_ {
        FrameSequenceTrackerType::ALL
            .into_iter()
            .filter(move |t| self.contains(*t))
    }

    pub fn has_main_thread_animation(&self) -> bool {
        use FrameSequenceTrackerType::*;

        [MainThreadAnimation, SETMainThreadAnimation, CanvasAnimation, JSAnimation, RAF]
            .into_iter()
            .any(|t| self.contains(t))
    }

    pub fn has_compositor_thread_animation(&self) -> bool {
        use FrameSequenceTrackerType::*;

        [
            CompositorAnimation,
            SETCompositorAnimation,
            CompositorRasterAnimation,
            CompositorNativeAnimation,
        ]
        .into_iter()
        .any(|t| self.contains(t))
    }
}

impl FromIterator<FrameSequenceTrackerType> for ActiveTrackers {
    fn from_iter<I: IntoIterator<Item = FrameSequenceTrackerType>>(iter: I) -> Self {
        let mut ret = Self::default();
        for t in iter {
            ret.insert(t);
        }
        ret
    }
}

impl From<Vec<FrameSequenceTrackerType>> for ActiveTrackers {
    fn from(v: Vec<FrameSequenceTrackerType>) -> Self {
        v.into_iter().collect()
    }
}

impl From<ActiveTrackers> for Vec<FrameSequenceTrackerType> {
    fn from(t: ActiveTrackers) -> Self {
        t.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_animation_classes() {
        let t: ActiveTrackers = [FrameSequenceTrackerType::RAF].into_iter().collect();
        assert!(t.has_main_thread_animation());
        assert!(!t.has_compositor_thread_animation());

        let t: ActiveTrackers = [FrameSequenceTrackerType::CompositorNativeAnimation]
            .into_iter()
            .collect();
        assert!(t.has_compositor_thread_animation());
    }

    #[test]
    fn test_parse_from_list() {
        let t: ActiveTrackers = serde_json::from_str(r#"["Video", "PinchZoom"]"#).unwrap();
        let v: Vec<FrameSequenceTrackerType> = t.iter().collect();

        assert_eq!(
            v,
            vec![FrameSequenceTrackerType::PinchZoom, FrameSequenceTrackerType::Video]
        );
    }
}
