//! In-memory metrics sinks.
//!
//! The replay processor and the tests plug these into the reporters and
//! read back what was emitted.

mod frames;
mod histograms;
mod jank;
mod trace;
mod ukm;

use std::rc::Rc;

pub use frames::{FrameSequenceSorter, SortedFrame};
pub use histograms::{HistogramRecorder, HistogramSummary};
pub use jank::{JankRecorder, JankSummary, ScrollDeltaPrediction};
pub use trace::{TraceRecord, TraceRecorder, TraceSpan};
pub use ukm::{CompositorLatencyRecord, EventLatencyRecord, UkmRecorder, UkmSummary};

use crate::sinks::{GlobalMetricsTrackers, MetricsSampler};

/// Which optional sinks are plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkSelection {
    pub histograms: bool,
    pub ukm: bool,
    pub traces: bool,
}

impl SinkSelection {
    pub fn all() -> Self {
        Self {
            histograms: true,
            ukm: true,
            traces: true,
        }
    }
}

impl Default for SinkSelection {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Default)]
pub struct Recorders {
    pub frames: Rc<FrameSequenceSorter>,
    pub histograms: Rc<HistogramRecorder>,
    pub ukm: Rc<UkmRecorder>,
    pub trace: Rc<TraceRecorder>,
    pub jank: Rc<JankRecorder>,
}

impl Recorders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trackers feeding every recorder.
    pub fn trackers(&self, sampler: MetricsSampler) -> GlobalMetricsTrackers {
        self.select(sampler, SinkSelection::all())
    }

    pub fn select(&self, sampler: MetricsSampler, selection: SinkSelection) -> GlobalMetricsTrackers {
        let mut ret = GlobalMetricsTrackers::new(self.frames.clone());

        if selection.histograms {
            ret.histograms = Some(self.histograms.clone());
        }
        if selection.ukm {
            ret.latency_ukm = Some(self.ukm.clone());
        }
        if selection.traces {
            ret.trace = Some(self.trace.clone());
        }
        ret.event_latency_tracker = Some(self.jank.clone());
        ret.predictor_jank_tracker = Some(self.jank.clone());
        ret.scroll_jank_dropped_frame_tracker = Some(self.jank.clone());
        ret.sampler = sampler;

        ret
    }
}
