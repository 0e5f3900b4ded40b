//! Per-frame compositor latency reporting.
//!
//! A compositor pipeline creates one `FrameReporter` per begin-frame it
//! handles. The reporter collects stage transitions, main-thread and
//! display-compositor timings and the input events the frame serves, then
//! classifies the frame (presented, partially presented, dropped or not
//! needed) and emits latency histograms, structured records, trace spans and
//! scroll jank data to injected sinks.
//!
//! The crate also ships an offline tool replaying recorded reporter traces.
//! Its components are either __event sources__ or __event processors__:
//! - An event source produces a stream of replay records. It implements the
//!   `EventSource` trait. Currently, the only source is a trace file.
//! - An event processor consumes that stream. It implements the
//!   `EventProcessor` trait. There is one processor per subcommand: the
//!   replayer and the trace validator.

pub mod cli;
pub mod utils;

pub mod clock;
pub mod interval;

pub mod breakdown;
pub mod event_metrics;
pub mod frame_info;
pub mod stage;
pub mod timing;
pub mod trackers;

pub mod reporter;
pub mod sinks;

pub mod recorder;
pub mod trace;

pub mod context;
pub mod processors;

pub mod io;

use anyhow::Result;

use crate::{context::ReplayContext, trace::ReplayEvent};

/// Feeds an `EventProcessor` with a stream of events.
pub trait EventSource: Sized {
    /// Consume and feed all events to the supplied processor.
    fn event_loop<P: EventProcessor>(&mut self, processor: &mut P, ctx: &ReplayContext) -> Result<()>;

    /// Process the events with the supplied `EventProcessor`.
    fn process_events<P: EventProcessor>(&mut self, mut processor: P, ctx: &ReplayContext) -> Result<()> {
        processor.post_load_init(ctx)?;

        self.event_loop(&mut processor, ctx)?;

        processor.finalize(self, ctx)
    }

    /// Number of events fed so far.
    fn events_read(&self) -> usize;
}

/// Consumes a stream of events.
pub trait EventProcessor {
    /// Initialize the processor before supplying it to an event source.
    fn pre_load_init(&mut self, ctx: &ReplayContext) -> Result<()>;

    /// Initialize the processor after it has been supplied to an event source.
    fn post_load_init(&mut self, ctx: &ReplayContext) -> Result<()>;

    /// Process an event
    fn consume_event(&mut self, event: ReplayEvent, ctx: &ReplayContext);

    /// Destructor function
    fn finalize<S: EventSource>(&mut self, src: &S, ctx: &ReplayContext) -> Result<()>;
}
