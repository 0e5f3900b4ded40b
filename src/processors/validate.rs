//! Trace validator.
//!
//! Replays a trace without recording metrics and reports every record that
//! could not be applied.

use anyhow::{bail, Result};

use super::{engine::ReplayEngine, ReplayError};
use crate::{
    context::ReplayContext,
    recorder::{Recorders, SinkSelection},
    sinks::MetricsSampler,
    trace::ReplayEvent,
    EventProcessor, EventSource,
};

pub struct TraceValidator {
    recorders: Recorders,
    engine: ReplayEngine,
    records: usize,
    problems: Vec<(usize, ReplayError)>,
}

impl From<&ReplayContext> for TraceValidator {
    fn from(ctx: &ReplayContext) -> Self {
        let recorders = Recorders::new();
        let sinks = SinkSelection {
            histograms: false,
            ukm: false,
            traces: false,
        };
        let engine = ReplayEngine::new(
            recorders.select(MetricsSampler::new(0.0), sinks),
            ctx.layer_tree_host_id,
        );

        Self {
            recorders,
            engine,
            records: 0,
            problems: Vec::new(),
        }
    }
}

impl TraceValidator {
    /// Problems found so far, with the index of the offending record.
    pub fn problems(&self) -> &[(usize, ReplayError)] {
        &self.problems
    }
}

impl EventProcessor for TraceValidator {
    fn pre_load_init(&mut self, _ctx: &ReplayContext) -> Result<()> {
        Ok(())
    }

    fn post_load_init(&mut self, _ctx: &ReplayContext) -> Result<()> {
        Ok(())
    }

    fn consume_event(&mut self, event: ReplayEvent, _ctx: &ReplayContext) {
        self.records += 1;
        if let Err(e) = self.engine.apply(event) {
            self.problems.push((self.records, e));
        }
    }

    fn finalize<S: EventSource>(&mut self, src: &S, _ctx: &ReplayContext) -> Result<()> {
        let leaked = self.engine.live_reporters();
        self.engine.release_all();
        self.recorders.frames.flush();

        eprintln!(
            "{} records, {} frames, {} reporters never released.",
            src.events_read(),
            self.recorders.frames.sorted().len(),
            leaked
        );

        for (record, problem) in &self.problems {
            eprintln!("record {}: {}", record, problem);
        }

        if !self.problems.is_empty() {
            bail!("{} problems found", self.problems.len());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::ReporterOp;

    #[test]
    fn test_collects_problems() {
        let ctx = ReplayContext::default();
        let mut v = TraceValidator::from(&ctx);

        v.consume_event(ReplayEvent::new(0, 1, ReporterOp::FinishImplFrame), &ctx);
        v.consume_event(ReplayEvent::new(0, 1, ReporterOp::Adopt { child: 2 }), &ctx);

        assert_eq!(
            v.problems(),
            &[
                (1, ReplayError::UnknownReporter(1)),
                (2, ReplayError::UnknownReporter(2)),
            ]
        );
    }
}
