//! Trace replayer.
//!
//! Applies a recorded trace to live reporters wired to the in-memory
//! recorders, then saves everything they emitted in the output directory.

use anyhow::{anyhow, Result};

use super::engine::ReplayEngine;
use crate::{
    context::ReplayContext,
    frame_info::FrameFinalState,
    io::{OutputFile, ReplayOutputDirectory},
    recorder::{Recorders, SinkSelection},
    trace::ReplayEvent,
    EventProcessor, EventSource,
};

#[derive(Debug, Default)]
struct FrameCounts {
    presented: usize,
    partial: usize,
    dropped: usize,
    no_update: usize,
}

pub struct Replayer {
    output_dir: ReplayOutputDirectory,
    sinks: SinkSelection,
    recorders: Recorders,
    engine: ReplayEngine,
    skipped: usize,
}

impl TryFrom<&ReplayContext> for Replayer {
    type Error = anyhow::Error;

    fn try_from(ctx: &ReplayContext) -> Result<Self> {
        let output_dir = ctx
            .output_dir
            .clone()
            .ok_or_else(|| anyhow!("Replay needs an output directory"))?;
        let recorders = Recorders::new();
        let engine = ReplayEngine::new(recorders.select(ctx.sampler, ctx.sinks), ctx.layer_tree_host_id);

        Ok(Self {
            output_dir,
            sinks: ctx.sinks,
            recorders,
            engine,
            skipped: 0,
        })
    }
}

impl Replayer {
    fn frame_counts(&self) -> FrameCounts {
        let mut ret = FrameCounts::default();

        for frame in self.recorders.frames.sorted() {
            match frame.info.final_state {
                FrameFinalState::PresentedAll => ret.presented += 1,
                FrameFinalState::PresentedPartialOldMain | FrameFinalState::PresentedPartialNewMain => {
                    ret.partial += 1
                }
                FrameFinalState::Dropped => ret.dropped += 1,
                FrameFinalState::NoUpdateDesired => ret.no_update += 1,
            }
        }

        ret
    }

    fn save_results(&self) -> Result<()> {
        let dir = &self.output_dir;

        dir.save(OutputFile::Frames, &self.recorders.frames.sorted())?;
        dir.save(OutputFile::Jank, &self.recorders.jank.summary())?;

        if self.sinks.histograms {
            dir.save(OutputFile::Histograms, &self.recorders.histograms.summaries())?;
        }
        if self.sinks.ukm {
            dir.save(OutputFile::Ukm, &self.recorders.ukm.summary())?;
        }
        if self.sinks.traces {
            dir.save(OutputFile::Traces, &self.recorders.trace.records())?;
        }

        Ok(())
    }
}

impl EventProcessor for Replayer {
    fn pre_load_init(&mut self, _ctx: &ReplayContext) -> Result<()> {
        self.output_dir.create_dir()
    }

    fn post_load_init(&mut self, _ctx: &ReplayContext) -> Result<()> {
        Ok(())
    }

    fn consume_event(&mut self, event: ReplayEvent, _ctx: &ReplayContext) {
        let ts = event.ts;
        if let Err(e) = self.engine.apply(event) {
            tracing::warn!(ts, error = %e, "skipping trace record");
            self.skipped += 1;
        }
    }

    fn finalize<S: EventSource>(&mut self, src: &S, _ctx: &ReplayContext) -> Result<()> {
        self.engine.release_all();
        self.recorders.frames.flush();

        let counts = self.frame_counts();
        tracing::info!(
            records = src.events_read(),
            skipped = self.skipped,
            presented = counts.presented,
            partial = counts.partial,
            dropped = counts.dropped,
            no_update = counts.no_update,
            "replay done"
        );

        self.save_results()?;

        eprintln!("Results saved in {}.", self.output_dir.path());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::trace::reader::TraceReader;

    const TRACE: &str = r#"[
{"ts": 0, "reporter": 1, "op": "begin", "args": {"frame_id": {"source_id": 1, "sequence_number": 1}, "frame_time": 0, "interval": 16000000}, "active_trackers": ["WheelScroll"]},
{"ts": 0, "reporter": 1, "op": "start_stage", "stage": "BeginImplFrameToSendBeginMainFrame"},
{"ts": 2000000, "reporter": 1, "op": "start_stage", "stage": "EndActivateToSubmitCompositorFrame"},
{"ts": 3000000, "reporter": 1, "op": "start_stage", "stage": "SubmitCompositorFrameToPresentationCompositorFrame"},
{"ts": 9000000, "reporter": 1, "op": "terminate", "status": "PresentedFrame"},
{"ts": 9000000, "reporter": 1, "op": "release"},
{"ts": 9000000, "reporter": 9, "op": "release"},
{"ts": 16000000, "reporter": 2, "op": "begin", "args": {"frame_id": {"source_id": 1, "sequence_number": 2}, "frame_time": 16000000, "interval": 16000000}},
{"ts": 16000000, "reporter": 2, "op": "start_stage", "stage": "BeginImplFrameToSendBeginMainFrame"},
{"ts": 20000000, "reporter": 2, "op": "terminate", "status": "DidNotPresentFrame"}
]
"#;

    #[test]
    fn test_replay_end_to_end() {
        let dir = std::env::temp_dir().join(format!("frame-reporter-replay-{}", std::process::id()));
        let trace_path = dir.join("trace.json");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&trace_path, TRACE).unwrap();

        let out = ReplayOutputDirectory::new(dir.join("out").to_string_lossy().to_string());
        let ctx = ReplayContext {
            output_dir: Some(out.clone()),
            ..ReplayContext::default()
        };

        let mut processor = Replayer::try_from(&ctx).unwrap();
        processor.pre_load_init(&ctx).unwrap();
        TraceReader::new(&trace_path)
            .start()
            .process_events(processor, &ctx)
            .unwrap();

        let frames: serde_json::Value =
            serde_json::from_reader(File::open(out.file_path(OutputFile::Frames)).unwrap()).unwrap();
        let frames = frames.as_array().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["info"]["final_state"], "PresentedAll");
        assert_eq!(frames[1]["info"]["final_state"], "Dropped");

        let histograms: serde_json::Value =
            serde_json::from_reader(File::open(out.file_path(OutputFile::Histograms)).unwrap()).unwrap();
        let total = histograms
            .as_array()
            .unwrap()
            .iter()
            .find(|h| h["name"] == "CompositorLatency2.WheelScroll.TotalLatency")
            .unwrap();
        assert_eq!(total["count"], 1);
        assert_eq!(total["max"], 9000.0);

        assert!(out.file_path(OutputFile::Traces).exists());
        assert!(out.file_path(OutputFile::Ukm).exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
