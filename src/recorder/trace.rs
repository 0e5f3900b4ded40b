use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use serde::Serialize;

use crate::clock::Timestamp;
use crate::sinks::{TraceArgs, TraceSink};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "ph", rename_all = "snake_case")]
pub enum TraceRecord {
    Begin {
        track: u64,
        name: String,
        ts: Timestamp,
        args: TraceArgs,
    },
    End {
        track: u64,
        ts: Timestamp,
    },
    Instant {
        name: String,
        ts: Timestamp,
        args: TraceArgs,
    },
}

/// A begin/end pair, with its nesting depth on the track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSpan {
    pub track: u64,
    pub name: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct TraceRecorder {
    next_track: Cell<u64>,
    records: RefCell<Vec<TraceRecord>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Pairs begins and ends per track. Spans come out in begin order; an
    /// unmatched begin ends where it started.
    pub fn spans(&self) -> Vec<TraceSpan> {
        let mut spans = Vec::new();
        let mut open: HashMap<u64, Vec<usize>> = HashMap::new();

        for record in self.records.borrow().iter() {
            match record {
                TraceRecord::Begin { track, name, ts, .. } => {
                    let stack = open.entry(*track).or_default();
                    stack.push(spans.len());
                    spans.push(TraceSpan {
                        track: *track,
                        name: name.clone(),
                        start: *ts,
                        end: *ts,
                        depth: stack.len() - 1,
                    });
                }
                TraceRecord::End { track, ts } => {
                    match open.get_mut(track).and_then(Vec::pop) {
                        Some(i) => spans[i].end = *ts,
                        None => tracing::warn!(track, "unbalanced trace end"),
                    }
                }
                TraceRecord::Instant { .. } => {}
            }
        }

        spans
    }
}

impl TraceSink for TraceRecorder {
    fn next_track_id(&self) -> u64 {
        let id = self.next_track.get();
        self.next_track.set(id + 1);
        id
    }

    fn begin(&self, track: u64, name: &str, ts: Timestamp, args: TraceArgs) {
        self.records.borrow_mut().push(TraceRecord::Begin {
            track,
            name: name.to_owned(),
            ts,
            args,
        });
    }

    fn end(&self, track: u64, ts: Timestamp) {
        self.records
            .borrow_mut()
            .push(TraceRecord::End { track, ts });
    }

    fn instant(&self, name: &str, ts: Timestamp, args: TraceArgs) {
        self.records.borrow_mut().push(TraceRecord::Instant {
            name: name.to_owned(),
            ts,
            args,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_per_track() {
        let t = TraceRecorder::new();
        let a = t.next_track_id();
        let b = t.next_track_id();
        assert_ne!(a, b);

        t.begin(a, "outer", 0, TraceArgs::None);
        t.begin(b, "other", 1, TraceArgs::None);
        t.begin(a, "inner", 2, TraceArgs::None);
        t.end(a, 3);
        t.end(b, 4);
        t.end(a, 5);

        let spans = t.spans();
        assert_eq!(spans.len(), 3);
        assert_eq!((spans[0].start, spans[0].end, spans[0].depth), (0, 5, 0));
        assert_eq!((spans[1].start, spans[1].end, spans[1].depth), (1, 4, 0));
        assert_eq!((spans[2].start, spans[2].end, spans[2].depth), (2, 3, 1));
    }
}
