//! Recorded trace reader.

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
    sync::mpsc::Receiver,
};

use anyhow::{anyhow, Context, Result};

use crate::{context::ReplayContext, trace::ReplayEvent, EventProcessor, EventSource};

struct TraceEvents<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> TraceEvents<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    #[inline]
    fn is_start_line(line: &str) -> bool {
        line.trim() == "["
    }

    #[inline]
    fn is_end_line(line: &str) -> bool {
        line.trim() == "]"
    }

    fn parse_line(line: &str) -> Result<ReplayEvent> {
        let start = line
            .find('{')
            .ok_or_else(|| anyhow!("Record start ('{{') not found in line: {}", line))?;
        let end = line
            .rfind('}')
            .ok_or_else(|| anyhow!("Record end ('}}') not found in line: {}", line))?
            + 1;
        let event: ReplayEvent = serde_json::from_str(&line[start..end])?;
        Ok(event)
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        loop {
            let res_line = self.lines.next()?;
            self.line_no += 1;
            match res_line {
                Ok(ref line) if Self::is_start_line(line) || line.trim().is_empty() => continue,
                Ok(ref line) if Self::is_end_line(line) => return None,
                _ => return Some(res_line.map_err(anyhow::Error::from)),
            }
        }
    }
}

impl<R: BufRead> Iterator for TraceEvents<R> {
    type Item = Result<ReplayEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.next_line()?;
        let line_no = self.line_no;
        Some(line.and_then(|l| Self::parse_line(&l)).with_context(|| format!("line {}", line_no)))
    }
}

impl From<File> for TraceEvents<BufReader<File>> {
    fn from(file: File) -> Self {
        Self::new(BufReader::new(file))
    }
}

/// Reads a replay trace on a separate thread and feeds its records to a
/// processor.
pub struct TraceReader {
    path: PathBuf,
    rx: Option<Receiver<ReplayEvent>>,
    event_reader: Option<std::thread::JoinHandle<Result<()>>>,
    events_read: usize,
}

impl TraceReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            rx: None,
            event_reader: None,
            events_read: 0,
        }
    }

    pub fn start(mut self) -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<ReplayEvent>();

        let path = self.path.clone();

        self.rx = Some(rx);

        self.event_reader = Some(std::thread::spawn(move || -> Result<()> {
            let file = File::open(&path).with_context(|| format!("Cannot open trace {}", path.display()))?;

            for event in TraceEvents::from(file) {
                let e = event.with_context(|| format!("Malformed trace {}", path.display()))?;
                tx.send(e)?;
            }

            Ok(())
        }));

        self
    }
}

impl EventSource for TraceReader {
    fn event_loop<E: EventProcessor>(&mut self, processor: &mut E, ctx: &ReplayContext) -> Result<()> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| anyhow!("Trace reader was not started"))?;

        for event in rx.iter() {
            self.events_read += 1;
            processor.consume_event(event, ctx);
        }

        let handle = self
            .event_reader
            .take()
            .ok_or_else(|| anyhow!("Trace reader was not started"))?;
        handle
            .join()
            .map_err(|_| anyhow!("Trace reader thread panicked"))?
    }

    fn events_read(&self) -> usize {
        self.events_read
    }
}
