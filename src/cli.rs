//! Command line interface.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::recorder::SinkSelection;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: ReplaySubCommand,

    /// Log debug diagnostics.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum ReplaySubCommand {
    /// Replay a recorded reporter trace and save the emitted metrics.
    Replay {
        /// Trace file.
        trace: PathBuf,

        /// Output directory. Defaults to a new dated directory in the
        /// current directory.
        #[arg(short, long)]
        output: Option<String>,

        /// Probability of recording compositor latency for a frame.
        #[arg(long, default_value_t = 1.0)]
        sampling_rate: f64,

        /// Do not record histograms.
        #[arg(long)]
        no_histograms: bool,

        /// Do not record structured latency records.
        #[arg(long)]
        no_ukm: bool,

        /// Do not record trace spans.
        #[arg(long)]
        no_traces: bool,

        /// Layer tree host id stamped on trace annotations.
        #[arg(long, default_value_t = 1)]
        layer_tree_host_id: i32,
    },

    /// Check a recorded trace for consistency problems.
    Validate {
        /// Trace file.
        trace: PathBuf,

        /// Layer tree host id stamped on trace annotations.
        #[arg(long, default_value_t = 1)]
        layer_tree_host_id: i32,
    },
}

impl Cli {
    pub fn trace_path(&self) -> &Path {
        match &self.command {
            ReplaySubCommand::Replay { trace, .. } | ReplaySubCommand::Validate { trace, .. } => trace,
        }
    }

    /// Output directory requested by the user, if any. Validation never
    /// writes output.
    pub fn output_dir(&self) -> Option<String> {
        match &self.command {
            ReplaySubCommand::Replay { output, .. } => output.clone(),
            ReplaySubCommand::Validate { .. } => None,
        }
    }

    pub fn writes_output(&self) -> bool {
        matches!(self.command, ReplaySubCommand::Replay { .. })
    }

    pub fn sampling_rate(&self) -> f64 {
        match &self.command {
            ReplaySubCommand::Replay { sampling_rate, .. } => *sampling_rate,
            ReplaySubCommand::Validate { .. } => 0.0,
        }
    }

    pub fn sinks(&self) -> SinkSelection {
        match &self.command {
            ReplaySubCommand::Replay {
                no_histograms,
                no_ukm,
                no_traces,
                ..
            } => SinkSelection {
                histograms: !no_histograms,
                ukm: !no_ukm,
                traces: !no_traces,
            },
            ReplaySubCommand::Validate { .. } => SinkSelection {
                histograms: false,
                ukm: false,
                traces: false,
            },
        }
    }

    pub fn layer_tree_host_id(&self) -> i32 {
        match &self.command {
            ReplaySubCommand::Replay { layer_tree_host_id, .. }
            | ReplaySubCommand::Validate { layer_tree_host_id, .. } => *layer_tree_host_id,
        }
    }
}
