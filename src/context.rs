//! Replay runtime parameters.
//!
//! This module defines the `ReplayContext` struct containing all the
//! parameters needed at runtime. It is meant to be built from command line
//! parameters.
//! ```no_run
//! use frame_reporter::{cli::Cli, context::ReplayContext};
//! use clap::Parser;
//!
//! let args = Cli::parse();
//! let ctx = ReplayContext::try_from(&args).unwrap();
//! ```
//! Please note that actual default parameters are defined in the `cli`
//! module.

use anyhow::bail;

use crate::cli::Cli;
use crate::io::ReplayOutputDirectory;
use crate::recorder::SinkSelection;
use crate::sinks::MetricsSampler;

pub struct ReplayContext {
    /// Output directory. `None` for subcommands that write nothing.
    pub output_dir: Option<ReplayOutputDirectory>,
    pub verbose: bool,

    /// Compositor latency subsampling.
    pub sampler: MetricsSampler,
    /// Optional sinks plugged into the reporters.
    pub sinks: SinkSelection,
    pub layer_tree_host_id: i32,
}

impl Default for ReplayContext {
    fn default() -> Self {
        Self {
            output_dir: None,
            verbose: false,
            sampler: MetricsSampler::always(),
            sinks: SinkSelection::all(),
            layer_tree_host_id: 1,
        }
    }
}

impl TryFrom<&Cli> for ReplayContext {
    type Error = anyhow::Error;

    fn try_from(cli_opts: &Cli) -> anyhow::Result<Self> {
        let sampling_rate = cli_opts.sampling_rate();
        if !(0.0..=1.0).contains(&sampling_rate) {
            bail!("Sampling rate must be between 0 and 1, got {}", sampling_rate);
        }

        let output_dir = if cli_opts.writes_output() {
            Some(ReplayOutputDirectory::try_from(cli_opts)?)
        } else {
            None
        };

        Ok(Self {
            output_dir,
            verbose: cli_opts.verbose,
            sampler: MetricsSampler::new(sampling_rate),
            sinks: cli_opts.sinks(),
            layer_tree_host_id: cli_opts.layer_tree_host_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn replay_with_rate(rate: &str) -> anyhow::Result<ReplayContext> {
        let cli = Cli::try_parse_from([
            "frame-reporter",
            "replay",
            "trace.json",
            "-o",
            "out",
            "--sampling-rate",
            rate,
        ])?;
        ReplayContext::try_from(&cli)
    }

    #[test]
    fn test_sampling_rate_bounds() {
        let ctx = replay_with_rate("0.25").unwrap();
        assert_eq!(ctx.sampler.probability(), 0.25);
        assert_eq!(ctx.output_dir.unwrap().path(), "out");

        assert!(replay_with_rate("0").is_ok());
        assert!(replay_with_rate("1").is_ok());
        assert!(replay_with_rate("1.5").is_err());
        assert!(replay_with_rate("-0.1").is_err());
        assert!(replay_with_rate("NaN").is_err());
        assert!(replay_with_rate("inf").is_err());
    }
}
