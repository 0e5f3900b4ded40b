use anyhow::{Error, Result};
use clap::Parser;
use frame_reporter::{
    cli::{Cli, ReplaySubCommand},
    context::ReplayContext,
    processors::{replay::Replayer, validate::TraceValidator},
    trace::reader::TraceReader,
    EventProcessor, EventSource,
};
use tracing::Level;

pub fn run<C: EventProcessor>(mut command: C, opts: &Cli, ctx: ReplayContext) -> Result<()> {
    command.pre_load_init(&ctx)?;

    TraceReader::new(opts.trace_path())
        .start()
        .process_events(command, &ctx)
}

fn main() -> Result<(), Error> {
    let opts = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if opts.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let ctx = ReplayContext::try_from(&opts)?;

    match &opts.command {
        ReplaySubCommand::Replay { .. } => {
            let processor = Replayer::try_from(&ctx)?;

            run(processor, &opts, ctx)
        }
        ReplaySubCommand::Validate { .. } => {
            let processor = TraceValidator::from(&ctx);

            run(processor, &opts, ctx)
        }
    }
}
