//! Event processors.
//!
//! This module contains the front-end of the replay tool's event processors.
//! Each of these processors is invoked by a different CLI subcommand. Both
//! drive a `ReplayEngine`, which applies trace records to live reporters.

pub mod engine;
pub mod replay;
pub mod validate;

use thiserror::Error;

use crate::clock::Timestamp;
use crate::trace::ReporterId;

/// A trace record that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("reporter {0} does not exist")]
    UnknownReporter(ReporterId),

    #[error("reporter {0} already exists")]
    DuplicateReporter(ReporterId),

    #[error("reporter {0} cannot be forked")]
    ForkRefused(ReporterId),

    #[error("reporter {reporter} cannot depend on reporter {decider}")]
    DeciderRefused {
        reporter: ReporterId,
        decider: ReporterId,
    },

    #[error("reporter {parent} cannot adopt reporter {child}")]
    AdoptRefused { parent: ReporterId, child: ReporterId },

    #[error("reporter {0} was already adopted")]
    AlreadyAdopted(ReporterId),

    #[error("time went backwards: {ts} after {last}")]
    NonMonotonic { ts: Timestamp, last: Timestamp },
}
