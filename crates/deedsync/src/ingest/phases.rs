//! Two-phase load ordering
//!
//! Details reference headers, so every header extract of every source has
//! to be loaded before the first detail lookup runs. The scheduler encodes
//! that as a type-state machine:
//!
//! ```text
//! LoadHeaders --load_headers--> Barrier --release--> LoadDetails --load_details--> Done
//! ```
//!
//! Each transition consumes the scheduler, so there is no way to load
//! details from `LoadHeaders` or to go back once a phase is over.

use std::fmt;
use std::marker::PhantomData;
use tracing::info;

use super::source::SourceFolder;
use super::store::RecordStore;
use super::{ExtractKind, Ingestor};
use crate::engine::{ResultAggregator, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadHeaders,
    Barrier,
    LoadDetails,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::LoadHeaders => "load-headers",
            Phase::Barrier => "barrier",
            Phase::LoadDetails => "load-details",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

mod sealed {
    pub trait Sealed {}
}

pub trait PhaseState: sealed::Sealed {
    const PHASE: Phase;
}

macro_rules! phase_state {
    ($name:ident) => {
        #[derive(Debug)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PhaseState for $name {
            const PHASE: Phase = Phase::$name;
        }
    };
}

phase_state!(LoadHeaders);
phase_state!(Barrier);
phase_state!(LoadDetails);
phase_state!(Done);

pub struct PhaseScheduler<'a, S, P> {
    ingestor: &'a Ingestor<S>,
    sources: &'a [SourceFolder],
    headers: ResultAggregator,
    details: ResultAggregator,
    _phase: PhantomData<P>,
}

impl<'a, S: RecordStore, P: PhaseState> PhaseScheduler<'a, S, P> {
    fn advance<N: PhaseState>(self) -> PhaseScheduler<'a, S, N> {
        info!(from = %P::PHASE, to = %N::PHASE, "Ingest phase transition");
        PhaseScheduler {
            ingestor: self.ingestor,
            sources: self.sources,
            headers: self.headers,
            details: self.details,
            _phase: PhantomData,
        }
    }
}

impl<'a, S: RecordStore> PhaseScheduler<'a, S, LoadHeaders> {
    pub fn new(ingestor: &'a Ingestor<S>, sources: &'a [SourceFolder]) -> Self {
        Self {
            ingestor,
            sources,
            headers: ResultAggregator::new("headers"),
            details: ResultAggregator::new("details"),
            _phase: PhantomData,
        }
    }

    /// Load every header extract; returns once all of them are finished.
    pub async fn load_headers(self) -> PhaseScheduler<'a, S, Barrier> {
        self.ingestor
            .load_phase(self.sources, ExtractKind::Header, &self.headers)
            .await;
        self.advance()
    }
}

impl<'a, S: RecordStore> PhaseScheduler<'a, S, Barrier> {
    pub fn release(self) -> PhaseScheduler<'a, S, LoadDetails> {
        let counts = self.headers.counts();
        info!(
            committed = counts.committed,
            skipped = counts.skipped,
            failed = counts.failed,
            "All header extracts loaded"
        );
        self.advance()
    }
}

impl<'a, S: RecordStore> PhaseScheduler<'a, S, LoadDetails> {
    pub async fn load_details(self) -> PhaseScheduler<'a, S, Done> {
        self.ingestor
            .load_phase(self.sources, ExtractKind::Detail, &self.details)
            .await;
        self.advance()
    }
}

impl<'a, S: RecordStore> PhaseScheduler<'a, S, Done> {
    /// Header and detail reports, in that order
    pub fn finish(self) -> (RunReport, RunReport) {
        (self.headers.report(), self.details.report())
    }
}
