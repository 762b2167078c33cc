//! Reset arbitration: pluggable source predicates, the OR gate and the
//! one-shot latch.
//!
//! [`ResetArbiter::evaluate`] is the safety-critical decision.  It samples
//! every [`ResetSource`], records asserted sources in [`ResetSources`], ORs
//! them, and wins the latch at most once per process lifetime.  The
//! arbitrator never reads its own reset output, so the pulse it issues
//! cannot re-trigger it.

use std::sync::Arc;

use sentinel_hal::InputLine;
use sentinel_types::ResetSourceKind;

use crate::state::{ResetSnapshot, ResetSources};

/// A single reset-source predicate.
pub trait ResetSource: Send + Sync {
    fn kind(&self) -> ResetSourceKind;
    fn is_asserted(&self) -> bool;
}

/// Source backed by a digital input (power supervisor, reset button).
pub struct LineSource {
    kind: ResetSourceKind,
    line: Arc<dyn InputLine>,
}

impl LineSource {
    pub fn new(kind: ResetSourceKind, line: Arc<dyn InputLine>) -> Self {
        Self { kind, line }
    }
}

impl ResetSource for LineSource {
    fn kind(&self) -> ResetSourceKind {
        self.kind
    }

    fn is_asserted(&self) -> bool {
        self.line.is_high()
    }
}

/// Stub for a source with no physical sensor on this board.
pub struct NeverAsserted(pub ResetSourceKind);

impl ResetSource for NeverAsserted {
    fn kind(&self) -> ResetSourceKind {
        self.0
    }

    fn is_asserted(&self) -> bool {
        false
    }
}

/// Decision of one arbitration cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arbitration {
    /// No source asserted.
    Idle,
    /// This cycle won the latch: perform the shutdown and reset pulse.
    Fire { sources: Vec<ResetSourceKind> },
    /// A reset has already been latched; nothing more to do.
    Latched,
}

pub struct ResetArbiter {
    flags: Arc<ResetSources>,
    sources: Vec<Box<dyn ResetSource>>,
}

impl ResetArbiter {
    /// An arbiter over `flags` plus the given line-level predicates.
    ///
    /// The watchdog and software sources are always read from `flags`
    /// directly; `sources` adds predicates that must be sampled.
    pub fn new(flags: Arc<ResetSources>, sources: Vec<Box<dyn ResetSource>>) -> Self {
        Self { flags, sources }
    }

    pub fn flags(&self) -> &Arc<ResetSources> {
        &self.flags
    }

    pub fn evaluate(&self) -> Arbitration {
        for source in &self.sources {
            if source.is_asserted() {
                self.flags.assert(source.kind());
            }
        }
        if self.flags.is_latched() {
            return Arbitration::Latched;
        }
        let snapshot: ResetSnapshot = self.flags.snapshot();
        if !snapshot.combined() {
            return Arbitration::Idle;
        }
        if self.flags.try_latch() {
            Arbitration::Fire {
                sources: snapshot.asserted(),
            }
        } else {
            Arbitration::Latched
        }
    }
}
