//! Configuration for the Difference-Logic Core.
//!
//! A static set of options consulted read-only by the solver. Mirrors
//! the option surface the surrounding search engine exposes.

use serde::{Deserialize, Serialize};

/// Labeling rule for AB-shared atoms during interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItpAlgorithm {
    /// McMillan's rule: shared atoms are colored B.
    #[default]
    McMillan,
    /// Dual (McMillan') rule: shared atoms are colored A.
    McMillanPrime,
    /// Pudlák's rule; for difference logic this coincides with the
    /// weaker B-side split.
    Pudlak,
}

/// Options recognized by the difference-logic solver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DlConfig {
    /// When set, equalities are split into inequality pairs upstream;
    /// the solver handles a positive equality eagerly and rejects
    /// negated equalities instead of deferring a case-split.
    pub split_equalities: bool,
    /// Enables heavy-edge theory propagation after successful asserts.
    pub theory_propagation: bool,
    /// Enables interpolation bookkeeping on conflicts.
    pub produce_interpolants: bool,
    /// Which labeling rule classifies AB-shared atoms.
    pub interpolation_algo: ItpAlgorithm,
}
