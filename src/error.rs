//! Error Types for the Difference-Logic Core.
//!
//! Only programmer-error conditions surface as `Err`: a malformed atom
//! handed to bundle construction, or an atom that was never registered.
//! Theory inconsistency is *not* an error; `assert_lit` and `check`
//! report it through their boolean result together with a conflict
//! explanation.

use crate::ast::TermId;
use thiserror::Error;

/// Error type for difference-logic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DlError {
    /// An atom does not match any supported difference-constraint shape.
    ///
    /// This signals a bug in the upstream atom-recognition layer; the
    /// core refuses to guess.
    #[error("malformed difference atom {atom:?}: {reason}")]
    MalformedAtom {
        /// The offending atom.
        atom: TermId,
        /// What was wrong with its shape.
        reason: String,
    },
    /// An atom was asserted without a prior `inform` call.
    #[error("atom {0:?} was asserted but never informed")]
    UnregisteredAtom(TermId),
    /// A constraint coefficient is not representable in the active
    /// weight type (e.g. overflow of a fixed-width rational).
    #[error("constraint coefficient {0} is not representable in the weight type")]
    UnrepresentableWeight(String),
}

/// Result type for difference-logic operations.
pub type Result<T> = std::result::Result<T, DlError>;
