//! OxiDL - Incremental Difference-Logic Theory Solver
//!
//! This crate implements the theory-solver side of a DPLL(T) loop for
//! difference logic: conjunctions of atoms of the form `x - y <= c`
//! and `x - y = c` over the rationals or integers. Satisfiability of
//! such a conjunction reduces to the absence of a negative cycle in a
//! weighted constraint graph, maintained incrementally with a vertex
//! potential function in the style of Cotton and Maler.
//!
//! The solver supports:
//! - Incremental assertion with backtrackable checkpoints
//! - Minimal conflict explanations read off the negative cycle
//! - Theory propagation of subsumed atoms (heavy edges)
//! - Craig interpolation over partitioned conflicts
//!
//! # Examples
//!
//! ```
//! use oxidl::DlSolver;
//!
//! let mut solver: DlSolver = DlSolver::new();
//! let (x, y) = {
//!     let tm = solver.terms_mut();
//!     (tm.mk_var("x"), tm.mk_var("y"))
//! };
//! let a1 = {
//!     let tm = solver.terms_mut();
//!     tm.mk_diff_leq(x, y, 3)
//! };
//! let a2 = {
//!     let tm = solver.terms_mut();
//!     tm.mk_diff_leq(y, x, -4)
//! };
//! solver.inform(a1).unwrap();
//! solver.inform(a2).unwrap();
//!
//! assert_eq!(solver.assert_lit(a1, true), Ok(true));
//! // x - y <= 3 together with y - x <= -4 closes a negative cycle.
//! assert_eq!(solver.assert_lit(a2, true), Ok(false));
//! assert_eq!(solver.conflict().len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod config;
mod detector;
pub mod error;
pub mod graph;
mod interpolate;
pub mod num;
pub mod propagate;
pub mod solver;
pub mod stamp;

pub use ast::{TermId, TermKind, TermManager};
pub use config::{DlConfig, ItpAlgorithm};
pub use error::{DlError, Result};
pub use graph::{EdgeId, VertexId};
pub use num::DlNumber;
pub use propagate::Deduction;
pub use solver::{CycleEdge, DlSolver, DlStats};
