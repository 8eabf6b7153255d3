//! Difference-Logic Theory Solver.
//!
//! The facade a CDCL(T) search engine drives: `inform` registers
//! atoms, `assert_lit` activates their edges and checks consistency
//! incrementally, `push`/`pop` checkpoints bracket the search tree,
//! `check` resolves deferred disequality case-splits, and
//! `compute_model` reads a satisfying assignment off the potential
//! function. Conflicts are reported as deduplicated atom sets backed
//! by an explicit negative cycle; deductions found by heavy-edge
//! propagation are queued for the search engine to pick up.
//!
//! Single-threaded and synchronous: every call runs to completion, and
//! assert/check interleave with push/pop in a well-nested bracket
//! sequence mirroring the depth-first boolean search.

use crate::ast::{TermId, TermManager};
use crate::config::DlConfig;
use crate::detector::CycleDetector;
use crate::error::{DlError, Result};
use crate::graph::{DlGraph, EdgeId, EdgeState, VertexId};
use crate::interpolate;
use crate::num::DlNumber;
use crate::propagate::{self, Deduction};
use num_rational::BigRational;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// Composite snapshot of every undo stack, taken atomically by
/// `push_backtrack_point`.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    active: usize,
    pi: usize,
    asserted: usize,
    diseqs: usize,
    deductions: usize,
    deduced: usize,
}

/// One pending disequality during the case-split search.
#[derive(Debug)]
struct SplitFrame {
    atom: TermId,
    /// 0 = the false-side edge, 1 = the complementary strengthening.
    side: u8,
    /// Whether this activation pushed a probe onto the active trail;
    /// the unwind must only pop what the frame actually pushed.
    pushed: bool,
    /// Interpolants of the failed side-0 subtree, kept until the other
    /// side resolves (interpolation mode only).
    first_itp: Option<Vec<TermId>>,
}

/// One edge of the most recent conflict cycle, in walk order.
#[derive(Debug, Clone)]
pub struct CycleEdge {
    /// Owning atom.
    pub atom: TermId,
    /// Source vertex.
    pub from: VertexId,
    /// Target vertex.
    pub to: VertexId,
    /// Edge weight.
    pub weight: BigRational,
}

/// Counters kept while solving.
#[derive(Debug, Clone, Default)]
pub struct DlStats {
    /// Atoms registered via `inform`.
    pub informed: usize,
    /// `assert_lit` calls.
    pub asserts: usize,
    /// Incremental cycle checks run.
    pub detector_runs: usize,
    /// Conflicts found (asserts and case-split branches).
    pub conflicts: usize,
    /// Complete `check` calls that resolved disequalities.
    pub checks: usize,
    /// Case-split branches explored.
    pub split_branches: usize,
    /// Deductions produced by heavy-edge propagation.
    pub deductions: usize,
}

/// Incremental difference-logic solver over weight type `W`.
#[derive(Debug)]
pub struct DlSolver<W: DlNumber = BigRational> {
    terms: TermManager,
    config: DlConfig,
    graph: DlGraph<W>,
    detector: CycleDetector<W>,
    /// Activated edges, in activation order.
    active_trail: Vec<EdgeId>,
    /// Potential changes, in commit order, for checkpoint restore.
    pi_trail: Vec<(VertexId, W)>,
    /// Atoms whose polarity this solver set, for checkpoint restore.
    asserted_trail: Vec<TermId>,
    /// Atoms whose deduced flag this solver set.
    deduced_trail: Vec<TermId>,
    /// Equalities asserted false, awaiting case-split in `check`.
    diseq_stack: Vec<TermId>,
    checkpoints: Vec<Checkpoint>,
    /// Explanation of the most recent conflict, deduplicated.
    conflict: Vec<TermId>,
    /// The negative cycle behind it, in walk order.
    conflict_cycle: Vec<EdgeId>,
    /// Deductions awaiting the search engine.
    deductions: Vec<Deduction>,
    /// Interpolants of the most recent conflict, one per partition
    /// boundary.
    interpolants: Vec<TermId>,
    n_partitions: u32,
    stats: DlStats,
}

impl<W: DlNumber> Default for DlSolver<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: DlNumber> DlSolver<W> {
    /// Create a solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(DlConfig::default())
    }

    /// Create a solver with the given configuration.
    pub fn with_config(config: DlConfig) -> Self {
        Self {
            terms: TermManager::new(),
            config,
            graph: DlGraph::new(),
            detector: CycleDetector::new(),
            active_trail: Vec::new(),
            pi_trail: Vec::new(),
            asserted_trail: Vec::new(),
            deduced_trail: Vec::new(),
            diseq_stack: Vec::new(),
            checkpoints: Vec::new(),
            conflict: Vec::new(),
            conflict_cycle: Vec::new(),
            deductions: Vec::new(),
            interpolants: Vec::new(),
            n_partitions: 0,
            stats: DlStats::default(),
        }
    }

    /// Shared access to the term arena.
    pub fn terms(&self) -> &TermManager {
        &self.terms
    }

    /// Mutable access to the term arena, for building atoms.
    pub fn terms_mut(&mut self) -> &mut TermManager {
        &mut self.terms
    }

    /// The active configuration.
    pub fn config(&self) -> &DlConfig {
        &self.config
    }

    /// Solving counters.
    pub fn stats(&self) -> &DlStats {
        &self.stats
    }

    /// Current decision level (number of open backtrack points).
    pub fn decision_level(&self) -> u32 {
        self.checkpoints.len() as u32
    }

    /// Pre-register an atom's edge bundle. Must precede any assertion
    /// of the atom; has no effect on the active state and is
    /// idempotent.
    pub fn inform(&mut self, atom: TermId) -> Result<()> {
        let bundle = self.graph.get_or_build_bundle(&self.terms, atom)?;
        if self.config.theory_propagation && self.terms.polarity(atom).is_none() {
            for e in bundle.edges() {
                self.graph.track(e);
            }
        }
        if self.config.produce_interpolants {
            let mask = self.terms.partitions(atom);
            let bits = 64 - mask.leading_zeros();
            self.n_partitions = self.n_partitions.max(bits);
        }
        self.stats.informed += 1;
        Ok(())
    }

    /// Assert an atom with the given polarity.
    ///
    /// Returns `Ok(false)` on immediate inconsistency, with the
    /// explanation available from [`Self::conflict`]. A negated
    /// equality is deferred and always succeeds here; call
    /// [`Self::check`] with `complete = true` to resolve it.
    pub fn assert_lit(&mut self, atom: TermId, polarity: bool) -> Result<bool> {
        let bundle = self
            .graph
            .bundle(atom)
            .ok_or(DlError::UnregisteredAtom(atom))?;
        self.stats.asserts += 1;
        self.clear_conflict();

        // Re-asserting an atom with its current polarity must not grow
        // the undo trails: one trail entry per assignment keeps pops
        // exact and the disequality stack free of duplicates.
        if self.terms.polarity(atom) == Some(polarity) {
            return Ok(true);
        }

        self.terms.set_polarity(atom, polarity);
        self.asserted_trail.push(atom);
        for e in bundle.edges() {
            self.graph.untrack(e);
        }

        if bundle.is_equality() && !polarity {
            if self.config.split_equalities {
                return Err(DlError::MalformedAtom {
                    atom,
                    reason: "negated equality reached the solver with split_equalities enabled"
                        .to_string(),
                });
            }
            trace!(?atom, "deferring negated equality");
            self.diseq_stack.push(atom);
            return Ok(true);
        }

        let mut edges: SmallVec<[EdgeId; 2]> = SmallVec::new();
        if polarity {
            edges.push(bundle.pos);
            if let Some(pe) = bundle.pos_eq {
                edges.push(pe);
            }
        } else {
            edges.push(bundle.neg);
        }

        for eid in edges {
            if !self.activate_checked(eid) {
                self.record_conflict();
                debug!(?atom, conflict = self.conflict.len(), "assert_lit conflict");
                return Ok(false);
            }
            if self.config.theory_propagation {
                self.propagate_from(eid);
            }
        }
        Ok(true)
    }

    /// Open a new checkpoint.
    pub fn push_backtrack_point(&mut self) {
        self.checkpoints.push(Checkpoint {
            active: self.active_trail.len(),
            pi: self.pi_trail.len(),
            asserted: self.asserted_trail.len(),
            diseqs: self.diseq_stack.len(),
            deductions: self.deductions.len(),
            deduced: self.deduced_trail.len(),
        });
    }

    /// Undo everything since the matching `push_backtrack_point`, in
    /// exact reverse order of the original mutations.
    pub fn pop_backtrack_point(&mut self) {
        debug_assert!(!self.checkpoints.is_empty(), "pop without matching push");
        let Some(cp) = self.checkpoints.pop() else {
            return;
        };
        while self.active_trail.len() > cp.active {
            let Some(eid) = self.active_trail.pop() else {
                break;
            };
            self.graph.deactivate(eid);
        }
        while self.pi_trail.len() > cp.pi {
            let Some((vertex, old_pi)) = self.pi_trail.pop() else {
                break;
            };
            self.graph.vertices[vertex.index()].pi = old_pi;
        }
        self.diseq_stack.truncate(cp.diseqs);
        while self.asserted_trail.len() > cp.asserted {
            let Some(atom) = self.asserted_trail.pop() else {
                break;
            };
            self.terms.clear_polarity(atom);
            if self.config.theory_propagation {
                if let Some(bundle) = self.graph.bundle(atom) {
                    for e in bundle.edges() {
                        self.graph.track(e);
                    }
                }
            }
        }
        self.deductions.truncate(cp.deductions);
        while self.deduced_trail.len() > cp.deduced {
            let Some(atom) = self.deduced_trail.pop() else {
                break;
            };
            self.terms.clear_deduced(atom);
        }
        self.clear_conflict();
    }

    /// Check consistency of the current assignment.
    ///
    /// With `complete = false` (or no pending disequalities) the graph
    /// is already known cycle-free and the call is trivially true.
    /// Otherwise every pending disequality is resolved by an
    /// exhaustive case-split search over its two strengthenings; the
    /// probe edges are retracted again before returning.
    pub fn check(&mut self, complete: bool) -> bool {
        if !complete || self.diseq_stack.is_empty() {
            self.clear_conflict();
            return true;
        }
        self.stats.checks += 1;
        self.resolve_disequalities()
    }

    /// Explanation of the most recent conflict: a deduplicated set of
    /// asserted atoms. Valid until the next solver call.
    pub fn conflict(&self) -> &[TermId] {
        &self.conflict
    }

    /// The negative cycle behind the most recent conflict, in walk
    /// order.
    pub fn conflict_cycle(&self) -> Vec<CycleEdge> {
        self.conflict_cycle
            .iter()
            .map(|&eid| {
                let e = self.graph.edge(eid);
                CycleEdge {
                    atom: e.atom,
                    from: e.from,
                    to: e.to,
                    weight: e.weight.to_rational(),
                }
            })
            .collect()
    }

    /// Interpolants of the most recent conflict, one per partition
    /// boundary (interpolation mode only).
    pub fn interpolants(&self) -> &[TermId] {
        &self.interpolants
    }

    /// Deductions produced since the last backtrack, oldest first.
    pub fn deductions(&self) -> &[Deduction] {
        &self.deductions
    }

    /// After a consistent complete check, a satisfying rational value
    /// per constrained term: `value(t) = pi(zero) - pi(t)`.
    pub fn compute_model(&self) -> FxHashMap<TermId, BigRational> {
        let zero_pi = self.graph.pi(self.graph.zero_vertex()).to_rational();
        self.graph
            .vertices
            .iter()
            .filter_map(|v| {
                let term = v.term?;
                Some((term, zero_pi.clone() - v.pi.to_rational()))
            })
            .collect()
    }

    /// Potential of the vertex representing `term`, if one exists.
    /// Exposed for diagnostics and invariant checks.
    pub fn potential_of(&self, term: TermId) -> Option<BigRational> {
        let v = self.graph.vertex_lookup(term)?;
        Some(self.graph.pi(v).to_rational())
    }

    /// Verify the potential invariant over every active edge.
    pub fn verify_invariants(&self) -> bool {
        self.graph.potentials_consistent()
    }

    /// Drop all solver state, keeping the term arena but clearing the
    /// solver-visible flags on every term.
    pub fn reset(&mut self) {
        self.graph = DlGraph::new();
        self.detector = CycleDetector::new();
        self.active_trail.clear();
        self.pi_trail.clear();
        self.asserted_trail.clear();
        self.deduced_trail.clear();
        self.diseq_stack.clear();
        self.checkpoints.clear();
        self.deductions.clear();
        self.n_partitions = 0;
        self.stats = DlStats::default();
        self.terms.clear_solver_state();
        self.clear_conflict();
    }

    // --- internals ---

    fn clear_conflict(&mut self) {
        self.conflict.clear();
        self.conflict_cycle.clear();
        self.interpolants.clear();
    }

    /// Activate an edge and run the incremental check; on failure the
    /// edge is rolled back immediately. Re-activating an already
    /// active edge is a no-op.
    fn activate_checked(&mut self, eid: EdgeId) -> bool {
        if self.graph.state(eid) == EdgeState::Active {
            return true;
        }
        self.graph.activate(eid);
        self.stats.detector_runs += 1;
        if self.detector.check_edge(&mut self.graph, eid) {
            self.active_trail.push(eid);
            self.pi_trail.append(&mut self.detector.take_commits());
            true
        } else {
            self.graph.deactivate(eid);
            self.stats.conflicts += 1;
            false
        }
    }

    /// Capture the detector's cycle as the public conflict state.
    fn record_conflict(&mut self) {
        self.conflict_cycle = self.detector.conflict_cycle().to_vec();
        self.conflict = self.dedup_cycle_atoms(&self.conflict_cycle);
        if self.config.produce_interpolants {
            self.interpolants = interpolate::cycle_interpolants(
                &mut self.terms,
                &self.graph,
                &self.conflict_cycle,
                self.n_partitions,
                self.config.interpolation_algo,
            );
        }
    }

    fn dedup_cycle_atoms(&self, cycle: &[EdgeId]) -> Vec<TermId> {
        let mut seen = FxHashSet::default();
        cycle
            .iter()
            .map(|&e| self.graph.edge(e).atom)
            .filter(|&a| seen.insert(a))
            .collect()
    }

    fn propagate_from(&mut self, eid: EdgeId) {
        let origin = self.decision_level();
        let mut found = Vec::new();
        propagate::find_heavy_edges(&mut self.graph, &self.terms, eid, origin, &mut found);
        for d in found {
            if self.terms.polarity(d.atom).is_some() || self.terms.deduced(d.atom).is_some() {
                continue;
            }
            trace!(atom = ?d.atom, polarity = d.polarity, "heavy-edge deduction");
            self.terms.set_deduced(d.atom, d.origin);
            self.deduced_trail.push(d.atom);
            self.stats.deductions += 1;
            self.deductions.push(d);
        }
    }

    /// Exhaustive case-split over all pending disequalities.
    ///
    /// Depth-first over explicit frames: for each disequality try the
    /// false-side edge, then the complementary one; when both fail,
    /// backtrack to the nearest frame with an untried side. The search
    /// only probes feasibility: all probe edges (and the potentials
    /// they touched) are retracted before returning.
    fn resolve_disequalities(&mut self) -> bool {
        let pending: Vec<(TermId, EdgeId, EdgeId)> = self
            .diseq_stack
            .iter()
            .filter_map(|&atom| {
                let bundle = self.graph.bundle(atom)?;
                let neg_eq = bundle.neg_eq?;
                Some((atom, bundle.neg, neg_eq))
            })
            .collect();
        debug_assert_eq!(pending.len(), self.diseq_stack.len());
        let n = pending.len();
        let trail_base = self.active_trail.len();
        let pi_base = self.pi_trail.len();
        let produce = self.config.produce_interpolants;

        let mut frames: Vec<SplitFrame> = Vec::with_capacity(n);
        let mut acc: Vec<TermId> = Vec::new();
        let mut acc_seen: FxHashSet<TermId> = FxHashSet::default();
        // Interpolants bubbling up from a fully failed subtree during
        // the unwind.
        let mut bubble: Option<Vec<TermId>> = None;

        let mut next = 0usize;
        // Where placement of `pending[next]` starts: side 1 with a
        // carried side-0 interpolant right after a flip, side 0
        // otherwise.
        let mut start_side: u8 = 0;
        let mut carried_first: Option<Vec<TermId>> = None;

        'place: loop {
            if next == n {
                // Every disequality admits a side: feasible.
                self.retract_probes(trail_base, pi_base);
                self.clear_conflict();
                return true;
            }
            let (atom, edge0, edge1) = pending[next];
            let mut side = start_side;
            let mut first_itp = carried_first.take();
            start_side = 0;

            loop {
                let eid = if side == 0 { edge0 } else { edge1 };
                self.stats.split_branches += 1;
                let trail_before = self.active_trail.len();
                if self.activate_checked(eid) {
                    frames.push(SplitFrame {
                        atom,
                        side,
                        pushed: self.active_trail.len() > trail_before,
                        first_itp: first_itp.take(),
                    });
                    next += 1;
                    continue 'place;
                }

                // Branch failed: fold its cycle into the accumulated
                // explanation.
                let cycle = self.detector.conflict_cycle().to_vec();
                for a in self.dedup_cycle_atoms(&cycle) {
                    if acc_seen.insert(a) {
                        acc.push(a);
                    }
                }
                let branch_itp = produce.then(|| {
                    interpolate::cycle_interpolants(
                        &mut self.terms,
                        &self.graph,
                        &cycle,
                        self.n_partitions,
                        self.config.interpolation_algo,
                    )
                });

                if side == 0 {
                    side = 1;
                    first_itp = branch_itp;
                    continue;
                }

                // Both sides of `atom` are infeasible here: merge the
                // two branch interpolants and unwind.
                bubble = if produce {
                    Some(interpolate::merge_split(
                        &mut self.terms,
                        self.config.interpolation_algo,
                        self.n_partitions,
                        atom,
                        first_itp.take().unwrap_or_default(),
                        branch_itp.unwrap_or_default(),
                    ))
                } else {
                    None
                };

                // Backtrack to the nearest frame with an untried side.
                loop {
                    let Some(frame) = frames.pop() else {
                        // Root exhausted: the disequalities are jointly
                        // infeasible with the active graph.
                        self.retract_probes(trail_base, pi_base);
                        self.conflict = acc;
                        self.conflict_cycle = cycle.clone();
                        self.interpolants = bubble.take().unwrap_or_default();
                        debug!(conflict = self.conflict.len(), "check conflict");
                        return false;
                    };
                    if frame.pushed {
                        let Some(probe) = self.active_trail.pop() else {
                            debug_assert!(false, "probe trail underflow");
                            break;
                        };
                        self.graph.deactivate(probe);
                    }
                    if frame.side == 0 {
                        // Flip this frame: the bubble is the failed
                        // side-0 subtree's interpolant; retry side 1.
                        next = frames.len();
                        start_side = 1;
                        carried_first = bubble.take();
                        continue 'place;
                    }
                    // A side-1 frame has nothing left: merge its two
                    // subtree interpolants and keep unwinding.
                    if produce {
                        bubble = Some(interpolate::merge_split(
                            &mut self.terms,
                            self.config.interpolation_algo,
                            self.n_partitions,
                            frame.atom,
                            frame.first_itp.unwrap_or_default(),
                            bubble.take().unwrap_or_default(),
                        ));
                    }
                }
            }
        }
    }

    /// Retract every probe edge and potential change past the given
    /// marks, newest first.
    fn retract_probes(&mut self, trail_base: usize, pi_base: usize) {
        while self.active_trail.len() > trail_base {
            let Some(eid) = self.active_trail.pop() else {
                break;
            };
            self.graph.deactivate(eid);
        }
        while self.pi_trail.len() > pi_base {
            let Some((vertex, old_pi)) = self.pi_trail.pop() else {
                break;
            };
            self.graph.vertices[vertex.index()].pi = old_pi;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Solver = DlSolver<BigRational>;

    /// Build and inform the atom `x - y <= c`.
    fn leq(solver: &mut Solver, x: &str, y: &str, c: i64) -> TermId {
        let tm = solver.terms_mut();
        let vx = tm.mk_var(x);
        let vy = tm.mk_var(y);
        let atom = tm.mk_diff_leq(vx, vy, c);
        solver.inform(atom).unwrap();
        atom
    }

    /// Build and inform the atom `x - y = c`.
    fn eq(solver: &mut Solver, x: &str, y: &str, c: i64) -> TermId {
        let tm = solver.terms_mut();
        let vx = tm.mk_var(x);
        let vy = tm.mk_var(y);
        let atom = tm.mk_diff_eq(vx, vy, c);
        solver.inform(atom).unwrap();
        atom
    }

    #[test]
    fn test_unregistered_atom_rejected() {
        let mut solver = Solver::new();
        let tm = solver.terms_mut();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let atom = tm.mk_diff_leq(x, y, 1);
        assert_eq!(
            solver.assert_lit(atom, true),
            Err(DlError::UnregisteredAtom(atom))
        );
    }

    #[test]
    fn test_two_atom_conflict() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        let a2 = leq(&mut solver, "y", "x", -4);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        assert_eq!(solver.assert_lit(a2, true), Ok(false));
        let mut conflict = solver.conflict().to_vec();
        conflict.sort();
        let mut expected = vec![a1, a2];
        expected.sort();
        assert_eq!(conflict, expected);
    }

    #[test]
    fn test_negated_inequality_uses_complement_edge() {
        let mut solver = Solver::new();
        // not (x - y <= 3) over the integers means x - y >= 4.
        let a1 = leq(&mut solver, "x", "y", 3);
        let a2 = leq(&mut solver, "x", "y", 5);
        assert_eq!(solver.assert_lit(a1, false), Ok(true));
        // x - y >= 4 and x - y <= 5 coexist.
        assert_eq!(solver.assert_lit(a2, true), Ok(true));
        // not (y - x <= -4) means x - y <= 3, contradicting a1's side.
        let a3 = leq(&mut solver, "y", "x", -4);
        assert_eq!(solver.assert_lit(a3, false), Ok(false));
        let conflict = solver.conflict();
        assert!(conflict.contains(&a1));
        assert!(conflict.contains(&a3));
    }

    #[test]
    fn test_backtracking_restores_consistency() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        let a2 = leq(&mut solver, "y", "x", -4);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        solver.push_backtrack_point();
        assert_eq!(solver.assert_lit(a2, true), Ok(false));
        solver.pop_backtrack_point();
        // The offending hypothesis is gone; the complement works.
        assert_eq!(solver.assert_lit(a2, false), Ok(true));
        assert!(solver.check(true));
        assert!(solver.verify_invariants());
    }

    #[test]
    fn test_checkpoint_restores_potentials_exactly() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        let a2 = leq(&mut solver, "y", "z", -7);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        let x = solver.terms_mut().mk_var("x");
        let y = solver.terms_mut().mk_var("y");
        let z = solver.terms_mut().mk_var("z");
        let before: Vec<_> = [x, y, z]
            .iter()
            .map(|&t| solver.potential_of(t))
            .collect();
        solver.push_backtrack_point();
        assert_eq!(solver.assert_lit(a2, true), Ok(true));
        solver.pop_backtrack_point();
        let after: Vec<_> = [x, y, z]
            .iter()
            .map(|&t| solver.potential_of(t))
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_positive_equality_is_eager() {
        let mut solver = Solver::new();
        let e = eq(&mut solver, "x", "y", 0);
        let a = leq(&mut solver, "x", "y", -1);
        assert_eq!(solver.assert_lit(e, true), Ok(true));
        // x = y forces x - y <= 0 and x - y >= 0.
        assert_eq!(solver.assert_lit(a, true), Ok(false));
        assert!(solver.conflict().contains(&e));
        assert!(solver.conflict().contains(&a));
    }

    #[test]
    fn test_negated_equality_deferred_until_check() {
        let mut solver = Solver::new();
        let e = eq(&mut solver, "x", "y", 0);
        assert_eq!(solver.assert_lit(e, false), Ok(true));
        // x != y alone is satisfiable; the case split picks a side.
        assert!(solver.check(true));
        // Probe edges must be retracted again.
        assert!(solver.verify_invariants());
        assert!(solver.conflict().is_empty());
    }

    #[test]
    fn test_negated_equality_forced_conflict() {
        let mut solver = Solver::new();
        let e = eq(&mut solver, "x", "y", 0);
        let lo = leq(&mut solver, "x", "y", 0);
        let hi = leq(&mut solver, "y", "x", 0);
        // x <= y and y <= x pin x = y; x != y must then fail.
        assert_eq!(solver.assert_lit(lo, true), Ok(true));
        assert_eq!(solver.assert_lit(hi, true), Ok(true));
        assert_eq!(solver.assert_lit(e, false), Ok(true));
        assert!(!solver.check(true));
        let conflict = solver.conflict();
        assert!(conflict.contains(&e));
        assert!(conflict.contains(&lo) || conflict.contains(&hi));
    }

    #[test]
    fn test_split_equalities_rejects_negated_equality() {
        let mut solver = Solver::with_config(DlConfig {
            split_equalities: true,
            ..DlConfig::default()
        });
        let e = eq(&mut solver, "x", "y", 0);
        assert!(matches!(
            solver.assert_lit(e, false),
            Err(DlError::MalformedAtom { .. })
        ));
    }

    #[test]
    fn test_model_satisfies_active_constraints() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        let a2 = leq(&mut solver, "y", "z", -2);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        assert_eq!(solver.assert_lit(a2, true), Ok(true));
        assert!(solver.check(true));
        let model = solver.compute_model();
        let x = solver.terms_mut().mk_var("x");
        let y = solver.terms_mut().mk_var("y");
        let z = solver.terms_mut().mk_var("z");
        let vx = model[&x].clone();
        let vy = model[&y].clone();
        let vz = model[&z].clone();
        assert!(vx - vy.clone() <= BigRational::from_integer(3.into()));
        assert!(vy - vz <= BigRational::from_integer((-2).into()));
    }

    #[test]
    fn test_propagation_deduces_subsumed_atom() {
        let mut solver = Solver::with_config(DlConfig {
            theory_propagation: true,
            ..DlConfig::default()
        });
        let a1 = leq(&mut solver, "x", "y", 2);
        let a2 = leq(&mut solver, "y", "z", 2);
        let wide = leq(&mut solver, "x", "z", 10);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        assert_eq!(solver.assert_lit(a2, true), Ok(true));
        // x - z <= 4 holds, so x - z <= 10 is implied.
        let deduced: Vec<_> = solver.deductions().to_vec();
        assert!(deduced.iter().any(|d| d.atom == wide && d.polarity));
        assert_eq!(solver.terms().deduced(wide), Some(0));
    }

    #[test]
    fn test_deductions_dropped_on_backtrack() {
        let mut solver = Solver::with_config(DlConfig {
            theory_propagation: true,
            ..DlConfig::default()
        });
        let a1 = leq(&mut solver, "x", "y", 2);
        let a2 = leq(&mut solver, "y", "z", 2);
        let wide = leq(&mut solver, "x", "z", 10);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        solver.push_backtrack_point();
        assert_eq!(solver.assert_lit(a2, true), Ok(true));
        assert!(!solver.deductions().is_empty());
        solver.pop_backtrack_point();
        assert!(solver.deductions().is_empty());
        assert_eq!(solver.terms().deduced(wide), None);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        solver.reset();
        assert_eq!(solver.terms().polarity(a1), None);
        // Atoms must be informed again after a reset.
        assert_eq!(
            solver.assert_lit(a1, true),
            Err(DlError::UnregisteredAtom(a1))
        );
    }

    #[test]
    fn test_reasserted_disequality_keeps_earlier_constraints() {
        let mut solver = Solver::new();
        let lo = leq(&mut solver, "u", "v", 0);
        let hi = leq(&mut solver, "v", "u", 0);
        let d1 = eq(&mut solver, "x", "y", 0);
        let d2 = eq(&mut solver, "u", "v", 0);
        assert_eq!(solver.assert_lit(lo, true), Ok(true));
        assert_eq!(solver.assert_lit(hi, true), Ok(true));
        assert_eq!(solver.assert_lit(d1, false), Ok(true));
        // A second assertion of the same disequality is a no-op.
        assert_eq!(solver.assert_lit(d1, false), Ok(true));
        assert_eq!(solver.assert_lit(d2, false), Ok(true));
        // u <= v and v <= u pin u = v, so u != v cannot hold.
        assert!(!solver.check(true));
        let conflict = solver.conflict().to_vec();
        assert!(conflict.contains(&d2));
        assert!(conflict.contains(&lo));
        assert!(conflict.contains(&hi));
        assert!(solver.verify_invariants());
        // The bounds asserted before the check survived the case-split
        // unwinding: tightening against one of them still conflicts.
        let tight = leq(&mut solver, "v", "u", -1);
        assert_eq!(solver.assert_lit(tight, true), Ok(false));
        assert!(solver.conflict().contains(&lo));
    }

    #[test]
    fn test_reassert_same_polarity_is_noop() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        solver.push_backtrack_point();
        assert_eq!(solver.assert_lit(a1, true), Ok(true));
        solver.pop_backtrack_point();
        // The level-0 assignment survives the pop.
        assert_eq!(solver.terms().polarity(a1), Some(true));
        let a2 = leq(&mut solver, "y", "x", -4);
        assert_eq!(solver.assert_lit(a2, true), Ok(false));
        assert!(solver.conflict().contains(&a1));
    }

    #[test]
    fn test_stats_counters_move() {
        let mut solver = Solver::new();
        let a1 = leq(&mut solver, "x", "y", 3);
        let a2 = leq(&mut solver, "y", "x", -4);
        let _ = solver.assert_lit(a1, true);
        let _ = solver.assert_lit(a2, true);
        assert_eq!(solver.stats().informed, 2);
        assert_eq!(solver.stats().asserts, 2);
        assert_eq!(solver.stats().conflicts, 1);
    }
}
