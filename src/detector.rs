//! Incremental Negative-Cycle Detection.
//!
//! Given one newly activated edge, decides whether the active subgraph
//! now contains a negative-weight cycle, repairing the potential
//! function incrementally along the way (Bellman-Ford with potentials;
//! see Cotton & Maler, "Fast and Flexible Difference Constraint
//! Propagation", SAT 2006). On success the updated potentials witness
//! consistency; on failure every touched potential is rolled back and
//! the offending cycle is retained as the conflict explanation.

use crate::graph::{DlGraph, EdgeId, VertexId};
use crate::num::DlNumber;
use crate::stamp::Stamp;
use num_traits::Zero;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct HeapItem<W> {
    gamma: W,
    vertex: VertexId,
}

/// Reusable state for the cycle check; scratch allocations survive
/// across calls.
#[derive(Debug)]
pub(crate) struct CycleDetector<W> {
    heap: BinaryHeap<Reverse<HeapItem<W>>>,
    /// Vertices whose potential this call changed, with their previous
    /// values, in commit order.
    commits: Vec<(VertexId, W)>,
    /// The negative cycle found by the last failing call, in walk
    /// order starting with the edge under test.
    conflict: Vec<EdgeId>,
}

impl<W: DlNumber> CycleDetector<W> {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            commits: Vec::new(),
            conflict: Vec::new(),
        }
    }

    /// The cycle recorded by the last failing [`Self::check_edge`];
    /// valid until the next call.
    pub(crate) fn conflict_cycle(&self) -> &[EdgeId] {
        &self.conflict
    }

    /// Drain the potential changes committed by the last successful
    /// call, for the caller's undo trail.
    pub(crate) fn take_commits(&mut self) -> Vec<(VertexId, W)> {
        std::mem::take(&mut self.commits)
    }

    /// Check consistency of the active subgraph after `eid` was
    /// activated. Returns false iff a negative cycle through `eid`
    /// exists; potentials are then left exactly as before the call.
    pub(crate) fn check_edge(&mut self, g: &mut DlGraph<W>, eid: EdgeId) -> bool {
        self.heap.clear();
        self.conflict.clear();
        self.commits.clear();

        let (u, v, w) = {
            let e = g.edge(eid);
            (e.from, e.to, e.weight.clone())
        };

        // A self-loop is a one-edge cycle.
        if u == v {
            if w < W::zero() {
                self.conflict.push(eid);
                return false;
            }
            return true;
        }

        let gamma_v = g.pi(u).clone() + w - g.pi(v).clone();
        if gamma_v >= W::zero() {
            // Consistent with the current potentials; nothing to do.
            return true;
        }

        let token = g.stamps.advance();
        g.vertices[v.index()].gamma.set(token, gamma_v.clone());
        g.vertices[v.index()].pred.set(token, eid);
        self.heap.push(Reverse(HeapItem {
            gamma: gamma_v,
            vertex: v,
        }));

        while let Some(Reverse(item)) = self.heap.pop() {
            let s = item.vertex;
            // Lazy deletion: skip entries whose key is no longer the
            // vertex's current gamma.
            if g.vertices[s.index()].gamma.get(token) != Some(&item.gamma) {
                continue;
            }

            let old_pi = g.vertices[s.index()].pi.clone();
            g.vertices[s.index()].pi = old_pi.clone() + item.gamma;
            g.vertices[s.index()].gamma.clear();
            self.commits.push((s, old_pi));

            for i in 0..g.out_degree(s) {
                let f = g.vertices[s.index()].active_out[i];
                let (t, w_st) = {
                    let e = g.edge(f);
                    (e.to, e.weight.clone())
                };
                let cand = g.pi(s).clone() + w_st - g.pi(t).clone();
                if cand >= W::zero() {
                    continue;
                }
                // Unset gamma reads as zero, so any negative candidate
                // improves it.
                let improves = match g.vertices[t.index()].gamma.get(token) {
                    Some(current) => cand < *current,
                    None => true,
                };
                if !improves {
                    continue;
                }
                if t == u {
                    // Relaxing the origin negative closes a cycle
                    // through `eid`.
                    self.rebuild_cycle(g, token, eid, f, v);
                    self.rollback(g);
                    return false;
                }
                g.vertices[t.index()].gamma.set(token, cand.clone());
                g.vertices[t.index()].pred.set(token, f);
                self.heap.push(Reverse(HeapItem {
                    gamma: cand,
                    vertex: t,
                }));
            }
        }

        true
    }

    /// Reconstruct the cycle `eid, v -> ... -> s, closing` by walking
    /// predecessor edges backwards from the closing edge's source.
    fn rebuild_cycle(
        &mut self,
        g: &DlGraph<W>,
        token: Stamp,
        eid: EdgeId,
        closing: EdgeId,
        v: VertexId,
    ) {
        self.conflict.push(closing);
        let mut cursor = g.edge(closing).from;
        while cursor != v {
            let Some(&pred) = g.vertices[cursor.index()].pred.get(token) else {
                debug_assert!(false, "broken predecessor chain during cycle rebuild");
                break;
            };
            self.conflict.push(pred);
            cursor = g.edge(pred).from;
        }
        self.conflict.push(eid);
        self.conflict.reverse();
    }

    /// Restore every potential touched by a failed call, most recent
    /// first.
    fn rollback(&mut self, g: &mut DlGraph<W>) {
        for (vertex, old_pi) in self.commits.drain(..).rev() {
            g.vertices[vertex.index()].pi = old_pi;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TermManager;
    use num_bigint::BigInt;
    use num_rational::BigRational;

    fn big(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    struct Fixture {
        tm: TermManager,
        g: DlGraph<BigRational>,
        det: CycleDetector<BigRational>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tm: TermManager::new(),
                g: DlGraph::new(),
                det: CycleDetector::new(),
            }
        }

        /// Activate the positive edge of `x - y <= c` and run the check.
        fn assert_leq(&mut self, x: &str, y: &str, c: i64) -> bool {
            let vx = self.tm.mk_var(x);
            let vy = self.tm.mk_var(y);
            let atom = self.tm.mk_diff_leq(vx, vy, c);
            let bundle = self.g.get_or_build_bundle(&self.tm, atom).unwrap();
            self.g.activate(bundle.pos);
            let ok = self.det.check_edge(&mut self.g, bundle.pos);
            if !ok {
                self.g.deactivate(bundle.pos);
            }
            ok
        }
    }

    #[test]
    fn test_two_edge_negative_cycle() {
        let mut fx = Fixture::new();
        assert!(fx.assert_leq("x", "y", 3));
        assert!(!fx.assert_leq("y", "x", -4));
        let cycle = fx.det.conflict_cycle();
        assert_eq!(cycle.len(), 2);
        let total: BigRational = cycle
            .iter()
            .map(|&e| fx.g.edge(e).weight.clone())
            .fold(big(0), |a, b| a + b);
        assert_eq!(total, big(-1));
    }

    #[test]
    fn test_cycle_is_closed_walk() {
        let mut fx = Fixture::new();
        assert!(fx.assert_leq("x", "y", 5));
        assert!(fx.assert_leq("y", "z", 2));
        assert!(!fx.assert_leq("z", "x", -8));
        let cycle = fx.det.conflict_cycle().to_vec();
        assert_eq!(cycle.len(), 3);
        for pair in cycle.windows(2) {
            assert_eq!(fx.g.edge(pair[0]).to, fx.g.edge(pair[1]).from);
        }
        let first = cycle[0];
        let last = cycle[cycle.len() - 1];
        assert_eq!(fx.g.edge(last).to, fx.g.edge(first).from);
    }

    #[test]
    fn test_potentials_restored_on_failure() {
        let mut fx = Fixture::new();
        assert!(fx.assert_leq("x", "y", 5));
        assert!(fx.assert_leq("y", "z", 2));
        let before: Vec<BigRational> =
            fx.g.vertices.iter().map(|v| v.pi.clone()).collect();
        assert!(!fx.assert_leq("z", "x", -8));
        let after: Vec<BigRational> =
            fx.g.vertices.iter().map(|v| v.pi.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_potential_invariant_after_success() {
        let mut fx = Fixture::new();
        assert!(fx.assert_leq("a", "b", 1));
        assert!(fx.assert_leq("b", "c", -3));
        assert!(fx.assert_leq("c", "d", 2));
        assert!(fx.assert_leq("d", "a", 1));
        assert!(fx.g.potentials_consistent());
    }

    #[test]
    fn test_negative_self_loop() {
        let mut fx = Fixture::new();
        assert!(!fx.assert_leq("x", "x", -1));
        assert_eq!(fx.det.conflict_cycle().len(), 1);
        assert!(fx.assert_leq("x", "x", 0));
    }

    #[test]
    fn test_consistent_edge_is_cheap() {
        let mut fx = Fixture::new();
        assert!(fx.assert_leq("x", "y", 3));
        // Already satisfied by the current potentials: no commits.
        assert!(fx.assert_leq("x", "y", 7));
        assert!(fx.det.take_commits().is_empty());
    }
}
