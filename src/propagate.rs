//! Heavy-Edge Theory Propagation.
//!
//! After a successful assertion of `e = (u -> v, w)`, any registered
//! but unassigned edge subsumed by an active path through `e` is
//! implied: its owning atom can be deduced without the search engine
//! having to decide it. Paths are found by two single-source
//! shortest-path sweeps restricted to active edges, forward from the
//! head of `e` and backward from its tail, using the potential function
//! as a Dijkstra feasibility certificate (reduced costs are
//! non-negative whenever the graph is consistent).
//!
//! This is an optimization only; correctness never depends on it.

use crate::ast::{TermId, TermManager};
use crate::graph::{DlGraph, EdgeId, EdgeRole, VertexId};
use crate::num::DlNumber;
use crate::stamp::Stamp;
use num_traits::Zero;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// An atom whose polarity is forced by the active constraint graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deduction {
    /// The deduced atom.
    pub atom: TermId,
    /// The forced polarity.
    pub polarity: bool,
    /// Decision id (checkpoint depth) at which the deduction fired.
    pub origin: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct DistItem<W> {
    key: W,
    vertex: VertexId,
}

/// Scan for edges made heavy by the newly activated `eid` and append
/// the resulting deductions to `out`. The graph must be consistent.
pub(crate) fn find_heavy_edges<W: DlNumber>(
    g: &mut DlGraph<W>,
    tm: &TermManager,
    eid: EdgeId,
    origin: u32,
    out: &mut Vec<Deduction>,
) {
    if g.tracked.is_empty() {
        return;
    }
    let (u, v, w) = {
        let e = g.edge(eid);
        (e.from, e.to, e.weight.clone())
    };

    let token = g.stamps.advance();
    sssp_forward(g, token, v);
    sssp_backward(g, token, u);

    for &candidate in &g.tracked {
        if candidate == eid {
            continue;
        }
        let edge = g.edge(candidate);
        let Some(up) = g.vertices[edge.from.index()].dist_up.get(token) else {
            continue;
        };
        let Some(down) = g.vertices[edge.to.index()].dist_down.get(token) else {
            continue;
        };
        // Path edge.from ~> u, then e, then v ~> edge.to.
        let through = up.clone() + w.clone() + down.clone();
        if through >= edge.weight {
            continue;
        }
        // The path subsumes the candidate edge, so the polarity the
        // candidate stands for is implied. A single positive equality
        // edge implies only half of its atom and is skipped.
        let polarity = match edge.role {
            EdgeRole::Pos => {
                if tm.is_eq(edge.atom) {
                    continue;
                }
                true
            }
            EdgeRole::PosEq => continue,
            EdgeRole::Neg | EdgeRole::NegEq => false,
        };
        out.push(Deduction {
            atom: edge.atom,
            polarity,
            origin,
        });
    }
}

/// Shortest distances from `source` over active out-edges, stored in
/// `dist_down`. Heap keys are reduced by the potential so Dijkstra
/// remains valid with negative weights.
fn sssp_forward<W: DlNumber>(g: &mut DlGraph<W>, token: Stamp, source: VertexId) {
    let mut heap: BinaryHeap<Reverse<DistItem<W>>> = BinaryHeap::new();
    g.vertices[source.index()].dist_down.set(token, W::zero());
    heap.push(Reverse(DistItem {
        key: W::zero() - g.pi(source).clone(),
        vertex: source,
    }));
    while let Some(Reverse(item)) = heap.pop() {
        let s = item.vertex;
        let Some(dist_s) = g.vertices[s.index()].dist_down.get(token).cloned() else {
            continue;
        };
        if dist_s.clone() - g.pi(s).clone() != item.key {
            continue; // stale entry
        }
        for i in 0..g.out_degree(s) {
            let f = g.vertices[s.index()].active_out[i];
            let (t, w_st) = {
                let e = g.edge(f);
                (e.to, e.weight.clone())
            };
            let cand = dist_s.clone() + w_st;
            let better = match g.vertices[t.index()].dist_down.get(token) {
                Some(cur) => cand < *cur,
                None => true,
            };
            if better {
                g.vertices[t.index()].dist_down.set(token, cand.clone());
                heap.push(Reverse(DistItem {
                    key: cand - g.pi(t).clone(),
                    vertex: t,
                }));
            }
        }
    }
}

/// Shortest distances to `target` over active in-edges, stored in
/// `dist_up`.
fn sssp_backward<W: DlNumber>(g: &mut DlGraph<W>, token: Stamp, target: VertexId) {
    let mut heap: BinaryHeap<Reverse<DistItem<W>>> = BinaryHeap::new();
    g.vertices[target.index()].dist_up.set(token, W::zero());
    heap.push(Reverse(DistItem {
        key: g.pi(target).clone(),
        vertex: target,
    }));
    while let Some(Reverse(item)) = heap.pop() {
        let t = item.vertex;
        let Some(dist_t) = g.vertices[t.index()].dist_up.get(token).cloned() else {
            continue;
        };
        if dist_t.clone() + g.pi(t).clone() != item.key {
            continue;
        }
        let in_degree = g.vertices[t.index()].active_in.len();
        for i in 0..in_degree {
            let f = g.vertices[t.index()].active_in[i];
            let (s, w_st) = {
                let e = g.edge(f);
                (e.from, e.weight.clone())
            };
            let cand = w_st + dist_t.clone();
            let better = match g.vertices[s.index()].dist_up.get(token) {
                Some(cur) => cand < *cur,
                None => true,
            };
            if better {
                g.vertices[s.index()].dist_up.set(token, cand.clone());
                heap.push(Reverse(DistItem {
                    key: cand + g.pi(s).clone(),
                    vertex: s,
                }));
            }
        }
    }
}
