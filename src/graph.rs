//! Vertex/Edge Store for the Difference-Constraint Graph.
//!
//! One vertex per distinct term appearing on either side of a
//! difference constraint (plus a synthetic zero vertex for
//! single-variable bounds), one edge bundle per registered atom. Edges
//! are immutable after creation; only their activity changes as the
//! search asserts and retracts atoms. Vertices and edges live in dense
//! arenas referenced by integer ids, adjacency lists store ids.

use crate::ast::{TermId, TermKind, TermManager};
use crate::error::{DlError, Result};
use crate::num::DlNumber;
use crate::stamp::{StampSource, Stamped};
use num_traits::{One, Zero};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// Dense index of a vertex in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub(crate) u32);

impl VertexId {
    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense index of an edge in the graph arena.
///
/// The parity of the id encodes the polarity the edge stands for: even
/// ids are positive (the atom holds), odd ids are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this edge represents the positive polarity of its atom.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 % 2 == 0
    }
}

/// Role of an edge inside its owning bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRole {
    /// The atom's inequality holds.
    Pos,
    /// The atom's inequality is negated (strict complement).
    Neg,
    /// Second direction of a positive equality.
    PosEq,
    /// Alternative strengthening of a negated equality.
    NegEq,
}

/// Activity of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeState {
    /// Not asserted and not tracked for propagation.
    Dormant,
    /// In the active adjacency structure.
    Active,
    /// Known unasserted, tracked by the heavy-edge scan.
    Tracked,
}

/// A directed weighted edge; `from - to <= weight` over the owning
/// atom's operands.
#[derive(Debug, Clone)]
pub struct Edge<W> {
    /// Source vertex (the minuend side).
    pub from: VertexId,
    /// Target vertex (the subtrahend side).
    pub to: VertexId,
    /// Exact constraint bound.
    pub weight: W,
    /// The atom this edge belongs to.
    pub atom: TermId,
    /// Role inside the bundle.
    pub role: EdgeRole,
}

/// The complementary edge bundle owned by one atom: two edges for an
/// inequality, four for an equality.
#[derive(Debug, Clone, Copy)]
pub struct EdgeBundle {
    /// Edge asserted by the positive polarity.
    pub pos: EdgeId,
    /// Edge asserted by the negative polarity.
    pub neg: EdgeId,
    /// Second positive-direction edge (equalities only).
    pub pos_eq: Option<EdgeId>,
    /// Second negative-strengthening edge (equalities only).
    pub neg_eq: Option<EdgeId>,
}

impl EdgeBundle {
    /// All edges of the bundle.
    pub fn edges(&self) -> SmallVec<[EdgeId; 4]> {
        let mut out = SmallVec::new();
        out.push(self.pos);
        out.push(self.neg);
        if let Some(e) = self.pos_eq {
            out.push(e);
        }
        if let Some(e) = self.neg_eq {
            out.push(e);
        }
        out
    }

    /// Whether this bundle belongs to an equality atom.
    pub fn is_equality(&self) -> bool {
        self.pos_eq.is_some()
    }
}

/// Per-vertex state: potential, call-scoped scratch fields, and the
/// active adjacency lists.
#[derive(Debug)]
pub(crate) struct Vertex<W> {
    /// The term this vertex stands for; `None` for the zero vertex.
    pub(crate) term: Option<TermId>,
    /// Potential function value.
    pub(crate) pi: W,
    /// Detector scratch: candidate potential correction.
    pub(crate) gamma: Stamped<W>,
    /// Detector scratch: best-known predecessor edge.
    pub(crate) pred: Stamped<EdgeId>,
    /// Propagation scratch: shortest distance from the new edge's head.
    pub(crate) dist_down: Stamped<W>,
    /// Propagation scratch: shortest distance to the new edge's tail.
    pub(crate) dist_up: Stamped<W>,
    /// Currently active outgoing edges, in activation order.
    pub(crate) active_out: Vec<EdgeId>,
    /// Currently active incoming edges, in activation order.
    pub(crate) active_in: Vec<EdgeId>,
}

impl<W: DlNumber> Vertex<W> {
    fn new(term: Option<TermId>) -> Self {
        Self {
            term,
            pi: W::zero(),
            gamma: Stamped::new(),
            pred: Stamped::new(),
            dist_down: Stamped::new(),
            dist_up: Stamped::new(),
            active_out: Vec::new(),
            active_in: Vec::new(),
        }
    }
}

/// Parsed normal form of a difference atom: `x - y <= c` or
/// `x - y = c`, with `None` standing for the zero vertex.
struct ParsedDiff {
    x: Option<TermId>,
    y: Option<TermId>,
    c: num_rational::BigRational,
    is_eq: bool,
}

/// The difference-constraint graph: arenas, bundles, adjacency.
#[derive(Debug)]
pub(crate) struct DlGraph<W> {
    pub(crate) vertices: Vec<Vertex<W>>,
    pub(crate) edges: Vec<Edge<W>>,
    pub(crate) edge_states: Vec<EdgeState>,
    /// Registered-but-unassigned edges, scanned by propagation.
    pub(crate) tracked: FxHashSet<EdgeId>,
    /// Scratch-field generation counter shared by detector and
    /// propagation.
    pub(crate) stamps: StampSource,
    vertex_of: FxHashMap<TermId, VertexId>,
    bundles: FxHashMap<TermId, EdgeBundle>,
}

impl<W: DlNumber> DlGraph<W> {
    /// Create a graph holding only the zero vertex.
    pub(crate) fn new() -> Self {
        Self {
            vertices: vec![Vertex::new(None)],
            edges: Vec::new(),
            edge_states: Vec::new(),
            tracked: FxHashSet::default(),
            stamps: StampSource::new(),
            vertex_of: FxHashMap::default(),
            bundles: FxHashMap::default(),
        }
    }

    /// The synthetic vertex anchoring single-variable bounds.
    pub(crate) fn zero_vertex(&self) -> VertexId {
        VertexId(0)
    }

    /// Deterministic term-to-vertex mapping; idempotent.
    pub(crate) fn vertex_for(&mut self, term: TermId) -> VertexId {
        if let Some(&v) = self.vertex_of.get(&term) {
            return v;
        }
        let v = VertexId(u32::try_from(self.vertices.len()).unwrap_or(u32::MAX));
        self.vertices.push(Vertex::new(Some(term)));
        self.vertex_of.insert(term, v);
        v
    }

    /// The bundle of a registered atom.
    pub(crate) fn bundle(&self, atom: TermId) -> Option<EdgeBundle> {
        self.bundles.get(&atom).copied()
    }

    /// The vertex already representing `term`, if any.
    pub(crate) fn vertex_lookup(&self, term: TermId) -> Option<VertexId> {
        self.vertex_of.get(&term).copied()
    }

    pub(crate) fn edge(&self, eid: EdgeId) -> &Edge<W> {
        &self.edges[eid.index()]
    }

    pub(crate) fn state(&self, eid: EdgeId) -> EdgeState {
        self.edge_states[eid.index()]
    }

    /// Memoized bundle construction; parses the atom's normalized shape
    /// and errors fatally when it is not a difference constraint.
    pub(crate) fn get_or_build_bundle(
        &mut self,
        tm: &TermManager,
        atom: TermId,
    ) -> Result<EdgeBundle> {
        if let Some(&bundle) = self.bundles.get(&atom) {
            return Ok(bundle);
        }
        let parsed = parse_diff_atom(tm, atom)?;
        let vx = match parsed.x {
            Some(t) => self.vertex_for(t),
            None => self.zero_vertex(),
        };
        let vy = match parsed.y {
            Some(t) => self.vertex_for(t),
            None => self.zero_vertex(),
        };
        let w = W::from_rational(&parsed.c)
            .ok_or_else(|| DlError::UnrepresentableWeight(parsed.c.to_string()))?;

        debug_assert!(self.edges.len() % 2 == 0, "bundles start on even ids");
        let pos = self.push_edge(vx, vy, w.clone(), atom, EdgeRole::Pos);
        let neg = self.push_edge(vy, vx, w.complement(), atom, EdgeRole::Neg);
        let (pos_eq, neg_eq) = if parsed.is_eq {
            let pe = self.push_edge(vy, vx, -w.clone(), atom, EdgeRole::PosEq);
            let ne = self.push_edge(vx, vy, w - W::one(), atom, EdgeRole::NegEq);
            (Some(pe), Some(ne))
        } else {
            (None, None)
        };

        let bundle = EdgeBundle {
            pos,
            neg,
            pos_eq,
            neg_eq,
        };
        self.bundles.insert(atom, bundle);
        Ok(bundle)
    }

    fn push_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        weight: W,
        atom: TermId,
        role: EdgeRole,
    ) -> EdgeId {
        let id = EdgeId(u32::try_from(self.edges.len()).unwrap_or(u32::MAX));
        self.edges.push(Edge {
            from,
            to,
            weight,
            atom,
            role,
        });
        self.edge_states.push(EdgeState::Dormant);
        id
    }

    /// Insert an edge into the active adjacency structure.
    pub(crate) fn activate(&mut self, eid: EdgeId) {
        debug_assert_ne!(self.state(eid), EdgeState::Active, "double activation");
        self.tracked.remove(&eid);
        self.edge_states[eid.index()] = EdgeState::Active;
        let (from, to) = {
            let e = self.edge(eid);
            (e.from, e.to)
        };
        self.vertices[from.index()].active_out.push(eid);
        self.vertices[to.index()].active_in.push(eid);
    }

    /// Remove the most recently activated edge; strict LIFO.
    pub(crate) fn deactivate(&mut self, eid: EdgeId) {
        debug_assert_eq!(self.state(eid), EdgeState::Active, "deactivating inactive edge");
        let (from, to) = {
            let e = self.edge(eid);
            (e.from, e.to)
        };
        let popped_out = self.vertices[from.index()].active_out.pop();
        debug_assert_eq!(popped_out, Some(eid), "out-list not LIFO");
        let popped_in = self.vertices[to.index()].active_in.pop();
        debug_assert_eq!(popped_in, Some(eid), "in-list not LIFO");
        self.edge_states[eid.index()] = EdgeState::Dormant;
    }

    /// Track a dormant edge for the heavy-edge scan.
    pub(crate) fn track(&mut self, eid: EdgeId) {
        if self.state(eid) == EdgeState::Dormant {
            self.edge_states[eid.index()] = EdgeState::Tracked;
            self.tracked.insert(eid);
        }
    }

    /// Stop tracking an edge (its atom got assigned).
    pub(crate) fn untrack(&mut self, eid: EdgeId) {
        if self.state(eid) == EdgeState::Tracked {
            self.edge_states[eid.index()] = EdgeState::Dormant;
            self.tracked.remove(&eid);
        }
    }

    pub(crate) fn pi(&self, v: VertexId) -> &W {
        &self.vertices[v.index()].pi
    }

    /// Active out-degree of a vertex.
    pub(crate) fn out_degree(&self, v: VertexId) -> usize {
        self.vertices[v.index()].active_out.len()
    }

    /// Check the potential invariant over every active edge.
    pub(crate) fn potentials_consistent(&self) -> bool {
        self.edges.iter().enumerate().all(|(i, e)| {
            if self.edge_states[i] != EdgeState::Active {
                return true;
            }
            let slack =
                self.pi(e.from).clone() + e.weight.clone() - self.pi(e.to).clone();
            slack >= W::zero()
        })
    }
}

/// Extract `(x, y, c, is_eq)` from a normalized difference atom.
///
/// Supported shapes: `x - y <= c` (either operand order inside the
/// difference), `x <= c`, `-x <= c`, `x = y`, `x - y = c`, `x = c`.
fn parse_diff_atom(tm: &TermManager, atom: TermId) -> Result<ParsedDiff> {
    let malformed = |reason: &str| DlError::MalformedAtom {
        atom,
        reason: reason.to_string(),
    };

    match tm.kind(atom) {
        TermKind::Leq(lhs, rhs) => {
            let c = tm
                .value(*rhs)
                .ok_or_else(|| malformed("inequality bound is not a constant"))?
                .clone();
            let (x, y) = parse_diff_operand(tm, *lhs)
                .ok_or_else(|| malformed("left side is not a difference of variables"))?;
            Ok(ParsedDiff {
                x,
                y,
                c,
                is_eq: false,
            })
        }
        TermKind::Eq(lhs, rhs) => {
            if tm.is_var(*lhs) && tm.is_var(*rhs) {
                return Ok(ParsedDiff {
                    x: Some(*lhs),
                    y: Some(*rhs),
                    c: num_rational::BigRational::zero(),
                    is_eq: true,
                });
            }
            let c = tm
                .value(*rhs)
                .ok_or_else(|| malformed("equality bound is not a constant"))?
                .clone();
            let (x, y) = parse_diff_operand(tm, *lhs)
                .ok_or_else(|| malformed("left side is not a difference of variables"))?;
            Ok(ParsedDiff {
                x,
                y,
                c,
                is_eq: true,
            })
        }
        _ => Err(malformed("not an inequality or equality")),
    }
}

/// Parse `x`, `-x`, or `x - y` into (minuend, subtrahend); `None`
/// stands for the zero vertex.
fn parse_diff_operand(
    tm: &TermManager,
    term: TermId,
) -> Option<(Option<TermId>, Option<TermId>)> {
    if tm.is_var(term) {
        return Some((Some(term), None));
    }
    if let Some(neg) = parse_negated_var(tm, term) {
        return Some((None, Some(neg)));
    }
    if let TermKind::Plus(a, b) = tm.kind(term) {
        // One operand is the plain variable, the other `-1 * var`.
        if tm.is_var(*a) {
            let y = parse_negated_var(tm, *b)?;
            return Some((Some(*a), Some(y)));
        }
        if tm.is_var(*b) {
            let y = parse_negated_var(tm, *a)?;
            return Some((Some(*b), Some(y)));
        }
    }
    None
}

/// Parse `-1 * x` (either operand order) into `x`.
fn parse_negated_var(tm: &TermManager, term: TermId) -> Option<TermId> {
    let TermKind::Times(a, b) = tm.kind(term) else {
        return None;
    };
    let minus_one = -num_rational::BigRational::one();
    if tm.value(*a) == Some(&minus_one) && tm.is_var(*b) {
        return Some(*b);
    }
    if tm.value(*b) == Some(&minus_one) && tm.is_var(*a) {
        return Some(*a);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use num_rational::BigRational;

    fn big(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    fn setup() -> (TermManager, DlGraph<BigRational>) {
        (TermManager::new(), DlGraph::new())
    }

    #[test]
    fn test_vertex_mapping_idempotent() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let v1 = g.vertex_for(x);
        let v2 = g.vertex_for(x);
        assert_eq!(v1, v2);
        assert_ne!(v1, g.zero_vertex());
    }

    #[test]
    fn test_inequality_bundle_weights() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let atom = tm.mk_diff_leq(x, y, 3);
        let bundle = g.get_or_build_bundle(&tm, atom).unwrap();
        assert!(!bundle.is_equality());
        assert_eq!(g.edge(bundle.pos).weight, big(3));
        assert_eq!(g.edge(bundle.neg).weight, big(-4));
        // Opposite directions.
        assert_eq!(g.edge(bundle.pos).from, g.edge(bundle.neg).to);
        assert_eq!(g.edge(bundle.pos).to, g.edge(bundle.neg).from);
        // Parity encodes polarity.
        assert!(bundle.pos.is_positive());
        assert!(!bundle.neg.is_positive());
    }

    #[test]
    fn test_equality_bundle_weights() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let atom = tm.mk_diff_eq(x, y, 5);
        let bundle = g.get_or_build_bundle(&tm, atom).unwrap();
        assert!(bundle.is_equality());
        let pos = g.edge(bundle.pos).weight.clone();
        let neg = g.edge(bundle.neg).weight.clone();
        let pos_eq = g.edge(bundle.pos_eq.unwrap()).weight.clone();
        let neg_eq = g.edge(bundle.neg_eq.unwrap()).weight.clone();
        assert_eq!(pos, big(5));
        assert_eq!(pos_eq, -pos.clone());
        assert_eq!(neg, -pos.clone() - big(1));
        assert_eq!(neg_eq, pos - big(1));
        assert!(bundle.pos_eq.unwrap().is_positive());
        assert!(!bundle.neg_eq.unwrap().is_positive());
    }

    #[test]
    fn test_bundle_memoized() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let atom = tm.mk_diff_leq(x, y, 1);
        let b1 = g.get_or_build_bundle(&tm, atom).unwrap();
        let b2 = g.get_or_build_bundle(&tm, atom).unwrap();
        assert_eq!(b1.pos, b2.pos);
        assert_eq!(g.edges.len(), 2);
    }

    #[test]
    fn test_single_variable_bound_uses_zero_vertex() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let five = tm.mk_int(5);
        let atom = tm.mk_leq(x, five);
        let bundle = g.get_or_build_bundle(&tm, atom).unwrap();
        assert_eq!(g.edge(bundle.pos).to, g.zero_vertex());
        assert_ne!(g.edge(bundle.pos).from, g.zero_vertex());
    }

    #[test]
    fn test_negated_variable_bound() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let minus_one = tm.mk_int(-1);
        let neg_x = tm.mk_times(minus_one, x);
        let two = tm.mk_int(2);
        let atom = tm.mk_leq(neg_x, two);
        let bundle = g.get_or_build_bundle(&tm, atom).unwrap();
        assert_eq!(g.edge(bundle.pos).from, g.zero_vertex());
    }

    #[test]
    fn test_malformed_atom_rejected() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let sum = tm.mk_plus(x, y); // x + y, not a difference
        let three = tm.mk_int(3);
        let atom = tm.mk_leq(sum, three);
        assert!(matches!(
            g.get_or_build_bundle(&tm, atom),
            Err(DlError::MalformedAtom { .. })
        ));
        let not_atom = tm.mk_var("p");
        assert!(g.get_or_build_bundle(&tm, not_atom).is_err());
    }

    #[test]
    fn test_activation_lifo() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let a1 = tm.mk_diff_leq(x, y, 1);
        let a2 = tm.mk_diff_leq(x, y, 2);
        let b1 = g.get_or_build_bundle(&tm, a1).unwrap();
        let b2 = g.get_or_build_bundle(&tm, a2).unwrap();
        g.activate(b1.pos);
        g.activate(b2.pos);
        let vx = g.edge(b1.pos).from;
        assert_eq!(g.out_degree(vx), 2);
        g.deactivate(b2.pos);
        g.deactivate(b1.pos);
        assert_eq!(g.out_degree(vx), 0);
    }

    #[test]
    fn test_tracking_transitions() {
        let (mut tm, mut g) = setup();
        let x = tm.mk_var("x");
        let y = tm.mk_var("y");
        let atom = tm.mk_diff_leq(x, y, 1);
        let bundle = g.get_or_build_bundle(&tm, atom).unwrap();
        g.track(bundle.pos);
        assert_eq!(g.state(bundle.pos), EdgeState::Tracked);
        // Activation pulls the edge out of the tracked set.
        g.activate(bundle.pos);
        assert!(!g.tracked.contains(&bundle.pos));
        g.deactivate(bundle.pos);
        assert_eq!(g.state(bundle.pos), EdgeState::Dormant);
    }
}
