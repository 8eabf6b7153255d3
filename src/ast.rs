//! Arena-Allocated Term Representation.
//!
//! The difference-logic core treats terms as immutable keys produced by
//! the surrounding term-representation system. This module provides the
//! hash-consed arena behind those keys plus the small set of solver
//! visible mutable fields (polarity, deduced flag, partition mask) and
//! the formula builders the interpolation engine needs.

use num_bigint::BigInt;
use num_rational::BigRational;
use rustc_hash::FxHashMap;

/// Handle to a term in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// Create a term id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural content of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// Boolean constant true.
    True,
    /// Boolean constant false.
    False,
    /// Free variable with a name.
    Var(String),
    /// Exact rational constant.
    Num(BigRational),
    /// Binary sum.
    Plus(TermId, TermId),
    /// Binary product.
    Times(TermId, TermId),
    /// Non-strict inequality `lhs <= rhs`.
    Leq(TermId, TermId),
    /// Equality `lhs = rhs`.
    Eq(TermId, TermId),
    /// N-ary conjunction.
    And(Vec<TermId>),
    /// N-ary disjunction.
    Or(Vec<TermId>),
    /// Negation.
    Not(TermId),
}

/// Solver-visible mutable state attached to each term.
#[derive(Debug, Clone, Default)]
struct TermState {
    /// Boolean polarity assigned by the search engine, if any.
    polarity: Option<bool>,
    /// Decision id of the deduction that forced this atom, if any.
    deduced: Option<u32>,
    /// Partition bitmask for interpolation (proof mode only).
    partitions: u64,
}

/// Hash-consing term arena.
///
/// Structurally equal terms share a single id, so id equality is term
/// equality.
#[derive(Debug, Default)]
pub struct TermManager {
    kinds: Vec<TermKind>,
    states: Vec<TermState>,
    cons: FxHashMap<TermKind, TermId>,
}

impl TermManager {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: TermKind) -> TermId {
        if let Some(&id) = self.cons.get(&kind) {
            return id;
        }
        let id = TermId(u32::try_from(self.kinds.len()).unwrap_or(u32::MAX));
        self.cons.insert(kind.clone(), id);
        self.kinds.push(kind);
        self.states.push(TermState::default());
        id
    }

    /// Structural content of `id`.
    pub fn kind(&self, id: TermId) -> &TermKind {
        &self.kinds[id.index()]
    }

    /// Number of terms in the arena.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    // --- builders ---

    /// Boolean constant true.
    pub fn mk_true(&mut self) -> TermId {
        self.intern(TermKind::True)
    }

    /// Boolean constant false.
    pub fn mk_false(&mut self) -> TermId {
        self.intern(TermKind::False)
    }

    /// Named free variable.
    pub fn mk_var(&mut self, name: &str) -> TermId {
        self.intern(TermKind::Var(name.to_string()))
    }

    /// Exact rational constant.
    pub fn mk_num(&mut self, value: BigRational) -> TermId {
        self.intern(TermKind::Num(value))
    }

    /// Integer constant convenience builder.
    pub fn mk_int(&mut self, value: i64) -> TermId {
        self.mk_num(BigRational::from_integer(BigInt::from(value)))
    }

    /// Binary sum.
    pub fn mk_plus(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(TermKind::Plus(a, b))
    }

    /// Binary product.
    pub fn mk_times(&mut self, a: TermId, b: TermId) -> TermId {
        self.intern(TermKind::Times(a, b))
    }

    /// Non-strict inequality.
    pub fn mk_leq(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        self.intern(TermKind::Leq(lhs, rhs))
    }

    /// Equality.
    pub fn mk_eq(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        self.intern(TermKind::Eq(lhs, rhs))
    }

    /// N-ary conjunction; flattens the trivial cases.
    pub fn mk_and(&mut self, mut args: Vec<TermId>) -> TermId {
        let false_id = self.mk_false();
        if args.iter().any(|&a| a == false_id) {
            return false_id;
        }
        let true_id = self.mk_true();
        args.retain(|&a| a != true_id);
        match args.len() {
            0 => true_id,
            1 => args[0],
            _ => self.intern(TermKind::And(args)),
        }
    }

    /// N-ary disjunction; flattens the trivial cases.
    pub fn mk_or(&mut self, mut args: Vec<TermId>) -> TermId {
        let true_id = self.mk_true();
        if args.iter().any(|&a| a == true_id) {
            return true_id;
        }
        let false_id = self.mk_false();
        args.retain(|&a| a != false_id);
        match args.len() {
            0 => false_id,
            1 => args[0],
            _ => self.intern(TermKind::Or(args)),
        }
    }

    /// Negation; collapses double negation and constants.
    pub fn mk_not(&mut self, arg: TermId) -> TermId {
        match self.kind(arg) {
            TermKind::True => self.mk_false(),
            TermKind::False => self.mk_true(),
            TermKind::Not(inner) => *inner,
            _ => self.intern(TermKind::Not(arg)),
        }
    }

    /// The normalized atom `x - y <= c`.
    pub fn mk_diff_leq(&mut self, x: TermId, y: TermId, c: i64) -> TermId {
        let minus_one = self.mk_int(-1);
        let neg_y = self.mk_times(minus_one, y);
        let diff = self.mk_plus(x, neg_y);
        let bound = self.mk_int(c);
        self.mk_leq(diff, bound)
    }

    /// The normalized atom `x - y = c`.
    pub fn mk_diff_eq(&mut self, x: TermId, y: TermId, c: i64) -> TermId {
        let minus_one = self.mk_int(-1);
        let neg_y = self.mk_times(minus_one, y);
        let diff = self.mk_plus(x, neg_y);
        let bound = self.mk_int(c);
        self.mk_eq(diff, bound)
    }

    // --- shape accessors ---

    /// Whether `id` is an inequality atom.
    pub fn is_leq(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Leq(..))
    }

    /// Whether `id` is an equality atom.
    pub fn is_eq(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Eq(..))
    }

    /// Whether `id` is a sum.
    pub fn is_plus(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Plus(..))
    }

    /// Whether `id` is a product.
    pub fn is_times(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Times(..))
    }

    /// Whether `id` is a numeric constant.
    pub fn is_constant(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Num(_))
    }

    /// Whether `id` is a free variable.
    pub fn is_var(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Var(_))
    }

    /// First operand of a binary term.
    pub fn get_1st(&self, id: TermId) -> Option<TermId> {
        match self.kind(id) {
            TermKind::Plus(a, _)
            | TermKind::Times(a, _)
            | TermKind::Leq(a, _)
            | TermKind::Eq(a, _) => Some(*a),
            _ => None,
        }
    }

    /// Second operand of a binary term.
    pub fn get_2nd(&self, id: TermId) -> Option<TermId> {
        match self.kind(id) {
            TermKind::Plus(_, b)
            | TermKind::Times(_, b)
            | TermKind::Leq(_, b)
            | TermKind::Eq(_, b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value of a constant term.
    pub fn value(&self, id: TermId) -> Option<&BigRational> {
        match self.kind(id) {
            TermKind::Num(v) => Some(v),
            _ => None,
        }
    }

    // --- solver-visible state ---

    /// Current polarity of an atom.
    pub fn polarity(&self, id: TermId) -> Option<bool> {
        self.states[id.index()].polarity
    }

    /// Assign a polarity.
    pub fn set_polarity(&mut self, id: TermId, polarity: bool) {
        self.states[id.index()].polarity = Some(polarity);
    }

    /// Retract the polarity on backtracking.
    pub fn clear_polarity(&mut self, id: TermId) {
        self.states[id.index()].polarity = None;
    }

    /// Decision id of the deduction that forced `id`, if deduced.
    pub fn deduced(&self, id: TermId) -> Option<u32> {
        self.states[id.index()].deduced
    }

    /// Mark `id` as deduced at `decision`.
    pub fn set_deduced(&mut self, id: TermId, decision: u32) {
        self.states[id.index()].deduced = Some(decision);
    }

    /// Clear the deduced flag on backtracking.
    pub fn clear_deduced(&mut self, id: TermId) {
        self.states[id.index()].deduced = None;
    }

    /// Partition bitmask of `id` (interpolation only).
    pub fn partitions(&self, id: TermId) -> u64 {
        self.states[id.index()].partitions
    }

    /// Set the partition bitmask of `id`.
    pub fn set_partitions(&mut self, id: TermId, mask: u64) {
        self.states[id.index()].partitions = mask;
    }

    /// Clear polarity and deduced flags on every term (solver reset).
    pub fn clear_solver_state(&mut self) {
        for state in &mut self.states {
            state.polarity = None;
            state.deduced = None;
        }
    }
}
