//! Craig Interpolation over Conflict Cycles.
//!
//! A theory conflict in difference logic is a negative cycle. For a
//! partition boundary splitting the input into A and B, the maximal
//! runs of A-colored edges along the cycle sum to linear "chord"
//! inequalities between the run endpoints; their conjunction is a
//! Craig interpolant: it follows from A, contradicts B together with
//! the B-colored remainder of the cycle, and mentions only boundary
//! vertices, which are shared symbols by construction. Degenerate
//! one-color cycles yield `false` (all A) or `true` (all B).
//!
//! The labeling of AB-shared atoms is selectable (McMillan, McMillan',
//! Pudlák); for difference logic the Pudlák rule coincides with the
//! B-side split.

use crate::ast::{TermId, TermManager};
use crate::config::ItpAlgorithm;
use crate::graph::{DlGraph, EdgeId, VertexId};
use crate::num::DlNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    A,
    B,
}

/// Classify an atom for the boundary after partition `boundary`.
///
/// The A side consists of partitions `0..=boundary`; an atom occurring
/// on both sides is labeled per the selected rule. Atoms without
/// partition information conservatively land in B.
fn color_of(mask: u64, boundary: u32, algo: ItpAlgorithm) -> Color {
    let a_mask = (1u64 << (boundary + 1)) - 1;
    let in_a = mask & a_mask != 0;
    let in_b = mask & !a_mask != 0;
    match (in_a, in_b) {
        (true, false) => Color::A,
        (true, true) => match algo {
            ItpAlgorithm::McMillanPrime => Color::A,
            ItpAlgorithm::McMillan | ItpAlgorithm::Pudlak => Color::B,
        },
        _ => Color::B,
    }
}

/// Build one interpolant per partition boundary for a negative cycle.
///
/// `cycle` must be a closed walk (each edge's target is the next
/// edge's source). Returns an empty vector when fewer than two
/// partitions exist.
pub(crate) fn cycle_interpolants<W: DlNumber>(
    tm: &mut TermManager,
    g: &DlGraph<W>,
    cycle: &[EdgeId],
    n_partitions: u32,
    algo: ItpAlgorithm,
) -> Vec<TermId> {
    if n_partitions < 2 || cycle.is_empty() {
        return Vec::new();
    }
    (0..n_partitions - 1)
        .map(|boundary| boundary_interpolant(tm, g, cycle, boundary, algo))
        .collect()
}

fn boundary_interpolant<W: DlNumber>(
    tm: &mut TermManager,
    g: &DlGraph<W>,
    cycle: &[EdgeId],
    boundary: u32,
    algo: ItpAlgorithm,
) -> TermId {
    let colors: Vec<Color> = cycle
        .iter()
        .map(|&e| color_of(tm.partitions(g.edge(e).atom), boundary, algo))
        .collect();

    if colors.iter().all(|&c| c == Color::A) {
        return tm.mk_false();
    }
    let Some(first_b) = colors.iter().position(|&c| c == Color::B) else {
        unreachable!()
    };
    if colors.iter().all(|&c| c == Color::B) {
        return tm.mk_true();
    }

    // Rotate so the walk starts on a B edge; A runs then never wrap
    // around the end of the slice.
    let len = cycle.len();
    let mut chords = Vec::new();
    let mut run: Option<(VertexId, VertexId, W)> = None;
    for step in 0..len {
        let idx = (first_b + step) % len;
        let edge = g.edge(cycle[idx]);
        match colors[idx] {
            Color::A => {
                run = Some(match run.take() {
                    None => (edge.from, edge.to, edge.weight.clone()),
                    Some((start, _, sum)) => (start, edge.to, sum + edge.weight.clone()),
                });
            }
            Color::B => {
                if let Some((start, end, sum)) = run.take() {
                    chords.push(chord(tm, g, start, end, &sum));
                }
            }
        }
    }
    if let Some((start, end, sum)) = run.take() {
        chords.push(chord(tm, g, start, end, &sum));
    }
    tm.mk_and(chords)
}

/// The linear inequality `term(start) - term(end) <= sum` summarizing
/// one maximal A-run. Zero-vertex endpoints drop out of the
/// difference.
fn chord<W: DlNumber>(
    tm: &mut TermManager,
    g: &DlGraph<W>,
    start: VertexId,
    end: VertexId,
    sum: &W,
) -> TermId {
    let start_term = g.vertices[start.index()].term;
    let end_term = g.vertices[end.index()].term;
    let lhs = match (start_term, end_term) {
        (Some(s), Some(e)) => {
            let minus_one = tm.mk_int(-1);
            let neg_e = tm.mk_times(minus_one, e);
            tm.mk_plus(s, neg_e)
        }
        (Some(s), None) => s,
        (None, Some(e)) => {
            let minus_one = tm.mk_int(-1);
            tm.mk_times(minus_one, e)
        }
        (None, None) => tm.mk_int(0),
    };
    let bound = tm.mk_num(sum.to_rational());
    tm.mk_leq(lhs, bound)
}

/// Combine the two branch interpolants of a disequality case-split:
/// disjunction when the equality atom is A-colored at the boundary,
/// conjunction otherwise (Craig's construction for the introduced
/// case-split literal).
pub(crate) fn merge_split(
    tm: &mut TermManager,
    algo: ItpAlgorithm,
    n_partitions: u32,
    atom: TermId,
    first: Vec<TermId>,
    second: Vec<TermId>,
) -> Vec<TermId> {
    if first.is_empty() {
        return second;
    }
    if second.is_empty() {
        return first;
    }
    debug_assert_eq!(first.len(), second.len());
    let mask = tm.partitions(atom);
    first
        .into_iter()
        .zip(second)
        .enumerate()
        .map(|(boundary, (a, b))| {
            match color_of(mask, boundary as u32, algo) {
                Color::A => tm.mk_or(vec![a, b]),
                Color::B => tm.mk_and(vec![a, b]),
            }
        })
        .collect()
}
