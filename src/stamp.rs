//! Generation-Counter Scratch Fields.
//!
//! The incremental cycle check touches only the subgraph reachable from
//! the new edge, so resetting every per-vertex scratch field between
//! calls would cost O(V) per call. Instead each scratch cell stores its
//! value together with the generation that wrote it; a cell reads as
//! unset unless its generation matches the current call's token.
//! Invalidation of all cells is then a single counter bump.

/// A call-scoped generation token.
///
/// Tokens are only meaningful relative to the [`StampSource`] that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp(u64);

/// Monotone source of generation tokens.
#[derive(Debug, Default)]
pub struct StampSource {
    current: u64,
}

impl StampSource {
    /// Create a source whose first token invalidates all fresh cells.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every cell written under
    /// earlier tokens.
    pub fn advance(&mut self) -> Stamp {
        self.current += 1;
        Stamp(self.current)
    }

    /// The token of the current generation.
    pub fn current(&self) -> Stamp {
        Stamp(self.current)
    }
}

/// A scratch cell that is logically reset whenever its owner's
/// [`StampSource`] advances.
#[derive(Debug, Clone)]
pub struct Stamped<T> {
    slot: Option<T>,
    generation: u64,
}

impl<T> Default for Stamped<T> {
    fn default() -> Self {
        Self {
            slot: None,
            generation: 0,
        }
    }
}

impl<T> Stamped<T> {
    /// Create an unset cell.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cell; `None` unless it was written under `token`.
    pub fn get(&self, token: Stamp) -> Option<&T> {
        if self.generation == token.0 {
            self.slot.as_ref()
        } else {
            None
        }
    }

    /// Write the cell under `token`.
    pub fn set(&mut self, token: Stamp, value: T) {
        self.slot = Some(value);
        self.generation = token.0;
    }

    /// Explicitly unset the cell for the current generation.
    pub fn clear(&mut self) {
        self.slot = None;
        self.generation = 0;
    }

    /// Whether the cell holds a value for `token`.
    pub fn is_set(&self, token: Stamp) -> bool {
        self.generation == token.0 && self.slot.is_some()
    }
}
