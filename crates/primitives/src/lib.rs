//! Core text types for fixup tasks: positions, ranges, changes, and change sets.
//!
//! Positions are zero-based `(line, character)` pairs where `character` counts
//! Unicode scalar values. Only `\n` terminates a line; a preceding `\r` is an
//! ordinary character.

/// Single text changes expressed in line/character coordinates.
pub mod change;
/// Line/character positions and half-open ranges.
pub mod position;
/// Rope utilities: char offset and position conversions.
pub mod rope;
/// Char-offset change sets used to apply and map edit batches.
pub mod transaction;

pub use change::TextChange;
pub use position::{Position, TextRange};
pub use rope::{CharIdx, CharLen, RopeError};
pub use ropey::{Rope, RopeSlice};
pub use transaction::{Bias, Change, ChangeError, ChangeSet};
