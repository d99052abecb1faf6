mod changeset;
mod types;


pub use changeset::ChangeSet;
use thiserror::Error;
pub use types::{Bias, Change};

use crate::rope::CharIdx;

/// Rejected change list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
	/// A change starts before the previous one ends.
	#[error("change at {at} overlaps a previous change")]
	Overlapping { at: CharIdx },
	/// A change lies outside the document or is reversed.
	#[error("change {start}..{end} out of bounds (document length {len})")]
	OutOfBounds { start: CharIdx, end: CharIdx, len: usize },
}
