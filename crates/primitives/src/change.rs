use serde::{Deserialize, Serialize};

use crate::position::{Position, TextRange};

/// A single replacement of `range` (pre-change positions) with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextChange {
	/// The range in the document that was replaced.
	pub range: TextRange,
	/// The text that replaced the range.
	pub text: String,
}

impl TextChange {
	/// Creates a replacement of `range` with `text`.
	pub fn new(range: TextRange, text: impl Into<String>) -> Self {
		Self { range, text: text.into() }
	}

	/// Creates a pure insertion at `pos`.
	pub fn insert(pos: Position, text: impl Into<String>) -> Self {
		Self::new(TextRange::point(pos), text)
	}

	/// Creates a pure deletion of `range`.
	pub fn delete(range: TextRange) -> Self {
		Self::new(range, String::new())
	}

	/// Returns true if the change inserts without removing anything.
	pub fn is_insertion(&self) -> bool {
		self.range.is_empty()
	}

	/// Position just after the inserted text, in post-change coordinates.
	pub fn inserted_end(&self) -> Position {
		self.range.start.advance(&self.text)
	}
}
