use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Position in line/character coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based character offset in the line.
	pub character: u32,
}

impl Position {
	/// Creates a new position.
	pub const fn new(line: u32, character: u32) -> Self {
		Self { line, character }
	}

	/// Returns the position reached after writing `text` starting here.
	pub fn advance(self, text: &str) -> Self {
		let breaks = text.matches('\n').count() as u32;
		if breaks == 0 {
			return Self::new(self.line, self.character + text.chars().count() as u32);
		}
		let tail = text.rsplit('\n').next().unwrap_or_default();
		Self::new(self.line + breaks, tail.chars().count() as u32)
	}

	/// Interprets `self` as relative to `anchor` and returns the absolute position.
	///
	/// Only positions on the first relative line inherit the anchor's column.
	pub fn offset_from(self, anchor: Position) -> Self {
		if self.line == 0 {
			Self::new(anchor.line, anchor.character + self.character)
		} else {
			Self::new(anchor.line + self.line, self.character)
		}
	}
}

impl PartialOrd for Position {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Position {
	fn cmp(&self, other: &Self) -> Ordering {
		self.line.cmp(&other.line).then(self.character.cmp(&other.character))
	}
}

/// Half-open range `[start, end)` of positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
	/// Start position (inclusive).
	pub start: Position,
	/// End position (exclusive).
	pub end: Position,
}

impl TextRange {
	/// Creates a new range, swapping the endpoints if they are reversed.
	pub fn new(start: Position, end: Position) -> Self {
		if end < start { Self { start: end, end: start } } else { Self { start, end } }
	}

	/// Creates a zero-length range at a position.
	pub const fn point(pos: Position) -> Self {
		Self { start: pos, end: pos }
	}

	/// Shorthand for a range from `(start_line, start_char)` to `(end_line, end_char)`.
	pub fn from_coords(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
		Self::new(Position::new(start_line, start_char), Position::new(end_line, end_char))
	}

	/// Returns true when start equals end.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Returns true when `pos` lies within `[start, end]`.
	pub fn contains_position(&self, pos: Position) -> bool {
		self.start <= pos && pos <= self.end
	}

	/// Returns true when `other` lies entirely within this range.
	pub fn contains(&self, other: &TextRange) -> bool {
		self.start <= other.start && other.end <= self.end
	}

	/// Returns true when the ranges overlap or share a boundary.
	pub fn touches(&self, other: &TextRange) -> bool {
		self.start <= other.end && other.start <= self.end
	}
}
