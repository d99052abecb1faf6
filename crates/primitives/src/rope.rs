//! Rope utilities and extensions.
//!
//! The workspace builds ropey without `cr_lines` and `unicode_lines`, so only
//! `\n` counts as a line break here.

use std::ops::Range;

use ropey::RopeSlice;
use thiserror::Error;

use crate::position::{Position, TextRange};

/// Character index into a rope.
pub type CharIdx = usize;
/// Length measured in characters.
pub type CharLen = usize;

/// Failure to resolve a line/character position against a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RopeError {
	/// The line lies past the last line of the document.
	#[error("line {line} out of bounds (document has {len_lines} lines)")]
	LineOutOfBounds { line: u32, len_lines: usize },
	/// The character lies past the end of its line.
	#[error("character {character} out of bounds on line {line} (line length {line_len})")]
	CharOutOfBounds { line: u32, character: u32, line_len: usize },
}

/// Returns the length of `line` in characters, excluding its line break.
pub fn line_len(text: RopeSlice, line: usize) -> CharLen {
	let slice = text.line(line);
	let len = slice.len_chars();
	if len > 0 && slice.char(len - 1) == '\n' { len - 1 } else { len }
}

/// Resolves a position to a character index.
pub fn pos_to_char(text: RopeSlice, pos: Position) -> Result<CharIdx, RopeError> {
	let line = pos.line as usize;
	if line >= text.len_lines() {
		return Err(RopeError::LineOutOfBounds {
			line: pos.line,
			len_lines: text.len_lines(),
		});
	}
	let len = line_len(text, line);
	if pos.character as usize > len {
		return Err(RopeError::CharOutOfBounds {
			line: pos.line,
			character: pos.character,
			line_len: len,
		});
	}
	Ok(text.line_to_char(line) + pos.character as usize)
}

/// Converts a character index to a position, clamping to the document end.
pub fn char_to_pos(text: RopeSlice, idx: CharIdx) -> Position {
	let idx = idx.min(text.len_chars());
	let line = text.char_to_line(idx);
	let character = idx - text.line_to_char(line);
	Position::new(line as u32, character as u32)
}

/// Resolves a range to a character index range.
pub fn range_to_chars(text: RopeSlice, range: TextRange) -> Result<Range<CharIdx>, RopeError> {
	Ok(pos_to_char(text, range.start)?..pos_to_char(text, range.end)?)
}

/// Returns the text covered by `range`.
pub fn slice_range(text: RopeSlice, range: TextRange) -> Result<String, RopeError> {
	let chars = range_to_chars(text, range)?;
	Ok(text.slice(chars).to_string())
}

/// Position just past the last character.
pub fn end_position(text: RopeSlice) -> Position {
	char_to_pos(text, text.len_chars())
}
