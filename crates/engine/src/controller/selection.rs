//! Point-selection expansion.

use fixup_primitives::rope::line_len;
use fixup_primitives::{Position, Rope, RopeSlice, TextRange};

use crate::task::{Intent, Mode};

/// Range, intent and mode a new task actually starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Target {
	pub range: TextRange,
	pub intent: Intent,
	pub mode: Mode,
}

/// Widens an empty selection to the indentation block around the cursor.
///
/// The block is the run of non-blank lines indented at least as deep as the
/// cursor line, plus the first less-indented line above it. A blank cursor
/// line turns the task into an insertion at the cursor.
pub(crate) fn expand(doc: &Rope, range: TextRange, intent: Intent, mode: Mode) -> Target {
	let unchanged = Target { range, intent, mode };
	if !range.is_empty() || !intent.wants_context() {
		return unchanged;
	}
	let text = doc.slice(..);
	let cursor = range.start.line as usize;
	if cursor >= text.len_lines() {
		return unchanged;
	}

	let Some(base) = indent(text, cursor) else {
		return Target {
			range,
			intent: Intent::Add,
			mode: Mode::Insert,
		};
	};

	let in_block = |line: usize| indent(text, line).is_some_and(|depth| depth >= base);
	let mut first = cursor;
	while first > 0 && in_block(first - 1) {
		first -= 1;
	}
	let mut last = cursor;
	while last + 1 < text.len_lines() && in_block(last + 1) {
		last += 1;
	}
	if first > 0 && indent(text, first - 1).is_some() {
		first -= 1;
	}

	Target {
		range: TextRange::new(Position::new(first as u32, 0), Position::new(last as u32, line_len(text, last) as u32)),
		intent,
		mode,
	}
}

/// Leading whitespace width of `line`, or `None` for a blank line.
fn indent(text: RopeSlice, line: usize) -> Option<usize> {
	let mut width = 0;
	for ch in text.line(line).chars() {
		match ch {
			' ' | '\t' => width += 1,
			'\n' | '\r' => return None,
			_ => return Some(width),
		}
	}
	None
}
