//! Keeps a range anchored across concurrent document edits.
//!
//! Every change in a batch is expressed in pre-batch coordinates. Changes are
//! applied back to front so earlier changes still see their original
//! coordinates, which makes the result independent of batch order as long as
//! the changes do not overlap each other.

use fixup_primitives::{Position, TextChange, TextRange};


/// How a range treats changes that straddle one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePolicy {
	/// The endpoint moves so the changed text ends up outside the range.
	Fixed,
	/// The endpoint moves so the changed text ends up inside the range.
	Expanding,
}

/// What happens when a change covers the whole range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollapsePolicy {
	/// The range becomes empty at the start of the change.
	Collapse,
	/// The range covers the text that replaced it.
	Expand,
}

/// Policy pair for [`update_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
	pub policy: RangePolicy,
	pub collapse: CollapsePolicy,
}

impl UpdateOptions {
	/// Edits made on behalf of the task owning the range.
	pub const OWN: Self = Self {
		policy: RangePolicy::Expanding,
		collapse: CollapsePolicy::Expand,
	};

	/// Edits made by anyone else.
	pub const EXTERNAL: Self = Self {
		policy: RangePolicy::Fixed,
		collapse: CollapsePolicy::Collapse,
	};
}

/// Recomputes where `range` lies after `changes` are applied.
pub fn update_range(range: TextRange, changes: &[TextChange], options: UpdateOptions) -> TextRange {
	let mut ordered: Vec<&TextChange> = changes.iter().collect();
	ordered.sort_by(|a, b| b.range.start.cmp(&a.range.start).then(b.range.end.cmp(&a.range.end)));
	ordered.into_iter().fold(range, |range, change| apply_change(range, change, options))
}

fn apply_change(range: TextRange, change: &TextChange, options: UpdateOptions) -> TextRange {
	let TextRange { start: s, end: e } = change.range;
	let inserted_end = change.inserted_end();
	let absorb = change.is_insertion() && options.policy == RangePolicy::Expanding;

	if e < range.start || (e == range.start && !absorb) {
		return TextRange {
			start: shift(range.start, change, inserted_end),
			end: shift(range.end, change, inserted_end),
		};
	}
	if s > range.end || (s == range.end && !absorb) {
		return range;
	}
	if s <= range.start && e >= range.end {
		let expand = options.policy == RangePolicy::Expanding || options.collapse == CollapsePolicy::Expand;
		return if expand { TextRange { start: s, end: inserted_end } } else { TextRange::point(s) };
	}
	if s <= range.start {
		let start = match options.policy {
			RangePolicy::Expanding => s,
			RangePolicy::Fixed => inserted_end,
		};
		return TextRange {
			start,
			end: shift(range.end, change, inserted_end),
		};
	}
	if e >= range.end {
		let end = match options.policy {
			RangePolicy::Expanding => inserted_end,
			RangePolicy::Fixed => s,
		};
		return TextRange { start: range.start, end };
	}
	TextRange {
		start: range.start,
		end: shift(range.end, change, inserted_end),
	}
}

/// Maps a position at or after the change end into post-change coordinates.
fn shift(pos: Position, change: &TextChange, inserted_end: Position) -> Position {
	let end = change.range.end;
	if pos.line == end.line {
		return Position::new(inserted_end.line, inserted_end.character + (pos.character - end.character));
	}
	let line = i64::from(pos.line) + i64::from(inserted_end.line) - i64::from(end.line);
	Position::new(line as u32, pos.character)
}
