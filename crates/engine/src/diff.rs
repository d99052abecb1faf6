//! Three-way diff between a task's original text, the model's proposal and the
//! live buffer.
//!
//! Model hunks (`original → proposed`) are rebased onto the buffer through the
//! user hunks (`original → buffer`). A model hunk that touches a user hunk is a
//! conflict unless both made the identical change.

use std::ops::Range;

use fixup_primitives::rope::char_to_pos;
use fixup_primitives::{Bias, Change, ChangeSet, CharIdx, Position, Rope, TextChange, TextRange};
use similar::{Algorithm, ChangeTag, TextDiff};


/// Result of [`compute_diff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
	/// Non-overlapping edits in document coordinates, sorted by position.
	pub edits: Vec<TextChange>,
	/// True when no model hunk collided with a user edit.
	pub clean: bool,
	/// Number of model hunks that collided with user edits.
	pub conflicts: usize,
	/// Buffer snapshot the edits were computed against.
	pub buffer_text: String,
	/// Original snapshot the model worked from.
	pub original_text: String,
	/// Model proposal the edits realise.
	pub proposed_text: String,
}

impl Diff {
	/// True when `buffer` differs from the snapshot this diff was computed against.
	pub fn is_stale(&self, buffer: &str) -> bool {
		self.buffer_text != buffer
	}

	/// True when this diff was computed for `proposed` against `buffer`.
	pub fn is_current(&self, proposed: &str, buffer: &str) -> bool {
		self.proposed_text == proposed && !self.is_stale(buffer)
	}
}

/// A replaced span of the base text, in char offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
	old: Range<CharIdx>,
	text: String,
}

/// Computes the edits that turn `buffer` into the model's intent.
///
/// `anchor` is the document position of the first character of `buffer`.
/// The function is pure; identical inputs give identical output.
pub fn compute_diff(original: &str, proposed: &str, buffer: &str, anchor: Position) -> Diff {
	let buffer_rope = Rope::from_str(buffer);
	let to_edit = |hunk: Hunk, start: CharIdx, end: CharIdx| {
		let slice = buffer_rope.slice(..);
		let range = TextRange::new(char_to_pos(slice, start).offset_from(anchor), char_to_pos(slice, end).offset_from(anchor));
		TextChange::new(range, hunk.text)
	};

	if original.is_empty() {
		// Nothing to conflict with: rewrite whatever the buffer holds.
		let edits = line_hunks(buffer, proposed)
			.into_iter()
			.map(|hunk| {
				let (start, end) = (hunk.old.start, hunk.old.end);
				to_edit(hunk, start, end)
			})
			.collect();
		return Diff {
			edits,
			clean: true,
			conflicts: 0,
			buffer_text: buffer.to_owned(),
			original_text: String::new(),
			proposed_text: proposed.to_owned(),
		};
	}

	let model = line_hunks(original, proposed);
	let user = line_hunks(original, buffer);
	let rebase = ChangeSet::from_changes(
		original.chars().count(),
		user.iter().map(|hunk| Change {
			start: hunk.old.start,
			end: hunk.old.end,
			replacement: Some(hunk.text.clone()),
		}),
	)
	.unwrap_or_else(|err| unreachable!("line diff produced invalid hunks: {err}"));

	let mut edits = Vec::with_capacity(model.len());
	let mut conflicts = 0;
	for hunk in model {
		if user.contains(&hunk) {
			continue;
		}
		if user.iter().any(|theirs| touches(&theirs.old, &hunk.old)) {
			conflicts += 1;
			continue;
		}
		let start = rebase.map_pos(hunk.old.start, Bias::Right);
		let end = if hunk.old.is_empty() { start } else { rebase.map_pos(hunk.old.end, Bias::Left) };
		edits.push(to_edit(hunk, start, end));
	}

	Diff {
		edits,
		clean: conflicts == 0,
		conflicts,
		buffer_text: buffer.to_owned(),
		original_text: original.to_owned(),
		proposed_text: proposed.to_owned(),
	}
}

fn touches(a: &Range<CharIdx>, b: &Range<CharIdx>) -> bool {
	a.start <= b.end && b.start <= a.end
}

/// Line-level Myers diff, with each changed block trimmed to the characters
/// that actually differ.
fn line_hunks(base: &str, target: &str) -> Vec<Hunk> {
	let diff = TextDiff::configure().algorithm(Algorithm::Myers).diff_lines(base, target);

	let mut hunks = Vec::new();
	let mut offset = 0;
	let mut pending: Option<(CharIdx, String, String)> = None;

	for change in diff.iter_all_changes() {
		let value = change.value();
		match change.tag() {
			ChangeTag::Equal => {
				if let Some((start, removed, inserted)) = pending.take() {
					hunks.extend(trim(start, &removed, &inserted));
				}
				offset += value.chars().count();
			}
			ChangeTag::Delete => {
				let (_, removed, _) = pending.get_or_insert_with(|| (offset, String::new(), String::new()));
				removed.push_str(value);
				offset += value.chars().count();
			}
			ChangeTag::Insert => {
				let (_, _, inserted) = pending.get_or_insert_with(|| (offset, String::new(), String::new()));
				inserted.push_str(value);
			}
		}
	}
	if let Some((start, removed, inserted)) = pending {
		hunks.extend(trim(start, &removed, &inserted));
	}
	hunks
}

fn trim(start: CharIdx, removed: &str, inserted: &str) -> Option<Hunk> {
	let old: Vec<char> = removed.chars().collect();
	let new: Vec<char> = inserted.chars().collect();
	let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
	let room = old.len().min(new.len()) - prefix;
	let suffix = old.iter().rev().zip(new.iter().rev()).take(room).take_while(|(a, b)| a == b).count();

	let old_span = start + prefix..start + old.len() - suffix;
	let text: String = new[prefix..new.len() - suffix].iter().collect();
	if old_span.is_empty() && text.is_empty() {
		return None;
	}
	Some(Hunk { old: old_span, text })
}
