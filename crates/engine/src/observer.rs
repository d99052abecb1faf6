//! Routes document mutations to the tasks they affect.
//!
//! This module is the only writer of task ranges.

use fixup_primitives::{TextChange, TextRange};
use indexmap::IndexMap;
use tracing::trace;

use crate::task::{FixupTask, Mode, TaskId, TaskState};
use crate::tracked_range::{CollapsePolicy, RangePolicy, UpdateOptions, update_range};

/// Anchor and live ranges of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRanges {
	original: TextRange,
	selection: TextRange,
}

impl TrackedRanges {
	pub(crate) fn new(range: TextRange) -> Self {
		Self {
			original: range,
			selection: range,
		}
	}

	/// Range captured at creation, never moved by edits.
	pub fn original(&self) -> TextRange {
		self.original
	}

	/// Live range following concurrent edits and streamed text.
	pub fn selection(&self) -> TextRange {
		self.selection
	}
}

/// Who produced a batch of document changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
	/// The user or any other actor outside the engine.
	External,
	/// Edits the engine applied on behalf of a task.
	Task(TaskId),
}

/// Updates the ranges of every live task in `uri`.
///
/// Returns the tasks whose range was touched by a change they did not make,
/// in arena order.
pub(crate) fn observe(tasks: &mut IndexMap<TaskId, FixupTask>, uri: &str, changes: &[TextChange], origin: EditOrigin) -> Vec<TaskId> {
	let mut touched = Vec::new();
	for task in tasks.values_mut() {
		if task.uri != uri || task.state() == TaskState::Finished {
			continue;
		}
		let own = origin == EditOrigin::Task(task.id);
		let before = task.ranges.selection;
		task.ranges.selection = update_range(before, changes, options_for(task, own));

		if !own && changes.iter().any(|change| change.range.touches(&before)) {
			touched.push(task.id);
		}
		if before != task.ranges.selection {
			trace!(task = %task.id, ?before, after = ?task.ranges.selection, own, "fixup.observer.range");
		}
	}
	touched
}

/// Points a task at a new region, resetting both ranges.
pub(crate) fn retarget(task: &mut FixupTask, range: TextRange) {
	task.ranges = TrackedRanges::new(range);
}

fn options_for(task: &FixupTask, own: bool) -> UpdateOptions {
	if own {
		return UpdateOptions::OWN;
	}
	// A streaming insertion keeps its anchor even when the region is replaced wholesale.
	let collapse = if task.mode == Mode::Insert && task.state().is_streaming() {
		CollapsePolicy::Expand
	} else {
		CollapsePolicy::Collapse
	};
	UpdateOptions {
		policy: RangePolicy::Fixed,
		collapse,
	}
}
