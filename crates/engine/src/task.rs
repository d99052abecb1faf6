//! Task records stored in the controller arena.
//!
//! Field groups have single owners: [`TaskLifecycle`] is mutated only by the
//! controller, [`ReplacementText`] only by the reconciler and [`TrackedRanges`]
//! only by the document observer. The other fields are fixed at creation.

use std::fmt;

use fixup_primitives::TextRange;
use serde::{Deserialize, Serialize};

use crate::controller::TaskLifecycle;
use crate::diff::Diff;
use crate::observer::TrackedRanges;
use crate::reconciler::ReplacementText;

/// Document identifier shared with the host.
pub type DocumentUri = String;

/// Opaque task identity. Ordering follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
	pub(crate) const fn new(raw: u64) -> Self {
		Self(raw)
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "task-{}", self.0)
	}
}

/// Key of a speculative generation started before its task exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefetchKey(pub String);

impl fmt::Display for PrefetchKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
	Idle,
	Pending,
	Working,
	Inserting,
	Applying,
	Formatting,
	Applied,
	Finished,
	Error,
}

impl TaskState {
	/// States in which a task may still change the document on its own.
	pub const ACTIVE: [TaskState; 5] = [Self::Pending, Self::Working, Self::Inserting, Self::Applying, Self::Formatting];

	pub fn is_active(self) -> bool {
		Self::ACTIVE.contains(&self)
	}

	/// States in which streamed text is accepted.
	pub fn is_streaming(self) -> bool {
		matches!(self, Self::Working | Self::Inserting)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Pending => "pending",
			Self::Working => "working",
			Self::Inserting => "inserting",
			Self::Applying => "applying",
			Self::Formatting => "formatting",
			Self::Applied => "applied",
			Self::Finished => "finished",
			Self::Error => "error",
		}
	}
}

impl fmt::Display for TaskState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// How the model output lands in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
	/// Replace the selection with the final text, diffed against user edits.
	#[default]
	Replace,
	/// Stream the text into the document at the selection.
	Insert,
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	#[default]
	Edit,
	Add,
	Test,
	Doc,
	SmartApply,
}

impl Intent {
	/// Intents that read better with the enclosing block as context.
	pub fn wants_context(self) -> bool {
		matches!(self, Self::Edit | Self::Doc)
	}
}

/// Optional creation parameters.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
	/// File that receives the output instead of `uri` (test intent).
	pub destination: Option<DocumentUri>,
	/// Adopt a prefetched generation instead of issuing a new request.
	pub prefetch_key: Option<PrefetchKey>,
}

/// Holds the last computed diff. Once set it is never cleared.
#[derive(Debug, Clone, Default)]
pub struct DiffSlot(Option<Diff>);

impl DiffSlot {
	pub fn get(&self) -> Option<&Diff> {
		self.0.as_ref()
	}

	pub(crate) fn set(&mut self, diff: Diff) {
		self.0 = Some(diff);
	}

	/// Returns the diff, panicking when none was ever computed.
	pub(crate) fn require(&self, id: TaskId) -> &Diff {
		match &self.0 {
			Some(diff) => diff,
			None => panic!("{id}: diff requested before one was computed"),
		}
	}
}

/// One AI-driven edit against a document region.
#[derive(Debug)]
pub struct FixupTask {
	pub(crate) id: TaskId,
	pub(crate) uri: DocumentUri,
	pub(crate) instruction: String,
	pub(crate) intent: Intent,
	pub(crate) mode: Mode,
	pub(crate) original_text: String,
	pub(crate) destination: Option<DocumentUri>,
	pub(crate) prefetch_key: Option<PrefetchKey>,
	pub(crate) lifecycle: TaskLifecycle,
	pub(crate) text: ReplacementText,
	pub(crate) ranges: TrackedRanges,
	pub(crate) diff: DiffSlot,
}

impl FixupTask {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		id: TaskId,
		uri: DocumentUri,
		instruction: String,
		intent: Intent,
		mode: Mode,
		original_text: String,
		range: TextRange,
		options: TaskOptions,
	) -> Self {
		Self {
			id,
			uri,
			instruction,
			intent,
			mode,
			original_text,
			destination: options.destination,
			prefetch_key: options.prefetch_key,
			lifecycle: TaskLifecycle::default(),
			text: ReplacementText::default(),
			ranges: TrackedRanges::new(range),
			diff: DiffSlot::default(),
		}
	}

	pub fn id(&self) -> TaskId {
		self.id
	}

	pub fn uri(&self) -> &str {
		&self.uri
	}

	pub fn instruction(&self) -> &str {
		&self.instruction
	}

	pub fn intent(&self) -> Intent {
		self.intent
	}

	pub fn mode(&self) -> Mode {
		self.mode
	}

	pub fn state(&self) -> TaskState {
		self.lifecycle.state()
	}

	pub fn original_text(&self) -> &str {
		&self.original_text
	}

	pub fn selection_range(&self) -> TextRange {
		self.ranges.selection()
	}

	pub fn original_range(&self) -> TextRange {
		self.ranges.original()
	}

	pub fn diff(&self) -> Option<&Diff> {
		self.diff.get()
	}

	pub fn snapshot(&self) -> TaskSnapshot {
		TaskSnapshot {
			id: self.id,
			uri: self.uri.clone(),
			state: self.lifecycle.state(),
			intent: self.intent,
			mode: self.mode,
			instruction: self.instruction.clone(),
			original_range: self.ranges.original(),
			selection_range: self.ranges.selection(),
			original_text: self.original_text.clone(),
			in_progress_replacement: self.text.in_progress().map(str::to_owned),
			replacement: self.text.replacement().map(str::to_owned),
			spin_count: self.lifecycle.spin_count(),
			error: self.lifecycle.error().map(str::to_owned),
			destination: self.destination.clone(),
			diff_clean: self.diff.get().map(|diff| diff.clean),
			formatting_pending: self.lifecycle.has_formatting_gate(),
		}
	}
}

/// Owned copy of a task's observable fields, sent to UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
	pub id: TaskId,
	pub uri: DocumentUri,
	pub state: TaskState,
	pub intent: Intent,
	pub mode: Mode,
	pub instruction: String,
	pub original_range: TextRange,
	pub selection_range: TextRange,
	pub original_text: String,
	pub in_progress_replacement: Option<String>,
	pub replacement: Option<String>,
	pub spin_count: u32,
	pub error: Option<String>,
	pub destination: Option<DocumentUri>,
	pub diff_clean: Option<bool>,
	pub formatting_pending: bool,
}

/// Notifications for decoration and UI layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskNotification {
	/// Emitted after every state transition.
	StateChanged(TaskSnapshot),
	/// Emitted when a task is discarded.
	Deleted(TaskId),
	/// A user-facing warning about a task.
	Warning { id: TaskId, message: String },
}
