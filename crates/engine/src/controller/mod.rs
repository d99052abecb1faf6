//! Task lifecycle management.
//!
//! [`FixupController`] owns every task and is the only place a task's state
//! changes. Work that completes off the controller (model streams, formatter
//! calls and idle timers) reports back through one event channel; the
//! controller handles those events in [`step`](FixupController::step) and then
//! runs queued follow-up work until nothing is left.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use fixup_primitives::rope::end_position;
use fixup_primitives::{Position, Rope, TextChange, TextRange};
use fixup_worker::{IdleScheduler, TaskClass, spawn};
use indexmap::{IndexMap, IndexSet};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, FixupConfig};
use crate::diff::compute_diff;
use crate::error::{FixupError, HostError, Result, TransportError, TransportErrorKind};
use crate::event::FixupEvent;
use crate::host::{AllowAll, CompletionRequest, CompletionTransport, DocumentHost, Guardrails};
use crate::observer::{self, EditOrigin};
use crate::reconciler::{Ingested, Reconciler};
use crate::task::{DocumentUri, FixupTask, Intent, Mode, PrefetchKey, TaskId, TaskNotification, TaskOptions, TaskSnapshot, TaskState};

mod selection;
mod state;

pub use state::TaskLifecycle;

/// Work deferred until the current event batch has been handled.
#[derive(Debug)]
enum Followup {
	Drain(TaskId),
	Apply(TaskId),
	FlushDiffs,
	Formatted {
		id: TaskId,
		gate: u64,
		result: std::result::Result<Vec<TextChange>, HostError>,
	},
	Evicted(TaskId),
}

impl Followup {
	fn task(&self) -> Option<TaskId> {
		match self {
			Self::Drain(id) | Self::Apply(id) | Self::Evicted(id) | Self::Formatted { id, .. } => Some(*id),
			Self::FlushDiffs => None,
		}
	}
}

/// Owns every fixup task and drives them through their lifecycle.
pub struct FixupController {
	config: FixupConfig,
	host: Arc<dyn DocumentHost>,
	tasks: IndexMap<TaskId, FixupTask>,
	next_id: u64,
	reconciler: Reconciler,
	idle: IdleScheduler,
	needs_diff: IndexSet<TaskId>,
	followups: VecDeque<Followup>,
	events_tx: UnboundedSender<FixupEvent>,
	events: UnboundedReceiver<FixupEvent>,
	subscribers: Vec<UnboundedSender<TaskNotification>>,
	next_gate: u64,
	failures: u64,
}

impl FixupController {
	/// Creates a controller after validating `config`.
	pub fn new(config: FixupConfig, host: Arc<dyn DocumentHost>, transport: Arc<dyn CompletionTransport>) -> Result<Self> {
		config.validate()?;
		let session_capacity = capacity(config.session_capacity)?;
		let prefetch_capacity = capacity(config.prefetch_capacity)?;
		let (events_tx, events) = mpsc::unbounded_channel();
		let reconciler = Reconciler::new(session_capacity, prefetch_capacity, transport, Arc::new(AllowAll), events_tx.clone());
		Ok(Self {
			idle: IdleScheduler::new(config.idle_delay()),
			config,
			host,
			tasks: IndexMap::new(),
			next_id: 0,
			reconciler,
			needs_diff: IndexSet::new(),
			followups: VecDeque::new(),
			events_tx,
			events,
			subscribers: Vec::new(),
			next_gate: 0,
			failures: 0,
		})
	}

	/// Replaces the guardrail check run on every finished response.
	pub fn with_guardrails(mut self, guardrails: Arc<dyn Guardrails>) -> Self {
		self.reconciler.set_guardrails(guardrails);
		self
	}

	pub fn config(&self) -> &FixupConfig {
		&self.config
	}

	/// Receives every state change, deletion and warning from now on.
	pub fn subscribe(&mut self) -> UnboundedReceiver<TaskNotification> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.subscribers.push(tx);
		rx
	}

	/// Number of edit applications the host failed or declined.
	pub fn application_failures(&self) -> u64 {
		self.failures
	}

	pub fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
		self.tasks.get(&id).map(FixupTask::snapshot)
	}

	/// Live tasks of `uri`, in creation order.
	pub fn tasks_for_file(&self, uri: &str) -> Vec<TaskSnapshot> {
		self.tasks.values().filter(|task| task.uri == uri).map(FixupTask::snapshot).collect()
	}

	/// Task in `uri` whose live range is closest to `position`, among `states`.
	pub fn nearest_task(&self, uri: &str, position: Position, states: &[TaskState]) -> Option<TaskId> {
		self.tasks
			.values()
			.filter(|task| task.uri == uri && states.contains(&task.state()))
			.min_by_key(|task| distance(task.selection_range(), position))
			.map(|task| task.id)
	}

	/// Creates a task for `range` of `uri` and starts generating.
	///
	/// Returns `Ok(None)` when an identical active task already exists. Tasks
	/// with a destination wait in `Pending` until
	/// [`resolve_destination`](Self::resolve_destination).
	pub async fn create_task(
		&mut self,
		uri: impl Into<DocumentUri>,
		instruction: impl Into<String>,
		range: TextRange,
		intent: Intent,
		mode: Mode,
		options: TaskOptions,
	) -> Result<Option<TaskId>> {
		let uri = uri.into();
		let instruction = instruction.into();
		let target = if self.config.expand_point_selection {
			let document = Rope::from_str(&self.host.get_text(&uri, None).await?);
			selection::expand(&document, range, intent, mode)
		} else {
			selection::Target { range, intent, mode }
		};

		let duplicate = self
			.tasks
			.values()
			.any(|task| task.state().is_active() && task.uri == uri && task.instruction == instruction && task.original_range() == target.range);
		if duplicate {
			debug!(%uri, range = ?target.range, "fixup.task.duplicate");
			return Ok(None);
		}

		let original_text = self.host.get_text(&uri, Some(target.range)).await?;
		self.next_id += 1;
		let id = TaskId::new(self.next_id);
		let waits_for_destination = options.destination.is_some();
		let task = FixupTask::new(id, uri, instruction, target.intent, target.mode, original_text, target.range, options);
		info!(task = %id, uri = %task.uri, intent = ?task.intent, mode = ?task.mode, range = ?target.range, "fixup.task.create");
		self.tasks.insert(id, task);

		self.set_state(id, TaskState::Pending);
		if !waits_for_destination {
			self.set_state(id, TaskState::Working);
		}
		self.settle().await;
		Ok(Some(id))
	}

	/// Points a pending task at the end of `uri` and starts generating.
	pub async fn resolve_destination(&mut self, id: TaskId, uri: impl Into<DocumentUri>) -> Result<()> {
		self.expect_state(id, "resolve destination", |state| state == TaskState::Pending)?;
		let uri = uri.into();
		let document = Rope::from_str(&self.host.get_text(&uri, None).await?);
		let end = end_position(document.slice(..));

		let task = self.task_mut(id)?;
		task.uri = uri.clone();
		task.destination = Some(uri);
		task.original_text.clear();
		observer::retarget(task, TextRange::point(end));
		debug!(task = %id, uri = %task.uri, ?end, "fixup.task.destination");

		self.set_state(id, TaskState::Working);
		self.settle().await;
		Ok(())
	}

	/// Starts a speculative generation that a later task can adopt through
	/// [`TaskOptions::prefetch_key`].
	pub fn prefetch(&mut self, key: PrefetchKey, request: CompletionRequest) {
		self.reconciler.prefetch(key, request);
	}

	/// Drops a speculative generation nobody is going to adopt.
	pub fn abandon_prefetch(&mut self, key: &PrefetchKey) {
		self.reconciler.drop_prefetch(key);
	}

	/// Discards a task. Partial text already written stays in the document.
	pub fn cancel(&mut self, id: TaskId) -> Result<()> {
		self.expect_state(id, "cancel", |state| state::is_allowed(state, TaskState::Finished))?;
		debug!(task = %id, generating = self.reconciler.is_generating(id), "fixup.task.cancel");
		self.set_state(id, TaskState::Finished);
		Ok(())
	}

	/// Keeps an applied edit and discards the task.
	pub fn accept(&mut self, id: TaskId) -> Result<()> {
		self.expect_state(id, "accept", |state| state == TaskState::Applied)?;
		self.set_state(id, TaskState::Finished);
		Ok(())
	}

	/// Restores the original text of an applied task and discards it.
	pub async fn undo(&mut self, id: TaskId) -> Result<()> {
		self.expect_state(id, "undo", |state| state == TaskState::Applied)?;
		self.restore_original(id).await?;
		self.set_state(id, TaskState::Finished);
		self.settle().await;
		Ok(())
	}

	/// Undoes an applied task and generates again, optionally with a new instruction.
	pub async fn retry(&mut self, id: TaskId, instruction: Option<String>) -> Result<()> {
		self.expect_state(id, "retry", |state| state == TaskState::Applied)?;
		self.restore_original(id).await?;
		if let Some(instruction) = instruction {
			self.task_mut(id)?.instruction = instruction;
		}
		self.set_state(id, TaskState::Working);
		self.settle().await;
		Ok(())
	}

	/// Applies the final text of a task waiting in `Applying`.
	pub async fn apply(&mut self, id: TaskId) -> Result<()> {
		let outcome = self.apply_task(id).await;
		self.settle().await;
		outcome
	}

	/// Leaves the formatter behind; its late output is ignored.
	pub fn skip_formatting(&mut self, id: TaskId) -> Result<()> {
		self.expect_state(id, "skip formatting", |state| state == TaskState::Formatting)?;
		debug!(task = %id, "fixup.format.skip");
		self.set_state(id, TaskState::Applied);
		Ok(())
	}

	/// Fails a task with `message`.
	pub fn error(&mut self, id: TaskId, message: impl Into<String>) -> Result<()> {
		self.expect_state(id, "fail", |state| state::is_allowed(state, TaskState::Error))?;
		self.task_mut(id)?.lifecycle.fail(message);
		self.set_state(id, TaskState::Error);
		Ok(())
	}

	/// Reports edits made outside the engine.
	pub fn document_changed(&mut self, uri: &str, changes: &[TextChange]) {
		let touched = observer::observe(&mut self.tasks, uri, changes, EditOrigin::External);
		self.on_touched(touched);
	}

	/// Accepts applied tasks in a saved document when configured to.
	pub fn document_saved(&mut self, uri: &str) {
		if !self.config.accept_on_save {
			return;
		}
		let applied: Vec<TaskId> = self
			.tasks
			.values()
			.filter(|task| task.uri == uri && task.state() == TaskState::Applied)
			.map(|task| task.id)
			.collect();
		for id in applied {
			debug!(task = %id, uri, "fixup.task.accept_on_save");
			self.set_state(id, TaskState::Finished);
		}
	}

	pub fn file_renamed(&mut self, old: &str, new: &str) {
		for task in self.tasks.values_mut().filter(|task| task.uri == old) {
			task.uri = new.to_owned();
			trace!(task = %task.id, old, new, "fixup.task.rename");
		}
	}

	/// Cancels every task of a deleted document.
	pub fn file_deleted(&mut self, uri: &str) {
		let doomed: Vec<TaskId> = self
			.tasks
			.values()
			.filter(|task| task.uri == uri && state::is_allowed(task.state(), TaskState::Finished))
			.map(|task| task.id)
			.collect();
		for id in doomed {
			self.set_state(id, TaskState::Finished);
		}
	}

	/// Waits for the next background event, handles it together with anything
	/// else already queued, and runs the resulting follow-up work.
	pub async fn step(&mut self) {
		let Some(event) = self.events.recv().await else {
			return;
		};
		self.on_event(event);
		while let Ok(event) = self.events.try_recv() {
			self.on_event(event);
		}
		self.settle().await;
	}

	/// Steps until no task is generating, applying or formatting and no diff
	/// is pending.
	///
	/// Never returns while a transport keeps a generation open.
	pub async fn run_until_settled(&mut self) {
		self.settle().await;
		while self.is_busy() {
			self.step().await;
		}
	}

	fn is_busy(&self) -> bool {
		!self.needs_diff.is_empty()
			|| self
				.tasks
				.values()
				.any(|task| matches!(task.state(), TaskState::Working | TaskState::Inserting | TaskState::Applying | TaskState::Formatting))
	}

	/// The only path that changes a task's state.
	///
	/// # Panics
	///
	/// Panics on a transition the lifecycle does not allow.
	fn set_state(&mut self, id: TaskId, to: TaskState) {
		let Some(task) = self.tasks.get_mut(&id) else {
			return;
		};
		let Some(from) = task.lifecycle.transition(to) else {
			return;
		};
		debug!(task = %id, %from, %to, spin = task.lifecycle.spin_count(), "fixup.task.state");

		match to {
			TaskState::Working => self.begin_generation(id),
			TaskState::Applying => self.followups.push_back(Followup::Apply(id)),
			TaskState::Error => {
				self.reconciler.abort(id);
				self.needs_diff.shift_remove(&id);
			}
			_ => {}
		}

		if let Some(task) = self.tasks.get(&id) {
			self.notify(TaskNotification::StateChanged(task.snapshot()));
		}
		if to == TaskState::Finished {
			self.discard(id);
		}
	}

	fn begin_generation(&mut self, id: TaskId) {
		self.needs_diff.shift_remove(&id);
		let Some(task) = self.tasks.get_mut(&id) else {
			return;
		};
		let attempt = task.lifecycle.spin_count();
		let adopted = match task.prefetch_key.clone() {
			Some(key) if attempt == 1 => self.reconciler.adopt(task, &key),
			_ => None,
		};
		match adopted {
			Some(outcome) => self.on_ingested(id, outcome),
			None => self.reconciler.start(task, attempt),
		}
		for evicted in self.reconciler.take_evicted() {
			self.followups.push_back(Followup::Evicted(evicted));
		}
	}

	fn discard(&mut self, id: TaskId) {
		self.reconciler.abort(id);
		self.needs_diff.shift_remove(&id);
		self.followups.retain(|followup| followup.task() != Some(id));
		if self.tasks.shift_remove(&id).is_some() {
			debug!(task = %id, "fixup.task.discard");
			self.notify(TaskNotification::Deleted(id));
		}
	}

	fn notify(&mut self, notification: TaskNotification) {
		self.subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
	}

	fn on_event(&mut self, event: FixupEvent) {
		match event {
			FixupEvent::Generation { key, generation, event } => {
				if let Some((id, outcome)) = self.reconciler.ingest(key, generation, event, &self.tasks) {
					self.on_ingested(id, outcome);
				}
			}
			FixupEvent::IdleDiffs => self.followups.push_back(Followup::FlushDiffs),
			FixupEvent::Formatted { id, gate, result } => self.followups.push_back(Followup::Formatted { id, gate, result }),
		}
	}

	fn on_ingested(&mut self, id: TaskId, outcome: Ingested) {
		let streaming = self.tasks.get(&id).is_some_and(|task| task.state().is_streaming());
		match outcome {
			Ingested::Ignored => {}
			Ingested::Queued => {
				let queued = self.followups.iter().any(|followup| matches!(followup, Followup::Drain(other) if *other == id));
				if !queued {
					self.followups.push_back(Followup::Drain(id));
				}
			}
			Ingested::Vetoed if streaming => {
				info!(task = %id, "fixup.task.vetoed");
				self.set_state(id, TaskState::Finished);
			}
			Ingested::Failed(err) if streaming => self.generation_failed(id, err),
			Ingested::Vetoed | Ingested::Failed(_) => {}
		}
	}

	fn generation_failed(&mut self, id: TaskId, err: TransportError) {
		let message = match err.kind {
			TransportErrorKind::Cancelled => return,
			TransportErrorKind::Network => self.config.network_error_message.clone(),
			TransportErrorKind::Model => err.message.clone(),
		};
		warn!(task = %id, kind = %err.kind, error = %err.message, "fixup.task.generation_failed");
		if let Some(task) = self.tasks.get_mut(&id) {
			task.lifecycle.fail(message);
		}
		self.set_state(id, TaskState::Error);
	}

	fn on_touched(&mut self, touched: Vec<TaskId>) {
		for id in touched {
			let Some(task) = self.tasks.get(&id) else {
				continue;
			};
			let state = task.state();
			// The next streamed write replaces the whole live range.
			let overwrites = task.mode == Mode::Insert && state.is_streaming() && !task.selection_range().is_empty();
			match state {
				TaskState::Applied => {
					debug!(task = %id, "fixup.task.implicit_accept");
					self.set_state(id, TaskState::Finished);
				}
				TaskState::Working | TaskState::Inserting if overwrites => self.interrupt_insertion(id),
				TaskState::Working | TaskState::Inserting | TaskState::Applying | TaskState::Formatting => self.mark_for_diff(id),
				TaskState::Idle | TaskState::Pending | TaskState::Error | TaskState::Finished => {}
			}
		}
	}

	/// Queues a diff update, arming the idle timer for the first of a burst.
	fn mark_for_diff(&mut self, id: TaskId) {
		if !self.needs_diff.insert(id) || self.needs_diff.len() > 1 {
			return;
		}
		let tx = self.events_tx.clone();
		let outcome = self.idle.schedule(move || {
			let _ = tx.send(FixupEvent::IdleDiffs);
		});
		spawn(TaskClass::Background, async move {
			if let Err(err) = outcome.await {
				warn!(%err, "fixup.diff.idle_failed");
			}
		});
	}

	async fn settle(&mut self) {
		while let Some(followup) = self.followups.pop_front() {
			match followup {
				Followup::Drain(id) => self.drain(id).await,
				Followup::Apply(id) => {
					if let Err(err) = self.apply_task(id).await {
						debug!(task = %id, %err, "fixup.task.apply_skipped");
					}
				}
				Followup::FlushDiffs => self.flush_diffs().await,
				Followup::Formatted { id, gate, result } => self.finish_formatting(id, gate, result).await,
				Followup::Evicted(id) => {
					if self.tasks.get(&id).is_some_and(|task| task.state().is_streaming()) {
						let _ = self.error(id, "generation was dropped because too many fixups are running");
					}
				}
			}
		}
	}

	/// Lands queued stream output for one task, in order.
	async fn drain(&mut self, id: TaskId) {
		loop {
			let Some(task) = self.tasks.get_mut(&id) else {
				return;
			};
			let Some(application) = self.reconciler.next_application(task) else {
				return;
			};
			let mode = task.mode;

			match mode {
				Mode::Replace => {
					self.mark_for_diff(id);
					if !application.partial {
						self.set_state(id, TaskState::Applying);
						return;
					}
				}
				Mode::Insert => {
					self.set_state(id, TaskState::Inserting);
					let Some((uri, range)) = self.tasks.get(&id).map(|task| (task.uri.clone(), task.selection_range())) else {
						return;
					};
					if let Err(err) = self.write_own(id, &uri, vec![TextChange::new(range, application.text)]).await {
						self.application_failed(id, err);
						return;
					}
					if !application.partial {
						self.enter_formatting(id);
						return;
					}
				}
			}
		}
	}

	async fn apply_task(&mut self, id: TaskId) -> Result<()> {
		self.expect_state(id, "apply", |state| state == TaskState::Applying)?;
		self.flush_diffs().await;

		let task = self.task_ref(id)?;
		let (uri, range) = (task.uri.clone(), task.selection_range());
		let Some(proposed) = task.text.replacement().map(str::to_owned) else {
			return Err(FixupError::InvalidOperation {
				id,
				operation: "apply",
				state: task.state(),
			});
		};
		let buffer = match self.host.get_text(&uri, Some(range)).await {
			Ok(buffer) => buffer,
			Err(err) => {
				self.application_failed(id, err);
				return Ok(());
			}
		};

		let task = self.task_mut(id)?;
		if !task.diff.get().is_some_and(|diff| diff.is_current(&proposed, &buffer)) {
			task.diff.set(compute_diff(&task.original_text, &proposed, &buffer, range.start));
		}
		let diff = task.diff.require(id);
		if !diff.clean {
			debug!(task = %id, conflicts = diff.conflicts, "fixup.task.conflict");
			self.respin(id);
			return Ok(());
		}

		let edits = diff.edits.clone();
		if !edits.is_empty()
			&& let Err(err) = self.write_own(id, &uri, edits).await
		{
			self.application_failed(id, err);
			return Ok(());
		}
		self.enter_formatting(id);
		Ok(())
	}

	fn respin(&mut self, id: TaskId) {
		let Some(task) = self.tasks.get_mut(&id) else {
			return;
		};
		let spins = task.lifecycle.spin_count();
		if spins >= self.config.max_spin {
			warn!(task = %id, spins, "fixup.task.spin_exhausted");
			task.lifecycle.fail(format!("tried {spins} times but failed to edit the file"));
			self.set_state(id, TaskState::Error);
		} else {
			debug!(task = %id, spins, "fixup.task.respin");
			self.set_state(id, TaskState::Working);
		}
	}

	fn enter_formatting(&mut self, id: TaskId) {
		let Some(task) = self.tasks.get_mut(&id) else {
			return;
		};
		self.next_gate += 1;
		let gate = self.next_gate;
		task.lifecycle.open_gate(gate);
		let (uri, range) = (task.uri.clone(), task.selection_range());
		self.set_state(id, TaskState::Formatting);

		let host = Arc::clone(&self.host);
		let tx = self.events_tx.clone();
		spawn(TaskClass::Background, async move {
			let result = host.format_range(&uri, range).await;
			let _ = tx.send(FixupEvent::Formatted { id, gate, result });
		});
	}

	async fn finish_formatting(&mut self, id: TaskId, gate: u64, result: std::result::Result<Vec<TextChange>, HostError>) {
		let Some(task) = self.tasks.get_mut(&id) else {
			return;
		};
		if task.state() != TaskState::Formatting || !task.lifecycle.close_gate(gate) {
			trace!(task = %id, gate, "fixup.format.late");
			return;
		}
		let (uri, range) = (task.uri.clone(), task.selection_range());
		match result {
			Ok(edits) => {
				let edits: Vec<TextChange> = edits.into_iter().filter(|edit| range.contains(&edit.range)).collect();
				if !edits.is_empty()
					&& let Err(err) = self.write_own(id, &uri, edits).await
				{
					debug!(task = %id, %err, "fixup.format.failed");
				}
			}
			Err(err) => debug!(task = %id, %err, "fixup.format.failed"),
		}
		self.set_state(id, TaskState::Applied);
	}

	/// Recomputes the diff of every task marked since the last flush.
	async fn flush_diffs(&mut self) {
		let pending: Vec<TaskId> = self.needs_diff.drain(..).collect();
		for id in pending {
			let Some(task) = self.tasks.get(&id) else {
				continue;
			};
			let Some(proposed) = task.text.latest().map(str::to_owned) else {
				continue;
			};
			let (uri, range) = (task.uri.clone(), task.selection_range());
			let buffer = match self.host.get_text(&uri, Some(range)).await {
				Ok(buffer) => buffer,
				Err(err) => {
					debug!(task = %id, %err, "fixup.diff.read_failed");
					continue;
				}
			};
			let Some(task) = self.tasks.get_mut(&id) else {
				continue;
			};
			let diff = compute_diff(&task.original_text, &proposed, &buffer, range.start);
			trace!(task = %id, clean = diff.clean, edits = diff.edits.len(), "fixup.diff.update");
			task.diff.set(diff);
		}
	}

	async fn restore_original(&mut self, id: TaskId) -> Result<()> {
		let task = self.task_ref(id)?;
		let (uri, change) = (task.uri.clone(), TextChange::new(task.selection_range(), task.original_text.clone()));
		if let Err(err) = self.write_own(id, &uri, vec![change]).await {
			self.application_failed(id, err.clone());
			return Err(err.into());
		}
		Ok(())
	}

	/// Applies edits on behalf of `id` and routes them through the observer.
	async fn write_own(&mut self, id: TaskId, uri: &str, edits: Vec<TextChange>) -> std::result::Result<(), HostError> {
		if !self.host.apply_edits(uri, &edits).await? {
			return Err(HostError::Rejected {
				uri: uri.to_owned(),
				reason: String::from("host declined the edit"),
			});
		}
		let touched = observer::observe(&mut self.tasks, uri, &edits, EditOrigin::Task(id));
		self.on_touched(touched);
		Ok(())
	}

	/// Stops a streaming insertion whose range the user edited.
	fn interrupt_insertion(&mut self, id: TaskId) {
		warn!(task = %id, "fixup.task.insert_interrupted");
		let message = String::from("Stopped inserting because the document was edited inside the inserted text");
		self.notify(TaskNotification::Warning { id, message: message.clone() });
		if let Some(task) = self.tasks.get_mut(&id) {
			task.lifecycle.fail(message);
		}
		self.set_state(id, TaskState::Error);
	}

	fn application_failed(&mut self, id: TaskId, err: HostError) {
		self.failures += 1;
		warn!(task = %id, %err, failures = self.failures, "fixup.task.apply_failed");
		let message = format!("Failed to apply the edit: {err}");
		self.notify(TaskNotification::Warning { id, message: message.clone() });
		if let Some(task) = self.tasks.get_mut(&id)
			&& state::is_allowed(task.state(), TaskState::Error)
		{
			task.lifecycle.fail(message);
			self.set_state(id, TaskState::Error);
		}
	}

	fn expect_state(&self, id: TaskId, operation: &'static str, allowed: impl Fn(TaskState) -> bool) -> Result<()> {
		let state = self.task_ref(id)?.state();
		if allowed(state) {
			Ok(())
		} else {
			Err(FixupError::InvalidOperation { id, operation, state })
		}
	}

	fn task_ref(&self, id: TaskId) -> Result<&FixupTask> {
		self.tasks.get(&id).ok_or(FixupError::UnknownTask(id))
	}

	fn task_mut(&mut self, id: TaskId) -> Result<&mut FixupTask> {
		self.tasks.get_mut(&id).ok_or(FixupError::UnknownTask(id))
	}
}

fn capacity(value: usize) -> Result<NonZeroUsize> {
	NonZeroUsize::new(value).ok_or_else(|| ConfigError::Invalid(String::from("cache capacities must be at least 1")).into())
}

/// Distance from `position` to the nearest boundary of `range`; zero inside it.
fn distance(range: TextRange, position: Position) -> (u32, u32) {
	if range.contains_position(position) {
		return (0, 0);
	}
	let to = |boundary: Position| (boundary.line.abs_diff(position.line), boundary.character.abs_diff(position.character));
	to(range.start).min(to(range.end))
}
