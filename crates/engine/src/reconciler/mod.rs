//! Streaming reconciliation.
//!
//! Each task owns at most one [`Session`]: the abort token of its current
//! generation, the cumulative text received so far and a queue of pending
//! applications. Stream events arrive through the controller's event channel
//! tagged with their generation, so output from a superseded generation is
//! dropped. Speculative generations live in a separate LRU keyed by
//! [`PrefetchKey`] until a task adopts them.
//!
//! This module is the only writer of [`ReplacementText`].

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use fixup_worker::{GenerationClock, GenerationToken, TaskClass, spawn};
use futures::StreamExt;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use lru::LruCache;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::error::{TransportError, TransportErrorKind};
use crate::event::{FixupEvent, SessionKey};
use crate::host::{CompletionRequest, CompletionTransport, Guardrails, TransportEvent};
use crate::task::{FixupTask, Mode, PrefetchKey, TaskId};

mod queue;

use queue::{ApplyQueue, ApplyRequest};

/// Streamed and final model text of a task.
///
/// At most one of the two fields is set at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementText {
	in_progress: Option<String>,
	replacement: Option<String>,
}

impl ReplacementText {
	/// Latest streamed text that is not final yet.
	pub fn in_progress(&self) -> Option<&str> {
		self.in_progress.as_deref()
	}

	/// Final text of the last completed turn.
	pub fn replacement(&self) -> Option<&str> {
		self.replacement.as_deref()
	}

	/// Whichever text is current.
	pub fn latest(&self) -> Option<&str> {
		self.in_progress().or(self.replacement())
	}

	fn set_partial(&mut self, text: String) {
		self.replacement = None;
		self.in_progress = Some(text);
	}

	fn finalize(&mut self, text: String) {
		self.in_progress = None;
		self.replacement = Some(text);
	}

	fn clear(&mut self) {
		self.in_progress = None;
		self.replacement = None;
	}
}

/// Text the drain loop should land in the document next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Application {
	pub text: String,
	pub partial: bool,
}

/// Effect of one stream event on a task session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Ingested {
	/// Nothing new to apply.
	Ignored,
	/// An application request was queued.
	Queued,
	/// Guardrails rejected the finished response.
	Vetoed,
	/// The generation failed.
	Failed(TransportError),
}

struct Session {
	token: GenerationToken,
	consumed: usize,
	accumulated: String,
	queue: ApplyQueue,
	completed: bool,
	error: Option<TransportError>,
}

impl Session {
	fn new(token: GenerationToken) -> Self {
		Self {
			token,
			consumed: 0,
			accumulated: String::new(),
			queue: ApplyQueue::default(),
			completed: false,
			error: None,
		}
	}

	/// Records cumulative text. Returns false for non-growing duplicates.
	fn accept_text(&mut self, text: String) -> bool {
		if text.len() <= self.consumed {
			return false;
		}
		self.consumed = text.len();
		self.accumulated = text;
		true
	}

	fn finish(&mut self, guardrails: &dyn Guardrails, original: &str) -> Ingested {
		self.completed = true;
		if !guardrails.can_apply(original, &self.accumulated) {
			return Ingested::Vetoed;
		}
		self.queue.push(ApplyRequest::last(self.accumulated.clone()));
		Ingested::Queued
	}
}

pub(crate) struct Reconciler {
	sessions: LruCache<TaskId, Session>,
	prefetched: LruCache<PrefetchKey, Session>,
	aliases: HashMap<PrefetchKey, TaskId>,
	evicted: Vec<TaskId>,
	clock: GenerationClock,
	transport: Arc<dyn CompletionTransport>,
	guardrails: Arc<dyn Guardrails>,
	events: UnboundedSender<FixupEvent>,
}

impl Reconciler {
	pub fn new(
		session_capacity: NonZeroUsize,
		prefetch_capacity: NonZeroUsize,
		transport: Arc<dyn CompletionTransport>,
		guardrails: Arc<dyn Guardrails>,
		events: UnboundedSender<FixupEvent>,
	) -> Self {
		Self {
			sessions: LruCache::new(session_capacity),
			prefetched: LruCache::new(prefetch_capacity),
			aliases: HashMap::new(),
			evicted: Vec::new(),
			clock: GenerationClock::new(),
			transport,
			guardrails,
			events,
		}
	}

	pub fn set_guardrails(&mut self, guardrails: Arc<dyn Guardrails>) {
		self.guardrails = guardrails;
	}

	/// Starts a fresh generation for `task`, aborting any previous one.
	pub fn start(&mut self, task: &mut FixupTask, attempt: u32) {
		self.abort(task.id);
		task.text.clear();

		let token = self.clock.token();
		let request = CompletionRequest {
			uri: task.uri.clone(),
			instruction: task.instruction.clone(),
			original_text: task.original_text.clone(),
			intent: task.intent,
			mode: task.mode,
			attempt,
		};
		debug!(task = %task.id, generation = token.generation(), attempt, "fixup.reconciler.start");
		self.launch(SessionKey::Task(task.id), request, &token);
		self.insert_session(task.id, Session::new(token));
	}

	/// Starts a speculative generation that a task may adopt later.
	pub fn prefetch(&mut self, key: PrefetchKey, request: CompletionRequest) {
		self.drop_prefetch(&key);
		let token = self.clock.token();
		debug!(key = %key, generation = token.generation(), "fixup.reconciler.prefetch");
		self.launch(SessionKey::Prefetch(key.clone()), request, &token);
		if let Some((evicted, session)) = self.prefetched.push(key, Session::new(token)) {
			session.token.cancel();
			debug!(key = %evicted, "fixup.reconciler.prefetch_evicted");
		}
	}

	/// Discards a speculative generation, aborting it if still running.
	pub fn drop_prefetch(&mut self, key: &PrefetchKey) {
		if let Some(session) = self.prefetched.pop(key) {
			session.token.cancel();
		}
	}

	/// Moves a prefetched session onto `task` and replays what it buffered.
	///
	/// Returns `None` when nothing was prefetched under `key`.
	pub fn adopt(&mut self, task: &mut FixupTask, key: &PrefetchKey) -> Option<Ingested> {
		let mut session = self.prefetched.pop(key)?;
		self.abort(task.id);
		task.text.clear();

		let outcome = if let Some(err) = session.error.take() {
			Ingested::Failed(err)
		} else {
			if !session.accumulated.is_empty() {
				session.queue.push(ApplyRequest::partial(session.accumulated.clone()));
			}
			if session.completed {
				session.finish(self.guardrails.as_ref(), &task.original_text)
			} else if session.queue.len() > 0 {
				Ingested::Queued
			} else {
				Ingested::Ignored
			}
		};
		debug!(task = %task.id, key = %key, replayed = session.accumulated.len(), "fixup.reconciler.adopt");
		self.aliases.insert(key.clone(), task.id);
		self.insert_session(task.id, session);
		Some(outcome)
	}

	/// Feeds one stream event into its session.
	///
	/// Returns the affected task, or `None` for prefetch buffering and events
	/// from superseded generations.
	pub fn ingest(
		&mut self,
		key: SessionKey,
		generation: u64,
		event: TransportEvent,
		tasks: &IndexMap<TaskId, FixupTask>,
	) -> Option<(TaskId, Ingested)> {
		let id = match key {
			SessionKey::Task(id) => id,
			SessionKey::Prefetch(key) => match self.aliases.get(&key) {
				Some(id) => *id,
				None => {
					self.buffer_prefetch(&key, generation, event);
					return None;
				}
			},
		};

		let Some(session) = self.sessions.get_mut(&id) else {
			trace!(task = %id, generation, "fixup.reconciler.no_session");
			return None;
		};
		if session.token.generation() != generation || session.token.is_cancelled() {
			trace!(task = %id, generation, current = session.token.generation(), "fixup.reconciler.stale");
			return None;
		}
		let task = tasks.get(&id)?;

		let outcome = match event {
			TransportEvent::Change { text } => {
				if !session.accept_text(text) {
					Ingested::Ignored
				} else if task.state().is_streaming() {
					session.queue.push(ApplyRequest::partial(session.accumulated.clone()));
					trace!(task = %id, len = session.consumed, "fixup.reconciler.chunk");
					Ingested::Queued
				} else {
					Ingested::Ignored
				}
			}
			TransportEvent::Complete => session.finish(self.guardrails.as_ref(), &task.original_text),
			TransportEvent::Error(err) => {
				session.completed = true;
				if err.kind == TransportErrorKind::Cancelled {
					Ingested::Ignored
				} else {
					Ingested::Failed(err)
				}
			}
		};
		Some((id, outcome))
	}

	/// Pops the next request for `task`, writing its text into the task.
	///
	/// Returns `None` once the queue is empty, the generation was aborted, or
	/// the task stopped streaming.
	pub fn next_application(&mut self, task: &mut FixupTask) -> Option<Application> {
		let session = self.sessions.get_mut(&task.id)?;
		if session.token.is_cancelled() || !task.state().is_streaming() {
			session.queue.clear();
			return None;
		}

		while let Some(request) = session.queue.pop() {
			let text = match task.mode {
				Mode::Replace => request.text,
				Mode::Insert => shape_insertion(&request.text, request.partial, task.ranges.selection().start.character),
			};
			if request.partial {
				if task.text.in_progress() == Some(text.as_str()) {
					continue;
				}
				task.text.set_partial(text.clone());
			} else {
				task.text.finalize(text.clone());
			}
			trace!(task = %task.id, partial = request.partial, collapsed = session.queue.collapsed(), "fixup.reconciler.drain");
			return Some(Application {
				text,
				partial: request.partial,
			});
		}
		None
	}

	/// Aborts the task's generation. Safe to call repeatedly.
	pub fn abort(&mut self, id: TaskId) {
		if let Some(session) = self.sessions.pop(&id) {
			session.token.cancel();
			trace!(task = %id, generation = session.token.generation(), "fixup.reconciler.abort");
		}
		self.aliases.retain(|_, owner| *owner != id);
	}

	/// True while the task's generation may still produce output.
	pub fn is_generating(&self, id: TaskId) -> bool {
		self.sessions
			.peek(&id)
			.is_some_and(|session| !session.completed && !session.token.is_cancelled())
	}

	/// Tasks whose sessions were evicted since the last call.
	pub fn take_evicted(&mut self) -> Vec<TaskId> {
		std::mem::take(&mut self.evicted)
	}

	fn insert_session(&mut self, id: TaskId, session: Session) {
		if let Some((evicted, old)) = self.sessions.push(id, session) {
			old.token.cancel();
			if evicted != id {
				warn!(task = %evicted, "fixup.reconciler.session_evicted");
				self.aliases.retain(|_, owner| *owner != evicted);
				self.evicted.push(evicted);
			}
		}
	}

	fn buffer_prefetch(&mut self, key: &PrefetchKey, generation: u64, event: TransportEvent) {
		let Some(session) = self.prefetched.peek_mut(key) else {
			return;
		};
		if session.token.generation() != generation {
			return;
		}
		match event {
			TransportEvent::Change { text } => {
				session.accept_text(text);
			}
			TransportEvent::Complete => session.completed = true,
			TransportEvent::Error(err) => {
				session.completed = true;
				if err.kind != TransportErrorKind::Cancelled {
					session.error = Some(err);
				}
			}
		}
	}

	fn launch(&self, key: SessionKey, request: CompletionRequest, token: &GenerationToken) {
		let stream = self.transport.stream(request, token.clone());
		spawn(TaskClass::Interactive, pump(stream, key, token.clone(), self.events.clone()));
	}
}

/// Forwards stream events until a terminal event, abort, or controller shutdown.
async fn pump(mut stream: BoxStream<'static, TransportEvent>, key: SessionKey, token: GenerationToken, events: UnboundedSender<FixupEvent>) {
	let generation = token.generation();
	loop {
		let next = tokio::select! {
			biased;
			() = token.cancelled() => {
				trace!(generation, "fixup.reconciler.pump_aborted");
				return;
			}
			next = stream.next() => next,
		};
		let event = next.unwrap_or_else(|| TransportEvent::Error(TransportError::model("stream ended before completion")));
		let terminal = !matches!(event, TransportEvent::Change { .. });
		let sent = events.send(FixupEvent::Generation {
			key: key.clone(),
			generation,
			event,
		});
		if sent.is_err() || terminal {
			return;
		}
	}
}

/// Shapes streamed insertion text for the document.
///
/// Partial text drops its trailing incomplete line. Final text drops trailing
/// whitespace that spans a line break. Every non-empty line after the first is
/// indented to `column`.
pub(crate) fn shape_insertion(text: &str, partial: bool, column: u32) -> String {
	let complete = if partial {
		text.rfind('\n').map_or(text, |end| &text[..end])
	} else {
		let trimmed = text.trim_end();
		if text[trimmed.len()..].contains('\n') { trimmed } else { text }
	};
	let pad = " ".repeat(column as usize);
	let mut shaped = String::with_capacity(complete.len());
	for (index, line) in complete.split('\n').enumerate() {
		if index > 0 {
			shaped.push('\n');
			if !line.is_empty() {
				shaped.push_str(&pad);
			}
		}
		shaped.push_str(line);
	}
	shaped
}
