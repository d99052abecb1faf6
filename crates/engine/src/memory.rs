//! A [`DocumentHost`] over in-memory ropes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixup_primitives::rope::{range_to_chars, slice_range};
use fixup_primitives::{Change, ChangeSet, Rope, RopeError, TextChange, TextRange};
use parking_lot::Mutex;

use crate::error::HostError;
use crate::host::DocumentHost;

/// Produces formatting edits for `(document text, requested range)`.
pub type Formatter = Arc<dyn Fn(&str, TextRange) -> Vec<TextChange> + Send + Sync>;

/// One batch accepted through [`DocumentHost::apply_edits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedBatch {
	pub uri: String,
	pub edits: Vec<TextChange>,
}

#[derive(Default)]
struct Documents {
	docs: HashMap<String, Rope>,
	log: Vec<AppliedBatch>,
	formatter: Option<Formatter>,
	reject_edits: bool,
}

/// Document store for tests and offline replays.
#[derive(Default)]
pub struct MemoryHost {
	inner: Mutex<Documents>,
}

impl MemoryHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens or replaces a document.
	pub fn open(&self, uri: impl Into<String>, text: &str) {
		self.inner.lock().docs.insert(uri.into(), Rope::from_str(text));
	}

	pub fn close(&self, uri: &str) {
		self.inner.lock().docs.remove(uri);
	}

	pub fn text(&self, uri: &str) -> Option<String> {
		self.inner.lock().docs.get(uri).map(Rope::to_string)
	}

	/// Batches applied on behalf of the engine, oldest first.
	pub fn applied(&self) -> Vec<AppliedBatch> {
		self.inner.lock().log.clone()
	}

	pub fn set_formatter(&self, formatter: Formatter) {
		self.inner.lock().formatter = Some(formatter);
	}

	/// Makes [`DocumentHost::apply_edits`] decline every batch.
	pub fn set_reject_edits(&self, reject: bool) {
		self.inner.lock().reject_edits = reject;
	}

	/// Applies an edit made by the user and returns the changes to report to
	/// the controller.
	pub fn user_edit(&self, uri: &str, changes: Vec<TextChange>) -> Result<Vec<TextChange>, HostError> {
		let mut inner = self.inner.lock();
		apply_batch(&mut inner.docs, uri, &changes)?;
		Ok(changes)
	}
}

impl std::fmt::Debug for MemoryHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.lock();
		f.debug_struct("MemoryHost")
			.field("documents", &inner.docs.len())
			.field("applied", &inner.log.len())
			.field("reject_edits", &inner.reject_edits)
			.finish()
	}
}

#[async_trait]
impl DocumentHost for MemoryHost {
	async fn apply_edits(&self, uri: &str, edits: &[TextChange]) -> Result<bool, HostError> {
		let mut inner = self.inner.lock();
		if inner.reject_edits {
			return Ok(false);
		}
		apply_batch(&mut inner.docs, uri, edits)?;
		inner.log.push(AppliedBatch {
			uri: uri.to_owned(),
			edits: edits.to_vec(),
		});
		Ok(true)
	}

	async fn get_text(&self, uri: &str, range: Option<TextRange>) -> Result<String, HostError> {
		let inner = self.inner.lock();
		let doc = document(&inner.docs, uri)?;
		match range {
			None => Ok(doc.to_string()),
			Some(range) => slice_range(doc.slice(..), range).map_err(|err| out_of_bounds(uri, &err)),
		}
	}

	async fn format_range(&self, uri: &str, range: TextRange) -> Result<Vec<TextChange>, HostError> {
		let inner = self.inner.lock();
		let doc = document(&inner.docs, uri)?;
		Ok(inner.formatter.as_ref().map(|format| format(&doc.to_string(), range)).unwrap_or_default())
	}
}

fn document<'a>(docs: &'a HashMap<String, Rope>, uri: &str) -> Result<&'a Rope, HostError> {
	docs.get(uri).ok_or_else(|| HostError::DocumentNotFound(uri.to_owned()))
}

fn out_of_bounds(uri: &str, err: &RopeError) -> HostError {
	HostError::RangeOutOfBounds {
		uri: uri.to_owned(),
		detail: err.to_string(),
	}
}

/// Applies `edits` atomically; nothing changes when any edit is invalid.
fn apply_batch(docs: &mut HashMap<String, Rope>, uri: &str, edits: &[TextChange]) -> Result<(), HostError> {
	let doc = docs.get_mut(uri).ok_or_else(|| HostError::DocumentNotFound(uri.to_owned()))?;
	let text = doc.slice(..);
	let mut changes = edits
		.iter()
		.map(|edit| {
			let chars = range_to_chars(text, edit.range).map_err(|err| out_of_bounds(uri, &err))?;
			Ok(Change {
				start: chars.start,
				end: chars.end,
				replacement: (!edit.text.is_empty()).then(|| edit.text.clone()),
			})
		})
		.collect::<Result<Vec<_>, HostError>>()?;
	changes.sort_by_key(|change| (change.start, change.end));

	let set = ChangeSet::from_changes(doc.len_chars(), changes).map_err(|err| HostError::Rejected {
		uri: uri.to_owned(),
		reason: err.to_string(),
	})?;
	set.apply(doc);
	Ok(())
}
