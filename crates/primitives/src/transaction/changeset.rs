use super::types::{Bias, Change, Insertion, Operation};
use super::ChangeError;
use crate::Rope;
use crate::rope::{CharIdx, CharLen};

/// A sequence of retain/delete/insert operations over a document.
///
/// Operations cover the whole source document, so `len` is the source length
/// and `len_after` the length once applied.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
	changes: Vec<Operation>,
	len: usize,
	len_after: usize,
}

impl ChangeSet {
	/// Builds a changeset from character-offset changes over a document of
	/// `doc_len` characters.
	///
	/// Changes must be sorted by start and must not overlap. Insertions at the
	/// same offset are applied in the given order.
	pub fn from_changes<I>(doc_len: CharLen, changes: I) -> Result<Self, ChangeError>
	where
		I: IntoIterator<Item = Change>,
	{
		let mut cs = Self::default();
		let mut last = 0;
		for change in changes {
			if change.start > change.end || change.end > doc_len {
				return Err(ChangeError::OutOfBounds {
					start: change.start,
					end: change.end,
					len: doc_len,
				});
			}
			if change.start < last {
				return Err(ChangeError::Overlapping { at: change.start });
			}
			cs.retain(change.start - last);
			cs.delete(change.removed());
			if let Some(text) = change.replacement {
				cs.insert(text);
			}
			last = change.end;
		}
		cs.retain(doc_len - last);
		Ok(cs)
	}

	/// Returns the length of the source document.
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns the length of the document after applying changes.
	pub fn len_after(&self) -> usize {
		self.len_after
	}

	pub(crate) fn retain(&mut self, n: CharLen) {
		if n == 0 {
			return;
		}
		self.len += n;
		self.len_after += n;
		if let Some(Operation::Retain(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Retain(n));
		}
	}

	pub(crate) fn delete(&mut self, n: CharLen) {
		if n == 0 {
			return;
		}
		self.len += n;
		if let Some(Operation::Delete(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Delete(n));
		}
	}

	/// Inserts keep their place before a trailing delete so adjacent inserts merge.
	pub(crate) fn insert(&mut self, text: String) {
		if text.is_empty() {
			return;
		}
		let ins = Insertion::new(text);
		self.len_after += ins.char_len();
		match self.changes.as_mut_slice() {
			[.., Operation::Insert(prev)] | [.., Operation::Insert(prev), Operation::Delete(_)] => {
				prev.push(ins);
			}
			[.., last @ Operation::Delete(_)] => {
				let del = std::mem::replace(last, Operation::Insert(ins));
				self.changes.push(del);
			}
			_ => self.changes.push(Operation::Insert(ins)),
		}
	}

	/// Applies this changeset to a document in place.
	pub fn apply(&self, doc: &mut Rope) {
		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) => pos += n,
				Operation::Delete(n) => doc.remove(pos..pos + n),
				Operation::Insert(ins) => {
					doc.insert(pos, ins.text());
					pos += ins.char_len();
				}
			}
		}
	}

	/// Maps a source position into the changed document.
	///
	/// Positions inside a deletion collapse to its start. `bias` decides
	/// whether a position sitting on an insertion point stays before it.
	pub fn map_pos(&self, pos: CharIdx, bias: Bias) -> CharIdx {
		let mut old_pos = 0;
		let mut new_pos = 0;

		for op in &self.changes {
			if old_pos > pos {
				break;
			}
			match op {
				Operation::Retain(n) => {
					if old_pos + n > pos {
						return new_pos + (pos - old_pos);
					}
					old_pos += n;
					new_pos += n;
				}
				Operation::Delete(n) => {
					if old_pos + n > pos {
						return new_pos;
					}
					old_pos += n;
				}
				Operation::Insert(ins) => {
					if old_pos != pos || bias == Bias::Right {
						new_pos += ins.char_len();
					}
				}
			}
		}

		new_pos + (pos - old_pos)
	}
}
