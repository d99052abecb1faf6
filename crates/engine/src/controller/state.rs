use crate::task::TaskState;

/// State, spin count, terminal error and formatting gate of a task.
///
/// Only the controller mutates this.
#[derive(Debug, Clone)]
pub struct TaskLifecycle {
	state: TaskState,
	spin_count: u32,
	error: Option<String>,
	formatting_gate: Option<u64>,
}

impl Default for TaskLifecycle {
	fn default() -> Self {
		Self {
			state: TaskState::Idle,
			spin_count: 0,
			error: None,
			formatting_gate: None,
		}
	}
}

impl TaskLifecycle {
	pub fn state(&self) -> TaskState {
		self.state
	}

	/// Number of model submissions so far.
	pub fn spin_count(&self) -> u32 {
		self.spin_count
	}

	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	pub fn has_formatting_gate(&self) -> bool {
		self.formatting_gate.is_some()
	}

	/// Moves to `to`. Returns the previous state, or `None` when already there.
	///
	/// # Panics
	///
	/// Panics on a transition the lifecycle does not allow.
	pub(crate) fn transition(&mut self, to: TaskState) -> Option<TaskState> {
		let from = self.state;
		if from == to {
			return None;
		}
		assert!(is_allowed(from, to), "invalid task transition {from} -> {to}");
		self.state = to;
		if to == TaskState::Working {
			self.spin_count += 1;
		}
		if to != TaskState::Formatting {
			self.formatting_gate = None;
		}
		Some(from)
	}

	pub(crate) fn fail(&mut self, message: impl Into<String>) {
		self.error = Some(message.into());
	}

	pub(crate) fn open_gate(&mut self, gate: u64) {
		self.formatting_gate = Some(gate);
	}

	/// Closes the gate if `gate` is the one currently open.
	pub(crate) fn close_gate(&mut self, gate: u64) -> bool {
		if self.formatting_gate == Some(gate) {
			self.formatting_gate = None;
			return true;
		}
		false
	}
}

pub(crate) fn is_allowed(from: TaskState, to: TaskState) -> bool {
	use TaskState::*;
	match (from, to) {
		(Idle, Pending) | (Idle | Pending, Working) => true,
		(Working, Inserting | Applying) => true,
		(Inserting | Applying, Formatting) => true,
		(Formatting, Applied) => true,
		(Applied, Finished | Working) => true,
		(Applying, Working) => true,
		(Error, Finished) => true,
		(from, Error) => from != Finished,
		(from, Finished) => from.is_active(),
		_ => false,
	}
}
