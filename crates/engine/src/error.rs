//! Error types for the fixup engine.

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::task::{TaskId, TaskState};

/// Errors surfaced by [`FixupController`](crate::FixupController) operations.
#[derive(Debug, Error)]
pub enum FixupError {
	/// No task with this id is known.
	#[error("unknown task {0}")]
	UnknownTask(TaskId),
	/// The operation is not legal in the task's current state.
	#[error("cannot {operation} task {id} in state {state}")]
	InvalidOperation {
		id: TaskId,
		operation: &'static str,
		state: TaskState,
	},
	/// The document host failed.
	#[error(transparent)]
	Host(#[from] HostError),
	/// Configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type Result<T, E = FixupError> = std::result::Result<T, E>;

/// Failures reported by a [`DocumentHost`](crate::host::DocumentHost).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
	#[error("document not found: {0}")]
	DocumentNotFound(String),
	#[error("range out of bounds in {uri}: {detail}")]
	RangeOutOfBounds { uri: String, detail: String },
	#[error("edit rejected for {uri}: {reason}")]
	Rejected { uri: String, reason: String },
	#[error("host I/O failure: {0}")]
	Io(String),
}

/// Classification of a generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
	/// Connectivity problems; shown to users with a generic message.
	Network,
	/// The model or provider returned an error.
	Model,
	/// The request was aborted.
	Cancelled,
}

impl fmt::Display for TransportErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Network => "network",
			Self::Model => "model",
			Self::Cancelled => "cancelled",
		})
	}
}

/// Error event emitted by a completion transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
	pub kind: TransportErrorKind,
	pub message: String,
}

impl TransportError {
	pub fn network(message: impl Into<String>) -> Self {
		Self {
			kind: TransportErrorKind::Network,
			message: message.into(),
		}
	}

	pub fn model(message: impl Into<String>) -> Self {
		Self {
			kind: TransportErrorKind::Model,
			message: message.into(),
		}
	}

	pub fn cancelled() -> Self {
		Self {
			kind: TransportErrorKind::Cancelled,
			message: String::from("request aborted"),
		}
	}
}
