//! Fixup task engine.
//!
//! Lands AI-generated edits in live documents while the user keeps typing.
//! [`FixupController`] owns the tasks; model output streams in through a
//! [`CompletionTransport`], the [`DocumentHost`] holds the text, and every
//! document mutation is reported back through
//! [`FixupController::document_changed`] so tracked ranges and diffs stay
//! current.

pub mod config;
mod controller;
pub mod diff;
mod error;
mod event;
pub mod host;
pub mod memory;
mod observer;
mod reconciler;
pub mod scripted;
mod task;
pub mod tracked_range;

pub use config::{ConfigError, FixupConfig};
pub use controller::FixupController;
pub use diff::{Diff, compute_diff};
pub use error::{FixupError, HostError, Result, TransportError, TransportErrorKind};
pub use host::{AllowAll, CompletionRequest, CompletionTransport, DocumentHost, Guardrails, TransportEvent};
pub use memory::MemoryHost;
pub use scripted::{Script, ScriptedTransport};
pub use task::{DiffSlot, DocumentUri, FixupTask, Intent, Mode, PrefetchKey, TaskId, TaskNotification, TaskOptions, TaskSnapshot, TaskState};
pub use tracked_range::{CollapsePolicy, RangePolicy, UpdateOptions, update_range};
