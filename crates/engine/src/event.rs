use fixup_primitives::TextChange;

use crate::error::HostError;
use crate::host::TransportEvent;
use crate::task::{PrefetchKey, TaskId};

/// Owner of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SessionKey {
	Task(TaskId),
	Prefetch(PrefetchKey),
}

/// Messages from spawned work back to the controller.
#[derive(Debug)]
pub(crate) enum FixupEvent {
	/// Output of a model stream, tagged with the generation that produced it.
	Generation {
		key: SessionKey,
		generation: u64,
		event: TransportEvent,
	},
	/// The idle timer fired; pending diffs should be recomputed.
	IdleDiffs,
	/// A formatter finished for the gate with this generation.
	Formatted {
		id: TaskId,
		gate: u64,
		result: Result<Vec<TextChange>, HostError>,
	},
}
