//! Contracts for the collaborators the engine drives: the document host, the
//! completion transport and the guardrail check.

use async_trait::async_trait;
use fixup_primitives::{TextChange, TextRange};
use fixup_worker::GenerationToken;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{HostError, TransportError};
use crate::task::{Intent, Mode};

/// Buffer access offered by an editor or file store.
///
/// Edits passed to [`apply_edits`](Self::apply_edits) are expressed in
/// pre-batch coordinates and must not overlap. Hosts must not report edits
/// applied through this trait back as document changes.
#[async_trait]
pub trait DocumentHost: Send + Sync {
	/// Applies a batch of edits atomically. `Ok(false)` means the host declined.
	async fn apply_edits(&self, uri: &str, edits: &[TextChange]) -> Result<bool, HostError>;

	/// Returns the text of `range`, or the whole document when `range` is `None`.
	async fn get_text(&self, uri: &str, range: Option<TextRange>) -> Result<String, HostError>;

	/// Returns formatting edits for the document; the engine keeps those inside `range`.
	async fn format_range(&self, uri: &str, range: TextRange) -> Result<Vec<TextChange>, HostError>;
}

/// Everything a transport needs to issue one model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
	pub uri: String,
	pub instruction: String,
	pub original_text: String,
	pub intent: Intent,
	pub mode: Mode,
	/// Submission number for this task, starting at 1.
	pub attempt: u32,
}

/// One event from a model stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// Cumulative text generated so far.
	Change { text: String },
	Complete,
	Error(TransportError),
}

/// Source of model output.
pub trait CompletionTransport: Send + Sync {
	/// Starts a generation. The stream must end soon after `abort` is cancelled.
	fn stream(&self, request: CompletionRequest, abort: GenerationToken) -> BoxStream<'static, TransportEvent>;
}

/// Attribution or safety check run once per finalised response.
pub trait Guardrails: Send + Sync {
	fn can_apply(&self, original: &str, proposed: &str) -> bool;
}

/// Guardrails that never veto.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Guardrails for AllowAll {
	fn can_apply(&self, _original: &str, _proposed: &str) -> bool {
		true
	}
}
