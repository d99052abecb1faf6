use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use fixup_engine::scripted::DEFAULT_CHUNK_DELAY;
use fixup_engine::{Intent, Mode, Script, TransportError};
use fixup_primitives::TextRange;
use serde::Deserialize;

/// A recorded model response and the task that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transcript {
	pub instruction: String,
	pub range: TextRange,
	#[serde(default)]
	pub intent: Intent,
	#[serde(default)]
	pub mode: Mode,
	/// Cumulative model output, one entry per streamed event.
	pub chunks: Vec<String>,
	/// Ends the stream with a model error instead of completing.
	#[serde(default)]
	pub error: Option<String>,
	#[serde(default)]
	pub delay_ms: Option<u64>,
}

impl Transcript {
	pub fn load(path: &Path) -> anyhow::Result<Self> {
		let text = std::fs::read_to_string(path).with_context(|| format!("reading transcript {}", path.display()))?;
		serde_json::from_str(&text).with_context(|| format!("parsing transcript {}", path.display()))
	}

	pub fn script(&self) -> Script {
		let delay = self.delay_ms.map_or(DEFAULT_CHUNK_DELAY, Duration::from_millis);
		let script = self.chunks.iter().fold(Script::new(), |script, chunk| script.chunk_after(delay, chunk.as_str()));
		match &self.error {
			Some(message) => script.fail(TransportError::model(message.as_str())),
			None => script,
		}
	}
}
