//! A [`CompletionTransport`] that replays canned model output.

use std::collections::VecDeque;
use std::time::Duration;

use fixup_worker::GenerationToken;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::host::{CompletionRequest, CompletionTransport, TransportEvent};

/// Delay before each chunk added with [`Script::chunk`].
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(5);

/// How a scripted generation ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Ending {
	#[default]
	Complete,
	Error(TransportError),
	/// Stay open until aborted.
	Hang,
}

/// Output of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
	chunks: Vec<(Duration, String)>,
	ending: Ending,
}

impl Script {
	pub fn new() -> Self {
		Self::default()
	}

	/// A script streaming each of `texts` as cumulative output, then completing.
	pub fn cumulative<I, S>(texts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		texts.into_iter().fold(Self::new(), Self::chunk)
	}

	/// Appends cumulative text after [`DEFAULT_CHUNK_DELAY`].
	pub fn chunk(self, text: impl Into<String>) -> Self {
		self.chunk_after(DEFAULT_CHUNK_DELAY, text)
	}

	pub fn chunk_after(mut self, delay: Duration, text: impl Into<String>) -> Self {
		self.chunks.push((delay, text.into()));
		self
	}

	pub fn fail(mut self, error: TransportError) -> Self {
		self.ending = Ending::Error(error);
		self
	}

	pub fn hang(mut self) -> Self {
		self.ending = Ending::Hang;
		self
	}

	fn events(self) -> (VecDeque<(Duration, TransportEvent)>, bool) {
		let mut steps: VecDeque<_> = self.chunks.into_iter().map(|(delay, text)| (delay, TransportEvent::Change { text })).collect();
		let hang = match self.ending {
			Ending::Complete => {
				steps.push_back((DEFAULT_CHUNK_DELAY, TransportEvent::Complete));
				false
			}
			Ending::Error(error) => {
				steps.push_back((DEFAULT_CHUNK_DELAY, TransportEvent::Error(error)));
				false
			}
			Ending::Hang => true,
		};
		(steps, hang)
	}
}

/// Replays one [`Script`] per submission. The last script repeats.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	scripts: Vec<Script>,
	requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedTransport {
	pub fn new(scripts: Vec<Script>) -> Self {
		Self {
			scripts,
			requests: Mutex::default(),
		}
	}

	/// Every request received so far, oldest first.
	pub fn requests(&self) -> Vec<CompletionRequest> {
		self.requests.lock().clone()
	}

	pub fn submissions(&self) -> usize {
		self.requests.lock().len()
	}
}

struct Playback {
	steps: VecDeque<(Duration, TransportEvent)>,
	hang: bool,
	abort: GenerationToken,
}

impl CompletionTransport for ScriptedTransport {
	fn stream(&self, request: CompletionRequest, abort: GenerationToken) -> BoxStream<'static, TransportEvent> {
		let script = {
			let mut requests = self.requests.lock();
			let index = requests.len();
			requests.push(request);
			self.scripts.get(index).or(self.scripts.last()).cloned().unwrap_or_default()
		};
		let (steps, hang) = script.events();
		stream::unfold(Playback { steps, hang, abort }, |mut playback| async move {
			let Some((delay, event)) = playback.steps.pop_front() else {
				if playback.hang {
					playback.abort.cancelled().await;
				}
				return None;
			};
			tokio::select! {
				biased;
				() = playback.abort.cancelled() => None,
				() = tokio::time::sleep(delay) => Some((event, playback)),
			}
		})
		.boxed()
	}
}
