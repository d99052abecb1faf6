use std::collections::VecDeque;

/// A pending application of streamed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApplyRequest {
	pub text: String,
	pub partial: bool,
}

impl ApplyRequest {
	pub fn partial(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			partial: true,
		}
	}

	pub fn last(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			partial: false,
		}
	}
}

/// FIFO of application requests.
///
/// A partial request replaces a partial one still waiting at the tail, so a
/// lagging drain only sees the newest text. Final requests are never replaced.
#[derive(Debug, Default)]
pub(crate) struct ApplyQueue {
	items: VecDeque<ApplyRequest>,
	collapsed: u64,
}

impl ApplyQueue {
	pub fn push(&mut self, request: ApplyRequest) {
		if request.partial
			&& let Some(last) = self.items.back_mut()
			&& last.partial
		{
			*last = request;
			self.collapsed += 1;
			return;
		}
		self.items.push_back(request);
	}

	pub fn pop(&mut self) -> Option<ApplyRequest> {
		self.items.pop_front()
	}

	pub fn clear(&mut self) {
		self.items.clear();
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Number of partial requests replaced before being applied.
	pub fn collapsed(&self) -> u64 {
		self.collapsed
	}
}
