//! Coalescing idle scheduler.
//!
//! Work scheduled while the timer is armed shares that timer. When it fires the
//! queued items run in FIFO order, each delivering its own outcome.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::{TaskClass, spawn};


/// Default delay before queued idle work runs.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(10);

/// Failure of a single idle work item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdleError {
	/// The item panicked; carries the panic message when one was available.
	#[error("idle work panicked: {0}")]
	Panicked(String),
	/// The scheduler dropped the item before running it.
	#[error("idle work dropped before running")]
	Dropped,
}

type Job = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct IdleQueue {
	jobs: VecDeque<Job>,
	armed: bool,
}

/// Defers work until a short quiet period has passed.
#[derive(Clone)]
pub struct IdleScheduler {
	delay: Duration,
	queue: Arc<Mutex<IdleQueue>>,
}

impl std::fmt::Debug for IdleScheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let queue = self.queue.lock();
		f.debug_struct("IdleScheduler")
			.field("delay", &self.delay)
			.field("pending", &queue.jobs.len())
			.field("armed", &queue.armed)
			.finish()
	}
}

impl Default for IdleScheduler {
	fn default() -> Self {
		Self::new(DEFAULT_IDLE_DELAY)
	}
}

impl IdleScheduler {
	/// Creates a scheduler firing `delay` after the first item of a burst.
	pub fn new(delay: Duration) -> Self {
		Self {
			delay,
			queue: Arc::default(),
		}
	}

	/// Returns the configured delay.
	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// Number of items waiting for the timer.
	pub fn pending(&self) -> usize {
		self.queue.lock().jobs.len()
	}

	/// Queues `f` and returns a future resolving to its outcome.
	///
	/// The item is queued immediately; the returned future only observes it.
	/// Dropping the future does not cancel the work.
	///
	/// # Panics
	///
	/// Panics when called outside a Tokio runtime.
	pub fn schedule<F, T>(&self, f: F) -> impl Future<Output = Result<T, IdleError>> + Send + 'static
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let job: Job = Box::new(move || {
			let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| IdleError::Panicked(panic_message(payload.as_ref())));
			let _ = tx.send(outcome);
		});

		let arm = {
			let mut queue = self.queue.lock();
			queue.jobs.push_back(job);
			!std::mem::replace(&mut queue.armed, true)
		};

		if arm {
			let queue = Arc::clone(&self.queue);
			let delay = self.delay;
			tracing::trace!(delay_ms = delay.as_millis() as u64, "worker.idle.arm");
			spawn(TaskClass::Background, async move {
				tokio::time::sleep(delay).await;
				drain(&queue);
			});
		}

		async move { rx.await.unwrap_or(Err(IdleError::Dropped)) }
	}
}

fn drain(queue: &Mutex<IdleQueue>) {
	let jobs = {
		let mut queue = queue.lock();
		queue.armed = false;
		std::mem::take(&mut queue.jobs)
	};
	tracing::trace!(count = jobs.len(), "worker.idle.drain");
	for job in jobs {
		job();
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		String::from("unknown panic payload")
	}
}
