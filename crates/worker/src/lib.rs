//! Worker primitives shared by the fixup engine.
//!
//! * [`spawn`] routes every background future through one traced entry point.
//! * [`GenerationToken`] is the abort handle for a model generation.
//! * [`IdleScheduler`] coalesces bursts of deferred work onto a single timer.

mod class;
pub mod idle;
mod spawn;
mod token;

pub use class::TaskClass;
pub use idle::{IdleError, IdleScheduler};
pub use spawn::spawn;
pub use token::{GenerationClock, GenerationToken};
