//! Execution contexts for the storefront pipeline.
//!
//! Every pipeline operation declares where it runs through a [`TaskClass`]:
//! network and file work is spawned onto background classes, while the
//! single interactive context owns observable state. Results travel back to
//! the interactive context through the caller's message bus; this crate only
//! provides the scheduling half.
//!
//! * [`spawn`] / [`spawn_blocking`] / [`run_blocking`]: classified task entry points
//! * [`InFlight`]: tracker for fire-and-forget tasks that surfaces panics

mod class;
mod error;
mod in_flight;
mod spawn;

pub use class::TaskClass;
pub use error::{WorkerError, join_error_panic_message};
pub use in_flight::{InFlight, TaskFailure};
pub use spawn::{run_blocking, spawn, spawn_blocking};
