//! Transient user-facing notifications.

use std::time::Duration;

/// Severity level for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Level {
	#[default]
	Info,
	Warn,
	Error,
	Success,
}

/// Default on-screen lifetime for a notification.
pub const DEFAULT_DISMISS: Duration = Duration::from_secs(4);

/// A message for the presentation layer to render briefly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub level: Level,
	pub message: String,
	pub dismiss_after: Duration,
}

impl Notification {
	pub fn new(level: Level, message: impl Into<String>) -> Self {
		Self {
			level,
			message: message.into(),
			dismiss_after: DEFAULT_DISMISS,
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self::new(Level::Error, message)
	}

	pub fn warn(message: impl Into<String>) -> Self {
		Self::new(Level::Warn, message)
	}

	pub fn success(message: impl Into<String>) -> Self {
		Self::new(Level::Success, message)
	}
}
