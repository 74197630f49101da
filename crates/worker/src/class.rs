/// Execution contexts a pipeline operation can be scheduled on.
///
/// Observable state is only ever mutated from [`TaskClass::Interactive`]. Every
/// other class exists to keep I/O off that context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// The single context that owns observable state and runs user callbacks.
	Interactive,
	/// Long-latency async work such as network uploads and store calls.
	Background,
	/// Blocking I/O executed on the blocking pool (file materialization).
	IoBlocking,
}

impl TaskClass {
	/// Stable label used in structured log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
			Self::IoBlocking => "io_blocking",
		}
	}

	/// Returns `true` for classes that must never touch observable state.
	pub const fn is_offloaded(self) -> bool {
		!matches!(self, Self::Interactive)
	}
}

impl std::fmt::Display for TaskClass {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
