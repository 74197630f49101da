bitflags::bitflags! {
	/// Surfaces touched while applying interactive messages.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Dirty: u8 {
		const CATALOG = 1 << 0;
		const CART = 1 << 1;
		const NOTIFICATIONS = 1 << 2;
		const MUTATIONS = 1 << 3;
	}
}

impl Dirty {
	pub const NONE: Self = Self::empty();
	pub const FULL: Self = Self::all();

	/// Whether the presentation layer has anything to re-render.
	pub fn needs_redraw(self) -> bool {
		!self.is_empty()
	}
}
