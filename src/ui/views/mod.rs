mod entries;
mod pending;

pub use entries::draw_entries;
pub use pending::draw_pending;
