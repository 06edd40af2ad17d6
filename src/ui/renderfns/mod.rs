pub mod footer;
pub mod header;
pub mod notices;
pub mod palette;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use notices::{banner_height, draw_banners, draw_toast};
pub use palette::draw_palette;
pub use utils::truncate;
