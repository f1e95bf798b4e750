mod length;

pub use length::{extract_playlist_id, LengthArgs};
