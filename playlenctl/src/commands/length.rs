use clap::Args;

/// Computes the total playback length of a playlist.
#[derive(Args, Debug, Clone)]
pub struct LengthArgs {
    /// Playlist link (anything containing `list=`) or a bare playlist id
    pub link: String,

    /// Number of item lookups kept in flight (defaults to fetch.concurrency)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Pulls the playlist id out of a pasted link. Input without `list=` is taken
/// as the id itself.
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();
    let id = match input.split_once("list=") {
        Some((_, rest)) => rest.split(['&', '#']).next().unwrap_or_default(),
        None => input,
    };
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}
