pub mod aggregate;
pub mod calculator;
pub mod metadata;
pub mod resolver;

use thiserror::Error;

use crate::mirror::FetchError;

pub use aggregate::{
    aggregate, scaled_seconds, DurationBreakdown, DurationTotals, SpeedTotal, SPEED_MULTIPLIERS,
};
pub use calculator::{MirrorState, PlaylistCalculator, PlaylistReport};
pub use metadata::{is_not_found_signal, ItemFetcher, ItemMetadata};
pub use resolver::{dedupe_preserving_order, PlaylistResolver};

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("mirror directory unavailable: {0}")]
    DirectoryUnavailable(String),
    #[error("no usable mirror for playlist {playlist_id} ({attempts} mirrors tried)")]
    NoUsableMirror { playlist_id: String, attempts: usize },
    #[error("invalid playlist id: {0:?}")]
    InvalidPlaylistId(String),
}

pub type PlaylistResult<T> = std::result::Result<T, PlaylistError>;

/// Why a single request against a single mirror was not usable.
#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("invalid mirror url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}
