pub mod config;
pub mod error;
pub mod mirror;
pub mod playlist;

pub use config::{load_playlen_config, PlaylenConfig};
pub use error::{ConfigError, Result};
pub use mirror::{
    LiveMirror, MirrorDirectory, MirrorError, MirrorRacer, MirrorSet, MirrorTransport,
    ReqwestTransport,
};
pub use playlist::{
    aggregate, DurationBreakdown, DurationTotals, ItemFetcher, ItemMetadata, MirrorState,
    PlaylistCalculator, PlaylistError, PlaylistReport, PlaylistResolver, SPEED_MULTIPLIERS,
};
