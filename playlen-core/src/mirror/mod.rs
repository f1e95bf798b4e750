//! Mirror discovery and ranking.
//!
//! The directory lists every known mirror, the racer probes them and keeps the
//! ones that answered, fastest first. The resulting [`MirrorSet`] is built once
//! and shared read-only by everything downstream.

pub mod directory;
pub mod racer;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use url::Url;

pub use directory::{parse_directory, partition, Candidates, DirectoryEntry, MirrorDirectory};
pub use racer::MirrorRacer;
pub use transport::{
    strip_trailing_slash, FetchError, HttpReply, MirrorTransport, ProbeError, ProbeOutcome,
    ProbeResult, ReqwestTransport,
};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror race failed after {attempts} attempts: {reason}")]
    RaceBatchFailure { attempts: u32, reason: String },
    #[error("mirror directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

pub type MirrorResult<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveMirror {
    pub base_url: String,
    pub latency_seconds: f64,
}

impl LiveMirror {
    pub fn new(base_url: impl AsRef<str>, latency_seconds: f64) -> Self {
        Self {
            base_url: strip_trailing_slash(base_url.as_ref()),
            latency_seconds,
        }
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_seconds * 1000.0
    }

    /// Appends `segments` to the mirror's base path, percent-encoding each one.
    pub fn api_url(&self, segments: &[&str]) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MirrorSet {
    pub plain: Vec<LiveMirror>,
    pub api_capable: Vec<LiveMirror>,
    pub discovered_at: DateTime<Utc>,
}

impl MirrorSet {
    pub fn new(plain: Vec<LiveMirror>, api_capable: Vec<LiveMirror>) -> Self {
        Self {
            plain,
            api_capable,
            discovered_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.api_capable.is_empty()
    }
}
