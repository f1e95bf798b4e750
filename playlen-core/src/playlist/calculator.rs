use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::aggregate::{aggregate, DurationTotals};
use super::metadata::{ItemFetcher, ItemMetadata};
use super::resolver::PlaylistResolver;
use super::{PlaylistError, PlaylistResult};
use crate::config::PlaylenConfig;
use crate::mirror::{LiveMirror, MirrorDirectory, MirrorError, MirrorSet, MirrorTransport};

/// Outcome of the one-time mirror discovery.
#[derive(Debug, Clone)]
pub enum MirrorState {
    Ready(Arc<MirrorSet>),
    Unavailable(String),
}

impl From<Result<MirrorSet, MirrorError>> for MirrorState {
    fn from(result: Result<MirrorSet, MirrorError>) -> Self {
        match result {
            Ok(set) => MirrorState::Ready(Arc::new(set)),
            Err(err) => MirrorState::Unavailable(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistReport {
    pub playlist_id: String,
    pub items: Vec<ItemMetadata>,
    pub unavailable: usize,
    pub totals: DurationTotals,
}

pub struct PlaylistCalculator {
    mirrors: MirrorState,
    resolver: PlaylistResolver,
    fetcher: ItemFetcher,
    pinned_mirror: Option<LiveMirror>,
    concurrency: usize,
}

impl PlaylistCalculator {
    pub fn new(
        transport: Arc<dyn MirrorTransport>,
        config: &PlaylenConfig,
        mirrors: MirrorState,
    ) -> Self {
        let timeout = config.fetch.timeout();
        Self {
            mirrors,
            resolver: PlaylistResolver::new(Arc::clone(&transport), timeout),
            fetcher: ItemFetcher::new(transport, timeout),
            pinned_mirror: config
                .fetch
                .pinned_mirror
                .as_deref()
                .map(|url| LiveMirror::new(url, 0.0)),
            concurrency: config.fetch.concurrency,
        }
    }

    /// Runs mirror discovery once and keeps its outcome for the calculator's
    /// lifetime. A failed discovery is remembered, not retried.
    pub async fn bootstrap(transport: Arc<dyn MirrorTransport>, config: &PlaylenConfig) -> Self {
        let directory = MirrorDirectory::new(Arc::clone(&transport), config);
        let discovered = directory.discover().await;
        match &discovered {
            Ok(set) => info!(
                plain = set.plain.len(),
                api_capable = set.api_capable.len(),
                "mirror discovery complete"
            ),
            Err(err) => error!(error = %err, "mirror discovery failed"),
        }
        Self::new(transport, config, discovered.into())
    }

    pub fn mirrors(&self) -> PlaylistResult<&Arc<MirrorSet>> {
        match &self.mirrors {
            MirrorState::Ready(set) => Ok(set),
            MirrorState::Unavailable(reason) => {
                Err(PlaylistError::DirectoryUnavailable(reason.clone()))
            }
        }
    }

    pub fn resolver(&self) -> &PlaylistResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &ItemFetcher {
        &self.fetcher
    }

    pub async fn calculate(
        &self,
        playlist_id: &str,
        concurrency: Option<usize>,
    ) -> PlaylistResult<PlaylistReport> {
        let playlist_id = playlist_id.trim();
        if playlist_id.is_empty() {
            return Err(PlaylistError::InvalidPlaylistId(playlist_id.to_string()));
        }
        let set = self.mirrors()?;

        let ids = self
            .resolver
            .resolve_items(playlist_id, &set.api_capable)
            .await?;

        let item_mirrors = match &self.pinned_mirror {
            Some(pinned) => std::slice::from_ref(pinned),
            None => set.api_capable.as_slice(),
        };
        let concurrency = concurrency.unwrap_or(self.concurrency);
        let fetched = self.fetcher.fetch_all(&ids, item_mirrors, concurrency).await;

        let totals = aggregate(&fetched);
        let items: Vec<ItemMetadata> = fetched.into_iter().flatten().collect();
        let unavailable = ids.len() - items.len();
        if unavailable > 0 {
            warn!(
                playlist = playlist_id,
                unavailable,
                total = ids.len(),
                "some playlist items could not be fetched"
            );
        }

        Ok(PlaylistReport {
            playlist_id: playlist_id.to_string(),
            items,
            unavailable,
            totals,
        })
    }
}
