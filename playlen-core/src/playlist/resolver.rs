use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AttemptError, PlaylistError, PlaylistResult};
use crate::mirror::{LiveMirror, MirrorTransport};

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    videos: Vec<PlaylistVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistVideo {
    video_id: String,
}

/// Keeps the first occurrence of every id.
pub fn dedupe_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[derive(Clone)]
pub struct PlaylistResolver {
    transport: Arc<dyn MirrorTransport>,
    timeout: Duration,
}

impl PlaylistResolver {
    pub fn new(transport: Arc<dyn MirrorTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Returns the item ids of the first page of `playlist_id`, asking each
    /// mirror in turn until one answers.
    pub async fn resolve_items(
        &self,
        playlist_id: &str,
        mirrors: &[LiveMirror],
    ) -> PlaylistResult<Vec<String>> {
        for mirror in mirrors {
            match self.fetch_page(playlist_id, mirror).await {
                Ok(ids) => {
                    let ids = dedupe_preserving_order(ids);
                    info!(
                        playlist = playlist_id,
                        mirror = %mirror.base_url,
                        items = ids.len(),
                        "playlist resolved"
                    );
                    return Ok(ids);
                }
                Err(err) => {
                    debug!(
                        playlist = playlist_id,
                        mirror = %mirror.base_url,
                        error = %err,
                        "playlist lookup failed, trying next mirror"
                    );
                }
            }
        }

        warn!(
            playlist = playlist_id,
            attempts = mirrors.len(),
            "no mirror could resolve playlist"
        );
        Err(PlaylistError::NoUsableMirror {
            playlist_id: playlist_id.to_string(),
            attempts: mirrors.len(),
        })
    }

    async fn fetch_page(
        &self,
        playlist_id: &str,
        mirror: &LiveMirror,
    ) -> Result<Vec<String>, AttemptError> {
        let mut url = mirror.api_url(&["api", "v1", "playlists", playlist_id])?;
        url.set_query(Some("page=1"));
        let reply = self.transport.get(url.as_str(), self.timeout).await?;
        if !reply.is_success() {
            return Err(AttemptError::Status(reply.status));
        }
        let page: PlaylistPage = reply.json()?;
        Ok(page.videos.into_iter().map(|video| video.video_id).collect())
    }
}
