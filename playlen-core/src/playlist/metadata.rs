use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AttemptError;
use crate::mirror::{LiveMirror, MirrorTransport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub id: String,
    pub title: String,
    pub duration_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRecord {
    title: String,
    length_seconds: u64,
}

/// Mirrors answer 500 for videos they have no record of.
pub fn is_not_found_signal(status: u16) -> bool {
    status == 500
}

enum Lookup {
    Found(ItemMetadata),
    NotFound,
}

#[derive(Clone)]
pub struct ItemFetcher {
    transport: Arc<dyn MirrorTransport>,
    timeout: Duration,
}

impl ItemFetcher {
    pub fn new(transport: Arc<dyn MirrorTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn fetch_one(&self, id: &str, mirrors: &[LiveMirror]) -> Option<ItemMetadata> {
        for mirror in mirrors {
            match self.lookup(id, mirror).await {
                Ok(Lookup::Found(metadata)) => return Some(metadata),
                Ok(Lookup::NotFound) => {
                    debug!(item = id, mirror = %mirror.base_url, "mirror reports item missing");
                    return None;
                }
                Err(err) => {
                    debug!(
                        item = id,
                        mirror = %mirror.base_url,
                        error = %err,
                        "item lookup failed, trying next mirror"
                    );
                }
            }
        }
        None
    }

    /// Fetches every id with at most `concurrency` requests in flight.
    /// The result is index-aligned with `ids`.
    pub async fn fetch_all(
        &self,
        ids: &[String],
        mirrors: &[LiveMirror],
        concurrency: usize,
    ) -> Vec<Option<ItemMetadata>> {
        stream::iter(ids)
            .map(|id| self.fetch_one(id, mirrors))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn lookup(&self, id: &str, mirror: &LiveMirror) -> Result<Lookup, AttemptError> {
        let url = mirror.api_url(&["api", "v1", "videos", id])?;
        let reply = self.transport.get(url.as_str(), self.timeout).await?;
        if reply.is_success() {
            let record: VideoRecord = reply.json()?;
            return Ok(Lookup::Found(ItemMetadata {
                id: id.to_string(),
                title: record.title,
                duration_seconds: record.length_seconds,
            }));
        }
        if is_not_found_signal(reply.status) {
            return Ok(Lookup::NotFound);
        }
        Err(AttemptError::Status(reply.status))
    }
}
