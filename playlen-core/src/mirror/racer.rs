use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::transport::MirrorTransport;
use super::{LiveMirror, MirrorError, MirrorResult};

const RACE_ATTEMPTS: u32 = 2;

#[derive(Clone)]
pub struct MirrorRacer {
    transport: Arc<dyn MirrorTransport>,
}

impl MirrorRacer {
    pub fn new(transport: Arc<dyn MirrorTransport>) -> Self {
        Self { transport }
    }

    /// Probes every candidate at once and returns the ones that answered,
    /// fastest first.
    ///
    /// A batch that fails as a whole is retried once with twice the timeout.
    /// A batch in which no candidate accepted a connection counts as failed.
    pub async fn race<I, S>(&self, urls: I, timeout: Duration) -> MirrorResult<Vec<LiveMirror>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let urls: Vec<String> = urls
            .into_iter()
            .map(Into::into)
            .filter(|url| seen.insert(url.clone()))
            .collect();
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let mut timeout = timeout;
        let mut attempt = 1;
        loop {
            match self.race_once(&urls, timeout).await {
                Ok(live) => {
                    info!(
                        candidates = urls.len(),
                        live = live.len(),
                        timeout_ms = timeout.as_millis() as u64,
                        "mirror race finished"
                    );
                    return Ok(live);
                }
                Err(reason) if attempt < RACE_ATTEMPTS => {
                    warn!(
                        attempt,
                        reason = %reason,
                        timeout_ms = timeout.as_millis() as u64,
                        "mirror race batch failed, retrying with doubled timeout"
                    );
                    timeout = timeout.saturating_mul(2);
                    attempt += 1;
                }
                Err(reason) => {
                    return Err(MirrorError::RaceBatchFailure {
                        attempts: attempt,
                        reason,
                    });
                }
            }
        }
    }

    async fn race_once(&self, urls: &[String], timeout: Duration) -> Result<Vec<LiveMirror>, String> {
        let probes = urls.iter().cloned().map(|url| {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move { transport.probe(&url, timeout).await })
        });
        let results = join_all(probes).await;

        let mut live = Vec::new();
        let mut refused = 0;
        for (url, joined) in urls.iter().zip(results) {
            match joined {
                Err(err) => return Err(format!("probe task for {url} aborted: {err}")),
                Ok(Err(err)) if err.is_systemic() => return Err(err.to_string()),
                Ok(Err(err)) => {
                    if err.is_connection_failure() {
                        refused += 1;
                    }
                    debug!(mirror = %url, error = %err, "mirror probe failed");
                }
                Ok(Ok(outcome)) => {
                    live.push(LiveMirror::new(
                        outcome.final_url,
                        outcome.elapsed.as_secs_f64(),
                    ));
                }
            }
        }

        // Not a single host accepted a connection: the local network is down,
        // not the mirrors.
        if refused == urls.len() {
            return Err(format!("none of {} candidates accepted a connection", urls.len()));
        }

        live.sort_by(|a, b| a.latency_seconds.total_cmp(&b.latency_seconds));
        // Two candidates may redirect to the same canonical host.
        let mut seen = HashSet::new();
        live.retain(|mirror| seen.insert(mirror.base_url.clone()));
        Ok(live)
    }
}
