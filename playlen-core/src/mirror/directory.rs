use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use super::racer::MirrorRacer;
use super::transport::MirrorTransport;
use super::{MirrorError, MirrorResult, MirrorSet};
use crate::config::PlaylenConfig;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DirectoryEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
    #[serde(default)]
    pub api: Option<bool>,
}

impl DirectoryEntry {
    pub fn is_secure(&self) -> bool {
        self.kind == "https"
    }

    pub fn is_api_capable(&self) -> bool {
        self.api.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub plain: Vec<String>,
    pub api_capable: Vec<String>,
}

pub fn parse_directory(body: &str) -> Result<Vec<DirectoryEntry>, serde_json::Error> {
    let rows: Vec<(serde_json::Value, DirectoryEntry)> = serde_json::from_str(body)?;
    Ok(rows.into_iter().map(|(_, entry)| entry).collect())
}

pub fn partition(entries: &[DirectoryEntry]) -> Candidates {
    let mut candidates = Candidates::default();
    for entry in entries.iter().filter(|entry| entry.is_secure()) {
        candidates.plain.push(entry.uri.clone());
        if entry.is_api_capable() {
            candidates.api_capable.push(entry.uri.clone());
        }
    }
    candidates
}

#[derive(Clone)]
pub struct MirrorDirectory {
    transport: Arc<dyn MirrorTransport>,
    racer: MirrorRacer,
    url: String,
    fetch_timeout: Duration,
    probe_timeout: Duration,
}

impl MirrorDirectory {
    pub fn new(transport: Arc<dyn MirrorTransport>, config: &PlaylenConfig) -> Self {
        Self {
            racer: MirrorRacer::new(Arc::clone(&transport)),
            transport,
            url: config.directory.url.clone(),
            fetch_timeout: config.fetch.timeout(),
            probe_timeout: config.probe.timeout(),
        }
    }

    pub async fn fetch_candidates(&self) -> MirrorResult<Candidates> {
        let reply = self
            .transport
            .get(&self.url, self.fetch_timeout)
            .await
            .map_err(|err| MirrorError::DirectoryUnavailable(err.to_string()))?;
        if !reply.is_success() {
            warn!(url = %self.url, status = reply.status, "mirror directory request failed");
            return Err(MirrorError::DirectoryUnavailable(format!(
                "{} answered with status {}",
                self.url, reply.status
            )));
        }
        let entries = parse_directory(&reply.body).map_err(|err| {
            MirrorError::DirectoryUnavailable(format!("unexpected directory shape: {err}"))
        })?;
        Ok(partition(&entries))
    }

    /// Fetches the directory and races both candidate subsets.
    pub async fn discover(&self) -> MirrorResult<MirrorSet> {
        let candidates = self.fetch_candidates().await?;
        info!(
            plain = candidates.plain.len(),
            api_capable = candidates.api_capable.len(),
            "mirror directory fetched"
        );
        let plain = self.racer.race(candidates.plain, self.probe_timeout).await?;
        let api_capable = self
            .racer
            .race(candidates.api_capable, self.probe_timeout)
            .await?;
        Ok(MirrorSet::new(plain, api_capable))
    }
}
