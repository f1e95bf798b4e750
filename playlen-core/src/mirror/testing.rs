use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::transport::{
    FetchError, HttpReply, MirrorTransport, ProbeError, ProbeOutcome, ProbeResult,
};

#[derive(Clone)]
struct ScriptedReply {
    result: Result<HttpReply, FetchError>,
    delay: Duration,
}

/// In-memory transport answering from a fixed script and recording every call.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    probes: HashMap<String, ProbeResult<ProbeOutcome>>,
    replies: HashMap<String, ScriptedReply>,
    systemic_probe_calls: usize,
    panic_on_probe: bool,
    probe_count: AtomicUsize,
    calls: Mutex<Vec<String>>,
    probe_timeouts: Mutex<Vec<Duration>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn probe_ok(mut self, url: &str, final_url: &str, millis: u64) -> Self {
        self.probes.insert(
            url.to_string(),
            Ok(ProbeOutcome {
                final_url: final_url.to_string(),
                elapsed: Duration::from_millis(millis),
            }),
        );
        self
    }

    pub(crate) fn probe_timeout(mut self, url: &str) -> Self {
        self.probes.insert(
            url.to_string(),
            Err(ProbeError::Timeout {
                url: url.to_string(),
            }),
        );
        self
    }

    /// The first `calls` probes fail as if the HTTP stack itself were broken.
    pub(crate) fn systemic_probe_failures(mut self, calls: usize) -> Self {
        self.systemic_probe_calls = calls;
        self
    }

    pub(crate) fn panicking_probes(mut self) -> Self {
        self.panic_on_probe = true;
        self
    }

    pub(crate) fn reply(self, url: &str, status: u16, body: &str) -> Self {
        self.reply_after(url, status, body, Duration::ZERO)
    }

    pub(crate) fn reply_after(mut self, url: &str, status: u16, body: &str, delay: Duration) -> Self {
        self.replies.insert(
            url.to_string(),
            ScriptedReply {
                result: Ok(HttpReply {
                    url: url.to_string(),
                    status,
                    body: body.to_string(),
                }),
                delay,
            },
        );
        self
    }

    pub(crate) fn unreachable(mut self, url: &str) -> Self {
        self.replies.insert(
            url.to_string(),
            ScriptedReply {
                result: Err(FetchError::Request {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                }),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn called(&self, url: &str) -> bool {
        self.calls().iter().any(|call| call == url)
    }

    pub(crate) fn probe_timeouts(&self) -> Vec<Duration> {
        self.probe_timeouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl MirrorTransport for ScriptedTransport {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult<ProbeOutcome> {
        self.calls.lock().unwrap().push(url.to_string());
        self.probe_timeouts.lock().unwrap().push(timeout);
        if self.panic_on_probe {
            panic!("probe task blew up for {url}");
        }
        let index = self.probe_count.fetch_add(1, Ordering::SeqCst);
        if index < self.systemic_probe_calls {
            return Err(ProbeError::Systemic("resolver offline".to_string()));
        }
        self.probes.get(url).cloned().unwrap_or_else(|| {
            Err(ProbeError::Connection {
                url: url.to_string(),
                message: "no route to host".to_string(),
            })
        })
    }

    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpReply, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let Some(scripted) = self.replies.get(url).cloned() else {
            return Err(FetchError::Request {
                url: url.to_string(),
                message: "no route to host".to_string(),
            });
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}
