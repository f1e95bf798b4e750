use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::{HttpSection, ProbeSection};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("probe of {url} timed out")]
    Timeout { url: String },
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("invalid probe url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("probe transport unusable: {0}")]
    Systemic(String),
}

impl ProbeError {
    /// True when the failure says nothing about the probed mirror itself.
    pub fn is_systemic(&self) -> bool {
        matches!(self, ProbeError::Systemic(_))
    }

    /// True when no connection could be opened at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ProbeError::Connection { .. })
    }
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub final_url: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

#[derive(Debug, Clone)]
pub struct HttpReply {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Network seam for everything that talks to mirrors or the directory.
#[async_trait]
pub trait MirrorTransport: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult<ProbeOutcome>;
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, FetchError>;
}

pub fn strip_trailing_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    connection_retries: u32,
}

impl ReqwestTransport {
    pub fn new(client: Client, connection_retries: u32) -> Self {
        Self {
            client,
            connection_retries,
        }
    }

    pub fn from_config(http: &HttpSection, probe: &ProbeSection) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(&http.user_agent).build()?;
        Ok(Self::new(client, probe.connection_retries))
    }

    /// Re-sends after connect errors only; timeouts and statuses are final.
    async fn with_connection_retries<T, F, Fut>(
        &self,
        url: &str,
        mut send: F,
    ) -> Result<T, reqwest::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, reqwest::Error>>,
    {
        let mut retries = 0u32;
        loop {
            match send().await {
                Err(err) if err.is_connect() && retries < self.connection_retries => {
                    retries += 1;
                    debug!(url, attempt = retries, error = %err, "retrying probe connection");
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl MirrorTransport for ReqwestTransport {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult<ProbeOutcome> {
        let (response, elapsed) = self
            .with_connection_retries(url, || {
                let request = self.client.get(url).timeout(timeout);
                async move {
                    let start = Instant::now();
                    let response = request.send().await?;
                    Ok((response, start.elapsed()))
                }
            })
            .await
            .map_err(|err| classify_probe_error(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(ProbeOutcome {
            final_url: strip_trailing_slash(response.url().as_str()),
            elapsed,
        })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpReply, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify_fetch_error(url, err))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|err| classify_fetch_error(url, err))?;
        Ok(HttpReply {
            url: final_url,
            status,
            body,
        })
    }
}

fn classify_probe_error(url: &str, err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_builder() {
        ProbeError::InvalidUrl {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        ProbeError::Connection {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

fn classify_fetch_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_every_trailing_slash() {
        assert_eq!(strip_trailing_slash("https://a.example/"), "https://a.example");
        assert_eq!(strip_trailing_slash("https://a.example//"), "https://a.example");
        assert_eq!(strip_trailing_slash("https://a.example"), "https://a.example");
    }

    #[test]
    fn reply_success_range() {
        let reply = |status| HttpReply {
            url: "https://a.example".into(),
            status,
            body: String::new(),
        };
        assert!(reply(200).is_success());
        assert!(reply(204).is_success());
        assert!(!reply(302).is_success());
        assert!(!reply(500).is_success());
    }

    #[test]
    fn only_systemic_errors_are_systemic() {
        assert!(ProbeError::Systemic("client gone".into()).is_systemic());
        assert!(!ProbeError::Timeout {
            url: "https://a.example".into()
        }
        .is_systemic());
    }

    fn refused_url() -> String {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_error() {
        let transport = ReqwestTransport::new(Client::new(), 2);
        let err = transport
            .probe(&refused_url(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_connection_failure());
        assert!(!err.is_systemic());
    }

    #[tokio::test]
    async fn connect_errors_are_resent_up_to_the_retry_limit() {
        let client = Client::new();
        let transport = ReqwestTransport::new(client.clone(), 3);
        let url = refused_url();
        let mut sends = 0;

        let result = transport
            .with_connection_retries(&url, || {
                sends += 1;
                client.get(&url).send()
            })
            .await;
        assert!(result.unwrap_err().is_connect());
        assert_eq!(sends, 4);
    }

    #[tokio::test]
    async fn timeouts_are_not_resent() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let client = Client::new();
        let transport = ReqwestTransport::new(client.clone(), 3);
        let mut sends = 0;

        let result = transport
            .with_connection_retries(&url, || {
                sends += 1;
                client.get(&url).timeout(Duration::from_millis(100)).send()
            })
            .await;
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(sends, 1);
        drop(listener);
    }
}
