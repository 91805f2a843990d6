//! Metadata retrieval and the HTTP seam used for every network call.

use crate::config::{Config, Http};
use crate::error::{Result, RipError};
use regex::Regex;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Blocking HTTP access. Implemented by [`ReqwestClient`] and by fakes in
/// tests.
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the whole body as text.
    fn get_text(&self, url: &str) -> Result<String>;

    /// GET `url` and hand back the body as a stream. Non-success statuses
    /// are reported as [`RipError::Network`] before any body is read.
    fn get_stream(&self, url: &str) -> Result<Box<dyn Read + Send>>;
}

#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(http: &Http) -> Result<Self> {
        let timeout = (http.timeout_seconds > 0).then(|| Duration::from_secs(http.timeout_seconds));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(http.user_agent.clone())
            .build()
            .map_err(|e| RipError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| RipError::network(url, e))?;
        if !response.status().is_success() {
            return Err(RipError::network(url, format!("HTTP {}", response.status())));
        }
        Ok(response)
    }
}

impl HttpClient for ReqwestClient {
    fn get_text(&self, url: &str) -> Result<String> {
        self.send(url)?
            .text()
            .map_err(|e| RipError::network(url, format!("reading body: {e}")))
    }

    fn get_stream(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.send(url)?))
    }
}

pub fn metadata_url(base_url: &str, image: &str) -> String {
    format!("{base_url}{image}.svs/view.apml")
}

/// Pulls the pixel dimensions of an image out of its viewer page.
///
/// The patterns are compiled once and reused for every job.
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    base_url: String,
    height: Regex,
    width: Regex,
}

impl MetadataFetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_patterns(
            &cfg.source.base_url,
            &cfg.metadata.height_pattern,
            &cfg.metadata.width_pattern,
        )
    }

    pub fn with_patterns(base_url: &str, height_pattern: &str, width_pattern: &str) -> Result<Self> {
        let compile = |name: &str, p: &str| {
            Regex::new(p).map_err(|e| RipError::Config(format!("{name} pattern {p:?}: {e}")))
        };
        Ok(Self {
            base_url: base_url.to_string(),
            height: compile("height", height_pattern)?,
            width: compile("width", width_pattern)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns `(width, height)`.
    pub fn fetch(&self, client: &dyn HttpClient, image: &str) -> Result<(u32, u32)> {
        let url = metadata_url(&self.base_url, image);
        debug!("fetching metadata {url}");
        let page = client.get_text(&url)?;
        self.parse(&page)
    }

    pub fn parse(&self, page: &str) -> Result<(u32, u32)> {
        let height = extract(&self.height, page, "height")?;
        let width = extract(&self.width, page, "width")?;
        Ok((width, height))
    }
}

fn extract(re: &Regex, page: &str, field: &str) -> Result<u32> {
    let raw = re
        .captures(page)
        .and_then(|c| c.get(1))
        .ok_or_else(|| RipError::Parse(format!("no {field} field in metadata page")))?;
    raw.as_str()
        .parse::<u32>()
        .map_err(|e| RipError::Parse(format!("{field} {:?}: {e}", raw.as_str())))
}
