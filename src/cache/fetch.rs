//! Artifact download
//!
//! The cache talks to the network through the [`Fetcher`] trait so tests can
//! substitute an in-memory source.

use crate::error::{KamajiError, KamajiResult};
use std::io::Read;
use tracing::debug;

/// Source of raw artifact bytes
pub trait Fetcher: Send + Sync {
    /// Open a stream over the artifact at `url`
    fn open(&self, url: &str) -> KamajiResult<Box<dyn Read>>;
}

/// HTTP(S) fetcher backed by `ureq`
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn open(&self, url: &str) -> KamajiResult<Box<dyn Read>> {
        debug!("GET {}", url);
        // Non-2xx statuses surface as errors from call()
        let resp = ureq::get(url).call().map_err(|e| KamajiError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(resp.into_body().into_reader()))
    }
}
