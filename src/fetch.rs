//! The fetch module wraps the HTTP client shared by the scrape and posters commands.

use anyhow::{Context, Result};
use log::debug;
use rate_guard::{RateLimit, StdTokenBucket, TokenBucketBuilder};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use crate::constants::{REDIRECT_LIMIT, REQUEST_TIMEOUT_SECS, USER_AGENT};

/// HTTP client with an optional requests-per-minute limit.
pub struct Fetcher {
    client: reqwest::Client,
    rate_limiter: Option<StdTokenBucket>,
}

impl Fetcher {
    /// Creates a fetcher. `rpm` caps requests per minute, `None` means no limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(rpm: Option<u32>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(REDIRECT_LIMIT))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            rate_limiter: rpm.and_then(build_rate_limiter),
        })
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a non-success status.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body of {url}"))
    }

    /// Fetches a binary body together with its `Content-Type`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a non-success status.
    pub async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body of {url}"))?;

        Ok((bytes.to_vec(), content_type))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.throttle().await;
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "HTTP {status} for {url}");

        Ok(response)
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            while limiter.try_acquire(1).is_err() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

fn build_rate_limiter(rpm: u32) -> Option<StdTokenBucket> {
    let capacity = rpm.max(1) as u64;
    let refill_interval = Duration::from_secs_f64(60.0 / capacity as f64);

    TokenBucketBuilder::builder()
        .capacity(capacity)
        .refill_amount(1_u64)
        .refill_every(refill_interval)
        .with_time(rate_guard::StdTimeSource::new())
        .with_precision::<rate_guard::Nanos>()
        .build()
        .ok()
}
