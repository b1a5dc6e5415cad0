//! VAST document retrieval.
//!
//! There is deliberately no retry layer here: a failed fetch surfaces as an
//! error, and the caller decides whether to offer a manual retry.

use crate::error::{AdError, Result};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::path::Path;
use std::time::Duration;

/// Timeout for a single VAST document request
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Short random id used to correlate log lines for one request
pub(crate) fn request_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

/// Fetch VAST content from a URL or a local file path.
///
/// `file://` URIs and plain paths read from disk; anything else is treated
/// as a web URL.
pub async fn fetch_vast(url_or_path: &str) -> Result<String> {
    if let Some(path) = url_or_path.strip_prefix("file://") {
        log::debug!("Reading VAST from file: {path}");
        return Ok(tokio::fs::read_to_string(path).await?);
    }

    if Path::new(url_or_path).exists() {
        log::debug!("Reading VAST from local file: {url_or_path}");
        return Ok(tokio::fs::read_to_string(url_or_path).await?);
    }

    fetch_from_url(url_or_path).await
}

/// Fetch VAST XML from a web URL
async fn fetch_from_url(url: &str) -> Result<String> {
    let req_id = request_id();
    let url = url::Url::parse(url)?;

    log::debug!("[{req_id}] Fetching VAST from {url}");
    let start_time = std::time::Instant::now();

    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| AdError::Fetch(format!("Failed to build HTTP client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        log::warn!(
            "[{req_id}] VAST request failed after {:?}",
            start_time.elapsed()
        );
        AdError::Fetch(format!("Failed to fetch URL: {e}"))
    })?;

    if !response.status().is_success() {
        return Err(AdError::Fetch(format!(
            "Failed to fetch URL: HTTP status {}",
            response.status()
        )));
    }

    let xml_content = response
        .text()
        .await
        .map_err(|e| AdError::Fetch(format!("Failed to read response body: {e}")))?;

    log::debug!(
        "[{req_id}] Fetched {} bytes in {:?}",
        xml_content.len(),
        start_time.elapsed()
    );

    Ok(xml_content)
}
