//! Capability prober - finds the resource length and range support
//!
//! Uses HEAD first, then falls back to a one-byte ranged GET when HEAD
//! does not report a length.

use crate::error::ParfetchError;
use parfetch_types::ProbeResult;
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

/// Probe `url` with a metadata-only request
pub async fn probe(client: &Client, url: &str) -> Result<ProbeResult, ParfetchError> {
    let parsed = url::Url::parse(url).map_err(|_| ParfetchError::InvalidUrl(url.to_string()))?;
    info!("Probing URL: {}", parsed);

    let response = client.head(parsed.as_str()).send().await?;
    let status = response.status();
    let headers = response.headers();

    let final_url = response.url().to_string();
    let final_url = (final_url != parsed.as_str()).then_some(final_url);

    let mut result = if status.is_success() {
        ProbeResult {
            url: url.to_string(),
            final_url,
            content_length: header_u64(headers, CONTENT_LENGTH),
            supports_ranges: accepts_byte_ranges(headers),
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        }
    } else {
        // Some servers refuse HEAD outright; a ranged GET can still answer.
        warn!("HEAD {} returned {}", parsed, status);
        ProbeResult {
            url: url.to_string(),
            final_url,
            content_length: None,
            supports_ranges: false,
            content_type: None,
        }
    };

    if result.content_length.is_none() {
        probe_with_ranged_get(client, &mut result).await;
    }

    debug!(
        "Probe result for {}: length={:?} ranges={}",
        result.url, result.content_length, result.supports_ranges
    );
    Ok(result)
}

/// Ask for the first byte only. A 206 proves range support and carries the
/// total in `Content-Range`; a 200 means the server ignores ranges.
async fn probe_with_ranged_get(client: &Client, result: &mut ProbeResult) {
    let url = result.effective_url().to_string();
    info!("HEAD didn't return Content-Length, trying partial GET on {}", url);

    let response = match client.get(&url).header(RANGE, "bytes=0-0").send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Partial GET probe failed: {} - continuing without size info", e);
            return;
        }
    };

    match response.status() {
        StatusCode::PARTIAL_CONTENT => {
            result.supports_ranges = true;
            result.content_length = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(total_from_content_range);
        }
        StatusCode::OK => {
            result.supports_ranges = false;
            result.content_length = header_u64(response.headers(), CONTENT_LENGTH);
        }
        other => debug!("Partial GET probe returned {}", other),
    }
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').any(|unit| unit.trim().eq_ignore_ascii_case("bytes")))
        .unwrap_or(false)
}

fn header_u64(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Total size from `Content-Range: bytes 0-0/12345`; `*` means unknown
fn total_from_content_range(value: &str) -> Option<u64> {
    match value.rsplit('/').next()?.trim() {
        "*" => None,
        total => total.parse().ok(),
    }
}
