//! HTTP plumbing shared by the ACS and `TIGERweb` fetchers.
//!
//! Every request goes through [`fetch_json_with_retry`], which retries
//! transport failures, 5xx and 429 responses and `ArcGIS` error envelopes
//! with exponential backoff. Other 4xx responses fail immediately since a
//! bad variable list or API key will not fix itself.

use std::time::Duration;

use crate::GeoError;

/// Maximum attempts per request.
pub const MAX_RETRIES: u32 = 5;

/// Page size for `TIGERweb` paginated requests. Kept low to avoid WAF
/// blocks on large geospatial responses.
pub const TIGERWEB_PAGE_SIZE: u32 = 100;

/// Browser-like User-Agent to avoid WAF blocks on `TIGERweb`.
const USER_AGENT: &str = "Mozilla/5.0 (compatible; DiridonAtlas/0.1)";

/// Builds a `reqwest::Client` for Census endpoints.
///
/// # Errors
///
/// Returns [`GeoError`] if the client cannot be built.
pub fn build_client() -> Result<reqwest::Client, GeoError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(Into::into)
}

/// Truncates a string for logging, appending "..." if it exceeds `max_len`.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Whether a non-success status is worth retrying.
fn is_transient(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status.as_u16() == 429
}

/// Fetches `url` and parses the body as JSON, retrying transient failures
/// up to `max_retries` times with exponential backoff (2s, 4s, 8s, ...).
///
/// # Errors
///
/// Returns [`GeoError::Request`] when retries are exhausted or the server
/// answers with a non-transient error status.
pub async fn fetch_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    label: &str,
    max_retries: u32,
) -> Result<serde_json::Value, GeoError> {
    let mut last_error = String::new();

    for attempt in 0..max_retries {
        if attempt > 0 {
            let delay_secs = 1u64 << attempt;
            log::warn!("{label}: retry {attempt}/{max_retries} in {delay_secs}s...");
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }

        let resp = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = format!("HTTP request error: {e}");
                log::warn!("{label} (attempt {attempt}): {last_error}");
                continue;
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                last_error = format!("Failed to read response body: {e}");
                log::warn!("{label} (attempt {attempt}): {last_error}");
                continue;
            }
        };

        if !status.is_success() {
            last_error = format!("HTTP {status}: {}", truncate_for_log(&body, 500));
            if is_transient(status) {
                log::warn!("{label} (attempt {attempt}): {last_error}");
                continue;
            }
            return Err(GeoError::Request {
                label: label.to_string(),
                message: last_error,
            });
        }

        let json: serde_json::Value = match serde_json::from_str(&body) {
            Ok(j) => j,
            Err(e) => {
                last_error = format!("JSON parse error: {e}");
                log::warn!(
                    "{label} (attempt {attempt}): {last_error}. Response body: {}",
                    truncate_for_log(&body, 500)
                );
                continue;
            }
        };

        // ArcGIS reports failures in a 200 body: {"error": {"code": 500, "message": "..."}}
        if let Some(error_obj) = json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            let msg = error_obj
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            last_error = format!("ArcGIS error {code}: {msg}");
            log::warn!("{label} (attempt {attempt}): {last_error}");
            continue;
        }

        log::debug!("{label}: {} bytes", body.len());
        return Ok(json);
    }

    Err(GeoError::Request {
        label: label.to_string(),
        message: format!("failed after {max_retries} attempts: {last_error}"),
    })
}

/// Fetches all features from a `TIGERweb` `ArcGIS` REST query using
/// `resultOffset` + `resultRecordCount` pagination.
///
/// `base_url` carries every query parameter except the two paging ones.
/// Pages are requested until the server stops setting
/// `exceededTransferLimit`.
///
/// # Errors
///
/// Returns [`GeoError`] if any page fails after retries or lacks a
/// `features` array.
pub async fn fetch_tigerweb_paginated(
    client: &reqwest::Client,
    base_url: &str,
    label: &str,
) -> Result<Vec<serde_json::Value>, GeoError> {
    let mut all_features: Vec<serde_json::Value> = Vec::new();
    let mut offset = 0u32;

    loop {
        let sep = if base_url.contains('?') { '&' } else { '?' };
        let url =
            format!("{base_url}{sep}resultRecordCount={TIGERWEB_PAGE_SIZE}&resultOffset={offset}");
        let page_label = format!("{label} (offset={offset})");

        let mut json = fetch_json_with_retry(client, &url, &page_label, MAX_RETRIES).await?;

        let features = match json.get_mut("features").map(serde_json::Value::take) {
            Some(serde_json::Value::Array(features)) => features,
            _ => {
                return Err(GeoError::Conversion {
                    message: format!("No features array in TIGERweb response for {page_label}"),
                });
            }
        };

        if features.is_empty() {
            break;
        }

        #[allow(clippy::cast_possible_truncation)]
        let page_len = features.len() as u32;
        all_features.extend(features);

        let exceeded = json
            .get("exceededTransferLimit")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if !exceeded {
            break;
        }

        offset += page_len;
        log::info!(
            "{label}: fetched {page_len} features (total so far: {}), fetching next page...",
            all_features.len()
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(all_features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("José", 4), "Jos...");
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient(reqwest::StatusCode::BAD_GATEWAY));
        assert!(is_transient(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_transient(reqwest::StatusCode::UNAUTHORIZED));
    }
}
