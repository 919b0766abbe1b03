//! Check that a staged file is publicly fetchable before asking the graph
//! API to fetch it

use reqwest::header::{HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, warn};

/// HEAD the URL, then issue a GET for diagnostics
///
/// The URL counts as reachable when HEAD answers 200 and the follow-up GET
/// gets any HTTP response at all. The GET body is never read.
pub async fn is_reachable(http: &reqwest::Client, url: &str) -> bool {
    debug!(%url, "Testing URL accessibility");

    let head = match http.head(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(%url, "HEAD request failed: {}", e);
            return false;
        }
    };

    if head.status() != StatusCode::OK {
        warn!(%url, status = head.status().as_u16(), "URL not accessible");
        return false;
    }

    debug!(
        content_type = %header_value(head.headers(), CONTENT_TYPE),
        content_length = %header_value(head.headers(), CONTENT_LENGTH),
        "HEAD ok"
    );

    match http.get(url).send().await {
        Ok(response) => {
            debug!(status = response.status().as_u16(), "GET probe");
            true
        }
        Err(e) => {
            warn!(%url, "GET request failed: {}", e);
            false
        }
    }
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
