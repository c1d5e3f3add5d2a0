//! Warm-up probe against the service health endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::endpoint::health_url;

/// Whether a health response means the service is reachable.
///
/// A 404 counts as up: the host answered, it just has no health route.
#[must_use]
pub fn service_is_up(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_FOUND
}

/// Issue `GET {base}/health` and report whether the service is up.
///
/// Never fails: any error is logged and reported as `false`.
#[tracing::instrument(skip_all)]
pub async fn probe_health(http: &reqwest::Client, base_url: &str, timeout: Duration) -> bool {
    let url = match health_url(base_url) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "cannot build health url");
            return false;
        }
    };

    match http.get(url.clone()).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status();
            let up = service_is_up(status);
            if up {
                info!(%url, status = status.as_u16(), "service reachable");
            } else {
                warn!(%url, status = status.as_u16(), "service health check failed");
            }
            up
        }
        Err(e) => {
            warn!(%url, error = %e, "health request failed");
            false
        }
    }
}
