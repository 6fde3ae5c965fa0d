//! HTTP/HTTPS attempts
//!
//! One client is built per check cycle from the monitor definition (timeout,
//! redirect limit, TLS leniency) and reused across that cycle's attempts.
//! Success is a status code in `[200, 299]`; the history message is
//! `"<code> - <reason>"`.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;

use super::{Attempt, ProbeError, cert};
use crate::model::{HttpProbe, MonitorId};

const USER_AGENT: &str = concat!("uptime-mesh/", env!("CARGO_PKG_VERSION"));

/// Build the client used for every attempt of one check cycle
pub fn build_client(monitor_id: MonitorId, probe: &HttpProbe) -> Result<reqwest::Client, ProbeError> {
    let redirect = if probe.max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(probe.max_redirects as usize)
    };

    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(probe.timeout_secs))
        .redirect(redirect)
        .user_agent(USER_AGENT);

    // Expiry capture must see the certificate even when the chain would be rejected
    if probe.check_cert_expiry || probe.ignore_tls_errors {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if probe.check_cert_expiry {
        builder = builder.tls_info(true);
    }

    builder.build().map_err(|e| {
        ProbeError::configuration(monitor_id, format!("failed to build http client: {e}"))
    })
}

/// Default headers plus the monitor's own, validated once per cycle
pub fn build_headers(monitor_id: MonitorId, probe: &HttpProbe) -> Result<HeaderMap, ProbeError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    for (name, value) in &probe.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ProbeError::configuration(monitor_id, format!("invalid header name '{name}'"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            ProbeError::configuration(
                monitor_id,
                format!("invalid value for header '{}'", name.as_str()),
            )
        })?;
        headers.append(name, value);
    }

    if probe.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    Ok(headers)
}

/// Perform a single request
pub async fn attempt(client: &reqwest::Client, probe: &HttpProbe, headers: &HeaderMap) -> Attempt {
    let mut request = client
        .request(probe.method.into(), &probe.url)
        .headers(headers.clone());

    if let Some(body) = &probe.body {
        request = request.body(body.clone());
    }

    let start = Instant::now();
    let result = request.send().await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(response) => {
            let status = response.status();
            let reason = status.canonical_reason().unwrap_or("Unknown");

            let cert_days_remaining = if probe.check_cert_expiry {
                cert::days_remaining_from_response(&response, Utc::now())
            } else {
                None
            };

            Attempt {
                success: status.is_success(),
                status_code: Some(status.as_u16()),
                reason_phrase: Some(reason.to_string()),
                response_time_ms,
                cert_days_remaining,
                message: format!("{} - {}", status.as_u16(), reason),
            }
        }
        Err(e) => Attempt::failed(response_time_ms, describe_error(&e)),
    }
}

fn describe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_redirect() {
        format!("too many redirects: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    }
}
