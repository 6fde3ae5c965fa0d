//! Certificate expiry capture
//!
//! The client is built with `tls_info(true)`, which attaches the peer's leaf
//! certificate (DER) to every response. Its `notAfter` is converted to whole
//! days remaining, truncated toward zero, so a certificate expiring in 36 hours
//! reports 1 and an expired one reports a negative number.

use chrono::{DateTime, Utc};
use tracing::warn;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Days until the certificate presented on `response` expires
pub fn days_remaining_from_response(response: &reqwest::Response, now: DateTime<Utc>) -> Option<i64> {
    let tls_info = response.extensions().get::<reqwest::tls::TlsInfo>()?;
    let der = tls_info.peer_certificate()?;

    let not_after = not_after_from_der(der)?;
    Some(days_until(not_after, now))
}

/// Parse the `notAfter` field from a DER-encoded certificate
pub fn not_after_from_der(der: &[u8]) -> Option<DateTime<Utc>> {
    match X509Certificate::from_der(der) {
        Ok((_, cert)) => DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0),
        Err(e) => {
            warn!("failed to parse peer certificate: {e}");
            None
        }
    }
}

pub fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    not_after.signed_duration_since(now).num_days()
}
