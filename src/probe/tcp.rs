//! TCP connect attempts

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;

use super::Attempt;
use crate::model::TcpProbe;

/// Try to open a connection within the probe's timeout
pub async fn attempt(probe: &TcpProbe) -> Attempt {
    let address = probe.address();
    let start = Instant::now();

    let result = timeout(
        Duration::from_secs(probe.timeout_secs),
        TcpStream::connect(&address),
    )
    .await;
    let response_time_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(_stream)) => Attempt {
            success: true,
            status_code: None,
            reason_phrase: None,
            response_time_ms,
            cert_days_remaining: None,
            message: format!("Connected to {address}"),
        },
        Ok(Err(e)) => Attempt::failed(
            response_time_ms,
            format!("connection to {address} failed: {e}"),
        ),
        Err(_) => Attempt::failed(
            response_time_ms,
            format!(
                "connection to {address} timed out after {}s",
                probe.timeout_secs
            ),
        ),
    }
}
