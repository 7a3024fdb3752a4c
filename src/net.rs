//! Shared HTTP plumbing for reverse geocoding, image upload, and transmit.

use reqwest::RequestBuilder;
use reqwest::header;

pub const USER_AGENT: &str = concat!("postermap/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server answered with status {0}")]
    Status(u16),
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Tag a request with this crate's user agent. Nominatim rejects anonymous clients.
pub fn identified(req: RequestBuilder) -> RequestBuilder {
    req.header(header::USER_AGENT, USER_AGENT)
}

/// Fail on any non-2xx response.
pub fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, NetworkError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(NetworkError::Status(status.as_u16()))
    }
}
