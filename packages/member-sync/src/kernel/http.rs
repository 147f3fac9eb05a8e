//! Shared response handling for the vendor HTTP clients.

use reqwest::Response;

use super::ExternalServiceError;

/// Connection failures, timeouts and unreadable bodies never reached a decision
/// on the vendor side, so they are always transient.
pub(crate) fn transport_error(service: &'static str, error: reqwest::Error) -> ExternalServiceError {
    ExternalServiceError::transient(service, error.to_string())
}

/// Pass through a 2xx response, otherwise classify the status.
pub(crate) async fn ensure_success(
    service: &'static str,
    resp: Response,
) -> Result<Response, ExternalServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(ExternalServiceError::from_status(service, status.as_u16(), body))
}
