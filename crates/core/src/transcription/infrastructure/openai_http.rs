use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use crate::transcription::domain::api_error::{ApiError, ErrorKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated blocking HTTP session against an OpenAI-compatible API.
pub struct OpenAiHttp {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiHttp {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub fn get(&self, endpoint: &str) -> reqwest::blocking::RequestBuilder {
        self.client.get(self.url(endpoint)).bearer_auth(&self.api_key)
    }

    pub fn post(&self, endpoint: &str) -> reqwest::blocking::RequestBuilder {
        self.client.post(self.url(endpoint)).bearer_auth(&self.api_key)
    }

    /// Lists models; the cheapest call that proves the key works.
    pub fn verify_credentials(&self) -> Result<(), ApiError> {
        let response = self.get("models").send().map_err(transport_error)?;
        check_status(response)?;
        log::info!("API credentials verified");
        Ok(())
    }
}

pub fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimit,
        _ => ErrorKind::GeneralApi,
    }
}

/// Network trouble is transient; a body we cannot decode is not.
pub fn transport_error(err: reqwest::Error) -> ApiError {
    let kind = if err.is_decode() {
        ErrorKind::Unexpected
    } else if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        ErrorKind::GeneralApi
    } else {
        ErrorKind::Unexpected
    };
    ApiError::new(kind, err.to_string())
}

/// Passes successful responses through and turns the rest into a
/// classified [`ApiError`], keeping the service's own message when present.
pub fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or(body);
    log::warn!("API returned {status}: {message}");
    Err(ApiError::new(
        classify_status(status),
        format!("HTTP {status}: {message}"),
    ))
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}
