use crate::errors::UploadError;
use crate::staging::{StagedImage, STAGED_FILE_NAME};
use crate::types::CropType;
use std::error::Error as _;
use std::time::Duration;

/// Default request timeout; classification runs server-side and can be slow
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// HTTP client for the classification endpoint
#[derive(Debug, Clone)]
pub struct CropUploadClient {
    endpoint_url: String,
    client: reqwest::Client,
}

impl CropUploadClient {
    /// Create a client with the default timeout
    pub fn new(endpoint_url: String) -> Self {
        Self::with_timeout(endpoint_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client with a custom total request timeout
    pub fn with_timeout(endpoint_url: String, timeout: Duration) -> Self {
        // Include version in User-Agent header for tracking
        let version = env!("CARGO_PKG_VERSION");
        let user_agent = format!("CropDiagnosisUploader/{}", version);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .or_else(|e| {
                tracing::warn!(
                    error = %e,
                    "Failed to build HTTP client, retrying without User-Agent"
                );
                reqwest::Client::builder().timeout(timeout).build()
            })
            .unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    timeout_secs = timeout.as_secs_f64(),
                    "Failed to build HTTP client, requests will not time out"
                );
                reqwest::Client::new()
            });

        Self {
            endpoint_url,
            client,
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Send the staged image and crop in one multipart POST
    ///
    /// Returns the raw response body on a 2xx status. Never retries.
    pub async fn upload(
        &self,
        staged: &StagedImage,
        crop: CropType,
    ) -> Result<String, UploadError> {
        let url = reqwest::Url::parse(&self.endpoint_url)
            .map_err(|e| UploadError::Transport(format!("Invalid endpoint URL: {}", e)))?;

        let image_file = staged.open().await?;
        let form = build_form(reqwest::Body::from(image_file), staged.size(), crop)?;

        tracing::info!(url = %url, crop = %crop, bytes = staged.size(), "Sending upload request");

        let response = self.client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(describe_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let reason = reason_phrase(&response);
            tracing::warn!(status = status.as_u16(), reason = %reason, "Server rejected upload");
            return Err(UploadError::Server(reason));
        }

        let body = response
            .text()
            .await
            .map_err(describe_transport_error)?;

        tracing::info!(status = status.as_u16(), "Upload accepted");
        Ok(body)
    }
}

/// Multipart body: `image` file part followed by `crop` text part
fn build_form(
    image: reqwest::Body,
    image_len: u64,
    crop: CropType,
) -> Result<reqwest::multipart::Form, UploadError> {
    let image_part = reqwest::multipart::Part::stream_with_length(image, image_len)
        .file_name(STAGED_FILE_NAME)
        .mime_str("image/*")
        .map_err(|e| UploadError::Transport(format!("Invalid image content type: {}", e)))?;

    let crop_part = reqwest::multipart::Part::text(crop.as_str())
        .mime_str("text/plain")
        .map_err(|e| UploadError::Transport(format!("Invalid crop content type: {}", e)))?;

    Ok(reqwest::multipart::Form::new()
        .part("image", image_part)
        .part("crop", crop_part))
}

/// Reason phrase as sent by the server
///
/// hyper only keeps the wire phrase when it differs from the canonical one,
/// so fall back to the canonical phrase and then to the numeric code.
fn reason_phrase(response: &reqwest::Response) -> String {
    let status = response.status();
    let sent = response
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).trim().to_string())
        .filter(|phrase| !phrase.is_empty());

    sent.or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.as_u16().to_string())
}

/// Flatten a reqwest error and its causes into one line
fn describe_transport_error(err: reqwest::Error) -> UploadError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() {
        message = format!("Request timed out: {}", message);
    }

    tracing::error!(error = %message, "Upload request failed");
    UploadError::Transport(message)
}
