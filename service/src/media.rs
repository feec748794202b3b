//! Media-store collaborator: fetches WAV blobs by id.

use std::io::Read;
use std::time::Duration;

use crate::config::Settings;
use crate::errors::{ServiceError, ServiceResult};

/// Hard ceiling on a fetched blob; a PCG clip should be far under this.
const MAX_BLOB_BYTES: u64 = 64 * 1024 * 1024;

pub struct MediaClient {
    base: String,
    agent: ureq::Agent,
}

impl MediaClient {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            base: settings.media_base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(settings.http_timeout_secs))
                .build(),
        }
    }

    /// `GET {base}/file/{media_id}`, with the caller's Authorization header
    /// passed through when present.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Media`] for any transport or HTTP failure.
    pub fn fetch(&self, media_id: &str, auth: Option<&str>) -> ServiceResult<Vec<u8>> {
        if media_id.is_empty() {
            return Err(ServiceError::Media("missing media id".into()));
        }
        let url = format!("{}/file/{media_id}", self.base);
        let mut request = self.agent.get(&url);
        if let Some(header) = auth {
            request = request.set("Authorization", header);
        }
        let response = request.call().map_err(convert_error)?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BLOB_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| ServiceError::Media(e.to_string()))?;
        Ok(bytes)
    }
}

fn convert_error(e: ureq::Error) -> ServiceError {
    match e {
        ureq::Error::Status(code, _) => ServiceError::Media(format!("media fetch failed: {code}")),
        other => ServiceError::Media(other.to_string()),
    }
}
