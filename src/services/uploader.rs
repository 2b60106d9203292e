use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::models::job::{DeliveryJob, UploadOutcome};
use crate::services::artifact::ArtifactStore;

/// Performs one multipart POST per scheduler attempt and classifies the
/// result. Retry timing lives entirely in the scheduler; this type never
/// retries internally.
pub struct UploadExecutor {
    http: Client,
    endpoint_url: String,
    store: ArtifactStore,
}

impl UploadExecutor {
    pub fn new(
        endpoint_url: impl Into<String>,
        timeout: Duration,
        store: ArtifactStore,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint_url: endpoint_url.into(),
            store,
        })
    }

    pub async fn execute(&self, job: &DeliveryJob) -> UploadOutcome {
        // A job missing required fields is unrepairable: clean up and bail
        // before any network I/O so it can never loop through retries.
        for (name, value) in job.required_fields() {
            if value.is_empty() {
                tracing::error!(job_id = %job.id, field = name, "job missing required field");
                self.cleanup(job);
                return UploadOutcome::PermanentFailure;
            }
        }

        let form = match self.build_form(job) {
            Ok(form) => form,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "failed to assemble upload request");
                self.cleanup(job);
                return UploadOutcome::PermanentFailure;
            }
        };

        tracing::debug!(job_id = %job.id, url = %self.endpoint_url, "posting event upload");

        let response = match self.http.post(&self.endpoint_url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "upload transport error, will retry");
                return UploadOutcome::Retry;
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            tracing::info!(job_id = %job.id, %status, body = %body, "upload succeeded");
            self.cleanup(job);
            UploadOutcome::Success
        } else if status.is_server_error() {
            tracing::warn!(job_id = %job.id, %status, body = %body, "server error, will retry");
            UploadOutcome::Retry
        } else {
            tracing::error!(job_id = %job.id, %status, body = %body, "upload rejected, dropping job");
            self.cleanup(job);
            UploadOutcome::PermanentFailure
        }
    }

    /// Build the multipart body. The image is re-read from disk on every
    /// attempt; a path that no longer resolves to a regular file drops the
    /// image from the request instead of failing the job.
    fn build_form(&self, job: &DeliveryJob) -> Result<Form, reqwest::Error> {
        let mut form = Form::new();
        for (name, value) in job.required_fields() {
            form = form.text(name, value.to_string());
        }

        if let Some(path) = &job.image_path {
            if path.is_file() {
                match std::fs::read(path) {
                    Ok(bytes) => {
                        let file_name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "event_image.png".to_string());
                        let part = Part::bytes(bytes)
                            .file_name(file_name)
                            .mime_str(&media_type(path))?;
                        form = form.part("eventImage", part);
                    }
                    Err(e) => {
                        tracing::warn!(
                            job_id = %job.id,
                            path = %path.display(),
                            error = %e,
                            "could not read event image, uploading without it"
                        );
                    }
                }
            } else {
                tracing::warn!(
                    job_id = %job.id,
                    path = %path.display(),
                    "event image missing on disk, uploading without it"
                );
            }
        }

        Ok(form)
    }

    fn cleanup(&self, job: &DeliveryJob) {
        if let Some(path) = &job.image_path {
            self.store.delete(path);
        }
    }
}

/// Media type inferred from the file extension: `image/<ext>`, `image/png`
/// when there is no extension, generic binary when the extension cannot form
/// a valid type.
fn media_type(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        None => "image/png".to_string(),
        Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("image/{}", ext.to_ascii_lowercase())
        }
        Some(_) => "application/octet-stream".to_string(),
    }
}
