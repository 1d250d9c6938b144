//! Upload handler: multipart intake for CSV and Excel files.

use super::UploadAccepted;
use crate::api::AppState;
use crate::config::Config;
use crate::error::{Error, ValidationError};
use crate::orchestrator::UploadRequest;
use crate::types::TaskStatus;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
};

/// Map a multipart read failure onto a validation error
fn multipart_error(e: MultipartError, config: &Config) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::UploadLimitExceeded {
            max_mb: config.processing.max_file_size_mb,
        }
        .into()
    } else {
        ValidationError::MalformedUpload(e.body_text()).into()
    }
}

async fn read_text(field: Field<'_>, config: &Config) -> Result<String, Error> {
    field.text().await.map_err(|e| multipart_error(e, config))
}

/// Form fields of an upload, before any of them is required
#[derive(Default)]
struct UploadForm {
    client_id: Option<String>,
    business_name: Option<String>,
    filename: Option<String>,
    content: Option<Vec<u8>>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart, config: &Config) -> Result<Self, Error> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, config))?
        {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                "client_id" | "cliente" => form.client_id = Some(read_text(field, config).await?),
                "business_name" | "numero_cliente" => {
                    form.business_name = Some(read_text(field, config).await?)
                }
                "file" => {
                    form.filename = field.file_name().map(str::to_string);
                    let bytes = field.bytes().await.map_err(|e| multipart_error(e, config))?;
                    form.content = Some(bytes.to_vec());
                }
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    fn into_request(self) -> Result<UploadRequest, ValidationError> {
        let missing = |field: &str| ValidationError::MissingField {
            field: field.to_string(),
        };

        Ok(UploadRequest {
            client_id: self.client_id.ok_or_else(|| missing("client_id"))?,
            business_name: self.business_name.ok_or_else(|| missing("business_name"))?,
            content: self.content.ok_or_else(|| missing("file"))?,
            filename: self.filename,
        })
    }
}

/// POST /bulk-load-data/file - Upload a CSV or Excel file
///
/// Returns as soon as the task is queued; rows are forwarded in the background.
#[utoipa::path(
    post,
    path = "/bulk-load-data/file",
    tag = "bulk-load",
    request_body(content = Vec<u8>, description = "Form with `client_id`, `business_name` and a `file` part (multipart/form-data)", content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "File accepted and queued", body = UploadAccepted),
        (status = 400, description = "Missing field, missing filename or unsupported format", body = crate::error::ApiError),
        (status = 413, description = "File exceeds the configured size limit", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAccepted>), Error> {
    let form = UploadForm::read(&mut multipart, &state.config).await?;
    let request = form.into_request()?;

    let client_id = request.client_id.clone();
    let business_name = request.business_name.clone();
    let filename = request.filename.clone().unwrap_or_default();
    let size_bytes = request.content.len();

    let task_id = state.orchestrator.submit(request).await?;

    tracing::info!(
        task_id = %task_id,
        client_id = %client_id,
        business_name = %business_name,
        filename = %filename,
        size_bytes,
        "file received"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadAccepted {
            task_id,
            status: TaskStatus::Queued,
            message: "File received, processing in background".to_string(),
            client_id,
            business_name,
            filename,
        }),
    ))
}
