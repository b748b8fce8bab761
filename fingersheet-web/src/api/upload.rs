//! Sheet upload handler
//!
//! A request moves through validation, processing and the response. Client
//! mistakes and processing failures both end in a redirect to `/` with a
//! flash message; only a successful run returns the annotated file.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Router,
};
use fingersheet_common::config::UploadFolderInitializer;
use fingersheet_common::AppConfig;
use fingersheet_engine::{content_type, ProcessedSheet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::flash::push_flash;
use crate::{ApiError, ApiResult, AppState};

pub const MSG_NO_FILE_PART: &str = "No file part";
pub const MSG_NO_SELECTED_FILE: &str = "No selected file";
pub const MSG_INVALID_FORMAT: &str =
    "Invalid file format. Please upload a valid PDF, JPG, or MusicXML file.";
pub const MSG_PROCESSED: &str =
    "File processed successfully! Download the modified sheet music with finger positions.";

/// File part of the form
#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub skill_level: Option<String>,
}

/// How processing ended
#[derive(Debug)]
pub enum UploadOutcome {
    /// Processing error message
    Failed(String),
    Processed(ProcessedSheet),
}

/// Reduce a client filename to a safe single path component
///
/// Path separators become word breaks, whitespace runs become `_`, and only
/// ASCII letters, digits, `_`, `.` and `-` survive. Leading and trailing
/// dots and underscores are stripped, so the result is never `.` or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

async fn read_form(multipart: &mut Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            // Parts without a filename parameter are not file parts
            "file" => {
                if let Some(filename) = field.file_name().map(str::to_string) {
                    let data = field.bytes().await?;
                    form.file = Some(UploadedFile { filename, data });
                }
            }
            "skill_level" => form.skill_level = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

/// Check the file part; returns it with its sanitized name
pub fn validate_upload(
    config: &AppConfig,
    file: Option<UploadedFile>,
) -> Result<(UploadedFile, String), &'static str> {
    let file = file.ok_or(MSG_NO_FILE_PART)?;
    if file.filename.is_empty() {
        return Err(MSG_NO_SELECTED_FILE);
    }
    if !config.is_allowed_file(&file.filename) {
        return Err(MSG_INVALID_FORMAT);
    }
    let safe_name = sanitize_filename(&file.filename);
    if safe_name.is_empty() {
        return Err(MSG_INVALID_FORMAT);
    }
    Ok((file, safe_name))
}

/// Run the pipeline on the blocking pool, bounded by the configured timeout
async fn process_upload(state: &AppState, path: PathBuf, skill_level: String) -> ApiResult<UploadOutcome> {
    let processor = Arc::clone(&state.processor);
    let limit = state.config.processing_timeout;
    let task = tokio::task::spawn_blocking(move || processor.process(&path, &skill_level));

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(Ok(sheet))) => Ok(UploadOutcome::Processed(sheet)),
        Ok(Ok(Err(e))) => Ok(UploadOutcome::Failed(e.to_string())),
        Ok(Err(join_error)) => Err(ApiError::Internal(format!("processing task failed: {}", join_error))),
        // The blocking task keeps running; its output file is simply unused
        Err(_) => Ok(UploadOutcome::Failed(format!("processing timed out after {:?}", limit))),
    }
}

fn redirect_home(cookie: HeaderValue) -> Response {
    ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

async fn attachment(sheet: &ProcessedSheet, cookie: HeaderValue) -> ApiResult<Response> {
    let data = tokio::fs::read(&sheet.output_path).await?;
    let name = sheet
        .output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .map_err(|e| ApiError::Internal(format!("bad download name '{}': {}", name, e)))?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(content_type(&sheet.output_path))),
            (CONTENT_DISPOSITION, disposition),
            (SET_COOKIE, cookie),
        ],
        data,
    )
        .into_response())
}

/// POST /upload
///
/// Multipart fields: `file` and `skill_level`.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Unreadable upload body: {}", e);
            return Ok(e.into_response());
        }
    };
    let secret = &state.config.secret_key;

    let (file, safe_name) = match validate_upload(&state.config, form.file) {
        Ok(valid) => valid,
        Err(message) => {
            info!(reason = message, "Upload rejected");
            return Ok(redirect_home(push_flash(&headers, secret, message)));
        }
    };

    let path = UploadFolderInitializer::new(state.config.upload_folder.clone()).upload_path(&safe_name);
    tokio::fs::write(&path, &file.data).await?;
    info!(file = %safe_name, bytes = file.data.len(), "Saved upload");

    let skill_level = form.skill_level.unwrap_or_default();
    match process_upload(&state, path, skill_level).await? {
        UploadOutcome::Processed(sheet) => attachment(&sheet, push_flash(&headers, secret, MSG_PROCESSED)).await,
        UploadOutcome::Failed(message) => {
            error!(file = %safe_name, "Error processing the file: {}", message);
            state.record_error(message.clone()).await;
            let flash = format!("Error processing the file: {}", message);
            Ok(redirect_home(push_flash(&headers, secret, flash)))
        }
    }
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload_file))
}
