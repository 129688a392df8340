//! REST handlers for uploading, serving, and deleting receipt files.

use std::path::{Path as FilePath, PathBuf};

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::Field},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::{AppState, Error, auth::Claims};

use super::parser::{ReceiptData, parse_receipt_text};

/// The largest receipt file the server accepts.
pub(crate) const MAX_RECEIPT_BYTES: usize = 10 * 1024 * 1024;

/// The file extensions accepted for receipt uploads.
const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "pdf"];

/// The multipart field that carries the receipt file.
const FILE_FIELD: &str = "receipt";
/// The multipart field that carries the OCR-extracted text, if the client
/// has it. Text extraction happens outside this server.
const TEXT_FIELD: &str = "text";

/// Details of a stored receipt file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredFile {
    filename: String,
    original_name: String,
    path: String,
}

/// The response body for a successful receipt upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    message: String,
    file: StoredFile,
    extracted_text: String,
    extracted_data: ReceiptData,
}

/// Upload a receipt file and parse its extracted text.
///
/// Expects a multipart form with a `receipt` file field (JPEG, PNG, or PDF,
/// at most 10 MiB) and an optional `text` field holding the OCR output for
/// the file. The file is stored under a content-hash filename, so uploading
/// the same receipt twice is harmless.
pub async fn upload_receipt_endpoint(
    State(state): State<AppState>,
    _claims: Claims,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let mut file = None;
    let mut extracted_text = String::new();

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::error!("could not read multipart field: {error}");
        Error::MultipartError(error.to_string())
    })? {
        match field.name() {
            Some(FILE_FIELD) => file = Some(read_file_field(field).await?),
            Some(TEXT_FIELD) => {
                extracted_text = field
                    .text()
                    .await
                    .map_err(|error| Error::MultipartError(error.to_string()))?;
            }
            _ => continue,
        }
    }

    let (original_name, data) = file.ok_or(Error::MissingFile)?;
    let extension = validate_extension(&original_name)?;

    if data.len() > MAX_RECEIPT_BYTES {
        return Err(Error::FileTooLarge);
    }

    // Content-hash filenames sidestep collisions and duplicate uploads.
    let filename = format!("{:x}.{extension}", md5::compute(&data));
    let file_path = state.upload_dir.join(&filename);

    tokio::fs::write(&file_path, &data)
        .await
        .map_err(|error| {
            tracing::error!("could not store receipt file {file_path:?}: {error}");
            Error::IoError(error.to_string())
        })?;

    tracing::debug!(
        "stored receipt '{original_name}' as '{filename}' ({} bytes)",
        data.len()
    );

    let extracted_data = parse_receipt_text(&extracted_text);

    let response = UploadResponse {
        message: "Receipt uploaded and processed successfully".to_owned(),
        file: StoredFile {
            path: format!("/api/receipts/{filename}"),
            filename,
            original_name,
        },
        extracted_text,
        extracted_data,
    };

    Ok(Json(response).into_response())
}

/// Serve a stored receipt file.
pub async fn get_receipt_endpoint(
    State(state): State<AppState>,
    _claims: Claims,
    Path(filename): Path<String>,
) -> Result<Response, Error> {
    let file_path = resolve_receipt_path(&state.upload_dir, &filename)?;

    let data = tokio::fs::read(&file_path).await.map_err(map_read_error)?;

    let content_type = match file_path
        .extension()
        .and_then(|extension| extension.to_str())
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    };

    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}

/// Delete a stored receipt file.
pub async fn delete_receipt_endpoint(
    State(state): State<AppState>,
    _claims: Claims,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, Error> {
    let file_path = resolve_receipt_path(&state.upload_dir, &filename)?;

    tokio::fs::remove_file(&file_path)
        .await
        .map_err(map_read_error)?;

    Ok(Json(json!({ "message": "File deleted successfully" })))
}

async fn read_file_field(field: Field<'_>) -> Result<(String, Vec<u8>), Error> {
    let file_name = match field.file_name() {
        Some(file_name) => file_name.to_owned(),
        None => {
            tracing::error!("could not get file name from multipart form field");
            return Err(Error::MultipartError(
                "could not get file name from multipart form field".to_owned(),
            ));
        }
    };

    let data = field.bytes().await.map_err(|error| {
        tracing::error!("could not read data from multipart form field: {error}");
        // An oversized body surfaces as a read error mid-field.
        Error::FileTooLarge
    })?;

    Ok((file_name, data.to_vec()))
}

/// Check the upload's file extension against the allow list and return it
/// lowercased.
fn validate_extension(file_name: &str) -> Result<String, Error> {
    let extension = FilePath::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| Error::UnsupportedFileType(file_name.to_owned()))?;

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(Error::UnsupportedFileType(file_name.to_owned()))
    }
}

/// Resolve a client-supplied filename inside the upload directory.
///
/// Rejects anything that could escape the directory. Unknown and malformed
/// names both surface as [Error::NotFound] so the route does not reveal
/// which filenames exist.
fn resolve_receipt_path(upload_dir: &FilePath, filename: &str) -> Result<PathBuf, Error> {
    let is_safe = !filename.is_empty()
        && !filename.contains("..")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if !is_safe {
        return Err(Error::NotFound);
    }

    Ok(upload_dir.join(filename))
}

fn map_read_error(error: std::io::Error) -> Error {
    if error.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound
    } else {
        tracing::error!("receipt file I/O failed: {error}");
        Error::IoError(error.to_string())
    }
}
