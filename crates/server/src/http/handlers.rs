//! Endpoint handlers.

use std::fs;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::Response;
use axum::{Form, Json};
use protocol::messages::{FileListing, MessageReply, ServiceInfo, UploadReply};
use serde::Deserialize;
use tokio::task::spawn_blocking;
use tokio_util::io::ReaderStream;
use tracing::info;

use super::AppState;
use crate::error::ApiError;
use crate::files::{ArchiveManifest, UploadForm};

/// `GET /`
pub async fn index(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "qrshare".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        readonly: state.readonly,
    })
}

fn bad_multipart(error: MultipartError) -> ApiError {
    ApiError::InvalidInput(error.body_text())
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(bad_multipart)
}

/// `POST /upload`: one chunk of a file.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadReply>, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.filename = Some(field.file_name().unwrap_or_default().to_string());
                form.payload = Some(field.bytes().await.map_err(bad_multipart)?);
            }
            "folder" => {
                let folder = field
                    .text()
                    .await
                    .map_err(|_| ApiError::InvalidInput("Invalid folder".into()))?;
                form.folder = Some(folder);
            }
            "chunk" => form.chunk = Some(field_text(field).await?),
            "fileSize" => form.file_size = Some(field_text(field).await?),
            "resume" => form.resume = Some(field_text(field).await?),
            _ => {}
        }
    }

    let request = form.validate()?;
    let outcome = spawn_blocking(move || state.uploads.handle(&request)).await??;
    Ok(Json(outcome.into()))
}

/// `GET /download/{path}`: the file itself, displayed inline.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let target = state.sandbox.resolve(&path);
    let not_found = || ApiError::NotFound("File not found".into());

    let metadata = tokio::fs::metadata(&target).await.map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    let file = tokio::fs::File::open(&target)
        .await
        .map_err(|e| ApiError::Unexpected(format!("{}: {e}", target.display())))?;
    let mime = mime_guess::from_path(&target).first_or_octet_stream();

    Response::builder()
        .header(header::CONTENT_TYPE, mime.essence_str())
        .header(header::CONTENT_LENGTH, metadata.len())
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Unexpected(e.to_string()))
}

/// `GET /zip/`: the whole share root as a zip.
pub async fn zip_root(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    zip_response(state, String::new()).await
}

/// `GET /zip/{path}`: a file or directory as a zip.
pub async fn zip_path(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    zip_response(state, path).await
}

async fn zip_response(state: Arc<AppState>, path: String) -> Result<Response, ApiError> {
    let target = state.sandbox.resolve(&path);
    let walker = state.walker;

    let manifest = spawn_blocking(move || -> Result<ArchiveManifest, ApiError> {
        let metadata =
            fs::metadata(&target).map_err(|_| ApiError::NotFound("Path not found".into()))?;
        if metadata.is_file() {
            Ok(ArchiveManifest::single_file(&target))
        } else if metadata.is_dir() {
            Ok(ArchiveManifest::from_traversal(&walker.walk(&target)))
        } else {
            Err(ApiError::NotFound("Path is not directory or file.".into()))
        }
    })
    .await??;

    info!(path = %path, entries = manifest.len(), "streaming archive");

    Response::builder()
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, "attachment; filename=archive.zip")
        .body(Body::from_stream(state.archives.stream(manifest)))
        .map_err(|e| ApiError::Unexpected(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    folder: String,
}

/// `GET /files?folder=...`: everything below a folder.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<FileListing>, ApiError> {
    let target = state.sandbox.resolve(&query.folder);
    let walker = state.walker;

    let listing = spawn_blocking(move || {
        let traversal = walker.walk(&target);
        FileListing {
            files: traversal.file_paths(),
            folders: traversal.dir_paths(),
        }
    })
    .await?;

    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(default)]
    path: String,
}

/// `POST /delete`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DeleteForm>,
) -> Result<Json<MessageReply>, ApiError> {
    spawn_blocking(move || state.ops.delete(&form.path)).await??;
    Ok(Json(MessageReply::new("Deleted")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveForm {
    #[serde(default)]
    source_path: String,
    #[serde(default)]
    destination_path: String,
}

/// `POST /move`
pub async fn move_item(
    State(state): State<Arc<AppState>>,
    Form(form): Form<MoveForm>,
) -> Result<Json<MessageReply>, ApiError> {
    spawn_blocking(move || state.ops.move_item(&form.source_path, &form.destination_path))
        .await??;
    Ok(Json(MessageReply::new("Moved")))
}

#[derive(Debug, Deserialize)]
pub struct NewFileForm {
    #[serde(default)]
    filename: String,
}

/// `POST /newfile`
pub async fn new_file(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NewFileForm>,
) -> Result<Json<MessageReply>, ApiError> {
    spawn_blocking(move || state.ops.new_file(&form.filename)).await??;
    Ok(Json(MessageReply::new("File created")))
}

#[derive(Debug, Deserialize)]
pub struct NewFolderForm {
    #[serde(default)]
    foldername: String,
}

/// `POST /newfolder`
pub async fn new_folder(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NewFolderForm>,
) -> Result<Json<MessageReply>, ApiError> {
    spawn_blocking(move || state.ops.new_folder(&form.foldername)).await??;
    Ok(Json(MessageReply::new("Folder created")))
}
