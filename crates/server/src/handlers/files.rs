//! # File Upload & Serving
//!
//! Uploads are streamed chunk by chunk into the store's staging directory
//! and only moved into place once the extension, category and size checks
//! pass. Stored files are streamed back with a content type derived from
//! their extension.

use crate::{
    auth::{Authorized, Contributors},
    errors::AppError,
    state::AppState,
};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use axum_extra::extract::{multipart::MultipartError, Multipart};
use futures::stream;
use kbase::files::{check_extension, content_type_for, StoredFile};
use std::path::{Path as FsPath, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 64 * 1024;

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Malformed upload: {}", err.body_text()))
    }
}

struct Staged {
    path: PathBuf,
    original_name: String,
    size: u64,
}

/// Removes a staged file that never got committed.
async fn discard(staged: Option<Staged>) {
    if let Some(staged) = staged {
        if let Err(e) = tokio::fs::remove_file(&staged.path).await {
            debug!(error = %e, path = %staged.path.display(), "Could not remove staged upload");
        }
    }
}

async fn stage_field(
    state: &AppState,
    field: &mut axum_extra::extract::multipart::Field,
    original_name: String,
) -> Result<Staged, AppError> {
    let path = state.kb.files.staging_path();
    let mut out = tokio::fs::File::create(&path)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    let mut size = 0u64;
    let result = async {
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len() as u64;
            out.write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(e.into()))?;
        }
        out.flush().await.map_err(|e| AppError::Internal(e.into()))
    }
    .await;
    let staged = Staged {
        path,
        original_name,
        size,
    };
    match result {
        Ok(()) => Ok(staged),
        Err(e) => {
            discard(Some(staged)).await;
            Err(e)
        }
    }
}

/// `POST /api/files/upload`, multipart with a `file` part and an optional
/// `type` part (`PDF`, `VIDEO`, `IMAGE`, `ICON`).
pub async fn upload(
    State(state): State<AppState>,
    _auth: Authorized<Contributors>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredFile>), AppError> {
    let mut staged: Option<Staged> = None;
    let mut upload_type: Option<String> = None;

    let read = async {
        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    // Reject before a single byte is written.
                    check_extension(&original_name)?;
                    if staged.is_some() {
                        return Err(AppError::BadRequest(
                            "Only one file per upload".to_string(),
                        ));
                    }
                    staged = Some(stage_field(&state, &mut field, original_name).await?);
                }
                Some("type") => upload_type = Some(field.text().await?),
                other => debug!(field = ?other, "Ignoring unknown multipart field"),
            }
        }
        Ok::<_, AppError>(())
    }
    .await;
    if let Err(e) = read {
        discard(staged).await;
        return Err(e);
    }

    let Some(staged) = staged else {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    };
    let stored = state
        .kb
        .files
        .commit(
            &staged.path,
            &staged.original_name,
            upload_type.as_deref(),
            staged.size,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn stream_file(path: &FsPath) -> Result<Response, AppError> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        warn!(error = %e, path = %path.display(), "Stored file is missing");
        AppError::NotFound("File not found".to_string())
    })?;
    let len = file
        .metadata()
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .len();
    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), file)))
    });

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, format!("inline; filename=\"{name}\""))
        .body(Body::from_stream(chunks))
        .map_err(|e| AppError::Internal(e.into()))
}

/// `GET /api/files/{module_id}` serves the file attached to a live module.
pub async fn serve_module_file(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Response, AppError> {
    let module = state.kb.modules.get(&module_id).await?;
    let path = module
        .body
        .file_path()
        .map(PathBuf::from)
        .filter(|p| state.kb.files.is_managed(p))
        .ok_or_else(|| AppError::NotFound(format!("Module '{module_id}' has no stored file")))?;
    stream_file(&path).await
}

/// `GET /api/files/static/{filename}` serves an uploaded image or icon.
pub async fn serve_static(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let path = state.kb.files.resolve_static(&filename).await?;
    stream_file(&path).await
}
