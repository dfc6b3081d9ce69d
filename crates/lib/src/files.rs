//! # Upload Storage
//!
//! Uploaded files live under one root directory:
//!
//! ```text
//! <root>/pdfs/     .pdf               up to 100 MB
//! <root>/videos/   .mp4 .webm         up to 500 MB
//! <root>/images/   .png .jpg .jpeg .gif .webp .svg   up to 10 MB
//! <root>/icons/    .png .svg .ico .webp              up to 10 MB
//! <root>/.staging/ partial uploads
//! ```
//!
//! Stored names are random (`<uuid><ext>`); the client's file name is only
//! used for its extension.

use crate::errors::KbError;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

const MB: u64 = 1024 * 1024;
const STAGING_DIR: &str = ".staging";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Pdfs,
    Videos,
    Images,
    Icons,
}

impl FileCategory {
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Pdfs,
        FileCategory::Videos,
        FileCategory::Images,
        FileCategory::Icons,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            FileCategory::Pdfs => "pdfs",
            FileCategory::Videos => "videos",
            FileCategory::Images => "images",
            FileCategory::Icons => "icons",
        }
    }

    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            FileCategory::Pdfs => &[".pdf"],
            FileCategory::Videos => &[".mp4", ".webm"],
            FileCategory::Images => &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"],
            FileCategory::Icons => &[".png", ".svg", ".ico", ".webp"],
        }
    }

    pub fn max_bytes(self) -> u64 {
        match self {
            FileCategory::Pdfs => 100 * MB,
            FileCategory::Videos => 500 * MB,
            FileCategory::Images | FileCategory::Icons => 10 * MB,
        }
    }

    /// Maps the multipart `type` field (`PDF`, `VIDEO`, `IMAGE`, `ICON`).
    pub fn from_upload_type(kind: &str) -> Result<Self, KbError> {
        match kind.to_ascii_uppercase().as_str() {
            "PDF" => Ok(FileCategory::Pdfs),
            "VIDEO" => Ok(FileCategory::Videos),
            "IMAGE" => Ok(FileCategory::Images),
            "ICON" => Ok(FileCategory::Icons),
            other => Err(KbError::BadRequest(format!("Unknown upload type '{other}'"))),
        }
    }

    /// The first category that accepts `ext`.
    pub fn for_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.allowed_extensions().contains(&ext))
    }
}

/// The lowercase extension of `file_name`, including the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    let name = Path::new(file_name).file_name()?.to_str()?;
    let dot = name.rfind('.')?;
    if dot == 0 || dot == name.len() - 1 {
        return None;
    }
    Some(name[dot..].to_ascii_lowercase())
}

/// Checks the extension of an incoming file against every category's
/// allowlist, before any bytes are written.
pub fn check_extension(original_name: &str) -> Result<String, KbError> {
    let ext = extension_of(original_name).ok_or_else(|| {
        KbError::BadRequest(format!("File '{original_name}' has no extension"))
    })?;
    if FileCategory::for_extension(&ext).is_none() {
        return Err(KbError::BadRequest(format!(
            "File type '{ext}' is not allowed"
        )));
    }
    Ok(ext)
}

/// Reduces a requested file name to a safe basename: `[A-Za-z0-9._-]` only,
/// no leading dot, no path separators. Returns `None` if nothing safe is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty()
        || base.starts_with('.')
        || !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return None;
    }
    Some(base.to_string())
}

/// The `Content-Type` for a stored file, from its extension.
pub fn content_type_for(path: &str) -> &'static str {
    match extension_of(path).as_deref() {
        Some(".pdf") => "application/pdf",
        Some(".mp4") => "video/mp4",
        Some(".webm") => "video/webm",
        Some(".png") => "image/png",
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        Some(".gif") => "image/gif",
        Some(".webp") => "image/webp",
        Some(".svg") => "image/svg+xml",
        Some(".ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// What the upload endpoint reports back.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub file_path: String,
    pub filename: String,
    pub originalname: String,
    pub size: u64,
    pub mimetype: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the category and staging directories.
    pub async fn ensure_layout(&self) -> Result<(), KbError> {
        for category in FileCategory::ALL {
            tokio::fs::create_dir_all(self.root.join(category.dir_name())).await?;
        }
        tokio::fs::create_dir_all(self.root.join(STAGING_DIR)).await?;
        Ok(())
    }

    /// A fresh path for streaming an upload before it is accepted.
    pub fn staging_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Resolves the category of an upload from the explicit `type` field, or
    /// from the extension when none was sent, and checks the extension
    /// belongs to it.
    pub fn resolve_category(&self, upload_type: Option<&str>, ext: &str) -> Result<FileCategory, KbError> {
        let category = match upload_type.filter(|t| !t.trim().is_empty()) {
            Some(kind) => FileCategory::from_upload_type(kind)?,
            None => FileCategory::for_extension(ext)
                .ok_or_else(|| KbError::BadRequest(format!("File type '{ext}' is not allowed")))?,
        };
        if !category.allowed_extensions().contains(&ext) {
            return Err(KbError::BadRequest(format!(
                "File type '{ext}' is not allowed for {} uploads",
                category.dir_name()
            )));
        }
        Ok(category)
    }

    /// Moves a fully staged upload into its category directory under a
    /// random name. The staged file is removed if the upload is rejected.
    pub async fn commit(
        &self,
        staged: &Path,
        original_name: &str,
        upload_type: Option<&str>,
        size: u64,
    ) -> Result<StoredFile, KbError> {
        let outcome = self.accept(staged, original_name, upload_type, size).await;
        if outcome.is_err() {
            if let Err(e) = tokio::fs::remove_file(staged).await {
                debug!(error = %e, path = %staged.display(), "Could not discard staged upload");
            }
        }
        outcome
    }

    async fn accept(
        &self,
        staged: &Path,
        original_name: &str,
        upload_type: Option<&str>,
        size: u64,
    ) -> Result<StoredFile, KbError> {
        let ext = check_extension(original_name)?;
        let category = self.resolve_category(upload_type, &ext)?;
        if size > category.max_bytes() {
            return Err(KbError::BadRequest(format!(
                "File is {size} bytes; {} uploads are limited to {} MB",
                category.dir_name(),
                category.max_bytes() / MB
            )));
        }

        let filename = format!("{}{ext}", uuid::Uuid::new_v4());
        let target = self.root.join(category.dir_name()).join(&filename);
        tokio::fs::rename(staged, &target).await?;
        info!(path = %target.display(), size, "Stored upload");

        Ok(StoredFile {
            file_path: target.to_string_lossy().into_owned(),
            mimetype: content_type_for(&filename).to_string(),
            filename,
            originalname: original_name.to_string(),
            size,
        })
    }

    /// True when `path` is a plain path inside the upload root.
    pub fn is_managed(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rest) => {
                rest.components().next().is_some()
                    && rest.components().all(|c| matches!(c, Component::Normal(_)))
            }
            Err(_) => false,
        }
    }

    /// Deletes `path` if it lives under the upload root. Anything else (a
    /// URL, a path outside the root, a missing file) is left alone.
    pub async fn remove_managed(&self, path: &str) -> bool {
        let path = Path::new(path);
        if !self.is_managed(path) {
            warn!(path = %path.display(), "Refusing to delete a file outside the upload root");
            return false;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Removed upload");
                true
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Could not remove upload");
                false
            }
        }
    }

    /// Finds a public image or icon by its stored name.
    pub async fn resolve_static(&self, requested: &str) -> Result<PathBuf, KbError> {
        let name = sanitize_filename(requested)
            .ok_or_else(|| KbError::BadRequest("Invalid file name".to_string()))?;
        for category in [FileCategory::Images, FileCategory::Icons] {
            let candidate = self.root.join(category.dir_name()).join(&name);
            if tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(KbError::not_found("File", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_checks() {
        assert_eq!(check_extension("Report.PDF").unwrap(), ".pdf");
        assert!(matches!(
            check_extension("setup.exe"),
            Err(KbError::BadRequest(_))
        ));
        assert!(check_extension("README").is_err());
        assert!(check_extension(".bashrc").is_err());
    }

    #[test]
    fn category_resolution() {
        let store = FileStore::new("/srv/uploads");
        assert_eq!(
            store.resolve_category(Some("VIDEO"), ".mp4").unwrap(),
            FileCategory::Videos
        );
        assert_eq!(
            store.resolve_category(None, ".ico").unwrap(),
            FileCategory::Icons
        );
        assert!(store.resolve_category(Some("PDF"), ".mp4").is_err());
        assert!(store.resolve_category(Some("ARCHIVE"), ".pdf").is_err());
    }

    #[test]
    fn sanitizer_strips_paths() {
        assert_eq!(sanitize_filename("logo.png").as_deref(), Some("logo.png"));
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(sanitize_filename("..").as_deref(), None);
        assert_eq!(sanitize_filename("a b.png").as_deref(), None);
        assert_eq!(sanitize_filename("dir/").as_deref(), None);
    }

    #[test]
    fn only_paths_under_root_are_managed() {
        let store = FileStore::new("/srv/uploads");
        assert!(store.is_managed(Path::new("/srv/uploads/pdfs/a.pdf")));
        assert!(!store.is_managed(Path::new("/srv/uploads/../secrets")));
        assert!(!store.is_managed(Path::new("/etc/passwd")));
        assert!(!store.is_managed(Path::new("/srv/uploads")));

        let relative = FileStore::new("./uploads");
        assert!(relative.is_managed(Path::new("./uploads/images/a.png")));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("x/y/z.webm"), "video/webm");
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn commit_moves_into_category_and_rejects_oversize() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.ensure_layout().await.unwrap();

        let staged = store.staging_path();
        tokio::fs::write(&staged, b"%PDF-1.4").await.unwrap();
        let stored = store
            .commit(&staged, "handbook.pdf", Some("PDF"), 8)
            .await
            .unwrap();
        assert!(stored.file_path.contains("/pdfs/"));
        assert!(stored.filename.ends_with(".pdf"));
        assert_eq!(stored.mimetype, "application/pdf");
        assert!(!staged.exists());

        let staged = store.staging_path();
        tokio::fs::write(&staged, b"x").await.unwrap();
        let err = store
            .commit(&staged, "huge.png", Some("IMAGE"), 11 * MB)
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::BadRequest(_)));
        assert!(!staged.exists(), "rejected uploads are discarded");

        assert!(store.remove_managed(&stored.file_path).await);
    }
}
