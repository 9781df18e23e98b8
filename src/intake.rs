// intake.rs - File intake: MIME validation and loading picked or dropped paths

use crate::error::{ZipperError, ZipperResult};
use crate::store::FileList;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

/// MIME types the intake lets through.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// Extensions offered by the file picker. Matches `ACCEPTED_MIME_TYPES`.
pub const PICKER_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A file as handed to the intake: name, declared MIME type and content.
#[derive(Clone)]
pub struct IncomingFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: Arc::from(bytes),
        }
    }
}

impl fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

pub fn is_accepted(mime: &str) -> bool {
    ACCEPTED_MIME_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(mime.trim()))
}

fn subtype(mime: &str) -> String {
    match mime.trim().split_once('/') {
        Some((_, sub)) if !sub.is_empty() => sub.to_lowercase(),
        _ => "unknown".to_string(),
    }
}

/// Checks a whole batch. Fails with the distinct rejected subtypes, in the
/// order they first appear.
pub fn validate(files: &[IncomingFile]) -> ZipperResult<()> {
    let mut formats: Vec<String> = Vec::new();
    for file in files.iter().filter(|f| !is_accepted(&f.mime)) {
        let sub = subtype(&file.mime);
        if !formats.contains(&sub) {
            formats.push(sub);
        }
    }

    if formats.is_empty() {
        Ok(())
    } else {
        Err(ZipperError::UnsupportedFormat { formats })
    }
}

/// Validates the batch and appends it to the list. All or nothing: a single
/// rejected file keeps the whole batch out.
pub fn ingest(list: &mut FileList, files: Vec<IncomingFile>) -> ZipperResult<usize> {
    if let Err(err) = validate(&files) {
        info!("Rejected batch of {} file(s): {}", files.len(), err);
        return Err(err);
    }

    let added = list.append(
        files
            .into_iter()
            .map(|file| (file.name, file.mime, file.bytes)),
    );
    info!("Accepted {} file(s), {} in list", added, list.len());
    Ok(added)
}

/// MIME type a browser would report for the file's extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Expands directories into the files below them, sorted by name. Plain
/// files are kept as given.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    files
}

/// Reads picked or dropped paths into a batch for `ingest`.
pub async fn load_files(paths: Vec<PathBuf>) -> ZipperResult<Vec<IncomingFile>> {
    let mut files = Vec::new();

    for path in collect_files(&paths) {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ZipperError::read(path.clone(), e))?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        debug!("Loaded {} ({} bytes)", name, bytes.len());
        files.push(IncomingFile::new(name, mime_for_path(&path), bytes));
    }

    Ok(files)
}

/// How long a drop stays open for more paths after the first one arrives.
pub const DROP_SETTLE: Duration = Duration::from_millis(50);

/// Paths from one drag-and-drop gesture, collected until the batch settles.
#[derive(Debug, Default)]
pub struct DropBatch {
    paths: Vec<PathBuf>,
}

impl DropBatch {
    /// Queues `path`. Returns true when it opened a new batch.
    pub fn push(&mut self, path: PathBuf) -> bool {
        self.paths.push(path);
        self.paths.len() == 1
    }

    /// Closes the batch and returns its paths in arrival order.
    pub fn take(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

/// Waits out `DROP_SETTLE`. The windowing layer sends one event per dropped
/// file, back to back, so everything from one gesture lands within the window.
pub async fn settle_drop() {
    tokio::time::sleep(DROP_SETTLE).await;
}
