// archive.rs - Single-entry zip packaging and saving

use crate::error::{ZipperError, ZipperResult};
use std::fmt;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// File name offered for the saved archive.
pub const ARCHIVE_NAME: &str = "compressed_images.zip";

/// Name of the single entry, before its extension.
pub const ENTRY_BASE_NAME: &str = "compressed_image";

/// Everything the archive needs, fetched out of the session up front.
#[derive(Clone)]
pub struct ExportJob {
    pub bytes: Arc<[u8]>,
    pub base_name: String,
    pub extension: String,
}

impl ExportJob {
    pub fn entry_name(&self) -> String {
        format!("{}.{}", self.base_name, self.extension)
    }
}

impl fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportJob")
            .field("bytes", &self.bytes.len())
            .field("entry", &self.entry_name())
            .finish()
    }
}

/// A serialized archive ready to be written out.
#[derive(Clone)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Builds a zip holding one stored entry.
pub fn build_archive(entry_name: &str, data: &[u8]) -> ZipperResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    writer.start_file(entry_name, options)?;
    writer.write_all(data).map_err(ZipperError::archive)?;
    let cursor = writer.finish()?;

    Ok(cursor.into_inner())
}

pub async fn export_zip(job: ExportJob) -> ZipperResult<Download> {
    tokio::task::spawn_blocking(move || {
        let entry_name = job.entry_name();
        let bytes = build_archive(&entry_name, &job.bytes)?;
        info!("Built {} with {} ({} bytes)", ARCHIVE_NAME, entry_name, bytes.len());
        Ok(Download {
            file_name: ARCHIVE_NAME.to_string(),
            bytes,
        })
    })
    .await
    .map_err(ZipperError::archive)?
}

/// Writes the archive to `destination` and returns the path written.
pub async fn save_download(download: Download, destination: PathBuf) -> ZipperResult<PathBuf> {
    tokio::fs::write(&destination, &download.bytes)
        .await
        .map_err(|e| ZipperError::save(format!("{}: {}", destination.display(), e)))?;
    info!("Saved {} to {}", download.file_name, destination.display());
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_build_archive_single_entry() {
        let bytes = build_archive("compressed_image.jpg", b"jpeg bytes").unwrap();

        assert_eq!(
            entries(bytes),
            vec![("compressed_image.jpg".to_string(), b"jpeg bytes".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_export_zip() {
        let job = ExportJob {
            bytes: Arc::from(vec![7u8; 300]),
            base_name: ENTRY_BASE_NAME.to_string(),
            extension: "png".to_string(),
        };

        let download = export_zip(job).await.unwrap();

        assert_eq!(download.file_name, "compressed_images.zip");
        let entries = entries(download.bytes);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "compressed_image.png");
        assert_eq!(entries[0].1, vec![7u8; 300]);
    }

    #[tokio::test]
    async fn test_save_download() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join(ARCHIVE_NAME);
        let download = Download {
            file_name: ARCHIVE_NAME.to_string(),
            bytes: build_archive("a.jpg", b"x").unwrap(),
        };

        let saved = save_download(download.clone(), destination.clone()).await.unwrap();

        assert_eq!(saved, destination);
        assert_eq!(std::fs::read(&destination).unwrap(), download.bytes);
    }

    #[tokio::test]
    async fn test_save_download_to_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("missing").join(ARCHIVE_NAME);
        let download = Download {
            file_name: ARCHIVE_NAME.to_string(),
            bytes: vec![1, 2, 3],
        };

        let err = save_download(download, destination).await.unwrap_err();

        assert!(matches!(err, ZipperError::SaveFailure(_)));
    }
}
