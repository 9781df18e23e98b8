// session.rs - Explicit application state and its transitions

use crate::archive::{ExportJob, ENTRY_BASE_NAME};
use crate::compression::CompressedImage;
use crate::error::{ZipperError, ZipperResult};
use crate::intake::{self, IncomingFile};
use crate::resource::{CompressedResource, ResourceRegistry};
use crate::store::{EntryId, FileList, ImageEntry};
use tracing::{debug, info, warn};

/// Identifies one preview request. Results carrying an older ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
pub struct Preview {
    pub entry_id: EntryId,
    pub entry_name: String,
    pub original_size: usize,
    pub compressed: Option<CompressedResource>,
    ticket: Ticket,
}

/// Work handed to the compression pipeline by `begin_preview`.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub ticket: Ticket,
    pub entry: ImageEntry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewOutcome {
    Ready(CompressedResource),
    Failed(ZipperError),
    /// The selection moved on while the job ran.
    Discarded,
}

/// The file list, the active preview, the error line and the registered
/// preview bytes only change through these transitions:
///
/// | action              | effect                                                       |
/// |---------------------|--------------------------------------------------------------|
/// | `ingest`            | ok: append batch, clear error. err: set error, list untouched |
/// | `remove_at`         | drop entry; if it is previewed, release and clear preview     |
/// | `clear_all`         | empty list, release and clear preview, clear error            |
/// | `begin_preview`     | release old preview, start a pending one with a fresh ticket  |
/// | `finish_preview`    | stale ticket: discard. err: clear preview, set error. ok: attach |
/// | `dismiss_preview`   | release and clear preview                                     |
/// | `export_job`        | fetch the attached preview bytes                              |
/// | `report`            | set error                                                     |
/// | `dismiss_error`     | clear error                                                   |
#[derive(Debug)]
pub struct Session {
    files: FileList,
    preview: Option<Preview>,
    error: Option<String>,
    resources: ResourceRegistry,
    next_ticket: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            files: FileList::new(),
            preview: None,
            error: None,
            resources: ResourceRegistry::new(),
            next_ticket: 0,
        }
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// True while a preview is selected but its bytes are not ready yet.
    pub fn is_compressing(&self) -> bool {
        matches!(&self.preview, Some(p) if p.compressed.is_none())
    }

    pub fn ingest(&mut self, batch: Vec<IncomingFile>) -> ZipperResult<usize> {
        match intake::ingest(&mut self.files, batch) {
            Ok(added) => {
                self.error = None;
                Ok(added)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn remove_at(&mut self, index: usize) -> ZipperResult<ImageEntry> {
        let removed = self.files.remove_at(index)?;
        info!("Removed {}", removed.display_name);

        if matches!(&self.preview, Some(p) if p.entry_id == removed.id) {
            self.clear_preview();
        }
        Ok(removed)
    }

    pub fn clear_all(&mut self) {
        self.clear_preview();
        self.files.clear();
        self.error = None;
        info!("Cleared file list");
    }

    pub fn begin_preview(&mut self, index: usize) -> ZipperResult<PreviewRequest> {
        let entry = self.files.get(index)?.clone();
        self.clear_preview();

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.preview = Some(Preview {
            entry_id: entry.id,
            entry_name: entry.display_name.clone(),
            original_size: entry.bytes.len(),
            compressed: None,
            ticket,
        });
        debug!("Preview {:?} started for {}", ticket, entry.display_name);

        Ok(PreviewRequest { ticket, entry })
    }

    pub fn finish_preview(
        &mut self,
        ticket: Ticket,
        result: ZipperResult<CompressedImage>,
    ) -> PreviewOutcome {
        let preview = match self.preview.as_mut() {
            Some(p) if p.ticket == ticket && p.compressed.is_none() => p,
            _ => {
                debug!("Discarded stale preview {:?}", ticket);
                return PreviewOutcome::Discarded;
            }
        };

        match result {
            Ok(image) => {
                let byte_len = image.data.len();
                let resource = CompressedResource {
                    id: self.resources.register(image.data),
                    format: image.format,
                    width: image.width,
                    height: image.height,
                    byte_len,
                };
                preview.compressed = Some(resource);
                info!(
                    "Preview of {} ready: {}x{} -> {}x{}, {} bytes",
                    preview.entry_name,
                    image.source_width,
                    image.source_height,
                    resource.width,
                    resource.height,
                    resource.byte_len
                );
                PreviewOutcome::Ready(resource)
            }
            Err(err) => {
                warn!("Preview of {} failed: {}", preview.entry_name, err);
                self.preview = None;
                self.error = Some(err.to_string());
                PreviewOutcome::Failed(err)
            }
        }
    }

    pub fn dismiss_preview(&mut self) {
        self.clear_preview();
    }

    pub fn export_job(&self) -> ZipperResult<ExportJob> {
        let resource = self
            .preview
            .as_ref()
            .and_then(|p| p.compressed)
            .ok_or_else(|| ZipperError::export("no compressed preview to export"))?;

        Ok(ExportJob {
            bytes: self.resources.fetch(resource.id)?,
            base_name: ENTRY_BASE_NAME.to_string(),
            extension: resource.format.file_extension().to_string(),
        })
    }

    pub fn report(&mut self, err: &ZipperError) {
        warn!("{}", err);
        self.error = Some(err.to_string());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    fn clear_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            if let Some(resource) = preview.compressed {
                self.resources.revoke(resource.id);
            }
            debug!(
                "Preview of {} cleared, {} resource(s) held",
                preview.entry_name,
                self.resources.len()
            );
        }
    }
}
