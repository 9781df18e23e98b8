// main.rs - Image Zipper: pick or drop images, preview a compressed copy, save it as a zip
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod archive;
mod compression;
mod error;
mod intake;
mod resource;
mod session;
mod store;

use archive::{Download, ARCHIVE_NAME};
use compression::{CompressedImage, CompressionOptions, OutputFormat};
use error::ZipperError;
use intake::{DropBatch, IncomingFile, PICKER_EXTENSIONS};
use session::{PreviewOutcome, Session, Ticket};
use iced::widget::image::{Handle, Image};
use iced::widget::{button, column, container, pick_list, row, scrollable, slider, text, text_input, Space};
use iced::{executor, subscription, window, Application, Color, Command, Element, Event, Font, Length, Settings, Subscription, Theme};
use iced::font::{Family, Weight};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const HEADING_FONT: Font = Font {
    family: Family::SansSerif,
    weight: Weight::Bold,
    stretch: iced::font::Stretch::Normal,
    monospaced: false,
};

const BODY_FONT: Font = Font {
    family: Family::SansSerif,
    weight: Weight::Normal,
    stretch: iced::font::Stretch::Normal,
    monospaced: false,
};

const ERROR_COLOR: Color = Color {
    r: 0.78,
    g: 0.12,
    b: 0.12,
    a: 1.0,
};

pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("=== Image Zipper starting ===");

    ImageZipper::run(Settings {
        window: iced::window::Settings {
            size: (560, 720),
            min_size: Some((480, 600)),
            resizable: true,
            decorations: true,
            ..Default::default()
        },
        default_font: BODY_FONT,
        default_text_size: 14.0,
        ..Default::default()
    })
}

#[derive(Default)]
struct ImageZipper {
    session: Session,
    options: CompressionOptions,
    width_input: String,
    preview_image: Option<Handle>,
    pending_drop: DropBatch,
    is_loading: bool,
    is_exporting: bool,
    status_message: String,
    last_saved: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum Message {
    SelectFiles,
    FilesPicked(Option<Vec<PathBuf>>),
    FileDropped(PathBuf),
    DropSettled,
    FilesLoaded(Result<Vec<IncomingFile>, ZipperError>),
    Preview(usize),
    PreviewReady(Ticket, Result<CompressedImage, ZipperError>),
    HidePreview,
    Remove(usize),
    ClearAll,
    TargetWidthChanged(String),
    QualityChanged(u8),
    FormatSelected(OutputFormat),
    Download,
    ArchiveReady(Result<Download, ZipperError>),
    ArchiveSaved(Result<Option<PathBuf>, ZipperError>),
    OpenDownloadFolder,
    DismissError,
}

impl Application for ImageZipper {
    type Message = Message;
    type Theme = Theme;
    type Executor = executor::Default;
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Message>) {
        let app = Self {
            width_input: compression::DEFAULT_TARGET_WIDTH.to_string(),
            ..Self::default()
        };
        (app, Command::none())
    }

    fn title(&self) -> String {
        String::from("Image Zipper")
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::SelectFiles => {
                return Command::perform(select_files(), Message::FilesPicked);
            }
            Message::FilesPicked(Some(paths)) => {
                return self.load(paths);
            }
            Message::FilesPicked(None) => {}
            Message::FileDropped(path) => {
                // one event per file; the first opens a batch that settles after DROP_SETTLE
                if self.pending_drop.push(path) {
                    return Command::perform(intake::settle_drop(), |()| Message::DropSettled);
                }
            }
            Message::DropSettled => {
                let paths = self.pending_drop.take();
                debug!("Drop of {} path(s)", paths.len());
                return self.load(paths);
            }
            Message::FilesLoaded(result) => {
                self.is_loading = false;
                match result {
                    Ok(files) => {
                        if let Ok(added) = self.session.ingest(files) {
                            self.status_message = format!("Added {} image(s)", added);
                        }
                    }
                    Err(e) => self.session.report(&e),
                }
            }
            Message::Preview(index) => match self.session.begin_preview(index) {
                Ok(request) => {
                    self.preview_image = None;
                    let ticket = request.ticket;
                    return Command::perform(
                        compression::compress(request.entry, self.options),
                        move |result| Message::PreviewReady(ticket, result),
                    );
                }
                Err(e) => self.session.report(&e),
            },
            Message::PreviewReady(ticket, result) => match self.session.finish_preview(ticket, result) {
                PreviewOutcome::Ready(resource) => match self.session.resources().fetch(resource.id) {
                    Ok(bytes) => self.preview_image = Some(Handle::from_memory(bytes.to_vec())),
                    Err(e) => self.session.report(&e),
                },
                PreviewOutcome::Failed(_) => self.preview_image = None,
                PreviewOutcome::Discarded => {}
            },
            Message::HidePreview => {
                self.session.dismiss_preview();
                self.sync_preview_image();
            }
            Message::Remove(index) => {
                if let Err(e) = self.session.remove_at(index) {
                    self.session.report(&e);
                }
                self.sync_preview_image();
            }
            Message::ClearAll => {
                self.session.clear_all();
                self.sync_preview_image();
                self.status_message.clear();
            }
            Message::TargetWidthChanged(value) => {
                if !value.trim().is_empty() {
                    match compression::parse_target_width(&value) {
                        Ok(width) => self.options.target_width = width,
                        Err(e) => self.session.report(&e),
                    }
                }
                self.width_input = value;
            }
            Message::QualityChanged(quality) => {
                self.options.quality = quality;
            }
            Message::FormatSelected(format) => {
                self.options.format = format;
            }
            Message::Download => match self.session.export_job() {
                Ok(job) => {
                    self.is_exporting = true;
                    return Command::perform(archive::export_zip(job), Message::ArchiveReady);
                }
                Err(e) => self.session.report(&e),
            },
            Message::ArchiveReady(Ok(download)) => {
                return Command::perform(save_archive(download), Message::ArchiveSaved);
            }
            Message::ArchiveReady(Err(e)) => {
                self.is_exporting = false;
                self.session.report(&e);
            }
            Message::ArchiveSaved(result) => {
                self.is_exporting = false;
                match result {
                    Ok(Some(path)) => {
                        self.status_message = format!("Saved {}", path.display());
                        self.last_saved = Some(path);
                    }
                    Ok(None) => debug!("Save dialog cancelled"),
                    Err(e) => self.session.report(&e),
                }
            }
            Message::OpenDownloadFolder => {
                if let Some(dir) = self.last_saved.as_ref().and_then(|p| p.parent()) {
                    if let Err(e) = open::that(dir) {
                        warn!("Could not open {}: {}", dir.display(), e);
                    }
                }
            }
            Message::DismissError => {
                self.session.dismiss_error();
            }
        }
        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        subscription::events_with(|event, _status| match event {
            Event::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        })
    }

    fn view(&self) -> Element<Message> {
        // Title
        let title = text("Image Zipper")
            .size(22)
            .font(HEADING_FONT);

        // Upload
        let upload = column![
            text("Upload Images")
                .size(16)
                .font(HEADING_FONT),
            row![
                if self.is_loading {
                    button("Loading...").padding([6, 12])
                } else {
                    button("Click To Upload")
                        .on_press(Message::SelectFiles)
                        .padding([6, 12])
                },
                button("Clear All")
                    .on_press(Message::ClearAll)
                    .padding([6, 12]),
            ].spacing(8),
            text("PNG or JPEG; you can also drop files or folders on this window")
                .size(12)
                .font(BODY_FONT),
        ].spacing(8);

        // Error line
        let error_section = match self.session.error() {
            Some(message) => column![
                row![
                    text(message)
                        .size(13)
                        .style(ERROR_COLOR)
                        .width(Length::Fill),
                    button("Dismiss")
                        .on_press(Message::DismissError)
                        .padding([4, 10]),
                ].spacing(8),
            ],
            None => column![],
        };

        // Uploaded files
        let previewed = self.session.preview().map(|p| p.entry_id);
        let file_rows: Vec<Element<Message>> = self.session.files().list_all().iter().enumerate().map(|(index, entry)| {
            let label = if Some(entry.id) == previewed {
                format!("> {}", entry.display_name)
            } else {
                entry.display_name.clone()
            };

            row![
                text(label)
                    .size(13)
                    .font(BODY_FONT)
                    .width(Length::Fill),
                button("Preview")
                    .on_press(Message::Preview(index))
                    .padding([4, 10]),
                button("Remove")
                    .on_press(Message::Remove(index))
                    .padding([4, 10]),
            ].spacing(8).into()
        }).collect();

        let file_list: Element<Message> = if self.session.files().is_empty() {
            text("No images yet")
                .size(12)
                .font(BODY_FONT)
                .into()
        } else {
            container(
                scrollable(
                    column(file_rows).spacing(4)
                ).height(Length::Fixed(140.0))
            )
            .style(iced::theme::Container::Box)
            .padding(8)
            .into()
        };

        let files_section = column![
            text(format!("Uploaded Images ({})", self.session.files().len()))
                .size(16)
                .font(HEADING_FONT),
            file_list,
        ].spacing(8);

        // Compression settings
        let settings = column![
            text("Compression Settings")
                .size(16)
                .font(HEADING_FONT),
            row![
                text("Width:")
                    .size(13)
                    .font(BODY_FONT)
                    .width(80),
                text_input("350", &self.width_input)
                    .on_input(Message::TargetWidthChanged)
                    .width(Length::Fixed(70.0))
                    .padding(4)
                    .size(13),
                text("px")
                    .size(13)
                    .font(BODY_FONT),
            ].spacing(6),
            row![
                text("Format:")
                    .size(13)
                    .font(BODY_FONT)
                    .width(80),
                pick_list(
                    OutputFormat::ALL,
                    Some(self.options.format),
                    Message::FormatSelected,
                ),
            ].spacing(8),
            if self.options.format.supports_quality() {
                row![
                    text("Quality:")
                        .size(13)
                        .font(BODY_FONT)
                        .width(80),
                    slider(10..=100, self.options.quality, Message::QualityChanged)
                        .width(Length::Fill),
                    text(format!("{}%", self.options.quality))
                        .size(13)
                        .font(BODY_FONT)
                        .width(40),
                ].spacing(8)
            } else {
                row![]
            },
        ].spacing(8);

        // Preview
        let preview_section = match self.session.preview() {
            Some(preview) => {
                let body: Element<Message> = match (&self.preview_image, preview.compressed) {
                    (Some(handle), Some(resource)) => column![
                        Image::new(handle.clone())
                            .width(Length::Fixed(resource.width as f32)),
                        text(format!(
                            "{} · {}×{} {} · {} KB → {} KB",
                            preview.entry_name,
                            resource.width,
                            resource.height,
                            resource.format.file_extension(),
                            preview.original_size / 1024,
                            resource.byte_len / 1024,
                        ))
                        .size(12)
                        .font(BODY_FONT),
                    ].spacing(6).into(),
                    _ => text(format!("Compressing {}...", preview.entry_name))
                        .size(12)
                        .font(BODY_FONT)
                        .into(),
                };

                let download_button = if self.is_exporting {
                    button("Saving...").padding([6, 12])
                } else if self.session.is_compressing() {
                    button("Download").padding([6, 12])
                } else {
                    button("Download")
                        .on_press(Message::Download)
                        .padding([6, 12])
                };

                column![
                    text("Preview")
                        .size(16)
                        .font(HEADING_FONT),
                    body,
                    row![
                        button("Cancel")
                            .on_press(Message::HidePreview)
                            .padding([6, 12]),
                        download_button,
                    ].spacing(8),
                ].spacing(8)
            }
            None => column![],
        };

        // Status
        let status_section = if self.status_message.is_empty() {
            column![]
        } else {
            column![
                row![
                    text(&self.status_message)
                        .size(12)
                        .font(BODY_FONT)
                        .width(Length::Fill),
                    if self.last_saved.is_some() {
                        button("Open Folder")
                            .on_press(Message::OpenDownloadFolder)
                            .padding([4, 10])
                    } else {
                        button("Open Folder").padding([4, 10])
                    },
                ].spacing(8),
            ]
        };

        // Main layout
        let content = column![
            title,
            Space::with_height(12),
            upload,
            Space::with_height(8),
            error_section,
            Space::with_height(8),
            files_section,
            Space::with_height(12),
            settings,
            Space::with_height(12),
            preview_section,
            Space::with_height(8),
            status_section,
        ]
        .padding(16);

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }
}

impl ImageZipper {
    fn load(&mut self, paths: Vec<PathBuf>) -> Command<Message> {
        if paths.is_empty() {
            return Command::none();
        }
        self.is_loading = true;
        Command::perform(intake::load_files(paths), Message::FilesLoaded)
    }

    /// Drops the displayed image once the session no longer holds its bytes.
    fn sync_preview_image(&mut self) {
        if self.session.preview().and_then(|p| p.compressed).is_none() {
            self.preview_image = None;
        }
    }
}

// Helper functions
async fn select_files() -> Option<Vec<PathBuf>> {
    rfd::AsyncFileDialog::new()
        .add_filter("Images", &PICKER_EXTENSIONS)
        .pick_files()
        .await
        .map(|handles| handles.iter().map(|handle| handle.path().to_path_buf()).collect())
}

/// Asks where to put the archive, starting in the Downloads folder.
/// `Ok(None)` means the dialog was cancelled.
async fn save_archive(download: Download) -> Result<Option<PathBuf>, ZipperError> {
    let mut dialog = rfd::AsyncFileDialog::new()
        .add_filter("Zip archive", &["zip"])
        .set_file_name(ARCHIVE_NAME);
    if let Some(dir) = dirs::download_dir() {
        dialog = dialog.set_directory(dir);
    }

    match dialog.save_file().await {
        Some(handle) => archive::save_download(download, handle.path().to_path_buf())
            .await
            .map(Some),
        None => Ok(None),
    }
}
