// compression.rs - Preview compression pipeline: decode, scale to width, re-encode

use crate::error::{ZipperError, ZipperResult};
use crate::store::ImageEntry;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::fmt;
use std::io::Cursor;
use tracing::debug;

pub const DEFAULT_TARGET_WIDTH: u32 = 350;
pub const DEFAULT_QUALITY: u8 = 80;
pub const MAX_TARGET_WIDTH: u32 = 4096;

/// Largest surface the pipeline will allocate, in pixels (RGBA8, 64 MiB).
pub const MAX_OUTPUT_PIXELS: u64 = 4096 * 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub const ALL: &'static [OutputFormat] = &[OutputFormat::Jpeg, OutputFormat::Png];

    pub fn supports_quality(&self) -> bool {
        matches!(self, Self::Jpeg)
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => write!(f, "JPEG"),
            Self::Png => write!(f, "PNG (lossless)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Every preview is scaled to exactly this width.
    pub target_width: u32,
    /// JPEG quality in percent. Ignored for PNG.
    pub quality: u8,
    pub format: OutputFormat,
}

impl CompressionOptions {
    pub fn validate(&self) -> ZipperResult<()> {
        if !(1..=MAX_TARGET_WIDTH).contains(&self.target_width) {
            return Err(ZipperError::setting(format!(
                "width must be between 1 and {} px, got {}",
                MAX_TARGET_WIDTH, self.target_width
            )));
        }
        Ok(())
    }
}

/// Parses the width field. Values outside 1..=MAX_TARGET_WIDTH are rejected.
pub fn parse_target_width(input: &str) -> ZipperResult<u32> {
    let width = input
        .trim()
        .parse::<u32>()
        .map_err(|_| ZipperError::setting(format!("width must be a whole number, got {:?}", input.trim())))?;
    CompressionOptions {
        target_width: width,
        ..CompressionOptions::default()
    }
    .validate()?;
    Ok(width)
}

/// Fails before allocating if the output surface would exceed `MAX_OUTPUT_PIXELS`.
pub fn check_output_size(width: u32, height: u32) -> ZipperResult<()> {
    let pixels = width as u64 * height as u64;
    if pixels > MAX_OUTPUT_PIXELS {
        return Err(ZipperError::encode(format!(
            "scaled image would be {}x{} ({} pixels, limit {})",
            width, height, pixels, MAX_OUTPUT_PIXELS
        )));
    }
    Ok(())
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            quality: DEFAULT_QUALITY,
            format: OutputFormat::default(),
        }
    }
}

/// Encoded preview bytes plus what the UI shows about them.
#[derive(Clone)]
pub struct CompressedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
}

impl fmt::Debug for CompressedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedImage")
            .field("data", &self.data.len())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("source_width", &self.source_width)
            .field("source_height", &self.source_height)
            .finish()
    }
}

/// Output size for a source scaled to `target_width`. Height keeps the
/// aspect ratio, rounded half up, and never drops below one pixel.
pub fn target_dimensions(source_width: u32, source_height: u32, target_width: u32) -> (u32, u32) {
    let width = target_width.max(1);
    if source_width == 0 {
        return (width, 1);
    }
    let scaled = (source_height as u64 * width as u64 * 2 + source_width as u64) / (source_width as u64 * 2);
    (width, scaled.clamp(1, u32::MAX as u64) as u32)
}

pub struct Compressor {
    options: CompressionOptions,
}

impl Compressor {
    pub fn new(options: CompressionOptions) -> Self {
        Self { options }
    }

    pub fn compress(&self, bytes: &[u8]) -> ZipperResult<CompressedImage> {
        self.options.validate()?;
        let source = self.decode(bytes)?;
        let (source_width, source_height) = source.dimensions();
        let (width, height) = target_dimensions(source_width, source_height, self.options.target_width);
        check_output_size(width, height)?;

        let rendered = source.resize_exact(width, height, FilterType::Lanczos3);

        let data = match self.options.format {
            OutputFormat::Jpeg => self.encode_jpeg(&rendered)?,
            OutputFormat::Png => self.encode_png(&rendered)?,
        };

        debug!(
            "Compressed {}x{} -> {}x{} {:?}, {} -> {} bytes",
            source_width,
            source_height,
            width,
            height,
            self.options.format,
            bytes.len(),
            data.len()
        );

        Ok(CompressedImage {
            data,
            format: self.options.format,
            width,
            height,
            source_width,
            source_height,
        })
    }

    fn decode(&self, bytes: &[u8]) -> ZipperResult<DynamicImage> {
        let image = image::load_from_memory(bytes).map_err(ZipperError::decode)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ZipperError::DecodeFailure("image has no pixels".into()));
        }
        Ok(image)
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> ZipperResult<Vec<u8>> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let quality = self.options.quality.clamp(1, 100);

        let mut buffer = Cursor::new(Vec::new());
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder).map_err(ZipperError::encode)?;

        Ok(buffer.into_inner())
    }

    fn encode_png(&self, image: &DynamicImage) -> ZipperResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            &mut buffer,
            image::codecs::png::CompressionType::Best,
            image::codecs::png::FilterType::Adaptive,
        );
        image.write_with_encoder(encoder).map_err(ZipperError::encode)?;

        Ok(buffer.into_inner())
    }
}

/// Runs the pipeline for one entry on the blocking pool.
pub async fn compress(entry: ImageEntry, options: CompressionOptions) -> ZipperResult<CompressedImage> {
    let name = entry.display_name.clone();
    tokio::task::spawn_blocking(move || Compressor::new(options).compress(&entry.bytes))
        .await
        .map_err(|e| ZipperError::DecodeFailure(format!("{}: {}", name, e)))?
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::store::FileList;
    use std::sync::Arc;

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions(1000, 500, 350), (350, 175));
        assert_eq!(target_dimensions(350, 350, 350), (350, 350));
        // 100 * 350 / 300 = 116.67
        assert_eq!(target_dimensions(300, 100, 350), (350, 117));
        // 3 * 350 / 1000 = 1.05
        assert_eq!(target_dimensions(1000, 3, 350), (350, 1));
        assert_eq!(target_dimensions(5000, 1, 350), (350, 1));
    }

    #[test]
    fn test_compress_scales_to_target_width() {
        let result = Compressor::new(CompressionOptions::default())
            .compress(&png_bytes(1000, 500))
            .unwrap();

        assert_eq!((result.width, result.height), (350, 175));
        assert_eq!((result.source_width, result.source_height), (1000, 500));
        assert_eq!(result.format, OutputFormat::Jpeg);

        let decoded = image::load_from_memory_with_format(&result.data, image::ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (350, 175));
    }

    #[test]
    fn test_small_images_are_scaled_up() {
        let result = Compressor::new(CompressionOptions::default())
            .compress(&jpeg_bytes(100, 40))
            .unwrap();

        assert_eq!((result.width, result.height), (350, 140));
    }

    #[test]
    fn test_transparent_png_encodes_as_jpeg() {
        let result = Compressor::new(CompressionOptions::default())
            .compress(&transparent_png_bytes(64, 64))
            .unwrap();

        assert_eq!(image::guess_format(&result.data).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_png_output() {
        let options = CompressionOptions {
            format: OutputFormat::Png,
            ..CompressionOptions::default()
        };
        let result = Compressor::new(options).compress(&png_bytes(700, 700)).unwrap();

        assert_eq!(image::guess_format(&result.data).unwrap(), image::ImageFormat::Png);
        assert_eq!((result.width, result.height), (350, 350));
        assert_eq!(result.format.file_extension(), "png");
    }

    #[test]
    fn test_lower_quality_gives_smaller_output() {
        let source = png_bytes(800, 600);
        let high = Compressor::new(CompressionOptions {
            quality: 95,
            ..CompressionOptions::default()
        })
        .compress(&source)
        .unwrap();
        let low = Compressor::new(CompressionOptions {
            quality: 10,
            ..CompressionOptions::default()
        })
        .compress(&source)
        .unwrap();

        assert!(low.data.len() < high.data.len());
    }

    #[test]
    fn test_tall_source_is_refused_before_resizing() {
        // 1x200000 scales to 350x70000000
        let err = Compressor::new(CompressionOptions::default())
            .compress(&png_bytes(1, 200_000))
            .unwrap_err();

        assert!(matches!(err, ZipperError::EncodeFailure(ref msg) if msg.contains("350x70000000")));
    }

    #[test]
    fn test_output_size_limit() {
        assert!(check_output_size(4096, 4096).is_ok());
        assert!(check_output_size(4096, 4097).is_err());
        assert!(check_output_size(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_oversized_target_width_is_rejected() {
        let options = CompressionOptions {
            target_width: 4_000_000_000,
            ..CompressionOptions::default()
        };

        let err = Compressor::new(options).compress(&png_bytes(4, 4)).unwrap_err();

        assert!(matches!(err, ZipperError::InvalidSetting(_)));
    }

    #[test]
    fn test_parse_target_width() {
        assert_eq!(parse_target_width(" 350 ").unwrap(), 350);
        assert_eq!(parse_target_width("4096").unwrap(), 4096);
        assert!(matches!(parse_target_width("0"), Err(ZipperError::InvalidSetting(_))));
        assert!(matches!(parse_target_width("4097"), Err(ZipperError::InvalidSetting(_))));
        assert!(matches!(parse_target_width("4000000000"), Err(ZipperError::InvalidSetting(_))));
        assert!(matches!(parse_target_width("wide"), Err(ZipperError::InvalidSetting(_))));
    }

    #[test]
    fn test_undecodable_bytes() {
        let err = Compressor::new(CompressionOptions::default())
            .compress(b"definitely not an image")
            .unwrap_err();

        assert!(matches!(err, ZipperError::DecodeFailure(_)));
    }

    #[tokio::test]
    async fn test_compress_entry_async() {
        let mut list = FileList::new();
        list.append(vec![(
            "wide.png".to_string(),
            "image/png".to_string(),
            Arc::from(png_bytes(1000, 500)),
        )]);
        let entry = list.get(0).unwrap().clone();

        let result = compress(entry, CompressionOptions::default()).await.unwrap();

        assert_eq!((result.width, result.height), (350, 175));
        assert!(!result.data.is_empty());
    }
}
