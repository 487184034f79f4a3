//! Signature image decoding
//!
//! Formats are probed by attempting a full decode with each strategy in
//! order; the first one that succeeds wins. New formats plug in as another
//! [`DecodeStrategy`] without touching callers.

use std::io::Cursor;

use image::GenericImageView;
use tracing::debug;

use crate::error::SignError;
use crate::geometry;

/// Longest accepted image side in pixels
pub const MAX_IMAGE_SIDE: u32 = 10_000;
/// Largest accepted image area; caps the decode buffer at ~100 MB of RGBA
pub const MAX_IMAGE_PIXELS: u64 = 25_000_000;

/// Reject header dimensions before any pixel buffer is allocated
fn check_dimensions(width: u32, height: u32) -> Result<(), String> {
    if width > MAX_IMAGE_SIDE
        || height > MAX_IMAGE_SIDE
        || width as u64 * height as u64 > MAX_IMAGE_PIXELS
    {
        return Err(format!(
            "image dimensions {}x{} exceed the {} px / {} px limit",
            width, height, MAX_IMAGE_SIDE, MAX_IMAGE_PIXELS
        ));
    }
    Ok(())
}

/// Raster formats accepted for signature images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Map a declared MIME type (e.g. from a data URL) to a known format
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Color model of decoded pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
}

impl ColorSpace {
    pub fn components(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }

    /// PDF color space name for image XObjects
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Gray => "DeviceGray",
            Self::Rgb => "DeviceRGB",
        }
    }
}

/// 8-bit pixel data at native scale, color and alpha planes kept apart
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub pixels: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl DecodedImage {
    pub fn aspect_ratio(&self) -> Result<f64, SignError> {
        geometry::aspect_ratio(self.width, self.height)
    }
}

/// One way of turning bytes into pixels
pub trait DecodeStrategy: Send + Sync {
    fn format(&self) -> ImageFormat;

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, String>;
}

/// Lossless PNG decoding, palettes and tRNS expanded into 8-bit planes
pub struct PngStrategy;

impl DecodeStrategy for PngStrategy {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, String> {
        let mut decoder = png::Decoder::new(bytes);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
        let header = reader.info();
        check_dimensions(header.width, header.height)?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(|e| e.to_string())?;
        let data = &buf[..info.buffer_size()];

        let (color_space, has_alpha) = match info.color_type {
            png::ColorType::Grayscale => (ColorSpace::Gray, false),
            png::ColorType::GrayscaleAlpha => (ColorSpace::Gray, true),
            png::ColorType::Rgb => (ColorSpace::Rgb, false),
            png::ColorType::Rgba => (ColorSpace::Rgb, true),
            png::ColorType::Indexed => return Err("palette was not expanded".to_string()),
        };

        let (pixels, alpha) = if has_alpha {
            split_alpha(data, color_space.components())
        } else {
            (data.to_vec(), None)
        };

        Ok(DecodedImage {
            format: ImageFormat::Png,
            width: info.width,
            height: info.height,
            color_space,
            pixels,
            alpha,
        })
    }
}

/// Lossy JPEG decoding; CMYK and other models are converted to RGB
pub struct JpegStrategy;

impl DecodeStrategy for JpegStrategy {
    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, String> {
        let mut limits = image::io::Limits::default();
        limits.max_image_width = Some(MAX_IMAGE_SIDE);
        limits.max_image_height = Some(MAX_IMAGE_SIDE);
        limits.max_alloc = Some(MAX_IMAGE_PIXELS * 4);

        let mut reader = image::io::Reader::with_format(Cursor::new(bytes), image::ImageFormat::Jpeg);
        reader.limits(limits);
        let img = reader.decode().map_err(|e| e.to_string())?;
        let (width, height) = img.dimensions();
        check_dimensions(width, height)?;

        let (color_space, pixels) = match img {
            image::DynamicImage::ImageLuma8(gray) => (ColorSpace::Gray, gray.into_raw()),
            other => (ColorSpace::Rgb, other.to_rgb8().into_raw()),
        };

        Ok(DecodedImage {
            format: ImageFormat::Jpeg,
            width,
            height,
            color_space,
            pixels,
            alpha: None,
        })
    }
}

/// Split interleaved color+alpha samples into separate planes
fn split_alpha(data: &[u8], color_components: usize) -> (Vec<u8>, Option<Vec<u8>>) {
    let stride = color_components + 1;
    let pixel_count = data.len() / stride;
    let mut color = Vec::with_capacity(pixel_count * color_components);
    let mut alpha = Vec::with_capacity(pixel_count);

    for pixel in data.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..color_components]);
        alpha.push(pixel[color_components]);
    }

    (color, Some(alpha))
}

/// Ordered list of decode strategies
pub struct ImageDecoder {
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(vec![Box::new(PngStrategy), Box::new(JpegStrategy)])
    }
}

impl ImageDecoder {
    pub fn new(strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Decode with the first strategy that accepts the bytes
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, SignError> {
        for strategy in &self.strategies {
            match strategy.decode(bytes) {
                Ok(image) => return Ok(image),
                Err(e) => debug!("{:?} decode failed: {}", strategy.format(), e),
            }
        }
        Err(SignError::UnsupportedFormat)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Encode an RGBA PNG filled with a single color
    pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let data: Vec<u8> = (0..width * height)
                .flat_map(|i| [10, 20, 30, (i % 256) as u8])
                .collect();
            writer.write_image_data(&data).unwrap();
        }
        out
    }

    /// Encode an 8-bit grayscale PNG
    pub fn gray_png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let data = vec![128u8; (width * height) as usize];
            writer.write_image_data(&data).unwrap();
        }
        out
    }

    /// PNG whose IHDR declares `width`x`height` RGBA but carries no pixel data
    pub fn header_only_png(width: u32, height: u32) -> Vec<u8> {
        fn chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
            out.extend_from_slice(&(data.len() as u32).to_be_bytes());
            out.extend_from_slice(kind);
            out.extend_from_slice(data);
            let mut crc = flate2::Crc::new();
            crc.update(kind);
            crc.update(data);
            out.extend_from_slice(&crc.sum().to_be_bytes());
        }

        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&width.to_be_bytes());
        ihdr.extend_from_slice(&height.to_be_bytes());
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

        let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
        chunk(&mut out, b"IHDR", &ihdr);
        // Empty zlib stream
        chunk(&mut out, b"IDAT", &[0x78, 0x9c, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
        chunk(&mut out, b"IEND", &[]);
        out
    }

    /// Encode an RGB JPEG
    pub fn rgb_jpeg(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        let data = vec![200u8; (width * height * 3) as usize];
        image::codecs::jpeg::JpegEncoder::new(&mut out)
            .encode(&data, width, height, image::ColorType::Rgb8)
            .unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_png_with_alpha_is_split_into_planes() {
        let image = ImageDecoder::default().decode(&rgba_png(300, 100)).unwrap();

        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!((image.width, image.height), (300, 100));
        assert_eq!(image.color_space, ColorSpace::Rgb);
        assert_eq!(image.pixels.len(), 300 * 100 * 3);
        assert_eq!(image.alpha.as_ref().map(Vec::len), Some(300 * 100));
        assert_eq!(&image.pixels[..3], &[10, 20, 30]);
        assert!((image.aspect_ratio().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_grayscale_png_keeps_single_channel() {
        let image = ImageDecoder::default().decode(&gray_png(4, 8)).unwrap();

        assert_eq!(image.color_space, ColorSpace::Gray);
        assert_eq!(image.pixels.len(), 32);
        assert!(image.alpha.is_none());
    }

    #[test]
    fn test_jpeg_falls_back_after_png_fails() {
        let image = ImageDecoder::default().decode(&rgb_jpeg(64, 32)).unwrap();

        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!((image.width, image.height), (64, 32));
        assert_eq!(image.color_space, ColorSpace::Rgb);
        assert_eq!(image.pixels.len(), 64 * 32 * 3);
        assert!(image.alpha.is_none());
    }

    #[test]
    fn test_unknown_bytes_are_unsupported() {
        let result = ImageDecoder::default().decode(b"GIF89a not really an image");
        assert!(matches!(result, Err(SignError::UnsupportedFormat)));
    }

    #[test]
    fn test_empty_bytes_are_unsupported() {
        assert!(matches!(
            ImageDecoder::default().decode(&[]),
            Err(SignError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_truncated_png_is_unsupported() {
        let png = rgba_png(20, 20);
        let result = ImageDecoder::default().decode(&png[..png.len() / 2]);
        assert!(matches!(result, Err(SignError::UnsupportedFormat)));
    }

    #[test]
    fn test_huge_png_header_is_rejected_before_allocating() {
        let png = header_only_png(60_000, 60_000);
        assert!(png.len() < 100);

        assert!(PngStrategy.decode(&png).is_err());
        assert!(matches!(
            ImageDecoder::default().decode(&png),
            Err(SignError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_png_over_side_limit_is_rejected() {
        let png = header_only_png(MAX_IMAGE_SIDE + 1, 1);
        let err = PngStrategy.decode(&png).unwrap_err();
        assert!(err.contains("exceed"), "{}", err);
    }

    #[test]
    fn test_jpeg_over_side_limit_is_rejected() {
        let jpeg = rgb_jpeg(MAX_IMAGE_SIDE + 1, 1);
        assert!(JpegStrategy.decode(&jpeg).is_err());
        assert!(JpegStrategy.decode(&rgb_jpeg(64, 1)).is_ok());
    }

    #[test]
    fn test_dimension_limits() {
        assert!(check_dimensions(MAX_IMAGE_SIDE, 2_500).is_ok());
        assert!(check_dimensions(MAX_IMAGE_SIDE, MAX_IMAGE_SIDE).is_err());
        assert!(check_dimensions(MAX_IMAGE_SIDE + 1, 1).is_err());
        assert!(check_dimensions(1, MAX_IMAGE_SIDE + 1).is_err());
    }

    #[test]
    fn test_strategy_order_is_respected() {
        let jpeg_only = ImageDecoder::new(vec![Box::new(JpegStrategy)]);
        assert!(matches!(
            jpeg_only.decode(&rgba_png(2, 2)),
            Err(SignError::UnsupportedFormat)
        ));
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(ImageFormat::from_mime("image/png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_mime("IMAGE/JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_mime("image/gif"), None);
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_split_alpha_gray() {
        let (color, alpha) = split_alpha(&[1, 2, 3, 4], 1);
        assert_eq!(color, vec![1, 3]);
        assert_eq!(alpha, Some(vec![2, 4]));
    }
}
