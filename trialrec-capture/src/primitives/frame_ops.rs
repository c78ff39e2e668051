use crate::capture::CaptureFrame;
use crate::error::{Error, Result};
use fast_image_resize::{
    images::{Image, ImageRef},
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static RESIZER: OnceLock<Mutex<Resizer>> = OnceLock::new();

/// Scale a grabbed frame to `width`x`height` and drop the alpha channel.
pub fn normalize_frame(frame: &CaptureFrame, width: u32, height: u32) -> Result<RgbImage> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.width == 0 || frame.height == 0 || frame.rgba.len() < expected {
        return Err(Error::ScreenshotFailed(format!(
            "frame buffer of {} bytes does not hold {}x{} RGBA",
            frame.rgba.len(),
            frame.width,
            frame.height
        )));
    }

    let rgba = if frame.width == width && frame.height == height {
        frame.rgba[..expected].to_vec()
    } else {
        let src = ImageRef::new(frame.width, frame.height, &frame.rgba[..expected], PixelType::U8x4)
            .map_err(|e| Error::ScreenshotFailed(format!("Resize source error: {}", e)))?;
        let mut dst = Image::new(width, height, PixelType::U8x4);
        let opts = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));

        let resizer = RESIZER.get_or_init(|| Mutex::new(Resizer::new()));
        let mut resizer = resizer
            .lock()
            .map_err(|_| Error::ScreenshotFailed("Resize lock poisoned".into()))?;
        resizer
            .resize(&src, &mut dst, Some(&opts))
            .map_err(|e| Error::ScreenshotFailed(format!("Resize failed: {}", e)))?;
        dst.into_vec()
    };

    let rgb = rgba_to_rgb(&rgba);
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| Error::ScreenshotFailed("Failed to create image buffer".into()))
}

pub fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

/// Encodes and persists frame images.
pub trait ImageWriter: Send + Sync {
    fn write_image(&self, path: &Path, image: &RgbImage) -> Result<()>;

    /// File extension including the dot, e.g. `.jpg`
    fn extension(&self) -> &str;
}

/// Lossy JPEG output at a fixed quality
pub struct JpegWriter {
    quality: u8,
}

impl JpegWriter {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl ImageWriter for JpegWriter {
    fn write_image(&self, path: &Path, image: &RgbImage) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut out, self.quality).encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;
        out.flush()?;
        Ok(())
    }

    fn extension(&self) -> &str {
        ".jpg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, px: [u8; 4]) -> CaptureFrame {
        CaptureFrame {
            rgba: px.repeat((width * height) as usize),
            width,
            height,
        }
    }

    #[test]
    fn normalize_downscales_and_drops_alpha() {
        let frame = solid_frame(64, 32, [200, 100, 50, 255]);
        let out = normalize_frame(&frame, 16, 16).expect("normalize");
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.get_pixel(8, 8).0, [200, 100, 50]);
    }

    #[test]
    fn normalize_keeps_matching_size() {
        let mut frame = solid_frame(2, 1, [0, 0, 0, 255]);
        frame.rgba[4..8].copy_from_slice(&[9, 8, 7, 0]);
        let out = normalize_frame(&frame, 2, 1).expect("normalize");
        assert_eq!(out.as_raw(), &vec![0, 0, 0, 9, 8, 7]);
    }

    #[test]
    fn normalize_rejects_short_buffer() {
        let frame = CaptureFrame {
            rgba: vec![0; 10],
            width: 2,
            height: 2,
        };
        assert!(matches!(
            normalize_frame(&frame, 2, 2),
            Err(Error::ScreenshotFailed(_))
        ));
    }

    #[test]
    fn jpeg_writer_produces_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0.jpg");
        let image = RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
        let writer = JpegWriter::new(70);
        writer.write_image(&path, &image).expect("write");
        let back = image::open(&path).expect("decode");
        assert_eq!((back.width(), back.height()), (8, 8));
        assert_eq!(writer.extension(), ".jpg");
    }
}
