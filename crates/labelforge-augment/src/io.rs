//! Image decode and deterministic encode.
//!
//! All augmented output goes through one save routine: PNG uses fixed
//! compression and filter settings so identical pixels produce identical
//! bytes; formats without an alpha channel get alpha stripped first.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{DynamicImage, RgbaImage};
use thiserror::Error;

/// Errors from image IO.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("image file '{path}' not found")]
    Missing { path: String },

    #[error("failed to decode '{path}': {reason}")]
    Decode { path: String, reason: String },

    #[error("failed to encode '{path}': {reason}")]
    Encode { path: String, reason: String },

    #[error("unsupported output extension '{0}'")]
    UnsupportedExtension(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decodes an image into RGBA.
pub fn load_rgba(path: &Path) -> Result<RgbaImage, ImageIoError> {
    if !path.exists() {
        return Err(ImageIoError::Missing {
            path: path.display().to_string(),
        });
    }
    let img = image::open(path).map_err(|e| ImageIoError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(img.to_rgba8())
}

/// Saves an RGBA buffer with the format implied by `ext`.
///
/// `jpg` and `bmp` strip alpha; `png` uses fixed encoder settings for
/// byte-stable output.
pub fn save_rgba(img: &RgbaImage, path: &Path, ext: &str) -> Result<(), ImageIoError> {
    let encode_err = |e: String| ImageIoError::Encode {
        path: path.display().to_string(),
        reason: e,
    };

    match ext {
        "png" => save_png(img, path),
        "jpg" | "jpeg" => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, 90);
            encoder
                .encode_image(&rgb)
                .map_err(|e| encode_err(e.to_string()))
        }
        "webp" => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            image::codecs::webp::WebPEncoder::new_lossless(writer)
                .encode(
                    img.as_raw(),
                    img.width(),
                    img.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| encode_err(e.to_string()))
        }
        "bmp" => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            image::codecs::bmp::BmpEncoder::new(&mut writer)
                .encode(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| encode_err(e.to_string()))
        }
        "tiff" | "tif" => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            image::codecs::tiff::TiffEncoder::new(writer)
                .encode(
                    img.as_raw(),
                    img.width(),
                    img.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| encode_err(e.to_string()))
        }
        other => Err(ImageIoError::UnsupportedExtension(other.to_string())),
    }
}

/// PNG with fixed compression and no filtering, so the same pixels always
/// serialize to the same bytes.
fn save_png(img: &RgbaImage, path: &Path) -> Result<(), ImageIoError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, img.width(), img.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);
    encoder.set_filter(png::FilterType::NoFilter);

    let map_err = |e: png::EncodingError| ImageIoError::Encode {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut png_writer = encoder.write_header().map_err(map_err)?;
    png_writer.write_image_data(img.as_raw()).map_err(map_err)?;
    Ok(())
}

/// Replaces characters that are awkward in file names.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// File name for an augmented output:
/// `{dataset_name}_{source_stem}__cfg{config_id}.{ext}`.
///
/// The dataset prefix avoids collisions across merged datasets.
pub fn augmented_file_name(dataset_name: &str, stem: &str, config_id: &str, ext: &str) -> String {
    format!(
        "{}_{}__cfg{}.{}",
        sanitize_component(dataset_name),
        sanitize_component(stem),
        config_id,
        ext
    )
}

/// File name for a passed-through original: `{dataset_name}_{source_stem}.{ext}`.
pub fn original_file_name(dataset_name: &str, stem: &str, ext: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_component(dataset_name),
        sanitize_component(stem),
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(20, 10, |x, y| {
            Rgba([(x * 12) as u8, (y * 25) as u8, 7, 255])
        })
    }

    #[test]
    fn test_missing_file_is_distinguished() {
        let err = load_rgba(Path::new("/nonexistent/file.png")).unwrap_err();
        assert!(matches!(err, ImageIoError::Missing { .. }));
    }

    #[test]
    fn test_png_round_trip_and_stability() {
        let dir = tempfile::tempdir().unwrap();
        let img = sample();

        let p1 = dir.path().join("a.png");
        let p2 = dir.path().join("b.png");
        save_rgba(&img, &p1, "png").unwrap();
        save_rgba(&img, &p2, "png").unwrap();

        assert_eq!(std::fs::read(&p1).unwrap(), std::fs::read(&p2).unwrap());
        let back = load_rgba(&p1).unwrap();
        assert_eq!(back.as_raw(), img.as_raw());
    }

    #[test]
    fn test_jpeg_strips_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let img = sample();
        let path = dir.path().join("a.jpg");
        save_rgba(&img, &path, "jpg").unwrap();
        let back = load_rgba(&path).unwrap();
        assert_eq!(back.dimensions(), img.dimensions());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_rgba(&sample(), &dir.path().join("a.gif"), "gif").unwrap_err();
        assert!(matches!(err, ImageIoError::UnsupportedExtension(_)));
    }

    #[test]
    fn test_output_names() {
        assert_eq!(
            augmented_file_name("street scenes", "frame 01", "3", "png"),
            "street_scenes_frame_01__cfg3.png"
        );
        assert_eq!(
            original_file_name("street", "frame_01", "jpg"),
            "street_frame_01.jpg"
        );
    }
}
