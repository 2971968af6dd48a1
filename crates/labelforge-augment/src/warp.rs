//! Image resampling under a homography.
//!
//! Exact integer paths (flips, 90-degree rotations, crops, resizes) go
//! through `image::imageops`; everything else inverse-maps each destination
//! pixel through the stage homography and samples bilinearly.

use image::{imageops, Rgba, RgbaImage};

use crate::geometry::Homography;

/// Warps `src` into a `out_w` x `out_h` canvas under the forward mapping
/// `h`. Pixels that map outside the source become transparent black.
pub fn warp_bilinear(
    src: &RgbaImage,
    h: &Homography,
    out_w: u32,
    out_h: u32,
) -> Option<RgbaImage> {
    let inv = h.inverse()?;
    let (src_w, src_h) = src.dimensions();
    let mut out = RgbaImage::new(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            // Map the destination pixel center back into the source
            let [sx, sy] = inv.apply([x as f64 + 0.5, y as f64 + 0.5]);
            let sx = sx - 0.5;
            let sy = sy - 0.5;
            if sx < -1.0 || sy < -1.0 || sx > src_w as f64 || sy > src_h as f64 {
                continue;
            }
            out.put_pixel(x, y, sample_bilinear(src, sx, sy));
        }
    }
    Some(out)
}

/// Bilinear sample at a continuous source position (pixel-index space).
/// Out-of-bounds taps contribute transparent black.
fn sample_bilinear(src: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (w, h) = src.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let tap = |ix: f64, iy: f64| -> [f64; 4] {
        if ix < 0.0 || iy < 0.0 || ix >= w as f64 || iy >= h as f64 {
            [0.0; 4]
        } else {
            let p = src.get_pixel(ix as u32, iy as u32);
            [p.0[0] as f64, p.0[1] as f64, p.0[2] as f64, p.0[3] as f64]
        }
    };

    let p00 = tap(x0, y0);
    let p10 = tap(x0 + 1.0, y0);
    let p01 = tap(x0, y0 + 1.0);
    let p11 = tap(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Exact horizontal flip.
pub fn flip_horizontal(src: &RgbaImage) -> RgbaImage {
    imageops::flip_horizontal(src)
}

/// Exact vertical flip.
pub fn flip_vertical(src: &RgbaImage) -> RgbaImage {
    imageops::flip_vertical(src)
}

/// Exact rotation by a multiple of 90 degrees clockwise.
///
/// `quarter_turns` is taken modulo 4; 0 clones the source.
pub fn rotate_quarter(src: &RgbaImage, quarter_turns: u32) -> RgbaImage {
    match quarter_turns % 4 {
        1 => imageops::rotate90(src),
        2 => imageops::rotate180(src),
        3 => imageops::rotate270(src),
        _ => src.clone(),
    }
}

/// Bilinear resize to exact dimensions.
pub fn resize(src: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    imageops::resize(src, w, h, imageops::FilterType::Triangle)
}

/// Resize with an explicit filter chosen from the resize `interpolation`
/// option.
pub fn resize_with(src: &RgbaImage, w: u32, h: u32, interpolation: &str) -> RgbaImage {
    let filter = match interpolation {
        "nearest" => imageops::FilterType::Nearest,
        "cubic" => imageops::FilterType::CatmullRom,
        _ => imageops::FilterType::Triangle,
    };
    imageops::resize(src, w, h, filter)
}

/// Exact crop of the rectangle at (x, y) with the given size, clamped to
/// the source bounds.
pub fn crop(src: &RgbaImage, x: u32, y: u32, w: u32, h: u32) -> RgbaImage {
    let (src_w, src_h) = src.dimensions();
    let x = x.min(src_w.saturating_sub(1));
    let y = y.min(src_h.saturating_sub(1));
    let w = w.min(src_w - x);
    let h = h.min(src_h - y);
    imageops::crop_imm(src, x, y, w, h).to_image()
}
