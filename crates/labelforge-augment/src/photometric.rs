//! Photometric transforms.
//!
//! These adjust pixel values only; annotation geometry passes through
//! untouched. All stochastic work (noise, cutout holes) draws from the
//! step's own seed stream.

use image::{imageops, Rgba, RgbaImage};

use crate::rng::DeterministicRng;

#[inline]
fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Applies a per-channel map to RGB, leaving alpha alone.
fn map_rgb(img: &mut RgbaImage, f: impl Fn(u8) -> u8) {
    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        *pixel = Rgba([f(r), f(g), f(b), a]);
    }
}

/// Brightness shift by `percent` of full scale, in [-50, 50].
pub fn brightness(img: &mut RgbaImage, percent: f64) {
    let offset = 255.0 * percent / 100.0;
    map_rgb(img, |v| clamp_u8(v as f64 + offset));
}

/// Contrast scale about mid-gray by `percent`, in [-50, 50].
pub fn contrast(img: &mut RgbaImage, percent: f64) {
    let factor = (100.0 + percent) / 100.0;
    map_rgb(img, |v| clamp_u8((v as f64 - 127.5) * factor + 127.5));
}

/// Gaussian blur with sigma = `radius`.
pub fn blur(img: &RgbaImage, radius: f64) -> RgbaImage {
    imageops::blur(img, radius as f32)
}

/// Additive gaussian noise; `strength` is the standard deviation as a
/// percentage of full scale.
pub fn noise(img: &mut RgbaImage, strength: f64, rng: &mut DeterministicRng) {
    let sigma = 255.0 * strength / 100.0;
    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        *pixel = Rgba([
            clamp_u8(r as f64 + rng.normal() * sigma),
            clamp_u8(g as f64 + rng.normal() * sigma),
            clamp_u8(b as f64 + rng.normal() * sigma),
            a,
        ]);
    }
}

/// Gamma correction: `out = in^(1/gamma)`, so gamma above 1 brightens.
pub fn gamma_correction(img: &mut RgbaImage, gamma: f64) {
    let exp = 1.0 / gamma.max(1e-6);
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = clamp_u8(255.0 * (i as f64 / 255.0).powf(exp));
    }
    map_rgb(img, |v| lut[v as usize]);
}

/// Converts to luminance (BT.601 weights) while keeping the RGBA layout.
pub fn grayscale(img: &mut RgbaImage) {
    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let l = clamp_u8(0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64);
        *pixel = Rgba([l, l, l, a]);
    }
}

/// Per-channel histogram equalization.
pub fn equalize(img: &mut RgbaImage) {
    let (w, h) = img.dimensions();
    let total = (w * h) as f64;
    if total == 0.0 {
        return;
    }

    let mut luts = [[0u8; 256]; 3];
    for channel in 0..3 {
        let mut hist = [0u64; 256];
        for pixel in img.pixels() {
            hist[pixel.0[channel] as usize] += 1;
        }
        let mut cdf = 0u64;
        let mut cdf_min = None;
        let mut cdfs = [0u64; 256];
        for (i, &count) in hist.iter().enumerate() {
            cdf += count;
            cdfs[i] = cdf;
            if cdf_min.is_none() && count > 0 {
                cdf_min = Some(cdf);
            }
        }
        let cdf_min = cdf_min.unwrap_or(0) as f64;
        let denom = (total - cdf_min).max(1.0);
        for i in 0..256 {
            luts[channel][i] = clamp_u8(255.0 * (cdfs[i] as f64 - cdf_min) / denom);
        }
    }

    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        *pixel = Rgba([
            luts[0][r as usize],
            luts[1][g as usize],
            luts[2][b as usize],
            a,
        ]);
    }
}

/// Hue/saturation/brightness/contrast jitter.
///
/// `hue` is a shift in degrees, the rest are percentages.
pub fn color_jitter(
    img: &mut RgbaImage,
    hue: f64,
    saturation: f64,
    brightness_pct: f64,
    contrast_pct: f64,
) {
    let sat_factor = (1.0 + saturation / 100.0).max(0.0);
    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let (mut hh, mut ss, vv) = rgb_to_hsv(r, g, b);
        hh = (hh + hue).rem_euclid(360.0);
        ss = (ss * sat_factor).clamp(0.0, 1.0);
        let (r, g, b) = hsv_to_rgb(hh, ss, vv);
        *pixel = Rgba([r, g, b, a]);
    }
    if brightness_pct != 0.0 {
        brightness(img, brightness_pct);
    }
    if contrast_pct != 0.0 {
        contrast(img, contrast_pct);
    }
}

/// Contrast-limited adaptive histogram equalization on the luma channel.
///
/// The image is divided into `tile_grid` x `tile_grid` tiles; each tile's
/// histogram is clipped at `clip_limit` times the uniform bin height before
/// building its equalization LUT, and pixels interpolate bilinearly between
/// the four surrounding tile LUTs.
pub fn clahe(img: &mut RgbaImage, clip_limit: f64, tile_grid: u32) {
    let (w, h) = img.dimensions();
    let grid = tile_grid.max(1);
    if w == 0 || h == 0 {
        return;
    }
    let tile_w = w.div_ceil(grid);
    let tile_h = h.div_ceil(grid);

    let luma =
        |p: &Rgba<u8>| (0.299 * p.0[0] as f64 + 0.587 * p.0[1] as f64 + 0.114 * p.0[2] as f64);

    // Per-tile clipped-equalization LUTs
    let mut luts = vec![[0u8; 256]; (grid * grid) as usize];
    for ty in 0..grid {
        for tx in 0..grid {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            let count = ((x1 - x0) * (y1 - y0)) as f64;
            if count == 0.0 {
                continue;
            }

            let mut hist = [0f64; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[luma(img.get_pixel(x, y)) as usize] += 1.0;
                }
            }

            // Clip and redistribute the excess uniformly
            let limit = (clip_limit * count / 256.0).max(1.0);
            let mut excess = 0.0;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256.0;
            for bin in hist.iter_mut() {
                *bin += bonus;
            }

            let lut = &mut luts[(ty * grid + tx) as usize];
            let mut cdf = 0.0;
            for i in 0..256 {
                cdf += hist[i];
                lut[i] = clamp_u8(255.0 * cdf / count);
            }
        }
    }

    let lut_at = |tx: i64, ty: i64| {
        let tx = tx.clamp(0, grid as i64 - 1) as u32;
        let ty = ty.clamp(0, grid as i64 - 1) as u32;
        &luts[(ty * grid + tx) as usize]
    };

    for y in 0..h {
        for x in 0..w {
            let pixel = *img.get_pixel(x, y);
            let l = luma(&pixel);
            let bin = l as usize;

            // Position relative to tile centers
            let fx = (x as f64 - tile_w as f64 / 2.0) / tile_w as f64;
            let fy = (y as f64 - tile_h as f64 / 2.0) / tile_h as f64;
            let tx0 = fx.floor() as i64;
            let ty0 = fy.floor() as i64;
            let wx = fx - tx0 as f64;
            let wy = fy - ty0 as f64;

            let v00 = lut_at(tx0, ty0)[bin] as f64;
            let v10 = lut_at(tx0 + 1, ty0)[bin] as f64;
            let v01 = lut_at(tx0, ty0 + 1)[bin] as f64;
            let v11 = lut_at(tx0 + 1, ty0 + 1)[bin] as f64;
            let new_l = v00 * (1.0 - wx) * (1.0 - wy)
                + v10 * wx * (1.0 - wy)
                + v01 * (1.0 - wx) * wy
                + v11 * wx * wy;

            let scale = if l > 0.0 { new_l / l } else { 1.0 };
            let Rgba([r, g, b, a]) = pixel;
            img.put_pixel(
                x,
                y,
                Rgba([
                    clamp_u8(r as f64 * scale),
                    clamp_u8(g as f64 * scale),
                    clamp_u8(b as f64 * scale),
                    a,
                ]),
            );
        }
    }
}

/// Erases `num_holes` squares of side `hole_size` at seeded positions.
pub fn cutout(img: &mut RgbaImage, num_holes: u32, hole_size: u32, rng: &mut DeterministicRng) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || hole_size == 0 {
        return;
    }
    for _ in 0..num_holes {
        let cx = rng.gen_range(0..w);
        let cy = rng.gen_range(0..h);
        let half = hole_size / 2;
        let x0 = cx.saturating_sub(half);
        let y0 = cy.saturating_sub(half);
        let x1 = (cx + hole_size - half).min(w);
        let y1 = (cy + hole_size - half).min(h);
        for y in y0..y1 {
            for x in x0..x1 {
                let a = img.get_pixel(x, y).0[3];
                img.put_pixel(x, y, Rgba([0, 0, 0, a]));
            }
        }
    }
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (
        clamp_u8((r + m) * 255.0),
        clamp_u8((g + m) * 255.0),
        clamp_u8((b + m) * 255.0),
    )
}
