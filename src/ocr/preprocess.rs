use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{
    filter::{median_filter, separable_filter_equal},
    morphology::{grayscale_close, Mask},
};

use super::BinaryMask;
use crate::config::PreprocessConfig;
use crate::error::PipelineError;

/// Turn a grayscale ROI into a foreground mask.
///
/// Pipeline: CLAHE (local contrast) → median filter → inverted
/// Gaussian-weighted adaptive threshold → square closing.
///
/// Photographed displays rarely have even lighting, so a single global
/// threshold is not enough; the closing bridges strokes broken by glare.
pub fn binarize(roi: &GrayImage, cfg: &PreprocessConfig) -> Result<BinaryMask, PipelineError> {
    if roi.width() == 0 || roi.height() == 0 {
        return Err(PipelineError::EmptyRoi);
    }

    let enhanced = clahe(roi, cfg.clip_limit, cfg.tile_grid);
    let smoothed = if cfg.median_radius > 0 {
        median_filter(&enhanced, cfg.median_radius, cfg.median_radius)
    } else {
        enhanced
    };
    let thresh = adaptive_threshold_inv(&smoothed, cfg.threshold_block_size, cfg.threshold_offset);
    let closed = close_square(&thresh, cfg.close_kernel);

    Ok(BinaryMask::from_gray(closed))
}

// ── CLAHE ────────────────────────────────────────────────────────────────────

/// Contrast-limited adaptive histogram equalisation over a `grid`×`grid`
/// tiling.  Each tile gets its own clipped-histogram LUT; pixels blend the
/// LUTs of the four nearest tile centres bilinearly.
///
/// When the image does not divide evenly into tiles it is padded on the
/// right and bottom by reflection (`dcb|abcd|cba`), so every tile has the
/// same area.
pub fn clahe(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let tiles_x = grid.max(1);
    let tiles_y = grid.max(1);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    let padded = if tile_w * tiles_x == w && tile_h * tiles_y == h {
        img.clone()
    } else {
        GrayImage::from_fn(tile_w * tiles_x, tile_h * tiles_y, |x, y| {
            *img.get_pixel(reflect_101(x, w), reflect_101(y, h))
        })
    };

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, y0) = (tx * tile_w, ty * tile_h);
            luts.push(tile_lut(&padded, x0, y0, x0 + tile_w, y0 + tile_h, clip_limit));
        }
    }

    let last_x = tiles_x as i64 - 1;
    let last_y = tiles_y as i64 - 1;

    GrayImage::from_fn(w, h, |x, y| {
        let v = img.get_pixel(x, y)[0] as usize;

        let fx = x as f32 / tile_w as f32 - 0.5;
        let fy = y as f32 / tile_h as f32 - 0.5;
        let x1 = fx.floor() as i64;
        let y1 = fy.floor() as i64;
        let ax = fx - x1 as f32;
        let ay = fy - y1 as f32;

        let (x1c, x2c) = (x1.clamp(0, last_x), (x1 + 1).clamp(0, last_x));
        let (y1c, y2c) = (y1.clamp(0, last_y), (y1 + 1).clamp(0, last_y));
        let at = |tx: i64, ty: i64| luts[(ty * tiles_x as i64 + tx) as usize][v] as f32;

        let top = at(x1c, y1c) * (1.0 - ax) + at(x2c, y1c) * ax;
        let bottom = at(x1c, y2c) * (1.0 - ax) + at(x2c, y2c) * ax;
        let out = top * (1.0 - ay) + bottom * ay;
        Luma([out.round().clamp(0.0, 255.0) as u8])
    })
}

/// Index `i` folded back into `0..n` by mirroring about the edge pixels.
fn reflect_101(i: u32, n: u32) -> u32 {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let r = i % period;
    if r < n {
        r
    } else {
        period - r
    }
}

fn tile_lut(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut clipped = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        // Spread the excess evenly, then hand out the remainder at a stride.
        let redist = clipped / 256;
        let mut residual = clipped % 256;
        for bin in hist.iter_mut() {
            *bin += redist;
        }
        if residual > 0 {
            let step = (256 / residual as usize).max(1);
            let mut i = 0;
            while i < 256 && residual > 0 {
                hist[i] += 1;
                residual -= 1;
                i += step;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut sum = 0u32;
    for (bin, out) in hist.iter().zip(lut.iter_mut()) {
        sum += bin;
        *out = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

// ── Thresholding / morphology ────────────────────────────────────────────────

/// Foreground (255) where a pixel is at least `offset` darker than its
/// Gaussian-weighted neighbourhood mean, background (0) elsewhere.
///
/// The neighbourhood is exactly `block_size` pixels on a side (rounded up to
/// odd); borders replicate the edge pixels.
pub fn adaptive_threshold_inv(img: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let kernel = threshold_kernel(block_size);
    let levels: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
            Luma([img.get_pixel(x, y)[0] as f32])
        });
    let mean = separable_filter_equal(&levels, &kernel);

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let src = img.get_pixel(x, y)[0] as i32;
        let local = mean.get_pixel(x, y)[0].round() as i32;
        if src <= local - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Normalised 1-D Gaussian with `block_size` taps and the sigma usually
/// paired with that size: `0.3 * ((n - 1) / 2 - 1) + 0.8`.
fn threshold_kernel(block_size: u32) -> Vec<f32> {
    let taps = block_size.max(3) | 1;
    let sigma = 0.3 * ((taps as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (taps / 2) as f32;
    let mut kernel: Vec<f32> = (0..taps)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Dilate then erode with a `side`×`side` square anchored at its centre.
fn close_square(img: &GrayImage, side: u8) -> GrayImage {
    if side == 0 {
        return img.clone();
    }
    let element = GrayImage::from_pixel(side as u32, side as u32, Luma([255]));
    let mask = Mask::from_image(&element, side / 2, side / 2);
    grayscale_close(img, &mask)
}
