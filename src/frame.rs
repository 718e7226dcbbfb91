use std::path::Path;

use image::{imageops, imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use log::debug;

use crate::detector::Detection;
use crate::error::PipelineError;
use crate::ocr::Roi;

/// The photo scaled down to a fixed working height.
/// All pixel work (cropping, annotation) happens at this resolution.
pub struct WorkingFrame {
    pub image: RgbImage,
    pub gray: GrayImage,
    /// working height / original height.
    pub ratio: f64,
}

pub fn load_photo(path: &Path) -> Result<DynamicImage, PipelineError> {
    image::open(path)
        .map_err(|e| PipelineError::ImageLoadFailure(format!("{}: {e}", path.display())))
}

/// Resize to `working_height`, keeping the aspect ratio.
pub fn to_working(photo: &DynamicImage, working_height: u32) -> WorkingFrame {
    let (w, h) = (photo.width(), photo.height());
    let ratio = working_height as f64 / h.max(1) as f64;
    let new_w = ((w as f64 * ratio) as u32).max(1);
    let new_h = working_height.max(1);

    let image = photo
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();
    debug!("[frame] {w}×{h} → {new_w}×{new_h} (ratio {ratio:.4})");

    let gray = DynamicImage::ImageRgb8(image.clone()).to_luma8();
    WorkingFrame { image, gray, ratio }
}

/// Top-left corner and size of `det` in working-frame pixels.
///
/// The corner is truncated in original coordinates first, then every value
/// is scaled and truncated again.  May be negative or extend past the frame.
pub fn scale_box(det: &Detection, ratio: f64) -> (i64, i64, i64, i64) {
    let x = (det.x - det.width / 2.0) as i64;
    let y = (det.y - det.height / 2.0) as i64;
    let w = det.width as i64;
    let h = det.height as i64;
    (
        (x as f64 * ratio) as i64,
        (y as f64 * ratio) as i64,
        (w as f64 * ratio) as i64,
        (h as f64 * ratio) as i64,
    )
}

/// Grayscale ROI under `det`, clamped to the frame.
pub fn crop_roi(frame: &WorkingFrame, det: &Detection) -> Result<Roi, PipelineError> {
    let (x, y, w, h) = scale_box(det, frame.ratio);
    let (fw, fh) = (frame.gray.width() as i64, frame.gray.height() as i64);

    let x0 = x.clamp(0, fw);
    let y0 = y.clamp(0, fh);
    let x1 = (x + w).clamp(0, fw);
    let y1 = (y + h).clamp(0, fh);
    if x1 <= x0 || y1 <= y0 {
        return Err(PipelineError::EmptyRoi);
    }

    let (x0, y0) = (x0 as u32, y0 as u32);
    let (cw, ch) = ((x1 - x0 as i64) as u32, (y1 - y0 as i64) as u32);
    debug!("[frame] ROI {cw}×{ch} at ({x0}, {y0})");

    Ok(Roi {
        image: imageops::crop_imm(&frame.gray, x0, y0, cw, ch).to_image(),
        offset: (x0, y0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn frame(w: u32, h: u32) -> WorkingFrame {
        let image = RgbImage::from_fn(w, h, |x, _| Rgb([x as u8, 0, 0]));
        let gray = GrayImage::from_fn(w, h, |x, _| Luma([x as u8]));
        WorkingFrame {
            image,
            gray,
            ratio: 0.5,
        }
    }

    #[test]
    fn scale_box_truncates_like_integer_casts() {
        let det = Detection {
            x: 101.0,
            y: 75.0,
            width: 51.0,
            height: 41.0,
            confidence: 0.9,
            class: None,
        };
        // corner (75.5 → 75, 54.5 → 54), then × 0.5 and truncate.
        assert_eq!(scale_box(&det, 0.5), (37, 27, 25, 20));
    }

    #[test]
    fn to_working_keeps_aspect_ratio() {
        let photo = DynamicImage::ImageRgb8(RgbImage::new(1000, 2000));
        let wf = to_working(&photo, 500);
        assert_eq!(wf.image.dimensions(), (250, 500));
        assert_eq!(wf.gray.dimensions(), (250, 500));
        assert_eq!(wf.ratio, 0.25);
    }

    #[test]
    fn crop_is_clamped_to_the_frame() {
        let wf = frame(100, 80);
        // Box sticking out past the left and bottom edges.
        let det = Detection::from_top_left(-20.0, 100.0, 80.0, 100.0);
        let roi = crop_roi(&wf, &det).unwrap();
        assert_eq!(roi.offset, (0, 50));
        assert_eq!(roi.image.dimensions(), (30, 30));
        assert_eq!(roi.image.get_pixel(5, 0)[0], 5);
    }

    #[test]
    fn box_outside_the_frame_is_an_empty_roi() {
        let wf = frame(100, 80);
        let det = Detection::from_top_left(400.0, 10.0, 50.0, 50.0);
        assert_eq!(crop_roi(&wf, &det).unwrap_err(), PipelineError::EmptyRoi);
    }

    #[test]
    fn missing_photo_is_an_image_load_failure() {
        assert!(matches!(
            load_photo(Path::new("/nope/photo.jpg")),
            Err(PipelineError::ImageLoadFailure(_))
        ));
    }
}
