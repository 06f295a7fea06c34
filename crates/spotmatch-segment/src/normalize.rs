use image::{RgbImage, imageops};
use spotmatch_types::SampleName;

use crate::blobs::{fill_blobs, find_blobs, select_blobs};
use crate::config::{ColorRange, SegmentationConfig};
use crate::error::NormalizeError;
use crate::geometry::{Point, RotatedRect, min_area_rect};
use crate::photo::Photograph;
use crate::region;
use crate::transform::{Affine, rect_sub_pix, warp_affine};

/// A cropped, upright and flip-corrected photograph. `mask` holds the
/// pattern-only pixels, `image` the untouched colors, pixel-aligned.
#[derive(Clone, Debug)]
pub struct NormalizedSample {
    pub name: SampleName,
    pub mask: RgbImage,
    pub image: RgbImage,
}

impl NormalizedSample {
    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn area(&self) -> u64 {
        self.height() as u64 * self.width() as u64
    }
}

pub struct Normalizer {
    config: SegmentationConfig,
}

impl Normalizer {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Runs the full chain on an already upright photograph.
    pub fn normalize(&self, photo: &Photograph) -> Result<NormalizedSample, NormalizeError> {
        let pixels = photo.pixels();
        let extraction = region::extract(pixels, &self.config.region);

        let blobs = find_blobs(&extraction.contour_input);
        let found = blobs.len();
        let kept = select_blobs(blobs, &self.config.blobs);
        if kept.is_empty() {
            return Err(NormalizeError::Segmentation {
                found,
                min_area: self.config.blobs.min_area,
            });
        }

        let filled = fill_blobs(&kept, pixels.width(), pixels.height());
        let pattern = region::apply_mask(pixels, &filled);
        let boundary: Vec<Point> = kept.iter().flat_map(|blob| blob.boundary()).collect();
        let rect = min_area_rect(&boundary)
            .ok_or_else(|| NormalizeError::geometry("no boundary points to fit"))?;

        let (mask, image) = crop_and_rotate(&pattern, pixels, &rect, self.config.mult)?;
        let (mask, image) = flip_correct(mask, image, &self.config.region.range)?;
        Ok(NormalizedSample {
            name: photo.name().clone(),
            mask,
            image,
        })
    }
}

/// Cuts an axis-aligned window `mult` times the box span around the box,
/// turns it upright by the box angle and keeps the central `mult`-expanded
/// box. Both buffers receive the identical transform.
pub fn crop_and_rotate(
    pattern: &RgbImage,
    image: &RgbImage,
    rect: &RotatedRect,
    mult: f64,
) -> Result<(RgbImage, RgbImage), NormalizeError> {
    let corners = rect.corners().map(|p| (p.x as i64, p.y as i64));
    let x1 = corners.iter().map(|c| c.0).min().unwrap_or(0);
    let x2 = corners.iter().map(|c| c.0).max().unwrap_or(0);
    let y1 = corners.iter().map(|c| c.1).min().unwrap_or(0);
    let y2 = corners.iter().map(|c| c.1).max().unwrap_or(0);

    let mut angle = rect.angle;
    let (mut box_w, mut box_h) = (rect.width, rect.height);
    if angle < -45.0 {
        angle += 90.0;
        std::mem::swap(&mut box_w, &mut box_h);
    }

    let center = (
        ((x1 + x2) as f64 / 2.0).trunc(),
        ((y1 + y2) as f64 / 2.0).trunc(),
    );
    let window = (
        (mult * (x2 - x1) as f64) as u32,
        (mult * (y2 - y1) as f64) as u32,
    );
    let target = ((box_w * mult) as u32, (box_h * mult) as u32);
    if window.0 == 0 || window.1 == 0 {
        return Err(NormalizeError::geometry(format!(
            "crop window collapsed to {}x{}",
            window.0, window.1
        )));
    }
    if target.0 == 0 || target.1 == 0 {
        return Err(NormalizeError::geometry(format!(
            "bounding box {:.1}x{:.1} has no area",
            box_w, box_h
        )));
    }

    let pivot = (window.0 as f64 / 2.0, window.1 as f64 / 2.0);
    let map = Affine::rotation(pivot, angle);
    let cut = |src: &RgbImage| -> Result<RgbImage, NormalizeError> {
        let region = rect_sub_pix(src, window, center);
        let turned = warp_affine(&region, &map, window)
            .ok_or_else(|| NormalizeError::geometry("rotation is not invertible"))?;
        Ok(rect_sub_pix(&turned, target, pivot))
    };
    Ok((cut(pattern)?, cut(image)?))
}

/// Angle in degrees from the sample centre to the centroid of its pattern
/// pixels, snapped to the nearest quarter turn.
pub fn flip_angle(mask: &RgbImage, range: &ColorRange) -> Result<f64, NormalizeError> {
    let binary = region::in_range(mask, range);
    let (mut count, mut sum_x, mut sum_y) = (0u64, 0u64, 0u64);
    for (x, y, pixel) in binary.enumerate_pixels() {
        if pixel.0[0] != 0 {
            count += 1;
            sum_x += x as u64;
            sum_y += y as u64;
        }
    }
    if count == 0 {
        return Err(NormalizeError::geometry(
            "pattern centroid undefined: no pixels left after re-threshold",
        ));
    }
    let cx = (sum_x / count) as f64;
    let cy = (sum_y / count) as f64;
    let dy = cy - binary.height() as f64 / 2.0;
    let dx = cx - binary.width() as f64 / 2.0;
    let angle = dy.atan2(dx).to_degrees();
    Ok(90.0 * (angle / 90.0).round_ties_even())
}

/// Turns the sample so its pattern mass points at the canonical edge, then
/// forces landscape. A sample already in canonical orientation is returned
/// untouched.
pub fn flip_correct(
    mask: RgbImage,
    image: RgbImage,
    range: &ColorRange,
) -> Result<(RgbImage, RgbImage), NormalizeError> {
    let rounded = flip_angle(&mask, range)?;
    let (mask, image) = if rounded == 0.0 {
        (mask, image)
    } else {
        let size = mask.dimensions();
        let map = Affine::rotation((size.0 as f64 / 2.0, size.1 as f64 / 2.0), rounded);
        let warp = |src: &RgbImage| {
            warp_affine(src, &map, size)
                .ok_or_else(|| NormalizeError::geometry("flip rotation is not invertible"))
        };
        (warp(&mask)?, warp(&image)?)
    };

    if mask.height() > mask.width() {
        Ok((imageops::rotate270(&mask), imageops::rotate270(&image)))
    } else {
        Ok((mask, image))
    }
}
