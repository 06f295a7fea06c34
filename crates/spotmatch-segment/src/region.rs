use image::{GrayImage, Luma, RgbImage};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{ColorRange, Hsv, RegionOptions};

/// Output of the region extractor for one photograph.
pub struct RegionExtraction {
    /// 255 where the pixel falls inside the color range.
    pub mask: GrayImage,
    /// Median-blurred color image restricted to `mask`.
    pub focal_regions: RgbImage,
    /// Binarized grey version of `focal_regions`, ready for blob labelling.
    pub contour_input: GrayImage,
}

impl RegionExtraction {
    pub fn foreground_pixels(&self) -> usize {
        self.contour_input.as_raw().iter().filter(|&&v| v != 0).count()
    }
}

pub fn extract(photo: &RgbImage, options: &RegionOptions) -> RegionExtraction {
    let mask = in_range(photo, &options.range);
    let focal = apply_mask(photo, &mask);
    let focal_regions = median_blur(&focal, options.kernel_size);
    let contour_input = binarize(&focal_regions, options.threshold);
    RegionExtraction {
        mask,
        focal_regions,
        contour_input,
    }
}

/// 8-bit HSV conversion with hue halved into `0..180`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    if max == 0 {
        return Hsv::new(0, 0, 0);
    }
    let diff = (max - min) as f32;
    let s = (diff * 255.0 / max as f32).round().min(255.0) as u8;
    if diff == 0.0 {
        return Hsv::new(0, s, v);
    }
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut h = if max as f32 == r {
        60.0 * (g - b) / diff
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let h = (h / 2.0).round() as u32 % 180;
    Hsv::new(h as u8, s, v)
}

pub fn in_range(image: &RgbImage, range: &ColorRange) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (dst, src) in mask.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = src.0;
        if range.contains(rgb_to_hsv(r, g, b)) {
            *dst = Luma([255]);
        }
    }
    mask
}

/// Keeps pixels of `image` where `mask` is non-zero, zeroing the rest.
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    let mut out = image.clone();
    for (pixel, keep) in out.pixels_mut().zip(mask.pixels()) {
        if keep.0[0] == 0 {
            pixel.0 = [0, 0, 0];
        }
    }
    out
}

/// Grey conversion followed by a strict `> threshold` binarization.
pub fn binarize(image: &RgbImage, threshold: u8) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = src.0;
        let grey = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        if grey.round() as u32 > threshold as u32 {
            *dst = Luma([255]);
        }
    }
    out
}

/// Per-channel median filter with a square odd aperture and replicated
/// borders. Even apertures are widened by one.
pub fn median_blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let radius = (kernel_size.max(1) / 2) as usize;
    if radius == 0 || width == 0 || height == 0 {
        return image.clone();
    }
    let src = image.as_raw();
    let mut out = RgbImage::new(image.width(), image.height());
    let row_len = width * 3;

    let blur_row = |y: usize, dst: &mut [u8]| {
        for channel in 0..3 {
            median_row(src, width, height, radius, y, channel, dst);
        }
    };

    #[cfg(feature = "parallel")]
    {
        let dst: &mut [u8] = &mut out;
        dst.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| blur_row(y, row));
    }
    #[cfg(not(feature = "parallel"))]
    {
        let dst: &mut [u8] = &mut out;
        for (y, row) in dst.chunks_mut(row_len).enumerate() {
            blur_row(y, row);
        }
    }
    out
}

fn median_row(
    src: &[u8],
    width: usize,
    height: usize,
    radius: usize,
    y: usize,
    channel: usize,
    dst: &mut [u8],
) {
    let side = 2 * radius + 1;
    let mut window = MedianWindow::new(side * side);
    let sample = |x: isize, y: isize| -> u8 {
        let cx = x.clamp(0, width as isize - 1) as usize;
        let cy = y.clamp(0, height as isize - 1) as usize;
        src[(cy * width + cx) * 3 + channel]
    };
    let y = y as isize;
    let r = radius as isize;

    for dx in -r..=r {
        for dy in -r..=r {
            window.add(sample(dx, y + dy));
        }
    }
    dst[channel] = window.median();

    for x in 1..width as isize {
        for dy in -r..=r {
            window.remove(sample(x - r - 1, y + dy));
            window.add(sample(x + r, y + dy));
        }
        dst[x as usize * 3 + channel] = window.median();
    }
}

/// Sliding histogram that tracks its median incrementally.
struct MedianWindow {
    hist: [u32; 256],
    half: u32,
    median: usize,
    below: u32,
}

impl MedianWindow {
    fn new(size: usize) -> Self {
        Self {
            hist: [0; 256],
            half: (size / 2) as u32,
            median: 0,
            below: 0,
        }
    }

    fn add(&mut self, value: u8) {
        self.hist[value as usize] += 1;
        if (value as usize) < self.median {
            self.below += 1;
        }
    }

    fn remove(&mut self, value: u8) {
        self.hist[value as usize] -= 1;
        if (value as usize) < self.median {
            self.below -= 1;
        }
    }

    fn median(&mut self) -> u8 {
        while self.below > self.half && self.median > 0 {
            self.median -= 1;
            self.below -= self.hist[self.median];
        }
        while self.median < 255 && self.below + self.hist[self.median] <= self.half {
            self.below += self.hist[self.median];
            self.median += 1;
        }
        self.median as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn hsv_matches_eight_bit_convention() {
        assert_eq!(rgb_to_hsv(255, 0, 0), Hsv::new(0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), Hsv::new(60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), Hsv::new(120, 255, 255));
        assert_eq!(rgb_to_hsv(128, 128, 128), Hsv::new(0, 0, 128));
    }

    #[test]
    fn median_blur_removes_isolated_speckles() {
        let mut image = RgbImage::from_pixel(9, 9, Rgb([10, 10, 10]));
        image.put_pixel(4, 4, Rgb([250, 250, 250]));
        let blurred = median_blur(&image, 3);
        assert_eq!(blurred.get_pixel(4, 4).0, [10, 10, 10]);
    }

    #[test]
    fn median_blur_keeps_large_regions() {
        let mut image = RgbImage::from_pixel(12, 12, Rgb([0, 0, 0]));
        for y in 0..12 {
            for x in 6..12 {
                image.put_pixel(x, y, Rgb([200, 100, 50]));
            }
        }
        let blurred = median_blur(&image, 5);
        assert_eq!(blurred.get_pixel(10, 6).0, [200, 100, 50]);
        assert_eq!(blurred.get_pixel(1, 6).0, [0, 0, 0]);
    }

    #[test]
    fn empty_range_yields_no_foreground() {
        let image = RgbImage::from_pixel(16, 16, Rgb([30, 30, 200]));
        let options = RegionOptions {
            range: ColorRange {
                lower: Hsv::new(10, 75, 75),
                upper: Hsv::new(45, 255, 255),
            },
            kernel_size: 3,
            threshold: 50,
        };
        let extraction = extract(&image, &options);
        assert_eq!(extraction.foreground_pixels(), 0);
    }
}
