pub const DEFAULT_KERNEL_SIZE: u32 = 11;
pub const DEFAULT_THRESHOLD: u8 = 50;
pub const DEFAULT_MAX_BLOBS: usize = 4;
pub const DEFAULT_MIN_AREA: usize = 7500;
pub const DEFAULT_MULT: f64 = 1.1;

/// Pixel in the 8-bit hue/saturation/value space (hue in `0..180`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Closed color range; a pixel is foreground when every channel lies within
/// `lower..=upper`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub fn contains(&self, pixel: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&pixel.h)
            && (self.lower.s..=self.upper.s).contains(&pixel.s)
            && (self.lower.v..=self.upper.v).contains(&pixel.v)
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        Self {
            lower: Hsv::new(0, 0, 0),
            upper: Hsv::new(179, 255, 255),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegionOptions {
    pub range: ColorRange,
    /// Odd median-blur aperture.
    pub kernel_size: u32,
    /// Grey level above which a blurred pixel is contour input.
    pub threshold: u8,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            range: ColorRange::default(),
            kernel_size: DEFAULT_KERNEL_SIZE,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BlobOptions {
    pub max_blobs: usize,
    /// Blobs must be strictly larger than this many pixels.
    pub min_area: usize,
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            max_blobs: DEFAULT_MAX_BLOBS,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentationConfig {
    pub region: RegionOptions,
    pub blobs: BlobOptions,
    /// Expansion applied to the crop around the fitted rectangle.
    pub mult: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            region: RegionOptions::default(),
            blobs: BlobOptions::default(),
            mult: DEFAULT_MULT,
        }
    }
}
