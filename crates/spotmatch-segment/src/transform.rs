use image::{ImageBuffer, Pixel};

/// 2x3 affine map `[a, b, c; d, e, f]` taking `(x, y)` to
/// `(a x + b y + c, d x + e y + f)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine([f64; 6]);

impl Affine {
    pub const IDENTITY: Affine = Affine([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

    /// Rotation by `angle` degrees about `center`; positive angles turn the
    /// picture counter-clockwise as displayed.
    pub fn rotation(center: (f64, f64), angle: f64) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        let (cx, cy) = center;
        Affine([
            cos,
            sin,
            (1.0 - cos) * cx - sin * cy,
            -sin,
            cos,
            sin * cx + (1.0 - cos) * cy,
        ])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + b * y + c, d * x + e * y + f)
    }

    pub fn invert(&self) -> Option<Self> {
        let [a, b, c, d, e, f] = self.0;
        let det = a * e - b * d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        let (ia, ib, id, ie) = (e * inv, -b * inv, -d * inv, a * inv);
        Some(Affine([
            ia,
            ib,
            -(ia * c + ib * f),
            id,
            ie,
            -(id * c + ie * f),
        ]))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Border {
    Replicate,
    Zero,
}

/// Extracts a `size` patch whose centre sits at `center` (sub-pixel),
/// sampling bilinearly and replicating edge pixels outside the source.
pub fn rect_sub_pix<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    size: (u32, u32),
    center: (f64, f64),
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = size;
    let origin_x = center.0 - (width as f64 - 1.0) * 0.5;
    let origin_y = center.1 - (height as f64 - 1.0) * 0.5;
    let mut out = ImageBuffer::<P, Vec<u8>>::new(width, height);
    let channels = P::CHANNEL_COUNT as usize;
    let dst: &mut [u8] = &mut out;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * channels;
            sample_into(
                src,
                origin_x + x as f64,
                origin_y + y as f64,
                Border::Replicate,
                &mut dst[offset..offset + channels],
            );
        }
    }
    out
}

/// Warps `src` into a `size` canvas under `map`, sampling bilinearly through
/// the inverse map. Destination pixels with no source stay black.
pub fn warp_affine<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    map: &Affine,
    size: (u32, u32),
) -> Option<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8>,
{
    let inverse = map.invert()?;
    let (width, height) = size;
    let mut out = ImageBuffer::<P, Vec<u8>>::new(width, height);
    let channels = P::CHANNEL_COUNT as usize;
    let dst: &mut [u8] = &mut out;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let (sx, sy) = inverse.apply(x as f64, y as f64);
            let offset = (y * width as usize + x) * channels;
            sample_into(src, sx, sy, Border::Zero, &mut dst[offset..offset + channels]);
        }
    }
    Some(out)
}

fn sample_into<P>(src: &ImageBuffer<P, Vec<u8>>, x: f64, y: f64, border: Border, dst: &mut [u8])
where
    P: Pixel<Subpixel = u8>,
{
    let width = src.width() as i64;
    let height = src.height() as i64;
    if width == 0 || height == 0 || !x.is_finite() || !y.is_finite() {
        return;
    }
    let channels = dst.len();
    let raw = src.as_raw();

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let fetch = |px: i64, py: i64, channel: usize| -> f64 {
        let (px, py) = match border {
            Border::Replicate => (px.clamp(0, width - 1), py.clamp(0, height - 1)),
            Border::Zero => {
                if px < 0 || py < 0 || px >= width || py >= height {
                    return 0.0;
                }
                (px, py)
            }
        };
        raw[((py * width + px) as usize) * channels + channel] as f64
    };

    for (channel, value) in dst.iter_mut().enumerate() {
        let top = fetch(x0, y0, channel) * (1.0 - fx) + fetch(x0 + 1, y0, channel) * fx;
        let bottom = fetch(x0, y0 + 1, channel) * (1.0 - fx) + fetch(x0 + 1, y0 + 1, channel) * fx;
        let blended = top * (1.0 - fy) + bottom * fy;
        *value = blended.round().clamp(0.0, 255.0) as u8;
    }
}
