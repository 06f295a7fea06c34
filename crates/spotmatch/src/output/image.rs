use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage};

use crate::output::error::StoreError;

pub(crate) fn write_png(path: &Path, image: &RgbImage) -> Result<(), StoreError> {
    let file = File::create(path).map_err(|source| StoreError::io(path, source))?;
    let encoder = PngEncoder::new(BufWriter::new(file));
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ColorType::Rgb8,
        )
        .map_err(|source| StoreError::Encode {
            path: path.to_path_buf(),
            source,
        })
}
