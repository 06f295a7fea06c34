use std::path::Path;

use image::RgbImage;
use image::imageops;
use spotmatch_types::SampleName;

use crate::error::NormalizeError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// A raw photograph owned by the unit of work processing it.
#[derive(Clone, Debug)]
pub struct Photograph {
    name: SampleName,
    pixels: RgbImage,
}

impl Photograph {
    pub fn load(path: &Path) -> Result<Self, NormalizeError> {
        let pixels = image::open(path)
            .map_err(|source| NormalizeError::Load {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name: SampleName::from_file_name(&file_name),
            pixels,
        })
    }

    pub fn from_pixels(name: SampleName, pixels: RgbImage) -> Self {
        Self {
            name,
            pixels,
        }
    }

    pub fn name(&self) -> &SampleName {
        &self.name
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn orientation(&self) -> Orientation {
        if self.pixels.width() > self.pixels.height() {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Landscape photographs are turned 90° counter-clockwise so every photo
    /// enters thresholding in portrait.
    pub fn upright(self) -> Self {
        match self.orientation() {
            Orientation::Portrait => self,
            Orientation::Landscape => Self {
                pixels: imageops::rotate270(&self.pixels),
                ..self
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_photos_are_turned_to_portrait() {
        let mut pixels = RgbImage::new(4, 2);
        pixels.put_pixel(3, 0, image::Rgb([255, 0, 0]));
        let photo = Photograph::from_pixels(SampleName::new("a"), pixels).upright();
        assert_eq!(photo.orientation(), Orientation::Portrait);
        assert_eq!(photo.pixels().dimensions(), (2, 4));
        // top-right corner ends up top-left after a counter-clockwise turn
        assert_eq!(photo.pixels().get_pixel(0, 0).0, [255, 0, 0]);
    }
}
