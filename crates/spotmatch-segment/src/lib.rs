//! Geometric normalization of patterned-region photographs.
//!
//! The pipeline runs leaves first: [`region`] thresholds a photograph into a
//! foreground mask, [`blobs`] labels connected regions of that mask,
//! [`geometry`] fits a minimum-area rectangle around the kept regions, and
//! [`normalize`] crops, rotates and flip-corrects the result into a canonical
//! frame.

pub mod blobs;
pub mod geometry;
pub mod normalize;
pub mod photo;
pub mod region;
pub mod transform;

mod config;
mod error;

pub use blobs::Blob;
pub use config::{BlobOptions, ColorRange, Hsv, RegionOptions, SegmentationConfig};
pub use error::NormalizeError;
pub use geometry::{Point, RotatedRect};
pub use normalize::{NormalizedSample, Normalizer};
pub use photo::{Orientation, Photograph};
pub use region::RegionExtraction;
