use image::RgbImage;
use spotmatch_types::Algorithm;

use crate::descriptor::DescriptorSet;
use crate::error::ExtractionError;

/// Tuning knobs handed to feature detectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractorSettings {
    pub hessian_threshold: f64,
    pub n_features: u32,
    pub akaze_threshold: f64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            hessian_threshold: 500.0,
            n_features: 1000,
            akaze_threshold: 0.001,
        }
    }
}

/// Produces the descriptor set of one algorithm from a normalized sample's
/// pattern mask.
pub trait DescriptorExtractor: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn extract(&self, mask: &RgbImage) -> Result<DescriptorSet, ExtractionError>;
}
