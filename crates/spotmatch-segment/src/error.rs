use std::path::PathBuf;

use spotmatch_types::ErrorClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to load photograph {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no blob larger than {min_area} px found ({found} candidate blobs)")]
    Segmentation { found: usize, min_area: usize },
    #[error("degenerate geometry: {reason}")]
    Geometry { reason: String },
}

impl NormalizeError {
    pub fn geometry(reason: impl Into<String>) -> Self {
        Self::Geometry {
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            NormalizeError::Load { .. } => ErrorClass::Load,
            NormalizeError::Segmentation { .. } => ErrorClass::Segmentation,
            NormalizeError::Geometry { .. } => ErrorClass::Geometry,
        }
    }
}
