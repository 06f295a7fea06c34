//! Descriptor storage and pairwise descriptor matching.

pub mod descriptor;
pub mod extractor;
pub mod matcher;
pub mod scorer;
pub mod store;

mod error;

pub use descriptor::{DescriptorElement, DescriptorSet, Descriptors};
pub use error::{DescriptorError, ExtractionError};
pub use extractor::{DescriptorExtractor, ExtractorSettings};
pub use matcher::{DescriptorMatch, cross_checked_matches, mean_match_distance};
pub use scorer::{AlgorithmScore, PairScorer};
pub use store::DescriptorStore;

#[cfg(test)]
mod tests;
