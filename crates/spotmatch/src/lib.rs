//! Photo fingerprint pipeline: normalize patterned-region photographs,
//! route them by size, expand sighting catalogs into candidate pairs and
//! shortlist the nearest matches per subject.

pub mod app;
pub mod cli;
pub mod ingest;
pub mod journal;
pub mod layout;
pub mod output;
pub mod progress;
pub mod settings;
pub mod stage;
pub mod tables;

pub use app::{CompareOutput, Project, RunError, init_project, ingest_photos, run};
pub use settings::{ConfigError, EffectiveSettings};
