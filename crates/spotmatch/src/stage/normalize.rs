use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use rayon::ThreadPool;
use rayon::prelude::*;
use spotmatch_segment::{NormalizeError, Normalizer, Photograph};
use spotmatch_types::{ErrorClass, ErrorRecord, SampleName};
use tracing::{debug, warn};

use super::gate::{GateOutcome, SizeGate};
use super::panic_message;
use crate::journal::Journal;
use crate::layout::ProjectLayout;
use crate::output::SampleDir;
use crate::settings::EffectiveSettings;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// What happened to one photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Stored,
    Oversized,
    Duplicate,
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub processed: usize,
    pub stored: usize,
    pub oversized: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl NormalizeReport {
    fn add(mut self, outcome: UnitOutcome) -> Self {
        self.processed += 1;
        match outcome {
            UnitOutcome::Stored => self.stored += 1,
            UnitOutcome::Oversized => self.oversized += 1,
            UnitOutcome::Duplicate => self.duplicates += 1,
            UnitOutcome::Failed => self.failed += 1,
        }
        self
    }
}

/// Image files directly inside `dir`, sorted by name.
pub fn list_photos(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut photos = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_photo = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                PHOTO_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if is_photo {
            photos.push(path);
        }
    }
    photos.sort();
    Ok(photos)
}

/// Normalizes photographs and routes each result through the size gate.
pub struct BatchNormalizer<'a> {
    normalizer: Normalizer,
    gate: SizeGate,
    generic_errors: PathBuf,
    journal: &'a Journal,
}

impl<'a> BatchNormalizer<'a> {
    pub fn new(settings: &EffectiveSettings, layout: &ProjectLayout, journal: &'a Journal) -> Self {
        Self {
            normalizer: Normalizer::new(settings.segmentation.clone()),
            gate: SizeGate::new(layout, settings.cutoff_size),
            generic_errors: layout.generic_errors(),
            journal,
        }
    }

    /// One isolated unit of work per photograph. Failures, panics included,
    /// are recorded and never stop the batch.
    pub fn run(&self, photos: &[PathBuf], pool: &ThreadPool, bar: &ProgressBar) -> NormalizeReport {
        let outcomes: Vec<UnitOutcome> = pool.install(|| {
            photos
                .par_iter()
                .map(|path| {
                    let outcome = self.process_isolated(path);
                    bar.inc(1);
                    outcome
                })
                .collect()
        });
        outcomes
            .into_iter()
            .fold(NormalizeReport::default(), NormalizeReport::add)
    }

    pub fn process_isolated(&self, path: &Path) -> UnitOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(path))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let name = sample_name(path);
                let record = ErrorRecord::new(
                    name.as_str(),
                    ErrorClass::Panic,
                    format!("worker panicked: {}", panic_message(payload.as_ref())),
                );
                self.fail(path, &name, record);
                UnitOutcome::Failed
            }
        }
    }

    fn process(&self, path: &Path) -> UnitOutcome {
        let photo = match Photograph::load(path) {
            Ok(photo) => photo.upright(),
            Err(err) => {
                let name = sample_name(path);
                self.fail(path, &name, normalize_record(&name, &err));
                return UnitOutcome::Failed;
            }
        };

        let sample = match self.normalizer.normalize(&photo) {
            Ok(sample) => sample,
            Err(err) => {
                self.fail(path, photo.name(), normalize_record(photo.name(), &err));
                return UnitOutcome::Failed;
            }
        };

        match self.gate.route(&sample, photo.pixels()) {
            Ok(outcome) => {
                if let Some(record) = outcome.error_record(sample.name.as_str()) {
                    self.journal.record(&record);
                }
                debug!(
                    sample = %sample.name,
                    height = sample.height(),
                    width = sample.width(),
                    "normalized"
                );
                match outcome {
                    GateOutcome::Stored { .. } => UnitOutcome::Stored,
                    GateOutcome::Oversized { .. } => UnitOutcome::Oversized,
                    GateOutcome::Duplicate { .. } => UnitOutcome::Duplicate,
                }
            }
            Err(err) => {
                let record = ErrorRecord::new(
                    sample.name.as_str(),
                    ErrorClass::Storage,
                    format!("storing normalized sample failed: {err}"),
                );
                self.fail(path, &sample.name, record);
                UnitOutcome::Failed
            }
        }
    }

    /// Records `record` and keeps a byte-for-byte copy of the raw photograph
    /// under the generic error root.
    fn fail(&self, path: &Path, name: &SampleName, record: ErrorRecord) {
        warn!(sample = %name, class = %record.class, "{}", record.message);
        self.journal.record(&record);

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let stored = SampleDir::claim(&self.generic_errors, name)
            .and_then(|dir| dir.copy_in(path, &file_name));
        if let Err(err) = stored {
            warn!(sample = %name, error = %err, "raw photograph not kept");
        }
    }
}

fn sample_name(path: &Path) -> SampleName {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    SampleName::from_file_name(&file_name)
}

fn normalize_record(name: &SampleName, err: &NormalizeError) -> ErrorRecord {
    ErrorRecord::new(name.as_str(), err.class(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_x_1.JPG"), b"").unwrap();
        fs::write(dir.path().join("a_x_1.png"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("c_x_1.png")).unwrap();

        let photos = list_photos(dir.path()).unwrap();
        let names: Vec<_> = photos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_x_1.png", "b_x_1.JPG"]);
    }

    #[test]
    fn report_counts_every_outcome_once() {
        let report = [
            UnitOutcome::Stored,
            UnitOutcome::Failed,
            UnitOutcome::Stored,
            UnitOutcome::Duplicate,
            UnitOutcome::Oversized,
        ]
        .into_iter()
        .fold(NormalizeReport::default(), NormalizeReport::add);
        assert_eq!(report.processed, 5);
        assert_eq!(report.stored, 2);
        assert_eq!(
            report.stored + report.oversized + report.duplicates + report.failed,
            report.processed
        );
    }
}
