use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use indicatif::ProgressBar;
use rayon::ThreadPool;
use rayon::prelude::*;
use spotmatch_compare::{DescriptorExtractor, DescriptorStore};
use spotmatch_types::{ErrorClass, ErrorRecord, SampleName};
use tracing::{debug, warn};

use super::panic_message;
use crate::journal::Journal;
use crate::layout::ProjectLayout;
use crate::output::relocate_dir;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FingerprintReport {
    pub processed: usize,
    pub extracted: usize,
    pub relocated: usize,
}

/// Runs every extractor over the stored masks and persists one descriptor
/// file per sample and algorithm.
pub struct FingerprintBatch<'a> {
    store: DescriptorStore,
    failure_root: PathBuf,
    extractors: &'a [Box<dyn DescriptorExtractor>],
    journal: &'a Journal,
}

impl<'a> FingerprintBatch<'a> {
    pub fn new(
        layout: &ProjectLayout,
        extractors: &'a [Box<dyn DescriptorExtractor>],
        journal: &'a Journal,
    ) -> Self {
        Self {
            store: DescriptorStore::new(layout.fingerprints()),
            failure_root: layout.fingerprinting_errors(),
            extractors,
            journal,
        }
    }

    pub fn run(
        &self,
        samples: &[SampleName],
        pool: &ThreadPool,
        bar: &ProgressBar,
    ) -> FingerprintReport {
        let outcomes: Vec<bool> = pool.install(|| {
            samples
                .par_iter()
                .map(|sample| {
                    let ok = match panic::catch_unwind(AssertUnwindSafe(|| self.process(sample))) {
                        Ok(result) => result,
                        Err(payload) => {
                            let record = ErrorRecord::new(
                                sample.as_str(),
                                ErrorClass::Panic,
                                format!("extractor panicked: {}", panic_message(payload.as_ref())),
                            );
                            self.relocate(sample, record);
                            false
                        }
                    };
                    bar.inc(1);
                    ok
                })
                .collect()
        });

        let extracted = outcomes.iter().filter(|ok| **ok).count();
        FingerprintReport {
            processed: outcomes.len(),
            extracted,
            relocated: outcomes.len() - extracted,
        }
    }

    /// True when every extractor stored its descriptors. The first failure
    /// moves the sample directory aside and stops.
    fn process(&self, sample: &SampleName) -> bool {
        let mask_path = self
            .store
            .root()
            .join(sample.as_str())
            .join(format!("{sample}_mask.png"));
        let mask = match image::open(&mask_path) {
            Ok(mask) => mask.to_rgb8(),
            Err(err) => {
                let record = ErrorRecord::new(
                    sample.as_str(),
                    ErrorClass::Load,
                    format!("mask {} could not be read: {err}", mask_path.display()),
                );
                self.relocate(sample, record);
                return false;
            }
        };

        for extractor in self.extractors {
            let algorithm = extractor.algorithm();
            let stored = extractor
                .extract(&mask)
                .and_then(|set| Ok(self.store.save(sample, algorithm, &set)?));
            match stored {
                Ok(path) => debug!(sample = %sample, %algorithm, path = %path.display(), "descriptors stored"),
                Err(err) => {
                    let record = ErrorRecord::new(
                        sample.as_str(),
                        err.class(),
                        format!("extracting {algorithm} fingerprints failed: {err}"),
                    );
                    self.relocate(sample, record);
                    return false;
                }
            }
        }
        true
    }

    fn relocate(&self, sample: &SampleName, record: ErrorRecord) {
        warn!(sample = %sample, class = %record.class, "{}", record.message);
        self.journal.record(&record);
        let source = self.store.root().join(sample.as_str());
        if let Err(err) = relocate_dir(&source, &self.failure_root) {
            self.journal.record(&ErrorRecord::new(
                sample.as_str(),
                ErrorClass::Storage,
                format!("relocating sample folder failed: {err}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use spotmatch_compare::{DescriptorSet, Descriptors, ExtractionError};
    use spotmatch_types::Algorithm;
    use std::fs;

    struct ConstantExtractor(Algorithm);

    impl DescriptorExtractor for ConstantExtractor {
        fn algorithm(&self) -> Algorithm {
            self.0
        }

        fn extract(&self, mask: &RgbImage) -> Result<DescriptorSet, ExtractionError> {
            let value = mask.get_pixel(0, 0)[0];
            Ok(DescriptorSet::Binary(
                Descriptors::new(2, vec![value, 1]).unwrap(),
            ))
        }
    }

    struct FailingExtractor;

    impl DescriptorExtractor for FailingExtractor {
        fn algorithm(&self) -> Algorithm {
            Algorithm::Sift
        }

        fn extract(&self, _mask: &RgbImage) -> Result<DescriptorSet, ExtractionError> {
            Err(ExtractionError::NoKeypoints {
                algorithm: Algorithm::Sift,
            })
        }
    }

    fn project_with_mask(name: &str) -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.init().unwrap();
        let sample_dir = layout.fingerprints().join(name);
        fs::create_dir_all(&sample_dir).unwrap();
        RgbImage::from_pixel(4, 4, image::Rgb([9, 9, 9]))
            .save(sample_dir.join(format!("{name}_mask.png")))
            .unwrap();
        (dir, layout)
    }

    #[test]
    fn descriptors_are_stored_next_to_the_mask() {
        let (_dir, layout) = project_with_mask("d_a_1");
        let journal = Journal::open(layout.logs().join("fp.txt")).unwrap();
        let extractors: Vec<Box<dyn DescriptorExtractor>> = vec![
            Box::new(ConstantExtractor(Algorithm::Orb)),
            Box::new(ConstantExtractor(Algorithm::Akaze)),
        ];
        let batch = FingerprintBatch::new(&layout, &extractors, &journal);
        let pool = super::super::build_pool(2).unwrap();
        let report = batch.run(&[SampleName::new("d_a_1")], &pool, &ProgressBar::hidden());

        assert_eq!(report.extracted, 1);
        let orb = layout.fingerprints().join("d_a_1").join("d_a_1_orb_mask.txt");
        assert_eq!(fs::read_to_string(orb).unwrap().trim(), "9 1");
        assert!(layout.fingerprints().join("d_a_1").join("d_a_1_akaze_mask.txt").is_file());
    }

    #[test]
    fn failing_extractor_moves_the_sample_aside() {
        let (_dir, layout) = project_with_mask("d_a_1");
        let journal = Journal::open(layout.logs().join("fp.txt")).unwrap();
        let extractors: Vec<Box<dyn DescriptorExtractor>> = vec![Box::new(FailingExtractor)];
        let batch = FingerprintBatch::new(&layout, &extractors, &journal);
        let pool = super::super::build_pool(1).unwrap();
        let report = batch.run(&[SampleName::new("d_a_1")], &pool, &ProgressBar::hidden());

        assert_eq!(report.relocated, 1);
        assert!(!layout.fingerprints().join("d_a_1").exists());
        assert!(layout.fingerprinting_errors().join("d_a_1").join("d_a_1_mask.png").is_file());
        let log = fs::read_to_string(journal.path()).unwrap();
        assert!(log.contains("\td_a_1\textraction\t"));
    }
}
