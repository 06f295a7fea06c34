use std::path::PathBuf;

use image::RgbImage;
use spotmatch_segment::NormalizedSample;
use spotmatch_types::{ErrorClass, ErrorRecord};

use crate::layout::ProjectLayout;
use crate::output::{PendingSampleDir, StoreError};

/// Where a normalized sample ended up. Exactly one destination is attempted
/// per sample.
#[derive(Debug)]
pub enum GateOutcome {
    /// Stored under the success root.
    Stored { dir: PathBuf },
    /// Larger than the cutoff; mask and upright original stored for review.
    Oversized { dir: PathBuf, area: u64 },
    /// The destination already existed and was left untouched.
    Duplicate { dir: PathBuf, oversized: bool },
}

impl GateOutcome {
    /// Record to append to the processing log, if the outcome needs one.
    pub fn error_record(&self, subject: &str) -> Option<ErrorRecord> {
        match self {
            GateOutcome::Stored { .. } => None,
            GateOutcome::Oversized { area, .. } => Some(ErrorRecord::new(
                subject,
                ErrorClass::SizeOutOfRange,
                format!("normalized area {area} px exceeds the size cutoff"),
            )),
            GateOutcome::Duplicate { dir, oversized } => {
                let message = if *oversized {
                    format!("previously flagged as size error: {}", dir.display())
                } else {
                    format!("output folder {} already exists", dir.display())
                };
                Some(ErrorRecord::new(subject, ErrorClass::DuplicateOutput, message))
            }
        }
    }
}

/// Routes normalized samples by absolute pixel area.
pub struct SizeGate {
    success_root: PathBuf,
    size_error_root: PathBuf,
    cutoff: u64,
}

impl SizeGate {
    pub fn new(layout: &ProjectLayout, cutoff: u64) -> Self {
        Self {
            success_root: layout.fingerprints(),
            size_error_root: layout.size_errors(),
            cutoff,
        }
    }

    /// `original` is the upright photograph the sample was cut from; it is
    /// only written for oversized samples.
    pub fn route(
        &self,
        sample: &NormalizedSample,
        original: &RgbImage,
    ) -> Result<GateOutcome, StoreError> {
        let area = sample.area();
        let oversized = area > self.cutoff;
        let root = if oversized {
            &self.size_error_root
        } else {
            &self.success_root
        };

        let dir = match PendingSampleDir::begin(root, &sample.name) {
            Ok(dir) => dir,
            Err(StoreError::Duplicate { path }) => {
                return Ok(GateOutcome::Duplicate {
                    dir: path,
                    oversized,
                });
            }
            Err(err) => return Err(err),
        };

        dir.write_image("mask", &sample.mask)?;
        if oversized {
            dir.write_image("original", original)?;
        } else {
            dir.write_image("img", &sample.image)?;
        }
        match dir.commit() {
            Ok(dir) if oversized => Ok(GateOutcome::Oversized { dir, area }),
            Ok(dir) => Ok(GateOutcome::Stored { dir }),
            Err(StoreError::Duplicate { path }) => Ok(GateOutcome::Duplicate {
                dir: path,
                oversized,
            }),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotmatch_types::SampleName;

    fn sample(name: &str, width: u32, height: u32) -> NormalizedSample {
        NormalizedSample {
            name: SampleName::new(name),
            mask: RgbImage::new(width, height),
            image: RgbImage::new(width, height),
        }
    }

    fn layout() -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.ensure_directories().unwrap();
        (dir, layout)
    }

    #[test]
    fn small_sample_goes_to_success_root_only() {
        let (_dir, layout) = layout();
        let gate = SizeGate::new(&layout, 100);
        let outcome = gate.route(&sample("d_a_1", 10, 10), &RgbImage::new(20, 20)).unwrap();
        assert!(matches!(outcome, GateOutcome::Stored { .. }));
        assert!(outcome.error_record("d_a_1").is_none());

        let stored = layout.fingerprints().join("d_a_1");
        assert!(stored.join("d_a_1_mask.png").is_file());
        assert!(stored.join("d_a_1_img.png").is_file());
        assert!(!layout.size_errors().join("d_a_1").exists());
    }

    #[test]
    fn oversized_sample_goes_to_size_errors_only() {
        let (_dir, layout) = layout();
        let gate = SizeGate::new(&layout, 99);
        let outcome = gate.route(&sample("d_a_1", 10, 10), &RgbImage::new(20, 20)).unwrap();
        assert!(matches!(outcome, GateOutcome::Oversized { area: 100, .. }));
        let record = outcome.error_record("d_a_1").unwrap();
        assert_eq!(record.class, ErrorClass::SizeOutOfRange);

        let stored = layout.size_errors().join("d_a_1");
        assert!(stored.join("d_a_1_mask.png").is_file());
        assert!(stored.join("d_a_1_original.png").is_file());
        assert!(!layout.fingerprints().join("d_a_1").exists());
    }

    #[test]
    fn existing_destination_is_a_duplicate_and_untouched() {
        let (_dir, layout) = layout();
        let gate = SizeGate::new(&layout, 1_000);
        gate.route(&sample("d_a_1", 10, 10), &RgbImage::new(1, 1)).unwrap();
        let mask = layout.fingerprints().join("d_a_1").join("d_a_1_mask.png");
        let before = std::fs::read(&mask).unwrap();

        let outcome = gate.route(&sample("d_a_1", 20, 5), &RgbImage::new(1, 1)).unwrap();
        assert!(matches!(outcome, GateOutcome::Duplicate { oversized: false, .. }));
        assert_eq!(
            outcome.error_record("d_a_1").unwrap().class,
            ErrorClass::DuplicateOutput
        );
        assert_eq!(std::fs::read(&mask).unwrap(), before);
    }

    #[test]
    fn held_oversized_sample_is_reported_as_previously_flagged() {
        let (_dir, layout) = layout();
        let gate = SizeGate::new(&layout, 10);
        gate.route(&sample("d_a_1", 10, 10), &RgbImage::new(1, 1)).unwrap();
        let outcome = gate.route(&sample("d_a_1", 10, 10), &RgbImage::new(1, 1)).unwrap();
        assert!(matches!(outcome, GateOutcome::Duplicate { oversized: true, .. }));
        let record = outcome.error_record("d_a_1").unwrap();
        assert!(record.message.starts_with("previously flagged as size error"));
    }

    #[test]
    fn failed_write_never_leaves_a_partial_sample() {
        let (_dir, layout) = layout();
        let gate = SizeGate::new(&layout, 1_000);
        let broken = NormalizedSample {
            name: SampleName::new("d_a_1"),
            mask: RgbImage::new(10, 10),
            image: RgbImage::new(0, 0),
        };
        assert!(gate.route(&broken, &RgbImage::new(1, 1)).is_err());
        assert!(!layout.fingerprints().join("d_a_1").exists());
        assert_eq!(std::fs::read_dir(layout.fingerprints()).unwrap().count(), 0);

        let outcome = gate.route(&sample("d_a_1", 10, 10), &RgbImage::new(1, 1)).unwrap();
        assert!(matches!(outcome, GateOutcome::Stored { .. }));
        assert!(layout.fingerprints().join("d_a_1/d_a_1_img.png").is_file());
    }
}
