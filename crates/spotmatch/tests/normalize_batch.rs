use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use spotmatch::cli::InputDir;
use spotmatch::layout::PROCESSING_ERROR_LOG;
use spotmatch::{ConfigError, Project, RunError, init_project};
use tempfile::TempDir;

const PATTERN: Rgb<u8> = Rgb([220, 180, 40]);
const BACKGROUND: Rgb<u8> = Rgb([30, 30, 200]);

const PARAMETERS: &str = "\
hue_low = 10
saturation_low = 75
value_low = 75
hue_high = 45
saturation_high = 255
value_high = 255
kernel_size = 11
threshold_value = 50
num_patches = 1
min_area = 5000
mult = 1.1
cutoff_size = 10000000
";

fn project(parameters: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path()).unwrap();
    fs::write(dir.path().join("data").join("parameters.toml"), parameters).unwrap();
    dir
}

fn blob_photo() -> RgbImage {
    let mut pixels = RgbImage::from_pixel(240, 320, BACKGROUND);
    for y in 90..190 {
        for x in 60..160 {
            pixels.put_pixel(x, y, PATTERN);
        }
    }
    pixels
}

fn error_lines(project: &Path, class: &str) -> usize {
    let log = fs::read_to_string(project.join("logs").join(PROCESSING_ERROR_LOG)).unwrap();
    log.lines()
        .filter(|line| line.split('\t').nth(2) == Some(class))
        .count()
}

#[test]
fn clean_blob_is_stored_under_the_success_root() {
    let dir = project(PARAMETERS);
    let photos = dir.path().join("unprocessed_photos");
    blob_photo().save(photos.join("05-20_C1CC-05_1.png")).unwrap();

    let project = Project::open(dir.path(), None, Some(2)).unwrap();
    let report = project.normalize(InputDir::UnprocessedPhotos).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.stored, 1);

    let stored = dir.path().join("fingerprints").join("05-20_C1CC-05_1");
    let mask = image::open(stored.join("05-20_C1CC-05_1_mask.png")).unwrap();
    let img = image::open(stored.join("05-20_C1CC-05_1_img.png")).unwrap();
    assert_eq!(mask.width(), img.width());
    assert!((mask.width() as u64) * (mask.height() as u64) < 10_000_000);
    assert!(!dir
        .path()
        .join("processing_errors/crop_rotate_size/05-20_C1CC-05_1")
        .exists());
    assert_eq!(error_lines(dir.path(), "segmentation"), 0);

    let times = fs::read_to_string(dir.path().join("logs/processing_times.txt")).unwrap();
    assert!(times.contains("Crop and rotate - 1 items processed in"));
}

#[test]
fn photo_without_target_color_goes_to_generic_errors() {
    let dir = project(PARAMETERS);
    let photos = dir.path().join("unprocessed_photos");
    RgbImage::from_pixel(120, 160, BACKGROUND)
        .save(photos.join("05-20_EMPTY_1.png"))
        .unwrap();

    let project = Project::open(dir.path(), None, Some(1)).unwrap();
    let report = project.normalize(InputDir::UnprocessedPhotos).unwrap();
    assert_eq!(report.failed, 1);

    let kept = dir
        .path()
        .join("processing_errors/crop_rotate_generic/05-20_EMPTY_1/05-20_EMPTY_1.png");
    assert_eq!(
        fs::read(&kept).unwrap(),
        fs::read(photos.join("05-20_EMPTY_1.png")).unwrap()
    );
    assert_eq!(error_lines(dir.path(), "segmentation"), 1);
    assert!(!dir.path().join("fingerprints/05-20_EMPTY_1").exists());
}

#[test]
fn unreadable_photo_is_isolated_from_the_batch() {
    let dir = project(PARAMETERS);
    let photos = dir.path().join("unprocessed_photos");
    fs::write(photos.join("05-20_BAD_1.jpg"), b"not a jpeg").unwrap();
    blob_photo().save(photos.join("05-20_GOOD_1.png")).unwrap();

    let project = Project::open(dir.path(), None, Some(2)).unwrap();
    let report = project.normalize(InputDir::UnprocessedPhotos).unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(error_lines(dir.path(), "load"), 1);
    assert!(dir
        .path()
        .join("processing_errors/crop_rotate_generic/05-20_BAD_1/05-20_BAD_1.jpg")
        .is_file());
}

#[test]
fn unwritable_output_root_keeps_the_raw_photo_in_generic_errors() {
    let dir = project(PARAMETERS);
    let photos = dir.path().join("unprocessed_photos");
    blob_photo().save(photos.join("05-20_X_1.png")).unwrap();

    let project = Project::open(dir.path(), None, Some(1)).unwrap();
    let fingerprints = dir.path().join("fingerprints");
    fs::remove_dir_all(&fingerprints).unwrap();
    fs::write(&fingerprints, b"").unwrap();

    let report = project.normalize(InputDir::UnprocessedPhotos).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.stored, 0);

    let kept = dir
        .path()
        .join("processing_errors/crop_rotate_generic/05-20_X_1/05-20_X_1.png");
    assert_eq!(
        fs::read(&kept).unwrap(),
        fs::read(photos.join("05-20_X_1.png")).unwrap()
    );
    assert_eq!(error_lines(dir.path(), "storage"), 1);
    assert!(fs::metadata(&fingerprints).unwrap().is_file());
}

#[test]
fn tiny_cutoff_routes_to_size_errors_only() {
    let dir = project(&PARAMETERS.replace("cutoff_size = 10000000", "cutoff_size = 100"));
    let photos = dir.path().join("unprocessed_photos");
    blob_photo().save(photos.join("05-20_BIG_1.png")).unwrap();

    let project = Project::open(dir.path(), None, Some(1)).unwrap();
    let report = project.normalize(InputDir::UnprocessedPhotos).unwrap();
    assert_eq!(report.oversized, 1);

    let held = dir.path().join("processing_errors/crop_rotate_size/05-20_BIG_1");
    assert!(held.join("05-20_BIG_1_mask.png").is_file());
    let original = image::open(held.join("05-20_BIG_1_original.png")).unwrap();
    assert_eq!((original.width(), original.height()), (240, 320));
    assert!(!dir.path().join("fingerprints/05-20_BIG_1").exists());
    assert_eq!(error_lines(dir.path(), "size_out_of_range"), 1);
}

#[test]
fn rerun_reports_duplicates_without_overwriting() {
    let dir = project(PARAMETERS);
    let photos = dir.path().join("unprocessed_photos");
    blob_photo().save(photos.join("05-20_C1CC-05_1.png")).unwrap();

    let project = Project::open(dir.path(), None, Some(1)).unwrap();
    project.normalize(InputDir::UnprocessedPhotos).unwrap();
    let mask = dir
        .path()
        .join("fingerprints/05-20_C1CC-05_1/05-20_C1CC-05_1_mask.png");
    let first = fs::read(&mask).unwrap();

    let report = project.normalize(InputDir::UnprocessedPhotos).unwrap();
    assert_eq!(report.duplicates, 1);
    assert_eq!(fs::read(&mask).unwrap(), first);
    assert_eq!(error_lines(dir.path(), "duplicate_output"), 1);
}

#[test]
fn missing_parameter_file_aborts_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let err = match Project::open(dir.path(), None, None) {
        Ok(_) => panic!("project opened without parameters"),
        Err(err) => err,
    };
    assert!(matches!(err, RunError::Config(ConfigError::NotFound { .. })));
    assert!(!dir.path().join("logs").exists());
}

#[test]
fn invalid_parameter_is_reported_with_its_name() {
    let dir = project("kernel_size = 4\n");
    let err = match Project::open(dir.path(), None, None) {
        Ok(_) => panic!("even kernel accepted"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("kernel_size"));
}
