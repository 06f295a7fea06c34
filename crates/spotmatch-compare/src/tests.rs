use std::fs;

use spotmatch_types::{Algorithm, ErrorClass, SampleName};
use tempfile::tempdir;

use crate::{DescriptorError, DescriptorSet, DescriptorStore, Descriptors, PairScorer};

fn sample_dir(store: &DescriptorStore, name: &str) -> SampleName {
    let sample = SampleName::new(name);
    fs::create_dir_all(store.root().join(name)).unwrap();
    sample
}

#[test]
fn store_uses_sample_keyed_file_names() {
    let store = DescriptorStore::new("/project/fingerprints");
    let path = store.path(&SampleName::new("05-20_C1CC-05_1"), Algorithm::Orb);
    assert_eq!(
        path,
        std::path::Path::new("/project/fingerprints/05-20_C1CC-05_1/05-20_C1CC-05_1_orb_mask.txt")
    );
}

#[test]
fn saved_descriptors_load_back() {
    let dir = tempdir().unwrap();
    let store = DescriptorStore::new(dir.path());
    let sample = sample_dir(&store, "a_b_1");
    let set = DescriptorSet::Binary(Descriptors::new(4, vec![1, 2, 3, 4, 255, 0, 7, 9]).unwrap());
    store.save(&sample, Algorithm::Akaze, &set).unwrap();
    assert_eq!(store.load(&sample, Algorithm::Akaze).unwrap(), set);
}

#[test]
fn binary_set_cannot_be_saved_as_float_family() {
    let dir = tempdir().unwrap();
    let store = DescriptorStore::new(dir.path());
    let sample = sample_dir(&store, "a_b_1");
    let set = DescriptorSet::Binary(Descriptors::new(1, vec![1]).unwrap());
    let err = store.save(&sample, Algorithm::Sift, &set).unwrap_err();
    assert!(matches!(err, DescriptorError::Incompatible { .. }));
}

#[test]
fn scorer_reports_each_algorithm_independently() {
    let dir = tempdir().unwrap();
    let store = DescriptorStore::new(dir.path());
    let a = sample_dir(&store, "d1_s1_1");
    let b = sample_dir(&store, "d1_s1_2");
    fs::write(store.path(&a, Algorithm::Sift), "0 0\n3 4\n").unwrap();
    fs::write(store.path(&b, Algorithm::Sift), "0 0\n3 4\n").unwrap();
    fs::write(store.path(&a, Algorithm::Orb), "1 2\n").unwrap();
    fs::write(store.path(&b, Algorithm::Orb), "1 two\n").unwrap();

    let scorer = PairScorer::new(
        store,
        &[Algorithm::Sift, Algorithm::Orb, Algorithm::Surf, Algorithm::Sift],
    );
    assert_eq!(scorer.algorithms().len(), 3);

    let scores = scorer.score_all(&a, &b);
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0].algorithm, Algorithm::Sift);
    assert_eq!(*scores[0].outcome.as_ref().unwrap(), 0.0);

    let orb = scores[1].outcome.as_ref().unwrap_err();
    assert_eq!(orb.class(), ErrorClass::DescriptorCorrupt);
    let surf = scores[2].outcome.as_ref().unwrap_err();
    assert_eq!(surf.class(), ErrorClass::DescriptorMissing);
}

#[test]
fn empty_descriptor_file_is_unavailable() {
    let dir = tempdir().unwrap();
    let store = DescriptorStore::new(dir.path());
    let a = sample_dir(&store, "d1_s1_1");
    fs::write(store.path(&a, Algorithm::Surf), "").unwrap();
    let err = store.load(&a, Algorithm::Surf).unwrap_err();
    assert!(matches!(err, DescriptorError::Empty { .. }));
}
