//! Batch stages of a project run. Each stage takes the immutable
//! [`EffectiveSettings`](crate::settings::EffectiveSettings) (or the pieces
//! of it it needs), a rayon pool and the project's journals explicitly.

pub mod compare;
pub mod fingerprint;
pub mod gate;
pub mod normalize;
pub mod pairs;
pub mod self_compare;
pub mod shortlist;

use std::any::Any;
use std::fs;
use std::io;
use std::path::Path;

use spotmatch_types::SampleName;

/// Names of the sample directories directly under `root`, sorted. Hidden
/// entries are staging directories of unfinished writes and are skipped.
pub fn list_samples(root: &Path) -> io::Result<Vec<SampleName>> {
    let mut samples = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && !name.starts_with('.') {
            samples.push(SampleName::new(name));
        }
    }
    samples.sort();
    Ok(samples)
}

/// Text carried by a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pool sized by `--jobs`; every stage runs its parallel work inside it.
pub fn build_pool(jobs: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|index| format!("spotmatch-worker-{index}"))
        .build()
}
