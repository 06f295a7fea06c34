use indicatif::{ProgressBar, ProgressStyle};

pub fn batch_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<12} {bar:40.cyan/blue} {percent:>3}% {pos}/{len} items [{elapsed_precise}<{eta_precise}] {msg}",
    )
    .expect("invalid batch bar template")
}

pub fn chunk_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{prefix:<12} {bar:40.green/blue} {percent:>3}% {pos}/{len} pairs [{elapsed_precise}<{eta_precise}] chunks {msg}",
    )
    .expect("invalid chunk bar template")
}

/// Visible bar with `total` steps, labelled `prefix`.
pub fn batch_bar(prefix: &'static str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(batch_bar_style());
    bar.set_prefix(prefix);
    bar
}

pub fn pair_bar(prefix: &'static str, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(chunk_bar_style());
    bar.set_prefix(prefix);
    bar
}
