use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Counter bar for one parallel phase; workers `inc(1)` as units finish.
pub fn phase_bar(len: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}]  [{bar:40.cyan/bright-black}] {pos}/{len}  {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    bar.set_message(label.to_string());
    bar
}

/// Spinner for the detection stages (no unit count to report).
pub fn detection_spinner(label: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap()
            .tick_strings(&["-", "\\", "|", "/"]),
    );
    spinner.set_message(label.to_string());
    spinner
}
