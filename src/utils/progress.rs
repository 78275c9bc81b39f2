//! Progress bar helpers using indicatif

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar counting fitted trees
pub fn create_progress_bar(trees: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(trees);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} trees ({percent}%) [{eta}]")
            .expect("progress template is valid")
            .progress_chars("=>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Finish a progress bar with a success message
pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("   [OK] {}", message));
}

/// Abandon a progress bar, leaving a warning in place of the bar
pub fn finish_with_warning(pb: &ProgressBar, message: &str) {
    pb.abandon_with_message(format!("   [!!] {}", message));
}
