//! Terminal output utilities

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a plain line to stdout
pub fn line(msg: &str) {
    println!("{}", msg);
}

/// Create a spinner on stderr; hidden when `quiet` or stderr is not a terminal
pub fn spinner(msg: &str, quiet: bool) -> ProgressBar {
    if quiet || !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) =
        ProgressStyle::with_template("{spinner:.blue} {msg}").map(|s| s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "))
    {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
