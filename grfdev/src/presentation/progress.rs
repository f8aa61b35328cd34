use grf_core::{BatchReport, CancelFlag, Cancellable, Progress, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Progress bar fed by batch operations.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(verb: &str, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{prefix} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_prefix(verb.to_string());
            pb
        };
        Self { bar }
    }

    pub fn finish(&self, report: &BatchReport) {
        if report.is_cancelled() {
            self.bar.abandon_with_message("cancelled");
        } else {
            self.bar.finish_and_clear();
        }
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&mut self, p: &Progress) -> bool {
        if self.bar.length() != Some(p.total) {
            self.bar.set_length(p.total);
        }
        self.bar.set_position(p.completed);
        self.bar.set_message(p.label.clone());
        true
    }
}

/// Bar that also stops at the next unit once Ctrl-C was pressed.
pub fn sink(verb: &str, quiet: bool, flag: &CancelFlag) -> Cancellable<BarSink> {
    Cancellable::new(flag.clone(), BarSink::new(verb, quiet))
}

pub fn install_interrupt(flag: &CancelFlag) {
    let flag = flag.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, stopping after the current entry");
        flag.cancel();
    }) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }
}
