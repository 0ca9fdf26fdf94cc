use crate::filter::FilterEvent;
use crate::ui::output::format_duration;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_entry_progress(&self, total_entries: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(total_entries));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} entries {msg}"
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
        );
        pb.set_message("Filtering entries...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn create_spinner(&self, message: &str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new_spinner());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_message(message.to_string());
        pb
    }

    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.enabled {
            self.multi_progress.suspend(f)
        } else {
            f()
        }
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }
}

pub fn update_entry_progress(pb: &ProgressBar, event: &FilterEvent<'_>) {
    match event {
        FilterEvent::Started { entries } => pb.set_length(*entries as u64),
        FilterEvent::Excluded { name, .. } => {
            pb.inc(1);
            pb.set_message(format!("Excluded {}", name));
        }
        FilterEvent::Retained { name, .. } => {
            pb.inc(1);
            pb.set_message(format!("Copied {}", name));
        }
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_manager_creation() {
        let manager = ProgressManager::new(true);
        assert!(manager.enabled);

        let disabled_manager = ProgressManager::new(false);
        assert!(!disabled_manager.enabled);
    }

    #[test]
    fn test_disabled_progress_bars() {
        let manager = ProgressManager::new(false);

        let entry_pb = manager.create_entry_progress(100);
        assert!(entry_pb.is_hidden());

        let spinner = manager.create_spinner("test");
        assert!(spinner.is_hidden());
    }

    #[test]
    fn test_entry_progress_advances_per_event() {
        let manager = ProgressManager::new(false);
        let pb = manager.create_entry_progress(0);

        update_entry_progress(&pb, &FilterEvent::Started { entries: 2 });
        update_entry_progress(
            &pb,
            &FilterEvent::Retained {
                name: "A.class",
                compressed_size: 1,
            },
        );
        update_entry_progress(
            &pb,
            &FilterEvent::Excluded {
                name: "lib/dep.so",
                pattern: "^lib/",
            },
        );

        assert_eq!(pb.length(), Some(2));
        assert_eq!(pb.position(), 2);
    }

    #[test]
    fn test_suspend_runs_closure() {
        let manager = ProgressManager::new(false);
        assert_eq!(manager.suspend(|| 7), 7);
    }
}
