pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod report;
pub mod ui;

#[cfg(test)]
mod test_utils;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config};
pub use error::{JarStripError, Result, UserFriendlyError};

// Core functionality re-exports
pub use filter::{
    classify_archive, filter_archive, ArchiveFilter, ExcludedEntry, ExclusionSet, FilterEvent,
    FilterProgress,
};
pub use report::{FilterReport, FilterSummary};
pub use ui::{OutputFormatter, OutputMode, ProgressManager};

use crate::ui::output::ProgressAwareOutput;
use indicatif::ProgressBar;
use std::path::Path;

/// Main library interface for JarStrip functionality
pub struct JarStrip {
    config: Config,
    exclusions: ExclusionSet,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl JarStrip {
    /// Create a new JarStrip instance from an already validated configuration
    /// and its compiled exclusion patterns.
    pub fn new(
        config: Config,
        exclusions: ExclusionSet,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            exclusions,
            output_formatter,
            progress_manager,
        }
    }

    /// Validate `config` and compile its patterns before building an instance.
    pub fn from_config(
        config: Config,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Result<Self> {
        config.validate()?;
        let exclusions = config.exclusion_set()?;
        Ok(Self::new(config, exclusions, output_mode, verbose, quiet))
    }

    /// Create JarStrip instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let (config, exclusions) = cli_args.load_config()?;

        Ok(Self::new(
            config,
            exclusions,
            output_mode_for(&cli_args.output_format),
            cli_args.verbosity_level(),
            cli_args.quiet,
        ))
    }

    /// Copy the input archive to the output archive, dropping excluded entries.
    pub fn strip(&self) -> Result<FilterReport> {
        let input = self.config.in_jar.as_path();
        let output = self.config.out_jar.as_path();

        self.output_formatter.start_operation(&format!(
            "Stripping {} into {}",
            input.display(),
            output.display()
        ));
        self.log_patterns();

        let filter = ArchiveFilter::new().with_atomic(self.config.atomic_write);
        if filter.is_atomic() {
            self.output_formatter
                .debug("Writing through a temporary file (atomic mode)");
        }

        let entry_progress = self.progress_manager.create_entry_progress(0);
        let printer =
            ProgressAwareOutput::new(&self.output_formatter, Some(&self.progress_manager));
        let on_event = event_handler(&entry_progress, &printer);

        let progress = match filter.filter_file(&self.exclusions, input, output, Some(&on_event)) {
            Ok(progress) => progress,
            Err(e) => {
                entry_progress.abandon();
                self.progress_manager.clear();
                return Err(e);
            }
        };

        ui::progress::finish_progress_with_summary(
            &entry_progress,
            &format!(
                "Copied {} of {} entries",
                progress.entries_retained, progress.entries_total
            ),
            progress.elapsed(),
        );

        self.output_formatter.print_filter_summary(&progress);

        let report = FilterReport::new(input, Some(output), &progress)
            .with_patterns(self.exclusions.patterns())
            .with_atomic_write(filter.is_atomic());
        for pattern in report.unused_patterns() {
            self.output_formatter
                .warning(&format!("Pattern '{}' matched no entries", pattern));
        }
        Ok(report)
    }

    /// Classify the input archive's entries without writing an output archive.
    pub fn preview(&self) -> Result<FilterReport> {
        let input = self.config.in_jar.as_path();
        self.log_patterns();

        let spinner = self
            .progress_manager
            .create_spinner(&format!("Reading {}", input.display()));
        let result = ArchiveFilter::new().classify_file(&self.exclusions, input);
        spinner.finish_and_clear();
        let progress = result?;

        Ok(FilterReport::new(input, None, &progress).with_patterns(self.exclusions.patterns()))
    }

    fn log_patterns(&self) {
        self.output_formatter.info(&format!(
            "Loaded {} exclusion pattern(s)",
            self.exclusions.len()
        ));
        for pattern in self.exclusions.patterns() {
            self.output_formatter.debug(&format!("Pattern: {}", pattern));
        }
    }

    /// Write a sample configuration file, refusing to replace an existing one.
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        if output_path.exists() {
            return Err(JarStripError::Config {
                message: format!(
                    "Refusing to overwrite existing file: {}",
                    output_path.display()
                ),
            });
        }

        std::fs::write(output_path, Config::create_sample_config()).map_err(JarStripError::Io)?;
        Ok(())
    }

    /// Get configuration reference
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get output formatter reference
    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &JarStripError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

fn event_handler<'a>(
    pb: &'a ProgressBar,
    printer: &'a ProgressAwareOutput<'a>,
) -> impl Fn(&FilterEvent<'_>) + 'a {
    move |event: &FilterEvent<'_>| {
        ui::progress::update_entry_progress(pb, event);
        match *event {
            FilterEvent::Started { .. } => {}
            FilterEvent::Excluded { name, pattern } => printer.excluded_entry(name, pattern),
            FilterEvent::Retained {
                name,
                compressed_size,
            } => printer.retained_entry(name, compressed_size),
        }
    }
}

pub fn output_mode_for(format: &OutputFormat) -> OutputMode {
    match format {
        OutputFormat::Human => OutputMode::Human,
        OutputFormat::Json => OutputMode::Json,
        OutputFormat::Plain => OutputMode::Plain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_jar;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn write_jar(path: &Path, names: &[&str]) {
        let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (*n, n.as_bytes())).collect();
        std::fs::write(path, create_test_jar(&entries)).unwrap();
    }

    fn jar_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn test_config(dir: &TempDir, patterns: &[&str]) -> Config {
        Config {
            in_jar: dir.path().join("in.jar"),
            out_jar: dir.path().join("out.jar"),
            rm_objects: patterns.iter().map(|p| p.to_string()).collect(),
            atomic_write: false,
        }
    }

    #[test]
    fn test_strip_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["^lib/"]);
        write_jar(&config.in_jar, &["A.class", "B.class", "lib/dep.so"]);

        let jarstrip = JarStrip::from_config(config.clone(), OutputMode::Plain, 0, true).unwrap();
        let report = jarstrip.strip().unwrap();

        assert_eq!(jar_names(&config.out_jar), vec!["A.class", "B.class"]);
        assert_eq!(report.summary.entries_excluded, 1);
        assert_eq!(report.excluded[0].name, "lib/dep.so");
        assert_eq!(report.patterns, vec!["^lib/"]);
    }

    #[test]
    fn test_strip_atomic_mode() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, &[]);
        config.atomic_write = true;
        write_jar(&config.in_jar, &["A.class"]);

        let jarstrip = JarStrip::from_config(config.clone(), OutputMode::Plain, 0, true).unwrap();
        let report = jarstrip.strip().unwrap();

        assert!(report.atomic_write);
        assert_eq!(jar_names(&config.out_jar), vec!["A.class"]);
    }

    #[test]
    fn test_preview_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["dep"]);
        write_jar(&config.in_jar, &["A.class", "lib/dep.so"]);

        let jarstrip = JarStrip::from_config(config.clone(), OutputMode::Plain, 0, true).unwrap();
        let report = jarstrip.preview().unwrap();

        assert!(report.dry_run);
        assert_eq!(report.summary.entries_retained, 1);
        assert!(!config.out_jar.exists());
    }

    #[test]
    fn test_invalid_pattern_rejected_before_io() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &["("]);

        let result = JarStrip::from_config(config.clone(), OutputMode::Plain, 0, true);
        assert!(matches!(result, Err(JarStripError::Pattern { .. })));
        assert!(!config.out_jar.exists());
    }

    #[test]
    fn test_missing_input_reports_open_error() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &[]);

        let jarstrip = JarStrip::from_config(config, OutputMode::Plain, 0, true).unwrap();
        let error = jarstrip.strip().unwrap_err();
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.yaml");

        JarStrip::generate_sample_config(&config_path).unwrap();
        let loaded = Config::load_from_file(&config_path).unwrap();
        assert!(!loaded.rm_objects.is_empty());

        // A second run must not clobber the file.
        assert!(JarStrip::generate_sample_config(&config_path).is_err());
    }

    #[test]
    fn test_output_mode_mapping() {
        assert_eq!(output_mode_for(&OutputFormat::Json), OutputMode::Json);
        assert_eq!(output_mode_for(&OutputFormat::Plain), OutputMode::Plain);
        assert_eq!(output_mode_for(&OutputFormat::Human), OutputMode::Human);
    }
}
