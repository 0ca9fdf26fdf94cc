use crate::error::{JarStripError, UserFriendlyError};
use crate::filter::FilterProgress;
use crate::report::FilterReport;
use console::{style, Emoji, Term};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static ROCKET: Emoji = Emoji("🚀 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

/// Printed once after a successful run.
pub const COMPLETION_MARKER: &str = "|- Done.";

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    // Core messaging methods
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", ROCKET, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    /// One diagnostic line per excluded entry.
    pub fn excluded_entry(&self, name: &str, pattern: &str) {
        if !self.should_show_message(0) {
            return;
        }

        match self.mode {
            OutputMode::Human if self.use_colors => {
                println!(
                    "{} {}",
                    style("|-- Excluding").yellow(),
                    style(format!("\"{}\"", name)).bold()
                );
            }
            OutputMode::Human | OutputMode::Plain => println!("|-- Excluding \"{}\"", name),
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "excluded",
                "name": name,
                "pattern": pattern,
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        }
    }

    pub fn retained_entry(&self, name: &str, compressed_size: u64) {
        self.debug(&format!("Copied \"{}\" ({})", name, format_bytes(compressed_size)));
    }

    /// Completion marker, printed even in quiet mode.
    pub fn done(&self) {
        match self.mode {
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "done",
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            _ => println!("{}", COMPLETION_MARKER),
        }
    }

    // User-friendly error handling
    pub fn print_user_friendly_error(&self, error: &JarStripError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    // Summary and reporting
    pub fn print_filter_summary(&self, progress: &FilterProgress) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => self.print_human_summary(progress),
            OutputMode::Json => self.print_json_summary(progress),
            OutputMode::Plain => self.print_plain_summary(progress),
        }
    }

    pub fn print_filter_report(&self, report: &FilterReport) {
        match self.mode {
            OutputMode::Human => {
                if self.should_show_message(1) {
                    self.print_human_report(report)
                }
            }
            OutputMode::Json => {
                let json_output =
                    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
                println!("{}", json_output);
            }
            OutputMode::Plain => {
                if self.should_show_message(1) {
                    self.print_plain_report(report)
                }
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{} {}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn print_human_summary(&self, progress: &FilterProgress) {
        let highlight = |value: String| {
            if self.use_colors {
                style(value).cyan().bold().to_string()
            } else {
                value
            }
        };

        println!();
        self.print_separator();
        println!("  Entries read:     {}", highlight(progress.entries_total.to_string()));
        println!("  Entries copied:   {}", highlight(progress.entries_retained.to_string()));
        println!("  Entries excluded: {}", highlight(progress.entries_excluded().to_string()));
        println!("  Bytes copied:     {}", highlight(format_bytes(progress.bytes_retained)));
        println!("  Time taken:       {}", highlight(format_duration(progress.elapsed())));
        self.print_separator();
    }

    fn print_json_summary(&self, progress: &FilterProgress) {
        self.print_json_object(&serde_json::json!({
            "type": "summary",
            "entries_total": progress.entries_total,
            "entries_retained": progress.entries_retained,
            "entries_excluded": progress.entries_excluded(),
            "bytes_retained": progress.bytes_retained,
            "duration_ms": progress.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_plain_summary(&self, progress: &FilterProgress) {
        println!("Entries read: {}", progress.entries_total);
        println!("Entries copied: {}", progress.entries_retained);
        println!("Entries excluded: {}", progress.entries_excluded());
        println!("Bytes copied: {}", progress.bytes_retained);
        println!("Duration: {:?}", progress.elapsed());
    }

    fn print_human_report(&self, report: &FilterReport) {
        self.print_header("Filter Report");

        println!("Input:  {}", report.input.display());
        match report.output {
            Some(ref output) => println!("Output: {}", output.display()),
            None => println!("Output: (dry run, nothing written)"),
        }
        println!("Filtered at: {}", report.filter_time.format("%Y-%m-%d %H:%M UTC"));
        println!();

        if !report.excluded.is_empty() {
            println!("Excluded entries:");
            for entry in &report.excluded {
                println!("  {} (matched {})", entry.name, entry.pattern);
            }
            println!();
        }

        let unused = report.unused_patterns();
        if !unused.is_empty() {
            println!("Patterns that matched nothing:");
            for pattern in unused {
                println!("  {}", pattern);
            }
        }
    }

    fn print_plain_report(&self, report: &FilterReport) {
        println!("REPORT: Filter completed");
        println!("Input: {}", report.input.display());
        if let Some(ref output) = report.output {
            println!("Output: {}", output.display());
        }
        println!("Retained: {}", report.summary.entries_retained);
        println!("Excluded: {}", report.summary.entries_excluded);
        for pattern in report.unused_patterns() {
            println!("Unused pattern: {}", pattern);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

// Progress-aware output wrapper
pub struct ProgressAwareOutput<'a> {
    formatter: &'a OutputFormatter,
    progress_manager: Option<&'a crate::ui::ProgressManager>,
}

impl<'a> ProgressAwareOutput<'a> {
    pub fn new(
        formatter: &'a OutputFormatter,
        progress_manager: Option<&'a crate::ui::ProgressManager>,
    ) -> Self {
        Self {
            formatter,
            progress_manager,
        }
    }

    pub fn suspend_and_print<F>(&self, f: F)
    where
        F: FnOnce(&OutputFormatter),
    {
        if let Some(pm) = self.progress_manager {
            pm.suspend(|| f(self.formatter));
        } else {
            f(self.formatter);
        }
    }

    pub fn excluded_entry(&self, name: &str, pattern: &str) {
        self.suspend_and_print(|f| f.excluded_entry(name, pattern));
    }

    pub fn retained_entry(&self, name: &str, compressed_size: u64) {
        self.suspend_and_print(|f| f.retained_entry(name, compressed_size));
    }
}
