use clap::Parser;
use jarstrip::{
    output_mode_for, Cli, FilterReport, JarStrip, JarStripError, OutputFormatter,
    UserFriendlyError,
};
use std::ffi::OsString;
use std::process;

fn main() {
    let exit_code = run(std::env::args_os());
    process::exit(exit_code);
}

fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    // Parse CLI arguments
    let cli = Cli::parse_from(args);

    // Handle special commands first
    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    // Load configuration and compile patterns before touching any archive
    let jarstrip = match JarStrip::from_cli(&cli) {
        Ok(jarstrip) => jarstrip,
        Err(e) => {
            print_startup_error(&cli, &e);
            return e.exit_code();
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &jarstrip);
    }

    match jarstrip.strip() {
        Ok(report) => {
            jarstrip.output_formatter().print_filter_report(&report);

            if let Err(e) = save_report(&cli, &report) {
                jarstrip.handle_error(&e);
                return e.exit_code();
            }

            jarstrip.output_formatter().done();
            0
        }
        Err(e) => {
            jarstrip.handle_error(&e);
            e.exit_code()
        }
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    match JarStrip::generate_sample_config(&cli.config) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", cli.config.display());
            println!("\nTo use this configuration:");
            println!("  jarstrip --config {}", cli.config.display());
            println!("\nEdit in_jar, out_jar and rm_objects for your archive.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            e.exit_code()
        }
    }
}

fn handle_dry_run(cli: &Cli, jarstrip: &JarStrip) -> i32 {
    let formatter = jarstrip.output_formatter();

    formatter.info("DRY RUN MODE - No archive will be written");
    formatter.print_separator();

    let report = match jarstrip.preview() {
        Ok(report) => report,
        Err(e) => {
            jarstrip.handle_error(&e);
            return e.exit_code();
        }
    };

    for entry in &report.excluded {
        formatter.excluded_entry(&entry.name, &entry.pattern);
    }

    formatter.print_separator();
    formatter.success(&format!(
        "{} of {} entries would be kept, {} excluded; {} would not be written",
        report.summary.entries_retained,
        report.summary.entries_total,
        report.summary.entries_excluded,
        jarstrip.config().out_jar.display()
    ));
    formatter.print_filter_report(&report);

    if let Err(e) = save_report(cli, &report) {
        jarstrip.handle_error(&e);
        return e.exit_code();
    }

    formatter.done();
    0
}

fn save_report(cli: &Cli, report: &FilterReport) -> Result<(), JarStripError> {
    match cli.report {
        Some(ref path) => report.save_json(path),
        None => Ok(()),
    }
}

fn print_startup_error(cli: &Cli, error: &JarStripError) {
    // Startup errors are always shown, even in quiet mode
    let formatter = OutputFormatter::new(output_mode_for(&cli.output_format), 0, false);
    formatter.print_user_friendly_error(error);
}
