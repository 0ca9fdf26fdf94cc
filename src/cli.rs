use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::filter::ExclusionSet;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "jarstrip")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Remove designated frameworks from a JAR and prepare it for analysis")]
#[command(
    long_about = "JarStrip copies a JAR (zip) archive, dropping every entry whose name matches \
                  one of the regular expressions listed under rm_objects in the configuration file."
)]
#[command(after_help = "EXAMPLES:\n  \
    jarstrip -c strip.yaml\n  \
    jarstrip -c strip.yaml -i app.jar -o app-stripped.jar\n  \
    jarstrip -c strip.yaml --dry-run -v\n  \
    jarstrip -c strip.yaml --generate-config")]
pub struct Cli {
    /// Configuration file for parameters
    #[arg(short, long, help = "Path to YAML configuration file")]
    pub config: PathBuf,

    /// Input JAR file (overrides in_jar from the configuration file)
    #[arg(short = 'i', long = "input_jar", alias = "input-jar")]
    pub input_jar: Option<PathBuf>,

    /// Output JAR file (overrides out_jar from the configuration file)
    #[arg(short = 'o', long = "output_jar", alias = "output-jar")]
    pub output_jar: Option<PathBuf>,

    /// Write through a temporary file and rename it into place on success
    #[arg(long, help = "Never leave a partially written output JAR behind")]
    pub atomic: bool,

    /// Save a JSON report of the run
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be excluded without writing an archive)
    #[arg(long, help = "Show what would be excluded without writing the output JAR")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Write a sample configuration file to the --config path")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    /// Loads, merges and validates the configuration, then compiles the
    /// exclusion patterns. Nothing touches an archive before this succeeds.
    pub fn load_config(&self) -> Result<(Config, ExclusionSet)> {
        let mut config = Config::load_from_file(&self.config)?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        let exclusions = config.exclusion_set()?;
        Ok((config, exclusions))
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_input_jar(self.input_jar.clone())
            .with_output_jar(self.output_jar.clone())
            .with_atomic_write(self.atomic)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
