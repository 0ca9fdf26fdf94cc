use crate::error::{JarStripError, Result};
use crate::filter::ExclusionSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Archive to read.
    pub in_jar: PathBuf,
    /// Archive to write.
    pub out_jar: PathBuf,
    /// Exclusion regular expressions, tested in order against entry names.
    pub rm_objects: Vec<String>,
    /// Write through a temporary file and rename it into place on success.
    #[serde(default)]
    pub atomic_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            in_jar: PathBuf::from("app.jar"),
            out_jar: PathBuf::from("app-stripped.jar"),
            rm_objects: vec![
                r"^META-INF/maven/".to_string(),
                r"^org/springframework/".to_string(),
                r"\.so$".to_string(),
            ],
            atomic_write: false,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(JarStripError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| JarStripError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::from_yaml_str(&content).map_err(|e| match e {
            JarStripError::Config { message } => JarStripError::Config {
                message: format!("Failed to parse config file {}: {}", path.display(), message),
            },
            other => other,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| JarStripError::Config {
            message: e.to_string(),
        })
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref input_jar) = cli_args.input_jar {
            self.in_jar = input_jar.clone();
        }

        if let Some(ref output_jar) = cli_args.output_jar {
            self.out_jar = output_jar.clone();
        }

        if cli_args.atomic_write {
            self.atomic_write = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_jar.as_os_str().is_empty() {
            return Err(JarStripError::Config {
                message: "in_jar must not be empty".to_string(),
            });
        }

        if self.out_jar.as_os_str().is_empty() {
            return Err(JarStripError::Config {
                message: "out_jar must not be empty".to_string(),
            });
        }

        // Opening the output truncates it, so it must never be the input.
        if same_file(&self.in_jar, &self.out_jar) {
            return Err(JarStripError::Config {
                message: format!(
                    "in_jar and out_jar refer to the same file: {}",
                    self.in_jar.display()
                ),
            });
        }

        Ok(())
    }

    /// Compiles `rm_objects`, failing on the first invalid pattern.
    pub fn exclusion_set(&self) -> Result<ExclusionSet> {
        ExclusionSet::compile(&self.rm_objects)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        serde_yaml::to_string(&sample_config).unwrap_or_else(|_| String::new())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }

    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub input_jar: Option<PathBuf>,
    pub output_jar: Option<PathBuf>,
    pub atomic_write: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_jar(mut self, input_jar: Option<PathBuf>) -> Self {
        self.input_jar = input_jar;
        self
    }

    pub fn with_output_jar(mut self, output_jar: Option<PathBuf>) -> Self {
        self.output_jar = output_jar;
        self
    }

    pub fn with_atomic_write(mut self, atomic: bool) -> Self {
        self.atomic_write = atomic;
        self
    }
}
