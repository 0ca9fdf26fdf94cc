use thiserror::Error;
use zip::result::ZipError;

#[derive(Error, Debug)]
pub enum JarStripError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid exclusion pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cannot open archive {path}")]
    ArchiveOpen {
        path: String,
        #[source]
        source: ZipError,
    },

    #[error("Failed to copy entry '{entry}' to output archive")]
    ArchiveWrite {
        entry: String,
        #[source]
        source: ZipError,
    },

    #[error("Failed to finalize output archive {path}")]
    ArchiveFinalize {
        path: String,
        #[source]
        source: ZipError,
    },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl JarStripError {
    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            JarStripError::Config { .. } => 2,
            JarStripError::Pattern { .. } => 3,
            JarStripError::ArchiveOpen { .. } => 4,
            JarStripError::ArchiveWrite { .. } | JarStripError::ArchiveFinalize { .. } => 5,
            JarStripError::Io(_) => 1,
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for JarStripError {
    fn user_message(&self) -> String {
        match self {
            JarStripError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            JarStripError::Pattern { pattern, source } => {
                format!("Invalid exclusion pattern '{}': {}", pattern, source)
            }
            JarStripError::ArchiveOpen { path, source } => {
                format!("Cannot open archive {}: {}", path, describe_zip_error(source))
            }
            JarStripError::ArchiveWrite { entry, source } => {
                format!(
                    "Failed to copy entry '{}': {}",
                    entry,
                    describe_zip_error(source)
                )
            }
            JarStripError::ArchiveFinalize { path, source } => {
                format!(
                    "Failed to finalize output archive {}: {}",
                    path,
                    describe_zip_error(source)
                )
            }
            JarStripError::Io(e) => format!("IO operation failed: {}", e),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            JarStripError::Config { .. } => Some(
                "Check your configuration file syntax and ensure in_jar, out_jar and rm_objects are present.".to_string()
            ),
            JarStripError::Pattern { .. } => Some(
                "Entries in rm_objects are regular expressions; escape literal characters such as '.', '(' or '$' with a backslash.".to_string()
            ),
            JarStripError::ArchiveOpen { .. } => Some(
                "Verify the input JAR exists and is a valid zip file, and that the output directory exists and is writable.".to_string()
            ),
            JarStripError::ArchiveWrite { .. } | JarStripError::ArchiveFinalize { .. } => Some(
                "The output file may be incomplete. Check free disk space and rerun, or use --atomic to avoid partial output.".to_string()
            ),
            JarStripError::Io(_) => None,
        }
    }
}

fn describe_zip_error(error: &ZipError) -> String {
    match error {
        ZipError::Io(e) => e.to_string(),
        other => other.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, JarStripError>;
