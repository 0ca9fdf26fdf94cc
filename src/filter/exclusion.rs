use crate::error::{JarStripError, Result};
use regex::Regex;

/// Ordered list of compiled exclusion patterns.
///
/// Patterns use search semantics: a name is excluded when any pattern finds a
/// match anywhere in it, not only when the whole name matches.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<Regex>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every pattern in order. The first invalid pattern aborts.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| JarStripError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Source text of the first pattern matching `name`, if any.
    pub fn first_match(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| pattern.is_match(name))
            .map(Regex::as_str)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
