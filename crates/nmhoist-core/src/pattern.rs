//! Wildcard ignore patterns.
//!
//! Patterns use `*` and `?` wildcards and are matched against single path
//! segments (file or directory names), anchored and case-insensitively.
//!
//! One legacy quirk is preserved: a pattern whose extension is exactly three
//! characters also matches longer extensions with the same prefix, so `*.htm`
//! matches `index.html`. This mirrors how short-filename matching behaves on
//! Windows. Patterns containing `?` always match their extension exactly.

use crate::error::{Error, Result};
use regex_lite::Regex;
use std::fmt;

/// Characters that may not appear in a pattern.
const ILLEGAL_CHARACTERS: &[char] = &['/', ':', '<', '>', '|', '"'];

/// Matches any run of characters that does not start a new extension.
const NON_DOT_CHARACTERS: &str = "[^.]*";

/// Directory name that holds nested modules; never counted toward a module's weight.
pub const MODULES_DIRECTORY_NAME: &str = "node_modules";

/// A single compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    source: String,
    regex: Regex,
}

impl IgnorePattern {
    /// Compile a wildcard pattern.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPattern`] if the pattern is empty or contains
    /// one of `/ : < > | "`.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern cannot be empty",
            });
        }
        if pattern.contains(ILLEGAL_CHARACTERS) {
            return Err(Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern contains illegal characters",
            });
        }

        let extension = extension_of(pattern);
        let match_exact = if pattern.contains('?') {
            true
        } else {
            extension.is_some_and(|ext| ext.chars().count() != 3)
        };

        let escaped = regex_lite::escape(pattern)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");

        let mut regex_string = format!("(?i)^{escaped}");
        if !match_exact && extension.is_some() {
            regex_string.push_str(NON_DOT_CHARACTERS);
        }
        regex_string.push('$');

        let regex = Regex::new(&regex_string).map_err(|_| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern could not be compiled",
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern text this matcher was built from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `name` (a single path segment) matches.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl fmt::Display for IgnorePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// The extension of a pattern: the text after its last dot, when at least one
/// character precedes that dot.
fn extension_of(pattern: &str) -> Option<&str> {
    let body = pattern.trim_start();
    let dot = body.rfind('.')?;
    if dot == 0 {
        return None;
    }
    let ext = &body[dot + 1..];
    (!ext.is_empty()).then_some(ext)
}

/// An ordered set of ignore patterns used while measuring module directories.
///
/// The nested-modules directory is always ignored and always comes first.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreSet {
    /// Compile every pattern up front so a bad one fails before any work starts.
    ///
    /// # Errors
    /// Returns the first [`Error::InvalidPattern`] encountered.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = vec![IgnorePattern::new(MODULES_DIRECTORY_NAME)?];
        for pattern in patterns {
            compiled.push(IgnorePattern::new(pattern.as_ref())?);
        }
        Ok(Self { patterns: compiled })
    }

    /// Whether any pattern matches `name`.
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Compiled patterns in match order.
    #[must_use]
    pub fn patterns(&self) -> &[IgnorePattern] {
        &self.patterns
    }
}
