use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional per-project settings file.
pub const SETTINGS_FILE_NAME: &str = "nmhoist.json";

/// Default ceiling on optimizer mutations before it gives up.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// Default path-length limit (characters).
pub const DEFAULT_PATH_LIMIT: usize = nmhoist_util::DEFAULT_PATH_LIMIT;

/// Documentation files excluded from weight measurement.
pub const DEFAULT_DOC_PATTERNS: &[&str] = &[
    "*.md",
    "*.markdown",
    "*.html",
    "*.txt",
    "LICENSE",
    "README",
    "CHANGELOG",
    "media",
    "images",
    "man",
    "examples",
    "example",
];

/// Files that are safe to drop from a packaged tree, also excluded from measurement.
pub const DEFAULT_REMOVABLE_PATTERNS: &[&str] = &[
    "CNAME",
    "*.old",
    "*.patch",
    "*.ico",
    "Makefile.*",
    "Rakefile",
    "*.yml",
    "test.*",
    "generate-*",
    "benchmark",
    "build",
    "scripts",
    "test",
    "tst",
    "tests",
    "testing",
    "*.tscache",
];

/// Runtime configuration for the nmhoist CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Project settings, read from `nmhoist.json` when present.
///
/// Every field is optional in the file; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Longest acceptable path, in characters.
    pub path_limit: usize,

    /// Directory the tree will finally be installed under, for length simulation.
    pub assumed_root: Option<PathBuf>,

    /// Ignore patterns used while measuring module directories.
    pub ignore: Vec<String>,

    /// Safety cap on optimizer mutations.
    pub max_iterations: usize,

    /// Package manager executable used for listing and reinstalls.
    pub package_manager: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            path_limit: DEFAULT_PATH_LIMIT,
            assumed_root: None,
            ignore: DEFAULT_DOC_PATTERNS
                .iter()
                .chain(DEFAULT_REMOVABLE_PATTERNS)
                .map(|p| (*p).to_string())
                .collect(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            package_manager: "npm".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `<root>/nmhoist.json`, falling back to defaults if absent.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Load settings from an explicit file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override the path limit.
    #[must_use]
    pub fn with_path_limit(mut self, limit: usize) -> Self {
        self.path_limit = limit;
        self
    }

    /// Override the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Append extra ignore patterns after the configured ones.
    #[must_use]
    pub fn with_extra_ignore(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.ignore.extend(patterns);
        self
    }
}
