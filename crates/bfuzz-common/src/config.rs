//! Build configuration for a harness build.
//!
//! Supports TOML deserialization so project defaults can live in a
//! `bfuzz.toml` next to the package; command-line flags override them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Build tags that are always satisfied when building a harness.
pub const BASELINE_TAGS: [&str; 3] = ["gofuzz", "gofuzz_libfuzzer", "libfuzzer"];

/// Entry function preferred when none is named explicitly.
pub const DEFAULT_FUZZ_FUNC: &str = "Fuzz";

/// Compiler used when neither the config nor `GO` names one.
pub const DEFAULT_GO_BINARY: &str = "go";

/// Shape of the generated harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HarnessMode {
    /// One entry function behind `TestOneInput`.
    #[default]
    Single,
    /// Every discovered entry function, selected by the first input byte.
    Multi,
}

/// Everything the build driver needs, fixed before the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Extra build tags, appended after [`BASELINE_TAGS`].
    pub tags: Vec<String>,

    /// Output archive. `None` means `<pkgName>-fuzz.a`.
    pub output: Option<PathBuf>,

    /// Requested entry function. `None` lets discovery pick one.
    pub func: Option<String>,

    /// Keep the generated harness source and the go work directory.
    pub work: bool,

    /// Enable race detection.
    pub race: bool,

    /// Print the commands run by the go tool (`-x`).
    pub print_commands: bool,

    /// Verbose build (`-v`).
    pub verbose: bool,

    /// Import paths that must not be instrumented.
    pub preserve: Vec<String>,

    /// Instrument runtime support packages.
    pub cover_runtime: bool,

    /// Instrument the generated main package.
    pub cover_main: bool,

    /// The go command to invoke.
    pub go_binary: String,

    /// Single- or multi-target harness.
    pub mode: HarnessMode,

    /// Scan the package sources for entry functions. When false the
    /// requested name is trusted as-is.
    pub discovery: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            output: None,
            func: None,
            work: false,
            race: false,
            print_commands: false,
            verbose: false,
            preserve: Vec::new(),
            cover_runtime: false,
            cover_main: false,
            go_binary: String::from(DEFAULT_GO_BINARY),
            mode: HarnessMode::Single,
            discovery: true,
        }
    }
}

impl BuildConfig {
    /// Whether runtime support packages are left uninstrumented.
    #[must_use]
    pub fn exclude_runtime(&self) -> bool {
        !self.cover_runtime
    }

    /// Whether the generated main package is left uninstrumented.
    #[must_use]
    pub fn exclude_main(&self) -> bool {
        !self.cover_main
    }

    /// Comma-joined tag list passed to `-tags`.
    #[must_use]
    pub fn tag_list(&self) -> String {
        BASELINE_TAGS
            .iter()
            .copied()
            .chain(
                self.tags
                    .iter()
                    .map(String::as_str)
                    .filter(|t| !t.is_empty()),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Output path for a package called `package_name`.
    #[must_use]
    pub fn output_for(&self, package_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{package_name}-fuzz.a")))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Split a comma-separated flag value, dropping empty pieces.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}
