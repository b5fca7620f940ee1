//! Harness generation for go-bfuzz-build.
//!
//! This crate provides:
//! - [`frontend`] - a declaration-level Go parser
//! - [`signature`] - the entry-function contract, discovery and selection
//! - [`scope`] - the set of packages excluded from instrumentation
//! - [`codegen`] - the cgo harness emitter
//!
//! Nothing here touches the filesystem or runs the Go toolchain.
//!
//! # Example
//!
//! ```
//! use bfuzz_gen::Generator;
//!
//! let source = r#"
//!     package codec
//!
//!     func FuzzDecode(data []byte) ([]byte, error) {
//!         return data, nil
//!     }
//! "#;
//!
//! let harness = Generator::new()
//!     .generate("example.com/codec", &[("codec.go", source)])
//!     .expect("generation failed");
//! assert_eq!(harness.selection.primary(), "FuzzDecode");
//! assert!(harness.source.contains("target.FuzzDecode(input)"));
//! ```

pub mod codegen;
pub mod frontend;
pub mod scope;
pub mod signature;

pub use codegen::{generate, generate_multi, go_quote};
pub use scope::{compute_scope, InstrumentationScope};
pub use signature::{
    check_func_name, discover, select_entry, validate_name, validate_signature, FuzzScan, ScannedFile,
    Selection,
};

use bfuzz_common::{BfuzzError, BfuzzResult, HarnessMode};

/// Parse the source files of one package.
///
/// # Errors
///
/// [`BfuzzError::Resolution`] naming the first file that fails to parse.
pub fn scan_sources<N, S>(import_path: &str, sources: &[(N, S)]) -> BfuzzResult<FuzzScan>
where
    N: AsRef<str>,
    S: AsRef<str>,
{
    let mut files = Vec::with_capacity(sources.len());
    for (name, text) in sources {
        let ast = frontend::parse(text.as_ref()).map_err(|e| {
            BfuzzError::Resolution(format!("failed to parse {}: {e:#}", name.as_ref()))
        })?;
        files.push(ScannedFile {
            name: name.as_ref().to_string(),
            ast,
        });
    }
    Ok(discover(import_path, &files))
}

/// A rendered harness and the functions it dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harness {
    /// Selected entry function(s).
    pub selection: Selection,
    /// Go source of the harness `main` package.
    pub source: String,
}

/// Discovery, selection and rendering in one step.
#[derive(Debug, Default, Clone)]
pub struct Generator {
    /// Entry function requested by the user.
    pub func: Option<String>,
    /// Single- or multi-target harness.
    pub mode: HarnessMode,
}

impl Generator {
    /// Create a generator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a specific entry function.
    #[must_use]
    pub fn with_func(mut self, func: Option<String>) -> Self {
        self.func = func;
        self
    }

    /// Select the harness mode.
    #[must_use]
    pub fn with_mode(mut self, mode: HarnessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Scan `sources`, pick the entry function(s) and render the harness.
    ///
    /// # Errors
    ///
    /// Any parse, selection or generation failure.
    pub fn generate<N, S>(&self, import_path: &str, sources: &[(N, S)]) -> BfuzzResult<Harness>
    where
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let scan = scan_sources(import_path, sources)?;
        let selection = select_entry(&scan, self.func.as_deref(), self.mode)?;
        self.render(import_path, selection)
    }

    /// Render a harness for `selection` without scanning any source.
    ///
    /// # Errors
    ///
    /// [`BfuzzError::Generation`] if the selection cannot be rendered.
    pub fn render(&self, import_path: &str, selection: Selection) -> BfuzzResult<Harness> {
        let source = match self.mode {
            HarnessMode::Single => generate(import_path, selection.primary())?,
            HarnessMode::Multi => generate_multi(import_path, &selection.functions)?,
        };
        Ok(Harness { selection, source })
    }
}
