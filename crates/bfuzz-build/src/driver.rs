//! Build orchestration.
//!
//! Assembles the compiler flags, resolves the target package, renders the
//! harness into a temporary `main.*.go` in the work directory and runs
//! `go build` on it exactly once. The temporary file is removed on every
//! exit path unless it was asked to be kept.

use crate::resolver::{check_package_path, Resolver, TargetPackage};
use bfuzz_common::{
    BfuzzError, BfuzzResult, BuildConfig, BuildStage, HarnessMode, StageTracker,
    DEFAULT_FUZZ_FUNC,
};
use bfuzz_gen::{
    check_func_name, compute_scope, select_entry, Generator, Harness, InstrumentationScope,
    Selection,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Compiler flags for a harness build, in the order they are passed.
pub fn build_flags(config: &BuildConfig, scope: &InstrumentationScope) -> Vec<String> {
    let mut flags = vec![
        "-buildmode".to_string(),
        "c-archive".to_string(),
        "-gcflags".to_string(),
        "all=-d=libfuzzer".to_string(),
        "-tags".to_string(),
        config.tag_list(),
        "-trimpath".to_string(),
    ];
    for path in scope.iter() {
        flags.push("-gcflags".to_string());
        flags.push(format!("{path}=-d=libfuzzer=0"));
    }
    for (enabled, flag) in [
        (config.race, "-race"),
        (config.verbose, "-v"),
        (config.work, "-work"),
        (config.print_commands, "-x"),
    ] {
        if enabled {
            flags.push(flag.to_string());
        }
    }
    flags
}

/// A harness ready to be written and compiled.
#[derive(Debug, Clone)]
pub struct PreparedBuild {
    /// Resolved target package.
    pub package: TargetPackage,
    /// Rendered harness.
    pub harness: Harness,
    /// Compiler flags used to load the package and build the archive.
    pub flags: Vec<String>,
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Archive written by the compiler.
    pub output: PathBuf,
    /// Entry function(s) exported through the archive.
    pub selection: Selection,
    /// Location of the generated harness, if it was kept.
    pub harness_path: Option<PathBuf>,
}

/// Runs the pipeline for one package.
#[derive(Debug)]
pub struct BuildDriver {
    config: BuildConfig,
    work_dir: PathBuf,
    tracker: StageTracker,
}

impl BuildDriver {
    /// Create a driver operating in `work_dir`.
    pub fn new(config: BuildConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            tracker: StageTracker::new(),
        }
    }

    /// Current pipeline stage.
    pub fn stage(&self) -> BuildStage {
        self.tracker.stage()
    }

    /// Resolve, select and generate, then compile.
    ///
    /// # Errors
    ///
    /// The first failing stage's error. The tracker ends in FAILED.
    pub fn run(&mut self, path: &str) -> BfuzzResult<BuildOutcome> {
        let result = self.prepare(path).and_then(|prepared| self.build(&prepared));
        self.finish(result)
    }

    /// Resolve, select and generate without compiling.
    ///
    /// # Errors
    ///
    /// The first failing stage's error. The tracker ends in FAILED.
    pub fn dry_run(&mut self, path: &str) -> BfuzzResult<PreparedBuild> {
        let result = self
            .prepare(path)
            .and_then(|prepared| self.advance(BuildStage::Succeeded).map(|()| prepared));
        self.finish(result)
    }

    fn finish<T>(&mut self, result: BfuzzResult<T>) -> BfuzzResult<T> {
        if let Err(err) = &result {
            debug!(stage = %self.stage(), kind = %err.kind(), "Build failed");
            self.tracker.fail();
        }
        result
    }

    fn advance(&mut self, stage: BuildStage) -> BfuzzResult<()> {
        self.tracker
            .transition(stage)
            .map_err(|e| BfuzzError::Build(e.to_string()))?;
        debug!(%stage, "Entering stage");
        Ok(())
    }

    fn prepare(&mut self, path: &str) -> BfuzzResult<PreparedBuild> {
        // Usage errors surface before any subprocess runs.
        check_package_path(path)?;
        if let Some(func) = self.config.func.as_deref() {
            check_func_name(func)?;
        }
        if !self.config.discovery && self.config.mode == HarnessMode::Multi {
            return Err(BfuzzError::Usage(
                "a multi-target harness needs source discovery".into(),
            ));
        }

        self.advance(BuildStage::ComputeScope)?;
        let scope = compute_scope(
            &self.config.preserve,
            self.config.exclude_runtime(),
            self.config.exclude_main(),
        );
        let flags = build_flags(&self.config, &scope);
        debug!(excluded = ?scope.iter().collect::<Vec<_>>(), "Computed instrumentation scope");

        self.advance(BuildStage::ResolvePackage)?;
        let resolver = Resolver::new(self.config.go_binary.clone(), self.work_dir.clone());
        let package = resolver.resolve(path, &flags)?;

        self.advance(BuildStage::ValidateEntry)?;
        let selection = self.select(&package)?;
        info!(
            package = %package.import_path,
            functions = ?selection.functions,
            "Selected fuzz entry"
        );

        self.advance(BuildStage::GenerateHarness)?;
        let harness = Generator::new()
            .with_mode(self.config.mode)
            .render(&package.import_path, selection)?;

        Ok(PreparedBuild {
            package,
            harness,
            flags,
        })
    }

    fn select(&self, package: &TargetPackage) -> BfuzzResult<Selection> {
        if self.config.discovery {
            let scan = package.scan()?;
            for candidate in scan.candidates.iter().filter(|c| !c.is_valid()) {
                if let Some(reason) = candidate.rejection {
                    debug!(
                        name = %candidate.name,
                        location = %candidate.location,
                        %reason,
                        "Skipping function"
                    );
                }
            }
            return select_entry(&scan, self.config.func.as_deref(), self.config.mode);
        }

        let func = self.config.func.as_deref().unwrap_or(DEFAULT_FUZZ_FUNC);
        warn!(func, "Source discovery disabled, trusting function name");
        Ok(Selection {
            functions: vec![func.to_string()],
        })
    }

    fn build(&mut self, prepared: &PreparedBuild) -> BfuzzResult<BuildOutcome> {
        self.advance(BuildStage::WriteTempFile)?;
        let harness_file = self.write_harness(&prepared.harness.source)?;

        self.advance(BuildStage::InvokeCompiler)?;
        let output = self.config.output_for(&prepared.package.name);
        let compiled = self.compile(&output, &prepared.flags, harness_file.path());

        self.advance(BuildStage::Cleanup)?;
        let harness_path = harness_file.release();
        compiled?;

        self.advance(BuildStage::Succeeded)?;
        info!(output = %output.display(), "Built fuzz archive");
        Ok(BuildOutcome {
            output,
            selection: prepared.harness.selection.clone(),
            harness_path,
        })
    }

    fn write_harness(&self, source: &str) -> BfuzzResult<HarnessFile> {
        let temp = tempfile::Builder::new()
            .prefix("main.")
            .suffix(".go")
            .tempfile_in(&self.work_dir)
            .map_err(|e| BfuzzError::Build(format!("failed to create harness file: {e}")))?;
        let (mut file, temp_path) = temp.into_parts();

        let harness = if self.config.work {
            let path = temp_path
                .keep()
                .map_err(|e| BfuzzError::Build(format!("failed to keep harness file: {e}")))?;
            info!(path = %path.display(), "Keeping generated harness");
            HarnessFile::Kept(path)
        } else {
            HarnessFile::Scoped(temp_path)
        };

        file.write_all(source.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                BfuzzError::Build(format!(
                    "failed to write harness file {}: {e}",
                    harness.path().display()
                ))
            })?;
        debug!(path = %harness.path().display(), bytes = source.len(), "Wrote harness");
        Ok(harness)
    }

    fn compile(&self, output: &Path, flags: &[String], harness: &Path) -> BfuzzResult<()> {
        // The harness lives in the work directory, which is also the cwd.
        let file_name = harness.file_name().unwrap_or(harness.as_os_str());

        let mut cmd = Command::new(&self.config.go_binary);
        cmd.arg("build")
            .arg("-o")
            .arg(output)
            .args(flags)
            .arg(file_name)
            .current_dir(&self.work_dir);
        info!(go = %self.config.go_binary, output = %output.display(), "Running go build");
        debug!(?cmd, "Compiler command");

        let status = cmd.status().map_err(|e| {
            BfuzzError::Build(format!("failed to run {}: {e}", self.config.go_binary))
        })?;
        if !status.success() {
            return Err(BfuzzError::Build(format!("failed to build harness: {status}")));
        }
        Ok(())
    }
}

/// The generated harness on disk.
enum HarnessFile {
    /// Deleted when dropped.
    Scoped(TempPath),
    /// Left in place.
    Kept(PathBuf),
}

impl HarnessFile {
    fn path(&self) -> &Path {
        match self {
            Self::Scoped(temp) => &**temp,
            Self::Kept(path) => path,
        }
    }

    /// Remove a scoped harness now, returning the path of a kept one.
    fn release(self) -> Option<PathBuf> {
        match self {
            Self::Scoped(temp) => {
                let path = temp.to_path_buf();
                if let Err(e) = temp.close() {
                    warn!(path = %path.display(), error = %e, "Failed to remove harness");
                }
                None
            }
            Self::Kept(path) => Some(path),
        }
    }
}
