//! Target package resolution.
//!
//! Loads exactly one Go package through `go list -e -json` using the same
//! build flags as the final build, then reads its sources for entry-function
//! discovery.

use bfuzz_common::{BfuzzError, BfuzzResult};
use bfuzz_gen::{scan_sources, FuzzScan};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Package-path selector that expands to many packages.
const WILDCARD: &str = "...";

/// The resolved library package to wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPackage {
    /// Canonical import path, imported by the harness.
    pub import_path: String,
    /// Package name from the `package` clause.
    pub name: String,
    /// Directory holding the package sources.
    pub dir: PathBuf,
    /// Go files selected by the build constraints, cgo files included.
    pub files: Vec<String>,
}

impl TargetPackage {
    /// Read and scan the package sources for entry-function candidates.
    ///
    /// # Errors
    ///
    /// [`BfuzzError::Resolution`] if a file cannot be read or parsed.
    pub fn scan(&self) -> BfuzzResult<FuzzScan> {
        let mut sources = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = self.dir.join(file);
            let text = std::fs::read_to_string(&path).map_err(|e| {
                BfuzzError::Resolution(format!("failed to read {}: {e}", path.display()))
            })?;
            sources.push((file.clone(), text));
        }
        let scan = scan_sources(&self.import_path, &sources)?;
        info!(
            package = %self.import_path,
            files = self.files.len(),
            candidates = scan.candidates.len(),
            "Scanned package sources"
        );
        Ok(scan)
    }
}

/// One package object as printed by `go list -json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct GoListPackage {
    dir: PathBuf,
    import_path: String,
    name: String,
    go_files: Vec<String>,
    cgo_files: Vec<String>,
    error: Option<GoListError>,
    deps_errors: Vec<GoListError>,
    incomplete: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct GoListError {
    pos: String,
    err: String,
}

impl std::fmt::Display for GoListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.pos.is_empty() {
            write!(f, "{}", self.err.trim_end())
        } else {
            write!(f, "{}: {}", self.pos, self.err.trim_end())
        }
    }
}

/// Runs the package loader.
#[derive(Debug, Clone)]
pub struct Resolver {
    go_binary: String,
    work_dir: PathBuf,
}

impl Resolver {
    /// Create a resolver running `go_binary` from `work_dir`.
    pub fn new(go_binary: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            go_binary: go_binary.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Resolve `path` to exactly one non-main package.
    ///
    /// # Errors
    ///
    /// [`BfuzzError::Usage`] for a wildcard path, checked before the loader
    /// runs. [`BfuzzError::Resolution`] if the loader fails, reports errors,
    /// matches zero or several packages, or the package is `main`.
    pub fn resolve(&self, path: &str, build_flags: &[String]) -> BfuzzResult<TargetPackage> {
        check_package_path(path)?;

        debug!(go = %self.go_binary, path, ?build_flags, "Running package loader");
        let output = Command::new(&self.go_binary)
            .arg("list")
            .arg("-e")
            .arg("-json")
            .args(build_flags)
            .arg(path)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                BfuzzError::Resolution(format!("failed to run {} list: {e}", self.go_binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BfuzzError::Resolution(format!(
                "failed to load package {path}: {} list exited with {}: {}",
                self.go_binary,
                output.status,
                stderr.trim_end()
            )));
        }

        let packages = parse_packages(&output.stdout)?;
        select_package(path, packages)
    }
}

/// Reject package paths the resolver cannot handle.
///
/// # Errors
///
/// [`BfuzzError::Usage`] if `path` contains the `...` selector.
pub fn check_package_path(path: &str) -> BfuzzResult<()> {
    if path.contains(WILDCARD) {
        return Err(BfuzzError::Usage(format!(
            "package path {path:?} must not contain {WILDCARD}"
        )));
    }
    Ok(())
}

fn parse_packages(stdout: &[u8]) -> BfuzzResult<Vec<GoListPackage>> {
    serde_json::Deserializer::from_slice(stdout)
        .into_iter::<GoListPackage>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BfuzzError::Resolution(format!("failed to decode go list output: {e}")))
}

fn select_package(path: &str, packages: Vec<GoListPackage>) -> BfuzzResult<TargetPackage> {
    let errors: Vec<String> = packages
        .iter()
        .flat_map(|p| p.error.iter().chain(&p.deps_errors))
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        return Err(BfuzzError::Resolution(format!(
            "failed to load package {path}: {}",
            errors.join("; ")
        )));
    }
    if let Some(pkg) = packages.iter().find(|p| p.incomplete) {
        return Err(BfuzzError::Resolution(format!(
            "failed to load package {path}: {} is incomplete",
            pkg.import_path
        )));
    }

    let mut packages = packages.into_iter();
    let pkg = match (packages.next(), packages.len()) {
        (Some(pkg), 0) => pkg,
        (None, _) => {
            return Err(BfuzzError::Resolution(format!(
                "{path} does not match any package"
            )))
        }
        (Some(_), rest) => {
            return Err(BfuzzError::Resolution(format!(
                "{path} matches {} packages, expected exactly one",
                rest + 1
            )))
        }
    };

    if pkg.name == "main" {
        return Err(BfuzzError::Resolution(format!(
            "cannot fuzz main package {}",
            pkg.import_path
        )));
    }

    let files = pkg.go_files.into_iter().chain(pkg.cgo_files).collect();
    let target = TargetPackage {
        import_path: pkg.import_path,
        name: pkg.name,
        dir: pkg.dir,
        files,
    };
    info!(package = %target.import_path, name = %target.name, "Resolved target package");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODEC_JSON: &str = r#"{
	"Dir": "/src/codec",
	"ImportPath": "example.com/codec",
	"Name": "codec",
	"GoFiles": [
		"codec.go"
	],
	"CgoFiles": [
		"native.go"
	],
	"Imports": [
		"errors"
	]
}
"#;

    #[test]
    fn test_wildcard_rejected() {
        assert!(check_package_path("./...").is_err());
        assert!(check_package_path("example.com/x/...").is_err());
        assert!(check_package_path(".").is_ok());
        assert!(check_package_path("example.com/codec").is_ok());
    }

    #[test]
    fn test_wildcard_rejected_before_loading() {
        let resolver = Resolver::new("/nonexistent/go", "/nonexistent");
        let err = resolver.resolve("./...", &[]).unwrap_err();
        assert!(matches!(err, BfuzzError::Usage(_)));
    }

    #[test]
    fn test_parse_single_package() {
        let packages = parse_packages(CODEC_JSON.as_bytes()).unwrap();
        let target = select_package(".", packages).unwrap();
        assert_eq!(target.import_path, "example.com/codec");
        assert_eq!(target.name, "codec");
        assert_eq!(target.dir, PathBuf::from("/src/codec"));
        assert_eq!(target.files, vec!["codec.go".to_string(), "native.go".to_string()]);
    }

    #[test]
    fn test_multiple_packages_rejected() {
        let two = format!("{CODEC_JSON}{CODEC_JSON}");
        let packages = parse_packages(two.as_bytes()).unwrap();
        let err = select_package("./codec", packages).unwrap_err();
        assert_eq!(
            err,
            BfuzzError::Resolution("./codec matches 2 packages, expected exactly one".into())
        );
    }

    #[test]
    fn test_no_packages_rejected() {
        let packages = parse_packages(b"").unwrap();
        assert!(select_package("./codec", packages).is_err());
    }

    #[test]
    fn test_main_package_rejected() {
        let json = r#"{
            "Dir": "/src/cmd",
            "ImportPath": "example.com/cmd",
            "Name": "main",
            "GoFiles": ["main.go"]
        }"#;
        let packages = parse_packages(json.as_bytes()).unwrap();
        let err = select_package("./cmd", packages).unwrap_err();
        assert_eq!(
            err,
            BfuzzError::Resolution("cannot fuzz main package example.com/cmd".into())
        );
    }

    #[test]
    fn test_loader_errors_reported() {
        let json = r#"{
            "ImportPath": "./missing",
            "Incomplete": true,
            "Error": {"Pos": "", "Err": "directory not found\n"}
        }"#;
        let packages = parse_packages(json.as_bytes()).unwrap();
        let err = select_package("./missing", packages).unwrap_err();
        assert_eq!(
            err,
            BfuzzError::Resolution("failed to load package ./missing: directory not found".into())
        );
    }

    #[test]
    fn test_dependency_errors_reported() {
        let json = r#"{
            "ImportPath": "example.com/codec",
            "Name": "codec",
            "DepsErrors": [{
                "Pos": "codec.go:3:2",
                "Err": "no required module provides package example.com/gone"
            }]
        }"#;
        let packages = parse_packages(json.as_bytes()).unwrap();
        let err = select_package(".", packages).unwrap_err();
        assert!(err.to_string().contains("codec.go:3:2: no required module"));
    }

    #[test]
    fn test_garbage_output_rejected() {
        assert!(parse_packages(b"not json").is_err());
    }

    #[test]
    fn test_scan_reads_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("codec.go"),
            "package codec\nfunc FuzzDecode(d []byte) ([]byte, error) { return d, nil }\n",
        )
        .unwrap();
        let target = TargetPackage {
            import_path: "example.com/codec".into(),
            name: "codec".into(),
            dir: dir.path().to_path_buf(),
            files: vec!["codec.go".into()],
        };
        let scan = target.scan().unwrap();
        assert_eq!(scan.valid_names(), vec!["FuzzDecode"]);
    }

    #[test]
    fn test_scan_missing_file() {
        let target = TargetPackage {
            import_path: "example.com/codec".into(),
            name: "codec".into(),
            dir: PathBuf::from("/nonexistent"),
            files: vec!["codec.go".into()],
        };
        assert!(matches!(target.scan(), Err(BfuzzError::Resolution(_))));
    }
}
