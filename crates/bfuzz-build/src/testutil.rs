//! Stand-in for the go command in tests.

#![allow(dead_code)]

use bfuzz_common::BuildConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory holding a fake `go` script, a work directory and a
/// package for `go list` to report.
///
/// The script appends its arguments to `calls.log`, prints `list.json` for
/// `go list` and, for `go build`, copies the harness to `harness.go` and
/// creates the `-o` output when exiting successfully.
pub struct FakeGo {
    root: TempDir,
}

impl FakeGo {
    /// Create a fake whose `go build` exits with `build_exit`.
    pub fn new(build_exit: i32) -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("work")).unwrap();
        let dir = root.path().display();
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{dir}/calls.log"
case "$1" in
list)
    if [ -f "{dir}/list.json" ]; then cat "{dir}/list.json"; fi
    ;;
build)
    out=""
    prev=""
    last=""
    for a in "$@"; do
        if [ "$prev" = "-o" ]; then out="$a"; fi
        prev="$a"
        last="$a"
    done
    cp "$last" "{dir}/harness.go"
    if [ {build_exit} -eq 0 ]; then : > "$out"; fi
    exit {build_exit}
    ;;
esac
"#
        );
        let go = root.path().join("go");
        fs::write(&go, script).unwrap();
        fs::set_permissions(&go, fs::Permissions::from_mode(0o755)).unwrap();
        Self { root }
    }

    /// Report one package with the given sources from `go list`.
    pub fn add_package(&self, import_path: &str, name: &str, files: &[(&str, &str)]) {
        let pkg_dir = self.root.path().join("pkg");
        fs::create_dir_all(&pkg_dir).unwrap();
        for (file, text) in files {
            fs::write(pkg_dir.join(file), text).unwrap();
        }
        let names: Vec<&str> = files.iter().map(|(file, _)| *file).collect();
        let json = serde_json::json!({
            "Dir": pkg_dir,
            "ImportPath": import_path,
            "Name": name,
            "GoFiles": names,
        });
        fs::write(
            self.root.path().join("list.json"),
            serde_json::to_string_pretty(&json).unwrap(),
        )
        .unwrap();
    }

    /// Path of the fake `go` script.
    pub fn go_binary(&self) -> PathBuf {
        self.root.path().join("go")
    }

    /// Default configuration pointing at the fake.
    pub fn config(&self) -> BuildConfig {
        BuildConfig {
            go_binary: self.go_binary().display().to_string(),
            ..BuildConfig::default()
        }
    }

    /// Directory the driver runs in.
    pub fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    /// Recorded invocations, one line of arguments each.
    pub fn calls(&self) -> Vec<String> {
        read_lines(&self.root.path().join("calls.log"))
    }

    /// Harness source passed to the last `go build`.
    pub fn last_harness(&self) -> String {
        fs::read_to_string(self.root.path().join("harness.go")).unwrap()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
