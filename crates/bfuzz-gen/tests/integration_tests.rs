//! Integration tests for harness generation.
//!
//! These tests run the whole pipeline from package sources to harness text.

use bfuzz_common::{BfuzzError, HarnessMode};
use bfuzz_gen::{compute_scope, scan_sources, Generator};

const CODEC: &str = r#"
package codec

import (
    "bytes"
    "errors"
)

var errShort = errors.New("short input")

// FuzzDecode is the only entry point.
func FuzzDecode(data []byte) ([]byte, error) {
    if len(data) < 2 {
        return nil, errShort
    }
    return bytes.ToUpper(data), nil
}

func decodeHeader(data []byte) (int, error) {
    return int(data[0]), nil
}
"#;

const HELPERS: &str = r#"
package codec

type Input = []byte

// FuzzRoundTrip uses an alias for its parameter.
func FuzzRoundTrip(in Input) (out []byte, err error) {
    out = append(out, in...)
    return
}

func FuzzLegacy(data []byte) int {
    return 0
}
"#;

/// Test generating a harness for a package with a single entry function.
#[test]
fn test_generate_single_entry() {
    let harness = Generator::new()
        .generate("example.com/codec", &[("codec.go", CODEC)])
        .unwrap();

    assert_eq!(harness.selection.functions, vec!["FuzzDecode".to_string()]);
    assert!(harness.source.contains("target \"example.com/codec\""));
    assert!(harness.source.contains("result, err := target.FuzzDecode(input)"));
    assert!(!harness.source.contains("decodeHeader"));
}

/// Test that several valid functions require an explicit choice.
#[test]
fn test_generate_requires_choice() {
    let sources = [("codec.go", CODEC), ("helpers.go", HELPERS)];
    let err = Generator::new()
        .generate("example.com/codec", &sources)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "must specify a fuzz function with --func, found: FuzzDecode, FuzzRoundTrip"
    );

    let harness = Generator::new()
        .with_func(Some("FuzzRoundTrip".into()))
        .generate("example.com/codec", &sources)
        .unwrap();
    assert!(harness.source.contains("target.FuzzRoundTrip(input)"));
}

/// Test that a function with the wrong signature is reported when requested.
#[test]
fn test_generate_rejects_wrong_signature() {
    let sources = [("codec.go", CODEC), ("helpers.go", HELPERS)];
    let err = Generator::new()
        .with_func(Some("FuzzLegacy".into()))
        .generate("example.com/codec", &sources)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("provided --func=FuzzLegacy"), "{message}");
    assert!(message.contains("helpers.go:"), "{message}");
    assert!(message.contains("func([]byte) int"), "{message}");
}

/// Test a multi-target harness over every valid function.
#[test]
fn test_generate_multi_target() {
    let sources = [("helpers.go", HELPERS), ("codec.go", CODEC)];
    let harness = Generator::new()
        .with_mode(HarnessMode::Multi)
        .generate("example.com/codec", &sources)
        .unwrap();

    assert_eq!(
        harness.selection.functions,
        vec!["FuzzDecode".to_string(), "FuzzRoundTrip".to_string()]
    );
    assert!(harness
        .source
        .contains("\ttarget.FuzzDecode, // 0\n\ttarget.FuzzRoundTrip, // 1\n"));
}

/// Test that unparsable sources name the offending file.
#[test]
fn test_scan_reports_parse_failures() {
    let sources = [("codec.go", CODEC), ("broken.go", "package codec\nfunc F( {")];
    let err = scan_sources("example.com/codec", &sources).unwrap_err();
    assert!(
        matches!(err, BfuzzError::Resolution(ref m) if m.starts_with("failed to parse broken.go"))
    );
}

/// Test that a package without entry functions fails discovery.
#[test]
fn test_generate_without_entry_functions() {
    let err = Generator::new()
        .generate("example.com/empty", &[("empty.go", "package empty\n")])
        .unwrap_err();
    assert_eq!(err.to_string(), "could not find any fuzz functions in example.com/empty");
}

/// Test the default instrumentation scope.
#[test]
fn test_default_scope() {
    let none: [&str; 0] = [];
    let scope = compute_scope(&none, true, true);
    let paths: Vec<&str> = scope.iter().collect();
    assert_eq!(
        paths,
        vec!["main", "runtime/cgo", "runtime/pprof", "runtime/race", "syscall"]
    );
}
