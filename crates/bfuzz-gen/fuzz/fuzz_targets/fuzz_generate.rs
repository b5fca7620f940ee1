//! Fuzz target for discovery and harness rendering.
//!
//! Any source that discovery accepts must render in both harness modes.

#![no_main]

use bfuzz_common::HarnessMode;
use bfuzz_gen::Generator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if source.len() > 100_000 {
        return;
    }

    let sources = [("fuzz.go", source)];
    for mode in [HarnessMode::Single, HarnessMode::Multi] {
        let generator = Generator::new().with_mode(mode);
        if let Ok(harness) = generator.generate("example.com/fuzz", &sources) {
            assert!(!harness.selection.functions.is_empty());
            assert!(harness.source.contains("//export BFUZZGolangTestOneInput"));
        }
    }
});
