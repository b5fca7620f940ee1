//! Fuzz target for the Go declaration parser.
//!
//! # Running
//!
//! ```bash
//! cd crates/bfuzz-gen
//! cargo +nightly fuzz run fuzz_parse
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        if source.len() > 100_000 {
            return;
        }

        // Never panics, whatever the input.
        let _ = bfuzz_gen::frontend::parse(source);
    }
});
