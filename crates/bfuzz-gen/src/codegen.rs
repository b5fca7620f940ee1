//! Harness generation.
//!
//! Emits the Go `main` package that is compiled with `-buildmode=c-archive`
//! and links against the fuzzing engine. The generated file exports two C
//! symbols:
//!
//! - `BFUZZGolangTestOneInput(data *C.char, size C.size_t) (C.size_t, C.int)`
//!   runs the entry function on a copy-free view of the input and stores the
//!   result. It returns `(0, 1)` when the entry function fails or returns a
//!   nil result, `(len(result), 0)` otherwise.
//! - `BFUZZGolangGetReturnData(buf *C.char)` copies the stored result into
//!   `buf` and clears it.
//!
//! Only one result is stored at a time, so the harness must not be driven
//! concurrently.

use crate::signature::{validate_name, MAX_FUZZ_FUNCS};
use bfuzz_common::{BfuzzError, BfuzzResult};
use std::fmt::{self, Write};

/// Symbol that runs one input.
pub const TEST_ONE_INPUT_SYMBOL: &str = "BFUZZGolangTestOneInput";

/// Symbol that copies out the stored result.
pub const GET_RETURN_DATA_SYMBOL: &str = "BFUZZGolangGetReturnData";

/// Import alias of the target package inside the harness.
const TARGET_ALIAS: &str = "target";

/// Render a single-target harness calling `import_path.func`.
///
/// # Errors
///
/// [`BfuzzError::Generation`] if `import_path` is empty or `func` is not a
/// valid entry-function name.
pub fn generate(import_path: &str, func: &str) -> BfuzzResult<String> {
    check_import_path(import_path)?;
    check_func(func)?;
    let mut emitter = HarnessEmitter::new(import_path);
    emitter.emit_single(func).map_err(fmt_error)?;
    Ok(emitter.finish())
}

/// Render a harness dispatching to several entry functions.
///
/// The first input byte selects the function by its index in `funcs`; the
/// remaining bytes are passed to it. Empty input and out-of-range selectors
/// are reported as failures.
///
/// # Errors
///
/// [`BfuzzError::Generation`] if `funcs` is empty, too long, contains
/// duplicates or invalid names, or `import_path` is empty.
pub fn generate_multi<S: AsRef<str>>(import_path: &str, funcs: &[S]) -> BfuzzResult<String> {
    check_import_path(import_path)?;
    if funcs.is_empty() {
        return Err(BfuzzError::Generation("no fuzz functions to dispatch to".into()));
    }
    if funcs.len() > MAX_FUZZ_FUNCS {
        return Err(BfuzzError::Generation(format!(
            "{} fuzz functions exceed the selector range of {MAX_FUZZ_FUNCS}",
            funcs.len()
        )));
    }
    for (i, func) in funcs.iter().enumerate() {
        check_func(func.as_ref())?;
        if funcs[..i].iter().any(|f| f.as_ref() == func.as_ref()) {
            return Err(BfuzzError::Generation(format!(
                "duplicate fuzz function {}",
                func.as_ref()
            )));
        }
    }
    let mut emitter = HarnessEmitter::new(import_path);
    emitter.emit_multi(funcs).map_err(fmt_error)?;
    Ok(emitter.finish())
}

fn check_import_path(import_path: &str) -> BfuzzResult<()> {
    if import_path.trim().is_empty() {
        return Err(BfuzzError::Generation("empty package import path".into()));
    }
    Ok(())
}

fn check_func(func: &str) -> BfuzzResult<()> {
    if !validate_name(func) {
        return Err(BfuzzError::Generation(format!(
            "{func:?} is not a valid fuzz function name"
        )));
    }
    Ok(())
}

fn fmt_error(err: fmt::Error) -> BfuzzError {
    BfuzzError::Generation(err.to_string())
}

/// Quote a string as a Go interpreted string literal, the way `%q` does for
/// printable input.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct HarnessEmitter {
    /// Generated source.
    out: String,
    /// Import path of the package under test.
    import_path: String,
}

impl HarnessEmitter {
    fn new(import_path: &str) -> Self {
        Self {
            out: String::new(),
            import_path: import_path.to_string(),
        }
    }

    fn finish(self) -> String {
        self.out
    }

    fn emit_single(&mut self, func: &str) -> fmt::Result {
        self.emit_preamble()?;
        self.emit_result_slot()?;
        self.emit_test_one_input(|out| {
            writeln!(out, "\tinput := unsafe.Slice((*byte)(unsafe.Pointer(data)), int(size))")?;
            writeln!(out)?;
            writeln!(out, "\tresult, err := {TARGET_ALIAS}.{func}(input)")
        })?;
        self.emit_get_return_data()?;
        self.emit_main()
    }

    fn emit_multi<S: AsRef<str>>(&mut self, funcs: &[S]) -> fmt::Result {
        self.emit_preamble()?;

        writeln!(self.out, "// bfuzz_targets is indexed by the first input byte.")?;
        writeln!(self.out, "var bfuzz_targets = [...]func([]byte) ([]byte, error){{")?;
        for (i, func) in funcs.iter().enumerate() {
            writeln!(self.out, "\t{TARGET_ALIAS}.{}, // {i}", func.as_ref())?;
        }
        writeln!(self.out, "}}")?;
        writeln!(self.out)?;

        self.emit_result_slot()?;
        self.emit_test_one_input(|out| {
            writeln!(out, "\tif size == 0 {{")?;
            writeln!(out, "\t\treturn 0, 1")?;
            writeln!(out, "\t}}")?;
            writeln!(out, "\tinput := unsafe.Slice((*byte)(unsafe.Pointer(data)), int(size))")?;
            writeln!(out, "\tselector := int(input[0])")?;
            writeln!(out, "\tif selector >= len(bfuzz_targets) {{")?;
            writeln!(out, "\t\treturn 0, 1")?;
            writeln!(out, "\t}}")?;
            writeln!(out)?;
            writeln!(out, "\tresult, err := bfuzz_targets[selector](input[1:])")
        })?;
        self.emit_get_return_data()?;
        self.emit_main()
    }

    fn emit_preamble(&mut self) -> fmt::Result {
        let out = &mut self.out;
        writeln!(out, "// Code generated by go-bfuzz-build. DO NOT EDIT.")?;
        writeln!(out)?;
        writeln!(out, "//go:build ignore")?;
        writeln!(out, "// +build ignore")?;
        writeln!(out)?;
        writeln!(out, "package main")?;
        writeln!(out)?;
        writeln!(out, "import (")?;
        writeln!(out, "\t\"fmt\"")?;
        writeln!(out, "\t\"unsafe\"")?;
        writeln!(out)?;
        writeln!(out, "\t{TARGET_ALIAS} {}", go_quote(&self.import_path))?;
        writeln!(out, ")")?;
        writeln!(out)?;
        writeln!(out, "// #include <stdint.h>")?;
        writeln!(out, "import \"C\"")?;
        writeln!(out)
    }

    fn emit_result_slot(&mut self) -> fmt::Result {
        let out = &mut self.out;
        writeln!(out, "// bfuzz_return_data holds the result of the last successful call")?;
        writeln!(out, "// until it is copied out. Not safe for concurrent use.")?;
        writeln!(out, "var bfuzz_return_data []byte")?;
        writeln!(out)
    }

    fn emit_test_one_input<F>(&mut self, call: F) -> fmt::Result
    where
        F: FnOnce(&mut String) -> fmt::Result,
    {
        let out = &mut self.out;
        writeln!(out, "//export {TEST_ONE_INPUT_SYMBOL}")?;
        writeln!(
            out,
            "func {TEST_ONE_INPUT_SYMBOL}(data *C.char, size C.size_t) (resultSize C.size_t, errnum C.int) {{"
        )?;
        call(out)?;
        writeln!(out, "\tif err != nil || result == nil {{")?;
        writeln!(out, "\t\treturn 0, 1")?;
        writeln!(out, "\t}}")?;
        writeln!(out)?;
        writeln!(out, "\tbfuzz_return_data = result")?;
        writeln!(out, "\treturn C.size_t(len(bfuzz_return_data)), 0")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn emit_get_return_data(&mut self) -> fmt::Result {
        let out = &mut self.out;
        writeln!(out, "// {GET_RETURN_DATA_SYMBOL} copies the stored result into buf, which must")?;
        writeln!(out, "// hold at least resultSize bytes, and releases it. Call it at most once")?;
        writeln!(out, "// per successful {TEST_ONE_INPUT_SYMBOL}.")?;
        writeln!(out, "//")?;
        writeln!(out, "//export {GET_RETURN_DATA_SYMBOL}")?;
        writeln!(out, "func {GET_RETURN_DATA_SYMBOL}(buf *C.char) {{")?;
        writeln!(out, "\tsize := len(bfuzz_return_data)")?;
        writeln!(out, "\toutput := unsafe.Slice((*byte)(unsafe.Pointer(buf)), size)")?;
        writeln!(out, "\tnCopied := copy(output, bfuzz_return_data)")?;
        writeln!(out, "\tif nCopied != size {{")?;
        writeln!(
            out,
            "\t\tpanic(fmt.Sprintf(\"Go: Unable to copy entire result. Expected %v, but only copied %v\", size, nCopied))"
        )?;
        writeln!(out, "\t}}")?;
        writeln!(out, "\tbfuzz_return_data = nil")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn emit_main(&mut self) -> fmt::Result {
        writeln!(self.out, "func main() {{")?;
        writeln!(self.out, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_single() {
        let src = generate("example.com/p", "FuzzDecode").unwrap();
        assert!(src.starts_with("// Code generated by go-bfuzz-build. DO NOT EDIT."));
        assert!(src.contains("//go:build ignore\n// +build ignore\n"));
        assert!(src.contains("package main\n"));
        assert!(src.contains("\ttarget \"example.com/p\"\n"));
        assert!(src.contains("// #include <stdint.h>\nimport \"C\"\n"));
        assert!(src.contains("//export BFUZZGolangTestOneInput\n"));
        assert!(src.contains("//export BFUZZGolangGetReturnData\n"));
        assert!(src.contains("result, err := target.FuzzDecode(input)"));
        assert!(src.contains("if err != nil || result == nil {\n\t\treturn 0, 1\n\t}"));
        assert!(src.contains("Go: Unable to copy entire result. Expected %v, but only copied %v"));
        assert!(src.contains("\tbfuzz_return_data = nil\n"));
        assert!(src.trim_end().ends_with("func main() {\n}"));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = generate("example.com/p", "Fuzz").unwrap();
        let b = generate("example.com/p", "Fuzz").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_exports_exactly_two_symbols() {
        let src = generate("example.com/p", "Fuzz").unwrap();
        assert_eq!(src.matches("//export ").count(), 2);
    }

    #[test]
    fn test_generate_rejects_bad_input() {
        assert!(matches!(
            generate("", "Fuzz"),
            Err(BfuzzError::Generation(_))
        ));
        assert!(matches!(
            generate("example.com/p", "Fuzz(x)"),
            Err(BfuzzError::Generation(_))
        ));
        assert!(matches!(
            generate("example.com/p", "parse"),
            Err(BfuzzError::Generation(_))
        ));
    }

    #[test]
    fn test_generate_multi_dispatch_table() {
        let src = generate_multi("example.com/p", &["FuzzA", "FuzzB"]).unwrap();
        assert!(src.contains("\ttarget.FuzzA, // 0\n\ttarget.FuzzB, // 1\n"));
        assert!(src.contains("if size == 0 {"));
        assert!(src.contains("if selector >= len(bfuzz_targets) {"));
        assert!(src.contains("bfuzz_targets[selector](input[1:])"));
        assert_eq!(src.matches("//export ").count(), 2);
    }

    #[test]
    fn test_generate_multi_rejects_bad_tables() {
        let empty: [&str; 0] = [];
        assert!(generate_multi("example.com/p", &empty).is_err());
        assert!(generate_multi("example.com/p", &["FuzzA", "FuzzA"]).is_err());
        let too_many: Vec<String> = (0..=MAX_FUZZ_FUNCS).map(|i| format!("Fuzz{i}")).collect();
        assert!(generate_multi("example.com/p", &too_many).is_err());
    }

    #[test]
    fn test_go_quote() {
        assert_eq!(go_quote("example.com/p"), "\"example.com/p\"");
        assert_eq!(go_quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(go_quote("tab\there\n"), "\"tab\\there\\n\"");
        assert_eq!(go_quote("\u{1}"), "\"\\x01\"");
        assert_eq!(go_quote("héllo"), "\"héllo\"");
    }
}
