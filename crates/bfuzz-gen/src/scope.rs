//! Instrumentation scope: import paths compiled without coverage hooks.

use std::collections::BTreeSet;

/// Never instrumented. Instrumenting it recurses into the coverage runtime.
pub const ALWAYS_EXCLUDED: [&str; 1] = ["syscall"];

/// Runtime support packages. Non-deterministic, too low level to give a
/// useful signal, and instrumenting them creates import cycles with the
/// instrumentation runtime.
pub const RUNTIME_PACKAGES: [&str; 3] = ["runtime/cgo", "runtime/pprof", "runtime/race"];

/// Package of the generated harness.
pub const GENERATED_MAIN: &str = "main";

/// Set of import paths excluded from coverage instrumentation.
///
/// Iteration is in sorted order, so flags derived from it are stable
/// between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstrumentationScope {
    paths: BTreeSet<String>,
}

impl InstrumentationScope {
    /// Whether `path` is excluded.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Excluded paths in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Number of excluded paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Always false: `syscall` is always excluded.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl From<InstrumentationScope> for BTreeSet<String> {
    fn from(scope: InstrumentationScope) -> Self {
        scope.paths
    }
}

/// Compute the set of import paths to leave uninstrumented.
///
/// Each entry of `user_exclusions` may itself be a comma-separated list.
/// Paths are not validated; unknown ones simply match nothing at build time.
pub fn compute_scope<S: AsRef<str>>(
    user_exclusions: &[S],
    exclude_runtime: bool,
    exclude_generated_main: bool,
) -> InstrumentationScope {
    let mut paths: BTreeSet<String> = ALWAYS_EXCLUDED.iter().map(|p| p.to_string()).collect();

    if exclude_runtime {
        paths.extend(RUNTIME_PACKAGES.iter().map(|p| p.to_string()));
    }

    if exclude_generated_main {
        paths.insert(GENERATED_MAIN.to_string());
    }

    paths.extend(
        user_exclusions
            .iter()
            .flat_map(|entry| entry.as_ref().split(','))
            .filter(|p| !p.is_empty())
            .map(str::to_string),
    );

    InstrumentationScope { paths }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_fixed_exclusions() {
        let scope = compute_scope::<&str>(&[], true, true);
        assert_eq!(
            BTreeSet::from(scope),
            set(&["syscall", "runtime/cgo", "runtime/pprof", "runtime/race", "main"])
        );
    }

    #[test]
    fn test_user_paths_only() {
        let scope = compute_scope(&["foo", "bar"], false, false);
        assert_eq!(BTreeSet::from(scope), set(&["syscall", "foo", "bar"]));
    }

    #[test]
    fn test_syscall_always_present() {
        for runtime in [false, true] {
            for main in [false, true] {
                let scope = compute_scope::<&str>(&[], runtime, main);
                assert!(scope.contains("syscall"));
                assert_eq!(scope.contains("runtime/race"), runtime);
                assert_eq!(scope.contains("main"), main);
            }
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        let scope = compute_scope(&["syscall", "foo,foo", "main"], false, true);
        assert_eq!(BTreeSet::from(scope), set(&["syscall", "foo", "main"]));
    }

    #[test]
    fn test_comma_separated_entries_are_split() {
        let scope = compute_scope(&["a/b,c/d,", "e"], false, false);
        assert_eq!(BTreeSet::from(scope), set(&["syscall", "a/b", "c/d", "e"]));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let scope = compute_scope(&["zzz", "aaa"], true, true);
        let paths: Vec<&str> = scope.iter().collect();
        let mut sorted = paths.clone();
        sorted.sort_unstable();
        assert_eq!(paths, sorted);
        assert_eq!(scope.len(), 7);
    }
}
