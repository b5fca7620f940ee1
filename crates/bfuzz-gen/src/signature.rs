//! Fuzz entry-function contract and discovery.
//!
//! An entry function looks like
//!
//! ```go
//! func FuzzXxx(data []byte) ([]byte, error)
//! ```
//!
//! [`validate_name`] and [`validate_signature`] are independent checks; a
//! function must pass both. [`discover`] applies them to every package-level
//! function of a scanned package and [`select_entry`] picks the function(s)
//! the harness will call.

use crate::frontend::{is_exported, is_identifier, Decl, SourceFile, Span, TypeExpr, TypeSpec};
use bfuzz_common::{BfuzzError, BfuzzResult, HarnessMode, DEFAULT_FUZZ_FUNC};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Required prefix of every entry-function name.
pub const FUZZ_PREFIX: &str = "Fuzz";

/// Printed form of the input parameter and first result.
pub const BYTES_TYPE: &str = "[]byte";

/// Printed form of the second result.
pub const ERROR_TYPE: &str = "error";

/// Most entry functions one harness can dispatch to (single-byte selector).
pub const MAX_FUZZ_FUNCS: usize = 255;

/// Alias chains longer than this are treated as unresolvable.
const MAX_ALIAS_DEPTH: usize = 32;

/// Whether `name` may name an entry function: a valid identifier, exported,
/// starting with `Fuzz`.
pub fn validate_name(name: &str) -> bool {
    is_identifier(name) && is_exported(name) && name.starts_with(FUZZ_PREFIX)
}

/// Reject a user-supplied entry-function name that can never match.
///
/// # Errors
///
/// [`BfuzzError::Usage`] if `name` fails [`validate_name`].
pub fn check_func_name(name: &str) -> BfuzzResult<()> {
    if validate_name(name) {
        Ok(())
    } else {
        Err(BfuzzError::Usage(format!(
            "provided --func={name}, but {name} is not a valid function name"
        )))
    }
}

/// Whether the printed parameter and result types match the contract:
/// exactly `([]byte)` in, exactly `([]byte, error)` out, not variadic.
pub fn validate_signature<S: AsRef<str>>(params: &[S], results: &[S], variadic: bool) -> bool {
    !variadic
        && tuple_has_types(params, &[BYTES_TYPE])
        && tuple_has_types(results, &[BYTES_TYPE, ERROR_TYPE])
}

fn tuple_has_types<S: AsRef<str>>(tuple: &[S], types: &[&str]) -> bool {
    tuple.len() == types.len() && tuple.iter().zip(types).all(|(t, want)| t.as_ref() == *want)
}

/// Package-level type information needed to print parameter types the way
/// the Go type checker would.
#[derive(Debug, Default)]
pub struct TypeEnv<'a> {
    /// Import path used to qualify package-declared types.
    qualifier: String,
    /// `type A = B` declarations.
    aliases: HashMap<&'a str, &'a TypeExpr>,
    /// Names of defined (non-alias) types.
    defined: HashSet<&'a str>,
}

impl<'a> TypeEnv<'a> {
    /// Collect the type declarations of all files of one package.
    pub fn new(qualifier: &str, files: &'a [ScannedFile]) -> Self {
        let mut env = TypeEnv {
            qualifier: qualifier.to_string(),
            ..TypeEnv::default()
        };
        for spec in files.iter().flat_map(|f| f.ast.types()) {
            env.declare(spec);
        }
        env
    }

    fn declare(&mut self, spec: &'a TypeSpec) {
        if spec.alias && !spec.generic {
            self.aliases.insert(&spec.name, &spec.ty);
        } else {
            self.defined.insert(&spec.name);
        }
    }

    /// Resolve aliases and qualify package-declared names.
    ///
    /// A package type named `byte` or `error` shadows the predeclared one
    /// and prints qualified, so it no longer matches the contract.
    pub fn resolve(&self, ty: &TypeExpr) -> TypeExpr {
        self.resolve_depth(ty, 0)
    }

    fn resolve_depth(&self, ty: &TypeExpr, depth: usize) -> TypeExpr {
        let next = depth + 1;
        match ty {
            TypeExpr::Named {
                package: None,
                name,
                args,
            } => {
                if args.is_empty() && depth < MAX_ALIAS_DEPTH {
                    if let Some(target) = self.aliases.get(name.as_str()) {
                        return self.resolve_depth(target, next);
                    }
                }
                let args = args.iter().map(|a| self.resolve_depth(a, next)).collect();
                let package = (self.defined.contains(name.as_str())
                    || self.aliases.contains_key(name.as_str()))
                .then(|| self.qualifier.clone());
                TypeExpr::Named {
                    package,
                    name: name.clone(),
                    args,
                }
            }
            TypeExpr::Named {
                package: Some(pkg),
                name,
                args,
            } => TypeExpr::Named {
                package: Some(pkg.clone()),
                name: name.clone(),
                args: args.iter().map(|a| self.resolve_depth(a, next)).collect(),
            },
            TypeExpr::Pointer(t) => TypeExpr::Pointer(Box::new(self.resolve_depth(t, next))),
            TypeExpr::Slice(t) => TypeExpr::Slice(Box::new(self.resolve_depth(t, next))),
            TypeExpr::Array { len, elem } => TypeExpr::Array {
                len: len.clone(),
                elem: Box::new(self.resolve_depth(elem, next)),
            },
            TypeExpr::Map { key, value } => TypeExpr::Map {
                key: Box::new(self.resolve_depth(key, next)),
                value: Box::new(self.resolve_depth(value, next)),
            },
            TypeExpr::Chan { dir, elem } => TypeExpr::Chan {
                dir: *dir,
                elem: Box::new(self.resolve_depth(elem, next)),
            },
            TypeExpr::Func(_) | TypeExpr::Struct(_) | TypeExpr::Interface(_) => ty.clone(),
        }
    }
}

/// A source file of the target package together with its parsed form.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// File name, for diagnostics.
    pub name: String,
    /// Parsed declarations.
    pub ast: SourceFile,
}

/// A package-level function whose name passes [`validate_name`].
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Function name.
    pub name: String,
    /// `file.go:line`.
    pub location: String,
    /// Resolved signature, printed Go-style.
    pub signature: String,
    /// Why it cannot be an entry function, `None` if it can.
    pub rejection: Option<Rejection>,
}

impl Candidate {
    /// Whether the function satisfies the contract.
    pub fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Reasons a correctly named function is not an entry function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Parameter or result types do not match, or the function is variadic.
    Signature,
    /// Declares type parameters; the harness cannot instantiate it.
    Generic,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Signature => write!(f, "signature must be func([]byte) ([]byte, error)"),
            Rejection::Generic => write!(f, "generic functions cannot be fuzzed"),
        }
    }
}

/// Every correctly named package-level function of one package, sorted by
/// name.
#[derive(Debug, Clone, Default)]
pub struct FuzzScan {
    /// Import path of the scanned package.
    pub package: String,
    /// Named candidates, valid or not.
    pub candidates: Vec<Candidate>,
}

impl FuzzScan {
    /// Names of the functions that satisfy the contract, sorted.
    pub fn valid_names(&self) -> Vec<&str> {
        self.candidates
            .iter()
            .filter(|c| c.is_valid())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Look up a candidate by name.
    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.name == name)
    }
}

/// Enumerate the entry-function candidates of a package.
pub fn discover(import_path: &str, files: &[ScannedFile]) -> FuzzScan {
    let env = TypeEnv::new(import_path, files);
    let mut candidates = Vec::new();

    for file in files {
        for decl in file.ast.functions() {
            let Decl::Func(func) = &decl.node else {
                continue;
            };
            if !validate_name(&func.name) {
                continue;
            }

            let params: Vec<String> = func
                .signature
                .params
                .iter()
                .map(|p| env.resolve(&p.ty).to_string())
                .collect();
            let results: Vec<String> = func
                .signature
                .results
                .iter()
                .map(|p| env.resolve(&p.ty).to_string())
                .collect();

            let rejection = if func.generic {
                Some(Rejection::Generic)
            } else if !validate_signature(&params, &results, func.signature.is_variadic()) {
                Some(Rejection::Signature)
            } else {
                None
            };

            let candidate = Candidate {
                name: func.name.clone(),
                location: location(&file.name, decl.span),
                signature: format_signature(&params, &results, func.signature.is_variadic()),
                rejection,
            };
            debug!(
                name = %candidate.name,
                location = %candidate.location,
                signature = %candidate.signature,
                valid = candidate.is_valid(),
                "Found fuzz function candidate"
            );
            candidates.push(candidate);
        }
    }

    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    FuzzScan {
        package: import_path.to_string(),
        candidates,
    }
}

fn location(file: &str, span: Span) -> String {
    format!("{}:{}", file, span.line)
}

fn format_signature(params: &[String], results: &[String], variadic: bool) -> String {
    let mut params = params.to_vec();
    if variadic {
        if let Some(last) = params.last_mut() {
            last.insert_str(0, "...");
        }
    }
    let results = match results {
        [] => String::new(),
        [single] => format!(" {single}"),
        many => format!(" ({})", many.join(", ")),
    };
    format!("func({}){}", params.join(", "), results)
}

/// The function(s) a harness will call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Functions exported through the harness, in selector order.
    pub functions: Vec<String>,
}

impl Selection {
    /// The entry function of a single-target harness.
    pub fn primary(&self) -> &str {
        self.functions.first().map_or("", String::as_str)
    }
}

/// Pick the entry function(s) from a scan.
///
/// With `requested` set, that function must exist and satisfy the contract.
/// Without it, `Fuzz` is preferred, then the sole candidate. In
/// [`HarnessMode::Multi`] every valid candidate is selected.
///
/// # Errors
///
/// [`BfuzzError::Usage`] for a malformed requested name,
/// [`BfuzzError::Resolution`] for everything else.
pub fn select_entry(
    scan: &FuzzScan,
    requested: Option<&str>,
    mode: HarnessMode,
) -> BfuzzResult<Selection> {
    if let Some(name) = requested {
        check_func_name(name)?;
        if let Some(candidate) = scan.get(name) {
            if let Some(reason) = candidate.rejection {
                return Err(BfuzzError::Resolution(format!(
                    "provided --func={name}, but {name} is not a fuzz function: {} has {}, {reason}",
                    candidate.location, candidate.signature
                )));
            }
        }
    }

    let valid = scan.valid_names();
    if valid.is_empty() {
        return Err(BfuzzError::Resolution(format!(
            "could not find any fuzz functions in {}",
            scan.package
        )));
    }
    if valid.len() > MAX_FUZZ_FUNCS {
        return Err(BfuzzError::Resolution(format!(
            "a harness supports a maximum of {MAX_FUZZ_FUNCS} fuzz functions, found {}",
            valid.len()
        )));
    }

    if let Some(name) = requested {
        if !valid.contains(&name) {
            return Err(BfuzzError::Resolution(format!(
                "could not find fuzz function {name} in {}",
                scan.package
            )));
        }
    }

    let functions: Vec<String> = match mode {
        HarnessMode::Multi => valid.iter().map(|s| s.to_string()).collect(),
        HarnessMode::Single => {
            let chosen = match requested {
                Some(name) => name,
                None if valid.contains(&DEFAULT_FUZZ_FUNC) => DEFAULT_FUZZ_FUNC,
                None if valid.len() == 1 => valid[0],
                None => {
                    return Err(BfuzzError::Resolution(format!(
                        "must specify a fuzz function with --func, found: {}",
                        valid.join(", ")
                    )))
                }
            };
            vec![chosen.to_string()]
        }
    };

    Ok(Selection { functions })
}
