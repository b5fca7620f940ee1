//! Syntax tree for the subset of Go the scanner understands.
//!
//! Only the package clause and top-level `func` and `type` declarations are
//! represented; everything else in a file is skipped by the parser.

use std::fmt;

/// Source location information for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Starting byte offset.
    pub start: usize,
    /// Ending byte offset.
    pub end: usize,
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

/// A node with associated span information.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The node value.
    pub node: T,
    /// Source location.
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Create a new spanned node.
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// One parsed `.go` file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Name from the `package` clause.
    pub package: String,
    /// Top-level declarations, in source order.
    pub decls: Vec<Spanned<Decl>>,
}

impl SourceFile {
    /// Package-level functions (methods excluded).
    pub fn functions(&self) -> impl Iterator<Item = &Spanned<Decl>> {
        self.decls
            .iter()
            .filter(|d| matches!(&d.node, Decl::Func(f) if f.receiver.is_none()))
    }

    /// Type declarations, including those inside `type ( ... )` groups.
    pub fn types(&self) -> impl Iterator<Item = &TypeSpec> {
        self.decls.iter().filter_map(|d| match &d.node {
            Decl::Type(t) => Some(t),
            Decl::Func(_) => None,
        })
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    /// `func ...`
    Func(FuncDecl),
    /// `type Name ...` or one spec of a `type ( ... )` group.
    Type(TypeSpec),
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    /// Function name.
    pub name: String,
    /// Receiver text for methods, `None` for plain functions.
    pub receiver: Option<String>,
    /// Whether the function declares type parameters.
    pub generic: bool,
    /// Parameter and result lists.
    pub signature: Signature,
    /// Whether a body follows (functions implemented in assembly have none).
    pub has_body: bool,
}

/// Parameter and result lists with grouped names expanded.
///
/// `func(a, b int)` has two parameters, both of type `int`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    /// Parameters in declaration order.
    pub params: Vec<Param>,
    /// Results in declaration order.
    pub results: Vec<Param>,
}

impl Signature {
    /// Whether the last parameter is `...T`.
    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }
}

/// One parameter or result.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Declared name, if any.
    pub name: Option<String>,
    /// Declared type.
    pub ty: TypeExpr,
    /// Whether declared with `...`.
    pub variadic: bool,
}

impl Param {
    /// Unnamed, non-variadic parameter.
    pub fn unnamed(ty: TypeExpr) -> Self {
        Self {
            name: None,
            ty,
            variadic: false,
        }
    }
}

/// A type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    /// Declared type name.
    pub name: String,
    /// `type A = B` rather than `type A B`.
    pub alias: bool,
    /// Whether the type declares type parameters.
    pub generic: bool,
    /// Right-hand side.
    pub ty: TypeExpr,
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanDir {
    /// `chan T`
    Both,
    /// `chan<- T`
    Send,
    /// `<-chan T`
    Recv,
}

/// A type expression as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `name`, `pkg.Name`, `Name[Args]`.
    Named {
        /// Package qualifier, as written.
        package: Option<String>,
        /// Type name.
        name: String,
        /// Type arguments of an instantiated generic type.
        args: Vec<TypeExpr>,
    },
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `[N]T`
    Array {
        /// Length expression, verbatim.
        len: String,
        /// Element type.
        elem: Box<TypeExpr>,
    },
    /// `map[K]V`
    Map {
        /// Key type.
        key: Box<TypeExpr>,
        /// Value type.
        value: Box<TypeExpr>,
    },
    /// `chan T`, `chan<- T`, `<-chan T`
    Chan {
        /// Direction.
        dir: ChanDir,
        /// Element type.
        elem: Box<TypeExpr>,
    },
    /// `func(...) ...`
    Func(Box<Signature>),
    /// `struct{...}`, body kept verbatim.
    Struct(String),
    /// `interface{...}`, body kept verbatim.
    Interface(String),
}

impl TypeExpr {
    /// Unqualified named type without type arguments.
    pub fn named(name: &str) -> Self {
        TypeExpr::Named {
            package: None,
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    /// `[]elem`
    pub fn slice(elem: TypeExpr) -> Self {
        TypeExpr::Slice(Box::new(elem))
    }

    /// The name if this is a bare identifier (`T`, not `pkg.T` or `T[U]`).
    pub fn as_bare_ident(&self) -> Option<&str> {
        match self {
            TypeExpr::Named {
                package: None,
                name,
                args,
            } if args.is_empty() => Some(name),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if p.variadic {
            write!(f, "...")?;
        }
        write!(f, "{}", p.ty)?;
    }
    Ok(())
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] if single.name.is_none() => write!(f, " {}", single.ty),
            results => {
                write!(f, " (")?;
                write_list(f, results)?;
                write!(f, ")")
            }
        }
    }
}

/// Renders types the way `go/types` prints them: `[]byte`, `map[string]int`,
/// `<-chan error`, `func([]byte) ([]byte, error)`.
impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named {
                package,
                name,
                args,
            } => {
                if let Some(pkg) = package {
                    write!(f, "{pkg}.")?;
                }
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "[")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, "]")?;
                }
                Ok(())
            }
            TypeExpr::Pointer(t) => write!(f, "*{t}"),
            TypeExpr::Slice(t) => write!(f, "[]{t}"),
            TypeExpr::Array { len, elem } => write!(f, "[{len}]{elem}"),
            TypeExpr::Map { key, value } => write!(f, "map[{key}]{value}"),
            TypeExpr::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            TypeExpr::Func(sig) => write!(f, "func{sig}"),
            TypeExpr::Struct(body) => write!(f, "struct{{{body}}}"),
            TypeExpr::Interface(body) => write!(f, "interface{{{body}}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_basic_types() {
        assert_eq!(TypeExpr::slice(TypeExpr::named("byte")).to_string(), "[]byte");
        assert_eq!(TypeExpr::named("error").to_string(), "error");

        let map = TypeExpr::Map {
            key: Box::new(TypeExpr::named("string")),
            value: Box::new(TypeExpr::Pointer(Box::new(TypeExpr::Named {
                package: Some("bytes".into()),
                name: "Buffer".into(),
                args: Vec::new(),
            }))),
        };
        assert_eq!(map.to_string(), "map[string]*bytes.Buffer");
    }

    #[test]
    fn test_display_chan_directions() {
        let elem = || Box::new(TypeExpr::named("int"));
        let recv = TypeExpr::Chan {
            dir: ChanDir::Recv,
            elem: elem(),
        };
        let send = TypeExpr::Chan {
            dir: ChanDir::Send,
            elem: elem(),
        };
        assert_eq!(recv.to_string(), "<-chan int");
        assert_eq!(send.to_string(), "chan<- int");
    }

    #[test]
    fn test_display_func_type() {
        let sig = Signature {
            params: vec![Param::unnamed(TypeExpr::slice(TypeExpr::named("byte")))],
            results: vec![
                Param::unnamed(TypeExpr::slice(TypeExpr::named("byte"))),
                Param::unnamed(TypeExpr::named("error")),
            ],
        };
        assert_eq!(
            TypeExpr::Func(Box::new(sig)).to_string(),
            "func([]byte) ([]byte, error)"
        );
    }

    #[test]
    fn test_variadic_detection() {
        let mut sig = Signature {
            params: vec![Param::unnamed(TypeExpr::named("byte"))],
            results: Vec::new(),
        };
        assert!(!sig.is_variadic());
        sig.params[0].variadic = true;
        assert!(sig.is_variadic());
    }

    #[test]
    fn test_bare_ident() {
        assert_eq!(TypeExpr::named("T").as_bare_ident(), Some("T"));
        assert_eq!(TypeExpr::slice(TypeExpr::named("T")).as_bare_ident(), None);
    }
}
