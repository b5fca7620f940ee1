//! Parser for Go package sources using pest.
//!
//! Converts the pest parse tree to our AST nodes. Only top-level `func` and
//! `type` declarations are lowered; the grammar skips everything else.

use super::ast::*;
use anyhow::{anyhow, bail, Result};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "frontend/go.pest"]
struct GoParser;

/// Helper trait for extracting the next element from a pest iterator with context.
trait PairsExt<'i> {
    /// Get the next pair, returning an error with context if missing.
    fn expect_next(&mut self, context: &str) -> Result<Pair<'i, Rule>>;
}

impl<'i> PairsExt<'i> for Pairs<'i, Rule> {
    fn expect_next(&mut self, context: &str) -> Result<Pair<'i, Rule>> {
        self.next()
            .ok_or_else(|| anyhow!("Parser error: expected {} but found end of input", context))
    }
}

/// Parse one Go source file.
pub fn parse(source: &str) -> Result<SourceFile> {
    let pairs = GoParser::parse(Rule::source_file, source)
        .map_err(|e| anyhow!("Parse error: {}", e))?;

    let mut package = None;
    let mut decls = Vec::new();
    for pair in pairs {
        if pair.as_rule() != Rule::source_file {
            continue;
        }
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::package_clause => {
                    let name = inner
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::identifier)
                        .ok_or_else(|| anyhow!("Expected package name"))?;
                    package = Some(name.as_str().to_string());
                }
                Rule::func_decl => {
                    let span = span_from_pair(&inner);
                    decls.push(Spanned::new(Decl::Func(parse_func_decl(inner)?), span));
                }
                Rule::type_decl => {
                    for spec in inner.into_inner() {
                        if spec.as_rule() == Rule::type_spec {
                            let span = span_from_pair(&spec);
                            decls.push(Spanned::new(Decl::Type(parse_type_spec(spec)?), span));
                        }
                    }
                }
                // Tokens of skipped declarations
                _ => {}
            }
        }
    }

    let package = package.ok_or_else(|| anyhow!("Parse error: missing package clause"))?;
    Ok(SourceFile { package, decls })
}

fn span_from_pair(pair: &Pair<Rule>) -> Span {
    let pest_span = pair.as_span();
    let (line, col) = pest_span.start_pos().line_col();
    Span::new(pest_span.start(), pest_span.end(), line, col)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_func_decl(pair: Pair<Rule>) -> Result<FuncDecl> {
    let mut name = None;
    let mut receiver = None;
    let mut generic = false;
    let mut signature = None;
    let mut has_body = false;

    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::receiver => receiver = Some(collapse_whitespace(item.as_str())),
            Rule::identifier => name = Some(item.as_str().to_string()),
            Rule::type_params => generic = true,
            Rule::signature => signature = Some(parse_signature(item)?),
            Rule::block => has_body = true,
            _ => {}
        }
    }

    Ok(FuncDecl {
        name: name.ok_or_else(|| anyhow!("Expected function name"))?,
        receiver,
        generic,
        signature: signature.ok_or_else(|| anyhow!("Expected function signature"))?,
        has_body,
    })
}

fn parse_type_spec(pair: Pair<Rule>) -> Result<TypeSpec> {
    let mut inner = pair.into_inner();
    let name = inner.expect_next("type name")?.as_str().to_string();

    let mut alias = false;
    let mut generic = false;
    let mut ty = None;
    for item in inner {
        match item.as_rule() {
            Rule::type_params => generic = true,
            Rule::alias_marker => alias = true,
            _ => ty = Some(parse_type(item)?),
        }
    }

    let ty = ty.ok_or_else(|| anyhow!("Expected type for {name}"))?;
    Ok(TypeSpec {
        name,
        alias,
        generic,
        ty,
    })
}

fn parse_signature(pair: Pair<Rule>) -> Result<Signature> {
    let mut inner = pair.into_inner();
    let params = parse_parameters(inner.expect_next("parameter list")?)?;

    let results = match inner.next() {
        None => Vec::new(),
        Some(result) => {
            let item = result.into_inner().expect_next("result type")?;
            if item.as_rule() == Rule::parameters {
                parse_parameters(item)?
            } else {
                vec![Param::unnamed(parse_type(item)?)]
            }
        }
    };

    Ok(Signature { params, results })
}

/// A parameter entry before grouped names are resolved.
struct RawParam {
    name: Option<String>,
    ty: TypeExpr,
    variadic: bool,
}

fn parse_parameters(pair: Pair<Rule>) -> Result<Vec<Param>> {
    let mut raw = Vec::new();
    for param in pair.into_inner() {
        let mut name = None;
        let mut variadic = false;
        let mut ty = None;
        for item in param.into_inner() {
            match item.as_rule() {
                Rule::identifier => name = Some(item.as_str().to_string()),
                Rule::variadic => variadic = true,
                _ => ty = Some(parse_type(item)?),
            }
        }
        raw.push(RawParam {
            name,
            ty: ty.ok_or_else(|| anyhow!("Expected parameter type"))?,
            variadic,
        });
    }
    group_params(raw)
}

/// Resolve Go's grouped parameter syntax.
///
/// In `(a, b int, c string)` the grammar sees `a` and `b` as bare types.
/// Once any entry carries a name, every bare identifier entry is a name
/// sharing the type of the next named entry.
fn group_params(raw: Vec<RawParam>) -> Result<Vec<Param>> {
    if raw.iter().all(|p| p.name.is_none()) {
        return Ok(raw
            .into_iter()
            .map(|p| Param {
                name: None,
                ty: p.ty,
                variadic: p.variadic,
            })
            .collect());
    }

    let mut params = Vec::with_capacity(raw.len());
    let mut pending: Vec<String> = Vec::new();
    for p in raw {
        match p.name {
            None => {
                let name = match (p.variadic, p.ty.as_bare_ident()) {
                    (false, Some(ident)) => ident.to_string(),
                    _ => bail!("Parse error: mixed named and unnamed parameters"),
                };
                pending.push(name);
            }
            Some(name) => {
                for grouped in pending.drain(..) {
                    params.push(Param {
                        name: Some(grouped),
                        ty: p.ty.clone(),
                        variadic: p.variadic,
                    });
                }
                params.push(Param {
                    name: Some(name),
                    ty: p.ty,
                    variadic: p.variadic,
                });
            }
        }
    }
    if !pending.is_empty() {
        bail!("Parse error: mixed named and unnamed parameters");
    }
    Ok(params)
}

fn parse_type(pair: Pair<Rule>) -> Result<TypeExpr> {
    match pair.as_rule() {
        Rule::type_name => parse_type_name(pair),
        Rule::pointer_type => {
            let elem = pair.into_inner().expect_next("pointer element type")?;
            Ok(TypeExpr::Pointer(Box::new(parse_type(elem)?)))
        }
        Rule::slice_type => {
            let elem = pair.into_inner().expect_next("slice element type")?;
            Ok(TypeExpr::Slice(Box::new(parse_type(elem)?)))
        }
        Rule::array_type => {
            let mut inner = pair.into_inner();
            let len = collapse_whitespace(inner.expect_next("array length")?.as_str());
            let elem = parse_type(inner.expect_next("array element type")?)?;
            Ok(TypeExpr::Array {
                len,
                elem: Box::new(elem),
            })
        }
        Rule::map_type => {
            let mut types = pair.into_inner().filter(|p| p.as_rule() != Rule::kw_map);
            let key = types
                .next()
                .ok_or_else(|| anyhow!("Expected map key type"))?;
            let value = types
                .next()
                .ok_or_else(|| anyhow!("Expected map value type"))?;
            Ok(TypeExpr::Map {
                key: Box::new(parse_type(key)?),
                value: Box::new(parse_type(value)?),
            })
        }
        Rule::chan_type => {
            let mut inner = pair.into_inner();
            let dir_text: String = inner
                .expect_next("channel direction")?
                .as_str()
                .split_whitespace()
                .collect();
            let dir = if dir_text.starts_with("<-") {
                ChanDir::Recv
            } else if dir_text.ends_with("<-") {
                ChanDir::Send
            } else {
                ChanDir::Both
            };
            let elem = parse_type(inner.expect_next("channel element type")?)?;
            Ok(TypeExpr::Chan {
                dir,
                elem: Box::new(elem),
            })
        }
        Rule::func_type => {
            let sig = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::signature)
                .ok_or_else(|| anyhow!("Expected function type signature"))?;
            Ok(TypeExpr::Func(Box::new(parse_signature(sig)?)))
        }
        Rule::struct_type => Ok(TypeExpr::Struct(brace_body(pair.as_str()))),
        Rule::interface_type => Ok(TypeExpr::Interface(brace_body(pair.as_str()))),
        other => Err(anyhow!("Unexpected type node: {:?}", other)),
    }
}

fn parse_type_name(pair: Pair<Rule>) -> Result<TypeExpr> {
    let mut idents = Vec::new();
    let mut args = Vec::new();
    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::identifier => idents.push(item.as_str().to_string()),
            Rule::type_args => {
                for arg in item.into_inner() {
                    args.push(parse_type(arg)?);
                }
            }
            _ => {}
        }
    }

    let mut idents = idents.into_iter();
    let first = idents
        .next()
        .ok_or_else(|| anyhow!("Expected type name"))?;
    Ok(match idents.next() {
        Some(name) => TypeExpr::Named {
            package: Some(first),
            name,
            args,
        },
        None => TypeExpr::Named {
            package: None,
            name: first,
            args,
        },
    })
}

/// Text between the outer braces of `struct { ... }` / `interface { ... }`.
fn brace_body(text: &str) -> String {
    let open = text.find('{').map_or(0, |i| i + 1);
    let close = text.rfind('}').unwrap_or(text.len()).max(open);
    collapse_whitespace(&text[open..close])
}
