//! Lexical rules for Go identifiers.
//!
//! The pest grammar applies these rules while parsing; the functions here
//! expose the same rules for names that arrive from the command line.

/// Go's reserved words. They can never be identifiers.
pub const KEYWORDS: [&str; 25] = [
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Whether `s` is a Go keyword.
pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

// Same Unicode tables as the grammar's LETTER and DECIMAL_NUMBER.
fn is_letter(c: char) -> bool {
    c == '_' || pest::unicode::LETTER(c)
}

fn is_digit(c: char) -> bool {
    pest::unicode::DECIMAL_NUMBER(c)
}

/// Whether `name` is a syntactically valid Go identifier: a letter or
/// underscore followed by letters, digits and underscores, and not a keyword.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_letter(c) => {}
        _ => return false,
    }
    chars.all(|c| is_letter(c) || is_digit(c)) && !is_keyword(name)
}

/// Whether `name` is exported, i.e. starts with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(pest::unicode::UPPERCASE_LETTER)
}
