//! Static token tables.
//!
//! These are fixed facts about the host expression language a Cheetah
//! template embeds (an expression-oriented, Python-shaped syntax); unlike
//! [`crate::settings::Settings`] they never change across a compilation
//! and are never rebuilt from user configuration.

/// Characters that may start an identifier.
pub const IDENT_START: fn(char) -> bool = |c| c.is_ascii_alphabetic() || c == '_';

/// Characters that may continue an identifier after the first.
pub const IDENT_CONT: fn(char) -> bool = |c| c.is_ascii_alphanumeric() || c == '_';

/// Reserved words of the embedded host language.
pub const KEYWORDS: &[&str] = &[
    "and", "del", "for", "is", "raise", "assert", "elif", "from", "lambda", "return", "break",
    "else", "global", "not", "try", "class", "except", "if", "or", "while", "continue", "exec",
    "import", "pass", "def", "finally", "in", "print",
];

/// Multi-character operators, longest-match-first within each length class.
pub const OPERATORS: &[&str] = &[
    "**=", ">>=", "<<=", "//", "**", "+=", "-=", "*=", "/=", "^=", "%=", "&=", "|=", ">>", "<<",
    "==", "!=", "<=", ">=", "<>", "+", "-", "~", "*", "/", "%", "&", "|", "^", "=", "<", ">",
];

/// Single-character delimiters plus the augmented-assignment operators
/// (which double as delimiters when scanning argument lists).
pub const DELIMITERS: &[&str] = &[
    "(", ")", "{", "}", "[", "]", ",", ".", ":", ";", "=", "`", "+=", "-=", "/=", "*=", "**=",
    "^=", "%=", ">>=", "<<=", "&=", "|=",
];

/// The 18 triple-quoted string opener spellings (quote char optionally
/// preceded by one of the four `r`/`u`/`ur` string-prefix casings).
pub const TRIPLE_QUOTE_STARTS: &[&str] = &[
    "'''", "\"\"\"", "r'''", "r\"\"\"", "R'''", "R\"\"\"", "u'''", "u\"\"\"", "U'''", "U\"\"\"",
    "ur'''", "ur\"\"\"", "Ur'''", "Ur\"\"\"", "uR'''", "uR\"\"\"", "UR'''", "UR\"\"\"",
];

/// Maps a triple-quote opener to its matching closer (the prefix letters
/// are dropped; only the quote run itself must match).
pub fn triple_quote_closer(opener: &str) -> &'static str {
    if opener.ends_with("'''") {
        "'''"
    } else {
        "\"\"\""
    }
}

pub fn closing_delimiter(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

pub fn opening_delimiter(close: char) -> Option<char> {
    match close {
        ')' => Some('('),
        ']' => Some('['),
        '}' => Some('{'),
        _ => None,
    }
}

/// Directive names that open a region which must later be closed with
/// `#end <name>` (possibly via a recognized short form instead).
pub const CLOSEABLE_DIRECTIVES: &[&str] = &[
    "def", "block", "call", "filter", "if", "for", "while", "try",
];

/// Directives handled by a dedicated parser routine rather than the
/// generic simple-indenting/simple-expression groups.
pub const CUSTOM_DIRECTIVES: &[&str] = &[
    "extends",
    "implements",
    "super",
    "slurp",
    "filter",
    "call",
    "attr",
    "def",
    "block",
    "@",
    "set",
    "if",
    "compiler-settings",
    "encoding",
    "end",
];

/// Directives that open an indented region and are re-emitted verbatim
/// with the same keyword and trailing colon (`#for`, `#while`, `#else`, …).
pub const SIMPLE_INDENTING_DIRECTIVES: &[&str] =
    &["else", "elif", "for", "while", "try", "except", "finally"];

/// Directives that compile to a single expression statement.
pub const SIMPLE_EXPR_DIRECTIVES: &[&str] = &[
    "pass", "continue", "return", "yield", "break", "del", "assert", "raise", "silent", "import",
    "from",
];

/// Keyword tokens that terminate expression scanning, except when found
/// immediately after a `for` token at the same nesting depth (list/
/// generator comprehensions: `[x for x in y]`).
pub const COMPREHENSION_CONTINUATION: &str = "in";
