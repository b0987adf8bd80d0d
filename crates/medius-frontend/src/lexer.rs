//! LP format lexer
//!
//! Tokenizes the LP dialect using the logos crate. Backslash comments run
//! to end of line. Names start with a letter or underscore and may continue
//! with alphanumerics or any of `!"#$%&(),.;?@_{}~`. Signs are separate
//! tokens; the parser folds them into factors. The relational synonyms are
//! resolved here: `=<` reads as `<=` and `==` as `=`.

use logos::Logos;

/// LP tokens.
#[derive(Logos, Debug, PartialEq, Clone, Copy)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"\\[^\n]*")]
pub enum Token<'a> {
    /// `<`, `<=` or the `=<` synonym.
    #[token("<")]
    #[token("<=")]
    #[token("=<")]
    Less,

    /// `>` or `>=`.
    #[token(">")]
    #[token(">=")]
    Greater,

    /// `=` or `==`.
    #[token("=")]
    #[token("==")]
    Equal,

    /// Label separator.
    #[token(":")]
    Colon,

    /// Explicit plus sign.
    #[token("+")]
    Plus,

    /// Explicit minus sign.
    #[token("-")]
    Minus,

    /// Unsigned integer literal.
    #[regex(r"[0-9]+", |lex| lex.slice())]
    Integer(&'a str),

    /// Unsigned decimal literal (objective coefficients only).
    #[regex(r"[0-9]+\.[0-9]*([eE][-+]?[0-9]+)?", |lex| lex.slice())]
    #[regex(r"[0-9]+[eE][-+]?[0-9]+", |lex| lex.slice())]
    Double(&'a str),

    /// Variable name, label, or contextual section keyword.
    #[regex(r##"[A-Za-z_][0-9A-Za-z!"#$%&(),.;?@_{}~]*"##, |lex| lex.slice())]
    Name(&'a str),
}
