//! Tokenizer for LQL using nom.
//!
//! Splits query text such as `@24h :errors #tls and node == "rabbit@a" | limit 10`
//! into a flat token stream. Every token borrows its raw text from the input and
//! records the byte offset it starts at.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, opt, recognize},
    multi::many0_count,
    IResult, Parser,
};
use thiserror::Error;

/// Errors that can occur while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A string literal is missing its closing quote.
    #[error("Unterminated string literal starting at position {position}")]
    UnterminatedString {
        /// Offset of the opening quote.
        position: usize,
    },

    /// A character that cannot start any token.
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter {
        /// Offset of the character.
        position: usize,
        /// The offending character.
        character: char,
    },
}

impl LexError {
    /// Byte offset of the error in the query text.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::UnterminatedString { position } | Self::UnexpectedCharacter { position, .. } => {
                *position
            }
        }
    }
}

/// Kinds of tokens produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Field names, stage names, `asc`/`desc`, and other bare words.
    Identifier,
    /// `and`, `or`, `not` (any case).
    Keyword,
    /// A double-quoted string, quotes included in the raw text.
    String,
    /// An integer, optionally negative.
    Number,
    /// A run of `=`, `!`, `<`, `>` characters, or the word `contains`.
    Operator,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `|`
    Pipe,
    /// `:name`
    Preset,
    /// `@<amount><unit>`
    TimeWindow,
    /// `#name`
    Label,
    /// `-#name`
    NegatedLabel,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Identifier => "identifier",
            Self::Keyword => "keyword",
            Self::String => "string",
            Self::Number => "number",
            Self::Operator => "operator",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Pipe => "'|'",
            Self::Preset => "preset",
            Self::TimeWindow => "time window",
            Self::Label => "label",
            Self::NegatedLabel => "negated label",
        };
        f.write_str(name)
    }
}

/// A single token with its raw text and starting byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// The raw text as it appears in the query.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub offset: usize,
}

impl Token<'_> {
    /// Length of the raw text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true for zero-length tokens (never produced by `tokenize`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns true if this is the keyword `word` (case-insensitive).
    #[must_use]
    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(word)
    }
}

/// Tokenizes query text.
///
/// Whitespace only separates tokens. An empty or blank query yields an empty
/// token stream.
///
/// # Errors
///
/// Returns a `LexError` for an unterminated string or a character that cannot
/// start a token.
///
/// # Examples
///
/// ```
/// use lql::query::{tokenize, TokenKind};
///
/// let tokens = tokenize("#tls and -#timeouts").unwrap();
/// let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(kinds, vec![TokenKind::Label, TokenKind::Keyword, TokenKind::NegatedLabel]);
/// assert_eq!(tokens[2].offset, 9);
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tokens);
        }

        let offset = input.len() - rest.len();
        match token(rest) {
            Ok((remaining, (kind, text))) => {
                tokens.push(Token { kind, text, offset });
                rest = remaining;
            }
            Err(_) => {
                let character = rest.chars().next().unwrap_or_default();
                return Err(if character == '"' {
                    LexError::UnterminatedString { position: offset }
                } else {
                    LexError::UnexpectedCharacter {
                        position: offset,
                        character,
                    }
                });
            }
        }
    }
}

// ============================================================================
// Token recognizers
// ============================================================================

type Lexed<'a> = IResult<&'a str, (TokenKind, &'a str)>;

fn token(input: &str) -> Lexed<'_> {
    alt((
        string_literal,
        sigil("@", TokenKind::TimeWindow),
        sigil("-#", TokenKind::NegatedLabel),
        sigil("#", TokenKind::Label),
        sigil(":", TokenKind::Preset),
        number,
        operator,
        punctuation,
        word,
    ))
    .parse(input)
}

fn string_literal(input: &str) -> Lexed<'_> {
    map(
        recognize((
            char('"'),
            many0_count(alt((
                tag("\\\""),
                tag("\\"),
                take_while1(|c: char| c != '"' && c != '\\'),
            ))),
            char('"'),
        )),
        |text| (TokenKind::String, text),
    )
    .parse(input)
}

fn sigil<'a>(
    prefix: &'static str,
    kind: TokenKind,
) -> impl Parser<&'a str, Output = (TokenKind, &'a str), Error = nom::error::Error<&'a str>> {
    map(
        recognize((tag(prefix), take_while(is_ident_char))),
        move |text| (kind, text),
    )
}

fn number(input: &str) -> Lexed<'_> {
    map(recognize((opt(char('-')), digit1)), |text| {
        (TokenKind::Number, text)
    })
    .parse(input)
}

fn operator(input: &str) -> Lexed<'_> {
    map(
        take_while1(|c: char| matches!(c, '=' | '!' | '<' | '>')),
        |text| (TokenKind::Operator, text),
    )
    .parse(input)
}

fn punctuation(input: &str) -> Lexed<'_> {
    alt((
        map(tag("("), |text| (TokenKind::LParen, text)),
        map(tag(")"), |text| (TokenKind::RParen, text)),
        map(tag("|"), |text| (TokenKind::Pipe, text)),
    ))
    .parse(input)
}

fn word(input: &str) -> Lexed<'_> {
    let (rest, text) =
        recognize((take_while1(is_ident_start), take_while(is_ident_char))).parse(input)?;

    let kind = if ["and", "or", "not"]
        .iter()
        .any(|k| text.eq_ignore_ascii_case(k))
    {
        TokenKind::Keyword
    } else if text.eq_ignore_ascii_case("contains") {
        TokenKind::Operator
    } else {
        TokenKind::Identifier
    };

    Ok((rest, (kind, text)))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

// ============================================================================
// Tests
// ============================================================================
