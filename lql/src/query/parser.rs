//! Recursive-descent parser for LQL.
//!
//! Parses queries like:
//! - `:errors`
//! - `@24h subsystem == "connections"`
//! - `#tls and -#timeouts`
//! - `(severity >= "warning" or #exceptions) and not node == "rabbit@b" | sort timestamp desc | limit 20`
//!
//! Binding strength, loosest first: juxtaposition, `or`, `and`, `not`, then
//! primaries (comparisons, labels, presets, time windows, parenthesized groups).
//! The parser is purely syntactic; names are resolved by the validator.

use super::ast::{Comparison, Expr, Literal, PipelineStage, Query, SortDirection, Spanned};
use super::lexer::{tokenize, LexError, Token, TokenKind};
use thiserror::Error;

/// Errors that can occur during query parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The text could not be tokenized.
    #[error(transparent)]
    Lex(#[from] LexError),

    /// A token appeared where something else was required.
    #[error("Expected {expected}, found '{found}'")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// The raw text that was found.
        found: String,
        /// Offset of the offending token.
        position: usize,
    },

    /// The query ended where something else was required.
    #[error("Expected {expected}, found end of query")]
    UnexpectedEnd {
        /// What was expected.
        expected: String,
        /// End-of-input offset.
        position: usize,
    },

    /// A `(` without `)` or a stray `)`.
    #[error("Unbalanced parenthesis")]
    UnbalancedParenthesis {
        /// Offset of the unmatched parenthesis.
        position: usize,
    },

    /// A time window that is not `@<amount><unit>`.
    #[error("Invalid time window '{text}': expected '@<amount><unit>', e.g. '@24h'")]
    InvalidTimeWindow {
        /// The raw token.
        text: String,
        /// Offset of the token.
        position: usize,
    },

    /// A number that does not fit the integer range.
    #[error("Number '{text}' is out of range")]
    NumberOutOfRange {
        /// The raw number.
        text: String,
        /// Offset of the number.
        position: usize,
    },
}

impl ParseError {
    /// Byte offset of the error in the query text.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Lex(e) => e.position(),
            Self::UnexpectedToken { position, .. }
            | Self::UnexpectedEnd { position, .. }
            | Self::UnbalancedParenthesis { position }
            | Self::InvalidTimeWindow { position, .. }
            | Self::NumberOutOfRange { position, .. } => *position,
        }
    }
}

/// Tokenizes and parses query text.
///
/// An empty query is valid and matches everything.
///
/// # Errors
///
/// Returns a `ParseError` if the text cannot be tokenized or does not follow
/// the grammar.
///
/// # Examples
///
/// ```
/// use lql::query::{parse_query, Expr};
///
/// let query = parse_query("@24h :errors | limit 10").unwrap();
/// assert!(matches!(query.filter, Expr::Sequence { ref terms } if terms.len() == 2));
/// assert_eq!(query.pipeline.len(), 1);
/// ```
pub fn parse_query(input: &str) -> Result<Query, ParseError> {
    let tokens = tokenize(input)?;
    parse(&tokens)
}

/// Parses a token stream into a `Query`.
///
/// # Errors
///
/// Returns a `ParseError` pointing at the offending token, or at the end of
/// the input when more tokens were required.
pub fn parse(tokens: &[Token<'_>]) -> Result<Query, ParseError> {
    let mut parser = TokenParser::new(tokens);
    let filter = parser.sequence()?;
    let pipeline = parser.pipeline()?;
    Ok(Query { filter, pipeline })
}

struct TokenParser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    end: usize,
}

impl<'t, 'a> TokenParser<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        let end = tokens.last().map_or(0, |t| t.offset + t.len());
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token<'a>> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(word))
    }

    fn unexpected(&self, token: Option<&Token<'_>>, expected: impl Into<String>) -> ParseError {
        match token {
            Some(t) => ParseError::UnexpectedToken {
                expected: expected.into(),
                found: t.text.to_string(),
                position: t.offset,
            },
            None => ParseError::UnexpectedEnd {
                expected: expected.into(),
                position: self.end,
            },
        }
    }

    // ------------------------------------------------------------------------
    // Filter expressions
    // ------------------------------------------------------------------------

    fn sequence(&mut self) -> Result<Expr, ParseError> {
        let mut terms = Vec::new();

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Pipe => break,
                TokenKind::RParen => {
                    return Err(ParseError::UnbalancedParenthesis {
                        position: token.offset,
                    })
                }
                _ => terms.push(self.or_expression("a filter term")?),
            }
        }

        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Sequence { terms }
        })
    }

    fn or_expression(&mut self, context: &str) -> Result<Expr, ParseError> {
        let mut left = self.and_expression(context)?;

        while self.at_keyword("or") {
            let keyword = self.advance().map_or("or", |t| t.text);
            let right = self.and_expression(&format!("expression after '{keyword}'"))?;
            left = Expr::or(left, right);
        }

        Ok(left)
    }

    fn and_expression(&mut self, context: &str) -> Result<Expr, ParseError> {
        let mut left = self.not_expression(context)?;

        while self.at_keyword("and") {
            let keyword = self.advance().map_or("and", |t| t.text);
            let right = self.not_expression(&format!("expression after '{keyword}'"))?;
            left = Expr::and(left, right);
        }

        Ok(left)
    }

    fn not_expression(&mut self, context: &str) -> Result<Expr, ParseError> {
        if self.at_keyword("not") {
            let keyword = self.advance().map_or("not", |t| t.text);
            let inner = self.not_expression(&format!("expression after '{keyword}'"))?;
            return Ok(Expr::not(inner));
        }
        self.primary(context)
    }

    fn primary(&mut self, context: &str) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected(None, context));
        };

        match token.kind {
            TokenKind::LParen => self.group(),
            TokenKind::RParen => Err(ParseError::UnbalancedParenthesis {
                position: token.offset,
            }),
            TokenKind::Identifier => self.comparison(),
            TokenKind::Label | TokenKind::NegatedLabel => {
                self.advance();
                let negated = token.kind == TokenKind::NegatedLabel;
                let name = sigil_name(token, if negated { "-#" } else { "#" })?;
                Ok(Expr::LabelTest {
                    name,
                    negated,
                    offset: token.offset,
                })
            }
            TokenKind::Preset => {
                self.advance();
                let name = sigil_name(token, ":")?;
                Ok(Expr::PresetRef {
                    name,
                    offset: token.offset,
                })
            }
            TokenKind::TimeWindow => {
                self.advance();
                time_window(token)
            }
            TokenKind::Keyword
            | TokenKind::Operator
            | TokenKind::String
            | TokenKind::Number
            | TokenKind::Pipe => Err(self.unexpected(Some(token), context)),
        }
    }

    fn group(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance().map_or(self.end, |t| t.offset);
        let inner = self.or_expression("expression after '('")?;

        match self.advance() {
            Some(t) if t.kind == TokenKind::RParen => Ok(inner),
            Some(t) => Err(ParseError::UnexpectedToken {
                expected: "')' or a boolean operator".to_string(),
                found: t.text.to_string(),
                position: t.offset,
            }),
            None => Err(ParseError::UnbalancedParenthesis { position: open }),
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let Some(field) = self.advance() else {
            return Err(self.unexpected(None, "field name"));
        };

        let op = match self.peek() {
            Some(t) if matches!(t.kind, TokenKind::Operator | TokenKind::Identifier) => {
                self.advance();
                t
            }
            other => {
                return Err(self.unexpected(
                    other,
                    format!("operator after field '{}'", field.text),
                ))
            }
        };

        let value = match self.peek() {
            Some(t) if t.kind == TokenKind::String => {
                self.advance();
                Spanned::new(Literal::String(unquote(t.text)), t.offset)
            }
            Some(t) if t.kind == TokenKind::Number => {
                self.advance();
                Spanned::new(Literal::Number(parse_number(t)?), t.offset)
            }
            other => {
                return Err(self.unexpected(
                    other,
                    format!("a quoted string or number after '{}'", op.text),
                ))
            }
        };

        Ok(Expr::Comparison(Comparison {
            field: Spanned::new(field.text.to_string(), field.offset),
            op: Spanned::new(op.text.to_string(), op.offset),
            value,
        }))
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    fn pipeline(&mut self) -> Result<Vec<PipelineStage>, ParseError> {
        let mut stages = Vec::new();

        while let Some(pipe) = self.advance() {
            if pipe.kind != TokenKind::Pipe {
                return Err(self.unexpected(Some(pipe), "'|' or end of query"));
            }
            stages.push(self.stage()?);
        }

        Ok(stages)
    }

    fn stage(&mut self) -> Result<PipelineStage, ParseError> {
        let name = match self.advance() {
            Some(t) if t.kind == TokenKind::Identifier => t,
            other => return Err(self.unexpected(other, "pipeline stage name after '|'")),
        };

        let stage = if name.text.eq_ignore_ascii_case("limit") {
            let count = match self.advance() {
                Some(t) if t.kind == TokenKind::Number => Spanned::new(parse_number(t)?, t.offset),
                other => return Err(self.unexpected(other, "a number after 'limit'")),
            };
            PipelineStage::Limit {
                count,
                offset: name.offset,
            }
        } else if name.text.eq_ignore_ascii_case("sort") {
            let field = match self.advance() {
                Some(t) if t.kind == TokenKind::Identifier => {
                    Spanned::new(t.text.to_string(), t.offset)
                }
                other => return Err(self.unexpected(other, "field name after 'sort'")),
            };
            let direction = match self.peek() {
                Some(t) if t.kind == TokenKind::Identifier => {
                    self.advance();
                    if t.text.eq_ignore_ascii_case("asc") {
                        SortDirection::Asc
                    } else if t.text.eq_ignore_ascii_case("desc") {
                        SortDirection::Desc
                    } else {
                        return Err(self.unexpected(Some(t), "'asc' or 'desc'"));
                    }
                }
                _ => SortDirection::default(),
            };
            PipelineStage::Sort {
                field,
                direction,
                offset: name.offset,
            }
        } else {
            while self.peek().is_some_and(|t| t.kind != TokenKind::Pipe) {
                self.advance();
            }
            return Ok(PipelineStage::Unknown {
                name: name.text.to_string(),
                offset: name.offset,
            });
        };

        match self.peek() {
            None => Ok(stage),
            Some(t) if t.kind == TokenKind::Pipe => Ok(stage),
            other => Err(self.unexpected(other, "'|' or end of query")),
        }
    }
}

fn sigil_name(token: &Token<'_>, sigil: &str) -> Result<String, ParseError> {
    let name = &token.text[sigil.len()..];
    if name.is_empty() {
        let what = if sigil == ":" { "preset" } else { "label" };
        return Err(ParseError::UnexpectedToken {
            expected: format!("{what} name after '{sigil}'"),
            found: token.text.to_string(),
            position: token.offset,
        });
    }
    Ok(name.to_string())
}

fn time_window(token: &Token<'_>) -> Result<Expr, ParseError> {
    let body = &token.text[1..];
    let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let (amount, unit) = body.split_at(digits);

    if amount.is_empty() || unit.is_empty() {
        return Err(ParseError::InvalidTimeWindow {
            text: token.text.to_string(),
            position: token.offset,
        });
    }

    let amount = amount
        .parse::<u64>()
        .map_err(|_| ParseError::NumberOutOfRange {
            text: amount.to_string(),
            position: token.offset + 1,
        })?;

    Ok(Expr::TimeWindow {
        amount,
        unit: unit.to_string(),
        offset: token.offset,
    })
}

fn parse_number(token: &Token<'_>) -> Result<i64, ParseError> {
    token
        .text
        .parse::<i64>()
        .map_err(|_| ParseError::NumberOutOfRange {
            text: token.text.to_string(),
            position: token.offset,
        })
}

fn unquote(raw: &str) -> String {
    raw[1..raw.len() - 1].replace("\\\"", "\"")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(expr: &Expr) -> &Comparison {
        match expr {
            Expr::Comparison(c) => c,
            other => panic!("Expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_query_matches_all() {
        let query = parse_query("").unwrap();
        assert_eq!(query.filter, Expr::match_all());
        assert!(query.pipeline.is_empty());

        let query = parse_query("   ").unwrap();
        assert_eq!(query.filter, Expr::match_all());
    }

    #[test]
    fn test_parse_comparison() {
        let query = parse_query(r#"severity == "error""#).unwrap();
        let c = comparison(&query.filter);

        assert_eq!(c.field.node, "severity");
        assert_eq!(c.op.node, "==");
        assert_eq!(c.op.offset, 9);
        assert_eq!(c.value.node, Literal::String("error".to_string()));
        assert_eq!(c.value.offset, 12);
    }

    #[test]
    fn test_parse_number_literal() {
        let query = parse_query("id == -42").unwrap();
        assert_eq!(comparison(&query.filter).value.node, Literal::Number(-42));
    }

    #[test]
    fn test_parse_escaped_string() {
        let query = parse_query(r#"message contains "say \"hi\"""#).unwrap();
        assert_eq!(
            comparison(&query.filter).value.node,
            Literal::String("say \"hi\"".to_string())
        );
    }

    #[test]
    fn test_parse_unknown_operator_is_syntactically_valid() {
        let query = parse_query(r#"severity ===  "error""#).unwrap();
        assert_eq!(comparison(&query.filter).op.node, "===");

        let query = parse_query(r#"message has "x""#).unwrap();
        assert_eq!(comparison(&query.filter).op.node, "has");
    }

    #[test]
    fn test_parse_sigils() {
        let query = parse_query("#tls -#timeouts :errors @15m").unwrap();

        let Expr::Sequence { terms } = query.filter else {
            panic!("Expected sequence");
        };
        assert_eq!(terms.len(), 4);
        assert_eq!(
            terms[0],
            Expr::LabelTest {
                name: "tls".to_string(),
                negated: false,
                offset: 0
            }
        );
        assert_eq!(
            terms[1],
            Expr::LabelTest {
                name: "timeouts".to_string(),
                negated: true,
                offset: 5
            }
        );
        assert_eq!(
            terms[2],
            Expr::PresetRef {
                name: "errors".to_string(),
                offset: 16
            }
        );
        assert_eq!(
            terms[3],
            Expr::TimeWindow {
                amount: 15,
                unit: "m".to_string(),
                offset: 24
            }
        );
    }

    #[test]
    fn test_parse_and_or_precedence() {
        // AND binds tighter than OR
        let query = parse_query("#a or #b and #c").unwrap();
        match query.filter {
            Expr::Or { left, right } => {
                assert!(matches!(*left, Expr::LabelTest { .. }));
                assert!(matches!(*right, Expr::And { .. }));
            }
            other => panic!("Expected OR at top level, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_not_binds_tighter_than_and() {
        let query = parse_query("not #a and #b").unwrap();
        match query.filter {
            Expr::And { left, .. } => assert!(matches!(*left, Expr::Not { .. })),
            other => panic!("Expected AND at top level, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_left_associative() {
        let query = parse_query("#a and #b and #c").unwrap();
        match query.filter {
            Expr::And { left, right } => {
                assert!(matches!(*left, Expr::And { .. }));
                assert!(matches!(*right, Expr::LabelTest { .. }));
            }
            other => panic!("Expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_grouping() {
        let query = parse_query("(#a or #b) and #c").unwrap();
        match query.filter {
            Expr::And { left, .. } => assert!(matches!(*left, Expr::Or { .. })),
            other => panic!("Expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_juxtaposition_of_boolean_terms() {
        let query = parse_query("#a or #b #c").unwrap();
        let Expr::Sequence { terms } = query.filter else {
            panic!("Expected sequence");
        };
        assert!(matches!(terms[0], Expr::Or { .. }));
        assert!(matches!(terms[1], Expr::LabelTest { .. }));
    }

    #[test]
    fn test_parse_keywords_case_insensitive() {
        let query = parse_query("#a AND NOT #b").unwrap();
        assert!(matches!(query.filter, Expr::And { .. }));
    }

    #[test]
    fn test_parse_pipeline() {
        let query = parse_query(":errors | sort timestamp desc | limit 20").unwrap();

        assert_eq!(
            query.pipeline,
            vec![
                PipelineStage::Sort {
                    field: Spanned::new("timestamp".to_string(), 15),
                    direction: SortDirection::Desc,
                    offset: 10,
                },
                PipelineStage::Limit {
                    count: Spanned::new(20, 38),
                    offset: 32,
                },
            ]
        );
    }

    #[test]
    fn test_parse_sort_default_direction() {
        let query = parse_query("| sort severity").unwrap();
        assert!(matches!(
            query.pipeline[0],
            PipelineStage::Sort {
                direction: SortDirection::Asc,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_leading_pipe_matches_all() {
        let query = parse_query("| limit 5").unwrap();
        assert_eq!(query.filter, Expr::match_all());
        assert_eq!(query.pipeline.len(), 1);
    }

    #[test]
    fn test_parse_unknown_stage_is_kept() {
        let query = parse_query("#tls | head 5 | limit 2").unwrap();
        assert_eq!(
            query.pipeline[0],
            PipelineStage::Unknown {
                name: "head".to_string(),
                offset: 7
            }
        );
        assert_eq!(query.pipeline.len(), 2);
    }

    #[test]
    fn test_parse_error_missing_operand_after_and() {
        let err = parse_query("#a and").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedEnd {
                expected: "expression after 'and'".to_string(),
                position: 6,
            }
        );
        assert!(err.to_string().contains("after 'and'"));
    }

    #[test]
    fn test_parse_error_keyword_at_start() {
        let err = parse_query("and #a").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 0, .. }));
    }

    #[test]
    fn test_parse_error_unbalanced_open() {
        let err = parse_query("#x (#a or #b").unwrap_err();
        assert_eq!(err, ParseError::UnbalancedParenthesis { position: 3 });
    }

    #[test]
    fn test_parse_error_stray_close() {
        let err = parse_query("#a or #b)").unwrap_err();
        assert_eq!(err, ParseError::UnbalancedParenthesis { position: 8 });
    }

    #[test]
    fn test_parse_error_juxtaposition_inside_group() {
        let err = parse_query("(#a #b)").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 4, .. }));
    }

    #[test]
    fn test_parse_error_missing_operator() {
        let err = parse_query("severity").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedEnd {
                expected: "operator after field 'severity'".to_string(),
                position: 8,
            }
        );
    }

    #[test]
    fn test_parse_error_unquoted_value() {
        let err = parse_query("severity == error").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 12, .. }));
    }

    #[test]
    fn test_parse_error_limit_requires_number() {
        let err = parse_query("| limit ten").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: "a number after 'limit'".to_string(),
                found: "ten".to_string(),
                position: 8,
            }
        );
    }

    #[test]
    fn test_parse_error_sort_direction() {
        let err = parse_query("| sort timestamp sideways").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 17, .. }));
    }

    #[test]
    fn test_parse_error_trailing_stage_tokens() {
        let err = parse_query("| limit 5 6").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { position: 10, .. }));
    }

    #[test]
    fn test_parse_error_invalid_time_window() {
        assert!(matches!(
            parse_query("@h").unwrap_err(),
            ParseError::InvalidTimeWindow { position: 0, .. }
        ));
        assert!(matches!(
            parse_query("@24").unwrap_err(),
            ParseError::InvalidTimeWindow { position: 0, .. }
        ));
    }

    #[test]
    fn test_parse_error_empty_sigil_names() {
        assert!(matches!(
            parse_query("#").unwrap_err(),
            ParseError::UnexpectedToken { position: 0, .. }
        ));
        assert!(matches!(
            parse_query("#a :").unwrap_err(),
            ParseError::UnexpectedToken { position: 3, .. }
        ));
    }

    #[test]
    fn test_parse_error_lex_errors_propagate() {
        let err = parse_query(r#"message contains "x"#).unwrap_err();
        assert_eq!(err.position(), 17);
        assert!(matches!(err, ParseError::Lex(_)));
    }

    #[test]
    fn test_display_round_trip_is_stable() {
        let source = r#"(severity >= "warning" or #exceptions) and not node == "rabbit@b" @1d | sort timestamp desc | limit 20"#;
        let query = parse_query(source).unwrap();
        let printed = query.to_string();
        assert_eq!(parse_query(&printed).unwrap().to_string(), printed);
    }

    #[test]
    fn test_display_of_expanded_juxtaposed_preset_parses_back() {
        let catalogue = crate::catalogue::Catalogue::builder()
            .label("a")
            .label("b")
            .label("c")
            .preset("pair", "", "#a #b")
            .build()
            .unwrap();

        for source in ["not :pair", "#c or :pair", ":pair and #c", "@1h :pair #c"] {
            let query = parse_query(source).unwrap();
            let expanded = crate::query::expand_presets(&query.filter, &catalogue).unwrap();
            let printed = expanded.to_string();
            let reparsed = parse_query(&printed)
                .unwrap_or_else(|e| panic!("{source} printed as {printed:?}: {e}"));
            assert_eq!(reparsed.to_string(), printed, "{source}");
        }
    }
}
