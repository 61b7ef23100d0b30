//! Abstract Syntax Tree definitions for LQL.
//!
//! The tree is purely syntactic: names are kept as written and every leaf
//! remembers where it came from so later passes can point at it.

use serde::{Deserialize, Serialize};

/// A value paired with the byte offset it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spanned<T> {
    /// The value.
    pub node: T,
    /// Byte offset in the query text.
    pub offset: usize,
}

impl<T> Spanned<T> {
    /// Wraps `node` at `offset`.
    pub fn new(node: T, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Double-quoted string, unescaped.
    String(String),
    /// Bare integer.
    Number(i64),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A field comparison such as `severity >= "warning"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// The field name as written.
    pub field: Spanned<String>,
    /// The operator symbol as written (`==`, `contains`, ...).
    pub op: Spanned<String>,
    /// The literal to compare against.
    pub value: Spanned<Literal>,
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field.node, self.op.node, self.value.node)
    }
}

/// A filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// Both sides must match.
    And {
        /// Left-hand side.
        left: Box<Expr>,
        /// Right-hand side.
        right: Box<Expr>,
    },
    /// Either side must match.
    Or {
        /// Left-hand side.
        left: Box<Expr>,
        /// Right-hand side.
        right: Box<Expr>,
    },
    /// Negation.
    Not {
        /// The negated expression.
        expr: Box<Expr>,
    },
    /// `<field> <op> <literal>`
    Comparison(Comparison),
    /// `#name` or `-#name`
    LabelTest {
        /// Label name without the sigil.
        name: String,
        /// True for `-#name`.
        negated: bool,
        /// Offset of the sigil.
        offset: usize,
    },
    /// `:name`
    PresetRef {
        /// Preset name without the sigil.
        name: String,
        /// Offset of the sigil.
        offset: usize,
    },
    /// `@<amount><unit>`
    TimeWindow {
        /// How many units.
        amount: u64,
        /// Unit suffix as written.
        unit: String,
        /// Offset of the sigil.
        offset: usize,
    },
    /// Juxtaposed top-level terms, implicitly AND-ed. Empty matches everything.
    Sequence {
        /// The terms in written order.
        terms: Vec<Expr>,
    },
}

impl Expr {
    /// The expression that matches every entry.
    #[must_use]
    pub fn match_all() -> Self {
        Self::Sequence { terms: Vec::new() }
    }

    /// Builds `left and right`.
    #[must_use]
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Builds `left or right`.
    #[must_use]
    pub fn or(left: Expr, right: Expr) -> Self {
        Self::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Builds `not expr`.
    #[must_use]
    pub fn not(expr: Expr) -> Self {
        Self::Not {
            expr: Box::new(expr),
        }
    }

    /// Returns true if a `PresetRef` occurs anywhere in the tree.
    #[must_use]
    pub fn contains_preset_ref(&self) -> bool {
        match self {
            Self::PresetRef { .. } => true,
            Self::And { left, right } | Self::Or { left, right } => {
                left.contains_preset_ref() || right.contains_preset_ref()
            }
            Self::Not { expr } => expr.contains_preset_ref(),
            Self::Sequence { terms } => terms.iter().any(Self::contains_preset_ref),
            Self::Comparison(_) | Self::LabelTest { .. } | Self::TimeWindow { .. } => false,
        }
    }

    /// Moves every offset in the tree to `offset`.
    ///
    /// Used when a preset's expansion is spliced into a query, so that errors
    /// inside the expansion point at the `:name` that introduced it.
    pub fn relocate(&mut self, offset: usize) {
        match self {
            Self::And { left, right } | Self::Or { left, right } => {
                left.relocate(offset);
                right.relocate(offset);
            }
            Self::Not { expr } => expr.relocate(offset),
            Self::Sequence { terms } => terms.iter_mut().for_each(|t| t.relocate(offset)),
            Self::Comparison(c) => {
                c.field.offset = offset;
                c.op.offset = offset;
                c.value.offset = offset;
            }
            Self::LabelTest { offset: at, .. }
            | Self::PresetRef { offset: at, .. }
            | Self::TimeWindow { offset: at, .. } => *at = offset,
        }
    }

    /// Binding strength used when printing: higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Self::Or { .. } => 1,
            Self::And { .. } => 2,
            Self::Not { .. } => 3,
            _ => 4,
        }
    }

    fn fmt_operand(&self, f: &mut std::fmt::Formatter<'_>, min: u8) -> std::fmt::Result {
        match self {
            Self::Sequence { terms } => match terms.as_slice() {
                [] => Ok(()),
                [only] => only.fmt_operand(f, min),
                // Juxtaposition is only valid at the top level; nested, it prints as an
                // `and` chain and binds like `And`.
                [first, rest @ ..] => {
                    let wrap = min > 2;
                    if wrap {
                        f.write_str("(")?;
                    }
                    first.fmt_operand(f, 2)?;
                    for term in rest {
                        f.write_str(" and ")?;
                        term.fmt_operand(f, 3)?;
                    }
                    if wrap {
                        f.write_str(")")?;
                    }
                    Ok(())
                }
            },
            _ if self.precedence() < min => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And { left, right } => {
                left.fmt_operand(f, 2)?;
                f.write_str(" and ")?;
                right.fmt_operand(f, 3)
            }
            Self::Or { left, right } => {
                left.fmt_operand(f, 1)?;
                f.write_str(" or ")?;
                right.fmt_operand(f, 2)
            }
            Self::Not { expr } => {
                f.write_str("not ")?;
                expr.fmt_operand(f, 3)
            }
            Self::Comparison(c) => write!(f, "{c}"),
            Self::LabelTest { name, negated, .. } => {
                write!(f, "{}#{name}", if *negated { "-" } else { "" })
            }
            Self::PresetRef { name, .. } => write!(f, ":{name}"),
            Self::TimeWindow { amount, unit, .. } => write!(f, "@{amount}{unit}"),
            Self::Sequence { terms } => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    term.fmt_operand(f, 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Sort direction for the `sort` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first (oldest first for timestamps).
    #[default]
    Asc,
    /// Largest first (newest first for timestamps).
    Desc,
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// A post-filter pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineStage {
    /// `limit <n>`
    Limit {
        /// Requested count as written; range-checked by the validator.
        count: Spanned<i64>,
        /// Offset of the stage name.
        offset: usize,
    },
    /// `sort <field> [asc|desc]`
    Sort {
        /// Field to sort by.
        field: Spanned<String>,
        /// Direction, `asc` when omitted.
        direction: SortDirection,
        /// Offset of the stage name.
        offset: usize,
    },
    /// A stage name the grammar does not know.
    Unknown {
        /// The name as written.
        name: String,
        /// Offset of the stage name.
        offset: usize,
    },
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit { count, .. } => write!(f, "limit {}", count.node),
            Self::Sort {
                field, direction, ..
            } => write!(f, "sort {} {direction}", field.node),
            Self::Unknown { name, .. } => write!(f, "{name}"),
        }
    }
}

/// A parsed LQL query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// The filter expression.
    pub filter: Expr,
    /// Stages applied to the filtered entries, in written order.
    pub pipeline: Vec<PipelineStage>,
}

impl Query {
    /// Creates a query with the given filter and no pipeline.
    #[must_use]
    pub fn new(filter: Expr) -> Self {
        Self {
            filter,
            pipeline: Vec::new(),
        }
    }

    /// Creates a query that matches everything.
    #[must_use]
    pub fn match_all() -> Self {
        Self::new(Expr::match_all())
    }

    /// Appends a pipeline stage.
    #[must_use]
    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.pipeline.push(stage);
        self
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filter)?;

        for (i, stage) in self.pipeline.iter().enumerate() {
            if i > 0 || !matches!(&self.filter, Expr::Sequence { terms } if terms.is_empty()) {
                f.write_str(" ")?;
            }
            write!(f, "| {stage}")?;
        }

        Ok(())
    }
}
