use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::types::{error::DatabaseError, row::Row, value::Value};

/// Comparison operators for predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "==",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "==" => Ok(ComparisonOp::Equal),
            "!=" => Ok(ComparisonOp::NotEqual),
            "<" => Ok(ComparisonOp::LessThan),
            "<=" => Ok(ComparisonOp::LessThanOrEqual),
            ">" => Ok(ComparisonOp::GreaterThan),
            ">=" => Ok(ComparisonOp::GreaterThanOrEqual),
            other => Err(DatabaseError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Compare two values of the same runtime type. Integers order
/// numerically, strings lexicographically by bytes.
pub fn compare(left: &Value, right: &Value, op: ComparisonOp) -> Result<bool, DatabaseError> {
    match left.partial_cmp(right) {
        Some(ordering) => Ok(op.accepts(ordering)),
        None => Err(DatabaseError::IncomparableTypes {
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        }),
    }
}

/// SQL-style wildcard pattern: `%` matches any run of characters, `_`
/// exactly one. Matching is anchored at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    tokens: Vec<PatternToken>,
    case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    Literal(char),
    AnyOne,
    AnyRun,
}

impl LikePattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> Self {
        let mut tokens = Vec::with_capacity(pattern.len());
        for c in pattern.chars() {
            let token = match c {
                '%' => PatternToken::AnyRun,
                '_' => PatternToken::AnyOne,
                c if case_sensitive => PatternToken::Literal(c),
                c => PatternToken::Literal(fold(c)),
            };
            // collapse runs of %
            if token == PatternToken::AnyRun && tokens.last() == Some(&PatternToken::AnyRun) {
                continue;
            }
            tokens.push(token);
        }
        Self {
            tokens,
            case_sensitive,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let chars: Vec<char> = if self.case_sensitive {
            text.chars().collect()
        } else {
            text.chars().map(fold).collect()
        };

        // Greedy match with a single backtrack point at the latest `%`.
        let (mut t, mut p) = (0, 0);
        let mut star: Option<(usize, usize)> = None;
        while t < chars.len() {
            match self.tokens.get(p) {
                Some(PatternToken::AnyRun) => {
                    star = Some((p, t));
                    p += 1;
                }
                Some(PatternToken::AnyOne) => {
                    t += 1;
                    p += 1;
                }
                Some(PatternToken::Literal(c)) if *c == chars[t] => {
                    t += 1;
                    p += 1;
                }
                _ => match star {
                    Some((star_p, star_t)) => {
                        p = star_p + 1;
                        t = star_t + 1;
                        star = Some((star_p, star_t + 1));
                    }
                    None => return false,
                },
            }
        }
        self.tokens[p..]
            .iter()
            .all(|token| *token == PatternToken::AnyRun)
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

pub fn matches_pattern(value: &str, pattern: &str, case_sensitive: bool) -> bool {
    LikePattern::new(pattern, case_sensitive).matches(value)
}

/// A filter over a decoded row, addressed by column index.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// column op literal
    Constant {
        column: usize,
        op: ComparisonOp,
        value: Value,
    },
    /// column op column
    Columns {
        left: usize,
        op: ComparisonOp,
        right: usize,
    },
    /// string column LIKE pattern
    Pattern { column: usize, pattern: LikePattern },
    /// Always true predicate
    True,
}

impl Predicate {
    pub fn constant(column: usize, op: ComparisonOp, value: Value) -> Self {
        Self::Constant { column, op, value }
    }

    pub fn columns(left: usize, op: ComparisonOp, right: usize) -> Self {
        Self::Columns { left, op, right }
    }

    pub fn pattern(column: usize, pattern: &str, case_sensitive: bool) -> Self {
        Self::Pattern {
            column,
            pattern: LikePattern::new(pattern, case_sensitive),
        }
    }

    pub fn evaluate(&self, row: &Row) -> Result<bool, DatabaseError> {
        match self {
            Predicate::Constant { column, op, value } => {
                compare(column_value(row, *column)?, value, *op)
            }
            Predicate::Columns { left, op, right } => compare(
                column_value(row, *left)?,
                column_value(row, *right)?,
                *op,
            ),
            Predicate::Pattern { column, pattern } => match column_value(row, *column)? {
                Value::Text(text) => Ok(pattern.matches(text)),
                other => Err(DatabaseError::NotAStringColumn {
                    index: *column,
                    actual: other.type_name().to_string(),
                }),
            },
            Predicate::True => Ok(true),
        }
    }
}

fn column_value(row: &Row, index: usize) -> Result<&Value, DatabaseError> {
    row.get_value(index)
        .ok_or(DatabaseError::ColumnIndexOutOfBounds {
            index,
            count: row.values.len(),
        })
}
