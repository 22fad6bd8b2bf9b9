//! Conditional expression language.
//!
//! Expressions are parsed once into an [`Expr`] tree and evaluated per row.
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := clause ( "&&" clause )*
//! clause  := "!" clause
//!          | field IN "(" value ( "," value )* ")"
//!          | field BETWEEN number AND number
//!          | field LIKE quoted-pattern
//!          | field ( "==" | "=" | "!=" | "<" | ">" | "<=" | ">=" ) value
//! ```
//!
//! There are no parentheses and no precedence beyond `||` over `&&`.
//! Splitting honours single and double quotes that start a value, so `||`
//! inside a quoted literal is not an operator while `O'Brien` stays a bare
//! word. Keywords are case-insensitive.
//!
//! The grammar fails closed: a clause that matches no form becomes
//! [`Expr::Malformed`] and evaluates to `false`. Use [`parse_strict`] to
//! surface those clauses as errors when linting mappings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

use crate::error::ExpressionError;
use crate::models::{parse_number, Row};

const FIELD: &str = r"\w[\w.\-]*";

static IN_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?is)^({FIELD})\s+IN\s*\((.*)\)$")).expect("IN pattern"));

static BETWEEN_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)^({FIELD})\s+BETWEEN\s+(.+?)\s+AND\s+(.+)$")).expect("BETWEEN pattern")
});

static LIKE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?is)^({FIELD})\s+LIKE\s+(.+)$")).expect("LIKE pattern"));

static COMPARE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?s)^({FIELD})\s*(==|!=|<=|>=|=|<|>)\s*(.*)$")).expect("comparison pattern")
});

// =============================================================================
// AST
// =============================================================================

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "==" | "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Le => ordering != Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Unquoted `null`: matches an absent or null field
    Null,
    /// Literal text, with its numeric reading when it has one
    Literal { text: String, number: Option<f64> },
}

/// A compiled SQL `LIKE` pattern.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    /// Compile a pattern: `%` matches any run, `_` one character, everything
    /// else is literal.
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut translated = String::with_capacity(pattern.len() + 8);
        let mut literal = String::new();
        translated.push_str("^(?s:");
        for c in pattern.chars() {
            match c {
                '%' | '_' => {
                    translated.push_str(&regex::escape(&literal));
                    literal.clear();
                    translated.push_str(if c == '%' { ".*" } else { "." });
                }
                _ => literal.push(c),
            }
        }
        translated.push_str(&regex::escape(&literal));
        translated.push_str(")$");
        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&translated)?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// True if any branch is true
    Or(Vec<Expr>),
    /// True if every branch is true
    And(Vec<Expr>),
    Not(Box<Expr>),
    In { field: String, values: Vec<String> },
    Between { field: String, low: f64, high: f64 },
    Like { field: String, pattern: LikePattern },
    Compare { field: String, op: CompareOp, operand: Operand },
    /// Clause matching no grammar form; always false
    Malformed { clause: String, reason: String },
}

impl Expr {
    /// Evaluate against a row.
    pub fn evaluate(&self, row: &Row) -> bool {
        match self {
            Expr::Or(branches) => branches.iter().any(|e| e.evaluate(row)),
            Expr::And(branches) => branches.iter().all(|e| e.evaluate(row)),
            Expr::Not(inner) => !inner.evaluate(row),
            Expr::In { field, values } => match row.lookup(field) {
                Some(value) => {
                    let text = value.to_string();
                    values.iter().any(|v| *v == text)
                }
                None => false,
            },
            Expr::Between { field, low, high } => row
                .lookup(field)
                .and_then(|v| v.as_f64())
                .is_some_and(|v| *low <= v && v <= *high),
            Expr::Like { field, pattern } => row
                .lookup(field)
                .is_some_and(|v| pattern.is_match(&v.to_string())),
            Expr::Compare { field, op, operand } => eval_compare(row, field, *op, operand),
            Expr::Malformed { .. } => false,
        }
    }

    /// First malformed clause in the tree, if any.
    pub fn first_malformed(&self) -> Option<ExpressionError> {
        match self {
            Expr::Or(branches) | Expr::And(branches) => branches.iter().find_map(Expr::first_malformed),
            Expr::Not(inner) => inner.first_malformed(),
            Expr::Malformed { clause, reason } => Some(ExpressionError {
                clause: clause.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    /// Field names referenced by the expression.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Or(branches) | Expr::And(branches) => {
                for branch in branches {
                    branch.collect_fields(out);
                }
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::In { field, .. }
            | Expr::Between { field, .. }
            | Expr::Like { field, .. }
            | Expr::Compare { field, .. } => out.push(field),
            Expr::Malformed { .. } => {}
        }
    }
}

fn eval_compare(row: &Row, field: &str, op: CompareOp, operand: &Operand) -> bool {
    let value = row.lookup(field);
    match operand {
        Operand::Null => match op {
            CompareOp::Eq => value.is_none(),
            CompareOp::Ne => value.is_some(),
            _ => false,
        },
        Operand::Literal { text, number } => {
            if op.is_ordering() {
                let (Some(left), Some(right)) = (value.and_then(|v| v.as_f64()), *number) else {
                    return false;
                };
                left.partial_cmp(&right).is_some_and(|ord| op.holds(ord))
            } else {
                let equal = value.is_some_and(|v| v.to_string() == *text);
                if op == CompareOp::Eq { equal } else { !equal }
            }
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Parse an expression. Never fails: malformed clauses become
/// [`Expr::Malformed`].
pub fn parse(input: &str) -> Expr {
    let mut branches: Vec<Expr> = split_outside_quotes(input, "||")
        .into_iter()
        .map(parse_conjunction)
        .collect();
    if branches.len() == 1 {
        branches.remove(0)
    } else {
        Expr::Or(branches)
    }
}

/// Parse an expression, rejecting it if any clause is malformed.
pub fn parse_strict(input: &str) -> Result<Expr, ExpressionError> {
    let expr = parse(input);
    match expr.first_malformed() {
        Some(err) => Err(err),
        None => Ok(expr),
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(input: &str, row: &Row) -> bool {
    parse(input).evaluate(row)
}

fn parse_conjunction(segment: &str) -> Expr {
    let mut clauses: Vec<Expr> = split_outside_quotes(segment, "&&")
        .into_iter()
        .map(parse_clause)
        .collect();
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        Expr::And(clauses)
    }
}

fn parse_clause(raw: &str) -> Expr {
    let clause = raw.trim();
    if clause.is_empty() {
        return malformed(clause, "empty clause");
    }
    if let Some(rest) = clause.strip_prefix('!') {
        if !rest.starts_with('=') {
            return Expr::Not(Box::new(parse_clause(rest)));
        }
    }

    if let Some(caps) = IN_CLAUSE.captures(clause) {
        let values = split_outside_quotes(&caps[2], ",")
            .into_iter()
            .map(|v| unquote(v.trim()).to_string())
            .collect();
        return Expr::In { field: caps[1].to_string(), values };
    }

    if let Some(caps) = BETWEEN_CLAUSE.captures(clause) {
        let low = parse_number(unquote(caps[2].trim()));
        let high = parse_number(unquote(caps[3].trim()));
        return match (low, high) {
            (Some(low), Some(high)) => Expr::Between { field: caps[1].to_string(), low, high },
            _ => malformed(clause, "BETWEEN bounds must be numeric"),
        };
    }

    if let Some(caps) = LIKE_CLAUSE.captures(clause) {
        let raw_pattern = caps[2].trim();
        return match quoted(raw_pattern) {
            Some(pattern) => match LikePattern::compile(pattern) {
                Ok(pattern) => Expr::Like { field: caps[1].to_string(), pattern },
                Err(e) => malformed(clause, &format!("invalid LIKE pattern: {}", e)),
            },
            None => malformed(clause, "LIKE pattern must be quoted"),
        };
    }

    if let Some(caps) = COMPARE_CLAUSE.captures(clause) {
        let Some(op) = CompareOp::parse(&caps[2]) else {
            return malformed(clause, "unknown comparison operator");
        };
        let raw_value = caps[3].trim();
        if raw_value.is_empty() {
            return malformed(clause, "missing comparison value");
        }
        let operand = if raw_value.eq_ignore_ascii_case("null") {
            Operand::Null
        } else {
            let text = unquote(raw_value).to_string();
            let number = parse_number(&text);
            Operand::Literal { text, number }
        };
        if op.is_ordering() {
            match &operand {
                Operand::Null => return malformed(clause, "null cannot be ordered"),
                Operand::Literal { number: None, .. } => {
                    return malformed(clause, "ordering comparison needs a numeric value")
                }
                _ => {}
            }
        }
        return Expr::Compare { field: caps[1].to_string(), op, operand };
    }

    malformed(clause, "no matching clause form")
}

fn malformed(clause: &str, reason: &str) -> Expr {
    Expr::Malformed { clause: clause.to_string(), reason: reason.to_string() }
}

/// Split `input` on `sep`, ignoring separators inside quotes.
///
/// A quote only opens a literal at the start of a value token, so an
/// apostrophe inside a bare word (`O'Brien`) is an ordinary character. If a
/// literal is still open at the end of the input the quotes are ignored and
/// the input is split plainly.
fn split_outside_quotes<'a>(input: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut start = 0;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if (c == '\'' || c == '"') && opens_token(prev) => quote = Some(c),
            None if input[i..].starts_with(sep) => {
                parts.push(&input[start..i]);
                start = i + sep.len();
                // skip the rest of the separator
                for _ in 1..sep.chars().count() {
                    chars.next();
                }
                prev = sep.chars().last();
                continue;
            }
            None => {}
        }
        prev = Some(c);
    }
    if quote.is_some() {
        return input.split(sep).collect();
    }
    parts.push(&input[start..]);
    parts
}

fn opens_token(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '=' | '<' | '>' | '!' | '(' | ',' | '|' | '&'),
    }
}

/// Contents of a single- or double-quoted literal.
fn quoted(text: &str) -> Option<&str> {
    let mut chars = text.chars();
    let first = chars.next()?;
    if (first == '\'' || first == '"') && text.len() >= 2 && text.ends_with(first) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Strip matching quotes if present.
fn unquote(text: &str) -> &str {
    quoted(text).unwrap_or(text)
}

// =============================================================================
// Predicate
// =============================================================================

/// An expression together with its source text, as stored in a mapping.
///
/// Serializes back to the original text.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    /// Parse a predicate; blank text yields `None`.
    pub fn parse(source: &str) -> Option<Self> {
        if source.trim().is_empty() {
            return None;
        }
        Some(Self { source: source.to_string(), expr: parse(source) })
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.expr.evaluate(row)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Report the first malformed clause.
    pub fn check(&self) -> Result<(), ExpressionError> {
        match self.expr.first_malformed() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Ok(Self { expr: parse(&source), source })
    }
}
