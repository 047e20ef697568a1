//! Branch conditions
//!
//! A condition is parsed once, at load time, into a typed [`Condition`].
//! Evaluation lives in the engine; this module only owns the grammar:
//!
//! ```text
//! condition := operand [ op operand ]
//! op        := "==" | "!=" | "<=" | ">=" | "<" | ">"
//! operand   := "{" path "}"            context reference
//!            | '"' json-string '"'     string literal (template if it has placeholders)
//!            | "'" text "'"            string literal (template if it has placeholders)
//!            | number | true | false | null
//!            | json-array | json-object
//!            | word                    context reference if bound, else the word itself
//! ```
//!
//! `Display` renders the canonical form; parsing it yields an equal value.

use crate::template::{has_placeholder, is_path, single_placeholder};
use serde_json::Value;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Operator symbol
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Parse a symbol (also accepts `=` as `==` and `<>` as `!=`)
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "==" | "=" => Some(CompareOp::Eq),
            "!=" | "<>" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Fixed JSON value (strings never contain placeholders)
    Literal(Value),
    /// Context variable path (`{a.b}`)
    Reference(String),
    /// String with embedded placeholders, substituted before comparison
    Template(String),
    /// Bare word: context value if bound, otherwise the word as a string
    Word(String),
}

impl Operand {
    /// Classify a string taken from a structured (mapping-form) condition
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        if let Some(path) = single_placeholder(text) {
            Operand::Reference(path.to_string())
        } else if has_placeholder(text) {
            Operand::Template(text.to_string())
        } else {
            Operand::Literal(Value::String(text.to_string()))
        }
    }

    /// Classify a JSON value taken from a structured condition
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::from_text(s),
            other => Operand::Literal(other.clone()),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reference(path) => write!(f, "{{{path}}}"),
            Operand::Word(word) => f.write_str(word),
            Operand::Template(text) => write!(f, "{}", Value::String(text.clone())),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// Parsed branch condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Binary comparison
    Compare {
        /// Left operand
        left: Operand,
        /// Operator
        op: CompareOp,
        /// Right operand
        right: Operand,
    },
    /// Single operand tested for truthiness
    Truthy(Operand),
}

impl Condition {
    /// Parse the textual form
    ///
    /// # Errors
    /// Returns a human-readable reason when the text is not a condition.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty condition".to_string());
        }

        match find_operator(text)? {
            Some((at, op, len)) => {
                let left = text[..at].trim();
                let right = text[at + len..].trim();
                if left.is_empty() {
                    return Err(format!("missing left operand before '{op}'"));
                }
                if right.is_empty() {
                    return Err(format!("missing right operand after '{op}'"));
                }
                Ok(Condition::Compare {
                    left: parse_operand(left)?,
                    op,
                    right: parse_operand(right)?,
                })
            }
            None => Ok(Condition::Truthy(parse_operand(text)?)),
        }
    }

    /// Build from a document value: string, mapping `{left, op, right}` or scalar
    ///
    /// # Errors
    /// Returns a human-readable reason when the value is not a condition.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(text) => Self::parse(text),
            Value::Object(map) => {
                let op = match map.get("op") {
                    Some(Value::String(s)) => CompareOp::from_symbol(s)
                        .ok_or_else(|| format!("unknown operator '{s}'"))?,
                    Some(_) => return Err("'op' must be a string".to_string()),
                    None => {
                        return match map.get("value") {
                            Some(v) => Ok(Condition::Truthy(Operand::from_value(v))),
                            None => Err("structured condition needs 'op' or 'value'".to_string()),
                        }
                    }
                };
                let left = map
                    .get("left")
                    .ok_or_else(|| "structured condition needs 'left'".to_string())?;
                let right = map
                    .get("right")
                    .ok_or_else(|| "structured condition needs 'right'".to_string())?;
                Ok(Condition::Compare {
                    left: Operand::from_value(left),
                    op,
                    right: Operand::from_value(right),
                })
            }
            Value::Null => Err("condition is null".to_string()),
            scalar => Ok(Condition::Truthy(Operand::Literal(scalar.clone()))),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Condition::Truthy(operand) => write!(f, "{operand}"),
        }
    }
}

/// Locate the first top-level operator, skipping quotes and brackets
fn find_operator(text: &str) -> Result<Option<(usize, CompareOp, usize)>, String> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q == b'"' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b'=' | b'!' | b'<' | b'>' if depth == 0 => {
                let next = bytes.get(i + 1).copied();
                let found = match (b, next) {
                    (b'=', Some(b'=')) => Some((CompareOp::Eq, 2)),
                    (b'!', Some(b'=')) => Some((CompareOp::Ne, 2)),
                    (b'<', Some(b'=')) => Some((CompareOp::Le, 2)),
                    (b'>', Some(b'=')) => Some((CompareOp::Ge, 2)),
                    (b'<', Some(b'>')) => Some((CompareOp::Ne, 2)),
                    (b'<', _) => Some((CompareOp::Lt, 1)),
                    (b'>', _) => Some((CompareOp::Gt, 1)),
                    (b'=', _) => return Err("use '==' for equality".to_string()),
                    _ => None,
                };
                if let Some((op, len)) = found {
                    return Ok(Some((i, op, len)));
                }
            }
            _ => {}
        }
        i += 1;
    }

    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    Ok(None)
}

fn parse_operand(token: &str) -> Result<Operand, String> {
    let first = token.chars().next().unwrap_or(' ');

    match first {
        '"' => {
            let text: String = serde_json::from_str(token)
                .map_err(|e| format!("invalid string literal {token}: {e}"))?;
            Ok(string_operand(text))
        }
        '\'' => {
            let inner = token
                .strip_prefix('\'')
                .and_then(|t| t.strip_suffix('\''))
                .filter(|t| !t.contains('\''))
                .ok_or_else(|| format!("invalid string literal {token}"))?;
            Ok(string_operand(inner.to_string()))
        }
        '{' => {
            if let Some(path) = single_placeholder(token) {
                return Ok(Operand::Reference(path.to_string()));
            }
            let rest = token[1..].trim_start();
            if rest.starts_with('"') || rest.starts_with('}') {
                let value: Value = serde_json::from_str(token)
                    .map_err(|e| format!("invalid object literal {token}: {e}"))?;
                return Ok(Operand::Literal(value));
            }
            Err(format!("invalid variable reference {token}"))
        }
        '[' => serde_json::from_str(token)
            .map(Operand::Literal)
            .map_err(|e| format!("invalid array literal {token}: {e}")),
        c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => {
            let normalized = token.strip_prefix('+').unwrap_or(token);
            match serde_json::from_str::<Value>(normalized) {
                Ok(v @ Value::Number(_)) => Ok(Operand::Literal(v)),
                _ => Err(format!("invalid number {token}")),
            }
        }
        _ => match token {
            "true" => Ok(Operand::Literal(Value::Bool(true))),
            "false" => Ok(Operand::Literal(Value::Bool(false))),
            "null" => Ok(Operand::Literal(Value::Null)),
            word if is_path(word) => Ok(Operand::Word(word.to_string())),
            other => Err(format!("invalid operand '{other}'")),
        },
    }
}

fn string_operand(text: String) -> Operand {
    if has_placeholder(&text) {
        Operand::Template(text)
    } else {
        Operand::Literal(Value::String(text))
    }
}
