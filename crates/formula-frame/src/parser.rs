//! Formula text to operation tree.
//!
//! The grammar is scanned rather than tokenized up front: each substring is searched
//! right-to-left for its loosest top-level binary operator, split there, and both halves are
//! parsed recursively. Precedence, loosest to tightest:
//!
//! ```text
//! + -   <   * /   <   ^   <   ||   <   &&   <   == != >= > <= <   <   ! (prefix)
//! ```
//!
//! Picking the rightmost operator of a level makes equal-precedence chains evaluate left to
//! right. `+`, `-` and `!` directly after another operator (or at the start) are prefix
//! operators: `-x` becomes `negate(x)` and `!x` becomes `not(x)`.
use std::fmt;

use crate::{FrameError, FrameResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A single-quoted literal with the quotes removed.
    ///
    /// Text matching a configured date format is read as a date; it falls back to a string
    /// when no signature of the enclosing operation accepts the date.
    Text(String),
    /// A bare token. Resolved during evaluation as a column reference or a numeric constant.
    Leaf(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `name := expr`, only meaningful as a `by()` argument.
    Assign {
        name: String,
        expr: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,
    Or,
    And,
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl BinaryOp {
    /// Name of the registered operation the operator dispatches to.
    pub fn op_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
            BinaryOp::Pow => "pow",
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Ge => "ge",
            BinaryOp::Gt => "gt",
            BinaryOp::Le => "le",
            BinaryOp::Lt => "lt",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Lt => "<",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Leaf(s) => f.write_str(s),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Assign { name, expr } => write!(f, "{name} := {expr}"),
        }
    }
}

/// A parsed formula with its optional `name :=` binding.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    pub target: Option<String>,
    pub expr: Expr,
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(name) => write!(f, "{name} := {}", self.expr),
            None => write!(f, "{}", self.expr),
        }
    }
}

// Operator symbols in lexing order: two-character symbols first so `>=` is never read as `>`.
const OPERATORS: &[(&str, Option<BinaryOp>)] = &[
    ("==", Some(BinaryOp::Eq)),
    ("!=", Some(BinaryOp::Ne)),
    (">=", Some(BinaryOp::Ge)),
    ("<=", Some(BinaryOp::Le)),
    ("&&", Some(BinaryOp::And)),
    ("||", Some(BinaryOp::Or)),
    (">", Some(BinaryOp::Gt)),
    ("<", Some(BinaryOp::Lt)),
    ("+", Some(BinaryOp::Add)),
    ("-", Some(BinaryOp::Subtract)),
    ("*", Some(BinaryOp::Multiply)),
    ("/", Some(BinaryOp::Divide)),
    ("^", Some(BinaryOp::Pow)),
    ("!", None),
];

fn level(op: BinaryOp) -> usize {
    match op {
        BinaryOp::Add | BinaryOp::Subtract => 0,
        BinaryOp::Multiply | BinaryOp::Divide => 1,
        BinaryOp::Pow => 2,
        BinaryOp::Or => 3,
        BinaryOp::And => 4,
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Ge
        | BinaryOp::Gt
        | BinaryOp::Le
        | BinaryOp::Lt => 5,
    }
}

const BINARY_LEVELS: usize = 6;

#[derive(Clone, Copy, Debug)]
struct OpToken {
    pos: usize,
    symbol: &'static str,
    op: Option<BinaryOp>,
    prefix: bool,
}

/// Recursive formula parser over a set of recognised function names.
pub struct Parser<'a> {
    is_function: &'a dyn Fn(&str) -> bool,
}

impl<'a> Parser<'a> {
    pub fn new(is_function: &'a dyn Fn(&str) -> bool) -> Self {
        Self { is_function }
    }

    pub fn parse_formula(&self, input: &str) -> FrameResult<Formula> {
        check_balanced(input)?;
        match split_assignment(input)? {
            Some((name, body)) => Ok(Formula {
                target: Some(name),
                expr: self.parse_expr(body)?,
            }),
            None => Ok(Formula {
                target: None,
                expr: self.parse_expr(input)?,
            }),
        }
    }

    pub fn parse_expr(&self, input: &str) -> FrameResult<Expr> {
        check_balanced(input)?;
        let text = strip_outer_parens(input.trim());
        if text.is_empty() {
            return Err(FrameError::Parse(format!("empty expression in {input:?}")));
        }

        let tokens = top_level_operators(text);
        for lvl in 0..BINARY_LEVELS {
            let split = tokens
                .iter()
                .rev()
                .find(|t| !t.prefix && t.op.is_some_and(|op| level(op) == lvl));
            let Some(token) = split else {
                continue;
            };
            let Some(op) = token.op else {
                continue;
            };
            let left = &text[..token.pos];
            let right = &text[token.pos + token.symbol.len()..];
            if left.trim().is_empty() {
                return Err(FrameError::Parse(format!(
                    "invalid leading operator {:?} in {text:?}",
                    token.symbol
                )));
            }
            if right.trim().is_empty() {
                return Err(FrameError::Parse(format!(
                    "missing right operand of {:?} in {text:?}",
                    token.symbol
                )));
            }
            return Ok(Expr::Binary {
                op,
                left: Box::new(self.parse_expr(left)?),
                right: Box::new(self.parse_expr(right)?),
            });
        }

        if let Some(first) = tokens.first() {
            if first.pos == 0 && first.prefix {
                let rest = &text[first.symbol.len()..];
                return match first.symbol {
                    "+" => self.parse_expr(rest),
                    "-" => Ok(Expr::Call {
                        name: "negate".to_string(),
                        args: vec![self.parse_expr(rest)?],
                    }),
                    _ => Ok(Expr::Call {
                        name: "not".to_string(),
                        args: vec![self.parse_expr(rest)?],
                    }),
                };
            }
            return Err(FrameError::Parse(format!(
                "unexpected operator {:?} in {text:?}",
                first.symbol
            )));
        }

        if let Some(call) = self.parse_call(text)? {
            return Ok(call);
        }
        parse_leaf(text)
    }

    fn parse_call(&self, text: &str) -> FrameResult<Option<Expr>> {
        let name_len = identifier_len(text);
        if name_len == 0 {
            return Ok(None);
        }
        let name = &text[..name_len];
        let after = text[name_len..].trim_start();
        if !after.starts_with('(') {
            return Ok(None);
        }
        let open = text.len() - after.len();
        if matching_paren(text, open) != Some(text.len() - 1) {
            return Ok(None);
        }
        if !(self.is_function)(name) {
            return Err(FrameError::UnknownOperation(name.to_string()));
        }

        let interior = &text[open + 1..text.len() - 1];
        let mut args = Vec::new();
        if !interior.trim().is_empty() {
            for arg in split_top_level(interior, ',') {
                if arg.trim().is_empty() {
                    return Err(FrameError::Parse(format!("empty argument in {text:?}")));
                }
                args.push(self.parse_argument(arg)?);
            }
        }
        Ok(Some(Expr::Call {
            name: name.to_string(),
            args,
        }))
    }

    fn parse_argument(&self, arg: &str) -> FrameResult<Expr> {
        match split_assignment(arg)? {
            Some((name, body)) => Ok(Expr::Assign {
                name,
                expr: Box::new(self.parse_expr(body)?),
            }),
            None => self.parse_expr(arg),
        }
    }
}

/// Parse `input` against the built-in operation registry.
pub fn parse(input: &str) -> FrameResult<Formula> {
    Parser::new(&crate::ops::is_function_name).parse_formula(input)
}

fn parse_leaf(text: &str) -> FrameResult<Expr> {
    if let Some(rest) = text.strip_prefix('\'') {
        let Some(body) = rest.strip_suffix('\'') else {
            return Err(FrameError::Parse(format!("malformed string literal {text:?}")));
        };
        // Inside the literal a quote may only appear doubled.
        if body.replace("''", "").contains('\'') {
            return Err(FrameError::Parse(format!("malformed string literal {text:?}")));
        }
        return Ok(Expr::Text(body.replace("''", "'")));
    }
    if text.contains(|c: char| c == '\'' || c == '(' || c == ',' || c.is_whitespace()) {
        return Err(FrameError::Parse(format!("cannot parse {text:?}")));
    }
    Ok(Expr::Leaf(text.to_string()))
}

fn check_balanced(text: &str) -> FrameResult<()> {
    let mut depth = 0_i64;
    let mut quoted = false;
    for ch in text.chars() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth -= 1;
                if depth < 0 {
                    return Err(FrameError::Parse(format!(
                        "unbalanced parentheses in {text:?}"
                    )));
                }
            }
            _ => {}
        }
    }
    if quoted {
        return Err(FrameError::Parse(format!("unterminated string in {text:?}")));
    }
    if depth != 0 {
        return Err(FrameError::Parse(format!(
            "unbalanced parentheses in {text:?}"
        )));
    }
    Ok(())
}

/// Drop redundant enclosing parentheses: `((a+b))` becomes `a+b`, `(a+b)*3` is unchanged.
fn strip_outer_parens(mut text: &str) -> &str {
    while text.starts_with('(') && matching_paren(text, 0) == Some(text.len() - 1) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

/// Byte index of the parenthesis closing the one at `open`, skipping quoted text.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0_usize;
    let mut quoted = false;
    for (idx, ch) in text.char_indices().skip_while(|(idx, _)| *idx < open) {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` where it appears outside parentheses and quotes.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i64;
    let mut quoted = false;
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            c if c == sep && !quoted && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Split `name := body` at a top-level `:=`.
fn split_assignment(text: &str) -> FrameResult<Option<(String, &str)>> {
    let mut depth = 0_i64;
    let mut quoted = false;
    let bytes = text.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth -= 1,
            b':' if !quoted && depth == 0 && bytes.get(idx + 1) == Some(&b'=') => {
                let name = text[..idx].trim();
                if name.is_empty() || identifier_len(name) != name.len() {
                    return Err(FrameError::Parse(format!(
                        "invalid assignment target {name:?}"
                    )));
                }
                return Ok(Some((name.to_string(), &text[idx + 2..])));
            }
            _ => {}
        }
    }
    Ok(None)
}

fn identifier_len(text: &str) -> usize {
    let mut len = 0;
    for (idx, ch) in text.char_indices() {
        let ok = if idx == 0 {
            ch.is_alphabetic() || ch == '_'
        } else {
            ch.is_alphanumeric() || ch == '_' || ch == '.'
        };
        if !ok {
            break;
        }
        len = idx + ch.len_utf8();
    }
    len
}

/// Every operator outside parentheses and quotes, in source order, longest symbol first.
fn top_level_operators(text: &str) -> Vec<OpToken> {
    let bytes = text.as_bytes();
    let mut tokens: Vec<OpToken> = Vec::new();
    let mut depth = 0_i64;
    let mut quoted = false;
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            b'\'' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted => depth -= 1,
            _ if quoted || depth != 0 => {}
            _ => {
                let matched = OPERATORS
                    .iter()
                    .find(|(sym, _)| bytes[idx..].starts_with(sym.as_bytes()));
                if let Some(&(symbol, op)) = matched {
                    if !(matches!(symbol, "+" | "-") && is_exponent_sign(bytes, idx)) {
                        let prefix = matches!(symbol, "+" | "-" | "!")
                            && follows_operator(bytes, idx, tokens.last());
                        tokens.push(OpToken {
                            pos: idx,
                            symbol,
                            op: if symbol == "!" { None } else { op },
                            prefix,
                        });
                    }
                    idx += symbol.len();
                    continue;
                }
            }
        }
        idx += 1;
    }
    tokens
}

/// Whether only whitespace separates `idx` from the start or from the previous operator.
fn follows_operator(bytes: &[u8], idx: usize, previous: Option<&OpToken>) -> bool {
    let before = bytes[..idx].iter().rposition(|b| !b.is_ascii_whitespace());
    match (before, previous) {
        (None, _) => true,
        (Some(last), Some(prev)) => last + 1 == prev.pos + prev.symbol.len(),
        (Some(_), None) => false,
    }
}

/// `1e-3`: the sign belongs to a number's exponent, not to an operator.
fn is_exponent_sign(bytes: &[u8], idx: usize) -> bool {
    if idx < 2 || !matches!(bytes[idx - 1], b'e' | b'E') {
        return false;
    }
    let mantissa_end = idx - 1;
    let mantissa_start = bytes[..mantissa_end]
        .iter()
        .rposition(|b| !(b.is_ascii_digit() || *b == b'.'))
        .map_or(0, |p| p + 1);
    if mantissa_start == mantissa_end
        || !bytes[mantissa_start..mantissa_end].iter().any(u8::is_ascii_digit)
    {
        return false;
    }
    mantissa_start == 0 || !(bytes[mantissa_start - 1].is_ascii_alphanumeric() || bytes[mantissa_start - 1] == b'_')
}
