//! Restricted arithmetic for position formulas.
//!
//! Formulas are user-authored strings like `canvas_width - MARGIN` or
//! `(canvas_height // 2) - overlay_height`. They are compiled by a small
//! recursive-descent parser into an AST and interpreted directly; nothing
//! else can be expressed.
//!
//! ## Grammar
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '//' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := INTEGER | IDENT | '(' expr ')'
//! ```
//!
//! `//` is floor division (rounds toward negative infinity). `/` is only
//! accepted when it divides exactly. All arithmetic is checked; the result
//! must fit in an `i64`.
//!
//! ## Variables
//!
//! | Name | Meaning |
//! |---|---|
//! | `canvas_width`, `canvas_height` | Canvas size in pixels |
//! | `overlay_width`, `overlay_height` | Overlay size (aliases: `infografika_width`, `infografika_height`) |
//! | `MARGIN` | Configured margin |

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected {found} at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("operator '{op}' at position {pos} is not supported (allowed: + - * // / and parentheses)")]
    UnsupportedOperator { op: String, pos: usize },
    #[error("function calls are not supported: '{0}(...)'")]
    FunctionCall(String),
    #[error("unknown variable '{0}'")]
    UnknownIdentifier(String),
    #[error("integer literal '{0}' is too large")]
    LiteralTooLarge(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("{numerator} / {denominator} is not an integer (use // for floor division)")]
    NotInteger { numerator: i128, denominator: i128 },
    #[error("arithmetic overflow")]
    Overflow,
    #[error("formula is nested too deeply (limit {0})")]
    TooDeep(usize),
}

/// The fixed variable set a formula is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    pub canvas_width: i64,
    pub canvas_height: i64,
    pub overlay_width: i64,
    pub overlay_height: i64,
    pub margin: i64,
}

impl EvalContext {
    fn get(&self, var: Variable) -> i64 {
        match var {
            Variable::CanvasWidth => self.canvas_width,
            Variable::CanvasHeight => self.canvas_height,
            Variable::OverlayWidth => self.overlay_width,
            Variable::OverlayHeight => self.overlay_height,
            Variable::Margin => self.margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    CanvasWidth,
    CanvasHeight,
    OverlayWidth,
    OverlayHeight,
    Margin,
}

impl Variable {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "canvas_width" => Some(Self::CanvasWidth),
            "canvas_height" => Some(Self::CanvasHeight),
            "overlay_width" | "infografika_width" => Some(Self::OverlayWidth),
            "overlay_height" | "infografika_height" => Some(Self::OverlayHeight),
            "MARGIN" => Some(Self::Margin),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::CanvasWidth => "canvas_width",
            Self::CanvasHeight => "canvas_height",
            Self::OverlayWidth => "overlay_width",
            Self::OverlayHeight => "overlay_height",
            Self::Margin => "MARGIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    ExactDiv,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::FloorDiv => "//",
            Self::ExactDiv => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(i128),
    Var(Variable),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(n) => write!(f, "{n}"),
            Expr::Var(v) => f.write_str(v.name()),
            Expr::Neg(inner) => write!(f, "-({inner})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Int(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Int(s) => format!("number '{s}'"),
            Token::Ident(s) => format!("name '{s}'"),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::SlashSlash => "'//'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, n)| n);
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '_') {
                    i += 1;
                }
                let text: String = chars[start..i]
                    .iter()
                    .map(|&(_, ch)| ch)
                    .filter(|&ch| ch != '_')
                    .collect();
                tokens.push((Token::Int(text), pos));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|&(_, ch)| ch).collect();
                tokens.push((Token::Ident(text), pos));
            }
            '+' => {
                tokens.push((Token::Plus, pos));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, pos));
                i += 1;
            }
            '*' if next == Some('*') => {
                return Err(FormulaError::UnsupportedOperator {
                    op: "**".into(),
                    pos,
                });
            }
            '*' => {
                tokens.push((Token::Star, pos));
                i += 1;
            }
            '/' if next == Some('/') => {
                tokens.push((Token::SlashSlash, pos));
                i += 2;
            }
            '/' => {
                tokens.push((Token::Slash, pos));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, pos));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                i += 1;
            }
            '%' | '^' | '&' | '|' | '<' | '>' | '=' | '!' | '~' | '@' => {
                return Err(FormulaError::UnsupportedOperator {
                    op: c.to_string(),
                    pos,
                });
            }
            other => return Err(FormulaError::UnexpectedChar { ch: other, pos }),
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

/// Deepest expression tree the parser will build. Nesting, operator chains
/// and unary signs all count, so evaluation and formatting stay shallow.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let base = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = base;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::SlashSlash) => BinaryOp::FloorDiv,
                Some(Token::Slash) => BinaryOp::ExactDiv,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let base = self.depth;
        let expr = match self.peek() {
            Some(Token::Minus) => {
                self.cursor += 1;
                self.descend()?;
                Expr::Neg(Box::new(self.unary()?))
            }
            Some(Token::Plus) => {
                self.cursor += 1;
                self.descend()?;
                self.unary()?
            }
            _ => self.primary()?,
        };
        self.depth = base;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let (token, pos) = self.advance().ok_or(FormulaError::UnexpectedEnd)?;
        match token {
            Token::Int(text) => text
                .parse::<i128>()
                .map(Expr::Literal)
                .map_err(|_| FormulaError::LiteralTooLarge(text)),
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    return Err(FormulaError::FunctionCall(name));
                }
                Variable::lookup(&name)
                    .map(Expr::Var)
                    .ok_or(FormulaError::UnknownIdentifier(name))
            }
            Token::LParen => {
                let base = self.depth;
                self.descend()?;
                let inner = self.expr()?;
                self.depth = base;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((other, pos)) => Err(FormulaError::UnexpectedToken {
                        found: other.describe(),
                        pos,
                    }),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            other => Err(FormulaError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

fn floor_div(a: i128, b: i128) -> Result<i128, FormulaError> {
    if b == 0 {
        return Err(FormulaError::DivisionByZero);
    }
    let q = a.checked_div(b).ok_or(FormulaError::Overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1).ok_or(FormulaError::Overflow)
    } else {
        Ok(q)
    }
}

fn exact_div(a: i128, b: i128) -> Result<i128, FormulaError> {
    if b == 0 {
        return Err(FormulaError::DivisionByZero);
    }
    if a.checked_rem(b).ok_or(FormulaError::Overflow)? != 0 {
        return Err(FormulaError::NotInteger {
            numerator: a,
            denominator: b,
        });
    }
    a.checked_div(b).ok_or(FormulaError::Overflow)
}

impl Expr {
    fn eval(&self, ctx: &EvalContext) -> Result<i128, FormulaError> {
        match self {
            Expr::Literal(n) => Ok(*n),
            Expr::Var(v) => Ok(ctx.get(*v) as i128),
            Expr::Neg(inner) => inner.eval(ctx)?.checked_neg().ok_or(FormulaError::Overflow),
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(ctx)?;
                let b = rhs.eval(ctx)?;
                match op {
                    BinaryOp::Add => a.checked_add(b).ok_or(FormulaError::Overflow),
                    BinaryOp::Sub => a.checked_sub(b).ok_or(FormulaError::Overflow),
                    BinaryOp::Mul => a.checked_mul(b).ok_or(FormulaError::Overflow),
                    BinaryOp::FloorDiv => floor_div(a, b),
                    BinaryOp::ExactDiv => exact_div(a, b),
                }
            }
        }
    }
}

/// A compiled position formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser::new(tokens);
        let expr = parser.expr()?;
        if let Some((token, pos)) = parser.advance() {
            return Err(FormulaError::UnexpectedToken {
                found: token.describe(),
                pos,
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn evaluate(&self, ctx: &EvalContext) -> Result<i64, FormulaError> {
        let value = self.expr.eval(ctx)?;
        i64::try_from(value).map_err(|_| FormulaError::Overflow)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// Parse and evaluate `source` in one step.
pub fn evaluate(source: &str, ctx: &EvalContext) -> Result<i64, FormulaError> {
    Formula::parse(source)?.evaluate(ctx)
}
