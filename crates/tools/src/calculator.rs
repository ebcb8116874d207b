//! Calculator: evaluates agent-generated arithmetic expressions.
//!
//! The grammar is closed: numeric literals, variables from the supplied
//! namespace, `+`, `-`, `*`, `/`, unary sign, parentheses, list literals and
//! five functions (`abs`, `round`, `min`, `max`, `sum`). Nothing else can be
//! named, so an expression has no way to reach outside its namespace.
//!
//! Parsing completes before evaluation starts: syntax errors are reported
//! without evaluating anything, then the tree is evaluated left to right.

use finqa_core::error::EvalError;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The namespace an expression is evaluated against.
pub type Variables = HashMap<String, f64>;

/// Names callable from an expression.
pub const SAFE_FUNCTIONS: [&str; 5] = ["abs", "round", "min", "max", "sum"];

/// Evaluate an expression against `variables`.
///
/// Division by zero anywhere in the expression yields `0.0` for the whole
/// expression rather than an error.
pub fn evaluate(expression: &str, variables: &Variables) -> Result<f64, EvalError> {
    let invalid = |message: String| EvalError::InvalidExpression {
        expression: expression.to_string(),
        message,
    };
    let calculation = |message: String| EvalError::Calculation {
        expression: expression.to_string(),
        message,
    };

    let tokens = tokenize(expression).map_err(invalid)?;
    let mut parser = Parser::new(&tokens);
    let tree = parser.parse_expr().map_err(invalid)?;
    if let Some(tok) = parser.peek() {
        return Err(invalid(format!(
            "unexpected token at position {}: {:?}",
            parser.pos, tok
        )));
    }

    let evaluator = Evaluator { variables };
    match evaluator.eval(&tree) {
        Ok(Value::Number(n)) => Ok(n),
        Ok(Value::List(_)) => Err(calculation(
            "expression evaluated to a list, not a number".into(),
        )),
        Err(Fault::DivisionByZero) => {
            warn!(expression, "Division by zero in expression, using 0");
            Ok(0.0)
        }
        Err(Fault::UnknownName(name)) => {
            debug!(expression, name = %name, "Expression references a name outside the sandbox");
            Err(invalid(format!("name '{name}' is not defined")))
        }
        Err(Fault::Type(message)) => Err(calculation(message)),
    }
}

// ── Tokenizer ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            '[' => { tokens.push(Token::LBracket); i += 1; }
            ']' => { tokens.push(Token::RBracket); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent only when digits follow, so `2e` stays a syntax error.
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => return Err(format!("unexpected character: '{c}'")),
        }
    }

    if tokens.is_empty() {
        return Err("empty expression".into());
    }
    Ok(tokens)
}

// ── Parser ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Name(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    List(Vec<Expr>),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.consume() {
            Some(tok) if *tok == expected => Ok(()),
            Some(tok) => Err(format!("expected {expected:?}, found {tok:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // unary = ('-' | '+') unary | primary
    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    // primary = NUMBER | NAME | NAME '(' args ')' | '(' expr (',' expr)* ')' | '[' args ']'
    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.consume().cloned() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.consume();
                    let args = self.parse_args(Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Some(Token::LParen) => {
                let first = self.parse_expr()?;
                if self.peek() == Some(&Token::Comma) {
                    // Parenthesized tuple, treated as a list.
                    self.consume();
                    let mut items = vec![first];
                    items.extend(self.parse_args(Token::RParen)?);
                    return Ok(Expr::List(items));
                }
                self.expect(Token::RParen)?;
                Ok(first)
            }
            Some(Token::LBracket) => Ok(Expr::List(self.parse_args(Token::RBracket)?)),
            Some(tok) => Err(format!("unexpected token: {tok:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }

    // args = (expr (',' expr)* ','?)? closing
    fn parse_args(&mut self, closing: Token) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        loop {
            if self.peek() == Some(&closing) {
                self.consume();
                return Ok(args);
            }
            args.push(self.parse_expr()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.consume();
                }
                Some(tok) if *tok == closing => {}
                Some(tok) => return Err(format!("expected ',' or {closing:?}, found {tok:?}")),
                None => return Err(format!("expected {closing:?}, found end of expression")),
            }
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    List(Vec<f64>),
}

#[derive(Debug)]
enum Fault {
    DivisionByZero,
    UnknownName(String),
    Type(String),
}

struct Evaluator<'a> {
    variables: &'a Variables,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, Fault> {
        match expr {
            Expr::Number(n) if n.is_finite() => Ok(Value::Number(*n)),
            Expr::Number(_) => Err(Fault::Type("numeric literal out of range".into())),
            Expr::Name(name) => match self.variables.get(name) {
                Some(v) => Ok(Value::Number(*v)),
                None if SAFE_FUNCTIONS.contains(&name.as_str()) => Err(Fault::Type(format!(
                    "function '{name}' used as a value"
                ))),
                None => Err(Fault::UnknownName(name.clone())),
            },
            Expr::Neg(inner) => Ok(Value::Number(-self.number(inner)?)),
            Expr::Binary(op, lhs, rhs) => {
                let l = self.number(lhs)?;
                let r = self.number(rhs)?;
                let v = match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => {
                        if r == 0.0 {
                            return Err(Fault::DivisionByZero);
                        }
                        l / r
                    }
                };
                Ok(Value::Number(v))
            }
            Expr::List(items) => items
                .iter()
                .map(|item| self.number(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Call(name, args) => self.call(name, args),
        }
    }

    fn number(&self, expr: &Expr) -> Result<f64, Fault> {
        match self.eval(expr)? {
            Value::Number(n) => Ok(n),
            Value::List(_) => Err(Fault::Type(
                "unsupported operand type: list where a number is required".into(),
            )),
        }
    }

    fn call(&self, name: &str, args: &[Expr]) -> Result<Value, Fault> {
        if self.variables.contains_key(name) {
            return Err(Fault::Type(format!("'{name}' is a number and is not callable")));
        }
        if !SAFE_FUNCTIONS.contains(&name) {
            return Err(Fault::UnknownName(name.to_string()));
        }

        let values = args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;

        let result = match (name, values.as_slice()) {
            ("abs", [Value::Number(x)]) => x.abs(),
            ("round", [Value::Number(x)]) => x.round_ties_even(),
            ("round", [Value::Number(x), Value::Number(digits)]) => round_to(*x, *digits)?,
            ("min" | "max", [Value::List(items)]) => extremum(name, items)?,
            ("min" | "max", [Value::Number(_), Value::Number(_), ..]) => {
                let items = values
                    .iter()
                    .map(|v| match v {
                        Value::Number(n) => Ok(*n),
                        Value::List(_) => Err(Fault::Type(format!(
                            "{name}() arguments must all be numbers"
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                extremum(name, &items)?
            }
            ("sum", [Value::List(items)]) => items.iter().sum(),
            ("sum", [Value::List(items), Value::Number(start)]) => {
                start + items.iter().sum::<f64>()
            }
            _ => {
                return Err(Fault::Type(format!(
                    "{name}() does not accept {} argument(s) of these types",
                    values.len()
                )));
            }
        };
        Ok(Value::Number(result))
    }
}

fn round_to(x: f64, digits: f64) -> Result<f64, Fault> {
    if digits.fract() != 0.0 {
        return Err(Fault::Type("round() digits must be an integer".into()));
    }
    if digits == 0.0 {
        return Ok(x.round_ties_even());
    }
    let factor = 10f64.powi(digits.clamp(-400.0, 400.0) as i32);
    if factor == 0.0 {
        return Ok(0.0 * x.signum());
    }
    let scaled = x * factor;
    if !scaled.is_finite() {
        return Ok(x);
    }
    Ok(scaled.round_ties_even() / factor)
}

fn extremum(name: &str, items: &[f64]) -> Result<f64, Fault> {
    let mut iter = items.iter().copied();
    let first = iter
        .next()
        .ok_or_else(|| Fault::Type(format!("{name}() arg is an empty sequence")))?;
    Ok(iter.fold(first, |acc, v| {
        if name == "min" { acc.min(v) } else { acc.max(v) }
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────
