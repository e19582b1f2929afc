//! Path expression grammar
//!
//! A small recursive descent parser over [`Token`]s. Precedence, loosest
//! first: sequence `,`, conditional `?:`, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, then member access and calls.

use serde_json::{Map, Number, Value};

use crate::error::{ParseError, Result};
use crate::expression::{Expr, Path, PathRoot, Segment};
use crate::expression_tokenizer::{Token, TokenType};

/// Parses the body of an expression
pub fn parse_path(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.sequence()?;
    match parser.current {
        Some(token) => Err(ParseError::syntax(
            &format!("unexpected token {}", token.value),
            source,
        )),
        None => Ok(expr),
    }
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "==" | "!=" | "===" | "!==" => 3,
        "<" | ">" | "<=" | ">=" => 4,
        "+" | "-" => 5,
        "*" | "/" | "%" => 6,
        _ => return None,
    })
}

fn unescape_string(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn number(value: &str) -> Result<Value> {
    if let Ok(int) = value.parse::<i64>() {
        return Ok(Value::Number(int.into()));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ParseError::syntax("invalid number", value))
}

fn negate(value: &Number) -> Option<Number> {
    match value.as_i64() {
        Some(int) => int.checked_neg().map(Number::from),
        None => value.as_f64().and_then(|float| Number::from_f64(-float)),
    }
}

/// Nested conditionals and unary operands allowed before giving up. Every
/// bracket level costs two.
const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    source: &'a str,
    current: Option<Token<'a>>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Result<Self> {
        Ok(Self {
            source,
            current: Token::first(source)?,
            depth: 0,
        })
    }

    fn error(&self, message: &str) -> ParseError {
        match self.current {
            Some(token) => ParseError::syntax(
                &format!("{}, found {}", message, token.value),
                self.source,
            ),
            None => ParseError::syntax(
                &format!("{}, found end of expression", message),
                self.source,
            ),
        }
    }

    fn advance(&mut self) -> Result<Option<Token<'a>>> {
        let token = self.current.take();
        if let Some(token) = &token {
            self.current = token.next()?;
        }
        Ok(token)
    }

    fn at(&self, punct: &str) -> bool {
        self.current.is_some_and(|token| token.is_punct(punct))
    }

    fn eat(&mut self, punct: &str) -> Result<bool> {
        if self.at(punct) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, punct: &str) -> Result<()> {
        if self.eat(punct)? {
            return Ok(());
        }
        Err(self.error(&format!("expected {}", punct)))
    }

    fn sequence(&mut self) -> Result<Expr> {
        let first = self.conditional()?;
        if !self.at(",") {
            return Ok(first);
        }
        let mut args = vec![first];
        while self.eat(",")? {
            args.push(self.conditional()?);
        }
        Ok(Expr::Sequence(args))
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<Expr>) -> Result<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::syntax("expression nested too deeply", self.source));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self) -> Result<Expr> {
        self.nested(Self::ternary)
    }

    fn ternary(&mut self) -> Result<Expr> {
        let test = self.binary(1)?;
        if !self.eat("?")? {
            return Ok(test);
        }
        let consequent = self.conditional()?;
        self.expect(":")?;
        let alternate = self.conditional()?;
        Ok(Expr::Operator {
            name: "?:".to_string(),
            args: vec![test, consequent, alternate],
        })
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let (op, precedence) = match self.current {
                Some(token) if token.token_type == TokenType::Punct => {
                    match binary_precedence(token.value) {
                        Some(precedence) if precedence >= min_precedence => {
                            (token.value, precedence)
                        }
                        _ => break,
                    }
                }
                _ => break,
            };
            self.advance()?;
            let right = self.binary(precedence + 1)?;
            left = Expr::Operator {
                name: op.to_string(),
                args: vec![left, right],
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        self.nested(Self::prefix)
    }

    fn prefix(&mut self) -> Result<Expr> {
        let op = match self.current {
            Some(token) if token.is_punct("!") || token.is_punct("-") || token.is_punct("+") => {
                token.value
            }
            _ => return self.postfix(),
        };
        self.advance()?;
        let arg = self.unary()?;
        if op == "-" {
            if let Expr::Literal(Value::Number(value)) = &arg {
                if let Some(negated) = negate(value) {
                    return Ok(Expr::Literal(Value::Number(negated)));
                }
            }
        }
        Ok(Expr::Operator {
            name: op.to_string(),
            args: vec![arg],
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let token = match self.advance()? {
            Some(token) => token,
            None => return Err(self.error("expected an expression")),
        };
        let root = match token.token_type {
            TokenType::Number => return Ok(Expr::Literal(number(token.value)?)),
            TokenType::Str => return Ok(Expr::Literal(Value::String(unescape_string(token.value)))),
            TokenType::Punct => {
                return match token.value {
                    "(" => {
                        let inner = self.sequence()?;
                        self.expect(")")?;
                        Ok(inner)
                    }
                    "{" => self.object(),
                    "[" => self.array(),
                    other => Err(ParseError::syntax(
                        &format!("unexpected token {}", other),
                        self.source,
                    )),
                };
            }
            TokenType::Identifier => match token.value {
                "true" => return Ok(Expr::Literal(Value::Bool(true))),
                "false" => return Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => return Ok(Expr::Literal(Value::Null)),
                "this" => Path {
                    root: PathRoot::Relative,
                    segments: Vec::new(),
                },
                name => Path {
                    root: PathRoot::Context,
                    segments: vec![Segment::Name(name.to_string())],
                },
            },
            TokenType::Alias => Path {
                root: PathRoot::Alias(token.value.to_string()),
                segments: Vec::new(),
            },
            TokenType::Attribute => Path {
                root: PathRoot::Attribute(token.value.to_string()),
                segments: Vec::new(),
            },
        };
        self.members(root)
    }

    fn members(&mut self, mut path: Path) -> Result<Expr> {
        loop {
            if self.eat(".")? {
                match self.advance()? {
                    Some(token)
                        if matches!(token.token_type, TokenType::Identifier | TokenType::Number) =>
                    {
                        path.segments.push(Segment::Name(token.value.to_string()));
                    }
                    _ => return Err(ParseError::syntax("expected a name after .", self.source)),
                }
            } else if self.eat("[")? {
                let index = self.sequence()?;
                self.expect("]")?;
                path.segments.push(Segment::Index(index));
            } else if self.eat("(")? {
                let args = self.arguments(")")?;
                return Ok(Expr::Fn { path, args });
            } else {
                return Ok(Expr::Path(path));
            }
        }
    }

    /// Comma separated expressions up to `close`, allowing a trailing comma
    fn arguments(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.eat(close)? {
            args.push(self.conditional()?);
            if !self.eat(",")? {
                self.expect(close)?;
                break;
            }
        }
        Ok(args)
    }

    fn object(&mut self) -> Result<Expr> {
        let mut args = Vec::new();
        while !self.eat("}")? {
            let key = match self.advance()? {
                Some(token) => token,
                None => return Err(self.error("expected an object key")),
            };
            let name = match key.token_type {
                TokenType::Identifier | TokenType::Number => key.value.to_string(),
                TokenType::Str => unescape_string(key.value),
                _ => {
                    return Err(ParseError::syntax(
                        &format!("unexpected object key {}", key.value),
                        self.source,
                    ));
                }
            };
            let value = if self.eat(":")? {
                self.conditional()?
            } else if key.token_type == TokenType::Identifier {
                Expr::Path(Path {
                    root: PathRoot::Context,
                    segments: vec![Segment::Name(name.clone())],
                })
            } else {
                return Err(self.error("expected :"));
            };
            args.push(Expr::Literal(Value::String(name)));
            args.push(value);
            if !self.eat(",")? {
                self.expect("}")?;
                break;
            }
        }

        if args.iter().skip(1).step_by(2).all(Expr::is_literal) {
            let mut object = Map::new();
            let mut pairs = args.into_iter();
            while let (Some(Expr::Literal(Value::String(key))), Some(Expr::Literal(value))) =
                (pairs.next(), pairs.next())
            {
                object.insert(key, value);
            }
            return Ok(Expr::Literal(Value::Object(object)));
        }
        Ok(Expr::Operator {
            name: "{}".to_string(),
            args,
        })
    }

    fn array(&mut self) -> Result<Expr> {
        let items = self.arguments("]")?;
        if items.iter().all(Expr::is_literal) {
            let values = items
                .into_iter()
                .filter_map(|item| match item {
                    Expr::Literal(value) => Some(value),
                    _ => None,
                })
                .collect();
            return Ok(Expr::Literal(Value::Array(values)));
        }
        Ok(Expr::Operator {
            name: "[]".to_string(),
            args: items,
        })
    }
}
