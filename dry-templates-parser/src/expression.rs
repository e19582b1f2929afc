//! Template expressions
//!
//! The text between a `{{` and its matching `}}` is an expression. Before the
//! path expression grammar sees it, a few keywords are peeled off and recorded
//! in [`ExpressionMeta`]:
//!
//! - block openers: `{{if a}}`, `{{unless a}}`, `{{each items as #item}}`,
//!   `{{with a}}`, `{{else if a}}` and any custom block keyword
//! - bare keywords: `{{else}}`, `{{bound}}`, `{{unbound}}`
//! - block endings: `{{/}}`, `{{/if}}`
//! - value keywords, in any order and number: `{{unescaped bound name}}`,
//!   `{{view "card", {title: title}}}`

use std::fmt::{self, Display, Write};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::block::BlockMap;
use crate::error::Result;
use crate::grammar::parse_path;

/// A compiled expression body
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// No expression, as in `{{else}}` or `{{/}}`
    Empty,
    /// A constant value, including fully literal objects and arrays
    Literal(Value),
    /// A lookup against the data model
    Path(Path),
    /// A function call: `format(price, 2)`
    Fn { path: Path, args: Vec<Expr> },
    /// An operator applied to its arguments. Object and array literals with
    /// dynamic members use `{}` (alternating keys and values) and `[]`.
    Operator { name: String, args: Vec<Expr> },
    /// Comma separated expressions
    Sequence(Vec<Expr>),
}

/// Where a path starts resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRoot {
    /// The current data context: `user.name`
    Context,
    /// The current scope only: `this.name`
    Relative,
    /// An alias bound by a block: `#item.name`
    Alias(String),
    /// An attribute passed to the view: `@title`
    Attribute(String),
}

/// A path through the data model
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub root: PathRoot,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Name(String),
    Index(Expr),
}

/// Block keyword of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockType {
    If,
    Unless,
    Each,
    With,
    Else,
    ElseIf,
    Bound,
    Unbound,
    /// The generic `{{/}}` ending
    End,
    Custom(String),
}

/// Whether the runtime keeps an expression live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindType {
    Bound,
    Unbound,
}

/// What a value expression produces, when it is not a plain value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    View,
}

/// Classification attached to every top level expression
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionMeta {
    /// The trimmed source text
    pub source: String,
    pub block_type: Option<BlockType>,
    /// Set for `{{/...}}`
    pub is_end: bool,
    /// Alias bound by `as`, e.g. `#item`
    pub alias: Option<String>,
    pub unescaped: bool,
    pub bind_type: Option<BindType>,
    pub value_type: Option<ValueType>,
}

/// An expression together with its meta
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub expr: Expr,
    pub meta: ExpressionMeta,
}

impl BlockType {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "if" => Self::If,
            "unless" => Self::Unless,
            "each" => Self::Each,
            "with" => Self::With,
            "else" => Self::Else,
            "else if" => Self::ElseIf,
            "bound" => Self::Bound,
            "unbound" => Self::Unbound,
            "end" => Self::End,
            custom => Self::Custom(custom.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::If => "if",
            Self::Unless => "unless",
            Self::Each => "each",
            Self::With => "with",
            Self::Else => "else",
            Self::ElseIf => "else if",
            Self::Bound => "bound",
            Self::Unbound => "unbound",
            Self::End => "end",
            Self::Custom(custom) => custom,
        }
    }
}

impl ExpressionMeta {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

impl Expression {
    /// Wraps a bare expression, using its printed form as the source
    pub fn new(expr: Expr) -> Self {
        let meta = ExpressionMeta::new(expr.to_string());
        Self { expr, meta }
    }

    /// The value of a literal expression
    pub fn literal_value(&self) -> Option<&Value> {
        match &self.expr {
            Expr::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the expression opens, continues or closes a block
    pub fn is_block(&self) -> bool {
        self.meta.block_type.is_some()
    }
}

impl Expr {
    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Expr], glue: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(glue)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = match &self.root {
            PathRoot::Context => true,
            PathRoot::Relative => {
                f.write_str("this")?;
                false
            }
            PathRoot::Alias(alias) => {
                write!(f, "#{}", alias)?;
                false
            }
            PathRoot::Attribute(name) => {
                write!(f, "@{}", name)?;
                false
            }
        };
        for segment in &self.segments {
            match segment {
                Segment::Name(name) => {
                    if !first {
                        f.write_char('.')?;
                    }
                    f.write_str(name)?;
                }
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
            first = false;
        }
        Ok(())
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Empty => Ok(()),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Path(path) => write!(f, "{}", path),
            Expr::Fn { path, args } => {
                write!(f, "{}(", path)?;
                write_joined(f, args, ", ")?;
                f.write_char(')')
            }
            Expr::Operator { name, args } => match (name.as_str(), args.as_slice()) {
                ("{}", args) => {
                    f.write_char('{')?;
                    for (i, pair) in args.chunks(2).enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        match pair {
                            [Expr::Literal(Value::String(key)), value] => {
                                write!(f, "{}: {}", key, value)?
                            }
                            [key, value] => write!(f, "{}: {}", key, value)?,
                            [key] => write!(f, "{}", key)?,
                            _ => (),
                        }
                    }
                    f.write_char('}')
                }
                ("[]", args) => {
                    f.write_char('[')?;
                    write_joined(f, args, ", ")?;
                    f.write_char(']')
                }
                ("?:", [test, consequent, alternate]) => {
                    write!(f, "{} ? {} : {}", test, consequent, alternate)
                }
                (name, [arg]) => write!(f, "{}{}", name, arg),
                (name, [left, right]) => write!(f, "{} {} {}", left, name, right),
                (name, args) => {
                    write!(f, "{}(", name)?;
                    write_joined(f, args, ", ")?;
                    f.write_char(')')
                }
            },
            Expr::Sequence(args) => write_joined(f, args, ", "),
        }
    }
}

static VALUE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s)(?:(view|unbound|bound|unescaped)\s+)?(.*)").unwrap());

/// Turns delimiter contents into classified expressions
#[derive(Debug, Clone)]
pub(crate) struct ExpressionParser {
    block: Regex,
}

impl ExpressionParser {
    /// Builds the block pattern from the registered block keywords. Longer
    /// keywords are tried first so `else if` is never read as `else`.
    pub(crate) fn new(block_map: &BlockMap) -> Self {
        let mut keywords: Vec<&str> = block_map.keys().copied().collect();
        keywords.push("else if");
        keywords.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        keywords.dedup();
        let alternation = keywords
            .iter()
            .map(|keyword| regex::escape(keyword))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"^(?s)({})\s+(.+?)(?:\s+as\s+(\S+))?$", alternation);
        Self {
            block: Regex::new(&pattern).expect("block keywords are escaped"),
        }
    }

    /// Parses the text found between delimiters
    pub(crate) fn parse(&self, source: &str) -> Result<Expression> {
        let source = source.trim();
        let mut meta = ExpressionMeta::new(source);

        let path = if let Some(captures) = self.block.captures(source) {
            meta.block_type = Some(BlockType::from_keyword(&captures[1]));
            meta.alias = captures.get(3).map(|alias| alias.as_str().to_string());
            captures.get(2).map_or("", |path| path.as_str())
        } else if matches!(source, "else" | "unbound" | "bound") {
            meta.block_type = Some(BlockType::from_keyword(source));
            ""
        } else if let Some(rest) = source.strip_prefix('/') {
            meta.is_end = true;
            let rest = rest.trim();
            meta.block_type = Some(if rest.is_empty() {
                BlockType::End
            } else {
                BlockType::from_keyword(rest)
            });
            ""
        } else {
            let mut path = source;
            while let Some(captures) = VALUE_KEYWORD.captures(path) {
                let Some(keyword) = captures.get(1) else {
                    break;
                };
                match keyword.as_str() {
                    "unescaped" => meta.unescaped = true,
                    "unbound" => meta.bind_type = Some(BindType::Unbound),
                    "bound" => meta.bind_type = Some(BindType::Bound),
                    _ => meta.value_type = Some(ValueType::View),
                }
                path = captures.get(2).map_or("", |rest| rest.as_str());
            }
            path
        };

        let expr = if path.is_empty() {
            Expr::Empty
        } else {
            parse_path(path)
                .map_err(|err| err.append(&format!("\n\nWithin expression: {}", source)))?
        };
        Ok(Expression { expr, meta })
    }
}
