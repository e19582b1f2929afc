//! Compiled template trees
//!
//! These types are the output of the compiler. They are plain data: the
//! rendering runtime walks them, nothing here renders or binds.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::expression::Expression;
use crate::views::View;

/// An ordered list of nodes, in render order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub content: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Literal text, already entity-unescaped
    Text(String),
    /// Output of an expression
    DynamicText(Expression),
    Comment(String),
    Conditional(ConditionalBlock),
    Each(EachBlock),
    /// Any other block keyword, such as `with` or `unbound`
    Block(Block),
    ViewPointer(ViewPointer),
    DynamicViewPointer(DynamicViewPointer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: AttributesMap,
    pub content: Vec<Node>,
    /// Void elements take no content and no closing tag
    pub is_void: bool,
}

/// Element attributes, in source order
pub type AttributesMap = IndexMap<String, Attribute>;

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// A value known at compile time. Valueless attributes are `true`.
    Literal(Value),
    /// A value produced by a single expression
    Dynamic(Expression),
    /// A value produced by a mix of text, expressions and blocks
    Template(Template),
}

/// `if`/`else if`/`else` chains, and `unless`. `expressions[i]` guards
/// `contents[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBlock {
    pub expressions: Vec<Expression>,
    pub contents: Vec<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EachBlock {
    pub expression: Expression,
    pub content: Vec<Node>,
    /// Rendered when the list is empty
    pub else_content: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub expression: Expression,
    pub content: Vec<Node>,
}

/// A reference to a view resolved at compile time
#[derive(Debug, Clone, PartialEq)]
pub struct ViewPointer {
    pub name: String,
    pub attributes: ViewAttributes,
    pub view: Arc<View>,
}

/// A reference to a view whose name is only known at render time
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicViewPointer {
    pub name: ViewName,
    pub attributes: ViewAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewName {
    Expression(Expression),
    Template(Template),
}

/// A template passed down to a view, rendered in the caller's context
#[derive(Debug, Clone, PartialEq)]
pub struct ParentWrapper {
    pub template: Template,
    /// The expression, when the template is a single expression
    pub expression: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAttribute {
    Literal(Value),
    Wrapper(ParentWrapper),
    /// Collected `<array>` children, one attribute bag per occurrence
    Array(Vec<ViewAttributes>),
}

/// Attributes passed to a view, keyed by camelCased name.
///
/// The [`ViewAttributes::CONTENT`] key is reserved: when it is not set
/// explicitly it receives the element content that no other attribute
/// claimed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewAttributes(IndexMap<String, ViewAttribute>);

impl Template {
    pub fn new(content: Vec<Node>) -> Self {
        Self { content }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl Element {
    pub fn new(tag: impl Into<String>, attributes: AttributesMap, is_void: bool) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            content: Vec::new(),
            is_void,
        }
    }
}

impl Node {
    /// The expression a block was opened with
    pub fn block_expression(&self) -> Option<&Expression> {
        match self {
            Node::Conditional(block) => block.expressions.first(),
            Node::Each(block) => Some(&block.expression),
            Node::Block(block) => Some(&block.expression),
            _ => None,
        }
    }

    /// The content list that a closing scope fills: an element's children,
    /// the latest conditional branch, or a loop's else branch once opened.
    pub(crate) fn open_content(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Element(element) if !element.is_void => Some(&mut element.content),
            Node::Conditional(block) => block.contents.last_mut(),
            Node::Each(block) => Some(match &mut block.else_content {
                Some(else_content) => else_content,
                None => &mut block.content,
            }),
            Node::Block(block) => Some(&mut block.content),
            _ => None,
        }
    }
}

impl ParentWrapper {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            expression: None,
        }
    }

    /// Wraps a single expression as a one node template
    pub fn from_expression(expression: Expression) -> Self {
        Self {
            template: Template::new(vec![Node::DynamicText(expression.clone())]),
            expression: Some(expression),
        }
    }
}

impl ViewAttributes {
    pub const CONTENT: &'static str = "content";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ViewAttribute> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: ViewAttribute,
    ) -> Option<ViewAttribute> {
        self.0.insert(key.into(), value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ViewAttribute> {
        self.0.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ViewAttribute)> {
        self.0.iter()
    }

    /// Sets `content` to the unclaimed nodes, unless it was given explicitly
    /// or there is nothing to pass
    pub fn set_default_content(&mut self, remaining: Vec<Node>) {
        if !self.contains_key(Self::CONTENT) && !remaining.is_empty() {
            self.insert(
                Self::CONTENT,
                ViewAttribute::Wrapper(ParentWrapper::new(Template::new(remaining))),
            );
        }
    }
}
