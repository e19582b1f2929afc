//! Template compilation
//!
//! A [`Compiler`] holds the block keywords and options shared by every
//! compile. Each call to [`Compiler::compile_markup`] or
//! [`Compiler::compile_string`] gets its own [`Parse`] state, so a compiler
//! can be shared freely.

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::block::{BlockKind, BlockMap, add_builtins};
use crate::error::{ErrorKind, ParseError, Result};
use crate::expression::{BlockType, Expr, Expression, ExpressionMeta, ExpressionParser, ValueType};
use crate::html::{
    MarkupHandler, RawAttributes, is_conditional_comment, is_void_element, tokenize,
    unescape_entities,
};
use crate::scanner::{Piece, scan};
use crate::scope::ScopeStack;
use crate::template::{Attribute, AttributesMap, Element, Node, Template};
use crate::views::{NoViews, View, ViewLookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Treat elements whose tag is registered by a view as that view
    pub element_views: bool,
    /// Keep `<!--[if IE]>...<![endif]-->` comments, dropping all others
    pub conditional_comments: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            element_views: true,
            conditional_comments: true,
        }
    }
}

/// The views visible to a template and the namespace it was declared in
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub views: &'a dyn ViewLookup,
    pub namespace: Option<&'a str>,
}

impl<'a> ViewContext<'a> {
    pub fn new(views: &'a dyn ViewLookup, namespace: Option<&'a str>) -> Self {
        Self { views, namespace }
    }
}

impl ViewContext<'static> {
    /// A context without any views. View references fail with
    /// [`ErrorKind::ViewNotFound`].
    pub fn detached() -> Self {
        Self {
            views: &NoViews,
            namespace: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compiler {
    options: Options,
    block_map: BlockMap,
    expressions: ExpressionParser,
}

impl Default for Compiler {
    fn default() -> Self {
        let mut block_map = BlockMap::new();
        add_builtins(&mut block_map);
        Self::new(Options::default(), block_map)
    }
}

impl Compiler {
    pub fn new(options: Options, block_map: BlockMap) -> Self {
        let expressions = ExpressionParser::new(&block_map);
        Self {
            options,
            block_map,
            expressions,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn block_kind(&self, block_type: &BlockType) -> BlockKind {
        self.block_map
            .get(block_type.as_str())
            .copied()
            .unwrap_or(BlockKind::Generic)
    }

    /// Parses the inside of a `{{...}}` without the braces
    pub fn create_expression(&self, source: &str) -> Result<Expression> {
        self.expressions.parse(source)
    }

    /// Compiles an HTML template
    pub fn compile_markup(&self, source: &str, context: ViewContext<'_>) -> Result<Template> {
        debug!("compiling markup template ({} bytes)", source.len());
        let mut parse = Parse::new(self, context);
        tokenize(source, &mut parse)?;
        parse.finish()
    }

    /// Compiles a template that contains no markup, such as a page title.
    /// Angle brackets are kept as text.
    pub fn compile_string(&self, source: &str, context: ViewContext<'_>) -> Result<Template> {
        debug!("compiling string template ({} bytes)", source.len());
        let mut parse = Parse::new(self, context);
        parse.parse_text(source)?;
        parse.finish()
    }
}

/// State of one compile
pub(crate) struct Parse<'a> {
    pub(crate) compiler: &'a Compiler,
    pub(crate) context: ViewContext<'a>,
    pub(crate) stack: ScopeStack,
}

impl<'a> Parse<'a> {
    fn new(compiler: &'a Compiler, context: ViewContext<'a>) -> Self {
        Self {
            compiler,
            context,
            stack: ScopeStack::new(),
        }
    }

    fn finish(self) -> Result<Template> {
        Ok(Template::new(self.stack.finish()?))
    }

    pub(crate) fn find_view(&self, name: &str) -> Result<Arc<View>> {
        self.context
            .views
            .find(name, self.context.namespace)
            .ok_or_else(|| {
                ParseError::new(
                    ErrorKind::ViewNotFound,
                    format!("No view found for \"{}\"", name),
                )
            })
    }

    /// Splits text into literals and expressions, appending them to the
    /// current scope
    pub(crate) fn parse_text(&mut self, data: &str) -> Result<()> {
        let compiler = self.compiler;
        scan(data, &compiler.expressions, |piece| match piece {
            Piece::Literal(text) => {
                self.stack.append(Node::Text(text.to_string()));
                Ok(())
            }
            Piece::Expression(expression) => self.parse_expression(expression),
        })
    }

    fn parse_expression(&mut self, expression: Expression) -> Result<()> {
        if expression.is_block() {
            self.parse_block_expression(expression)
        } else if expression.meta.value_type == Some(ValueType::View) {
            self.parse_view_expression(expression)
        } else {
            self.stack.append(Node::DynamicText(expression));
            Ok(())
        }
    }

    fn parse_attributes(&mut self, attributes: RawAttributes) -> Result<AttributesMap> {
        let mut map = AttributesMap::new();
        for (key, value) in attributes {
            let value = match value {
                None => Attribute::Literal(Value::Bool(true)),
                Some(value) if value.is_empty() => Attribute::Literal(Value::String(value)),
                Some(value) => self.parse_attribute_value(&key, &value)?,
            };
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Compiles an attribute value in a scope of its own. A single text or
    /// literal stays a literal, a single expression stays dynamic and
    /// anything else becomes a template.
    fn parse_attribute_value(&mut self, key: &str, value: &str) -> Result<Attribute> {
        let outer = std::mem::take(&mut self.stack);
        let parsed = self.parse_text(&unescape_entities(value));
        let inner = std::mem::replace(&mut self.stack, outer);
        parsed?;
        let mut content = inner.finish()?;
        if content.len() > 1 {
            return Ok(Attribute::Template(Template::new(content)));
        }
        match content.pop() {
            Some(Node::Text(data)) => Ok(Attribute::Literal(Value::String(data))),
            Some(Node::DynamicText(Expression {
                expr: Expr::Literal(value),
                ..
            })) => Ok(Attribute::Literal(value)),
            Some(Node::DynamicText(expression)) => Ok(Attribute::Dynamic(expression)),
            Some(node) => Ok(Attribute::Template(Template::new(vec![node]))),
            None => Err(ParseError::new(
                ErrorKind::AttributeParseError,
                format!("Error parsing {} attribute: {}", key, value),
            )),
        }
    }
}

impl MarkupHandler for Parse<'_> {
    fn start(&mut self, _tag: &str, tag_name: &str, attributes: RawAttributes) -> Result<()> {
        let attributes = self.parse_attributes(attributes)?;
        let is_void = is_void_element(tag_name);
        self.stack.append(Node::Element(Element::new(tag_name, attributes, is_void)));
        if !is_void {
            self.stack.push();
        }
        Ok(())
    }

    fn end(&mut self, tag: &str, tag_name: &str) -> Result<()> {
        if is_void_element(tag_name) {
            return Ok(());
        }
        let mismatched = || {
            ParseError::new(
                ErrorKind::MismatchedTag,
                format!("Mismatched closing HTML tag: {}", tag),
            )
        };
        let content = self.stack.pop().map_err(|_| mismatched())?;
        match self.stack.last_mut() {
            Some(Node::Element(element)) if element.tag == tag_name => element.content = content,
            _ => return Err(mismatched()),
        }

        if tag_name == "view" {
            if let Some(Node::Element(element)) = self.stack.take_last() {
                return self.parse_view_element(element);
            }
        } else if self.compiler.options().element_views
            && let Some(view) = self.context.views.find_element(tag_name)
            && let Some(Node::Element(element)) = self.stack.take_last()
        {
            return self.parse_named_view_element(element, view);
        }
        Ok(())
    }

    fn text(&mut self, data: &str) -> Result<()> {
        self.parse_text(&unescape_entities(data))
    }

    fn comment(&mut self, tag: &str, data: &str) -> Result<()> {
        if self.compiler.options().conditional_comments && is_conditional_comment(tag) {
            self.stack.append(Node::Comment(data.to_string()));
        }
        Ok(())
    }

    fn other(&mut self, tag: &str) -> Result<()> {
        let mut meta = ExpressionMeta::new(tag);
        meta.unescaped = true;
        self.stack.append(Node::DynamicText(Expression {
            expr: Expr::Literal(Value::String(tag.to_string())),
            meta,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn markup(source: &str) -> Result<Template> {
        Compiler::default().compile_markup(source, ViewContext::detached())
    }

    fn element(node: &Node) -> &Element {
        match node {
            Node::Element(element) => element,
            other => panic!("expected an element, got {:?}", other),
        }
    }

    #[test]
    fn nested_elements() {
        let template = markup("<div class=\"box\"><p>Hi <b>there</b></p><br></div>").unwrap();
        let div = element(&template.content[0]);
        assert_eq!(div.tag, "div");
        assert_eq!(div.attributes["class"], Attribute::Literal(json!("box")));
        assert_eq!(div.content.len(), 2);
        let p = element(&div.content[0]);
        assert_eq!(p.content[0], Node::Text("Hi ".to_string()));
        assert_eq!(element(&p.content[1]).tag, "b");
        let br = element(&div.content[1]);
        assert!(br.is_void);
        assert!(br.content.is_empty());
    }

    #[test]
    fn attribute_values() {
        let template = markup(
            "<input disabled value=\"\" title=\"{{title}}\" size=\"{{10}}\" alt=\"a {{b}}\">",
        )
        .unwrap();
        let attributes = &element(&template.content[0]).attributes;
        assert_eq!(attributes["disabled"], Attribute::Literal(json!(true)));
        assert_eq!(attributes["value"], Attribute::Literal(json!("")));
        assert!(matches!(&attributes["title"], Attribute::Dynamic(e) if e.meta.source == "title"));
        assert_eq!(attributes["size"], Attribute::Literal(json!(10)));
        assert!(matches!(&attributes["alt"], Attribute::Template(t) if t.content.len() == 2));
        let keys: Vec<_> = attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, ["disabled", "value", "title", "size", "alt"]);
    }

    #[test]
    fn attribute_blocks() {
        let template = markup("<p class=\"{{if active}}on{{/if}}\"></p>").unwrap();
        let attributes = &element(&template.content[0]).attributes;
        assert!(matches!(
            &attributes["class"],
            Attribute::Template(t) if matches!(t.content.as_slice(), [Node::Conditional(_)])
        ));
    }

    #[test]
    fn attribute_scope_is_isolated() {
        let err = markup("<p class=\"{{if active}}on\"></p>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnbalancedScope);
        let err = markup("{{if a}}<p class=\"{{/if}}\"></p>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedBlock);
    }

    #[test]
    fn empty_expression_attribute() {
        let err = markup("<p class=\"{{}}\"></p>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AttributeParseError);
        assert_eq!(err.message(), "Error parsing class attribute: {{}}");
    }

    #[test]
    fn entities() {
        let template = markup("<a title=\"&lt;x&gt;\">&amp; {{a}}</a>").unwrap();
        let a = element(&template.content[0]);
        assert_eq!(a.attributes["title"], Attribute::Literal(json!("<x>")));
        assert_eq!(a.content[0], Node::Text("& ".to_string()));
    }

    #[test]
    fn mismatched_tags() {
        let err = markup("<div><p></div>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedTag);
        assert_eq!(err.message(), "Mismatched closing HTML tag: </div>");
        assert_eq!(markup("</p>").unwrap_err().kind(), ErrorKind::MismatchedTag);
        assert_eq!(markup("<div>").unwrap_err().kind(), ErrorKind::UnbalancedScope);
    }

    #[test]
    fn void_end_tags_are_ignored() {
        let template = markup("<p>a<br></br>b</p>").unwrap();
        assert_eq!(element(&template.content[0]).content.len(), 3);
    }

    #[test]
    fn comments() {
        let template = markup("<!-- note --><!--[if IE]><p>old</p><![endif]-->").unwrap();
        assert_eq!(
            template.content,
            vec![Node::Comment("[if IE]><p>old</p><![endif]".to_string())]
        );

        let compiler = Compiler::new(
            Options {
                conditional_comments: false,
                ..Options::default()
            },
            Compiler::default().block_map,
        );
        let template = compiler
            .compile_markup("<!--[if IE]>x<![endif]-->", ViewContext::detached())
            .unwrap();
        assert!(template.is_empty());
    }

    #[test]
    fn doctype() {
        let template = markup("<!DOCTYPE html><html></html>").unwrap();
        let Node::DynamicText(expression) = &template.content[0] else {
            panic!("expected doctype text");
        };
        assert!(expression.meta.unescaped);
        assert_eq!(expression.literal_value(), Some(&json!("<!DOCTYPE html>")));
    }

    #[test]
    fn string_templates_keep_markup() {
        let template = Compiler::default()
            .compile_string("<title>{{name}}</title>", ViewContext::detached())
            .unwrap();
        assert_eq!(template.content[0], Node::Text("<title>".to_string()));
        assert_eq!(template.content.len(), 3);
    }

    #[test]
    fn missing_view() {
        let err = markup("{{view \"card\"}}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ViewNotFound);
        assert_eq!(err.message(), "No view found for \"card\"");
    }
}
