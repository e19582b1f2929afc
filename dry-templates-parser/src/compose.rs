//! View composition
//!
//! Views are referenced three ways:
//!
//! ```html
//! <view name="card" title="Hi">body</view>
//! <tab-set><tab>One</tab><tab>Two</tab></tab-set>
//! {{view "card", {title: name}}}
//! ```
//!
//! Element attributes are camel cased and passed to the view. Child
//! elements the view declares as attributes or arrays are pulled out of the
//! content; whatever is left becomes the `content` attribute.

use std::sync::{Arc, LazyLock};

use log::trace;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::compiler::Parse;
use crate::error::{ErrorKind, ParseError, Result};
use crate::expression::{Expr, Expression};
use crate::template::{
    Attribute, AttributesMap, DynamicViewPointer, Element, Node, ParentWrapper, Template,
    ViewAttribute, ViewAttributes, ViewName, ViewPointer,
};
use crate::views::View;

static DASHED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-(.)").unwrap());

fn camel_case(name: &str) -> String {
    DASHED
        .replace_all(name, |captures: &Captures| captures[1].to_uppercase())
        .into_owned()
}

fn view_attributes_from_element(attributes: AttributesMap) -> ViewAttributes {
    let mut view_attributes = ViewAttributes::new();
    for (key, value) in attributes {
        let value = match value {
            Attribute::Literal(value) => ViewAttribute::Literal(value),
            Attribute::Dynamic(expression) => {
                ViewAttribute::Wrapper(ParentWrapper::from_expression(expression))
            }
            Attribute::Template(template) => ViewAttribute::Wrapper(ParentWrapper::new(template)),
        };
        view_attributes.insert(camel_case(&key), value);
    }
    view_attributes
}

/// Removes the literal `name` attribute of an `<attribute>` or `<array>`
/// element
fn take_literal_name(element: &mut Element) -> Result<String> {
    match element.attributes.shift_remove("name") {
        Some(Attribute::Literal(Value::String(name))) if !name.is_empty() => Ok(name),
        _ => Err(ParseError::new(
            ErrorKind::MissingLiteralName,
            format!("The <{}> element requires a literal name attribute", element.tag),
        )),
    }
}

fn add_attribute_element(element: Element, name: String, attributes: &mut ViewAttributes) {
    attributes.insert(
        name,
        ViewAttribute::Wrapper(ParentWrapper::new(Template::new(element.content))),
    );
}

fn add_array_element(
    element: Element,
    name: String,
    attributes: &mut ViewAttributes,
) -> Result<()> {
    let mut item = view_attributes_from_element(element.attributes);
    item.set_default_content(element.content);
    if let Some(existing) = attributes.get_mut(&name) {
        let ViewAttribute::Array(items) = existing else {
            return Err(ParseError::new(
                ErrorKind::AttributeParseError,
                format!("Attribute {} is both a value and an array", name),
            ));
        };
        items.push(item);
        return Ok(());
    }
    attributes.insert(name, ViewAttribute::Array(vec![item]));
    Ok(())
}

/// Moves child elements the view claims into `attributes`, returning the
/// rest of the content in order
fn claim_content(
    content: Vec<Node>,
    view: &View,
    attributes: &mut ViewAttributes,
) -> Result<Vec<Node>> {
    let mut remaining = Vec::new();
    for node in content {
        let mut element = match node {
            Node::Element(element) => element,
            node => {
                remaining.push(node);
                continue;
            }
        };
        if element.tag == "attribute" {
            let name = take_literal_name(&mut element)?;
            add_attribute_element(element, name, attributes);
        } else if view.attributes.contains(&element.tag) {
            let name = element.tag.clone();
            add_attribute_element(element, name, attributes);
        } else if element.tag == "array" {
            let name = take_literal_name(&mut element)?;
            add_array_element(element, name, attributes)?;
        } else if view.arrays.contains(&element.tag) {
            let name = element.tag.clone();
            add_array_element(element, name, attributes)?;
        } else {
            remaining.push(Node::Element(element));
        }
    }
    Ok(remaining)
}

/// Reads the attributes argument of a view expression: an object literal,
/// or an object whose values are expressions
fn attributes_from_expression(expr: Option<Expr>, source: &str) -> Result<ViewAttributes> {
    let mut attributes = ViewAttributes::new();
    match expr {
        None => {}
        Some(Expr::Literal(Value::Object(object))) => {
            for (key, value) in object {
                attributes.insert(key, ViewAttribute::Literal(value));
            }
        }
        Some(Expr::Operator { name, args }) if name == "{}" => {
            let mut args = args.into_iter();
            while let Some(key) = args.next() {
                let (Expr::Literal(Value::String(key)), Some(value)) = (key, args.next()) else {
                    return Err(ParseError::unexpected(source));
                };
                let value = match value {
                    Expr::Literal(value) => ViewAttribute::Literal(value),
                    expr => ViewAttribute::Wrapper(ParentWrapper::from_expression(
                        Expression::new(expr),
                    )),
                };
                attributes.insert(key, value);
            }
        }
        Some(_) => return Err(ParseError::unexpected(source)),
    }
    Ok(attributes)
}

impl Parse<'_> {
    /// Composes a closed `<view name="...">` element
    pub(crate) fn parse_view_element(&mut self, mut element: Element) -> Result<()> {
        let missing = || {
            ParseError::new(
                ErrorKind::MissingViewName,
                "The <view> element requires a name attribute",
            )
        };
        let name = match element.attributes.shift_remove("name") {
            Some(Attribute::Literal(Value::String(name))) if !name.is_empty() => name,
            Some(Attribute::Dynamic(expression)) => {
                return self.add_dynamic_view(element, ViewName::Expression(expression));
            }
            Some(Attribute::Template(template)) => {
                return self.add_dynamic_view(element, ViewName::Template(template));
            }
            _ => return Err(missing()),
        };
        let view = self.find_view(&name)?;
        self.parse_named_view_element(element, view)
    }

    fn add_dynamic_view(&mut self, element: Element, name: ViewName) -> Result<()> {
        let mut attributes = view_attributes_from_element(element.attributes);
        attributes.set_default_content(element.content);
        trace!("dynamic view pointer");
        self.stack.append(Node::DynamicViewPointer(DynamicViewPointer { name, attributes }));
        Ok(())
    }

    /// Composes an element that names a known view
    pub(crate) fn parse_named_view_element(
        &mut self,
        element: Element,
        view: Arc<View>,
    ) -> Result<()> {
        let mut attributes = view_attributes_from_element(element.attributes);
        let remaining = claim_content(element.content, &view, &mut attributes)?;
        attributes.set_default_content(remaining);
        trace!("view pointer to {}", view.name);
        self.stack.append(Node::ViewPointer(ViewPointer {
            name: view.name.clone(),
            attributes,
            view,
        }));
        Ok(())
    }

    /// Composes `{{view name}}` or `{{view name, {key: value}}}`
    pub(crate) fn parse_view_expression(&mut self, expression: Expression) -> Result<()> {
        let source = expression.meta.source;
        let (name, attributes) = match expression.expr {
            Expr::Sequence(args) => {
                let mut args = args.into_iter();
                let name = args.next();
                let attributes = args.next();
                if args.next().is_some() {
                    return Err(ParseError::unexpected(&source));
                }
                (name, attributes)
            }
            expr => (Some(expr), None),
        };
        let attributes = attributes_from_expression(attributes, &source)?;
        match name {
            Some(Expr::Literal(Value::String(name))) => {
                let view = self.find_view(&name)?;
                self.stack.append(Node::ViewPointer(ViewPointer {
                    name: view.name.clone(),
                    attributes,
                    view,
                }));
            }
            Some(expr @ (Expr::Path(_) | Expr::Fn { .. } | Expr::Operator { .. })) => {
                self.stack.append(Node::DynamicViewPointer(DynamicViewPointer {
                    name: ViewName::Expression(Expression::new(expr)),
                    attributes,
                }));
            }
            _ => return Err(ParseError::unexpected(&source)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::compiler::{Compiler, ViewContext};
    use crate::views::{ViewOptions, ViewRegistry};

    fn registry() -> ViewRegistry {
        let mut views = ViewRegistry::new();
        views.register("card", "<div>{{@content}}</div>", ViewOptions::default());
        views.register(
            "tabs",
            "",
            ViewOptions {
                attributes: Some("header".to_string()),
                arrays: Some("tab".to_string()),
                element: Some("tab-set".to_string()),
                ..ViewOptions::default()
            },
        );
        views
    }

    fn compile(source: &str) -> Result<Template> {
        let views = registry();
        Compiler::default().compile_markup(source, ViewContext::new(&views, None))
    }

    fn pointer(template: &Template) -> &ViewPointer {
        match template.content.as_slice() {
            [Node::ViewPointer(pointer)] => pointer,
            other => panic!("expected a single view pointer, got {:?}", other),
        }
    }

    #[test]
    fn camel_cases_names() {
        assert_eq!(camel_case("data-user-id"), "dataUserId");
        assert_eq!(camel_case("title"), "title");
    }

    #[test]
    fn view_element() {
        let template =
            compile("<view name=\"card\" data-title=\"Hi\" on-click=\"{{go}}\">body</view>")
                .unwrap();
        let pointer = pointer(&template);
        assert_eq!(pointer.name, "card");
        assert_eq!(pointer.view.name, "card");
        assert_eq!(pointer.attributes.get("dataTitle"), Some(&ViewAttribute::Literal(json!("Hi"))));
        assert!(matches!(
            pointer.attributes.get("onClick"),
            Some(ViewAttribute::Wrapper(wrapper)) if wrapper.expression.is_some()
        ));
        let Some(ViewAttribute::Wrapper(content)) = pointer.attributes.get("content") else {
            panic!("expected content");
        };
        assert_eq!(content.template.content, vec![Node::Text("body".to_string())]);
    }

    #[test]
    fn explicit_content_wins() {
        let template = compile("<view name=\"card\" content=\"x\">body</view>").unwrap();
        assert_eq!(
            pointer(&template).attributes.get("content"),
            Some(&ViewAttribute::Literal(json!("x")))
        );
    }

    #[test]
    fn view_element_errors() {
        assert_eq!(compile("<view></view>").unwrap_err().kind(), ErrorKind::MissingViewName);
        assert_eq!(
            compile("<view name=\"{{5}}\"></view>").unwrap_err().kind(),
            ErrorKind::MissingViewName
        );
        let err = compile("<view name=\"nope\"></view>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ViewNotFound);
        assert_eq!(err.message(), "No view found for \"nope\"");
    }

    #[test]
    fn dynamic_view_names() {
        let template = compile("<view name=\"{{kind}}\" a=\"1\">x</view>").unwrap();
        let [Node::DynamicViewPointer(pointer)] = template.content.as_slice() else {
            panic!("expected a dynamic view pointer");
        };
        assert!(matches!(&pointer.name, ViewName::Expression(e) if e.meta.source == "kind"));
        assert_eq!(pointer.attributes.len(), 2);

        let template = compile("<view name=\"{{kind}}-item\"></view>").unwrap();
        assert!(matches!(
            template.content.as_slice(),
            [Node::DynamicViewPointer(DynamicViewPointer { name: ViewName::Template(_), .. })]
        ));
    }

    #[test]
    fn element_view_claims_children() {
        let template = compile(
            "<tab-set>\
                <header>Title</header>\
                <tab label=\"A\">one</tab>\
                <tab label=\"B\">two</tab>\
                <array name=\"extra\">three</array>\
                <attribute name=\"footer\">end</attribute>\
                <p>rest</p>\
            </tab-set>",
        )
        .unwrap();
        let pointer = pointer(&template);
        assert_eq!(pointer.name, "tabs");
        let Some(ViewAttribute::Array(tabs)) = pointer.attributes.get("tab") else {
            panic!("expected tab array");
        };
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[1].get("label"), Some(&ViewAttribute::Literal(json!("B"))));
        assert!(tabs[0].contains_key("content"));
        assert!(matches!(
            pointer.attributes.get("extra"),
            Some(ViewAttribute::Array(items)) if items.len() == 1
        ));
        assert!(matches!(pointer.attributes.get("header"), Some(ViewAttribute::Wrapper(_))));
        assert!(matches!(pointer.attributes.get("footer"), Some(ViewAttribute::Wrapper(_))));
        let Some(ViewAttribute::Wrapper(content)) = pointer.attributes.get("content") else {
            panic!("expected content");
        };
        assert!(matches!(content.template.content.as_slice(), [Node::Element(p)] if p.tag == "p"));
    }

    #[test]
    fn element_views_can_be_disabled() {
        let views = registry();
        let compiler = Compiler::new(
            crate::compiler::Options {
                element_views: false,
                ..Default::default()
            },
            {
                let mut map = crate::block::BlockMap::new();
                crate::block::add_builtins(&mut map);
                map
            },
        );
        let template = compiler
            .compile_markup("<tab-set></tab-set>", ViewContext::new(&views, None))
            .unwrap();
        assert!(matches!(template.content.as_slice(), [Node::Element(_)]));
    }

    #[test]
    fn named_children_need_literal_names() {
        let err = compile("<tab-set><attribute>x</attribute></tab-set>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingLiteralName);
        let err = compile("<tab-set><array name=\"{{n}}\">x</array></tab-set>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingLiteralName);
    }

    #[test]
    fn array_and_value_collide() {
        let err = compile("<tab-set><header>a</header><array name=\"header\">b</array></tab-set>")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AttributeParseError);
    }

    #[test]
    fn view_expressions() {
        let template = compile("{{view \"card\", {title: name, size: 2}}}").unwrap();
        let view = pointer(&template);
        assert_eq!(view.attributes.get("size"), Some(&ViewAttribute::Literal(json!(2))));
        assert!(matches!(
            view.attributes.get("title"),
            Some(ViewAttribute::Wrapper(wrapper))
                if wrapper.expression.as_ref().is_some_and(|e| e.meta.source == "name")
        ));

        let template = compile("{{view \"card\", {title: \"Hi\"}}}").unwrap();
        assert_eq!(
            pointer(&template).attributes.get("title"),
            Some(&ViewAttribute::Literal(json!("Hi")))
        );

        let template = compile("{{view kind}}").unwrap();
        assert!(matches!(template.content.as_slice(), [Node::DynamicViewPointer(_)]));
    }

    #[test]
    fn view_expression_errors() {
        let err = compile("{{view 5}}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedExpression);
        assert_eq!(err.message(), "Error parsing template: view 5");
        assert_eq!(
            compile("{{view \"card\", 3}}").unwrap_err().kind(),
            ErrorKind::UnexpectedExpression
        );
        assert_eq!(compile("{{view \"missing\"}}").unwrap_err().kind(), ErrorKind::ViewNotFound);
    }
}
