//! Compiles view templates into node trees.
//!
//! Templates are HTML with `{{...}}` expressions:
//!
//! ```html
//! <ul class="{{if active}}on{{/if}}">
//!   {{each items as #item}}<li>{{#item.name}}</li>{{else}}<li>None</li>{{/each}}
//! </ul>
//! <view name="card" title="{{title}}">Body</view>
//! ```
//!
//! [`Compiler::compile_markup`] turns such a source into a [`Template`]:
//! elements, text, expression output, blocks and view pointers. String
//! templates ([`Compiler::compile_string`]) only split text from
//! expressions. Views are looked up through a [`ViewLookup`], usually a
//! [`ViewRegistry`].

pub mod block;
pub mod compiler;
mod compose;
pub mod error;
pub mod expression;
mod expression_tokenizer;
pub mod grammar;
pub mod html;
mod scanner;
mod scope;
pub mod template;
pub mod views;

pub use block::{BlockKind, BlockMap, add_builtins};
pub use compiler::{Compiler, Options, ViewContext};
pub use error::{ErrorKind, ParseError, Result};
pub use expression::{
    BindType, BlockType, Expr, Expression, ExpressionMeta, Path, PathRoot, Segment, ValueType,
};
pub use template::{
    Attribute, AttributesMap, Block, ConditionalBlock, DynamicViewPointer, EachBlock, Element,
    Node, ParentWrapper, Template, ViewAttribute, ViewAttributes, ViewName, ViewPointer,
};
pub use views::{NoViews, View, ViewLookup, ViewOptions, ViewRegistry};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn path(name: &str) -> Expr {
        Expr::Path(Path {
            root: PathRoot::Context,
            segments: vec![expression::Segment::Name(name.to_string())],
        })
    }

    fn markup(source: &str) -> Result<Template> {
        Compiler::default().compile_markup(source, ViewContext::detached())
    }

    #[test]
    fn end_to_end() {
        let template = markup("<p>{{if show}}<b>{{name}}</b>{{/if}}</p>").unwrap();
        let mut show = Expression::new(path("show"));
        show.meta.block_type = Some(BlockType::If);
        show.meta.source = "if show".to_string();
        let expected = vec![Node::Element(Element {
            tag: "p".to_string(),
            attributes: AttributesMap::new(),
            content: vec![Node::Conditional(ConditionalBlock {
                expressions: vec![show],
                contents: vec![vec![Node::Element(Element {
                    tag: "b".to_string(),
                    attributes: AttributesMap::new(),
                    content: vec![Node::DynamicText(Expression::new(path("name")))],
                    is_void: false,
                })]],
            })],
            is_void: false,
        })];
        assert_eq!(template.content, expected);
    }

    #[test]
    fn idempotent() {
        let source = "<div title=\"{{a}}\">{{each list}}{{this}}{{else}}-{{/}}</div>";
        let compiler = Compiler::default();
        let first = compiler.compile_markup(source, ViewContext::detached()).unwrap();
        let second = compiler.compile_markup(source, ViewContext::detached()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn literal_and_dynamic_href() {
        let template = markup("<a href=\"/x\"></a><a href=\"{{url}}\"></a>").unwrap();
        let [Node::Element(literal), Node::Element(dynamic)] = template.content.as_slice() else {
            panic!("expected two links");
        };
        assert_eq!(literal.attributes["href"], Attribute::Literal(json!("/x")));
        assert_eq!(
            dynamic.attributes["href"],
            Attribute::Dynamic(Expression::new(path("url")))
        );
    }

    #[test]
    fn if_else_pairs() {
        let template = markup("{{if a}}X{{else}}Y{{/if}}").unwrap();
        let [Node::Conditional(block)] = template.content.as_slice() else {
            panic!("expected one conditional");
        };
        assert_eq!(block.expressions.len(), 2);
        assert_eq!(block.expressions[1].expr, Expr::Empty);
        assert_eq!(block.expressions[1].meta.block_type, Some(BlockType::Else));
        assert_eq!(
            block.contents,
            vec![vec![Node::Text("X".to_string())], vec![Node::Text("Y".to_string())]]
        );

        let err = markup("{{if a}}X{{/unless}}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedBlock);
    }

    #[test]
    fn keyword_stripping() {
        let template = markup("{{unescaped bound foo}}").unwrap();
        let [Node::DynamicText(expression)] = template.content.as_slice() else {
            panic!("expected dynamic text");
        };
        assert!(expression.meta.unescaped);
        assert_eq!(expression.meta.bind_type, Some(BindType::Bound));
        assert_eq!(expression.expr, path("foo"));
    }

    #[test]
    fn nested_braces() {
        let template = markup("{{ {b} }}").unwrap();
        let [Node::DynamicText(expression)] = template.content.as_slice() else {
            panic!("expected dynamic text");
        };
        assert!(matches!(
            &expression.expr,
            Expr::Operator { name, args } if name == "{}" && args.len() == 2
        ));

        let err = markup("a {{b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedDelimiters);
    }

    #[test]
    fn array_attributes() {
        let mut views = ViewRegistry::new();
        views.register(
            "list",
            "<ul>{{each @item}}<li>{{@content}}</li>{{/each}}</ul>",
            ViewOptions {
                arrays: Some("item".to_string()),
                ..ViewOptions::default()
            },
        );
        let template = Compiler::default()
            .compile_markup(
                "<view name=\"list\"><array name=\"item\">{{x}}</array><array name=\"item\">{{y}}</array></view>",
                ViewContext::new(&views, None),
            )
            .unwrap();
        let [Node::ViewPointer(pointer)] = template.content.as_slice() else {
            panic!("expected a view pointer");
        };
        let Some(ViewAttribute::Array(items)) = pointer.attributes.get("item") else {
            panic!("expected an item array");
        };
        assert_eq!(items.len(), 2);
        assert!(!pointer.attributes.contains_key(ViewAttributes::CONTENT));
        let Some(ViewAttribute::Wrapper(first)) = items[0].get(ViewAttributes::CONTENT) else {
            panic!("expected item content");
        };
        assert_eq!(
            first.template.content,
            vec![Node::DynamicText(Expression::new(path("x")))]
        );
    }

    #[test]
    fn views_compile_against_each_other() {
        let mut views = ViewRegistry::new();
        views.register(
            "app:layout",
            "<!DOCTYPE html><body>{{@content}}</body>",
            ViewOptions::default(),
        );
        views.register(
            "app:index",
            "<view name=\"layout\"><p>{{title}}</p></view>",
            ViewOptions::default(),
        );
        views.register(
            "app:title",
            "{{title}} | Site",
            ViewOptions {
                string: true,
                ..ViewOptions::default()
            },
        );
        let compiler = Compiler::default();
        for view in views.iter() {
            assert!(view.parse(&compiler, &views).is_ok(), "{} failed", view.name);
        }
        let index = views.parse(&compiler, "app:index").unwrap().unwrap();
        assert!(matches!(
            index.content.as_slice(),
            [Node::ViewPointer(pointer)] if pointer.view.name == "app:layout"
        ));
    }

    #[test]
    fn expression_errors_carry_context() {
        let mut views = ViewRegistry::new();
        views.register("bad", "<p>{{a +}}</p>", ViewOptions::default());
        let err = views.parse(&Compiler::default(), "bad").unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpressionSyntax);
        assert!(err.message().contains("Within expression: a +"));
        assert!(err.message().ends_with("Within template \"bad\":\n<p>{{a +}}</p>"));
    }

    #[test]
    fn deeply_nested_expression_fails() {
        let source = format!("{{{{{}a{}}}}}", "(".repeat(300), ")".repeat(300));
        let err = Compiler::default()
            .compile_string(&source, ViewContext::detached())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExpressionSyntax);
        assert!(err.message().starts_with("expression nested too deeply"));
    }

    #[test]
    fn create_expression() {
        let expression = Compiler::default().create_expression("each items as #item").unwrap();
        assert_eq!(expression.meta.block_type, Some(BlockType::Each));
        assert_eq!(expression.meta.alias.as_deref(), Some("#item"));
        assert_eq!(expression.expr, path("items"));
    }
}
