//! Views and view lookup
//!
//! A view is a named template. Names are namespaced with `:`, so a view
//! registered as `app:home:card` lives in namespace `app:home`. References
//! from inside a view are resolved relative to that view's namespace first.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use crate::compiler::{Compiler, ViewContext};
use crate::error::Result;
use crate::template::Template;

/// Declaration options for a view
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Whitespace separated child element names passed as attributes
    pub attributes: Option<String>,
    /// Whitespace separated child element names collected into arrays
    pub arrays: Option<String>,
    /// Registers the view as a custom element with this tag name
    pub element: Option<String>,
    /// Compile the source as a string template, without markup
    pub string: bool,
}

/// A named template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub name: String,
    pub namespace: Option<String>,
    pub source: String,
    pub string: bool,
    /// Child element names the view accepts as attributes
    pub attributes: HashSet<String>,
    /// Child element names the view collects into arrays
    pub arrays: HashSet<String>,
    pub element: Option<String>,
}

/// Resolves view names while a template compiles
pub trait ViewLookup {
    /// Finds `name` as seen from `namespace`
    fn find(&self, name: &str, namespace: Option<&str>) -> Option<Arc<View>>;

    /// Finds the view registered as a custom element named `tag`
    fn find_element(&self, tag: &str) -> Option<Arc<View>>;
}

/// A lookup that knows no views
#[derive(Debug, Clone, Copy, Default)]
pub struct NoViews;

impl ViewLookup for NoViews {
    fn find(&self, _name: &str, _namespace: Option<&str>) -> Option<Arc<View>> {
        None
    }

    fn find_element(&self, _tag: &str) -> Option<Arc<View>> {
        None
    }
}

fn names(list: Option<&str>) -> HashSet<String> {
    list.map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

impl View {
    pub fn new(name: impl Into<String>, source: impl Into<String>, options: ViewOptions) -> Self {
        let name = name.into();
        let namespace = name.rsplit_once(':').map(|(namespace, _)| namespace.to_string());
        Self {
            namespace,
            source: source.into(),
            string: options.string,
            attributes: names(options.attributes.as_deref()),
            arrays: names(options.arrays.as_deref()),
            element: options.element,
            name,
        }
    }

    /// Compiles this view's source. Failures name the view and include its
    /// full source.
    pub fn parse(&self, compiler: &Compiler, views: &dyn ViewLookup) -> Result<Template> {
        debug!("parsing view {}", self.name);
        let context = ViewContext::new(views, self.namespace.as_deref());
        let template = if self.string {
            compiler.compile_string(&self.source, context)
        } else {
            compiler.compile_markup(&self.source, context)
        };
        template.map_err(|err| {
            err.append(&format!(
                "\n\nWithin template \"{}\":\n{}",
                self.name, self.source
            ))
        })
    }
}

/// Views by name
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    names: HashMap<String, Arc<View>>,
    elements: HashMap<String, Arc<View>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a view, replacing any view of the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        options: ViewOptions,
    ) -> Arc<View> {
        let view = Arc::new(View::new(name, source, options));
        if let Some(element) = &view.element {
            self.elements.insert(element.to_ascii_lowercase(), view.clone());
        }
        self.names.insert(view.name.clone(), view.clone());
        view
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<View>> {
        self.names.values()
    }

    /// Compiles a registered view against this registry
    pub fn parse(&self, compiler: &Compiler, name: &str) -> Option<Result<Template>> {
        self.names.get(name).map(|view| view.parse(compiler, self))
    }
}

impl ViewLookup for ViewRegistry {
    /// Tries `namespace:name`, then `name` under each enclosing namespace,
    /// then the bare `name`
    fn find(&self, name: &str, namespace: Option<&str>) -> Option<Arc<View>> {
        let mut namespace = namespace.filter(|namespace| !namespace.is_empty());
        while let Some(current) = namespace {
            if let Some(view) = self.names.get(&format!("{}:{}", current, name)) {
                return Some(view.clone());
            }
            namespace = current.rsplit_once(':').map(|(parent, _)| parent);
        }
        self.names.get(name).cloned()
    }

    fn find_element(&self, tag: &str) -> Option<Arc<View>> {
        self.elements.get(tag).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registry() -> ViewRegistry {
        let mut views = ViewRegistry::new();
        views.register("card", "<div>{{@content}}</div>", ViewOptions::default());
        views.register("app:card", "<section></section>", ViewOptions::default());
        views.register("app:home:page", "<view name=\"card\"></view>", ViewOptions::default());
        views.register(
            "tabs",
            "",
            ViewOptions {
                arrays: Some("tab pane".to_string()),
                attributes: Some("header".to_string()),
                element: Some("Tab-Set".to_string()),
                ..ViewOptions::default()
            },
        );
        views
    }

    #[test]
    fn namespaces() {
        let view = View::new("app:home:page", "", ViewOptions::default());
        assert_eq!(view.namespace.as_deref(), Some("app:home"));
        assert_eq!(View::new("page", "", ViewOptions::default()).namespace, None);
    }

    #[test]
    fn relative_lookup() {
        let views = registry();
        assert_eq!(views.find("card", Some("app:home")).unwrap().name, "app:card");
        assert_eq!(views.find("card", Some("other")).unwrap().name, "card");
        assert_eq!(views.find("card", None).unwrap().name, "card");
        assert_eq!(views.find("home:page", Some("app")).unwrap().name, "app:home:page");
        assert!(views.find("missing", Some("app")).is_none());
    }

    #[test]
    fn options() {
        let views = registry();
        let tabs = views.find_element("tab-set").unwrap();
        assert!(tabs.arrays.contains("pane"));
        assert!(tabs.attributes.contains("header"));
        assert!(views.find_element("div").is_none());
    }

    #[test]
    fn parse_errors_name_the_template() {
        let mut views = ViewRegistry::new();
        views.register("broken", "<p>{{if a}}</p>", ViewOptions::default());
        let err = views.parse(&Compiler::default(), "broken").unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MismatchedTag);
        assert!(err.message().contains("Within template \"broken\":\n<p>{{if a}}</p>"));
    }

    #[test]
    fn string_views() {
        let mut views = ViewRegistry::new();
        views.register(
            "title",
            "<b>{{name}}</b>",
            ViewOptions {
                string: true,
                ..ViewOptions::default()
            },
        );
        let template = views.parse(&Compiler::default(), "title").unwrap().unwrap();
        assert_eq!(template.content.len(), 3);
    }
}
