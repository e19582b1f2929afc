use dry_templates_parser::{Compiler, View, ViewLookup, ViewOptions, ViewRegistry};
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use syn::{LitStr, Token, parse::Parse, parse::ParseStream, parse_macro_input};
use walkdir::WalkDir;

static NOT_IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").unwrap());

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            for lc in c.to_lowercase() {
                result.push(lc);
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn function_name(view_name: &str) -> proc_macro2::Ident {
    let name = to_snake_case(&NOT_IDENT.replace_all(view_name, "_"));
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format_ident!("_{}", name)
    } else {
        format_ident!("{}", name)
    }
}

/// Resolves every view name, so single templates can be checked without
/// the views they reference
struct Unchecked;

impl ViewLookup for Unchecked {
    fn find(&self, name: &str, _namespace: Option<&str>) -> Option<Arc<View>> {
        Some(Arc::new(View::new(name, "", ViewOptions::default())))
    }

    fn find_element(&self, _tag: &str) -> Option<Arc<View>> {
        None
    }
}

fn validate(name: &str, source: &str, span: proc_macro2::Span) -> syn::Result<()> {
    View::new(name, source, ViewOptions::default())
        .parse(&Compiler::default(), &Unchecked)
        .map(|_| ())
        .map_err(|err| syn::Error::new(span, err.message()))
}

fn generate_view_fn(name: &str, source: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
    let function = function_name(name);
    quote! {
        pub fn #function() -> ::dry_templates::View {
            ::dry_templates::View::new(#name, #source, ::dry_templates::ViewOptions::default())
        }
    }
}

fn manifest_path(relative: &str) -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    Path::new(&manifest_dir).join(relative)
}

/// View name of a template file: its path below `root` without the
/// extension, joined with `:`
fn view_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join(":"))
}

struct StrInput {
    name: LitStr,
    content: LitStr,
}

impl Parse for StrInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;
        let content: LitStr = input.parse()?;
        Ok(StrInput { name, content })
    }
}

#[proc_macro]
pub fn dry_templates_directory(input: TokenStream) -> TokenStream {
    let dir_lit = parse_macro_input!(input as LitStr);
    let root_path = manifest_path(&dir_lit.value());

    if !root_path.is_dir() {
        return syn::Error::new(
            dir_lit.span(),
            format!("Directory not found: {:?}", root_path),
        )
        .to_compile_error()
        .into();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root_path).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "html") {
            continue;
        }
        let (Some(name), Ok(source)) = (view_name(&root_path, path), fs::read_to_string(path))
        else {
            return syn::Error::new(dir_lit.span(), format!("Failed to read {:?}", path))
                .to_compile_error()
                .into();
        };
        files.push((name, source, path.to_string_lossy().into_owned()));
    }

    // views reference each other, so check them against all of them
    let mut registry = ViewRegistry::new();
    for (name, source, _) in &files {
        registry.register(name.as_str(), source.as_str(), ViewOptions::default());
    }
    let compiler = Compiler::default();
    for (name, _, _) in &files {
        if let Some(Err(err)) = registry.parse(&compiler, name) {
            return syn::Error::new(dir_lit.span(), err.message())
                .to_compile_error()
                .into();
        }
    }

    let registrations = files.iter().map(|(name, _, path)| {
        quote! {
            views.register(#name, include_str!(#path), ::dry_templates::ViewOptions::default());
        }
    });

    let expanded = quote! {
        pub fn registry() -> ::dry_templates::ViewRegistry {
            let mut views = ::dry_templates::ViewRegistry::new();
            #(#registrations)*
            views
        }
    };

    TokenStream::from(expanded)
}

#[proc_macro]
pub fn dry_templates_file(input: TokenStream) -> TokenStream {
    let file_lit = parse_macro_input!(input as LitStr);
    let path = manifest_path(&file_lit.value());

    let (Some(stem), Ok(source)) = (path.file_stem(), fs::read_to_string(&path)) else {
        return syn::Error::new(file_lit.span(), format!("File not found: {:?}", path))
            .to_compile_error()
            .into();
    };
    let name = stem.to_string_lossy();
    if let Err(err) = validate(&name, &source, file_lit.span()) {
        return err.to_compile_error().into();
    }

    // include_str! links the expansion to the file, so edits trigger a
    // recompilation
    let path_str = path.to_string_lossy();
    TokenStream::from(generate_view_fn(&name, quote! { include_str!(#path_str) }))
}

#[proc_macro]
pub fn dry_templates_str(input: TokenStream) -> TokenStream {
    let StrInput { name, content } = parse_macro_input!(input as StrInput);
    if let Err(err) = validate(&name.value(), &content.value(), content.span()) {
        return err.to_compile_error().into();
    }
    TokenStream::from(generate_view_fn(&name.value(), quote! { #content }))
}
