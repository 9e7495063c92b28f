//! Form, input, and link extraction from page source.
//!
//! Used by both crawl phases. Parsing goes through html5ever's error-recovering
//! tree builder, so malformed markup yields a partial extraction instead of an
//! error.

use crate::normalize::{canonicalize, is_same_origin, normalize_url, resolve_href};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Input types that receive the payload; everything else gets a placeholder.
const TEXTUAL_TYPES: &[&str] = &["text", "search", "email", "url", "tel", "password", "textarea"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    /// Case-insensitive; anything other than POST is treated as GET.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("post") {
            Method::Post
        } else {
            Method::Get
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub name: Option<String>,
}

impl Input {
    pub fn new(tag: &str, input_type: &str, name: Option<&str>) -> Self {
        Self {
            tag: tag.to_string(),
            input_type: input_type.to_string(),
            name: name.map(String::from),
        }
    }

    pub fn is_named(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn is_textual(&self) -> bool {
        TEXTUAL_TYPES.contains(&self.input_type.as_str())
    }

    fn from_element(element: &ElementRef) -> Self {
        let el = element.value();
        let tag = el.name().to_ascii_lowercase();
        let input_type = el
            .attr("type")
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| {
                if tag == "textarea" {
                    "textarea".to_string()
                } else {
                    "text".to_string()
                }
            });
        let name = el
            .attr("name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Self {
            tag,
            input_type,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub action: String,
    pub method: Method,
    pub inputs: Vec<Input>,
}

impl Form {
    /// Single-field GET form wrapping a formless input on `page_url`.
    pub fn synthetic(page_url: String, input: Input) -> Self {
        Self {
            action: page_url,
            method: Method::Get,
            inputs: vec![input],
        }
    }

    pub fn named_inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.iter().filter(|i| i.is_named())
    }

    pub fn is_fuzzable(&self) -> bool {
        self.named_inputs().next().is_some()
    }

    /// Identity used to deduplicate fuzz targets across pages.
    pub fn target_key(&self) -> (String, Method, Vec<String>) {
        let action = normalize_url(&self.action).unwrap_or_else(|| self.action.clone());
        let names = self
            .named_inputs()
            .filter_map(|i| i.name.clone())
            .collect();
        (action, self.method, names)
    }
}

/// Extract forms (dropping those with no named input) and named formless inputs.
pub fn extract_forms(html: &str, page_url: &Url) -> (Vec<Form>, Vec<Input>) {
    let document = Html::parse_document(html);
    let mut forms = Vec::new();
    let mut independent = Vec::new();

    let (Ok(form_selector), Ok(field_selector)) =
        (Selector::parse("form"), Selector::parse("input, textarea"))
    else {
        return (forms, independent);
    };

    let mut current = page_url.clone();
    current.set_fragment(None);

    for form in document.select(&form_selector) {
        let action = resolve_action(&current, form.value().attr("action"));
        let method = form
            .value()
            .attr("method")
            .map(Method::parse)
            .unwrap_or_default();
        let inputs: Vec<Input> = form
            .select(&field_selector)
            .map(|el| Input::from_element(&el))
            .collect();

        let form = Form {
            action,
            method,
            inputs,
        };
        if form.is_fuzzable() {
            forms.push(form);
        }
    }

    for field in document.select(&field_selector) {
        let inside_form = field
            .ancestors()
            .any(|node| node.value().as_element().is_some_and(|e| e.name() == "form"));
        if inside_form {
            continue;
        }
        let input = Input::from_element(&field);
        if input.is_named() {
            independent.push(input);
        }
    }

    (forms, independent)
}

/// Empty, `#`, and `/` actions submit back to the current page.
fn resolve_action(current: &Url, action: Option<&str>) -> String {
    let action = action.map(str::trim).unwrap_or_default();
    if action.is_empty() || action == "#" || action == "/" {
        return current.to_string();
    }
    match current.join(action) {
        Ok(mut resolved) => {
            resolved.set_fragment(None);
            resolved.to_string()
        }
        Err(_) => action.to_string(),
    }
}

/// Same-origin `a[href]` targets, canonicalized and deduplicated in document order.
pub fn extract_links(html: &str, page_url: &Url, origin: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(link_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_href(page_url, href) else {
            continue;
        };
        if !is_same_origin(&resolved, origin) {
            continue;
        }
        let canonical = canonicalize(&resolved);
        if seen.insert(canonical.clone()) {
            links.push(canonical);
        }
    }
    links
}
