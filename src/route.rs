//! Path template compilation and matching.
//!
//! A template mixes literal text with `:name` placeholders, for example
//! `/users/:id/posts/:post_id`. Each placeholder matches one or more
//! characters that are neither `/` nor `?`, so a parameter never spans a
//! path segment or reaches into the query string.
use regex::Regex;

/// A compiled path template. Compilation is deterministic: the same template
/// string always yields the same matcher.
#[derive(Debug)]
pub struct RouteTemplate {
    raw: String,
    pattern: Regex,
    param_names: Vec<String>,
}

impl RouteTemplate {
    /// Compile a template. Total for any string; text without placeholders
    /// compiles to an exact-match pattern.
    pub fn compile(template: &str) -> Self {
        let placeholder = Regex::new(":[A-Za-z0-9_]+").unwrap();
        let mut pattern = String::from("^");
        let mut param_names = vec![];
        let mut index = 0;
        for found in placeholder.find_iter(template) {
            param_names.push(template[found.start() + 1..found.end()].to_string());
            pattern.push_str(&regex::escape(&template[index..found.start()]));
            pattern.push_str("([^/\\?]+)");
            index = found.end();
        }
        pattern.push_str(&regex::escape(&template[index..]));
        pattern.push('$');
        Self {
            raw: template.to_string(),
            // The pattern is built from escaped literals and fixed groups,
            // it is always valid.
            pattern: Regex::new(&pattern).unwrap(),
            param_names,
        }
    }

    /// Match a concrete request path, ignoring any trailing query string.
    /// On success returns parameter bindings in placeholder order. If the
    /// pattern yields fewer captures than declared names, the excess names
    /// are left unbound rather than failing.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let path = match path.find('?') {
            Some(i) => &path[..i],
            None => path,
        };
        let captures = self.pattern.captures(path)?;
        let mut params = vec![];
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = captures.get(i + 1) {
                params.push((name.clone(), value.as_str().to_string()));
            }
        }
        Some(params)
    }

    /// The template string this matcher was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}
