use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use cardiorag_core::{CardioError, Value};

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("valid variable pattern"))
}

/// Text template with `{{name}}` slots.
///
/// Rendering is strict: a slot without a matching variable is an error rather
/// than an empty string, so a prompt never silently loses its question or
/// evidence. Single braces pass through untouched, which keeps Cypher map
/// literals such as `{name: 'x'}` intact in few-shot examples.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Distinct slot names, sorted.
    pub fn variables(&self) -> BTreeSet<String> {
        variable_pattern()
            .captures_iter(&self.template)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    pub fn render(&self, vars: &HashMap<String, Value>) -> Result<String, CardioError> {
        if let Some(missing) = self.variables().into_iter().find(|v| !vars.contains_key(v)) {
            return Err(CardioError::InvalidInput(format!(
                "prompt variable '{missing}' was not provided"
            )));
        }

        let rendered = variable_pattern().replace_all(&self.template, |caps: &regex::Captures| {
            match vars.get(&caps[1]) {
                Some(value) => value
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| value.to_string()),
                None => String::new(),
            }
        });
        Ok(rendered.into_owned())
    }
}
