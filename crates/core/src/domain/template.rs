// Argument Template (command-string builder)

use crate::domain::error::{DomainError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder values for one launch
///
/// A key mapped to `None` is *known* for this launch kind but has no value;
/// filling a template that uses it fails instead of leaking `{key}` into the
/// command line.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: BTreeMap<String, Option<String>>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), Some(value.into()));
        self
    }

    /// Register `key` as known, with an optional value
    pub fn known(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    fn lookup(&self, key: &str) -> Option<&Option<String>> {
        self.values.get(key)
    }
}

/// A command argument template with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTemplate(String);

impl ArgTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder names in order of appearance (duplicates kept)
    pub fn placeholders(&self) -> Vec<&str> {
        tokens(&self.0)
            .filter_map(|t| match t {
                Token::Placeholder(name) => Some(name),
                Token::Text(_) => None,
            })
            .collect()
    }

    /// Substitute every known placeholder
    ///
    /// Unknown `{...}` text (e.g. shell `${VAR}`) is kept verbatim.
    pub fn fill(&self, values: &Placeholders) -> Result<String> {
        let mut out = String::with_capacity(self.0.len());
        for token in tokens(&self.0) {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Placeholder(name) => match values.lookup(name) {
                    Some(Some(value)) => out.push_str(value),
                    Some(None) => {
                        return Err(DomainError::UnresolvedPlaceholder(name.to_string()))
                    }
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        Ok(out)
    }
}

enum Token<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokens(text: &str) -> impl Iterator<Item = Token<'_>> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        if let Some(open) = rest.find('{') {
            if open > 0 {
                let (head, tail) = rest.split_at(open);
                rest = tail;
                return Some(Token::Text(head));
            }
            if let Some(close) = rest.find('}') {
                let name = &rest[1..close];
                if is_identifier(name) {
                    rest = &rest[close + 1..];
                    return Some(Token::Placeholder(name));
                }
            }
            // Lone '{' or non-identifier body
            let (head, tail) = rest.split_at(1);
            rest = tail;
            return Some(Token::Text(head));
        }
        let all = rest;
        rest = "";
        Some(Token::Text(all))
    })
}

/// Wrap a value in double quotes so paths with spaces survive the shell
pub fn quote(value: impl AsRef<str>) -> String {
    format!("\"{}\"", value.as_ref())
}

/// Quote and space-join a list of paths
pub fn quote_all<P: AsRef<Path>>(paths: &[P]) -> String {
    paths
        .iter()
        .map(|p| quote(p.as_ref().to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Interpreter prefix for a script: Python sources go through `python`
pub fn interpreter_command(script: &str) -> String {
    if script.ends_with(".py") {
        format!("python {}", script)
    } else {
        script.to_string()
    }
}

/// Full command line: interpreter + filled arguments
pub fn compose_command(script: &str, filled_args: &str) -> String {
    format!("{} {}", interpreter_command(script), filled_args)
        .trim()
        .to_string()
}
