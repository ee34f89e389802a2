use std::collections::HashMap;
use std::str::FromStr;

use crate::error::TemplateError;

/// Values for a template's `%<name>d` placeholders.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bindings {
    values: HashMap<String, i64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: i64) -> Option<i64> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        for (name, value) in iter {
            bindings.insert(name, value);
        }
        bindings
    }
}

/// One `name=value` pair, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: i64,
}

impl FromStr for Binding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got `{}`", s))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("empty binding name in `{}`", s));
        }
        let value = value
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid value for `{}`: {}", name, e))?;
        Ok(Binding {
            name: name.to_string(),
            value,
        })
    }
}

/// An immutable instruction template. Build it once and render it for as
/// many runs as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    template: String,
}

impl Program {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Names of every placeholder in the template, in order of appearance.
    pub fn placeholders(&self) -> Result<Vec<&str>, TemplateError> {
        let mut names = Vec::new();
        for piece in Pieces::new(&self.template) {
            if let Piece::Placeholder(name) = piece? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Substitutes every placeholder with its decimal value.
    pub fn render(&self, bindings: &Bindings) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.template.len());
        for piece in Pieces::new(&self.template) {
            match piece? {
                Piece::Text(text) => out.push_str(text),
                Piece::Percent => out.push('%'),
                Piece::Placeholder(name) => {
                    let value = bindings
                        .get(name)
                        .ok_or_else(|| TemplateError::Missing(name.to_string()))?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

enum Piece<'a> {
    Text(&'a str),
    Percent,
    Placeholder(&'a str),
}

/// Walks a template, yielding literal text and directives.
struct Pieces<'a> {
    template: &'a str,
    pos: usize,
}

impl<'a> Pieces<'a> {
    fn new(template: &'a str) -> Self {
        Self { template, pos: 0 }
    }

    fn malformed(&mut self, offset: usize, reason: &'static str) -> TemplateError {
        self.pos = self.template.len();
        TemplateError::Malformed { offset, reason }
    }

    fn directive(&mut self) -> Result<Piece<'a>, TemplateError> {
        let start = self.pos;
        let rest = &self.template[start + 1..];
        if rest.starts_with('%') {
            self.pos = start + 2;
            return Ok(Piece::Percent);
        }
        let body = match rest.strip_prefix('<') {
            Some(body) => body,
            None => return Err(self.malformed(start, "expected `%<name>d` or `%%`")),
        };
        let close = match body.find('>') {
            Some(close) => close,
            None => return Err(self.malformed(start, "unterminated placeholder name")),
        };
        let name = &body[..close];
        if name.is_empty() {
            return Err(self.malformed(start, "empty placeholder name"));
        }
        if !body[close + 1..].starts_with('d') {
            return Err(self.malformed(start, "placeholder must use the `d` conversion"));
        }
        // '%' + '<' + name + '>' + 'd'
        self.pos = start + name.len() + 4;
        Ok(Piece::Placeholder(name))
    }
}

impl<'a> Iterator for Pieces<'a> {
    type Item = Result<Piece<'a>, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.template.len() {
            return None;
        }
        let rest = &self.template[self.pos..];
        match rest.find('%') {
            Some(0) => Some(self.directive()),
            Some(at) => {
                self.pos += at;
                Some(Ok(Piece::Text(&rest[..at])))
            }
            None => {
                self.pos = self.template.len();
                Some(Ok(Piece::Text(rest)))
            }
        }
    }
}
