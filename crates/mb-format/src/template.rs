//! Template scanner and renderer.
//!
//! Grammar, scanned left to right without backtracking:
//!
//! ```text
//! %%              literal '%'
//! %name           directive, no parameter
//! %name{param}    directive with a (possibly empty) parameter
//! %<anything>     copied through unchanged
//! ```
//!
//! `name` is an ASCII letter or `_` followed by ASCII alphanumerics or `_`.
//! A `{` with no closing `}` is not a parameter block; the directive is
//! resolved without a parameter and the brace is copied literally.

use tracing::error;

use crate::error::DirectiveError;

/// Capability used to expand a directive.
pub trait Resolve {
    fn resolve(&self, name: &str, parameter: Option<&str>) -> Result<String, DirectiveError>;
}

impl<F> Resolve for F
where
    F: Fn(&str, Option<&str>) -> Result<String, DirectiveError>,
{
    fn resolve(&self, name: &str, parameter: Option<&str>) -> Result<String, DirectiveError> {
        self(name, parameter)
    }
}

/// One lexical unit of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Directive {
        name: String,
        parameter: Option<String>,
    },
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template. Parsing never fails.
    pub fn parse(source: &str) -> Self {
        Template {
            source: source.to_string(),
            segments: scan(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Expand every directive through `resolver`.
    pub fn render<R: Resolve + ?Sized>(&self, resolver: &R) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Directive { name, parameter } => {
                    match resolver.resolve(name, parameter.as_deref()) {
                        Ok(value) => out.push_str(&value),
                        Err(err) => {
                            error!(
                                directive = %name,
                                parameter = ?parameter,
                                error = %err,
                                "template directive could not be resolved"
                            );
                        }
                    }
                }
            }
        }
        out
    }
}

/// Parse and render in one step.
pub fn format<R: Resolve + ?Sized>(template: &str, resolver: &R) -> String {
    Template::parse(template).render(resolver)
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn scan(source: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while let Some(c) = source[pos..].chars().next() {
        pos += c.len_utf8();
        if c != '%' {
            literal.push(c);
            continue;
        }

        match source[pos..].chars().next() {
            Some('%') => {
                literal.push('%');
                pos += 1;
            }
            Some(first) if is_name_start(first) => {
                let name_len = source[pos..]
                    .find(|ch: char| !is_name_char(ch))
                    .unwrap_or(source.len() - pos);
                let name = source[pos..pos + name_len].to_string();
                pos += name_len;

                let mut parameter = None;
                if source[pos..].starts_with('{') {
                    if let Some(close) = source[pos + 1..].find('}') {
                        parameter = Some(source[pos + 1..pos + 1 + close].to_string());
                        pos += close + 2;
                    }
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Directive { name, parameter });
            }
            _ => literal.push('%'),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
