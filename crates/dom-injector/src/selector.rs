//! Selector engine: a CSS subset plus `//tag[@attr='value']` XPath queries.
//!
//! CSS supports type and universal selectors, `#id`, `.class`, attribute
//! tests (`[a]`, `=`, `*=`, `^=`, `$=`, `~=`), descendant and child
//! combinators, and comma-separated lists.

use std::sync::Arc;

use thiserror::Error;

use crate::dom::Element;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("invalid selector '{selector}' at {position}: {reason}")]
    Invalid {
        selector: String,
        position: usize,
        reason: String,
    },
    #[error("unsupported xpath '{0}'")]
    UnsupportedXPath(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    Css(Vec<Complex>),
    XPath(XPathQuery),
}

impl Selector {
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        if trimmed.starts_with('/') {
            return XPathQuery::parse(trimmed).map(Selector::XPath);
        }
        Parser::new(trimmed).selector_list().map(Selector::Css)
    }

    pub fn matches(&self, element: &Arc<Element>) -> bool {
        match self {
            Selector::Css(list) => list.iter().any(|complex| complex.matches(element)),
            Selector::XPath(query) => query.matches(element),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compound selectors joined by combinators, left to right.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, element: &Arc<Element>) -> bool {
        match self.parts.len() {
            0 => false,
            len => matches_from(element, &self.parts, len - 1),
        }
    }
}

fn matches_from(element: &Arc<Element>, parts: &[(Combinator, Compound)], index: usize) -> bool {
    let (combinator, compound) = &parts[index];
    if !compound.matches(element) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match combinator {
        Combinator::Child => element
            .parent()
            .map(|parent| matches_from(&parent, parts, index - 1))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut current = element.parent();
            while let Some(ancestor) = current {
                if matches_from(&ancestor, parts, index - 1) {
                    return true;
                }
                current = ancestor.parent();
            }
            false
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = element.class_list();
            if !self.classes.iter().all(|class| classes.contains(class)) {
                return false;
            }
        }
        self.attributes.iter().all(|test| test.matches(element))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

impl AttrTest {
    fn matches(&self, element: &Element) -> bool {
        let Some(actual) = element.attribute(&self.name) else {
            return false;
        };
        let expected = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Contains => !expected.is_empty() && actual.contains(expected),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttrOp::Word => actual.split_whitespace().any(|word| word == expected),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::Invalid {
            selector: self.source.to_string(),
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn expect(&mut self, wanted: char) -> Result<(), SelectorError> {
        match self.peek() {
            Some(found) if found == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!("expected '{wanted}', found '{found}'"))),
            None => Err(self.error(format!("expected '{wanted}', found end of input"))),
        }
    }

    fn selector_list(&mut self) -> Result<Vec<Complex>, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_whitespace();
            list.push(self.complex()?);
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(list),
                Some(',') => self.pos += 1,
                Some(found) => return Err(self.error(format!("unexpected '{found}'"))),
            }
        }
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        loop {
            parts.push((combinator, self.compound()?));
            let had_space = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => return Ok(Complex { parts }),
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    combinator = Combinator::Child;
                }
                Some(_) if had_space => combinator = Combinator::Descendant,
                Some(found) => return Err(self.error(format!("unexpected '{found}'"))),
            }
        }
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let start = self.pos;
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => self.pos += 1,
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.identifier()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.identifier()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.identifier()?);
                }
                Some('[') => compound.attributes.push(self.attribute()?),
                _ => break,
            }
        }
        if self.pos == start {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrTest, SelectorError> {
        self.expect('[')?;
        self.skip_whitespace();
        let name = self.identifier()?.to_ascii_lowercase();
        self.skip_whitespace();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrTest {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('*') => AttrOp::Contains,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('~') => AttrOp::Word,
            _ => return Err(self.error("expected attribute operator")),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            self.expect('=')?;
        }
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('\'' | '"')) => self.quoted(quote)?,
            _ => self.identifier()?,
        };
        self.skip_whitespace();
        self.expect(']')?;
        Ok(AttrTest { name, op, value })
    }

    fn identifier(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string"))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// `//tag[@attr='value'][@other]`, matched anywhere in the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XPathQuery {
    tag: Option<String>,
    predicates: Vec<(String, Option<String>)>,
}

impl XPathQuery {
    fn parse(raw: &str) -> Result<Self, SelectorError> {
        let unsupported = || SelectorError::UnsupportedXPath(raw.to_string());
        let body = raw.strip_prefix("//").ok_or_else(unsupported)?;
        let mut parser = Parser::new(body);

        let tag = match parser.peek() {
            Some('*') => {
                parser.pos += 1;
                None
            }
            _ => Some(
                parser
                    .identifier()
                    .map_err(|_| unsupported())?
                    .to_ascii_lowercase(),
            ),
        };

        let mut predicates = Vec::new();
        while parser.peek() == Some('[') {
            parser.pos += 1;
            parser.skip_whitespace();
            parser.expect('@').map_err(|_| unsupported())?;
            let name = parser.identifier().map_err(|_| unsupported())?;
            parser.skip_whitespace();
            let value = if parser.peek() == Some('=') {
                parser.pos += 1;
                parser.skip_whitespace();
                let value = match parser.peek() {
                    Some(quote @ ('\'' | '"')) => parser.quoted(quote).map_err(|_| unsupported())?,
                    _ => return Err(unsupported()),
                };
                parser.skip_whitespace();
                Some(value)
            } else {
                None
            };
            parser.expect(']').map_err(|_| unsupported())?;
            predicates.push((name.to_ascii_lowercase(), value));
        }
        if parser.peek().is_some() {
            return Err(unsupported());
        }
        Ok(Self { tag, predicates })
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if element.tag() != tag {
                return false;
            }
        }
        self.predicates
            .iter()
            .all(|(name, expected)| match (element.attribute(name), expected) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == *expected,
                (None, _) => false,
            })
    }
}
