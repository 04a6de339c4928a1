//! Path queries over a [`ReportDocument`].
//!
//! Supports the XPath subset the report queries need: an absolute path of
//! tag names, optionally filtered by `contains(@attr, needle)` where the
//! needle is a quoted literal or a `$variable` resolved from [`Bindings`].
//!
//! Grammar:
//! ```text
//! query     := ('/' name)+ [ '[' predicate ']' ]
//! predicate := 'contains' '(' '@' name ',' needle ')'
//! needle    := '\'' chars '\'' | '"' chars '"' | '$' name
//! ```
//!
//! `contains` is plain substring containment, as in XPath. Elements that do
//! not carry the attribute never match; an empty needle matches every
//! element that does.

use std::collections::HashMap;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::document::{ElementRef, ReportDocument};
use crate::types::{TimerError, TimerResult};

/// Right-hand side of a `contains` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Needle {
    Literal(String),
    Variable(String),
}

impl Needle {
    fn resolve<'b>(&'b self, bindings: &'b Bindings) -> TimerResult<&'b str> {
        match self {
            Needle::Literal(value) => Ok(value.as_str()),
            Needle::Variable(name) => bindings
                .get(name)
                .ok_or_else(|| TimerError::UnboundVariable(name.clone())),
        }
    }
}

/// Element filter applied after path navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Attribute value contains the needle as a substring.
    Contains { attribute: String, needle: Needle },
}

/// Variables available to `$name` needles.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// An absolute element path with an optional predicate on the last step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    path: Vec<String>,
    predicate: Option<Predicate>,
}

impl Query {
    /// Build a query from path segments, root first.
    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            path: segments
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
            predicate: None,
        }
    }

    /// Keep only elements whose `attribute` contains `needle`.
    pub fn contains(mut self, attribute: impl Into<String>, needle: Needle) -> Self {
        self.predicate = Some(Predicate::Contains {
            attribute: attribute.into(),
            needle,
        });
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.path
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Select matching elements in document order.
    pub fn select<'doc>(
        &self,
        doc: &'doc ReportDocument,
        bindings: &Bindings,
    ) -> TimerResult<Vec<ElementRef<'doc>>> {
        let filter = match &self.predicate {
            Some(Predicate::Contains { attribute, needle }) => {
                Some((attribute.as_str(), needle.resolve(bindings)?))
            }
            None => None,
        };

        let Some((first, rest)) = self.path.split_first() else {
            return Ok(Vec::new());
        };
        let root = doc.root();
        if root.name() != first {
            return Ok(Vec::new());
        }

        let mut current = vec![root];
        for segment in rest {
            current = current
                .iter()
                .flat_map(|element| element.children_named(segment))
                .collect();
            if current.is_empty() {
                break;
            }
        }

        if let Some((attribute, needle)) = filter {
            current.retain(|element| {
                element
                    .attr(attribute)
                    .is_some_and(|value| value.contains(needle))
            });
        }
        Ok(current)
    }

    /// Select with no variables bound.
    pub fn evaluate<'doc>(&self, doc: &'doc ReportDocument) -> TimerResult<Vec<ElementRef<'doc>>> {
        self.select(doc, &Bindings::default())
    }

    /// Parse the textual form, e.g.
    /// `/dashboardreport/data/admdashlet/adm/agent[contains(@host, $myVar)]`.
    pub fn parse(input: &str) -> TimerResult<Self> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().peekable(),
        };
        parser.query()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.path {
            write!(f, "/{segment}")?;
        }
        match &self.predicate {
            Some(Predicate::Contains {
                attribute,
                needle: Needle::Literal(value),
            }) => {
                let quote = if value.contains('\'') { '"' } else { '\'' };
                write!(f, "[contains(@{attribute}, {quote}{value}{quote})]")
            }
            Some(Predicate::Contains {
                attribute,
                needle: Needle::Variable(name),
            }) => write!(f, "[contains(@{attribute}, ${name})]"),
            None => Ok(()),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn query(&mut self) -> TimerResult<Query> {
        let mut path = Vec::new();
        while self.eat('/') {
            path.push(self.name()?);
        }
        if path.is_empty() {
            return Err(self.error("query must start with '/'"));
        }

        let predicate = if self.eat('[') {
            let predicate = self.predicate()?;
            self.skip_ws();
            self.expect(']')?;
            Some(predicate)
        } else {
            None
        };

        self.skip_ws();
        if self.chars.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(Query { path, predicate })
    }

    fn predicate(&mut self) -> TimerResult<Predicate> {
        self.skip_ws();
        let function = self.name()?;
        if function != "contains" {
            return Err(self.error(&format!("unsupported function '{function}'")));
        }
        self.skip_ws();
        self.expect('(')?;
        self.skip_ws();
        self.expect('@')?;
        let attribute = self.name()?;
        self.skip_ws();
        self.expect(',')?;
        self.skip_ws();
        let needle = match self.chars.peek().map(|&(_, c)| c) {
            Some('$') => {
                self.chars.next();
                Needle::Variable(self.name()?)
            }
            Some(quote @ ('\'' | '"')) => {
                self.chars.next();
                Needle::Literal(self.until(quote)?)
            }
            _ => return Err(self.error("expected a quoted string or $variable")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(Predicate::Contains { attribute, needle })
    }

    fn name(&mut self) -> TimerResult<String> {
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            let allowed = if name.is_empty() {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
            };
            if !allowed {
                break;
            }
            name.push(c);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error("expected a name"));
        }
        Ok(name)
    }

    fn until(&mut self, quote: char) -> TimerResult<String> {
        let mut value = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(value);
            }
            value.push(c);
        }
        Err(self.error("unterminated string literal"))
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> TimerResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn error(&mut self, message: &str) -> TimerError {
        let offset = self
            .chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.input.len());
        TimerError::Query(format!("{message} at offset {offset} in {:?}", self.input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<dashboardreport>
      <data>
        <admdashlet>
          <adm>
            <agent name="Third Party Content" host="a.com" response_avg="10"/>
            <agent name="Frontend" host="web"/>
            <agent name="Third Party Content" host="b.com"/>
          </adm>
          <adm_links>
            <agent to="Third Party Content@a.com" remoting_count="3"/>
          </adm_links>
        </admdashlet>
      </data>
    </dashboardreport>"#;

    fn doc() -> ReportDocument {
        ReportDocument::parse(REPORT.as_bytes()).unwrap()
    }

    #[test]
    fn test_select_by_path() {
        let doc = doc();
        let query = Query::path(&["dashboardreport", "data", "admdashlet", "adm", "agent"]);
        let hosts: Vec<_> = query
            .evaluate(&doc)
            .unwrap()
            .iter()
            .map(|e| e.attr("host").unwrap())
            .collect();
        assert_eq!(hosts, vec!["a.com", "web", "b.com"]);
    }

    #[test]
    fn test_select_wrong_root_is_empty() {
        let doc = doc();
        let query = Query::path(&["report", "data"]);
        assert!(query.evaluate(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_contains_literal() {
        let doc = doc();
        let query = Query::parse(
            "/dashboardreport/data/admdashlet/adm/agent[contains(@name, 'Third Party Content')]",
        )
        .unwrap();
        assert_eq!(query.evaluate(&doc).unwrap().len(), 2);
    }

    #[test]
    fn test_contains_bound_variables() {
        let doc = doc();
        let mut bindings = Bindings::new();
        bindings
            .bind("myVar", "a.com")
            .bind("thirdParty", "Third Party Content@a.com");

        let times = Query::parse("/dashboardreport/data/admdashlet/adm/agent[contains(@host, $myVar)]")
            .unwrap()
            .select(&doc, &bindings)
            .unwrap();
        assert_eq!(times.len(), 1);

        let counts =
            Query::parse("/dashboardreport/data/admdashlet/adm_links/agent[contains(@to, $thirdParty)]")
                .unwrap()
                .select(&doc, &bindings)
                .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].attr("remoting_count"), Some("3"));
    }

    #[test]
    fn test_unbound_variable_is_an_error() {
        let doc = doc();
        let query = Query::parse("/dashboardreport[contains(@x, $missing)]").unwrap();
        let err = query.evaluate(&doc).unwrap_err();
        assert!(matches!(err, TimerError::UnboundVariable(name) if name == "missing"));
    }

    #[test]
    fn test_empty_needle_matches_elements_with_attribute() {
        let doc = doc();
        let query = Query::path(&["dashboardreport", "data", "admdashlet", "adm", "agent"])
            .contains("response_avg", Needle::Literal(String::new()));
        assert_eq!(query.evaluate(&doc).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_and_display() {
        let text = "/a/b_c/d-e[contains(@to, \"x'y\")]";
        let query = Query::parse(text).unwrap();
        assert_eq!(query.segments(), ["a", "b_c", "d-e"]);
        assert_eq!(
            query.predicate(),
            Some(&Predicate::Contains {
                attribute: "to".into(),
                needle: Needle::Literal("x'y".into()),
            })
        );
        assert_eq!(query.to_string(), text);

        let spaced = Query::parse("/a[ contains( @host , $v ) ]").unwrap();
        assert_eq!(spaced.to_string(), "/a[contains(@host, $v)]");
    }

    #[test]
    fn test_parse_errors() {
        let bad = [
            "",
            "a/b",
            "/",
            "/a/",
            "/a[",
            "/a[starts-with(@x, 'y')]",
            "/a[contains(x, 'y')]",
            "/a[contains(@x 'y')]",
            "/a[contains(@x, 'y)]",
            "/a[contains(@x, y)]",
            "/a[contains(@x, 'y')",
            "/a[contains(@x, 'y')] extra",
        ];
        for input in bad {
            assert!(
                matches!(Query::parse(input), Err(TimerError::Query(_))),
                "expected query error for {input:?}"
            );
        }
    }
}
