//! In-memory element tree for a fetched report.
//!
//! Elements live in a flat arena in document order. Text, comments and
//! processing instructions are dropped; only tag names, attributes and
//! nesting survive parsing.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::types::{TimerError, TimerResult};

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<usize>,
}

/// A parsed report. Immutable once built.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    elements: Vec<Element>,
}

impl ReportDocument {
    /// Parse a report from raw bytes.
    ///
    /// Any well-formedness problem fails the whole parse; there is no
    /// partial document.
    pub fn parse(bytes: &[u8]) -> TimerResult<Self> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();

        loop {
            let position = reader.buffer_position();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let index = push_element(&mut elements, &open, &e, position)?;
                    open.push(index);
                }
                Ok(Event::Empty(e)) => {
                    push_element(&mut elements, &open, &e, position)?;
                }
                Ok(Event::End(e)) => {
                    if open.pop().is_none() {
                        return Err(TimerError::Parse(format!(
                            "unexpected closing tag </{}> at byte {position}",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                }
                Ok(Event::Text(e)) => {
                    if open.is_empty() && !e.iter().all(u8::is_ascii_whitespace) {
                        return Err(TimerError::Parse(format!(
                            "text outside the root element at byte {position}"
                        )));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(TimerError::Parse(format!("at byte {position}: {e}")));
                }
                _ => {}
            }
            buf.clear();
        }

        if let Some(&index) = open.last() {
            return Err(TimerError::Parse(format!(
                "unclosed element <{}> at end of input",
                elements[index].name
            )));
        }
        if elements.is_empty() {
            return Err(TimerError::Parse("document has no root element".into()));
        }

        tracing::debug!("Parsed report with {} elements", elements.len());
        Ok(Self { elements })
    }

    /// Parse a report previously saved to disk.
    pub fn from_file(path: &Path) -> TimerResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// The document element.
    pub fn root(&self) -> ElementRef<'_> {
        ElementRef {
            doc: self,
            index: 0,
        }
    }

    /// Total number of elements in the tree.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn push_element(
    elements: &mut Vec<Element>,
    open: &[usize],
    start: &BytesStart<'_>,
    position: u64,
) -> TimerResult<usize> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let parent = open.last().copied();
    if parent.is_none() && !elements.is_empty() {
        return Err(TimerError::Parse(format!(
            "second root element <{name}> at byte {position}"
        )));
    }

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            TimerError::Parse(format!("bad attribute on <{name}> at byte {position}: {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| {
                TimerError::Parse(format!(
                    "bad value for {key} on <{name}> at byte {position}: {e}"
                ))
            })?
            .into_owned();
        attributes.push((key, value));
    }

    let index = elements.len();
    elements.push(Element {
        name,
        attributes,
        children: Vec::new(),
    });
    if let Some(parent) = parent {
        elements[parent].children.push(index);
    }
    Ok(index)
}

/// A borrowed handle to one element of a [`ReportDocument`].
#[derive(Clone, Copy)]
pub struct ElementRef<'doc> {
    doc: &'doc ReportDocument,
    index: usize,
}

impl<'doc> ElementRef<'doc> {
    fn element(&self) -> &'doc Element {
        &self.doc.elements[self.index]
    }

    pub fn name(&self) -> &'doc str {
        &self.element().name
    }

    /// Value of the attribute with exactly this name.
    pub fn attr(&self, name: &str) -> Option<&'doc str> {
        self.element()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All attributes in source order.
    pub fn attributes(&self) -> impl Iterator<Item = (&'doc str, &'doc str)> + 'doc {
        self.element()
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = ElementRef<'doc>> + 'doc {
        let doc = self.doc;
        self.element()
            .children
            .iter()
            .map(move |&index| ElementRef { doc, index })
    }

    /// Child elements with the given tag name.
    pub fn children_named<'n>(
        &self,
        name: &'n str,
    ) -> impl Iterator<Item = ElementRef<'doc>> + 'n
    where
        'doc: 'n,
    {
        self.children().filter(move |child| child.name() == name)
    }
}

impl std::fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementRef")
            .field("name", &self.name())
            .field("attributes", &self.element().attributes)
            .finish()
    }
}

impl PartialEq for ElementRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.index == other.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <dashboardreport name="flow">
          <data>
            <admdashlet>
              <adm>
                <agent name="Third Party Content" host="a.com" response_avg="12.5"/>
                <agent name="Frontend" host="web-1"></agent>
              </adm>
            </admdashlet>
          </data>
        </dashboardreport>"#;

        let doc = ReportDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.len(), 6);

        let root = doc.root();
        assert_eq!(root.name(), "dashboardreport");
        assert_eq!(root.attr("name"), Some("flow"));

        let adm = root
            .children_named("data")
            .next()
            .and_then(|d| d.children_named("admdashlet").next())
            .and_then(|d| d.children_named("adm").next())
            .unwrap();
        let agents: Vec<_> = adm.children_named("agent").collect();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].attr("host"), Some("a.com"));
        assert_eq!(agents[0].attr("response_avg"), Some("12.5"));
        assert_eq!(agents[0].attr("response_sum"), None);
        assert_eq!(agents[1].attr("name"), Some("Frontend"));
    }

    #[test]
    fn test_attribute_values_are_unescaped() {
        let xml = r#"<root><agent to="Third Party Content@a.com" note="&quot;x&quot; &amp; y"/></root>"#;
        let doc = ReportDocument::parse(xml.as_bytes()).unwrap();
        let agent = doc.root().children().next().unwrap();
        assert_eq!(agent.attr("note"), Some("\"x\" & y"));
        let names: Vec<_> = agent.attributes().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["to", "note"]);
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        let bad = [
            "",
            "   ",
            "not xml at all",
            "<root>",
            "<root><a></b></root>",
            "</root>",
            "<root/><other/>",
            "<root a=\"1\" a=\"2\"/>",
            "<root a=\"&bogus;\"/>",
        ];
        for input in bad {
            assert!(
                ReportDocument::parse(input.as_bytes()).is_err(),
                "expected parse failure for {input:?}"
            );
        }
    }

    #[test]
    fn test_comments_and_text_are_ignored() {
        let xml = "<!-- generated --><root>text<child/><!-- c --></root>";
        let doc = ReportDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.root().children().count(), 1);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xml");
        std::fs::write(&path, "<dashboardreport><data/></dashboardreport>").unwrap();
        let doc = ReportDocument::from_file(&path).unwrap();
        assert_eq!(doc.root().name(), "dashboardreport");

        let missing = ReportDocument::from_file(&dir.path().join("missing.xml"));
        assert!(matches!(missing, Err(TimerError::Io(_))));
    }

    /// The parser must never panic on arbitrary input.
    #[test]
    fn test_fuzz_parser() {
        let long = "<a>".repeat(5000);
        let fuzz_inputs = [
            "<",
            "<<<>>>",
            "<a b=>",
            "<a b='1",
            "\x00\x01\x02\x03",
            "<?xml version=\"1.0\"?>",
            "<a><![CDATA[x]]></a>",
            "<a/>trailing",
            long.as_str(),
        ];
        for input in fuzz_inputs {
            let _ = ReportDocument::parse(input.as_bytes());
        }
    }
}
