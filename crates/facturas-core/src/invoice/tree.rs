//! Attribute-preserving element tree and typed path lookups.
//!
//! The tree keeps qualified names (`cfdi:Emisor`) but lookups match on the
//! local part, so documents using a different namespace prefix still
//! resolve. Every lookup step returns a [`FieldError`] that tells a missing
//! node apart from a node that is present but unusable.

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::error::ParseError;

/// One XML element with its attributes, children and text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written in the document.
    pub name: String,
    /// Attributes in document order, keys as written.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Concatenated, unescaped text content.
    pub text: String,
}

impl Element {
    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute value by local name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local(k) == key)
            .map(|(_, v)| v.as_str())
    }

    /// First child with the given local name.
    pub fn first_child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == name)
    }
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Why a path lookup produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// A node or attribute along the path does not exist.
    #[error("{path} is absent")]
    Absent { path: String },

    /// The value exists but cannot be used.
    #[error("{path} has unusable value {value:?}: {reason}")]
    Malformed {
        path: String,
        value: String,
        reason: String,
    },
}

/// Result of one lookup step.
pub type Lookup<T> = std::result::Result<T, FieldError>;

/// An element together with the path used to reach it.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    element: &'a Element,
    path: String,
}

impl<'a> Node<'a> {
    /// Start a lookup at the document root.
    pub fn root(element: &'a Element) -> Self {
        Self {
            element,
            path: format!("/{}", element.local_name()),
        }
    }

    /// Step into the first child named `name`.
    pub fn child(&self, name: &str) -> Lookup<Node<'a>> {
        let path = format!("{}/{}", self.path, name);
        match self.element.first_child(name) {
            Some(element) => Ok(Node { element, path }),
            None => Err(FieldError::Absent { path }),
        }
    }

    /// Read an attribute.
    pub fn attr(&self, key: &str) -> Lookup<&'a str> {
        self.element.attr(key).ok_or_else(|| FieldError::Absent {
            path: format!("{}/@{}", self.path, key),
        })
    }

    /// Read an attribute as a decimal amount.
    pub fn decimal_attr(&self, key: &str) -> Lookup<Decimal> {
        let value = self.attr(key)?;
        Decimal::from_str(value.trim()).map_err(|e| FieldError::Malformed {
            path: format!("{}/@{}", self.path, key),
            value: value.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read the text content; whitespace-only text counts as absent.
    pub fn text(&self) -> Lookup<&'a str> {
        let text = self.element.text.trim();
        if text.is_empty() {
            Err(FieldError::Absent {
                path: format!("{}/text()", self.path),
            })
        } else {
            Ok(text)
        }
    }
}

/// Parse a whole document into its root element.
pub fn parse_document(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(malformed(reader.error_position(), e)),
        };

        match event {
            Event::Start(start) => {
                let element = open(&start).map_err(|e| malformed(reader.buffer_position(), e))?;
                if stack.is_empty() && root.is_some() {
                    return Err(ParseError::TrailingElement(element.name));
                }
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open(&start).map_err(|e| malformed(reader.buffer_position(), e))?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(malformed(reader.buffer_position(), "unmatched end tag"));
                };
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| malformed(reader.buffer_position(), e))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::Unclosed(open.name));
    }

    root.ok_or(ParseError::NoRoot)
}

fn open(start: &BytesStart<'_>) -> Result<Element, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        name,
        attributes,
        ..Element::default()
    })
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(ParseError::TrailingElement(element.name));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn malformed(position: u64, error: impl ToString) -> ParseError {
    ParseError::Malformed {
        position,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_tree() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
            <a:Root x="1" a:y="&amp;2">
                <a:Child>hello &lt;world&gt;</a:Child>
                <Empty k="v"/>
            </a:Root>"#,
        )
        .unwrap();

        assert_eq!(root.name, "a:Root");
        assert_eq!(root.local_name(), "Root");
        assert_eq!(root.attr("x"), Some("1"));
        assert_eq!(root.attr("y"), Some("&2"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.first_child("Child").unwrap().text, "hello <world>");
        assert_eq!(root.first_child("Empty").unwrap().attr("k"), Some("v"));
    }

    #[test]
    fn test_lookup_distinguishes_absent_and_malformed() {
        let root = parse_document(r#"<R><T Importe="abc" Ok="16.00"/></R>"#).unwrap();
        let node = Node::root(&root);

        assert_eq!(
            node.child("Missing").unwrap_err(),
            FieldError::Absent {
                path: "/R/Missing".to_string()
            }
        );

        let t = node.child("T").unwrap();
        assert_eq!(t.decimal_attr("Ok").unwrap(), Decimal::new(1600, 2));
        assert!(matches!(
            t.decimal_attr("Importe"),
            Err(FieldError::Malformed { .. })
        ));
        assert!(matches!(
            t.decimal_attr("Nope"),
            Err(FieldError::Absent { .. })
        ));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            parse_document("<a><b></a>"),
            Err(ParseError::Malformed { .. })
        ));
        assert!(parse_document("<a><b>").is_err());
        assert_eq!(parse_document("   "), Err(ParseError::NoRoot));
        assert!(matches!(
            parse_document("<a/><b/>"),
            Err(ParseError::TrailingElement(_))
        ));
    }
}
