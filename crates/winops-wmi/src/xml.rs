//! Minimal element tree over `quick-xml` for reading WS-Management replies.
//!
//! Namespace prefixes are discarded: WMI providers are inconsistent about
//! them (`p:`, `n:`, `wsen:`, none), and element local names are unique
//! enough within a reply body.

use crate::types::{WmiError, WmiErrorKind, WmiResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub text: String,
    pub nil: bool,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(e: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let nil = e.attributes().flatten().any(|a| {
            a.key.local_name().as_ref() == b"nil" && a.value.as_ref() == b"true"
        });
        Self {
            name,
            nil,
            ..Default::default()
        }
    }

    /// Depth-first search for the first element with the given local name.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Leaf children as a property map. Nil elements map to empty strings.
    pub fn properties(&self) -> HashMap<String, String> {
        self.children
            .iter()
            .filter(|c| c.children.is_empty())
            .map(|c| {
                let value = if c.nil { String::new() } else { c.text.clone() };
                (c.name.clone(), value)
            })
            .collect()
    }
}

/// Parse a complete document and return its root element.
pub fn parse_document(xml: &str) -> WmiResult<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(XmlNode::from_start(&e)),
            Ok(Event::Empty(e)) => {
                let node = XmlNode::from_start(&e);
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| WmiError::new(WmiErrorKind::Parse, e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let node = stack.pop().ok_or_else(|| {
                    WmiError::new(WmiErrorKind::Parse, "Unbalanced closing tag in WMI response")
                })?;
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(WmiError::new(
                    WmiErrorKind::Parse,
                    format!("Malformed XML at byte {}: {}", reader.buffer_position(), e),
                ))
            }
        }
    }

    if !stack.is_empty() {
        return Err(WmiError::new(WmiErrorKind::Parse, "Truncated WMI response"));
    }
    root.ok_or_else(|| WmiError::new(WmiErrorKind::Parse, "Empty WMI response"))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => *root = Some(node),
    }
}

/// Escape special characters for XML content.
pub fn xml_escape(s: &str) -> String {
    quick_xml::escape::escape(s).into_owned()
}
