// vedur_exporter - Prometheus metrics exporter for xmlweather.vedur.is
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! Decoding of XML responses into a generic tree.
//!
//! Documents use a "compact" layout: every element becomes a key in the map of its parent
//! with a map as its value. Text content of an element is stored under `_text`, CDATA
//! under `_cdata` and attributes under an `_attributes` map. When an element has several
//! children with the same name (or several runs of text), they are collapsed into a list
//! under that name. Values are looked up with dotted paths like `observations.station.T._text`.

use std::error;
use std::fmt;
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};

pub const TEXT_KEY: &str = "_text";
pub const CDATA_KEY: &str = "_cdata";
pub const ATTRIBUTES_KEY: &str = "_attributes";

const STATION_ATTRIBUTES: &str = "observations.station._attributes";
const STATION_ERROR: &str = "observations.station.err";

#[derive(Debug)]
pub enum DocumentError {
    Parse(xml::reader::Error),
    Empty,
    Missing(&'static str),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "malformed XML: {}", e),
            Self::Empty => write!(f, "no root element"),
            Self::Missing(path) => write!(f, "missing expected field {}", path),
        }
    }
}

impl error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Empty | Self::Missing(_) => None,
        }
    }
}

/// A single value in a decoded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    List(Vec<Node>),
    /// Keys in the order they first appeared in the XML, except `_attributes` which
    /// always comes first. Attributes keep their document order.
    Map(Vec<(String, Node)>),
}

impl Node {
    /// Get the child of this node named `key`. Lists are indexed by numeric keys.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            Self::Text(_) => None,
        }
    }

    /// Walk each `.` separated segment of `path`, stopping at the first one that
    /// doesn't exist.
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        path.split('.').try_fold(self, |node, key| node.get(key))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Status of the station an observation document was generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid { id: Option<String> },
    Invalid { message: String },
}

/// XML document decoded into a tree of `Node`s, rooted at a map holding the root element.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Node,
}

impl Document {
    /// Decode an XML document, failing if it is not well-formed.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        // Open elements, innermost last, each with the entries collected so far
        let mut open: Vec<(String, Vec<(String, Node)>)> = Vec::new();
        let mut root = None;

        for event in EventReader::new(xml.as_bytes()) {
            match event.map_err(DocumentError::Parse)? {
                XmlEvent::StartElement { name, attributes, .. } => {
                    let mut entries = Vec::new();
                    if !attributes.is_empty() {
                        let attributes = attributes
                            .into_iter()
                            .map(|a| (qualified_name(&a.name), Node::Text(a.value)))
                            .collect();
                        entries.push((ATTRIBUTES_KEY.to_owned(), Node::Map(attributes)));
                    }

                    open.push((qualified_name(&name), entries));
                }
                XmlEvent::EndElement { .. } => {
                    if let Some((name, entries)) = open.pop() {
                        match open.last_mut() {
                            Some((_, parent)) => insert(parent, &name, Node::Map(entries)),
                            None => root = Some(Node::Map(vec![(name, Node::Map(entries))])),
                        }
                    }
                }
                XmlEvent::Characters(text) => {
                    if let Some((_, entries)) = open.last_mut() {
                        insert(entries, TEXT_KEY, Node::Text(text));
                    }
                }
                XmlEvent::CData(text) => {
                    if let Some((_, entries)) = open.last_mut() {
                        insert(entries, CDATA_KEY, Node::Text(text));
                    }
                }
                _ => {}
            }
        }

        root.map(|root| Document { root }).ok_or(DocumentError::Empty)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn lookup(&self, path: &str) -> Option<&Node> {
        self.root.lookup(path)
    }

    /// Determine if the API marked the station in this document as valid.
    ///
    /// A station is valid only when its `valid` attribute is exactly `"1"`. For invalid
    /// stations, the text of the `err` element is returned as the message. Documents that
    /// don't have the expected station attributes (or lack an `err` element when invalid)
    /// result in an error.
    pub fn validity(&self) -> Result<Validity, DocumentError> {
        let attributes = self
            .lookup(STATION_ATTRIBUTES)
            .ok_or(DocumentError::Missing(STATION_ATTRIBUTES))?;

        if attributes.get("valid").and_then(Node::as_text) == Some("1") {
            let id = attributes.get("id").and_then(Node::as_text).map(str::to_owned);
            return Ok(Validity::Valid { id });
        }

        let err = self.lookup(STATION_ERROR).ok_or(DocumentError::Missing(STATION_ERROR))?;
        let message = err.get(TEXT_KEY).and_then(Node::as_text).unwrap_or_default();
        Ok(Validity::Invalid {
            message: message.to_owned(),
        })
    }
}

fn qualified_name(name: &OwnedName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local_name),
        None => name.local_name.clone(),
    }
}

fn insert(entries: &mut Vec<(String, Node)>, key: &str, value: Node) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some((_, Node::List(items))) => items.push(value),
        Some((_, existing)) => {
            let first = std::mem::replace(existing, Node::List(Vec::with_capacity(2)));
            *existing = Node::List(vec![first, value]);
        }
        None => entries.push((key.to_owned(), value)),
    }
}
