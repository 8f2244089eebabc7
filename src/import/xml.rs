//! XML import
//!
//! Maps a document onto the tree one element per node:
//! - elements become `xml:element` nodes named by their qualified name
//! - attributes become string properties, in document order
//! - text, CDATA and comments inside the document element become
//!   `xml:text`, `xml:cdata` and `xml:comment` nodes holding `xml:characters`
//! - the declaration and doctype are stored on the model node
//!
//! Whitespace-only text is dropped, as are comments and processing
//! instructions outside the document element. Malformed documents (bad
//! nesting, several roots, text outside the root, unclosed elements) fail.

use super::{ImportError, Importer, decode_utf8};
use crate::registry::ArtifactProbe;
use crate::storage::{NodeId, Session};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

pub const ELEMENT_TYPE: &str = "xml:element";
pub const TEXT_NODE: &str = "xml:text";
pub const CDATA_NODE: &str = "xml:cdata";
pub const COMMENT_NODE: &str = "xml:comment";
pub const CHARACTERS: &str = "xml:characters";
pub const VERSION: &str = "xml:version";
pub const ENCODING: &str = "xml:encoding";
pub const STANDALONE: &str = "xml:standalone";
pub const DOCTYPE: &str = "xml:doctype";

/// XML Importer
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlImporter;

impl XmlImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for XmlImporter {
    fn name(&self) -> &str {
        "xml"
    }

    fn applicable(&self, probe: &ArtifactProbe) -> bool {
        probe.looks_like_xml()
            || probe
                .mime_type
                .as_deref()
                .is_some_and(|m| m.ends_with("/xml") || m.ends_with("+xml"))
    }

    fn import_into(
        &self,
        content: &[u8],
        session: &mut Session<'_>,
        target: NodeId,
    ) -> Result<(), ImportError> {
        let text = decode_utf8(content)?;
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut open: Vec<(NodeId, String)> = Vec::new();
        let mut seen_root = false;
        let mut nodes = 0usize;

        loop {
            let event = reader.read_event().map_err(|e| {
                ImportError::Parse(format!(
                    "XML parsing error at position {}: {}",
                    reader.error_position(),
                    e
                ))
            })?;
            let position = reader.buffer_position();
            let parent = open.last().map(|(id, _)| *id);

            match event {
                Event::Decl(decl) => {
                    let version = decl
                        .version()
                        .map_err(|e| ImportError::Parse(format!("invalid XML declaration: {}", e)))?;
                    session.set_property(target, VERSION, utf8(&version, position)?)?;
                    if let Some(encoding) = decl.encoding() {
                        let encoding = encoding
                            .map_err(|e| ImportError::Parse(format!("invalid XML declaration: {}", e)))?;
                        session.set_property(target, ENCODING, utf8(&encoding, position)?)?;
                    }
                    if let Some(standalone) = decl.standalone() {
                        let standalone = standalone
                            .map_err(|e| ImportError::Parse(format!("invalid XML declaration: {}", e)))?;
                        session.set_property(target, STANDALONE, utf8(&standalone, position)?)?;
                    }
                }
                Event::DocType(doctype) => {
                    if seen_root {
                        return Err(ImportError::Parse(format!(
                            "doctype after the document element at position {}",
                            position
                        )));
                    }
                    let value = utf8(&doctype, position)?.trim().to_string();
                    session.set_property(target, DOCTYPE, value)?;
                }
                Event::Start(start) => {
                    let name = element_name(&start, position)?;
                    let node = open_element(session, target, parent, &mut seen_root, &start, &name, position)?;
                    open.push((node, name));
                    nodes += 1;
                }
                Event::Empty(start) => {
                    let name = element_name(&start, position)?;
                    open_element(session, target, parent, &mut seen_root, &start, &name, position)?;
                    nodes += 1;
                }
                Event::End(end) => {
                    let name = utf8(end.name().as_ref(), position)?.to_string();
                    match open.pop() {
                        Some((_, expected)) if expected == name => {}
                        Some((_, expected)) => {
                            return Err(ImportError::Parse(format!(
                                "expected </{}>, found </{}> at position {}",
                                expected, name, position
                            )));
                        }
                        None => {
                            return Err(ImportError::Parse(format!(
                                "unexpected </{}> at position {}",
                                name, position
                            )));
                        }
                    }
                }
                Event::Text(text) => {
                    let value = text.unescape().map_err(|e| {
                        ImportError::Parse(format!("invalid text at position {}: {}", position, e))
                    })?;
                    if value.trim().is_empty() {
                        continue;
                    }
                    let Some(parent) = parent else {
                        return Err(ImportError::Parse(format!(
                            "text outside the document element at position {}",
                            position
                        )));
                    };
                    add_characters(session, parent, TEXT_NODE, &value)?;
                    nodes += 1;
                }
                Event::CData(cdata) => {
                    let Some(parent) = parent else {
                        return Err(ImportError::Parse(format!(
                            "CDATA outside the document element at position {}",
                            position
                        )));
                    };
                    let value = utf8(&cdata, position)?.to_string();
                    add_characters(session, parent, CDATA_NODE, &value)?;
                    nodes += 1;
                }
                Event::Comment(comment) => {
                    if let Some(parent) = parent {
                        let value = utf8(&comment, position)?.to_string();
                        add_characters(session, parent, COMMENT_NODE, &value)?;
                        nodes += 1;
                    }
                }
                Event::PI(_) => {}
                Event::Eof => break,
            }
        }

        if let Some((_, name)) = open.last() {
            return Err(ImportError::Parse(format!("element <{}> is never closed", name)));
        }
        if !seen_root {
            return Err(ImportError::Parse("document has no root element".to_string()));
        }
        debug!(nodes, "Imported XML document");
        Ok(())
    }
}

fn utf8(bytes: &[u8], position: u64) -> Result<&str, ImportError> {
    std::str::from_utf8(bytes)
        .map_err(|e| ImportError::Parse(format!("invalid UTF-8 at position {}: {}", position, e)))
}

fn element_name(start: &BytesStart<'_>, position: u64) -> Result<String, ImportError> {
    Ok(utf8(start.name().as_ref(), position)?.to_string())
}

fn open_element(
    session: &mut Session<'_>,
    target: NodeId,
    parent: Option<NodeId>,
    seen_root: &mut bool,
    start: &BytesStart<'_>,
    name: &str,
    position: u64,
) -> Result<NodeId, ImportError> {
    let parent = match parent {
        Some(parent) => parent,
        None if *seen_root => {
            return Err(ImportError::Parse(format!(
                "second root element <{}> at position {}",
                name, position
            )));
        }
        None => {
            *seen_root = true;
            target
        }
    };

    let node = session.add_child(parent, name, ELEMENT_TYPE)?;
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            ImportError::Parse(format!("invalid attribute on <{}>: {}", name, e))
        })?;
        let key = utf8(attribute.key.as_ref(), position)?.to_string();
        let value = attribute.unescape_value().map_err(|e| {
            ImportError::Parse(format!("invalid value of {}@{}: {}", name, key, e))
        })?;
        session.set_property(node, &key, value.as_ref())?;
    }
    Ok(node)
}

fn add_characters(
    session: &mut Session<'_>,
    parent: NodeId,
    kind: &str,
    value: &str,
) -> Result<(), ImportError> {
    let node = session.add_child(parent, kind, kind)?;
    session.set_property(node, CHARACTERS, value)?;
    Ok(())
}
