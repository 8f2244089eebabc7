//! XML export
//!
//! Inverse of the XML importer: writes the declaration, the doctype and the
//! element tree. Elements without children are written as empty tags.

use super::{ExportError, Exporter};
use crate::import::xml::{
    CDATA_NODE, CHARACTERS, COMMENT_NODE, DOCTYPE, ELEMENT_TYPE, ENCODING, STANDALONE, TEXT_NODE,
    VERSION,
};
use crate::models::{Model, ModelObject, PropertyValue};
use crate::storage::Session;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Write;

/// XML Exporter
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlExporter;

impl XmlExporter {
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for XmlExporter {
    fn name(&self) -> &str {
        "xml"
    }

    fn metamodel_id(&self) -> &str {
        "xml"
    }

    fn supports(&self, mime_type: &str) -> bool {
        matches!(mime_type, "application/xml" | "text/xml")
    }

    fn execute(
        &self,
        session: &Session<'_>,
        model: &Model,
        out: &mut dyn Write,
    ) -> Result<(), ExportError> {
        let tree = model.tree(session)?;
        let text = |name: &str| tree.property(name).map(PropertyValue::to_string);
        let version = text(VERSION).unwrap_or_else(|| "1.0".to_string());
        let encoding = text(ENCODING).unwrap_or_else(|| "UTF-8".to_string());
        let standalone = text(STANDALONE);

        let mut writer = Writer::new(out);
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new(&version, Some(&encoding), standalone.as_deref())),
        )?;
        writer.get_mut().write_all(b"\n")?;
        if let Some(doctype) = text(DOCTYPE) {
            writer
                .get_mut()
                .write_all(format!("<!DOCTYPE {}>\n", doctype).as_bytes())?;
        }

        let mut roots = tree.content_children().filter(|c| c.primary_type == ELEMENT_TYPE);
        let root = roots.next().ok_or_else(|| {
            ExportError::SerializationError(format!("{} has no document element", model.path))
        })?;
        if roots.next().is_some() {
            return Err(ExportError::SerializationError(format!(
                "{} has more than one document element",
                model.path
            )));
        }
        write_element(&mut writer, root)?;
        writer.get_mut().write_all(b"\n")?;
        Ok(())
    }
}

fn write_event<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<(), ExportError> {
    writer
        .write_event(event)
        .map_err(|e| ExportError::SerializationError(e.to_string()))
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &ModelObject) -> Result<(), ExportError> {
    let mut start = BytesStart::new(element.name.as_str());
    for property in &element.properties {
        let value = property.value.to_string();
        start.push_attribute((property.name.as_str(), value.as_str()));
    }

    let children: Vec<&ModelObject> = element.content_children().collect();
    if children.is_empty() {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    for child in children {
        let characters = child
            .property(CHARACTERS)
            .map(PropertyValue::to_string)
            .unwrap_or_default();
        match child.primary_type.as_str() {
            ELEMENT_TYPE => write_element(writer, child)?,
            TEXT_NODE => write_event(writer, Event::Text(BytesText::new(&characters)))?,
            CDATA_NODE => write_event(writer, Event::CData(BytesCData::new(characters.as_str())))?,
            COMMENT_NODE => {
                write_event(writer, Event::Comment(BytesText::from_escaped(characters.as_str())))?
            }
            _ => {}
        }
    }
    write_event(writer, Event::End(BytesEnd::new(element.name.as_str())))
}
