//! Parse and serialize [`Document`] trees with quick-xml.
//!
//! This is the only place textual XML exists; escaping, encoding and entity
//! handling are delegated entirely to quick-xml.

use std::io::{BufRead, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::{Document, NodeId, NodeKind};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml parse error: {0}")]
    Parse(String),
    #[error("xml write error: {0}")]
    Write(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("unexpected closing tag </{0}>")]
    UnexpectedClose(String),
}

/// Parse a byte stream into a document, keeping comments and whitespace
/// text nodes so incidental content survives a round trip.
pub fn parse_document<R: BufRead>(reader: R) -> Result<Document, XmlError> {
    let mut xml = Reader::from_reader(reader);
    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = xml
            .read_event_into(&mut buf)
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        match event {
            Event::Start(start) => {
                let el = open_element(&mut doc, &stack, &start)?;
                stack.push(el);
            }
            Event::Empty(start) => {
                open_element(&mut doc, &stack, &start)?;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                match stack.pop() {
                    Some(_) => {}
                    None => return Err(XmlError::UnexpectedClose(name)),
                }
            }
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| XmlError::Parse(e.to_string()))?;
                if let Some(&parent) = stack.last() {
                    let t = doc.create_text(&content);
                    doc.append_child(parent, t);
                }
            }
            Event::CData(data) => {
                let content = String::from_utf8_lossy(&data).into_owned();
                if let Some(&parent) = stack.last() {
                    let t = doc.create_text(&content);
                    doc.append_child(parent, t);
                }
            }
            Event::Comment(text) => {
                let content = String::from_utf8_lossy(&text).into_owned();
                if let Some(&parent) = stack.last() {
                    let c = doc.create_comment(&content);
                    doc.append_child(parent, c);
                }
            }
            Event::DocType(text) => {
                doc.set_doctype(Some(String::from_utf8_lossy(&text).trim().to_string()));
            }
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
        buf.clear();
    }

    if doc.root().is_none() {
        return Err(XmlError::NoRoot);
    }
    Ok(doc)
}

fn open_element(
    doc: &mut Document,
    stack: &[NodeId],
    start: &BytesStart<'_>,
) -> Result<NodeId, XmlError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let el = doc.create_element(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?;
        doc.set_attribute(el, &key, Some(&value));
    }
    match stack.last() {
        Some(&parent) => doc.append_child(parent, el),
        None => doc.set_root(el),
    }
    Ok(el)
}

/// Serialize a document, emitting an XML declaration and the stored doctype.
pub fn write_document<W: Write>(doc: &Document, writer: W) -> Result<(), XmlError> {
    let root = doc.root().ok_or(XmlError::NoRoot)?;
    let mut xml = Writer::new(writer);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    xml.write_event(Event::Text(BytesText::from_escaped("\n")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    if let Some(doctype) = doc.doctype() {
        xml.write_event(Event::DocType(BytesText::from_escaped(doctype)))
            .map_err(|e| XmlError::Write(e.to_string()))?;
        xml.write_event(Event::Text(BytesText::from_escaped("\n")))
            .map_err(|e| XmlError::Write(e.to_string()))?;
    }
    write_node(doc, root, &mut xml)?;
    xml.write_event(Event::Text(BytesText::from_escaped("\n")))
        .map_err(|e| XmlError::Write(e.to_string()))?;
    Ok(())
}

fn write_node<W: Write>(doc: &Document, id: NodeId, xml: &mut Writer<W>) -> Result<(), XmlError> {
    match doc.kind(id) {
        NodeKind::Element { name, attrs } => {
            let mut start = BytesStart::new(name.as_str());
            for (k, v) in attrs {
                start.push_attribute((k.as_str(), v.as_str()));
            }
            let children = doc.children(id);
            if children.is_empty() {
                xml.write_event(Event::Empty(start))
                    .map_err(|e| XmlError::Write(e.to_string()))?;
            } else {
                xml.write_event(Event::Start(start))
                    .map_err(|e| XmlError::Write(e.to_string()))?;
                for &child in children {
                    write_node(doc, child, xml)?;
                }
                xml.write_event(Event::End(BytesEnd::new(name.as_str())))
                    .map_err(|e| XmlError::Write(e.to_string()))?;
            }
        }
        NodeKind::Text(text) => {
            xml.write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| XmlError::Write(e.to_string()))?;
        }
        NodeKind::Comment(text) => {
            xml.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(|e| XmlError::Write(e.to_string()))?;
        }
    }
    Ok(())
}
