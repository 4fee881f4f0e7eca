use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// Namespace of the asynchronous API documents.
pub(crate) const ASYNC_NAMESPACE: &str = "http://www.force.com/2009/06/asyncapi/dataload";

/// Text of the first element with the given local name, ignoring namespace prefixes.
pub(crate) fn element_text(xml: &str, local_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut capturing = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                capturing = true;
                text.clear();
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == local_name.as_bytes() => {
                return Some(String::new());
            }
            Ok(Event::Text(t)) if capturing => text.push_str(&t.unescape().ok()?),
            Ok(Event::CData(t)) if capturing => text.push_str(&String::from_utf8_lossy(&t)),
            Ok(Event::End(e)) if capturing && e.local_name().as_ref() == local_name.as_bytes() => {
                return Some(text.trim().to_string());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Returns true if the name can be written as an element name.
pub(crate) fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Streaming writer for small request documents.
pub(crate) struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    pub(crate) fn new() -> Result<Self> {
        let mut builder = Self {
            writer: Writer::new(Vec::new()),
        };
        builder.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(builder)
    }

    /// Open the root element in the async API namespace.
    pub(crate) fn root(mut self, name: &str) -> Result<Self> {
        let start = BytesStart::new(name).with_attributes([("xmlns", ASYNC_NAMESPACE)]);
        self.write(Event::Start(start))?;
        Ok(self)
    }

    pub(crate) fn start(&mut self, name: &str) -> Result<()> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// `<name>value</name>` with `value` escaped.
    pub(crate) fn element(&mut self, name: &str, value: &str) -> Result<()> {
        self.start(name)?;
        if !value.is_empty() {
            self.write(Event::Text(BytesText::new(value)))?;
        }
        self.end(name)
    }

    pub(crate) fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| Error::malformed(format!("Generated XML is not UTF-8: {}", e)))
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::malformed(format!("Failed to write XML: {}", e)))
    }
}
