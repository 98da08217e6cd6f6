//! Minimal element tree for settings documents.
//!
//! Settings definitions and user values are small XML files, so the whole
//! document is read into an [`XmlElement`] tree with `quick-xml` and written
//! back out with four-space indentation.

use std::{fs, path::Path};

use quick_xml::{
    Reader,
    escape::escape,
    events::{BytesStart, Event},
};

use crate::error::{Error, Result};

const INDENT: &str = "    ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Sets an attribute, replacing an existing one with the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    fn from_start(start: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(|e| e.to_string())?;
            element.attributes.push((key, value.into_owned()));
        }
        Ok(element)
    }

    /// Indentation around child elements is not content. Text of leaf
    /// elements is kept verbatim.
    fn finish(mut self) -> Self {
        if !self.children.is_empty() {
            let trimmed = self.text.trim();
            if trimmed.len() != self.text.len() {
                self.text = trimmed.to_owned();
            }
        }
        self
    }

    fn write_to(&self, out: &mut String, depth: usize) {
        let indent = INDENT.repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() {
            if self.text.is_empty() {
                out.push_str(" />\n");
            } else {
                out.push('>');
                out.push_str(&escape(self.text.as_str()));
                self.write_end(out);
            }
            return;
        }

        out.push_str(">\n");
        if !self.text.is_empty() {
            out.push_str(&indent);
            out.push_str(INDENT);
            out.push_str(&escape(self.text.as_str()));
            out.push('\n');
        }
        for child in &self.children {
            child.write_to(out, depth + 1);
        }
        out.push_str(&indent);
        self.write_end(out);
    }

    fn write_end(&self, out: &mut String) {
        out.push_str("</");
        out.push_str(&self.name);
        out.push_str(">\n");
    }
}

/// A parsed XML document with exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);

        let mut open: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| xml_error(&reader, e.to_string()))?;
            match event {
                Event::Start(ref e) => {
                    if open.is_empty() && root.is_some() {
                        return Err(xml_error(&reader, "multiple root elements"));
                    }
                    let element =
                        XmlElement::from_start(e).map_err(|message| xml_error(&reader, message))?;
                    open.push(element);
                }
                Event::Empty(ref e) => {
                    let element =
                        XmlElement::from_start(e).map_err(|message| xml_error(&reader, message))?;
                    attach(&mut open, &mut root, element, &reader)?;
                }
                Event::End(_) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| xml_error(&reader, "unexpected closing tag"))?
                        .finish();
                    attach(&mut open, &mut root, element, &reader)?;
                }
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|err| xml_error(&reader, err.to_string()))?;
                    push_text(&mut open, &text, &reader)?;
                }
                Event::CData(ref e) => {
                    let text = std::str::from_utf8(e.as_ref())
                        .map_err(|err| xml_error(&reader, err.to_string()))?;
                    push_text(&mut open, text, &reader)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(xml_error(
                &reader,
                format!("unclosed element <{}>", unclosed.name),
            ));
        }

        root.map(Self::new)
            .ok_or_else(|| xml_error(&reader, "document has no root element"))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Writes the document atomically, creating missing parent directories.
    pub fn save_file(&self, path: &Path) -> Result<()> {
        addon_fs::create_dirs_then_write(path, self.to_xml_string()).map_err(|source| {
            Error::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.root.write_to(&mut out, 0);
        out
    }
}

fn attach(
    open: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    reader: &Reader<&[u8]>,
) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_error(reader, "multiple root elements")),
    }
    Ok(())
}

fn push_text(open: &mut [XmlElement], text: &str, reader: &Reader<&[u8]>) -> Result<()> {
    match open.last_mut() {
        Some(element) => element.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => return Err(xml_error(reader, "text outside of the root element")),
    }
    Ok(())
}

fn xml_error(reader: &Reader<&[u8]>, message: impl Into<String>) -> Error {
    Error::Xml {
        position: reader.buffer_position() as u64,
        message: message.into(),
    }
}
