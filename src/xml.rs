// src/xml.rs

//! Small element tree over quick-xml
//!
//! Manifests and legacy control/body documents are small enough to hold in
//! memory, and the importers navigate them by element name. This module
//! turns a byte buffer into an [`Element`] tree and provides the character
//! decoding and escaping helpers shared by the importers.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;

/// Supported text encodings for legacy content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Ascii,
}

impl TextEncoding {
    /// Look up an encoding by its IANA-style name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Some(Self::Latin1),
            "us-ascii" | "ascii" => Some(Self::Ascii),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Latin1 => "ISO-8859-1",
            TextEncoding::Ascii => "US-ASCII",
        }
    }

    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Ascii => String::from_utf8_lossy(bytes),
            TextEncoding::Latin1 => {
                if bytes.is_ascii() {
                    String::from_utf8_lossy(bytes)
                } else {
                    Cow::Owned(bytes.iter().map(|&b| b as char).collect())
                }
            }
        }
    }
}

/// Decode `bytes` with the named encoding
///
/// Returns the text and whether the encoding name was recognised. Unknown
/// encodings are decoded as lossy UTF-8.
pub fn decode_text(bytes: &[u8], encoding: &str) -> (String, bool) {
    match TextEncoding::from_name(encoding) {
        Some(enc) => (enc.decode(bytes).into_owned(), true),
        None => (String::from_utf8_lossy(bytes).into_owned(), false),
    }
}

/// Encoding named in the `<?xml ... encoding="..."?>` prolog, if any
pub fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let prolog = head.strip_prefix('\u{feff}').unwrap_or(&head);
    let prolog = prolog.trim_start();
    if !prolog.starts_with("<?xml") {
        return None;
    }
    let end = prolog.find("?>")?;
    let decl = &prolog[..end];
    let pos = decl.find("encoding")?;
    let rest = decl[pos + "encoding".len()..].trim_start().strip_prefix('=')?;
    let rest = rest.trim_start();
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let value = &rest[1..];
    let close = value.find(quote)?;
    Some(value[..close].to_string())
}

fn decode_document(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    if let Some(name) = declared_encoding(bytes)
        && let Some(enc) = TextEncoding::from_name(&name)
        && enc == TextEncoding::Latin1
    {
        return enc.decode(bytes).into_owned();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// An XML element with its attributes, child elements and direct text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated text and CDATA directly inside this element
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a complete document and return its root element
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = decode_document(bytes);
        Self::parse_str(&text)
    }

    pub fn parse_str(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => stack.push(Self::from_start(e)?),
                Event::Empty(ref e) => {
                    let element = Self::from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        Error::MalformedXml("unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref e) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(e) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::MalformedXml(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        root.ok_or_else(|| Error::MalformedXml("document has no root element".to_string()))
    }

    fn from_start(start: &BytesStart) -> Result<Self> {
        let mut element = Self::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::MalformedXml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first direct child with the given name
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|c| c.text.trim().to_string())
    }

    /// All descendants with the given name, depth first in document order
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// Serialize this element back to markup
    ///
    /// Text is emitted before the children, so mixed content loses its
    /// original interleaving.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    /// Markup of the text and children, without this element's own tags
    pub fn inner_xml(&self) -> String {
        let mut out = escape(&self.text).into_owned();
        for child in &self.children {
            child.write_xml(&mut out);
        }
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", key, escape(value)));
        }
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&self.inner_xml());
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// First descendant with the given name
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(Error::MalformedXml(
            "document has more than one root element".to_string(),
        ));
    }
    Ok(())
}

/// Escape text for use in element content or attribute values
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Wrap text in a CDATA section, splitting any embedded `]]>`
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let doc = br#"<?xml version="1.0"?>
<export>
  <info><export_version>4</export_version></info>
  <files>
    <file><destination>a</destination><type>folder</type></file>
    <file><destination>a/b.txt</destination><type>plain</type></file>
  </files>
</export>"#;
        let root = Element::parse(doc).unwrap();
        assert_eq!(root.name, "export");
        assert_eq!(root.find("export_version").unwrap().text, "4");
        let files = root.descendants("file");
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].child_text("destination").unwrap(), "a/b.txt");
        assert!(files[0].child("source").is_none());
    }

    #[test]
    fn test_attributes_and_empty() {
        let root = Element::parse_str(r#"<p><property type="shared"/><x a="1 &amp; 2"/></p>"#)
            .unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attr("type"), Some("shared"));
        assert_eq!(root.children[1].attr("a"), Some("1 & 2"));
        assert_eq!(root.children[1].attr("b"), None);
    }

    #[test]
    fn test_cdata_and_entities() {
        let root = Element::parse_str(
            "<TEMPLATE><![CDATA[<h1>Hello</h1>]]></TEMPLATE>",
        )
        .unwrap();
        assert_eq!(root.text, "<h1>Hello</h1>");

        let root = Element::parse_str("<v>a &lt; b</v>").unwrap();
        assert_eq!(root.text, "a < b");
    }

    #[test]
    fn test_malformed() {
        assert!(Element::parse_str("<a><b></a>").is_err());
        assert!(Element::parse_str("<a>").is_err());
        assert!(Element::parse_str("").is_err());
    }

    #[test]
    fn test_latin1_document() {
        let mut doc = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><v>".to_vec();
        doc.push(0xE4); // a-umlaut
        doc.extend_from_slice(b"</v>");
        let root = Element::parse(&doc).unwrap();
        assert_eq!(root.text, "\u{e4}");
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='UTF-8'?><a/>"),
            Some("UTF-8".to_string())
        );
        assert_eq!(declared_encoding(b"<a/>"), None);
    }

    #[test]
    fn test_decode_text() {
        let (text, known) = decode_text(&[0x48, 0xE9], "ISO-8859-1");
        assert_eq!(text, "H\u{e9}");
        assert!(known);

        let (_, known) = decode_text(b"abc", "x-unknown");
        assert!(!known);
    }

    #[test]
    fn test_serialize() {
        let root = Element::parse_str(r#"<t name="x">a &amp; b<p class="c">hi</p><br/></t>"#)
            .unwrap();
        assert_eq!(root.inner_xml(), r#"a &amp; b<p class="c">hi</p><br/>"#);
        assert_eq!(
            root.to_xml(),
            r#"<t name="x">a &amp; b<p class="c">hi</p><br/></t>"#
        );
    }

    #[test]
    fn test_cdata_split() {
        assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
        assert_eq!(escape("<&>"), "&lt;&amp;&gt;");
    }
}
