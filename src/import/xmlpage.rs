// src/import/xmlpage.rs

//! Unified page documents
//!
//! A unified page holds named content elements per locale:
//!
//! ```xml
//! <page>
//!   <elements>
//!     <element name="body" language="en">
//!       <links/>
//!       <content><![CDATA[...]]></content>
//!     </element>
//!   </elements>
//! </page>
//! ```
//!
//! Legacy page bodies are `XMLTEMPLATE` documents with one `TEMPLATE`
//! section per element; the unnamed section becomes the default element.
//! Bodies that are not such documents become the default element verbatim.

use crate::error::{Error, Result};
use crate::xml::{self, Element};
use tracing::debug;

/// Element name used for the main page body
pub const DEFAULT_ELEMENT: &str = "body";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    pub name: String,
    pub locale: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlPage {
    elements: Vec<PageElement>,
}

impl XmlPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element; the first element for a name and locale wins
    pub fn add_element(&mut self, name: &str, locale: &str, content: &str) {
        if self.element(name, locale).is_some() {
            debug!("Duplicate page element {} ({}), keeping the first", name, locale);
            return;
        }
        self.elements.push(PageElement {
            name: name.to_string(),
            locale: locale.to_string(),
            content: content.to_string(),
        });
    }

    pub fn element(&self, name: &str, locale: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.name == name && e.locale == locale)
            .map(|e| e.content.as_str())
    }

    pub fn elements(&self) -> &[PageElement] {
        &self.elements
    }

    /// Convert a decoded legacy body into a unified page
    pub fn from_legacy_body(text: &str, default_element: &str, locale: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut page = Self::new();

        let template = if text.trim_start().starts_with('<') {
            Element::parse_str(text)
                .ok()
                .filter(|root| root.name.eq_ignore_ascii_case("XMLTEMPLATE"))
        } else {
            None
        };

        match template {
            Some(root) => {
                for section in root
                    .children
                    .iter()
                    .filter(|c| c.name.eq_ignore_ascii_case("TEMPLATE"))
                {
                    let name = section
                        .attr("name")
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .unwrap_or(default_element);
                    let content = if section.children.is_empty() {
                        section.text.clone()
                    } else {
                        section.inner_xml()
                    };
                    page.add_element(name, locale, content.trim());
                }
                if page.elements.is_empty() {
                    page.add_element(default_element, locale, "");
                }
            }
            None => page.add_element(default_element, locale, text),
        }

        page
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<page>\n  <elements>\n");
        for element in &self.elements {
            out.push_str(&format!(
                "    <element name=\"{}\" language=\"{}\">\n      <links/>\n      <content>{}</content>\n    </element>\n",
                xml::escape(&element.name),
                xml::escape(&element.locale),
                xml::cdata(&element.content),
            ));
        }
        out.push_str("  </elements>\n</page>\n");
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = Element::parse(bytes)?;
        if root.name != "page" {
            return Err(Error::MalformedXml(format!(
                "expected <page>, found <{}>",
                root.name
            )));
        }

        let mut page = Self::new();
        for element in root.descendants("element") {
            let name = element.attr("name").unwrap_or(DEFAULT_ELEMENT);
            let locale = element.attr("language").unwrap_or_default();
            let content = element
                .child("content")
                .map(|c| c.text.as_str())
                .unwrap_or_default();
            page.add_element(name, locale, content);
        }
        Ok(page)
    }
}

/// Convert legacy body bytes (already decoded) into unified page bytes
pub fn convert_legacy_body(text: &str, default_element: &str, locale: &str) -> Vec<u8> {
    XmlPage::from_legacy_body(text, default_element, locale).to_bytes()
}
