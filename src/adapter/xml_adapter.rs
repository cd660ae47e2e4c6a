//! XML source adapter
//!
//! Every element whose local name equals the configured item tag becomes an
//! owned [`XmlItem`]. Field locators are ElementTree-style paths evaluated
//! relative to the item element:
//!
//! - `title`, `author/name`: child steps
//! - `*`: any child element
//! - `.//title`, `meta//title`: descendants at any depth
//! - `link/@href`: attribute of the matched element (final step only)
//!
//! `items` reads the whole document into memory and holds every matched
//! item as an owned `XmlItem` until the iterator is dropped. Memory grows
//! with the source size; very large feeds should be split first.

use super::traits::{SourceAdapter, SourceError, SourceItems, SourceResult};
use std::path::Path;

/// An owned copy of one XML element and its subtree
#[derive(Debug, Clone, PartialEq)]
pub struct XmlItem {
    tag: String,
    text: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<XmlItem>,
}

impl XmlItem {
    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        Self {
            tag: node.tag_name().name().to_string(),
            text: node.text().map(str::to_string),
            attributes: node
                .attributes()
                .map(|a| (a.name().to_string(), a.value().to_string()))
                .collect(),
            children: node
                .children()
                .filter(|n| n.is_element())
                .map(Self::from_node)
                .collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Text before the first child element, if any
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[XmlItem] {
        &self.children
    }

    /// First element matching `path`, in document order
    pub fn find(&self, path: &str) -> Option<&XmlItem> {
        self.select(path).into_iter().next()
    }

    /// Text of the first element matching `path`.
    ///
    /// A matched element without text yields an empty string; no match
    /// yields `None`. A trailing `@name` step yields that attribute of the
    /// first matching element that carries it.
    pub fn find_text(&self, path: &str) -> Option<String> {
        match path.rsplit_once('@') {
            Some((element_path, attr)) => {
                let element_path = element_path.trim_end_matches('/');
                self.select(element_path)
                    .into_iter()
                    .find_map(|e| e.attribute(attr))
                    .map(str::to_string)
            }
            None => self
                .find(path)
                .map(|e| e.text.clone().unwrap_or_default()),
        }
    }

    fn select(&self, path: &str) -> Vec<&XmlItem> {
        let mut current: Vec<&XmlItem> = vec![self];
        let mut descend = false;

        for step in path.split('/') {
            match step {
                // `//` leaves an empty step: the next step searches all depths
                "" => descend = true,
                "." => {
                    if descend {
                        current = current
                            .iter()
                            .flat_map(|e| e.self_and_descendants())
                            .collect();
                        descend = false;
                    }
                }
                name => {
                    current = current
                        .iter()
                        .flat_map(|e| {
                            if descend {
                                e.descendants()
                            } else {
                                e.children.iter().collect()
                            }
                        })
                        .filter(|e| name == "*" || e.tag == name)
                        .collect();
                    descend = false;
                }
            }
            if current.is_empty() {
                break;
            }
        }
        current
    }

    fn self_and_descendants(&self) -> Vec<&XmlItem> {
        let mut out = vec![self];
        out.extend(self.descendants());
        out
    }

    fn descendants(&self) -> Vec<&XmlItem> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }
}

/// Reads repeating item elements from a local XML file
pub struct XmlAdapter {
    item_tag: String,
    document: Option<String>,
}

impl XmlAdapter {
    pub const DEFAULT_ITEM_TAG: &'static str = "item";

    pub fn new() -> Self {
        Self {
            item_tag: Self::DEFAULT_ITEM_TAG.to_string(),
            document: None,
        }
    }

    pub fn with_item_tag(mut self, tag: impl Into<String>) -> Self {
        self.item_tag = tag.into();
        self
    }

    pub fn item_tag(&self) -> &str {
        &self.item_tag
    }
}

impl Default for XmlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAdapter for XmlAdapter {
    type Item = XmlItem;

    fn format(&self) -> &'static str {
        "xml"
    }

    fn load(&mut self, source: &Path) -> SourceResult<()> {
        let text = std::fs::read_to_string(source).map_err(|e| SourceError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.document = Some(text);
        Ok(())
    }

    fn items(&mut self) -> SourceResult<SourceItems<XmlItem>> {
        let text = self
            .document
            .take()
            .ok_or(SourceError::NotLoaded { format: "xml" })?;
        let doc = roxmltree::Document::parse(&text)?;

        let items: Vec<XmlItem> = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == self.item_tag)
            .map(XmlItem::from_node)
            .collect();
        Ok(Box::new(items.into_iter().map(Ok)))
    }

    fn value(&self, item: &XmlItem, locator: &str) -> Option<String> {
        item.find_text(locator).map(|t| t.trim().to_string())
    }

    fn unload(&mut self) {
        self.document = None;
    }
}
