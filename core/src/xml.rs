//! A small owned XML tree for editing package parts in place.
//!
//! Parsing is done with `quick-xml`; names are kept qualified (`p:sp`, `a:t`)
//! so a part serializes back with the prefixes it was read with. Lookups go by
//! local name, which is how DrawingML parts are addressed in practice.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError {
    message: String,
}

impl XmlError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for XmlError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: bool,
    pub root: Element,
}

/// Local part of a qualified name.
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attrs: Vec::new(), children: Vec::new() }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.is(local))
    }

    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.is(local))
    }

    /// Walk a chain of local names from this element.
    pub fn path(&self, locals: &[&str]) -> Option<&Element> {
        locals.iter().try_fold(self, |el, local| el.child(local))
    }

    pub fn path_mut(&mut self, locals: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for local in locals {
            current = current.child_mut(local)?;
        }
        Some(current)
    }

    /// Every element below this one, depth first.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.elements().collect();
        stack.reverse();
        while let Some(el) = stack.pop() {
            out.push(el);
            let mut kids: Vec<&Element> = el.elements().collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Concatenated character data directly under this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|n| matches!(n, Node::Element(_)));
        self.children.push(Node::Text(text.into()));
    }

    /// Insert `child` before the first child element whose local name is in
    /// `before`, or append it. Returns the inserted element.
    pub fn insert_before(&mut self, child: Element, before: &[&str]) -> &mut Element {
        let pos = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if before.iter().any(|b| *b == e.local_name())))
            .unwrap_or(self.children.len());
        self.children.insert(pos, Node::Element(child));
        match &mut self.children[pos] {
            Node::Element(e) => e,
            _ => unreachable!("element was just inserted at this position"),
        }
    }

    /// Insert `child` as the first child node.
    pub fn prepend(&mut self, child: Element) -> &mut Element {
        self.children.insert(0, Node::Element(child));
        match &mut self.children[0] {
            Node::Element(e) => e,
            _ => unreachable!("element was just inserted at this position"),
        }
    }

    /// Return the child named `local`, creating `name` before any of `before`
    /// when it is missing.
    pub fn get_or_insert(&mut self, name: &str, before: &[&str]) -> &mut Element {
        let local = local_name(name);
        match self.children.iter().position(|n| matches!(n, Node::Element(e) if e.is(local))) {
            Some(pos) => match &mut self.children[pos] {
                Node::Element(e) => e,
                _ => unreachable!("position matched an element"),
            },
            None => self.insert_before(Element::new(name), before),
        }
    }

    pub fn remove_children(&mut self, local: &str) -> Vec<Element> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.children.len());
        for node in self.children.drain(..) {
            match node {
                Node::Element(e) if e.is(local) => removed.push(e),
                other => kept.push(other),
            }
        }
        self.children = kept;
        removed
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            push_escaped(out, value);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_to(out),
                Node::Text(t) => push_escaped(out, t),
                Node::CData(t) => {
                    out.push_str("<![CDATA[");
                    out.push_str(t);
                    out.push_str("]]>");
                }
                Node::Comment(t) => {
                    out.push_str("<!--");
                    out.push_str(t);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Characters XML 1.0 cannot carry even as character references.
fn is_restricted(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

/// Escape markup and write restricted characters as Office's `_xHHHH_`.
fn push_escaped(out: &mut String, value: &str) {
    if !value.contains(is_restricted) {
        out.push_str(&escape(value));
        return;
    }
    let mut spelled = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        if is_restricted(c) {
            spelled.push_str(&format!("_x{:04X}_", u32::from(c)));
        } else {
            spelled.push(c);
        }
    }
    out.push_str(&escape(spelled.as_str()));
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::new(e.to_string()))?
        .to_string();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::new(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlError::new(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::new(e.to_string()))?
            .into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { declaration: true, root }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| XmlError::new(e.to_string()))?;
        let mut reader = Reader::from_str(text);

        let mut declaration = false;
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::new(format!("at byte {}: {e}", reader.buffer_position())))?;
            match event {
                Event::Decl(_) => declaration = true,
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::new("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = t.unescape().map_err(|e| XmlError::new(e.to_string()))?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(c) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                        parent.children.push(Node::CData(text));
                    }
                }
                Event::Comment(c) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                        parent.children.push(Node::Comment(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::new("unclosed element at end of document"));
        }
        let root = root.ok_or_else(|| XmlError::new("document has no root element"))?;
        Ok(Self { declaration, root })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        if self.declaration {
            out.push_str(XML_DECLARATION);
        }
        self.root.write_to(&mut out);
        out.into_bytes()
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlError::new("multiple root elements")),
    }
    Ok(())
}
