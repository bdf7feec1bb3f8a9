#![forbid(unsafe_code)]

//! Canonical XML 1.0 writer over a parsed document, optionally restricted to
//! a [`NodeSet`].
//!
//! Namespace declarations are keyed by prefix and attributes by
//! (namespace URI, local name). In both cases the empty string sorts first,
//! which gives the default namespace and unqualified attributes their
//! canonical leading position without a custom ordering.

use std::collections::BTreeMap;

use edatasig_core::{ns, Error};
use edatasig_xml::NodeSet;
use roxmltree::{Node, NodeType};

use crate::escape;

/// Prefix to namespace URI; `""` is the default namespace.
type Bindings = BTreeMap<String, String>;

/// Canonicalize a document using Inclusive C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let mut writer = Writer {
        out: Vec::new(),
        with_comments,
        node_set,
    };
    writer.children(doc.root(), &Bindings::new());
    Ok(writer.out)
}

struct Writer<'s> {
    out: Vec<u8>,
    with_comments: bool,
    node_set: Option<&'s NodeSet>,
}

impl Writer<'_> {
    fn visible(&self, node: Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |set| set.contains(&node))
    }

    fn push(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }

    /// `rendered` holds the bindings of the nearest output ancestor element.
    fn children(&mut self, parent: Node<'_, '_>, rendered: &Bindings) {
        for child in parent.children() {
            self.node(child, rendered);
        }
    }

    fn node(&mut self, node: Node<'_, '_>, rendered: &Bindings) {
        match node.node_type() {
            NodeType::Root => self.children(node, rendered),
            NodeType::Element => self.element(node, rendered),
            NodeType::Text if self.visible(node) => {
                let text = escape::escape_text(node.text().unwrap_or_default());
                self.push(&text);
            }
            NodeType::Comment if self.with_comments && self.visible(node) => {
                let body = node.text().unwrap_or_default();
                self.outside_markup(node, &format!("<!--{body}-->"));
            }
            NodeType::PI if self.visible(node) => {
                if let Some(pi) = node.pi() {
                    let markup = match pi.value.filter(|v| !v.is_empty()) {
                        Some(value) => format!("<?{} {}?>", pi.target, escape::escape_pi(value)),
                        None => format!("<?{}?>", pi.target),
                    };
                    self.outside_markup(node, &markup);
                }
            }
            _ => {}
        }
    }

    /// Comments and PIs beside the document element are separated from it
    /// by a line feed.
    fn outside_markup(&mut self, node: Node<'_, '_>, markup: &str) {
        let top_level = node.parent().is_some_and(|p| p.node_type() == NodeType::Root);
        if top_level && node.prev_siblings().any(|s| s.is_element()) {
            self.out.push(b'\n');
        }
        self.push(markup);
        if top_level && node.next_siblings().any(|s| s.is_element()) {
            self.out.push(b'\n');
        }
    }

    fn element(&mut self, node: Node<'_, '_>, rendered: &Bindings) {
        if !self.visible(node) {
            self.children(node, rendered);
            return;
        }

        let scope = in_scope_namespaces(node);
        let name = element_qname(node);

        self.out.push(b'<');
        self.push(&name);
        for (prefix, uri) in namespace_axis(&scope, rendered) {
            let attr = if prefix.is_empty() {
                "xmlns".to_owned()
            } else {
                format!("xmlns:{prefix}")
            };
            self.attribute(&attr, uri);
        }
        for (_, qname, value) in self.attribute_axis(node) {
            self.attribute(&qname, &value);
        }
        self.out.push(b'>');

        self.children(node, &scope);

        self.push("</");
        self.push(&name);
        self.out.push(b'>');
    }

    fn attribute(&mut self, qname: &str, value: &str) {
        let rendered = format!(" {qname}=\"{}\"", escape::escape_attr(value));
        self.push(&rendered);
    }

    /// Sort key, qualified name and value of each attribute to output.
    fn attribute_axis(&self, node: Node<'_, '_>) -> Vec<((String, String), String, String)> {
        let mut axis: Vec<_> = node
            .attributes()
            .map(|attr| {
                let uri = attr.namespace().unwrap_or_default();
                let qname = match prefix_for(node, uri) {
                    Some(prefix) => format!("{prefix}:{}", attr.name()),
                    None => attr.name().to_owned(),
                };
                ((uri.to_owned(), attr.name().to_owned()), qname, attr.value().to_owned())
            })
            .collect();

        // An apex of a document subset carries the xml:* attributes of its
        // omitted ancestors.
        let apex = node
            .parent()
            .map_or(true, |p| !p.is_element() || !self.visible(p));
        if self.node_set.is_some() && apex {
            for (local, value) in inherited_xml_attributes(node) {
                let key = (ns::XML.to_owned(), local);
                if !axis.iter().any(|(k, _, _)| *k == key) {
                    let qname = format!("xml:{}", key.1);
                    axis.push((key, qname, value));
                }
            }
        }

        axis.sort_by(|a, b| a.0.cmp(&b.0));
        axis
    }
}

/// Declarations to output: those that differ from the nearest output
/// ancestor, plus `xmlns=""` when that ancestor had a non-empty default.
fn namespace_axis<'b>(scope: &'b Bindings, rendered: &Bindings) -> Vec<(&'b str, &'b str)> {
    let mut axis: Vec<(&str, &str)> = scope
        .iter()
        .filter(|(prefix, uri)| rendered.get(*prefix) != Some(*uri))
        .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
        .collect();
    let default_dropped = !scope.contains_key("") && rendered.get("").is_some_and(|uri| !uri.is_empty());
    if default_dropped {
        axis.insert(0, ("", ""));
    }
    axis
}

/// Namespaces in scope on an element, nearest declaration winning.
/// `xmlns=""` unbinds the default namespace.
fn in_scope_namespaces(node: Node<'_, '_>) -> Bindings {
    let chain: Vec<_> = node.ancestors().filter(|n| n.is_element()).collect();
    let mut scope = Bindings::new();
    for element in chain.into_iter().rev() {
        for decl in element.namespaces() {
            let prefix = decl.name().unwrap_or_default();
            if prefix == "xml" {
                continue;
            }
            if decl.uri().is_empty() {
                scope.remove(prefix);
            } else {
                scope.insert(prefix.to_owned(), decl.uri().to_owned());
            }
        }
    }
    scope
}

/// xml:* attributes of the ancestors, the nearest one winning.
fn inherited_xml_attributes(node: Node<'_, '_>) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    for ancestor in node.ancestors().skip(1).filter(|a| a.is_element()) {
        for attr in ancestor.attributes().filter(|a| a.namespace() == Some(ns::XML)) {
            found
                .entry(attr.name().to_owned())
                .or_insert_with(|| attr.value().to_owned());
        }
    }
    found
}

/// The element name with the prefix used in the source start tag.
fn element_qname(node: Node<'_, '_>) -> String {
    let local = node.tag_name().name();
    let written = node
        .document()
        .input_text()
        .get(node.range().start + 1..)
        .and_then(|tail| tail.split(|c: char| c.is_whitespace() || c == '/' || c == '>').next())
        .filter(|qname| qname.rsplit(':').next() == Some(local));
    if let Some(qname) = written {
        return qname.to_owned();
    }
    match node.tag_name().namespace() {
        Some(uri) if node.default_namespace() != Some(uri) => match prefix_for(node, uri) {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_owned(),
        },
        _ => local.to_owned(),
    }
}

fn prefix_for(node: Node<'_, '_>, uri: &str) -> Option<String> {
    match uri {
        "" => None,
        ns::XML => Some("xml".to_owned()),
        _ => node
            .namespaces()
            .find(|decl| decl.uri() == uri && decl.name().is_some())
            .and_then(|decl| decl.name())
            .map(str::to_owned),
    }
}
