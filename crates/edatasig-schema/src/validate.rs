#![forbid(unsafe_code)]

//! Instance validation against a compiled [`Schema`].
//!
//! The whole tree is walked and every finding is collected; nothing stops at
//! the first error. Element content is matched against the content model by
//! exploring every end position a particle can reach, which is cheap for the
//! deterministic models XSD allows.

use std::collections::{BTreeMap, HashMap, HashSet};

use edatasig_core::{ns, ValidationOutcome};
use edatasig_xml::{position, EdataDocument};
use roxmltree::{Document, Node};
use tracing::debug;

use crate::builtin;
use crate::facets;
use crate::model::{
    AttributeUse, ComplexType, Compositor, Content, ElementDecl, ElementRef, NamespaceConstraint, Particle,
    ProcessContents, QName, Schema, Term, TypeDef, TypeRef, Wildcard,
};

/// Validate a loaded document. A document that no longer parses yields a
/// single error.
pub fn validate(doc: &EdataDocument, schema: &Schema) -> ValidationOutcome {
    match doc.parse_doc() {
        Ok(xml) => validate_xml(&xml, schema),
        Err(e) => {
            let mut outcome = ValidationOutcome::new();
            outcome.error(e.to_string());
            outcome
        }
    }
}

pub fn validate_xml(xml: &Document<'_>, schema: &Schema) -> ValidationOutcome {
    let mut validator = Validator {
        schema,
        outcome: ValidationOutcome::new(),
        ids: HashMap::new(),
        idrefs: Vec::new(),
    };
    validator.root(xml.root_element());
    validator.check_idrefs();
    debug!(
        errors = validator.outcome.errors().len(),
        warnings = validator.outcome.warnings().len(),
        "schema validation finished"
    );
    validator.outcome
}

/// `ns:local` as used in element and attribute diagnostics.
fn label(name: &QName) -> String {
    if name.ns.is_empty() {
        name.local.clone()
    } else {
        format!("{}:{}", name.ns, name.local)
    }
}

fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect()
}

fn stray_text<'a, 'input>(node: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_text() && c.text().is_some_and(|t| !t.trim().is_empty()))
}

enum Resolved<'s> {
    AnyType,
    Simple(&'s TypeRef),
    Complex(&'s ComplexType),
    Missing(&'s QName),
}

struct Validator<'s> {
    schema: &'s Schema,
    outcome: ValidationOutcome,
    /// ID value -> position of its first use.
    ids: HashMap<String, String>,
    idrefs: Vec<(String, String)>,
}

impl<'s> Validator<'s> {
    fn error(&mut self, node: Node<'_, '_>, message: impl AsRef<str>) {
        self.outcome
            .error(format!("{}: {}", position(node), message.as_ref()));
    }

    fn warning(&mut self, node: Node<'_, '_>, message: impl AsRef<str>) {
        self.outcome
            .warning(format!("{}: {}", position(node), message.as_ref()));
    }

    fn no_schema_information(&mut self, node: Node<'_, '_>) {
        let name = QName::of(&node);
        self.warning(
            node,
            format!(
                "Could not find schema information for the element '{}'.",
                label(&name)
            ),
        );
    }

    fn root(&mut self, node: Node<'_, '_>) {
        let name = QName::of(&node);
        match self.schema.element(&name) {
            Some(decl) => self.element(node, decl),
            None if name.ns == self.schema.target_namespace() => {
                self.error(node, format!("The '{}' element is not declared.", label(&name)))
            }
            None => self.no_schema_information(node),
        }
    }

    fn resolve(&self, ty: &'s TypeRef) -> Resolved<'s> {
        match ty {
            TypeRef::Named(q) if q.is_xsd() && q.local == "anyType" => Resolved::AnyType,
            TypeRef::Named(q) if q.is_xsd() => Resolved::Simple(ty),
            TypeRef::Named(q) => match self.schema.type_def(q) {
                Some(TypeDef::Simple(_)) => Resolved::Simple(ty),
                Some(TypeDef::Complex(ct)) => Resolved::Complex(ct),
                None => Resolved::Missing(q),
            },
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Simple(_) => Resolved::Simple(ty),
                TypeDef::Complex(ct) => Resolved::Complex(ct),
            },
        }
    }

    fn element(&mut self, node: Node<'_, '_>, decl: &'s ElementDecl) {
        let name = QName::of(&node);
        if node.attribute((ns::XSI, "type")).is_some() {
            debug!(element = %name, "xsi:type is not evaluated");
        }

        if node.attribute((ns::XSI, "nil")).is_some_and(|v| v.trim() == "true") {
            if !decl.nillable {
                self.error(
                    node,
                    format!(
                        "The element {name} cannot be nil because it is not declared nillable."
                    ),
                );
            } else if node.children().any(|c| c.is_element()) || stray_text(node).is_some() {
                self.error(
                    node,
                    format!("The element {name} cannot contain content because xsi:nil is true."),
                );
            }
            if let Resolved::Complex(ct) = self.resolve(&decl.type_ref) {
                self.attributes(node, &ct.attributes, ct.any_attribute.as_ref());
            }
            return;
        }

        match self.resolve(&decl.type_ref) {
            Resolved::AnyType => {}
            Resolved::Missing(q) => {
                self.error(node, format!("The type {q} is not declared."));
            }
            Resolved::Simple(ty) => {
                self.attributes(node, &[], None);
                self.text_only(node, &name);
                self.simple_value(node, &name, ty, decl.fixed.as_deref());
            }
            Resolved::Complex(ct) => {
                self.attributes(node, &ct.attributes, ct.any_attribute.as_ref());
                match &ct.content {
                    Content::Empty => {
                        for child in node.children().filter(|c| c.is_element()) {
                            self.error(
                                child,
                                format!(
                                    "The element {name} cannot contain child element {} because the parent element's content model is empty.",
                                    QName::of(&child)
                                ),
                            );
                        }
                        if !ct.mixed {
                            if let Some(text) = stray_text(node) {
                                self.error(
                                    text,
                                    format!(
                                        "The element {name} cannot contain text because the content model is empty."
                                    ),
                                );
                            }
                        }
                    }
                    Content::Simple(ty) => {
                        self.text_only(node, &name);
                        self.simple_value(node, &name, ty, decl.fixed.as_deref());
                    }
                    Content::Elements(particle) => {
                        if !ct.mixed {
                            if let Some(text) = stray_text(node) {
                                self.error(
                                    text,
                                    format!(
                                        "The element {name} cannot contain text because its content model is element only."
                                    ),
                                );
                            }
                        }
                        self.content(node, &name, particle);
                    }
                }
            }
        }
    }

    fn text_only(&mut self, node: Node<'_, '_>, name: &QName) {
        for child in node.children().filter(|c| c.is_element()) {
            self.error(
                child,
                format!(
                    "The element {name} cannot contain child element {} because the parent element's content model is text only.",
                    QName::of(&child)
                ),
            );
        }
    }

    fn simple_value(&mut self, node: Node<'_, '_>, name: &QName, ty: &TypeRef, fixed: Option<&str>) {
        let text = text_of(node);
        let subject = format!("The '{}' element", label(name));
        self.check_value(node, &subject, ty, &text);
        if let Some(fixed) = fixed {
            if text.trim() != fixed.trim() {
                self.error(
                    node,
                    format!("The value of the '{}' element does not equal its fixed value.", label(name)),
                );
            }
        }
    }

    fn check_value(&mut self, node: Node<'_, '_>, subject: &str, ty: &TypeRef, raw: &str) {
        let mut warnings = Vec::new();
        match facets::check_value(self.schema, ty, raw, &mut warnings) {
            Ok(root) if builtin::is_id(&root) => {
                let value = raw.trim().to_owned();
                if self.ids.contains_key(&value) {
                    self.error(node, format!("'{value}' is already used as an ID."));
                } else {
                    self.ids.insert(value, position(node));
                }
            }
            Ok(root) if builtin::is_idref(&root) => {
                for token in raw.split_whitespace() {
                    self.idrefs.push((token.to_owned(), position(node)));
                }
            }
            Ok(_) => {}
            Err(detail) => self.error(
                node,
                format!(
                    "{subject} is invalid - The value '{raw}' is invalid according to its datatype '{}' - {detail}",
                    ty.display_name()
                ),
            ),
        }
        for warning in warnings {
            self.warning(node, warning);
        }
    }

    fn attributes(&mut self, node: Node<'_, '_>, uses: &[AttributeUse], any: Option<&Wildcard>) {
        for attr in node.attributes() {
            let namespace = attr.namespace().unwrap_or("");
            if namespace == ns::XSI {
                continue;
            }
            let name = QName::new(namespace, attr.name());
            if let Some(decl) = uses.iter().find(|u| u.name == name) {
                let subject = format!("The '{}' attribute", label(&name));
                self.check_value(node, &subject, &decl.type_ref, attr.value());
                if let Some(fixed) = &decl.fixed {
                    if attr.value().trim() != fixed.trim() {
                        self.error(
                            node,
                            format!(
                                "The value of the '{}' attribute does not equal its fixed value.",
                                label(&name)
                            ),
                        );
                    }
                }
            } else if !any.is_some_and(|w| w.allows(namespace)) {
                self.error(node, format!("The '{}' attribute is not declared.", label(&name)));
            }
        }

        for decl in uses.iter().filter(|u| u.required) {
            let present = node
                .attributes()
                .any(|a| a.namespace().unwrap_or("") == decl.name.ns && a.name() == decl.name.local);
            if !present {
                self.error(
                    node,
                    format!("The required attribute '{}' is missing.", label(&decl.name)),
                );
            }
        }
    }

    fn content(&mut self, node: Node<'_, '_>, name: &QName, particle: &'s Particle) {
        let children: Vec<Node<'_, '_>> = node.children().filter(|c| c.is_element()).collect();
        let names: Vec<QName> = children.iter().map(QName::of).collect();
        let mut matcher = Matcher::new(&names);
        let ends = matcher.ends(particle, 0);

        if let Some((_, path)) = ends.iter().find(|(end, _)| *end == children.len()) {
            for (child, assigned) in children.iter().zip(path) {
                match assigned {
                    Assigned::Element(r) => self.element_ref(*child, r),
                    Assigned::Wildcard(w) => self.wildcard(*child, w),
                }
            }
            return;
        }

        let reached = ends
            .iter()
            .map(|(end, _)| *end)
            .chain(matcher.attempts.keys().copied())
            .max()
            .unwrap_or(0);
        let expected = matcher.expected_at(reached);
        match children.get(reached) {
            Some(child) => {
                let mut message = format!(
                    "The element {name} has invalid child element {}.",
                    names[reached]
                );
                if !expected.is_empty() {
                    message.push_str(&format!(" List of possible elements expected: {expected}."));
                }
                self.error(*child, message);
            }
            None => self.error(
                node,
                format!(
                    "The element {name} has incomplete content. List of possible elements expected: {expected}."
                ),
            ),
        }

        // Keep checking children whose declaration is known by name.
        for (child, child_name) in children.iter().zip(&names) {
            if let Some(r) = find_element(particle, child_name) {
                self.element_ref(*child, r);
            }
        }
    }

    fn element_ref(&mut self, node: Node<'_, '_>, r: &'s ElementRef) {
        match r {
            ElementRef::Local(decl) => self.element(node, decl),
            ElementRef::Global(name) => match self.schema.element(name) {
                Some(decl) => self.element(node, decl),
                None => self.no_schema_information(node),
            },
        }
    }

    fn wildcard(&mut self, node: Node<'_, '_>, w: &Wildcard) {
        if w.process == ProcessContents::Skip {
            return;
        }
        let name = QName::of(&node);
        match (self.schema.element(&name), w.process) {
            (Some(decl), _) => self.element(node, decl),
            (None, ProcessContents::Strict) => {
                self.error(node, format!("The '{}' element is not declared.", label(&name)))
            }
            (None, _) => self.no_schema_information(node),
        }
    }

    fn check_idrefs(&mut self) {
        let unresolved: Vec<_> = self
            .idrefs
            .iter()
            .filter(|(value, _)| !self.ids.contains_key(value))
            .cloned()
            .collect();
        for (value, pos) in unresolved {
            self.outcome
                .error(format!("{pos}: Reference to undeclared ID is '{value}'."));
        }
    }
}

fn find_element<'s>(particle: &'s Particle, name: &QName) -> Option<&'s ElementRef> {
    match &particle.term {
        Term::Element(r) if r.name() == name => Some(r),
        Term::Element(_) | Term::Any(_) => None,
        Term::Group(_, parts) => parts.iter().find_map(|p| find_element(p, name)),
    }
}

#[derive(Clone, Copy)]
enum Assigned<'s> {
    Element(&'s ElementRef),
    Wildcard(&'s Wildcard),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expected {
    Element(QName),
    Any(NamespaceConstraint),
}

type Reach<'s> = (usize, Vec<Assigned<'s>>);

fn push_unique<'s>(into: &mut Vec<Reach<'s>>, reach: Reach<'s>) {
    if !into.iter().any(|(end, _)| *end == reach.0) {
        into.push(reach);
    }
}

/// Matches a child element sequence against a content model, recording
/// which terms were tried at each position for diagnostics.
struct Matcher<'c> {
    names: &'c [QName],
    attempts: BTreeMap<usize, Vec<Expected>>,
}

impl<'c> Matcher<'c> {
    fn new(names: &'c [QName]) -> Self {
        Self {
            names,
            attempts: BTreeMap::new(),
        }
    }

    fn attempt(&mut self, pos: usize, expected: Expected) {
        let tried = self.attempts.entry(pos).or_default();
        if !tried.contains(&expected) {
            tried.push(expected);
        }
    }

    /// Every position `particle` can end at when started at `start`, with
    /// the element assignments that reach it.
    fn ends<'s>(&mut self, particle: &'s Particle, start: usize) -> Vec<Reach<'s>> {
        let mut results = Vec::new();
        if particle.min == 0 {
            results.push((start, Vec::new()));
        }
        let mut frontier: Vec<Reach<'s>> = vec![(start, Vec::new())];
        let mut count: u32 = 0;
        let limit = self.names.len() + particle.min as usize + 1;

        while !frontier.is_empty() && particle.max.map_or(true, |max| count < max) {
            count += 1;
            let mut next = Vec::new();
            for (pos, path) in &frontier {
                for (end, tail) in self.term_ends(&particle.term, *pos) {
                    // Empty iterations only count towards minOccurs.
                    if end == *pos && count > particle.min {
                        continue;
                    }
                    let mut full = path.clone();
                    full.extend(tail);
                    push_unique(&mut next, (end, full));
                }
            }
            if count >= particle.min {
                for reach in &next {
                    push_unique(&mut results, reach.clone());
                }
                let stalled = next
                    .iter()
                    .all(|(end, _)| frontier.iter().any(|(pos, _)| pos == end));
                if stalled {
                    break;
                }
            }
            if count as usize > limit {
                break;
            }
            frontier = next;
        }
        results
    }

    fn term_ends<'s>(&mut self, term: &'s Term, pos: usize) -> Vec<Reach<'s>> {
        match term {
            Term::Element(r) => {
                self.attempt(pos, Expected::Element(r.name().clone()));
                match self.names.get(pos) {
                    Some(name) if name == r.name() => vec![(pos + 1, vec![Assigned::Element(r)])],
                    _ => Vec::new(),
                }
            }
            Term::Any(w) => {
                self.attempt(pos, Expected::Any(w.namespaces.clone()));
                match self.names.get(pos) {
                    Some(name) if w.allows(&name.ns) => vec![(pos + 1, vec![Assigned::Wildcard(w)])],
                    _ => Vec::new(),
                }
            }
            Term::Group(Compositor::Sequence, parts) => {
                let mut states: Vec<Reach<'s>> = vec![(pos, Vec::new())];
                for part in parts {
                    let mut next = Vec::new();
                    for (at, path) in &states {
                        for (end, tail) in self.ends(part, *at) {
                            let mut full = path.clone();
                            full.extend(tail);
                            push_unique(&mut next, (end, full));
                        }
                    }
                    states = next;
                    if states.is_empty() {
                        break;
                    }
                }
                states
            }
            Term::Group(Compositor::Choice, parts) => {
                let mut results = Vec::new();
                for part in parts {
                    for reach in self.ends(part, pos) {
                        push_unique(&mut results, reach);
                    }
                }
                results
            }
            Term::Group(Compositor::All, parts) => self.all_ends(parts, pos),
        }
    }

    fn all_ends<'s>(&mut self, parts: &'s [Particle], pos: usize) -> Vec<Reach<'s>> {
        let parts = &parts[..parts.len().min(64)];
        let required = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.min > 0)
            .fold(0u64, |mask, (i, _)| mask | (1 << i));

        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: Vec<(usize, u64, Vec<Assigned<'s>>)> = vec![(pos, 0, Vec::new())];
        while let Some((at, mask, path)) = queue.pop() {
            if mask & required == required {
                push_unique(&mut results, (at, path.clone()));
            }
            for (i, part) in parts.iter().enumerate() {
                let bit = 1u64 << i;
                if mask & bit != 0 {
                    continue;
                }
                for (end, tail) in self.ends(part, at) {
                    if end > at && seen.insert((end, mask | bit)) {
                        let mut full = path.clone();
                        full.extend(tail);
                        queue.push((end, mask | bit, full));
                    }
                }
            }
        }
        results
    }

    /// The `List of possible elements expected` text for position `pos`.
    fn expected_at(&self, pos: usize) -> String {
        let Some(tried) = self.attempts.get(&pos) else {
            return String::new();
        };
        let mut parts: Vec<String> = Vec::new();
        let mut run: Vec<&str> = Vec::new();
        let mut run_ns: Option<&str> = None;
        for expected in tried {
            match expected {
                Expected::Element(name) => {
                    if run_ns != Some(name.ns.as_str()) {
                        flush_names(&mut run, run_ns, &mut parts);
                        run_ns = Some(name.ns.as_str());
                    }
                    run.push(name.local.as_str());
                }
                Expected::Any(namespaces) => {
                    flush_names(&mut run, run_ns, &mut parts);
                    run_ns = None;
                    parts.push(match namespaces {
                        NamespaceConstraint::Any => "any element in any namespace".to_owned(),
                        NamespaceConstraint::Other(target) => {
                            format!("any element in namespace other than '{target}'")
                        }
                        NamespaceConstraint::List(list) => {
                            format!("any element in namespace '{}'", list.join(" "))
                        }
                    });
                }
            }
        }
        flush_names(&mut run, run_ns, &mut parts);
        parts.join(" as well as ")
    }
}

/// Append `'A, B' in namespace 'ns'` for a run of same-namespace names.
fn flush_names(run: &mut Vec<&str>, run_ns: Option<&str>, parts: &mut Vec<String>) {
    if run.is_empty() {
        return;
    }
    let names = run.join(", ");
    match run_ns {
        Some(ns) if !ns.is_empty() => parts.push(format!("'{names}' in namespace '{ns}'")),
        _ => parts.push(format!("'{names}'")),
    }
    run.clear();
}
