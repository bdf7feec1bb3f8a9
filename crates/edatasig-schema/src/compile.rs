#![forbid(unsafe_code)]

//! Schema loading and compilation into [`Schema`] components.
//!
//! All schema documents (the root plus its `xs:include`s) are parsed up
//! front, their top-level components are indexed by local name, and the
//! global declarations are then compiled. Group and attribute-group
//! references are inlined; `complexContent` derivations are merged with
//! their base type.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use edatasig_core::{ns, Error, Result};
use roxmltree::{Document, Node};
use tracing::{debug, info, warn};

use crate::builtin;
use crate::model::{
    Compositor, ComplexType, Content, ElementDecl, ElementRef, Facets, NamespaceConstraint,
    AttributeUse, Particle, Pattern, ProcessContents, QName, Schema, SimpleType, Term, TypeDef,
    TypeRef, Variety, Wildcard,
};

impl Schema {
    /// Load and compile the schema at `path`, following `xs:include`s
    /// relative to it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading schema");
        let sources = load_sources(path)?;
        compile(&sources)
    }

    /// Compile a single in-memory schema document. `xs:include` is rejected
    /// since there is no location to resolve it against.
    pub fn parse(text: &str) -> Result<Self> {
        compile(&[Source {
            path: None,
            text: text.to_owned(),
        }])
    }
}

struct Source {
    path: Option<PathBuf>,
    text: String,
}

impl Source {
    fn label(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "<schema>".into(),
        }
    }
}

fn schema_error(message: impl Into<String>) -> Error {
    Error::Schema(message.into())
}

fn parse_source(source: &Source) -> Result<Document<'_>> {
    Document::parse_with_options(&source.text, edatasig_xml::parsing_options())
        .map_err(|e| schema_error(format!("{}: {e}", source.label())))
}

fn load_sources(root: &Path) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    let mut seen = HashSet::new();
    let mut queue = vec![root.to_path_buf()];
    while let Some(path) = queue.pop() {
        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(key) {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| {
            schema_error(format!("cannot read schema '{}': {e}", path.display()))
        })?;
        let source = Source {
            path: Some(path),
            text,
        };
        let locations: Vec<String> = {
            let doc = parse_source(&source)?;
            xs_children(doc.root_element())
                .filter(|n| n.tag_name().name() == "include")
                .filter_map(|n| n.attribute("schemaLocation").map(str::to_owned))
                .collect()
        };
        let base = source
            .path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        for location in locations {
            debug!(location = %location, "following schema include");
            queue.push(base.join(location));
        }
        sources.push(source);
    }
    Ok(sources)
}

fn compile(sources: &[Source]) -> Result<Schema> {
    let docs = sources
        .iter()
        .map(parse_source)
        .collect::<Result<Vec<_>>>()?;
    let compiler = Compiler::index(&docs, sources)?;
    let schema = compiler.run()?;
    info!(
        elements = schema.elements.len(),
        types = schema.types.len(),
        "schema compiled"
    );
    Ok(schema)
}

/// XSD element children of `node`, skipping annotations.
fn xs_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|c| {
        c.is_element()
            && c.tag_name().namespace() == Some(ns::XSD)
            && c.tag_name().name() != "annotation"
    })
}

fn required_attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        schema_error(format!(
            "{}: the '{}' component requires a '{name}' attribute",
            edatasig_xml::position(node),
            node.tag_name().name()
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Element,
    ComplexType,
    SimpleType,
    Group,
    AttributeGroup,
    Attribute,
}

impl Kind {
    fn of(local: &str) -> Option<Self> {
        Some(match local {
            "element" => Kind::Element,
            "complexType" => Kind::ComplexType,
            "simpleType" => Kind::SimpleType,
            "group" => Kind::Group,
            "attributeGroup" => Kind::AttributeGroup,
            "attribute" => Kind::Attribute,
            _ => return None,
        })
    }
}

struct Compiler<'a, 'input> {
    target: String,
    imported: Vec<String>,
    index: HashMap<(Kind, String), Node<'a, 'input>>,
    complex_done: HashMap<String, ComplexType>,
    complex_active: Vec<String>,
    group_active: Vec<String>,
}

impl<'a, 'input> Compiler<'a, 'input> {
    fn index(docs: &'a [Document<'input>], sources: &[Source]) -> Result<Self> {
        let mut target = None;
        let mut imported = Vec::new();
        let mut index = HashMap::new();

        for (doc, source) in docs.iter().zip(sources) {
            let root = doc.root_element();
            if root.tag_name().namespace() != Some(ns::XSD) || root.tag_name().name() != "schema" {
                return Err(schema_error(format!(
                    "{}: the root element is not xs:schema",
                    source.label()
                )));
            }
            let tns = root.attribute("targetNamespace").unwrap_or("");
            match &target {
                None => {
                    if tns != ns::EDATA {
                        return Err(schema_error(format!(
                            "the schema target namespace '{tns}' is not the eData namespace '{}'",
                            ns::EDATA
                        )));
                    }
                    target = Some(tns.to_owned());
                }
                Some(t) if tns.is_empty() || tns == t => {}
                Some(t) => {
                    return Err(schema_error(format!(
                        "{}: included schema has target namespace '{tns}', expected '{t}'",
                        source.label()
                    )))
                }
            }

            for child in xs_children(root) {
                let local = child.tag_name().name();
                match local {
                    "include" if source.path.is_none() => {
                        return Err(schema_error(
                            "xs:include needs a schema file to resolve against",
                        ))
                    }
                    "include" => {}
                    "import" => {
                        let namespace = child.attribute("namespace").unwrap_or("").to_owned();
                        if child.attribute("schemaLocation").is_some() {
                            warn!(namespace = %namespace, "import location ignored");
                        }
                        imported.push(namespace);
                    }
                    _ => {
                        let Some(kind) = Kind::of(local) else {
                            debug!(component = local, "skipping top-level schema component");
                            continue;
                        };
                        let name = required_attr(child, "name")?.to_owned();
                        if index.insert((kind, name.clone()), child).is_some() {
                            return Err(schema_error(format!(
                                "{}: duplicate top-level {local} '{name}'",
                                edatasig_xml::position(child)
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self {
            target: target.unwrap_or_default(),
            imported,
            index,
            complex_done: HashMap::new(),
            complex_active: Vec::new(),
            group_active: Vec::new(),
        })
    }

    fn run(mut self) -> Result<Schema> {
        let mut entries: Vec<_> = self
            .index
            .iter()
            .map(|((kind, name), node)| (*kind, name.clone(), *node))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));

        let mut elements = HashMap::new();
        let mut types = HashMap::new();
        for (kind, name, node) in entries {
            match kind {
                Kind::Element => {
                    let decl = self.element_decl(node, true)?;
                    elements.insert(decl.name.clone(), decl);
                }
                Kind::ComplexType => {
                    let ct = self.complex_named(&name)?;
                    types.insert(QName::new(&self.target, name), TypeDef::Complex(ct));
                }
                Kind::SimpleType => {
                    let st = self.simple_type(node)?;
                    types.insert(QName::new(&self.target, name), TypeDef::Simple(st));
                }
                Kind::Group | Kind::AttributeGroup | Kind::Attribute => {}
            }
        }

        Ok(Schema {
            target_namespace: self.target,
            elements,
            types,
            imported: self.imported,
        })
    }

    fn lookup(&self, kind: Kind, name: &QName, at: Node<'_, '_>) -> Result<Node<'a, 'input>> {
        if name.ns == self.target {
            if let Some(node) = self.index.get(&(kind, name.local.clone())) {
                return Ok(*node);
            }
        }
        Err(schema_error(format!(
            "{}: {:?} {name} is not declared",
            edatasig_xml::position(at),
            kind
        )))
    }

    /// Whether `ns` has no schema components here but may be referenced.
    fn is_external(&self, namespace: &str) -> bool {
        namespace == ns::XML || self.imported.iter().any(|n| n == namespace)
    }

    fn resolve_qname(&self, node: Node<'_, '_>, value: &str) -> Result<QName> {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => {
                let uri = match node.lookup_namespace_uri(Some(prefix)) {
                    Some(uri) => uri,
                    None if prefix == "xml" => ns::XML,
                    None => {
                        return Err(schema_error(format!(
                            "{}: the prefix '{prefix}' is not declared",
                            edatasig_xml::position(node)
                        )))
                    }
                };
                Ok(QName::new(uri, local))
            }
            None => Ok(QName::new(node.lookup_namespace_uri(None).unwrap_or(""), value)),
        }
    }

    fn type_ref(&self, node: Node<'_, '_>, value: &str) -> Result<TypeRef> {
        let name = self.resolve_qname(node, value)?;
        if name.is_xsd() {
            if !builtin::is_builtin(&name.local) {
                return Err(schema_error(format!(
                    "{}: the built-in type {name} is not supported",
                    edatasig_xml::position(node)
                )));
            }
            return Ok(TypeRef::Named(name));
        }
        if name.ns == self.target {
            let declared = self.index.contains_key(&(Kind::ComplexType, name.local.clone()))
                || self.index.contains_key(&(Kind::SimpleType, name.local.clone()));
            if !declared {
                return Err(schema_error(format!(
                    "{}: type {name} is not declared",
                    edatasig_xml::position(node)
                )));
            }
            return Ok(TypeRef::Named(name));
        }
        if self.is_external(&name.ns) {
            return Ok(TypeRef::any_type());
        }
        Err(schema_error(format!(
            "{}: namespace '{}' is referenced but not imported",
            edatasig_xml::position(node),
            name.ns
        )))
    }

    fn qualified(node: Node<'_, '_>, default_attr: &str) -> bool {
        match node.attribute("form") {
            Some(form) => form == "qualified",
            None => node.document().root_element().attribute(default_attr) == Some("qualified"),
        }
    }

    fn occurs(node: Node<'_, '_>) -> Result<(u32, Option<u32>)> {
        let parse = |name: &str, value: &str| {
            value.trim().parse::<u32>().map_err(|_| {
                schema_error(format!(
                    "{}: invalid {name} '{value}'",
                    edatasig_xml::position(node)
                ))
            })
        };
        let min = match node.attribute("minOccurs") {
            Some(v) => parse("minOccurs", v)?,
            None => 1,
        };
        let max = match node.attribute("maxOccurs") {
            Some("unbounded") => None,
            Some(v) => Some(parse("maxOccurs", v)?),
            None => Some(1),
        };
        if max.is_some_and(|m| m < min) {
            return Err(schema_error(format!(
                "{}: maxOccurs is less than minOccurs",
                edatasig_xml::position(node)
            )));
        }
        Ok((min, max))
    }

    fn element_decl(&mut self, node: Node<'a, 'input>, global: bool) -> Result<ElementDecl> {
        let local = required_attr(node, "name")?;
        let namespace = if global || Self::qualified(node, "elementFormDefault") {
            self.target.clone()
        } else {
            String::new()
        };

        let type_ref = if let Some(ty) = node.attribute("type") {
            self.type_ref(node, ty)?
        } else if let Some(child) = xs_children(node).find(|c| c.tag_name().name() == "complexType") {
            TypeRef::Inline(Box::new(TypeDef::Complex(self.complex_type(child)?)))
        } else if let Some(child) = xs_children(node).find(|c| c.tag_name().name() == "simpleType") {
            TypeRef::Inline(Box::new(TypeDef::Simple(self.simple_type(child)?)))
        } else {
            TypeRef::any_type()
        };

        Ok(ElementDecl {
            name: QName::new(namespace, local),
            type_ref,
            fixed: node.attribute("fixed").map(str::to_owned),
            nillable: node.attribute("nillable") == Some("true"),
        })
    }

    fn particle(&mut self, node: Node<'a, 'input>) -> Result<Particle> {
        let (min, max) = Self::occurs(node)?;
        let term = match node.tag_name().name() {
            "element" => match node.attribute("ref") {
                Some(r) => {
                    let name = self.resolve_qname(node, r)?;
                    if !self.is_external(&name.ns) {
                        self.lookup(Kind::Element, &name, node)?;
                    }
                    Term::Element(ElementRef::Global(name))
                }
                None => Term::Element(ElementRef::Local(Box::new(self.element_decl(node, false)?))),
            },
            local @ ("sequence" | "choice" | "all") => {
                let compositor = match local {
                    "sequence" => Compositor::Sequence,
                    "choice" => Compositor::Choice,
                    _ => Compositor::All,
                };
                let mut particles = Vec::new();
                for child in xs_children(node) {
                    particles.push(self.particle(child)?);
                }
                Term::Group(compositor, particles)
            }
            "group" => {
                let name = self.resolve_qname(node, required_attr(node, "ref")?)?;
                let group = self.lookup(Kind::Group, &name, node)?;
                if self.group_active.contains(&name.local) {
                    return Err(schema_error(format!("group {name} refers to itself")));
                }
                let body = xs_children(group).next().ok_or_else(|| {
                    schema_error(format!("group {name} has no content model"))
                })?;
                self.group_active.push(name.local.clone());
                let inner = self.particle(body);
                self.group_active.pop();
                inner?.term
            }
            "any" => Term::Any(self.wildcard(node)),
            other => {
                return Err(schema_error(format!(
                    "{}: unsupported content model component '{other}'",
                    edatasig_xml::position(node)
                )))
            }
        };
        Ok(Particle { term, min, max })
    }

    fn wildcard(&self, node: Node<'_, '_>) -> Wildcard {
        let namespaces = match node.attribute("namespace").map(str::trim) {
            None | Some("##any") => NamespaceConstraint::Any,
            Some("##other") => NamespaceConstraint::Other(self.target.clone()),
            Some(list) => NamespaceConstraint::List(
                list.split_whitespace()
                    .map(|token| match token {
                        "##targetNamespace" => self.target.clone(),
                        "##local" => String::new(),
                        uri => uri.to_owned(),
                    })
                    .collect(),
            ),
        };
        let process = match node.attribute("processContents") {
            Some("lax") => ProcessContents::Lax,
            Some("skip") => ProcessContents::Skip,
            _ => ProcessContents::Strict,
        };
        Wildcard {
            namespaces,
            process,
        }
    }

    /// The `sequence`/`choice`/`all`/`group` child of a type or derivation.
    fn content_particle(&mut self, node: Node<'a, 'input>) -> Result<Option<Particle>> {
        match xs_children(node)
            .find(|c| matches!(c.tag_name().name(), "sequence" | "choice" | "all" | "group"))
        {
            Some(child) => self.particle(child).map(Some),
            None => Ok(None),
        }
    }

    fn attributes(
        &mut self,
        node: Node<'a, 'input>,
        uses: &mut Vec<AttributeUse>,
        any: &mut Option<Wildcard>,
    ) -> Result<()> {
        for child in xs_children(node) {
            match child.tag_name().name() {
                "attribute" => {
                    let attr = self.attribute_use(child, false)?;
                    uses.retain(|u| u.name != attr.name);
                    if child.attribute("use") != Some("prohibited") {
                        uses.push(attr);
                    }
                }
                "attributeGroup" => {
                    let name = self.resolve_qname(child, required_attr(child, "ref")?)?;
                    let group = self.lookup(Kind::AttributeGroup, &name, child)?;
                    if self.group_active.contains(&name.local) {
                        return Err(schema_error(format!(
                            "attribute group {name} refers to itself"
                        )));
                    }
                    self.group_active.push(name.local.clone());
                    let result = self.attributes(group, uses, any);
                    self.group_active.pop();
                    result?;
                }
                "anyAttribute" => *any = Some(self.wildcard(child)),
                _ => {}
            }
        }
        Ok(())
    }

    fn attribute_use(&mut self, node: Node<'a, 'input>, global: bool) -> Result<AttributeUse> {
        let required = node.attribute("use") == Some("required");
        let fixed = node.attribute("fixed").map(str::to_owned);

        if let Some(r) = node.attribute("ref") {
            let name = self.resolve_qname(node, r)?;
            if self.is_external(&name.ns) {
                return Ok(AttributeUse {
                    name,
                    type_ref: TypeRef::Named(QName::xsd("anySimpleType")),
                    required,
                    fixed,
                });
            }
            let decl = self.lookup(Kind::Attribute, &name, node)?;
            let mut attr = self.attribute_use(decl, true)?;
            attr.required = required;
            if fixed.is_some() {
                attr.fixed = fixed;
            }
            return Ok(attr);
        }

        let local = required_attr(node, "name")?;
        let namespace = if global || Self::qualified(node, "attributeFormDefault") {
            self.target.clone()
        } else {
            String::new()
        };
        let type_ref = if let Some(ty) = node.attribute("type") {
            self.type_ref(node, ty)?
        } else if let Some(child) = xs_children(node).find(|c| c.tag_name().name() == "simpleType") {
            TypeRef::Inline(Box::new(TypeDef::Simple(self.simple_type(child)?)))
        } else {
            TypeRef::Named(QName::xsd("anySimpleType"))
        };
        Ok(AttributeUse {
            name: QName::new(namespace, local),
            type_ref,
            required,
            fixed,
        })
    }

    fn complex_named(&mut self, local: &str) -> Result<ComplexType> {
        if let Some(done) = self.complex_done.get(local) {
            return Ok(done.clone());
        }
        if self.complex_active.iter().any(|n| n == local) {
            return Err(schema_error(format!(
                "complex type '{local}' is derived from itself"
            )));
        }
        let node = *self
            .index
            .get(&(Kind::ComplexType, local.to_owned()))
            .ok_or_else(|| schema_error(format!("complex type '{local}' is not declared")))?;
        self.complex_active.push(local.to_owned());
        let compiled = self.complex_type(node);
        self.complex_active.pop();
        let compiled = compiled?;
        self.complex_done.insert(local.to_owned(), compiled.clone());
        Ok(compiled)
    }

    /// The compiled base when `name` is a complex type of this schema.
    fn complex_base(&mut self, name: &QName) -> Result<Option<ComplexType>> {
        if name.ns == self.target && self.index.contains_key(&(Kind::ComplexType, name.local.clone())) {
            return self.complex_named(&name.local).map(Some);
        }
        if name.is_xsd() && name.local == "anyType" {
            return Ok(Some(ComplexType {
                mixed: false,
                content: Content::Empty,
                attributes: Vec::new(),
                any_attribute: None,
            }));
        }
        Ok(None)
    }

    fn complex_type(&mut self, node: Node<'a, 'input>) -> Result<ComplexType> {
        let mixed = node.attribute("mixed") == Some("true");
        if let Some(first) = xs_children(node).next() {
            match first.tag_name().name() {
                "simpleContent" => return self.simple_content(first),
                "complexContent" => {
                    let mixed = first.attribute("mixed").map_or(mixed, |m| m == "true");
                    return self.complex_content(first, mixed);
                }
                _ => {}
            }
        }

        let particle = self.content_particle(node)?;
        let mut attributes = Vec::new();
        let mut any_attribute = None;
        self.attributes(node, &mut attributes, &mut any_attribute)?;
        Ok(ComplexType {
            mixed,
            content: element_content(particle, mixed),
            attributes,
            any_attribute,
        })
    }

    fn derivation(node: Node<'a, 'input>) -> Result<Node<'a, 'input>> {
        xs_children(node)
            .find(|c| matches!(c.tag_name().name(), "extension" | "restriction"))
            .ok_or_else(|| {
                schema_error(format!(
                    "{}: {} requires an extension or restriction",
                    edatasig_xml::position(node),
                    node.tag_name().name()
                ))
            })
    }

    fn simple_content(&mut self, node: Node<'a, 'input>) -> Result<ComplexType> {
        let derivation = Self::derivation(node)?;
        let base_name = self.resolve_qname(derivation, required_attr(derivation, "base")?)?;
        let (mut content_type, mut attributes, mut any_attribute) = match self.complex_base(&base_name)? {
            Some(base) => match base.content {
                Content::Simple(t) => (t, base.attributes, base.any_attribute),
                _ => {
                    return Err(schema_error(format!(
                        "{}: simpleContent base {base_name} does not have simple content",
                        edatasig_xml::position(derivation)
                    )))
                }
            },
            None => (
                self.type_ref(derivation, required_attr(derivation, "base")?)?,
                Vec::new(),
                None,
            ),
        };

        if derivation.tag_name().name() == "restriction" {
            let facets = self.facets(derivation)?;
            if !facets.is_empty() {
                content_type = TypeRef::Inline(Box::new(TypeDef::Simple(SimpleType {
                    variety: Variety::Atomic(content_type),
                    facets,
                })));
            }
        }
        self.attributes(derivation, &mut attributes, &mut any_attribute)?;
        Ok(ComplexType {
            mixed: false,
            content: Content::Simple(content_type),
            attributes,
            any_attribute,
        })
    }

    fn complex_content(&mut self, node: Node<'a, 'input>, mixed: bool) -> Result<ComplexType> {
        let derivation = Self::derivation(node)?;
        let base_name = self.resolve_qname(derivation, required_attr(derivation, "base")?)?;
        let base = self.complex_base(&base_name)?.ok_or_else(|| {
            schema_error(format!(
                "{}: complexContent base {base_name} is not a complex type",
                edatasig_xml::position(derivation)
            ))
        })?;
        let own = self.content_particle(derivation)?;

        let content = if derivation.tag_name().name() == "extension" {
            match (base.content, own) {
                (Content::Elements(b), Some(o)) => Content::Elements(Particle::once(Term::Group(
                    Compositor::Sequence,
                    vec![b, o],
                ))),
                (Content::Elements(b), None) => Content::Elements(b),
                (Content::Empty, own) => element_content(own, mixed),
                (Content::Simple(_), _) => {
                    return Err(schema_error(format!(
                        "{}: complexContent cannot extend simple content",
                        edatasig_xml::position(derivation)
                    )))
                }
            }
        } else {
            element_content(own, mixed)
        };

        let mut attributes = base.attributes;
        let mut any_attribute = base.any_attribute;
        self.attributes(derivation, &mut attributes, &mut any_attribute)?;
        Ok(ComplexType {
            mixed: mixed || base.mixed,
            content,
            attributes,
            any_attribute,
        })
    }

    fn simple_type(&mut self, node: Node<'a, 'input>) -> Result<SimpleType> {
        let body = xs_children(node).next().ok_or_else(|| {
            schema_error(format!(
                "{}: simpleType has no definition",
                edatasig_xml::position(node)
            ))
        })?;
        let inline = |this: &mut Self| -> Result<Option<TypeRef>> {
            match xs_children(body).find(|c| c.tag_name().name() == "simpleType") {
                Some(child) => Ok(Some(TypeRef::Inline(Box::new(TypeDef::Simple(
                    this.simple_type(child)?,
                ))))),
                None => Ok(None),
            }
        };

        match body.tag_name().name() {
            "restriction" => {
                let base = match body.attribute("base") {
                    Some(b) => self.type_ref(body, b)?,
                    None => inline(self)?.ok_or_else(|| {
                        schema_error(format!(
                            "{}: restriction has no base type",
                            edatasig_xml::position(body)
                        ))
                    })?,
                };
                Ok(SimpleType {
                    variety: Variety::Atomic(base),
                    facets: self.facets(body)?,
                })
            }
            "list" => {
                let item = match body.attribute("itemType") {
                    Some(t) => self.type_ref(body, t)?,
                    None => inline(self)?.ok_or_else(|| {
                        schema_error(format!(
                            "{}: list has no item type",
                            edatasig_xml::position(body)
                        ))
                    })?,
                };
                Ok(SimpleType {
                    variety: Variety::List(item),
                    facets: Facets::default(),
                })
            }
            "union" => {
                let mut members = Vec::new();
                for name in body.attribute("memberTypes").unwrap_or("").split_whitespace() {
                    members.push(self.type_ref(body, name)?);
                }
                for child in xs_children(body).filter(|c| c.tag_name().name() == "simpleType") {
                    members.push(TypeRef::Inline(Box::new(TypeDef::Simple(
                        self.simple_type(child)?,
                    ))));
                }
                if members.is_empty() {
                    return Err(schema_error(format!(
                        "{}: union has no member types",
                        edatasig_xml::position(body)
                    )));
                }
                Ok(SimpleType {
                    variety: Variety::Union(members),
                    facets: Facets::default(),
                })
            }
            other => Err(schema_error(format!(
                "{}: unsupported simpleType derivation '{other}'",
                edatasig_xml::position(body)
            ))),
        }
    }

    fn facets(&self, node: Node<'_, '_>) -> Result<Facets> {
        let mut facets = Facets::default();
        for child in xs_children(node) {
            let local = child.tag_name().name();
            let value = || required_attr(child, "value");
            let number = || -> Result<usize> {
                let v = value()?;
                v.trim().parse().map_err(|_| {
                    schema_error(format!(
                        "{}: invalid {local} value '{v}'",
                        edatasig_xml::position(child)
                    ))
                })
            };
            match local {
                "enumeration" => facets.enumeration.push(value()?.to_owned()),
                "pattern" => {
                    let source = value()?.to_owned();
                    let regex = regex::Regex::new(&format!("^(?:{source})$")).ok();
                    if regex.is_none() {
                        warn!(pattern = %source, "pattern facet cannot be compiled");
                    }
                    facets.patterns.push(Pattern { source, regex });
                }
                "length" => facets.length = Some(number()?),
                "minLength" => facets.min_length = Some(number()?),
                "maxLength" => facets.max_length = Some(number()?),
                "totalDigits" => facets.total_digits = Some(number()?),
                "fractionDigits" => facets.fraction_digits = Some(number()?),
                "minInclusive" => facets.min_inclusive = Some(value()?.trim().to_owned()),
                "maxInclusive" => facets.max_inclusive = Some(value()?.trim().to_owned()),
                "minExclusive" => facets.min_exclusive = Some(value()?.trim().to_owned()),
                "maxExclusive" => facets.max_exclusive = Some(value()?.trim().to_owned()),
                _ => {}
            }
        }
        Ok(facets)
    }
}

fn element_content(particle: Option<Particle>, mixed: bool) -> Content {
    match particle {
        Some(p) => Content::Elements(p),
        None if mixed => Content::Elements(Particle::once(Term::Group(Compositor::Sequence, Vec::new()))),
        None => Content::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../../test-data/eData.xsd");

    fn edata(name: &str) -> QName {
        QName::new(ns::EDATA, name)
    }

    #[test]
    fn test_compile_edata_schema() {
        let schema = Schema::parse(SCHEMA).unwrap();
        assert_eq!(schema.target_namespace(), ns::EDATA);
        assert!(schema.element(&edata("ASTMeDataXchange")).is_some());
        assert!(schema.type_def(&edata("UnitType")).is_some());
        assert!(schema.is_imported(ns::DSIG));

        let Some(TypeDef::Complex(property)) = schema.type_def(&edata("PropertyType")) else {
            panic!("PropertyType should be complex");
        };
        assert!(matches!(property.content, Content::Simple(_)));
        let names: Vec<_> = property.attributes.iter().map(|a| a.name.local.as_str()).collect();
        assert_eq!(names, ["name", "unit"]);
        assert!(property.attributes[0].required);
        assert!(property.attributes[0].name.ns.is_empty());
    }

    #[test]
    fn test_wrong_target_namespace() {
        let text = SCHEMA.replace(
            "targetNamespace=\"http://www.astm.org/E55/03/eDataXchange\"",
            "targetNamespace=\"urn:other\"",
        );
        let err = Schema::parse(&text).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_undeclared_type() {
        let text = SCHEMA.replace("type=\"OriginatorType\"", "type=\"MissingType\"");
        let err = Schema::parse(&text).unwrap_err();
        assert!(err.to_string().contains("MissingType"));
    }

    #[test]
    fn test_group_and_extension() {
        let text = format!(
            r#"<xs:schema xmlns:xs="{xsd}" xmlns="{tns}" targetNamespace="{tns}" elementFormDefault="qualified">
  <xs:group name="Pair">
    <xs:sequence><xs:element name="A" type="xs:string"/><xs:element name="B" type="xs:int"/></xs:sequence>
  </xs:group>
  <xs:attributeGroup name="Common"><xs:attribute name="id" type="xs:ID"/></xs:attributeGroup>
  <xs:complexType name="Base">
    <xs:group ref="Pair"/>
    <xs:attributeGroup ref="Common"/>
  </xs:complexType>
  <xs:complexType name="Derived">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence><xs:element name="C" type="xs:string" minOccurs="0"/></xs:sequence>
        <xs:attribute name="extra" type="xs:boolean"/>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="Root" type="Derived"/>
</xs:schema>"#,
            xsd = ns::XSD,
            tns = ns::EDATA
        );
        let schema = Schema::parse(&text).unwrap();
        let Some(TypeDef::Complex(derived)) = schema.type_def(&edata("Derived")) else {
            panic!("Derived should be complex");
        };
        assert_eq!(derived.attributes.len(), 2);
        let Content::Elements(particle) = &derived.content else {
            panic!("Derived should have element content");
        };
        assert!(matches!(&particle.term, Term::Group(Compositor::Sequence, parts) if parts.len() == 2));
    }

    #[test]
    fn test_include_needs_location() {
        let text = SCHEMA.replace(
            "<xs:import",
            "<xs:include schemaLocation=\"more.xsd\"/>\n  <xs:import",
        );
        assert!(matches!(Schema::parse(&text), Err(Error::Schema(_))));
    }

    #[test]
    fn test_load_with_include() {
        let dir = tempfile::tempdir().unwrap();
        let main = SCHEMA
            .replace(
                "<xs:import",
                "<xs:include schemaLocation=\"units.xsd\"/>\n  <xs:import",
            )
            .replace("<xs:simpleType name=\"UnitType\">", "<xs:simpleType name=\"UnitTypeMoved\">");
        std::fs::write(dir.path().join("main.xsd"), main).unwrap();
        std::fs::write(
            dir.path().join("units.xsd"),
            format!(
                r#"<xs:schema xmlns:xs="{}"><xs:simpleType name="UnitType"><xs:restriction base="xs:string"/></xs:simpleType></xs:schema>"#,
                ns::XSD
            ),
        )
        .unwrap();
        let schema = Schema::load(dir.path().join("main.xsd")).unwrap();
        assert!(schema.type_def(&edata("UnitType")).is_some());
        assert!(schema.type_def(&edata("UnitTypeMoved")).is_some());
    }

    #[test]
    fn test_missing_file() {
        let err = Schema::load("/nonexistent/eData.xsd").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
