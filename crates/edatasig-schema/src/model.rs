#![forbid(unsafe_code)]

//! Compiled schema components.

use std::collections::HashMap;
use std::fmt;

use edatasig_core::ns;

/// An expanded name: namespace URI (empty for none) and local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub ns: String,
    pub local: String,
}

impl QName {
    pub fn new(ns: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            local: local.into(),
        }
    }

    /// A built-in XML Schema type name.
    pub fn xsd(local: &str) -> Self {
        Self::new(ns::XSD, local)
    }

    pub fn of(node: &roxmltree::Node<'_, '_>) -> Self {
        Self::new(
            node.tag_name().namespace().unwrap_or(""),
            node.tag_name().name(),
        )
    }

    pub fn is_xsd(&self) -> bool {
        self.ns == ns::XSD
    }
}

impl fmt::Display for QName {
    /// `'local' in namespace 'ns'`, or `'local'` without a namespace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "'{}'", self.local)
        } else {
            write!(f, "'{}' in namespace '{}'", self.local, self.ns)
        }
    }
}

/// A compiled schema bound to one target namespace.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) target_namespace: String,
    pub(crate) elements: HashMap<QName, ElementDecl>,
    pub(crate) types: HashMap<QName, TypeDef>,
    /// Namespaces imported without a schema location.
    pub(crate) imported: Vec<String>,
}

impl Schema {
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// Global element declaration by name.
    pub fn element(&self, name: &QName) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    /// Named type definition.
    pub fn type_def(&self, name: &QName) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Whether the namespace was imported without schema information.
    pub fn is_imported(&self, ns: &str) -> bool {
        self.imported.iter().any(|n| n == ns)
    }
}

/// Reference to a type: by name, or an anonymous definition.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Named(QName),
    Inline(Box<TypeDef>),
}

impl TypeRef {
    pub fn any_type() -> Self {
        TypeRef::Named(QName::xsd("anyType"))
    }

    /// The name used in diagnostics.
    pub fn display_name(&self) -> String {
        match self {
            TypeRef::Named(q) => q.local.clone(),
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Simple(s) => s.base_display_name(),
                TypeDef::Complex(_) => "anonymous".into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeDef {
    Simple(SimpleType),
    Complex(ComplexType),
}

#[derive(Debug, Clone)]
pub struct ElementDecl {
    pub name: QName,
    pub type_ref: TypeRef,
    pub fixed: Option<String>,
    pub nillable: bool,
}

/// A reference from a content model to an element declaration.
#[derive(Debug, Clone)]
pub enum ElementRef {
    Local(Box<ElementDecl>),
    Global(QName),
}

impl ElementRef {
    pub fn name(&self) -> &QName {
        match self {
            ElementRef::Local(decl) => &decl.name,
            ElementRef::Global(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

#[derive(Debug, Clone)]
pub enum Term {
    Element(ElementRef),
    Group(Compositor, Vec<Particle>),
    Any(Wildcard),
}

/// A term with occurrence bounds. `max` of `None` is unbounded.
#[derive(Debug, Clone)]
pub struct Particle {
    pub term: Term,
    pub min: u32,
    pub max: Option<u32>,
}

impl Particle {
    pub fn once(term: Term) -> Self {
        Self {
            term,
            min: 1,
            max: Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceConstraint {
    /// `##any`
    Any,
    /// `##other`: any namespace except the target namespace and no namespace.
    Other(String),
    /// An explicit list; the empty string stands for no namespace.
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Wildcard {
    pub namespaces: NamespaceConstraint,
    pub process: ProcessContents,
}

impl Wildcard {
    pub fn allows(&self, ns: &str) -> bool {
        match &self.namespaces {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => !ns.is_empty() && ns != target,
            NamespaceConstraint::List(list) => list.iter().any(|n| n == ns),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeUse {
    pub name: QName,
    pub type_ref: TypeRef,
    pub required: bool,
    pub fixed: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Content {
    Empty,
    Simple(TypeRef),
    Elements(Particle),
}

#[derive(Debug, Clone)]
pub struct ComplexType {
    pub mixed: bool,
    pub content: Content,
    pub attributes: Vec<AttributeUse>,
    pub any_attribute: Option<Wildcard>,
}

#[derive(Debug, Clone)]
pub enum Variety {
    /// Restriction of a base type, which may itself be user-defined.
    Atomic(TypeRef),
    List(TypeRef),
    Union(Vec<TypeRef>),
}

#[derive(Debug, Clone)]
pub struct SimpleType {
    pub variety: Variety,
    pub facets: Facets,
}

impl SimpleType {
    fn base_display_name(&self) -> String {
        match &self.variety {
            Variety::Atomic(base) => base.display_name(),
            Variety::List(_) => "list".into(),
            Variety::Union(_) => "union".into(),
        }
    }
}

/// A compiled `pattern` facet. `regex` is `None` when the XSD expression has
/// no equivalent in the `regex` crate.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub regex: Option<regex::Regex>,
}

#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub enumeration: Vec<String>,
    /// Patterns from one derivation step are alternatives; each step must match.
    pub patterns: Vec<Pattern>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub total_digits: Option<usize>,
    pub fraction_digits: Option<usize>,
}

impl Facets {
    pub fn is_empty(&self) -> bool {
        self.enumeration.is_empty()
            && self.patterns.is_empty()
            && self.length.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min_inclusive.is_none()
            && self.max_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_exclusive.is_none()
            && self.total_digits.is_none()
            && self.fraction_digits.is_none()
    }
}
