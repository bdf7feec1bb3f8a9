#![forbid(unsafe_code)]

//! Typed query layer for the fixed eData structure.
//!
//! Every namespace-qualified location the workspace reads is named here,
//! so the structural contract of an eData file lives in one place.

use edatasig_core::ns::{self, node};

/// Prefix bindings used when rendering a path for diagnostics.
const BINDINGS: &[(&str, &str)] = &[("x", ns::EDATA), ("y", ns::DSIG)];

/// A fixed absolute location inside an eData document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdataPath {
    /// `/x:ASTMeDataXchange`
    Root,
    /// `/x:ASTMeDataXchange/x:FileInformation`
    FileInformation,
    /// `/x:ASTMeDataXchange/x:MaterialDataGroup`
    MaterialDataGroup,
    /// `/x:ASTMeDataXchange/x:MaterialDataGroup/x:MaterialData`
    MaterialData,
    /// `/x:ASTMeDataXchange/x:FileInformation/y:Signature`
    Signature,
}

type Step = (&'static str, &'static str);

const ROOT: Step = (ns::EDATA, node::ASTM_EDATA_XCHANGE);
const FILE_INFORMATION: Step = (ns::EDATA, node::FILE_INFORMATION);
const MATERIAL_DATA_GROUP: Step = (ns::EDATA, node::MATERIAL_DATA_GROUP);
const MATERIAL_DATA: Step = (ns::EDATA, node::MATERIAL_DATA);
const SIGNATURE: Step = (ns::DSIG, node::SIGNATURE);

impl EdataPath {
    /// The `(namespace, local-name)` steps from the document root.
    pub fn steps(&self) -> &'static [Step] {
        match self {
            EdataPath::Root => &[ROOT],
            EdataPath::FileInformation => &[ROOT, FILE_INFORMATION],
            EdataPath::MaterialDataGroup => &[ROOT, MATERIAL_DATA_GROUP],
            EdataPath::MaterialData => &[ROOT, MATERIAL_DATA_GROUP, MATERIAL_DATA],
            EdataPath::Signature => &[ROOT, FILE_INFORMATION, SIGNATURE],
        }
    }

    /// All elements at this location, in document order.
    pub fn select<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
    ) -> Vec<roxmltree::Node<'a, 'input>> {
        let mut current = vec![doc.root()];
        for (ns_uri, local) in self.steps() {
            current = current
                .into_iter()
                .flat_map(|n| n.children())
                .filter(|c| is_element(c, ns_uri, local))
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// The first element at this location.
    pub fn first<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
    ) -> Option<roxmltree::Node<'a, 'input>> {
        self.select(doc).into_iter().next()
    }

    /// Number of elements at this location.
    pub fn count(&self, doc: &roxmltree::Document<'_>) -> usize {
        self.select(doc).len()
    }

    /// Render as a prefixed path expression, e.g. `/x:ASTMeDataXchange/x:FileInformation`.
    pub fn expression(&self) -> String {
        let mut out = String::new();
        for (ns_uri, local) in self.steps() {
            let prefix = BINDINGS
                .iter()
                .find(|(_, uri)| uri == ns_uri)
                .map(|(p, _)| *p)
                .unwrap_or("");
            out.push('/');
            out.push_str(prefix);
            out.push(':');
            out.push_str(local);
        }
        out
    }
}

impl std::fmt::Display for EdataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression())
    }
}

/// Check whether a node is an element with the given namespace and local name.
pub fn is_element(node: &roxmltree::Node<'_, '_>, ns_uri: &str, local: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local
        && node.tag_name().namespace().unwrap_or("") == ns_uri
}

/// Find the first child element with the given local name and namespace.
pub fn find_child<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    parent.children().find(|c| is_element(c, ns_uri, local))
}

/// Find all child elements with the given local name and namespace.
pub fn find_children<'a, 'input>(
    parent: roxmltree::Node<'a, 'input>,
    ns_uri: &str,
    local: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    parent
        .children()
        .filter(|c| is_element(c, ns_uri, local))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<ASTMeDataXchange xmlns="http://www.astm.org/E55/03/eDataXchange">
  <FileInformation>
    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/>
  </FileInformation>
  <MaterialDataGroup>
    <MaterialData/>
    <MaterialData/>
    <Other/>
  </MaterialDataGroup>
</ASTMeDataXchange>"#;

    #[test]
    fn test_select_material_data() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        assert_eq!(EdataPath::MaterialData.count(&doc), 2);
        assert_eq!(EdataPath::Signature.count(&doc), 1);
        assert!(EdataPath::FileInformation.first(&doc).is_some());
    }

    #[test]
    fn test_wrong_namespace_does_not_match() {
        let xml = r#"<ASTMeDataXchange xmlns="urn:other"><FileInformation/></ASTMeDataXchange>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        assert!(EdataPath::Root.first(&doc).is_none());
        assert!(EdataPath::FileInformation.first(&doc).is_none());
    }

    #[test]
    fn test_signature_elsewhere_is_ignored() {
        let xml = r#"<ASTMeDataXchange xmlns="http://www.astm.org/E55/03/eDataXchange">
  <FileInformation/>
  <Signature xmlns="http://www.w3.org/2000/09/xmldsig#"/>
</ASTMeDataXchange>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        assert_eq!(EdataPath::Signature.count(&doc), 0);
    }

    #[test]
    fn test_expression() {
        assert_eq!(
            EdataPath::Signature.expression(),
            "/x:ASTMeDataXchange/x:FileInformation/y:Signature"
        );
    }
}
