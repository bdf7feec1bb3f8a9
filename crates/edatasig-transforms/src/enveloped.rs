#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the `<Signature>` element that contains the reference, with all
//! of its descendants, from the node set.

use edatasig_core::{algorithm, Error};
use roxmltree::NodeId;

use crate::pipeline::{Transform, TransformData};

pub struct EnvelopedSignatureTransform {
    signature: NodeId,
}

impl EnvelopedSignatureTransform {
    /// `signature` must come from the document the pipeline runs on.
    pub fn new(signature: NodeId) -> Self {
        Self { signature }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error> {
        match input {
            TransformData::Xml { doc, mut node_set } => {
                let signature = doc.get_node(self.signature).ok_or_else(|| {
                    Error::Transform("the enveloping Signature element is not in the document".into())
                })?;
                node_set.remove_subtree(signature);
                Ok(TransformData::Xml { doc, node_set })
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edatasig_xml::NodeSet;

    #[test]
    fn test_removes_signature_subtree() {
        let doc = roxmltree::Document::parse("<r><a/><s><t>x</t></s></r>").unwrap();
        let s = doc.descendants().find(|n| n.has_tag_name("s")).unwrap();
        let all = NodeSet::all(&doc);
        let out = EnvelopedSignatureTransform::new(s.id())
            .execute(TransformData::Xml {
                doc: &doc,
                node_set: all.clone(),
            })
            .unwrap();
        let TransformData::Xml { node_set, .. } = out else {
            panic!("expected a node set");
        };
        assert_eq!(node_set.len(), all.len() - 3);
        assert!(!node_set.contains(&s));
    }

    #[test]
    fn test_binary_input_rejected() {
        let doc = roxmltree::Document::parse("<r/>").unwrap();
        let transform = EnvelopedSignatureTransform::new(doc.root_element().id());
        assert!(transform.execute(TransformData::Binary(Vec::new())).is_err());
    }
}
