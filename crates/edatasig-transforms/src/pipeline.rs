#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use edatasig_c14n::C14nMode;
use edatasig_core::{algorithm, Error};
use edatasig_xml::NodeSet;
use roxmltree::{Document, NodeId};
use tracing::debug;

use crate::enveloped::EnvelopedSignatureTransform;

/// Data flowing through the transform pipeline.
pub enum TransformData<'d, 'input> {
    /// A node set over a parsed document (for XML-aware transforms).
    Xml {
        doc: &'d Document<'input>,
        node_set: NodeSet,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData<'_, '_> {
    /// Convert to octets, applying C14N 1.0 without comments to a node set.
    pub fn into_binary(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml { doc, node_set } => {
                edatasig_c14n::canonicalize_doc(doc, C14nMode::Inclusive, Some(&node_set))
            }
        }
    }
}

/// Trait for individual transforms.
pub trait Transform: Send {
    /// The algorithm URI for this transform.
    fn uri(&self) -> &str;

    /// Execute the transform on the given data.
    fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pipeline for a reference's `Transform` algorithm URIs.
    ///
    /// Only the enveloped-signature transform and C14N 1.0 (with or without
    /// comments) are accepted. `signature` is the `Signature` element the
    /// enveloped transform removes.
    pub fn from_uris<S: AsRef<str>>(uris: &[S], signature: NodeId) -> Result<Self, Error> {
        let mut pipeline = Self::new();
        for uri in uris {
            let uri = uri.as_ref().trim();
            if uri == algorithm::ENVELOPED_SIGNATURE {
                pipeline.push(Box::new(EnvelopedSignatureTransform::new(signature)));
            } else if let Some(mode) = C14nMode::from_uri(uri) {
                pipeline.push(Box::new(C14nTransform::new(mode)));
            } else {
                return Err(Error::UnsupportedAlgorithm(format!("transform {uri}")));
            }
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Execute all transforms in order.
    pub fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            debug!(transform = transform.uri(), "applying transform");
            data = transform.execute(data)?;
        }
        Ok(data)
    }

    /// Execute all transforms and return the octets to digest.
    pub fn digest_input(&self, input: TransformData<'_, '_>) -> Result<Vec<u8>, Error> {
        self.execute(input)?.into_binary()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
pub struct C14nTransform {
    mode: C14nMode,
}

impl C14nTransform {
    pub fn new(mode: C14nMode) -> Self {
        Self { mode }
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error> {
        match input {
            TransformData::Xml { doc, node_set } => {
                let bytes = edatasig_c14n::canonicalize_doc(doc, self.mode, Some(&node_set))?;
                Ok(TransformData::Binary(bytes))
            }
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                let bytes = edatasig_c14n::canonicalize(text, self.mode, None)?;
                Ok(TransformData::Binary(bytes))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edatasig_core::ns;

    const SIGNED: &str = concat!(
        r#"<r xmlns="urn:x"><!-- note --><a>1</a>"#,
        r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo/></Signature>"#,
        r#"</r>"#
    );

    fn signature_id(doc: &Document<'_>) -> NodeId {
        doc.descendants()
            .find(|n| n.has_tag_name((ns::DSIG, "Signature")))
            .map(|n| n.id())
            .unwrap()
    }

    #[test]
    fn test_enveloped_then_c14n() {
        let doc = roxmltree::Document::parse(SIGNED).unwrap();
        let pipeline = TransformPipeline::from_uris(
            &[algorithm::ENVELOPED_SIGNATURE, algorithm::C14N],
            signature_id(&doc),
        )
        .unwrap();
        assert_eq!(pipeline.len(), 2);
        let input = TransformData::Xml {
            doc: &doc,
            node_set: NodeSet::all_without_comments(&doc),
        };
        let out = pipeline.digest_input(input).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), r#"<r xmlns="urn:x"><a>1</a></r>"#);
    }

    #[test]
    fn test_empty_pipeline_defaults_to_c14n() {
        let doc = roxmltree::Document::parse("<a b='1'  c=\"2\"/>").unwrap();
        let pipeline = TransformPipeline::new();
        assert!(pipeline.is_empty());
        let out = pipeline
            .digest_input(TransformData::Xml {
                doc: &doc,
                node_set: NodeSet::all(&doc),
            })
            .unwrap();
        assert_eq!(out, br#"<a b="1" c="2"></a>"#);
    }

    #[test]
    fn test_unsupported_transform() {
        let doc = roxmltree::Document::parse(SIGNED).unwrap();
        let err = TransformPipeline::from_uris(
            &["http://www.w3.org/TR/1999/REC-xpath-19991116"],
            signature_id(&doc),
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }

    #[test]
    fn test_c14n_on_binary_input() {
        let transform = C14nTransform::new(C14nMode::Inclusive);
        let out = transform
            .execute(TransformData::Binary(b"<x  a='1'><!--c--></x>".to_vec()))
            .unwrap()
            .into_binary()
            .unwrap();
        assert_eq!(out, b"<x a=\"1\"></x>");
    }
}
