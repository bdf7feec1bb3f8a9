#![forbid(unsafe_code)]

//! XML Canonicalization (C14N).
//!
//! Implements Canonical XML 1.0, with and without comments, over a whole
//! document or a document subset given as a [`NodeSet`].

pub mod escape;
pub mod inclusive;

use edatasig_core::{algorithm, Error};
use edatasig_xml::{EdataDocument, NodeSet};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments)
    }
}

/// Canonicalize XML text.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `node_set`: optional node set (for document-subset canonicalization);
///   its ids must come from parsing the same `xml`
pub fn canonicalize(xml: &str, mode: C14nMode, node_set: Option<&NodeSet>) -> Result<Vec<u8>, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, edatasig_xml::parsing_options())
        .map_err(|e| Error::MalformedXml(e.to_string()))?;
    canonicalize_doc(&doc, mode, node_set)
}

/// Canonicalize a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    inclusive::canonicalize(doc, mode.with_comments(), node_set)
}

/// Canonical form (C14N 1.0, no comments) of a whole eData document, cached
/// on the document until it changes.
pub fn canonical_bytes(doc: &EdataDocument) -> Result<&[u8], Error> {
    doc.canonical_with(|parsed| canonicalize_doc(parsed, C14nMode::Inclusive, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_uris() {
        for mode in [C14nMode::Inclusive, C14nMode::InclusiveWithComments] {
            assert_eq!(C14nMode::from_uri(mode.uri()), Some(mode));
        }
        assert_eq!(
            C14nMode::from_uri("http://www.w3.org/2001/10/xml-exc-c14n#"),
            None
        );
    }

    #[test]
    fn test_canonical_bytes_cached() {
        let doc = EdataDocument::from_text("<?xml version=\"1.0\"?>\n<a  b='1'><!--x--><c/></a>".into())
            .unwrap();
        assert!(!doc.has_cached_canonical());
        let first = canonical_bytes(&doc).unwrap().to_vec();
        assert!(doc.has_cached_canonical());
        assert_eq!(first, b"<a b=\"1\"><c></c></a>");
        assert_eq!(canonical_bytes(&doc).unwrap(), first.as_slice());
    }
}
