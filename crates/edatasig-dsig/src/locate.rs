#![forbid(unsafe_code)]

//! Signature locator.
//!
//! Finds `ds:Signature` elements at `/x:ASTMeDataXchange/x:FileInformation`
//! and reads the single one, if there is exactly one, into a
//! [`SignatureDescriptor`].

use base64::Engine;
use edatasig_core::{ns, Error, SignatureType};
use edatasig_keys::{keyinfo, Key};
use edatasig_xml::query::{find_child, find_children};
use edatasig_xml::{EdataDocument, EdataPath};
use roxmltree::{Document, Node, NodeId};
use tracing::{debug, warn};

/// Everything a verifier needs from one signature element.
#[derive(Debug)]
pub struct SignatureDescriptor {
    pub signature_type: SignatureType,
    pub method_uri: String,
    pub c14n_uri: String,
    pub reference_uri: String,
    /// `Transform/@Algorithm` values in document order.
    pub transforms: Vec<String>,
    pub digest_method: String,
    pub digest_value: Vec<u8>,
    pub signature_value: Vec<u8>,
    /// `HMACOutputLength` in bits, when present.
    pub hmac_output_length: Option<u32>,
    /// The DSA public key carried in `KeyInfo/KeyValue`, if any.
    pub embedded_key: Option<Key>,
    /// Why a `KeyInfo` that is present could not be read.
    pub embedded_key_error: Option<String>,
    /// Why the signature is unusable, for an `Invalid` descriptor.
    pub problem: Option<String>,
    pub(crate) signature: NodeId,
    pub(crate) signed_info: Option<NodeId>,
}

impl SignatureDescriptor {
    fn invalid(signature: NodeId, problem: String) -> Self {
        Self {
            signature_type: SignatureType::Invalid,
            method_uri: String::new(),
            c14n_uri: String::new(),
            reference_uri: String::new(),
            transforms: Vec::new(),
            digest_method: String::new(),
            digest_value: Vec::new(),
            signature_value: Vec::new(),
            hmac_output_length: None,
            embedded_key: None,
            embedded_key_error: None,
            problem: Some(problem),
            signature,
            signed_info: None,
        }
    }
}

/// Where the document stands with respect to signatures.
#[derive(Debug)]
pub enum SignatureState {
    Absent,
    Found(SignatureDescriptor),
    /// Two or more signatures; none of them is ever picked.
    Ambiguous,
}

impl SignatureState {
    pub fn signature_type(&self) -> SignatureType {
        match self {
            SignatureState::Absent => SignatureType::None,
            SignatureState::Found(d) => d.signature_type,
            SignatureState::Ambiguous => SignatureType::Invalid,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SignatureState::Absent)
    }
}

/// Locate the signature of a loaded document.
pub fn locate(doc: &EdataDocument) -> SignatureState {
    match doc.parse_doc() {
        Ok(xml) => locate_xml(&xml),
        // A loaded document always parses; treat the impossible case as absent.
        Err(e) => {
            warn!(error = %e, "document no longer parses");
            SignatureState::Absent
        }
    }
}

/// Locate the signature in a parsed document. Descriptor node ids refer to
/// `xml`.
pub fn locate_xml(xml: &Document<'_>) -> SignatureState {
    let signatures = EdataPath::Signature.select(xml);
    debug!(count = signatures.len(), path = %EdataPath::Signature, "located signatures");
    match signatures.as_slice() {
        [] => SignatureState::Absent,
        [signature] => SignatureState::Found(match describe(*signature) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(error = %e, "signature cannot be read");
                SignatureDescriptor::invalid(signature.id(), e.to_string())
            }
        }),
        _ => SignatureState::Ambiguous,
    }
}

fn dsig_child<'a, 'input>(parent: Node<'a, 'input>, local: &str) -> Result<Node<'a, 'input>, Error> {
    find_child(parent, ns::DSIG, local).ok_or_else(|| Error::MissingElement(local.into()))
}

fn algorithm_of(node: Node<'_, '_>) -> Result<String, Error> {
    node.attribute(ns::attr::ALGORITHM)
        .map(|a| a.trim().to_owned())
        .ok_or_else(|| {
            Error::MissingAttribute(format!("Algorithm on {}", node.tag_name().name()))
        })
}

fn base64_text(node: Node<'_, '_>) -> Result<Vec<u8>, Error> {
    let clean: String = node
        .text()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(clean)
        .map_err(|e| Error::Base64(format!("{}: {e}", node.tag_name().name())))
}

fn describe(signature: Node<'_, '_>) -> Result<SignatureDescriptor, Error> {
    let signed_info = dsig_child(signature, ns::node::SIGNED_INFO)?;
    let c14n_uri = algorithm_of(dsig_child(signed_info, ns::node::CANONICALIZATION_METHOD)?)?;
    let method = dsig_child(signed_info, ns::node::SIGNATURE_METHOD)?;
    let method_uri = algorithm_of(method)?;

    let hmac_output_length = match find_child(method, ns::DSIG, ns::node::HMAC_OUTPUT_LENGTH) {
        Some(node) => {
            let text = node.text().unwrap_or("").trim();
            Some(text.parse::<u32>().map_err(|_| {
                Error::SignatureUnsupported(format!("invalid HMACOutputLength '{text}'"))
            })?)
        }
        None => None,
    };

    let references = find_children(signed_info, ns::DSIG, ns::node::REFERENCE);
    let [reference] = references.as_slice() else {
        return Err(Error::SignatureUnsupported(format!(
            "expected exactly one Reference, found {}",
            references.len()
        )));
    };
    let reference_uri = reference
        .attribute(ns::attr::URI)
        .ok_or_else(|| Error::MissingAttribute("URI on Reference".into()))?
        .to_owned();
    let mut transforms = Vec::new();
    if let Some(list) = find_child(*reference, ns::DSIG, ns::node::TRANSFORMS) {
        for transform in find_children(list, ns::DSIG, ns::node::TRANSFORM) {
            transforms.push(algorithm_of(transform)?);
        }
    }
    let digest_method = algorithm_of(dsig_child(*reference, ns::node::DIGEST_METHOD)?)?;
    let digest_value = base64_text(dsig_child(*reference, ns::node::DIGEST_VALUE)?)?;
    let signature_value = base64_text(dsig_child(signature, ns::node::SIGNATURE_VALUE)?)?;

    let (embedded_key, embedded_key_error) = match find_child(signature, ns::DSIG, ns::node::KEY_INFO) {
        Some(key_info) => match keyinfo::extract_key_value(key_info) {
            Ok(key) => (Some(key), None),
            Err(e) => (None, Some(e.to_string())),
        },
        None => (None, None),
    };

    let signature_type = SignatureType::from_method_uri(&method_uri);
    let problem = (signature_type == SignatureType::Invalid)
        .then(|| format!("unsupported signature method {method_uri}"));

    Ok(SignatureDescriptor {
        signature_type,
        method_uri,
        c14n_uri,
        reference_uri,
        transforms,
        digest_method,
        digest_value,
        signature_value,
        hmac_output_length,
        embedded_key,
        embedded_key_error,
        problem,
        signature: signature.id(),
        signed_info: Some(signed_info.id()),
    })
}
