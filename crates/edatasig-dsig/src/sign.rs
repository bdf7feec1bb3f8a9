#![forbid(unsafe_code)]

//! Enveloped signature creation.
//!
//! The signature covers the whole document (`Reference URI=""`) through the
//! enveloped-signature transform, is canonicalized with C14N 1.0 and is
//! appended as the last child of `FileInformation`. Nothing is written to
//! the destination until the signed document is complete in memory.

use std::path::Path;

use base64::Engine;
use edatasig_c14n::C14nMode;
use edatasig_core::{algorithm, Error, Result, SignatureType};
use edatasig_crypto::{digest, sign as crypto_sign, SigningKey};
use edatasig_keys::keyinfo;
use edatasig_xml::{EdataDocument, NodeSet};
use tracing::{debug, info};

use crate::locate::{locate, locate_xml, SignatureState};

/// Sign with a DSA private key, embedding its public key as `DSAKeyValue`,
/// and write the result to `destination`.
pub fn sign_dsa(
    doc: &EdataDocument,
    key: &dsa::SigningKey,
    destination: impl AsRef<Path>,
) -> Result<EdataDocument> {
    let key_info = keyinfo::write_dsa_key_info(key.verifying_key());
    let signed = sign_document(doc, &SigningKey::Dsa(key.clone()), Some(&key_info))
        .map_err(Error::into_signing)?;
    write(doc, &signed, destination.as_ref())?;
    Ok(signed)
}

/// Sign with HMAC-SHA1 over `secret` and write the result to `destination`.
/// No `KeyInfo` is written.
pub fn sign_hmac(
    doc: &EdataDocument,
    secret: &[u8],
    destination: impl AsRef<Path>,
) -> Result<EdataDocument> {
    if secret.is_empty() {
        return Err(Error::Signing("the HMAC secret is empty".into()));
    }
    let signed = sign_document(doc, &SigningKey::Hmac(secret.to_vec()), None)
        .map_err(Error::into_signing)?;
    write(doc, &signed, destination.as_ref())?;
    Ok(signed)
}

fn write(source: &EdataDocument, signed: &EdataDocument, destination: &Path) -> Result<()> {
    if let Some(src) = source.source() {
        if same_file(src, destination) {
            return Err(Error::Signing(format!(
                "the destination {} is the source document",
                destination.display()
            )));
        }
    }
    signed.serialize(destination).map_err(Error::into_signing)
}

/// Whether two paths name the same file. The destination may not exist yet.
fn same_file(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| {
        p.canonicalize().ok().or_else(|| {
            let parent = match p.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            Some(parent.canonicalize().ok()?.join(p.file_name()?))
        })
    };
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Build the signed document in memory.
///
/// The document must not carry a signature yet. `key_info` is appended to
/// the signature verbatim.
pub fn sign_document(
    doc: &EdataDocument,
    key: &SigningKey,
    key_info: Option<&str>,
) -> Result<EdataDocument> {
    match locate(doc) {
        SignatureState::Absent => {}
        SignatureState::Found(_) | SignatureState::Ambiguous => {
            return Err(Error::Signing(
                "the document already carries a signature".into(),
            ))
        }
    }

    let signature_type = match key {
        SigningKey::Dsa(_) => SignatureType::Dsa,
        SigningKey::Hmac(_) => SignatureType::HmacSha1,
        SigningKey::DsaPublic(_) => {
            return Err(Error::Key("a DSA private key is required to sign".into()))
        }
    };
    let method_uri = signature_type
        .method_uri()
        .ok_or_else(|| Error::UnsupportedAlgorithm(signature_type.to_string()))?;
    info!(method = method_uri, "signing eData document");

    let reference_digest = digest::digest(algorithm::SHA1, edatasig_c14n::canonical_bytes(doc)?)?;
    let digest_b64 = base64::engine::general_purpose::STANDARD.encode(reference_digest);

    let mut template = doc.clone();
    template.append_signature(&signature_xml(method_uri, &digest_b64, "", key_info))?;
    let signed_info = {
        let xml = template.parse_doc()?;
        let SignatureState::Found(descriptor) = locate_xml(&xml) else {
            return Err(Error::Structure("the appended signature cannot be located".into()));
        };
        let node = descriptor
            .signed_info
            .and_then(|id| xml.get_node(id))
            .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
        edatasig_c14n::canonicalize_doc(
            &xml,
            C14nMode::Inclusive,
            Some(&NodeSet::tree_without_comments(node)),
        )?
    };
    debug!(bytes = signed_info.len(), "canonicalized SignedInfo");

    let value = crypto_sign::from_uri(method_uri)?.sign(key, &signed_info)?;
    let value_b64 = base64::engine::general_purpose::STANDARD.encode(value);

    let mut signed = doc.clone();
    signed.append_signature(&signature_xml(method_uri, &digest_b64, &value_b64, key_info))?;
    Ok(signed)
}

/// The `<Signature>` element text. Children inherit the dsig default
/// namespace.
fn signature_xml(method_uri: &str, digest: &str, value: &str, key_info: Option<&str>) -> String {
    format!(
        concat!(
            r#"<Signature xmlns="{dsig}"><SignedInfo>"#,
            r#"<CanonicalizationMethod Algorithm="{c14n}" />"#,
            r#"<SignatureMethod Algorithm="{method}" />"#,
            r#"<Reference URI=""><Transforms><Transform Algorithm="{enveloped}" /></Transforms>"#,
            r#"<DigestMethod Algorithm="{sha1}" /><DigestValue>{digest}</DigestValue></Reference>"#,
            r#"</SignedInfo><SignatureValue>{value}</SignatureValue>{key_info}</Signature>"#
        ),
        dsig = edatasig_core::ns::DSIG,
        c14n = algorithm::C14N,
        method = method_uri,
        enveloped = algorithm::ENVELOPED_SIGNATURE,
        sha1 = algorithm::SHA1,
        digest = digest,
        value = value,
        key_info = key_info.unwrap_or(""),
    )
}
