#![forbid(unsafe_code)]

//! KeyInfo XML processing: reads and writes `<ds:KeyInfo>` DSA key values.

use base64::Engine;
use edatasig_core::{ns, Error};
use edatasig_xml::query::find_child;

use crate::key::{Key, KeyData, KeyUsage};

/// Decode a CryptoBinary value, ignoring embedded whitespace.
fn decode_crypto_binary(text: &str) -> Result<Vec<u8>, String> {
    let clean: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return Err("empty value".into());
    }
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| e.to_string())
}

/// Encode a big-endian integer as CryptoBinary.
fn encode_crypto_binary(value: &dsa::BigUint) -> String {
    base64::engine::general_purpose::STANDARD.encode(value.to_bytes_be())
}

/// Extract a key from a `<KeyInfo>` element: the first `<KeyValue>` holding
/// a `<DSAKeyValue>`.
pub fn extract_key_value(key_info_node: roxmltree::Node<'_, '_>) -> Result<Key, Error> {
    let mut last_err = Error::MissingElement("KeyValue".into());
    for key_value in key_info_node.children().filter(|n| {
        n.is_element()
            && n.tag_name().name() == ns::node::KEY_VALUE
            && n.tag_name().namespace() == Some(ns::DSIG)
    }) {
        match parse_dsa_key_value(key_value) {
            Ok(key) => return Ok(key),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Extract a DSA public key from a `<KeyValue><DSAKeyValue>` element.
///
/// DSAKeyValue contains P, Q, G (domain parameters) and Y (public key).
/// The optional J, Seed and PgenCounter are ignored.
pub fn parse_dsa_key_value(key_value_node: roxmltree::Node<'_, '_>) -> Result<Key, Error> {
    let dsa_kv = find_child(key_value_node, ns::DSIG, ns::node::DSA_KEY_VALUE)
        .ok_or_else(|| Error::MissingElement("DSAKeyValue".into()))?;

    let decode_elem = |name: &str| -> Result<dsa::BigUint, Error> {
        let text = find_child(dsa_kv, ns::DSIG, name)
            .and_then(|n| n.text())
            .ok_or_else(|| Error::MissingElement(name.into()))?;
        let bytes = decode_crypto_binary(text).map_err(|e| Error::Base64(format!("{name}: {e}")))?;
        Ok(dsa::BigUint::from_bytes_be(&bytes))
    };

    let p = decode_elem(ns::node::DSA_P)?;
    let q = decode_elem(ns::node::DSA_Q)?;
    let g = decode_elem(ns::node::DSA_G)?;
    let y = decode_elem(ns::node::DSA_Y)?;

    let components = dsa::Components::from_components(p, q, g)
        .map_err(|e| Error::Key(format!("invalid DSA components: {e}")))?;
    let vk = dsa::VerifyingKey::from_components(components, y)
        .map_err(|e| Error::Key(format!("invalid DSA public key: {e}")))?;

    Ok(Key::new(
        KeyData {
            private: None,
            public: vk,
        },
        KeyUsage::Verify,
    ))
}

/// Render `<KeyInfo><KeyValue><DSAKeyValue>` for a public key, in the
/// signature's default namespace.
pub fn write_dsa_key_info(key: &dsa::VerifyingKey) -> String {
    let components = key.components();
    let mut out = String::with_capacity(512);
    out.push_str("<KeyInfo><KeyValue><DSAKeyValue>");
    for (name, value) in [
        (ns::node::DSA_P, components.p()),
        (ns::node::DSA_Q, components.q()),
        (ns::node::DSA_G, components.g()),
        (ns::node::DSA_Y, key.y()),
    ] {
        out.push('<');
        out.push_str(name);
        out.push('>');
        out.push_str(&encode_crypto_binary(value));
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out.push_str("</DSAKeyValue></KeyValue></KeyInfo>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_dsa_private_pem;

    const SIGNER_KEY: &[u8] = include_bytes!("../../../test-data/keys/signer-key.pem");

    #[test]
    fn test_key_info_round_trip() {
        let key = load_dsa_private_pem(SIGNER_KEY).unwrap();
        let vk = key.dsa_public_key();
        let xml = format!(
            r#"<Signature xmlns="{}">{}</Signature>"#,
            ns::DSIG,
            write_dsa_key_info(vk)
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let key_info = doc
            .descendants()
            .find(|n| n.has_tag_name((ns::DSIG, "KeyInfo")))
            .unwrap();
        let parsed = extract_key_value(key_info).unwrap();
        assert_eq!(parsed.dsa_public_key().y(), vk.y());
        assert_eq!(
            parsed.dsa_public_key().components().p(),
            vk.components().p()
        );
    }

    #[test]
    fn test_whitespace_in_values_is_ignored() {
        let key = load_dsa_private_pem(SIGNER_KEY).unwrap();
        let xml = format!(
            r#"<KeyInfo xmlns="{}">{}</KeyInfo>"#,
            ns::DSIG,
            write_dsa_key_info(key.dsa_public_key())
                .trim_start_matches("<KeyInfo>")
                .trim_end_matches("</KeyInfo>")
                .replace("</P>", "\n</P>")
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(extract_key_value(doc.root_element()).is_ok());
    }

    #[test]
    fn test_missing_component() {
        let xml = format!(
            r#"<KeyInfo xmlns="{}"><KeyValue><DSAKeyValue><P>AQ==</P></DSAKeyValue></KeyValue></KeyInfo>"#,
            ns::DSIG
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let err = extract_key_value(doc.root_element()).unwrap_err();
        assert!(matches!(err, Error::MissingElement(_)));
    }

    #[test]
    fn test_no_key_value() {
        let xml = format!(r#"<KeyInfo xmlns="{}"/>"#, ns::DSIG);
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(extract_key_value(doc.root_element()).is_err());
    }
}
