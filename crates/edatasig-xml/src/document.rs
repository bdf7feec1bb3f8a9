#![forbid(unsafe_code)]

//! Owned eData document.
//!
//! The XML text is the source of truth. A parsed `roxmltree::Document` is
//! produced on demand by [`EdataDocument::parse_doc`] and borrows from it.

use std::cell::OnceCell;
use std::io::Write;
use std::path::{Path, PathBuf};

use edatasig_core::{Error, Result, ValidationOutcome};
use tracing::{debug, info};

use crate::query::EdataPath;

const UTF8_BOM: &str = "\u{feff}";

/// An owned eData document: text, origin, cached canonical form and the
/// recorded schema validation outcome.
#[derive(Debug, Clone)]
pub struct EdataDocument {
    text: String,
    source: Option<PathBuf>,
    canonical: OnceCell<Vec<u8>>,
    validation: Option<ValidationOutcome>,
}

impl EdataDocument {
    /// Read and parse a document from disk.
    ///
    /// Whitespace is preserved exactly; the file is read in one scoped call.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading eData document");
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        let mut doc = Self::parse_bytes(&data)?;
        doc.source = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Parse and validate well-formedness of XML text, taking ownership.
    pub fn from_text(text: String) -> Result<Self> {
        let text = match text.strip_prefix(UTF8_BOM) {
            Some(rest) => rest.to_owned(),
            None => text,
        };
        roxmltree::Document::parse_with_options(&text, crate::parsing_options())
            .map_err(|e| Error::MalformedXml(e.to_string()))?;
        Ok(Self {
            text,
            source: None,
            canonical: OnceCell::new(),
            validation: None,
        })
    }

    /// Parse XML from UTF-8 bytes. UTF-16 input, and bytes that are not
    /// UTF-8 under a declaration naming another encoding, are rejected as
    /// [`Error::UnsupportedEncoding`].
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        if is_utf16(data) {
            return Err(Error::UnsupportedEncoding("UTF-16".into()));
        }
        let text = std::str::from_utf8(data).map_err(|e| match declared_encoding(data) {
            Some(name) if !name.eq_ignore_ascii_case("utf-8") => {
                Error::UnsupportedEncoding(format!("{name}; only UTF-8 documents are read"))
            }
            _ => Error::MalformedXml(format!("invalid UTF-8: {e}")),
        })?;
        Self::from_text(text.to_owned())
    }

    /// The raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The path this document was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>> {
        roxmltree::Document::parse_with_options(&self.text, crate::parsing_options())
            .map_err(|e| Error::MalformedXml(e.to_string()))
    }

    /// Number of `MaterialData` records. Zero when the path does not resolve.
    pub fn material_data_count(&self) -> usize {
        match self.parse_doc() {
            Ok(doc) => EdataPath::MaterialData.count(&doc),
            Err(_) => 0,
        }
    }

    /// Insert `signature_xml` as the last child of `FileInformation`.
    ///
    /// A self-closing `<FileInformation/>` is expanded into a start and end
    /// tag. On failure the document is unchanged.
    pub fn append_signature(&mut self, signature_xml: &str) -> Result<()> {
        let new_text = {
            let doc = self.parse_doc()?;
            let container = EdataPath::FileInformation.first(&doc).ok_or_else(|| {
                Error::Structure(format!("{} not found", EdataPath::FileInformation))
            })?;
            splice_last_child(&self.text, container.range(), signature_xml)?
        };
        roxmltree::Document::parse_with_options(&new_text, crate::parsing_options())
            .map_err(|e| Error::Structure(format!("signature does not fit the document: {e}")))?;
        debug!(bytes = signature_xml.len(), "appended signature element");
        self.text = new_text;
        self.canonical = OnceCell::new();
        self.validation = None;
        Ok(())
    }

    /// Write the document as UTF-8 without BOM.
    ///
    /// The bytes go to a temporary file in the destination directory which is
    /// then renamed over `destination`.
    pub fn serialize(&self, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = temp_builder().tempfile_in(&dir)?;
        tmp.write_all(self.text.as_bytes())?;
        tmp.flush()?;
        tmp.persist(destination).map_err(|e| Error::Io(e.error))?;
        info!(path = %destination.display(), "wrote eData document");
        Ok(())
    }

    /// Canonical form of the document, computed once by `compute` and cached
    /// until the document changes.
    pub fn canonical_with<F>(&self, compute: F) -> Result<&[u8]>
    where
        F: FnOnce(&roxmltree::Document<'_>) -> Result<Vec<u8>>,
    {
        if self.canonical.get().is_none() {
            let doc = self.parse_doc()?;
            let bytes = compute(&doc)?;
            let _ = self.canonical.set(bytes);
        }
        self.canonical
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Canonicalization("canonical cache unavailable".into()))
    }

    /// Whether the canonical form is currently cached.
    pub fn has_cached_canonical(&self) -> bool {
        self.canonical.get().is_some()
    }

    /// Record the outcome of validating this document.
    pub fn record_validation(&mut self, outcome: ValidationOutcome) {
        self.validation = Some(outcome);
    }

    /// The recorded validation outcome, if the document has been validated.
    pub fn validation(&self) -> Option<&ValidationOutcome> {
        self.validation.as_ref()
    }
}

/// Insert `child` before the end tag of the element spanning `range`.
fn splice_last_child(
    text: &str,
    range: std::ops::Range<usize>,
    child: &str,
) -> Result<String> {
    let element = text
        .get(range.clone())
        .ok_or_else(|| Error::Structure("element range out of bounds".into()))?;
    let mut out = String::with_capacity(text.len() + child.len() + 32);
    if let Some(head) = element.strip_suffix("/>") {
        let qname = element_qname(element)
            .ok_or_else(|| Error::Structure("cannot read element name".into()))?;
        out.push_str(&text[..range.start]);
        out.push_str(head.trim_end());
        out.push('>');
        out.push_str(child);
        out.push_str("</");
        out.push_str(qname);
        out.push('>');
        out.push_str(&text[range.end..]);
    } else {
        let close = element
            .rfind("</")
            .ok_or_else(|| Error::Structure("element has no end tag".into()))?;
        let at = range.start + close;
        out.push_str(&text[..at]);
        out.push_str(child);
        out.push_str(&text[at..]);
    }
    Ok(out)
}

/// The qualified name of an element as written in its start tag.
fn element_qname(element: &str) -> Option<&str> {
    let rest = element.strip_prefix('<')?;
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(&rest[..end])
    }
}

/// Temporary files are created with the mode a plain create would get
/// (0666 less the umask), not tempfile's owner-only default.
fn temp_builder() -> tempfile::Builder<'static, 'static> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
}

fn is_utf16(data: &[u8]) -> bool {
    matches!(data, [0xFE, 0xFF, ..] | [0xFF, 0xFE, ..] | [0x00, b'<', ..] | [b'<', 0x00, ..])
}

/// The `encoding` pseudo-attribute of the XML declaration.
fn declared_encoding(data: &[u8]) -> Option<String> {
    let head = data.strip_prefix(b"<?xml")?;
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = String::from_utf8_lossy(&head[..end]);
    let at = decl.find("encoding")? + "encoding".len();
    let value = decl[at..].trim_start().strip_prefix('=')?.trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &value[1..];
    Some(value[..value.find(quote)?].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ASTMeDataXchange xmlns="http://www.astm.org/E55/03/eDataXchange" version="1.0">
  <FileInformation>
    <FileID>F-1</FileID>
  </FileInformation>
  <MaterialDataGroup>
    <MaterialData id="m1"/>
    <MaterialData id="m2"/>
  </MaterialDataGroup>
</ASTMeDataXchange>
"#;

    #[test]
    fn test_material_data_count() {
        let doc = EdataDocument::from_text(DOC.into()).unwrap();
        assert_eq!(doc.material_data_count(), 2);
    }

    #[test]
    fn test_material_data_count_missing_group() {
        let xml = r#"<ASTMeDataXchange xmlns="http://www.astm.org/E55/03/eDataXchange"><FileInformation/></ASTMeDataXchange>"#;
        let doc = EdataDocument::from_text(xml.into()).unwrap();
        assert_eq!(doc.material_data_count(), 0);
    }

    #[test]
    fn test_malformed_xml() {
        let err = EdataDocument::from_text("<a><b></a>".into()).unwrap_err();
        assert!(matches!(err, Error::MalformedXml(_)));
    }

    #[test]
    fn test_bom_is_stripped() {
        let doc = EdataDocument::parse_bytes("\u{feff}<a/>".as_bytes()).unwrap();
        assert_eq!(doc.text(), "<a/>");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EdataDocument::load(dir.path().join("nope.xml")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_append_signature_last_child() {
        let mut doc = EdataDocument::from_text(DOC.into()).unwrap();
        doc.append_signature(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"/>"#)
            .unwrap();
        let parsed = doc.parse_doc().unwrap();
        let info = EdataPath::FileInformation.first(&parsed).unwrap();
        let last = info.children().filter(|n| n.is_element()).last().unwrap();
        assert_eq!(last.tag_name().name(), "Signature");
        assert_eq!(EdataPath::Signature.count(&parsed), 1);
        assert!(doc.text().contains("    <FileID>F-1</FileID>\n  <Signature"));
    }

    #[test]
    fn test_append_signature_self_closing_container() {
        let xml = r#"<e:ASTMeDataXchange xmlns:e="http://www.astm.org/E55/03/eDataXchange"><e:FileInformation /><e:MaterialDataGroup/></e:ASTMeDataXchange>"#;
        let mut doc = EdataDocument::from_text(xml.into()).unwrap();
        doc.append_signature(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"/>"#)
            .unwrap();
        assert!(doc.text().contains(
            r#"<e:FileInformation><Signature xmlns="http://www.w3.org/2000/09/xmldsig#"/></e:FileInformation>"#
        ));
    }

    #[test]
    fn test_append_signature_without_container() {
        let xml = r#"<ASTMeDataXchange xmlns="http://www.astm.org/E55/03/eDataXchange"/>"#;
        let mut doc = EdataDocument::from_text(xml.into()).unwrap();
        let err = doc.append_signature("<Signature/>").unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
        assert_eq!(doc.text(), xml);
    }

    #[test]
    fn test_append_invalidates_cache() {
        let mut doc = EdataDocument::from_text(DOC.into()).unwrap();
        doc.canonical_with(|_| Ok(b"cached".to_vec())).unwrap();
        assert!(doc.has_cached_canonical());
        doc.append_signature(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"/>"#)
            .unwrap();
        assert!(!doc.has_cached_canonical());
    }

    #[test]
    fn test_serialize_writes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.xml");
        let doc = EdataDocument::from_text(DOC.into()).unwrap();
        doc.serialize(&dest).unwrap();
        let written = std::fs::read(&dest).unwrap();
        assert_eq!(written, DOC.as_bytes());
        assert_ne!(&written[..3], b"\xEF\xBB\xBF");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_serialize_uses_default_file_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.xml");
        std::fs::write(&plain, b"<a/>").unwrap();
        let dest = dir.path().join("out.xml");
        EdataDocument::from_text(DOC.into()).unwrap().serialize(&dest).unwrap();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dest), mode(&plain));
    }

    #[test]
    fn test_latin1_document_is_unsupported_encoding() {
        let mut data = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>Stra".to_vec();
        data.push(0xDF);
        data.extend_from_slice(b"e</a>");
        let err = EdataDocument::parse_bytes(&data).unwrap_err();
        assert!(matches!(&err, Error::UnsupportedEncoding(name) if name.starts_with("ISO-8859-1")));
    }

    #[test]
    fn test_utf16_document_is_unsupported_encoding() {
        let data: Vec<u8> = "\u{feff}<a/>".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let err = EdataDocument::parse_bytes(&data).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding(_)));
    }

    #[test]
    fn test_invalid_utf8_without_declaration_is_malformed() {
        let err = EdataDocument::parse_bytes(b"<a>\xFF</a>").unwrap_err();
        assert!(matches!(err, Error::MalformedXml(_)));
    }
}
