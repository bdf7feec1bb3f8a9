#![forbid(unsafe_code)]

//! eData document model.
//!
//! Provides an owned document over `roxmltree`, the typed query layer for
//! the fixed eData structure, plus `NodeSet` operations needed for
//! canonicalization and signature transforms.

pub mod document;
pub mod nodeset;
pub mod query;

pub use document::EdataDocument;
pub use nodeset::NodeSet;
pub use query::EdataPath;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree does not expand external entities, so an internal DTD subset
/// is harmless.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Format the `line:column` position of a node for diagnostics.
pub fn position(node: roxmltree::Node<'_, '_>) -> String {
    let pos = node.document().text_pos_at(node.range().start);
    format!("{}:{}", pos.row, pos.col)
}
