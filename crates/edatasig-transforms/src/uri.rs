#![forbid(unsafe_code)]

//! Reference URI resolution.
//!
//! Handles:
//! - Empty URI (`""`): the whole document without comments
//! - `#xpointer(/)`: the whole document with comments
//! - Same-document references (`#id`): the identified element's subtree
//!   without comments, matching an `Id`, `ID` or `id` attribute

use edatasig_core::Error;
use edatasig_xml::NodeSet;
use roxmltree::Document;

const ID_ATTRIBUTES: [&str; 3] = ["Id", "ID", "id"];

/// Resolve a `Reference/@URI` against the signed document.
pub fn resolve_reference(uri: &str, doc: &Document<'_>) -> Result<NodeSet, Error> {
    if uri.is_empty() {
        return Ok(NodeSet::all_without_comments(doc));
    }
    if uri == "#xpointer(/)" {
        return Ok(NodeSet::all(doc));
    }
    let Some(id) = uri.strip_prefix('#').filter(|id| !id.is_empty() && !id.contains('(')) else {
        return Err(Error::Transform(format!("unsupported reference URI: {uri}")));
    };

    let mut matches = doc
        .descendants()
        .filter(|n| n.is_element() && ID_ATTRIBUTES.iter().any(|a| n.attribute(*a) == Some(id)));
    match (matches.next(), matches.next()) {
        (Some(node), None) => Ok(NodeSet::tree_without_comments(node)),
        (None, _) => Err(Error::Transform(format!("no element with id '{id}'"))),
        (Some(_), Some(_)) => Err(Error::Transform(format!("id '{id}' is not unique"))),
    }
}
