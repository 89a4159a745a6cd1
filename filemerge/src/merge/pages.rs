//! Page tree handling.
//!
//! Merged output uses a single flat `Pages` node, so attributes a page
//! inherits from intermediate tree nodes must be copied onto the page first.

use lopdf::{Document, Object, ObjectId, dictionary};
use std::collections::BTreeSet;

/// Page attributes that may be inherited from ancestor `Pages` nodes.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page ids of `doc`, in page order.
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Copy inherited attributes onto every page that lacks them.
pub fn push_down_inherited(doc: &mut Document) {
    for page_id in page_ids(doc) {
        let inherited = inherited_attributes(doc, page_id);
        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    let mut missing: Vec<&'static [u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();
    let mut visited = BTreeSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(node_id) = parent {
        if missing.is_empty() || !visited.insert(node_id) {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((*key, value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    found
}

/// Install a new flat `Pages` root holding `pages` in order, and point
/// every page at it.
pub fn install_page_tree(doc: &mut Document, pages: &[ObjectId]) -> ObjectId {
    let pages_id = doc.new_object_id();

    for page_id in pages {
        if let Ok(page) = doc.get_dictionary_mut(*page_id) {
            page.set("Parent", pages_id);
        }
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => pages.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => pages.len() as i64,
        }),
    );

    pages_id
}

/// Whether `object` is a page tree node or catalog, which are rebuilt in
/// the merged output rather than copied.
pub fn is_structural(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => matches!(
            dict.get(b"Type").and_then(Object::as_name),
            Ok(b"Pages") | Ok(b"Catalog")
        ),
        _ => false,
    }
}
