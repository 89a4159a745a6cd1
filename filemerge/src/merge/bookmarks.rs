//! Outline (bookmark) handling for merged PDFs.
//!
//! Source outlines are carried into the merged document. Their named
//! destinations are resolved to explicit page destinations while the source
//! catalog is still available, because the merged document gets a fresh
//! catalog without the source name trees.

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use std::collections::{HashMap, HashSet};

use super::metadata::encode_text_string;

/// Name trees deeper than this are treated as malformed.
const MAX_NAME_TREE_DEPTH: usize = 32;

/// Outline section for one merged input.
#[derive(Debug, Clone)]
pub struct FileOutline {
    /// Title of the section entry.
    pub title: String,
    /// First page of the input in the merged document.
    pub first_page: ObjectId,
    /// Top-level outline items of the input, already copied into the merged
    /// document.
    pub items: Vec<ObjectId>,
}

/// Builds outline trees in a merged document.
pub struct BookmarkManager;

impl BookmarkManager {
    /// Create a new bookmark manager.
    pub fn new() -> Self {
        Self
    }

    /// Top-level outline items of `doc`, in order, and the id of the outline
    /// root if it is an indirect object.
    pub fn top_level_items(&self, doc: &Document) -> (Option<ObjectId>, Vec<ObjectId>) {
        let Some((root_id, root)) = outline_root(doc) else {
            return (None, Vec::new());
        };
        (root_id, sibling_chain(doc, first_child(root)))
    }

    /// Replace named destinations in outline items with the explicit
    /// destination they name. Items whose name cannot be resolved keep it.
    pub fn resolve_named_destinations(&self, doc: &mut Document) {
        let names = named_destinations(doc);
        if names.is_empty() {
            return;
        }

        for item_id in all_outline_items(doc) {
            let Ok(item) = doc.get_dictionary(item_id) else {
                continue;
            };

            let from_dest = item
                .get(b"Dest")
                .ok()
                .and_then(|dest| lookup(doc, &names, dest));
            let from_action = || {
                let action = resolve(doc, item.get(b"A").ok()?)?.as_dict().ok()?;
                if action.get(b"S").and_then(Object::as_name).ok()? != b"GoTo" {
                    return None;
                }
                lookup(doc, &names, action.get(b"D").ok()?)
            };

            let (resolved, drop_action) = match from_dest {
                Some(dest) => (dest, false),
                None => match from_action() {
                    Some(dest) => (dest, true),
                    None => continue,
                },
            };

            if let Ok(item) = doc.get_dictionary_mut(item_id) {
                item.set("Dest", resolved);
                if drop_action {
                    item.remove(b"A");
                }
            }
        }
    }

    /// Create one top-level entry per input, pointing at its first page,
    /// with the input's own outline nested underneath. Returns the new
    /// outline root.
    pub fn build_file_outline(&self, doc: &mut Document, sections: &[FileOutline]) -> Option<ObjectId> {
        if sections.is_empty() {
            return None;
        }

        let root_id = doc.new_object_id();
        let entry_ids: Vec<ObjectId> = sections.iter().map(|_| doc.new_object_id()).collect();
        let mut visible = entry_ids.len();

        for (index, section) in sections.iter().enumerate() {
            let mut entry = dictionary! {
                "Title" => encode_text_string(&section.title),
                "Parent" => root_id,
                "Dest" => vec![
                    Object::Reference(section.first_page),
                    Object::Name(b"XYZ".to_vec()),
                    Object::Null,
                    Object::Null,
                    Object::Null,
                ],
            };
            link_siblings(&mut entry, &entry_ids, index);

            if let (Some(first), Some(last)) = (section.items.first(), section.items.last()) {
                relink(doc, &section.items, entry_ids[index]);
                entry.set("First", *first);
                entry.set("Last", *last);
                let open = visible_items(doc, &section.items);
                entry.set("Count", open as i64);
                visible += open;
            }

            doc.objects.insert(entry_ids[index], Object::Dictionary(entry));
        }

        insert_root(doc, root_id, &entry_ids, visible);
        Some(root_id)
    }

    /// Chain the top-level items of every input under one new outline root.
    pub fn concatenate(&self, doc: &mut Document, items: &[ObjectId]) -> Option<ObjectId> {
        if items.is_empty() {
            return None;
        }

        let root_id = doc.new_object_id();
        relink(doc, items, root_id);
        let visible = visible_items(doc, items);
        insert_root(doc, root_id, items, visible);
        Some(root_id)
    }
}

impl Default for BookmarkManager {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_root(doc: &mut Document, root_id: ObjectId, children: &[ObjectId], visible: usize) {
    let mut root = dictionary! {
        "Type" => "Outlines",
        "Count" => visible as i64,
    };
    if let (Some(first), Some(last)) = (children.first(), children.last()) {
        root.set("First", *first);
        root.set("Last", *last);
    }
    doc.objects.insert(root_id, Object::Dictionary(root));
}

/// Number of items shown when the given siblings are displayed: each item
/// plus, for open items (positive `Count`), its visible descendants.
fn visible_items(doc: &Document, items: &[ObjectId]) -> usize {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|id| 1 + open_descendants(doc, *id, &mut seen))
        .sum()
}

fn open_descendants(doc: &Document, id: ObjectId, seen: &mut HashSet<ObjectId>) -> usize {
    if !seen.insert(id) {
        return 0;
    }
    let Ok(item) = doc.get_dictionary(id) else {
        return 0;
    };
    let is_open = item
        .get(b"Count")
        .and_then(Object::as_i64)
        .is_ok_and(|count| count > 0);
    if !is_open {
        return 0;
    }

    sibling_chain(doc, first_child(item))
        .into_iter()
        .map(|child| 1 + open_descendants(doc, child, seen))
        .sum()
}

fn link_siblings(entry: &mut Dictionary, ids: &[ObjectId], index: usize) {
    entry.remove(b"Prev");
    entry.remove(b"Next");
    if index > 0 {
        entry.set("Prev", ids[index - 1]);
    }
    if let Some(next) = ids.get(index + 1) {
        entry.set("Next", *next);
    }
}

/// Re-parent `items` under `parent` as one sibling chain.
fn relink(doc: &mut Document, items: &[ObjectId], parent: ObjectId) {
    for (index, item_id) in items.iter().enumerate() {
        if let Ok(item) = doc.get_dictionary_mut(*item_id) {
            item.set("Parent", parent);
            link_siblings(item, items, index);
        }
    }
}

fn outline_root(doc: &Document) -> Option<(Option<ObjectId>, &Dictionary)> {
    match doc.catalog().ok()?.get(b"Outlines").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok().map(|dict| (Some(*id), dict)),
        Object::Dictionary(dict) => Some((None, dict)),
        _ => None,
    }
}

fn first_child(node: &Dictionary) -> Option<ObjectId> {
    node.get(b"First").and_then(Object::as_reference).ok()
}

/// Follow `Next` links from `first`, stopping at the first repeated item.
fn sibling_chain(doc: &Document, first: Option<ObjectId>) -> Vec<ObjectId> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut current = first;

    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let Ok(item) = doc.get_dictionary(id) else {
            break;
        };
        items.push(id);
        current = item.get(b"Next").and_then(Object::as_reference).ok();
    }

    items
}

/// Every outline item at any depth.
fn all_outline_items(doc: &Document) -> Vec<ObjectId> {
    let Some((_, root)) = outline_root(doc) else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = sibling_chain(doc, first_child(root));

    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        result.push(id);
        if let Ok(item) = doc.get_dictionary(id) {
            pending.extend(sibling_chain(doc, first_child(item)));
        }
    }

    result
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Map of destination name to explicit destination array, from both the
/// catalog `Dests` dictionary and the `Names/Dests` name tree.
fn named_destinations(doc: &Document) -> HashMap<Vec<u8>, Object> {
    let mut names = HashMap::new();
    let Ok(catalog) = doc.catalog() else {
        return names;
    };

    if let Some(dests) = catalog
        .get(b"Dests")
        .ok()
        .and_then(|d| resolve(doc, d))
        .and_then(|d| d.as_dict().ok())
    {
        for (key, value) in dests.iter() {
            if let Some(dest) = explicit_destination(doc, value) {
                names.insert(key.clone(), dest);
            }
        }
    }

    if let Some(tree) = catalog
        .get(b"Names")
        .ok()
        .and_then(|n| resolve(doc, n))
        .and_then(|n| n.as_dict().ok())
        .and_then(|n| n.get(b"Dests").ok())
        .and_then(|d| resolve(doc, d))
        .and_then(|d| d.as_dict().ok())
    {
        collect_name_tree(doc, tree, &mut names, 0);
    }

    names
}

fn collect_name_tree(
    doc: &Document,
    node: &Dictionary,
    names: &mut HashMap<Vec<u8>, Object>,
    depth: usize,
) {
    if depth > MAX_NAME_TREE_DEPTH {
        return;
    }

    if let Ok(pairs) = node.get(b"Names").and_then(Object::as_array) {
        for pair in pairs.chunks_exact(2) {
            if let (Object::String(key, _), Some(dest)) =
                (&pair[0], explicit_destination(doc, &pair[1]))
            {
                names.insert(key.clone(), dest);
            }
        }
    }

    if let Ok(kids) = node.get(b"Kids").and_then(Object::as_array) {
        for kid in kids {
            if let Some(child) = resolve(doc, kid).and_then(|k| k.as_dict().ok()) {
                collect_name_tree(doc, child, names, depth + 1);
            }
        }
    }
}

/// A destination value is either an array or a dictionary whose `D` entry
/// is the array.
fn explicit_destination(doc: &Document, value: &Object) -> Option<Object> {
    match resolve(doc, value)? {
        array @ Object::Array(_) => Some(array.clone()),
        Object::Dictionary(dict) => match resolve(doc, dict.get(b"D").ok()?)? {
            array @ Object::Array(_) => Some(array.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn lookup(doc: &Document, names: &HashMap<Vec<u8>, Object>, dest: &Object) -> Option<Object> {
    match resolve(doc, dest)? {
        Object::Name(name) => names.get(name).cloned(),
        Object::String(name, _) => names.get(name).cloned(),
        _ => None,
    }
}
