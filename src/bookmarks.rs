//! PDF outline generation for rendered headings, built on top of `lopdf`.
//!
//! Headings become a nested outline: an `h2` following an `h1` is filed under it, an `h3` under
//! the closest preceding `h2` or `h1`.  Every entry targets `/Dest [page /Fit]`.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Deepest heading level that receives an outline entry.
pub const MAX_BOOKMARK_LEVEL: u8 = 3;

/// A heading together with the page it was rendered on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadingEntry {
    /// Heading text.
    pub title: String,
    /// Heading level, 1 to 6.
    pub level: u8,
    /// 1-indexed page number.
    pub page: usize,
}

#[derive(Debug)]
pub enum BookmarkError {
    /// `lopdf` could not load or save the document.
    Pdf(lopdf::Error),
    /// The trailer has no usable `/Root` catalog dictionary.
    Catalog,
    /// A heading refers to a page the rendered document does not have.
    MissingPage { title: String, page: usize },
}

impl From<lopdf::Error> for BookmarkError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf(err)
    }
}

impl std::fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf(err) => write!(f, "PDF processing failed: {err}"),
            Self::Catalog => write!(f, "PDF has no catalog dictionary"),
            Self::MissingPage { title, page } => {
                write!(f, "Heading '{title}' refers to missing page {page}")
            }
        }
    }
}

impl std::error::Error for BookmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pdf(err) => Some(err),
            _ => None,
        }
    }
}

struct Node {
    id: ObjectId,
    page: ObjectId,
    title: String,
    level: u8,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Adds an `/Outlines` tree for every heading of level [`MAX_BOOKMARK_LEVEL`] or above.
///
/// The bytes are returned unchanged when no heading qualifies.
pub fn apply_heading_bookmarks(
    pdf_bytes: &[u8],
    headings: &[HeadingEntry],
) -> Result<Vec<u8>, BookmarkError> {
    let headings: Vec<&HeadingEntry> = headings
        .iter()
        .filter(|heading| heading.level <= MAX_BOOKMARK_LEVEL && !heading.title.trim().is_empty())
        .collect();
    if headings.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();
    let nodes = build_tree(&mut document, &headings, &pages)?;

    let root_id = document.new_object_id();
    let top_level: Vec<usize> = (0..nodes.len())
        .filter(|&index| nodes[index].parent.is_none())
        .collect();
    for index in 0..nodes.len() {
        let node = &nodes[index];
        let siblings = match node.parent {
            Some(parent) => &nodes[parent].children,
            None => &top_level,
        };
        let parent_id = node.parent.map_or(root_id, |parent| nodes[parent].id);

        let mut entry = Dictionary::new();
        entry.set("Title", Object::string_literal(node.title.as_str()));
        entry.set(
            "Dest",
            vec![Object::Reference(node.page), Object::Name(b"Fit".to_vec())],
        );
        entry.set("Parent", parent_id);
        link_siblings(&mut entry, &nodes, siblings, index);
        link_children(&mut entry, &nodes, &node.children);
        document.objects.insert(node.id, Object::Dictionary(entry));
    }

    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Outlines".to_vec()));
    link_children(&mut root, &nodes, &top_level);
    root.set("Count", nodes.len() as i64);
    document.objects.insert(root_id, Object::Dictionary(root));

    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| BookmarkError::Catalog)?;
    document
        .objects
        .get_mut(&catalog_id)
        .and_then(|catalog| catalog.as_dict_mut().ok())
        .ok_or(BookmarkError::Catalog)?
        .set("Outlines", root_id);

    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(|err| BookmarkError::Pdf(err.into()))?;
    Ok(buffer)
}

/// Resolves pages and nests every heading under the closest preceding shallower heading.
fn build_tree(
    document: &mut Document,
    headings: &[&HeadingEntry],
    pages: &BTreeMap<u32, ObjectId>,
) -> Result<Vec<Node>, BookmarkError> {
    let mut nodes: Vec<Node> = Vec::with_capacity(headings.len());
    let mut open: Vec<usize> = Vec::new();

    for heading in headings {
        let page = u32::try_from(heading.page)
            .ok()
            .and_then(|page| pages.get(&page).copied())
            .ok_or_else(|| BookmarkError::MissingPage {
                title: heading.title.clone(),
                page: heading.page,
            })?;

        while open
            .last()
            .map_or(false, |&index| nodes[index].level >= heading.level)
        {
            open.pop();
        }
        let parent = open.last().copied();
        let index = nodes.len();
        if let Some(parent) = parent {
            nodes[parent].children.push(index);
        }
        nodes.push(Node {
            id: document.new_object_id(),
            page,
            title: heading.title.trim().to_owned(),
            level: heading.level,
            parent,
            children: Vec::new(),
        });
        open.push(index);
    }
    Ok(nodes)
}

fn link_siblings(entry: &mut Dictionary, nodes: &[Node], siblings: &[usize], index: usize) {
    let Some(position) = siblings.iter().position(|&sibling| sibling == index) else {
        return;
    };
    if position > 0 {
        entry.set("Prev", nodes[siblings[position - 1]].id);
    }
    if let Some(&next) = siblings.get(position + 1) {
        entry.set("Next", nodes[next].id);
    }
}

fn link_children(entry: &mut Dictionary, nodes: &[Node], children: &[usize]) {
    if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
        entry.set("First", nodes[first].id);
        entry.set("Last", nodes[last].id);
        entry.set("Count", children.len() as i64);
    }
}
