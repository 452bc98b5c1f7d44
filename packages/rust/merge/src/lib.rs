//! Ordered multi-document merge into a single output artifact.
//!
//! [`ArtifactMerger`] is the seam the pipeline depends on; [`PdfMerger`]
//! concatenates PDF files page by page, in input order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bundlebot_shared::{BundleError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument};

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Extension of merged artifacts.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Combines several documents, in the given order, into one artifact.
pub trait ArtifactMerger: Send + Sync {
    /// Fails with [`BundleError::MergeFailed`] if any input is missing or
    /// unreadable, or if `inputs` is empty. Nothing is written on failure.
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// Page-level PDF concatenation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfMerger;

impl ArtifactMerger for PdfMerger {
    #[instrument(skip_all, fields(inputs = inputs.len(), output = %output.display()))]
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(BundleError::merge("no input documents"));
        }

        let mut merged = concatenate(inputs)?;
        merged
            .save(output)
            .map_err(|e| BundleError::merge(format!("cannot write {}: {e}", output.display())))?;

        info!(documents = inputs.len(), "artifact written");
        Ok(())
    }
}

/// Build the merged document in memory.
fn concatenate(inputs: &[PathBuf]) -> Result<Document> {
    let mut next_id: u32 = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for path in inputs {
        if !path.is_file() {
            return Err(BundleError::merge(format!(
                "input {} does not exist",
                path.display()
            )));
        }

        let mut doc = Document::load(path)
            .map_err(|e| BundleError::merge(format!("cannot read {}: {e}", path.display())))?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(BundleError::merge(format!("{} has no pages", path.display())));
        }
        debug!(path = %path.display(), pages = page_ids.len(), "input loaded");

        for id in page_ids {
            let mut page = doc
                .get_dictionary(id)
                .map_err(|e| BundleError::merge(format!("{}: bad page: {e}", path.display())))?
                .clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = inherited_attribute(&doc, &page, key) {
                        page.set(key.to_vec(), value);
                    }
                }
            }
            pages.push((id, page));
        }

        objects.extend(std::mem::take(&mut doc.objects));
    }

    let pages_id: ObjectId = (next_id, 0);
    let catalog_id: ObjectId = (next_id + 1, 0);

    let mut merged = Document::with_version("1.5");

    // Page tree and catalog are rebuilt; outlines would point at stale ids.
    for (id, object) in objects {
        match type_of(&object) {
            Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline") => {}
            _ => {
                merged.objects.insert(id, object);
            }
        }
    }

    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = kids.len() as i64;
    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }

    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    merged.trailer.set("Root", catalog_id);
    merged.max_id = catalog_id.0;

    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

/// `/Type` name of a dictionary or stream object.
fn type_of(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Walk up the page tree looking for an inheritable attribute.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}
