use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use tokio::fs;
use tracing::{debug, info};

use crate::error::MergeError;

/// Ordered concatenation of independently loaded PDF buffers.
///
/// Buffers are merged in the order they were added; within each source
/// document the existing page order is preserved, so the final page
/// sequence is exactly the concatenation of the inputs.
pub struct PdfMerger {
    documents: Vec<Document>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    /// Load one PDF buffer and queue it for merging.
    pub fn add_bytes(&mut self, data: &[u8]) -> Result<(), MergeError> {
        let document =
            Document::load_mem(data).map_err(|e| MergeError::MalformedPdf(e.to_string()))?;
        debug!("Loaded PDF buffer with {} pages", document.get_pages().len());
        self.documents.push(document);
        Ok(())
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Merge everything and write the result to `output_path`.
    ///
    /// The merged document is serialized into memory first; the output
    /// file is only created once the whole merge has succeeded, so a bad
    /// buffer never leaves a partial file behind. Returns the final page
    /// count.
    pub async fn save(&self, output_path: &Path) -> Result<usize, MergeError> {
        if self.documents.is_empty() {
            return Err(MergeError::MalformedPdf("no PDFs added to merge".into()));
        }

        let (mut merged, page_count) = if self.documents.len() == 1 {
            let doc = self.documents[0].clone();
            let pages = doc.get_pages().len();
            (doc, pages)
        } else {
            self.merge_documents()?
        };

        let mut data = Vec::new();
        merged
            .save_to(&mut data)
            .map_err(|e| MergeError::MalformedPdf(format!("failed to serialize merged PDF: {e}")))?;

        fs::write(output_path, data).await?;

        info!(
            "Merged {} PDFs ({} pages) into {}",
            self.documents.len(),
            page_count,
            output_path.display()
        );
        Ok(page_count)
    }

    fn merge_documents(&self) -> Result<(Document, usize), MergeError> {
        let mut merged = Document::with_version("1.5");
        let mut max_id = 1;

        // Page ids in merge order; the object map for everything else.
        let mut ordered_pages: Vec<(ObjectId, Object)> = Vec::new();
        let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

        for source in &self.documents {
            let mut doc = source.clone();
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            // get_pages is keyed by page number, so iteration follows the
            // source document's own page order.
            for (_, page_id) in doc.get_pages() {
                let page = doc
                    .get_object(page_id)
                    .map_err(|e| MergeError::MalformedPdf(e.to_string()))?
                    .to_owned();
                ordered_pages.push((page_id, page));
            }
            all_objects.extend(doc.objects);
        }

        // Keep one Catalog and one Pages node; fold the attributes of
        // every source Pages dictionary into it so inherited entries
        // (Resources, MediaBox) still resolve after re-parenting.
        let mut catalog_object: Option<(ObjectId, Object)> = None;
        let mut pages_object: Option<(ObjectId, Object)> = None;

        for (object_id, object) in all_objects.iter() {
            match object.type_name().unwrap_or("") {
                "Catalog" => {
                    catalog_object = Some((
                        catalog_object.map(|(id, _)| id).unwrap_or(*object_id),
                        object.clone(),
                    ));
                }
                "Pages" => {
                    if let Ok(dictionary) = object.as_dict() {
                        let mut dictionary = dictionary.clone();
                        if let Some((_, ref existing)) = pages_object {
                            if let Ok(existing) = existing.as_dict() {
                                dictionary.extend(existing);
                            }
                        }
                        pages_object = Some((
                            pages_object.map(|(id, _)| id).unwrap_or(*object_id),
                            Object::Dictionary(dictionary),
                        ));
                    }
                }
                "Page" => {}
                "Outlines" | "Outline" => {}
                _ => {
                    merged.objects.insert(*object_id, object.clone());
                }
            }
        }

        let (pages_id, pages_root) = pages_object
            .ok_or_else(|| MergeError::MalformedPdf("no page tree found in inputs".into()))?;
        let (catalog_id, catalog_root) = catalog_object
            .ok_or_else(|| MergeError::MalformedPdf("no catalog found in inputs".into()))?;

        for (object_id, object) in &ordered_pages {
            if let Ok(dictionary) = object.as_dict() {
                let mut dictionary = dictionary.clone();
                dictionary.set("Parent", pages_id);
                merged
                    .objects
                    .insert(*object_id, Object::Dictionary(dictionary));
            }
        }

        if let Ok(dictionary) = pages_root.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Count", ordered_pages.len() as u32);
            dictionary.set(
                "Kids",
                ordered_pages
                    .iter()
                    .map(|(object_id, _)| Object::Reference(*object_id))
                    .collect::<Vec<_>>(),
            );
            merged
                .objects
                .insert(pages_id, Object::Dictionary(dictionary));
        }

        if let Ok(dictionary) = catalog_root.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Pages", pages_id);
            dictionary.remove(b"Outlines");
            merged
                .objects
                .insert(catalog_id, Object::Dictionary(dictionary));
        }

        merged.trailer.set("Root", catalog_id);
        merged.max_id = merged.objects.len() as u32;
        merged.renumber_objects();
        merged.adjust_zero_pages();
        merged.compress();

        let page_count = ordered_pages.len();
        Ok((merged, page_count))
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert;
    use crate::sniff::ImageKind;
    use image::{Rgb, RgbImage};

    fn one_page_pdf(dir: &Path, name: &str, width: u32, height: u32) -> Vec<u8> {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
            .save(&path)
            .unwrap();
        convert::image_to_pdf(&path, ImageKind::Png).unwrap()
    }

    fn first_page_width(doc: &Document) -> i64 {
        let (_, first) = doc.get_pages().into_iter().next().unwrap();
        let dict = doc.get_dictionary(first).unwrap();
        dict.get(b"MediaBox").unwrap().as_array().unwrap()[2]
            .as_i64()
            .unwrap()
    }

    #[tokio::test]
    async fn merges_buffers_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = one_page_pdf(dir.path(), "a.png", 30, 40);
        let b = one_page_pdf(dir.path(), "b.png", 50, 60);
        let c = one_page_pdf(dir.path(), "c.png", 70, 80);

        let mut merger = PdfMerger::new();
        merger.add_bytes(&a).unwrap();
        merger.add_bytes(&b).unwrap();
        merger.add_bytes(&c).unwrap();

        let out = dir.path().join("merged.pdf");
        let pages = merger.save(&out).await.unwrap();
        assert_eq!(pages, 3);

        let merged = Document::load(&out).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
        assert_eq!(first_page_width(&merged), 30);
    }

    #[tokio::test]
    async fn single_buffer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let a = one_page_pdf(dir.path(), "only.png", 12, 34);

        let mut merger = PdfMerger::new();
        merger.add_bytes(&a).unwrap();

        let out = dir.path().join("single.pdf");
        let pages = merger.save(&out).await.unwrap();
        assert_eq!(pages, 1);
        assert_eq!(Document::load(&out).unwrap().get_pages().len(), 1);
    }

    #[test]
    fn corrupt_buffer_is_rejected_on_add() {
        let mut merger = PdfMerger::new();
        let err = merger.add_bytes(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, MergeError::MalformedPdf(_)));
    }

    #[tokio::test]
    async fn empty_merger_refuses_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("never.pdf");
        let merger = PdfMerger::new();
        assert!(merger.save(&out).await.is_err());
        assert!(!out.exists());
    }
}
