//! PDF loading, image embedding and serialization using lopdf

use std::collections::HashSet;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use shared_types::{PageSize, PlacementBox};

use crate::decoder::DecodedImage;
use crate::error::SignError;

/// Upper bound on page-tree depth when walking `Parent` links
const MAX_TREE_DEPTH: usize = 64;

fn corrupt(msg: impl Into<String>) -> SignError {
    SignError::CorruptDocument(msg.into())
}

/// An image XObject added to a document, ready to be placed on any page
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub name: String,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

/// Wrapper around lopdf::Document holding one in-flight signing
pub struct PdfDocument {
    doc: Document,
    wrapped_pages: HashSet<ObjectId>,
}

impl PdfDocument {
    /// Load a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignError> {
        let doc = Document::load_mem(bytes).map_err(|e| corrupt(e.to_string()))?;
        Ok(Self {
            doc,
            wrapped_pages: HashSet::new(),
        })
    }

    /// Get the number of pages
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Get page object ID for a given page number (1-indexed)
    pub fn page_id(&self, page_num: u32) -> Result<ObjectId, SignError> {
        self.doc
            .get_pages()
            .get(&page_num)
            .copied()
            .ok_or_else(|| SignError::PageNotFound {
                page: page_num,
                page_count: self.page_count(),
            })
    }

    /// Get page dimensions (MediaBox) as [x, y, width, height]
    pub fn page_dimensions(&self, page_num: u32) -> Result<[f64; 4], SignError> {
        let page_id = self.page_id(page_num)?;

        let mut current = Some(page_id);
        let mut depth = 0;
        while let Some(id) = current {
            if depth > MAX_TREE_DEPTH {
                return Err(corrupt("Page tree is too deep or cyclic"));
            }
            let dict = self.dict(id)?;
            if let Ok(media_box) = dict.get(b"MediaBox") {
                return self.parse_rect(media_box);
            }
            current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
            depth += 1;
        }

        // Default to US Letter size
        Ok([0.0, 0.0, 612.0, 792.0])
    }

    /// Page size in points, ignoring the MediaBox origin
    pub fn page_size(&self, page_num: u32) -> Result<PageSize, SignError> {
        let [_, _, width, height] = self.page_dimensions(page_num)?;
        Ok(PageSize { width, height })
    }

    /// Add a decoded image as an image XObject (with soft mask when it has alpha)
    pub fn embed_image(&mut self, image: &DecodedImage) -> Result<EmbeddedImage, SignError> {
        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => image.color_space.pdf_name(),
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if let Some(alpha) = &image.alpha {
            let smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(alpha)?,
            );
            let smask_id = self.doc.add_object(smask);
            image_dict.set("SMask", Object::Reference(smask_id));
        }

        let id = self
            .doc
            .add_object(Stream::new(image_dict, deflate(&image.pixels)?));

        Ok(EmbeddedImage {
            id,
            name: format!("DocStampImg{}", id.0),
            pixel_width: image.width,
            pixel_height: image.height,
        })
    }

    /// Draw an embedded image on a page at the given placement.
    ///
    /// The placement is relative to the MediaBox origin.
    pub fn draw_image(
        &mut self,
        page_num: u32,
        image: &EmbeddedImage,
        placement: &PlacementBox,
    ) -> Result<(), SignError> {
        let page_id = self.page_id(page_num)?;
        let [origin_x, origin_y, _, _] = self.page_dimensions(page_num)?;

        self.register_xobject(page_id, &image.name, image.id)?;
        self.wrap_page_contents(page_id)?;

        let content = format!(
            "q {} 0 0 {} {} {} cm /{} Do Q\n",
            fmt_num(placement.width),
            fmt_num(placement.height),
            fmt_num(origin_x + placement.x),
            fmt_num(origin_y + placement.y),
            image.name,
        );
        self.append_content(page_id, content.into_bytes())
    }

    /// Save the document to bytes
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, SignError> {
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| SignError::SerializationError(e.to_string()))?;
        Ok(buffer)
    }

    fn dict(&self, id: ObjectId) -> Result<&Dictionary, SignError> {
        self.doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|e| corrupt(format!("Object {:?} is not a dictionary: {}", id, e)))
    }

    fn dict_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary, SignError> {
        self.doc
            .get_object_mut(id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| corrupt(format!("Object {:?} is not a dictionary: {}", id, e)))
    }

    /// Parse a PDF rectangle array into [x, y, width, height]
    fn parse_rect(&self, obj: &Object) -> Result<[f64; 4], SignError> {
        let arr = match obj {
            Object::Array(a) => a,
            Object::Reference(id) => self
                .doc
                .get_object(*id)
                .and_then(|o| o.as_array())
                .map_err(|_| corrupt("MediaBox reference is not an array"))?,
            _ => return Err(corrupt("MediaBox is not an array")),
        };

        if arr.len() != 4 {
            return Err(corrupt(format!(
                "MediaBox has {} elements, expected 4",
                arr.len()
            )));
        }

        let mut values = [0.0f64; 4];
        for (i, obj) in arr.iter().enumerate() {
            values[i] = self.extract_number(obj)?;
        }

        Ok([
            values[0].min(values[2]),
            values[1].min(values[3]),
            (values[2] - values[0]).abs(),
            (values[3] - values[1]).abs(),
        ])
    }

    fn extract_number(&self, obj: &Object) -> Result<f64, SignError> {
        match obj {
            Object::Integer(i) => Ok(*i as f64),
            Object::Real(r) => Ok(*r as f64),
            Object::Reference(id) => {
                let resolved = self
                    .doc
                    .get_object(*id)
                    .map_err(|e| corrupt(format!("Failed to resolve: {}", e)))?;
                self.extract_number(resolved)
            }
            _ => Err(corrupt("Expected number in rectangle")),
        }
    }

    /// Resources inherited from the nearest ancestor in the page tree
    fn inherited_resources(&self, page_id: ObjectId) -> Result<Dictionary, SignError> {
        let mut current = self
            .dict(page_id)?
            .get(b"Parent")
            .and_then(|p| p.as_reference())
            .ok();
        let mut depth = 0;

        while let Some(id) = current {
            if depth > MAX_TREE_DEPTH {
                return Err(corrupt("Page tree is too deep or cyclic"));
            }
            let node = self.dict(id)?;
            match node.get(b"Resources") {
                Ok(Object::Dictionary(d)) => return Ok(d.clone()),
                Ok(Object::Reference(r)) => return Ok(self.dict(*r)?.clone()),
                _ => {}
            }
            current = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
            depth += 1;
        }

        Ok(Dictionary::new())
    }

    /// Make `name` resolve to `image_id` in the page's XObject resources
    fn register_xobject(
        &mut self,
        page_id: ObjectId,
        name: &str,
        image_id: ObjectId,
    ) -> Result<(), SignError> {
        let own_resources = match self.dict(page_id)?.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(Some(*id)),
            Ok(Object::Dictionary(_)) => Some(None),
            Ok(_) => return Err(corrupt("Page Resources is not a dictionary")),
            Err(_) => None,
        };
        let resources_ref = match own_resources {
            Some(reference) => reference,
            None => {
                // Pin inherited resources on the page so fonts keep resolving
                let inherited = self.inherited_resources(page_id)?;
                self.dict_mut(page_id)?
                    .set("Resources", Object::Dictionary(inherited));
                None
            }
        };

        let mut xobjects = {
            let resources = match resources_ref {
                Some(id) => self.dict(id)?,
                None => self
                    .dict(page_id)?
                    .get(b"Resources")
                    .and_then(|r| r.as_dict())
                    .map_err(|_| corrupt("Page Resources is not a dictionary"))?,
            };
            match resources.get(b"XObject") {
                Ok(Object::Dictionary(d)) => d.clone(),
                Ok(Object::Reference(id)) => self.dict(*id)?.clone(),
                Ok(_) => return Err(corrupt("XObject resource is not a dictionary")),
                Err(_) => Dictionary::new(),
            }
        };
        xobjects.set(name, Object::Reference(image_id));

        let resources = match resources_ref {
            Some(id) => self.dict_mut(id)?,
            None => self
                .dict_mut(page_id)?
                .get_mut(b"Resources")
                .and_then(|r| r.as_dict_mut())
                .map_err(|_| corrupt("Page Resources is not a dictionary"))?,
        };
        resources.set("XObject", Object::Dictionary(xobjects));
        Ok(())
    }

    /// Current content stream references of a page, flattened into a list
    fn page_contents(&self, page_id: ObjectId) -> Result<Vec<Object>, SignError> {
        match self.dict(page_id)?.get(b"Contents") {
            Ok(Object::Array(arr)) => Ok(arr.clone()),
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(arr)) => Ok(arr.clone()),
                Ok(Object::Stream(_)) => Ok(vec![Object::Reference(*id)]),
                _ => Err(corrupt("Page Contents does not reference a stream")),
            },
            Ok(_) => Err(corrupt("Page Contents is neither a stream nor an array")),
            Err(_) => Ok(vec![]),
        }
    }

    /// Isolate existing page content in a q/Q pair so it cannot leak
    /// transformations into appended drawing operations
    fn wrap_page_contents(&mut self, page_id: ObjectId) -> Result<(), SignError> {
        if self.wrapped_pages.contains(&page_id) {
            return Ok(());
        }

        let existing = self.page_contents(page_id)?;
        if !existing.is_empty() {
            let push = self
                .doc
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let pop = self
                .doc
                .add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));

            let mut contents = Vec::with_capacity(existing.len() + 2);
            contents.push(Object::Reference(push));
            contents.extend(existing);
            contents.push(Object::Reference(pop));
            self.dict_mut(page_id)?
                .set("Contents", Object::Array(contents));
        }

        self.wrapped_pages.insert(page_id);
        Ok(())
    }

    fn append_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<(), SignError> {
        let stream_id = self.doc.add_object(Stream::new(Dictionary::new(), content));
        let mut contents = self.page_contents(page_id)?;
        contents.push(Object::Reference(stream_id));
        self.dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SignError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| SignError::SerializationError(format!("Failed to compress image: {}", e)))
}

/// Format a coordinate for a content stream
fn fmt_num(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
