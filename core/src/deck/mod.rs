//! In-memory presentation: the package plus a parsed tree for every slide.
//!
//! Only slide parts (and their relationships) are parsed; every other part is
//! carried through untouched so that saving an unedited deck keeps its content.

pub mod package;
pub mod shape;
pub mod units;

use crate::error::DeckError;
use crate::xml::{Element, XmlDocument};
use image::ImageReader;
use package::{Package, Relationships, IMAGE_REL, OFFICE_DOCUMENT_REL};
use shape::{Shape, ShapeMut};
use slide_common::SlideSummary;
use std::io::Cursor;
use std::path::Path;
use units::Emu;

pub use shape::{FontSpec, ShapeKind};

const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";
const RELATIONSHIPS_NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// One slide part.
#[derive(Debug, Clone)]
pub struct Slide {
    partname: String,
    doc: XmlDocument,
    rels: Option<Relationships>,
}

impl Slide {
    fn parse(package: &Package, partname: String) -> Result<Self, DeckError> {
        let doc = package.xml_part(&partname)?;
        let rels = package.relationships(&partname)?;
        Ok(Self { partname, doc, rels })
    }

    pub fn partname(&self) -> &str {
        &self.partname
    }

    fn shape_tree(&self) -> Option<&Element> {
        self.doc.root.path(&["cSld", "spTree"])
    }

    fn shape_tree_mut(&mut self) -> Result<&mut Element, DeckError> {
        let part = self.partname.clone();
        self.doc.root.path_mut(&["cSld", "spTree"]).ok_or(DeckError::Xml {
            part,
            message: "slide has no shape tree".to_string(),
        })
    }

    /// Top-level shapes in document order.
    pub fn shapes(&self) -> Vec<Shape<'_>> {
        self.shape_tree()
            .map(|tree| tree.elements().filter(|e| shape::is_shape_element(e)).map(Shape::new).collect())
            .unwrap_or_default()
    }

    pub fn shapes_mut(&mut self) -> Vec<ShapeMut<'_>> {
        match self.doc.root.path_mut(&["cSld", "spTree"]) {
            Some(tree) => tree
                .elements_mut()
                .filter(|e| shape::is_shape_element(e))
                .map(ShapeMut::new)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Text of every text-bearing shape, one per line.
    pub fn text(&self) -> String {
        self.shapes()
            .iter()
            .filter_map(Shape::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn next_shape_id(&self) -> Result<u32, DeckError> {
        self.shape_tree()
            .map_or(0, shape::max_shape_id)
            .checked_add(1)
            .ok_or_else(|| DeckError::Xml { part: self.partname.clone(), message: "shape ids exhausted".to_string() })
    }
}

#[derive(Debug, Clone)]
pub struct Deck {
    package: Package,
    slides: Vec<Slide>,
}

impl Deck {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        let pkg = Package::from_bytes(bytes)?;

        let presentation_part = pkg
            .relationships("")?
            .and_then(|rels| rels.target_of_type(OFFICE_DOCUMENT_REL).map(|t| package::resolve_target("", t)))
            .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_string());

        let presentation = pkg.xml_part(&presentation_part)?;
        let rels = pkg.relationships(&presentation_part)?.ok_or_else(|| DeckError::MissingPart {
            part: package::rels_part_for(&presentation_part),
        })?;

        let mut slides = Vec::new();
        if let Some(list) = presentation.root.child("sldIdLst") {
            for entry in list.children_named("sldId") {
                let rel_id = entry
                    .attrs
                    .iter()
                    .find(|(k, _)| k.as_str() != "id" && crate::xml::local_name(k) == "id")
                    .map(|(_, v)| v.as_str())
                    .ok_or_else(|| DeckError::Xml {
                        part: presentation_part.clone(),
                        message: "slide entry without relationship id".to_string(),
                    })?;
                let target = rels.target(rel_id).ok_or_else(|| DeckError::Xml {
                    part: presentation_part.clone(),
                    message: format!("dangling slide relationship {rel_id}"),
                })?;
                let partname = package::resolve_target(&presentation_part, target);
                slides.push(Slide::parse(&pkg, partname)?);
            }
        }

        tracing::debug!(slides = slides.len(), part = %presentation_part, "loaded presentation");
        Ok(Self { package: pkg, slides })
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DeckError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the deck back into a `.pptx` archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        let mut overrides = Vec::with_capacity(self.slides.len() * 2);
        for slide in &self.slides {
            overrides.push((slide.partname.clone(), slide.doc.to_bytes()));
            if let Some(rels) = &slide.rels {
                overrides.push((package::rels_part_for(&slide.partname), rels.to_bytes()));
            }
        }
        self.package.to_bytes_with(&overrides)
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn index_of(&self, slide_number: usize) -> Result<usize, DeckError> {
        if slide_number == 0 || slide_number > self.slides.len() {
            return Err(DeckError::SlideOutOfRange { slide_number, slide_count: self.slides.len() });
        }
        Ok(slide_number - 1)
    }

    /// Slide by 1-based number.
    pub fn slide(&self, slide_number: usize) -> Result<&Slide, DeckError> {
        let idx = self.index_of(slide_number)?;
        Ok(&self.slides[idx])
    }

    pub fn slide_mut(&mut self, slide_number: usize) -> Result<&mut Slide, DeckError> {
        let idx = self.index_of(slide_number)?;
        Ok(&mut self.slides[idx])
    }

    pub fn slides_mut(&mut self) -> &mut [Slide] {
        &mut self.slides
    }

    pub fn summaries(&self) -> Vec<SlideSummary> {
        self.slides
            .iter()
            .enumerate()
            .map(|(idx, slide)| SlideSummary { slide_number: idx + 1, text: slide.text() })
            .collect()
    }

    /// Embed `image` on a slide at (`left`, `top`), `height` tall, with the
    /// width following the image's aspect ratio.
    pub fn add_picture(
        &mut self,
        slide_number: usize,
        image: &[u8],
        left: Emu,
        top: Emu,
        height: Emu,
    ) -> Result<(), DeckError> {
        let idx = self.index_of(slide_number)?;
        let id = self.slides[idx].next_shape_id()?;

        let reader = ImageReader::new(Cursor::new(image)).with_guessed_format()?;
        let format = reader.format().ok_or(DeckError::UnsupportedImage)?;
        let ext = format.extensions_str().first().copied().ok_or(DeckError::UnsupportedImage)?;
        let (px_width, px_height) = reader.into_dimensions()?;
        if px_height == 0 {
            return Err(DeckError::UnsupportedImage);
        }
        let width = Emu(height.0 * i64::from(px_width) / i64::from(px_height));

        let media = self.package.next_media_name(ext);
        self.package.set_part(&media, image.to_vec());
        self.package.ensure_default_content_type(ext, format.to_mime_type())?;

        let slide = &mut self.slides[idx];
        let target = package::relative_target(&slide.partname, &media);
        let rel_id = slide.rels.get_or_insert_with(Relationships::default).add(IMAGE_REL, &target);
        if slide.doc.root.attr("xmlns:r").is_none() {
            slide.doc.root.set_attr("xmlns:r", RELATIONSHIPS_NS_R);
        }
        slide
            .shape_tree_mut()?
            .insert_before(shape::picture_element(id, &rel_id, left, top, width, height), &["extLst"]);

        tracing::debug!(slide = slide_number, %media, %rel_id, "embedded picture");
        Ok(())
    }
}
