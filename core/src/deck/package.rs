//! The zip container of a presentation and the OPC bookkeeping parts
//! (content types and relationships) that edits have to keep consistent.

use crate::error::DeckError;
use crate::xml::{Element, XmlDocument};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const SLIDE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Ceiling on the total unpacked size of all parts of an uploaded package.
pub const MAX_UNPACKED_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// Every part of the package, in archive order.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeckError> {
        Self::from_bytes_with_limit(bytes, MAX_UNPACKED_BYTES)
    }

    /// Unpack every part, failing once the parts together exceed `limit`
    /// bytes. Sizes declared in the archive are not trusted for allocation.
    pub fn from_bytes_with_limit(bytes: &[u8], limit: u64) -> Result<Self, DeckError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut remaining = limit;
        for idx in 0..archive.len() {
            let mut file = archive.by_index(idx)?;
            if file.is_dir() {
                continue;
            }
            if file.size() > remaining {
                return Err(DeckError::TooLarge { limit });
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            (&mut file).take(remaining.saturating_add(1)).read_to_end(&mut data)?;
            let read = u64::try_from(data.len()).unwrap_or(u64::MAX);
            if read > remaining {
                return Err(DeckError::TooLarge { limit });
            }
            remaining -= read;
            parts.push(Part { name, data });
        }
        Ok(Self { parts })
    }

    /// Write the package, substituting `overrides` for parts of the same name
    /// and appending overrides that are new.
    pub fn to_bytes_with(&self, overrides: &[(String, Vec<u8>)]) -> Result<Vec<u8>, DeckError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        // Fixed timestamps keep saves of an identical deck byte-identical.
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for part in &self.parts {
            let data = overrides
                .iter()
                .find(|(name, _)| *name == part.name)
                .map_or(part.data.as_slice(), |(_, data)| data.as_slice());
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(data)?;
        }
        for (name, data) in overrides {
            if !self.contains(name) {
                writer.start_file(name.as_str(), options)?;
                writer.write_all(data)?;
            }
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.iter().find(|p| p.name == name).map(|p| p.data.as_slice())
    }

    #[cfg(test)]
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part { name: name.to_string(), data }),
        }
    }

    pub fn xml_part(&self, name: &str) -> Result<XmlDocument, DeckError> {
        let data = self
            .part(name)
            .ok_or_else(|| DeckError::MissingPart { part: name.to_string() })?;
        XmlDocument::parse(data).map_err(|e| DeckError::Xml { part: name.to_string(), message: e.to_string() })
    }

    /// Relationships of `source`, if the package has a rels part for it.
    pub fn relationships(&self, source: &str) -> Result<Option<Relationships>, DeckError> {
        let rels = rels_part_for(source);
        if !self.contains(&rels) {
            return Ok(None);
        }
        Ok(Some(Relationships { doc: self.xml_part(&rels)? }))
    }

    /// First unused `ppt/media/imageN.<ext>`.
    pub fn next_media_name(&self, ext: &str) -> String {
        (1..)
            .map(|n| format!("ppt/media/image{n}.{ext}"))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| format!("ppt/media/image.{ext}"))
    }

    /// Register a `<Default>` content type for `ext` unless one exists.
    pub fn ensure_default_content_type(&mut self, ext: &str, content_type: &str) -> Result<(), DeckError> {
        let mut doc = self.xml_part(CONTENT_TYPES_PART)?;
        let known = doc
            .root
            .children_named("Default")
            .any(|d| d.attr("Extension").is_some_and(|e| e.eq_ignore_ascii_case(ext)));
        if known {
            return Ok(());
        }
        doc.root.prepend(
            Element::new("Default")
                .with_attr("Extension", ext)
                .with_attr("ContentType", content_type),
        );
        self.set_part(CONTENT_TYPES_PART, doc.to_bytes());
        Ok(())
    }
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`.
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Target of `to` written relative to the directory of `from`.
pub fn relative_target(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to_segments: Vec<&str> = to.split('/').collect();
    let common = from_dir
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; from_dir.len() - common];
    out.extend(&to_segments[common..]);
    out.join("/")
}

/// A `.rels` part.
#[derive(Debug, Clone)]
pub struct Relationships {
    doc: XmlDocument,
}

impl Default for Relationships {
    fn default() -> Self {
        Self { doc: XmlDocument::new(Element::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS)) }
    }
}

impl Relationships {
    pub fn target(&self, id: &str) -> Option<&str> {
        self.doc
            .root
            .children_named("Relationship")
            .find(|r| r.attr("Id") == Some(id))
            .and_then(|r| r.attr("Target"))
    }

    /// Target of the first relationship of type `rel_type`.
    pub fn target_of_type(&self, rel_type: &str) -> Option<&str> {
        self.doc
            .root
            .children_named("Relationship")
            .find(|r| r.attr("Type") == Some(rel_type))
            .and_then(|r| r.attr("Target"))
    }

    /// Add a relationship and return its new `rIdN`.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = (1..)
            .map(|n| format!("rId{n}"))
            .find(|id| self.target(id).is_none())
            .unwrap_or_else(|| "rId".to_string());
        self.doc.root.children.push(crate::xml::Node::Element(
            Element::new("Relationship")
                .with_attr("Id", id.as_str())
                .with_attr("Type", rel_type)
                .with_attr("Target", target),
        ));
        id
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.doc.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{zip_with_declared_size, DeckBuilder};

    #[test]
    fn test_rels_part_for() {
        assert_eq!(rels_part_for("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_part_for("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("ppt/presentation.xml", "slides/slide2.xml"), "ppt/slides/slide2.xml");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "/ppt/media/x.png"), "ppt/media/x.png");
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(relative_target("ppt/slides/slide1.xml", "ppt/media/image1.png"), "../media/image1.png");
        assert_eq!(relative_target("ppt/presentation.xml", "ppt/slides/slide1.xml"), "slides/slide1.xml");
    }

    #[test]
    fn test_relationship_ids_are_unique() {
        let mut rels = Relationships::default();
        assert_eq!(rels.target("rId1"), None);
        let first = rels.add(IMAGE_REL, "../media/image1.png");
        let second = rels.add(IMAGE_REL, "../media/image2.png");
        assert_eq!(first, "rId1");
        assert_eq!(second, "rId2");
        assert_eq!(rels.target("rId2"), Some("../media/image2.png"));
        assert_eq!(rels.target_of_type(IMAGE_REL), Some("../media/image1.png"));
    }

    #[test]
    fn test_invalid_archive() {
        assert!(matches!(Package::from_bytes(b"not a zip"), Err(DeckError::Zip(_))));
    }

    #[test]
    fn test_parts_round_trip_through_zip() {
        let mut pkg = Package::default();
        let types = br#"<Types xmlns="ct"><Override PartName="/a" ContentType="x"/></Types>"#;
        pkg.set_part(CONTENT_TYPES_PART, types.to_vec());
        pkg.set_part("ppt/a.xml", b"<a/>".to_vec());
        pkg.ensure_default_content_type("png", "image/png").unwrap();
        pkg.ensure_default_content_type("PNG", "image/png").unwrap();

        let bytes = pkg
            .to_bytes_with(&[("ppt/b.xml".to_string(), b"<b/>".to_vec())])
            .unwrap();
        let back = Package::from_bytes(&bytes).unwrap();
        let names: Vec<&str> = back.part_names().collect();
        assert_eq!(names, [CONTENT_TYPES_PART, "ppt/a.xml", "ppt/b.xml"]);

        let types = back.xml_part(CONTENT_TYPES_PART).unwrap();
        assert_eq!(types.root.children_named("Default").count(), 1);
        assert_eq!(back.next_media_name("png"), "ppt/media/image1.png");
    }

    #[test]
    fn test_declared_size_beyond_limit_is_rejected() {
        let bytes = zip_with_declared_size(1 << 62);
        assert!(matches!(Package::from_bytes(&bytes), Err(DeckError::TooLarge { limit: MAX_UNPACKED_BYTES })));
    }

    #[test]
    fn test_unpacked_parts_count_against_limit() {
        let bytes = DeckBuilder::new().slide(&["Welcome"]).build();
        assert!(matches!(Package::from_bytes_with_limit(&bytes, 64), Err(DeckError::TooLarge { limit: 64 })));
        let pkg = Package::from_bytes_with_limit(&bytes, 1 << 20).unwrap();
        assert!(pkg.contains("ppt/slides/slide1.xml"));
    }
}
