//! Fixture builder producing small but well-formed `.pptx` packages.
#![allow(clippy::expect_used)]

use crate::deck::package::{OFFICE_DOCUMENT_REL, SLIDE_REL};
use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

#[derive(Debug, Clone)]
pub enum FixtureShape {
    /// Text box; `\n` separates paragraphs.
    Text(String),
    /// A connector line, which carries no text.
    Connector,
    /// Auto-shape with no text body at all.
    EmptyShape,
}

#[derive(Debug, Clone, Default)]
pub struct DeckBuilder {
    slides: Vec<Vec<FixtureShape>>,
    reversed: bool,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(self, texts: &[&str]) -> Self {
        self.slide_with(texts.iter().map(|t| FixtureShape::Text(t.to_string())).collect())
    }

    pub fn slide_with(mut self, shapes: Vec<FixtureShape>) -> Self {
        self.slides.push(shapes);
        self
    }

    /// List slide parts in the presentation in reverse part order.
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut put = |name: &str, body: String| {
            zip.start_file(name, options).expect("start fixture part");
            zip.write_all(body.as_bytes()).expect("write fixture part");
        };

        put("[Content_Types].xml", self.content_types());
        put(
            "_rels/.rels",
            rels(&[("rId1".to_string(), OFFICE_DOCUMENT_REL, "ppt/presentation.xml".to_string())]),
        );
        put("ppt/presentation.xml", self.presentation());
        let slide_rels: Vec<(String, &str, String)> = (1..=self.slides.len())
            .map(|n| (format!("rId{}", n + 1), SLIDE_REL, format!("slides/slide{n}.xml")))
            .collect();
        put("ppt/_rels/presentation.xml.rels", rels(&slide_rels));
        for (idx, shapes) in self.slides.iter().enumerate() {
            put(&format!("ppt/slides/slide{}.xml", idx + 1), slide_xml(shapes));
        }

        zip.finish().expect("finish fixture zip").into_inner()
    }

    fn content_types(&self) -> String {
        let mut xml = format!(
            "{DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             <Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>"
        );
        for n in 1..=self.slides.len() {
            xml.push_str(&format!(
                "<Override PartName=\"/ppt/slides/slide{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation(&self) -> String {
        let mut order: Vec<usize> = (1..=self.slides.len()).collect();
        if self.reversed {
            order.reverse();
        }
        let ids: String = order
            .iter()
            .enumerate()
            .map(|(pos, n)| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 256 + pos, n + 1))
            .collect();
        format!(
            "{DECL}<p:presentation {NS}><p:sldIdLst>{ids}</p:sldIdLst>\
             <p:sldSz cx=\"9144000\" cy=\"6858000\"/><p:notesSz cx=\"6858000\" cy=\"9144000\"/></p:presentation>"
        )
    }
}

fn rels(entries: &[(String, &str, String)]) -> String {
    let body: String = entries
        .iter()
        .map(|(id, ty, target)| format!("<Relationship Id=\"{id}\" Type=\"{ty}\" Target=\"{target}\"/>"))
        .collect();
    format!(
        "{DECL}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{body}</Relationships>"
    )
}

fn slide_xml(shapes: &[FixtureShape]) -> String {
    let mut tree = String::from(
        "<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
         <p:grpSpPr><a:xfrm><a:off x=\"0\" y=\"0\"/><a:ext cx=\"0\" cy=\"0\"/><a:chOff x=\"0\" y=\"0\"/><a:chExt cx=\"0\" cy=\"0\"/></a:xfrm></p:grpSpPr>",
    );
    for (idx, shape) in shapes.iter().enumerate() {
        let id = idx + 2;
        let top = 914_400 * (idx + 1);
        match shape {
            FixtureShape::Text(text) => {
                let paragraphs: String = text
                    .split('\n')
                    .map(|p| {
                        format!("<a:p><a:r><a:rPr lang=\"en-US\" dirty=\"0\"/><a:t>{}</a:t></a:r></a:p>", escape(p))
                    })
                    .collect();
                tree.push_str(&format!(
                    "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
                     <p:spPr><a:xfrm><a:off x=\"914400\" y=\"{top}\"/><a:ext cx=\"4572000\" cy=\"457200\"/></a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>\
                     <p:txBody><a:bodyPr wrap=\"none\"/><a:lstStyle/>{paragraphs}</p:txBody></p:sp>",
                    id - 1
                ));
            }
            FixtureShape::Connector => tree.push_str(&format!(
                "<p:cxnSp><p:nvCxnSpPr><p:cNvPr id=\"{id}\" name=\"Connector {}\"/><p:cNvCxnSpPr/><p:nvPr/></p:nvCxnSpPr>\
                 <p:spPr><a:xfrm><a:off x=\"0\" y=\"{top}\"/><a:ext cx=\"914400\" cy=\"0\"/></a:xfrm><a:prstGeom prst=\"line\"><a:avLst/></a:prstGeom></p:spPr></p:cxnSp>",
                id - 1
            )),
            FixtureShape::EmptyShape => tree.push_str(&format!(
                "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"Rectangle {}\"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>\
                 <p:spPr><a:xfrm><a:off x=\"0\" y=\"{top}\"/><a:ext cx=\"914400\" cy=\"914400\"/></a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:sp>",
                id - 1
            )),
        }
    }
    format!(
        "{DECL}<p:sld {NS}><p:cSld><p:spTree>{tree}</p:spTree></p:cSld>\
         <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"
    )
}

/// A solid-colour PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode fixture png");
    out.into_inner()
}

/// A one-part zip whose central directory claims the part unpacks to
/// `declared` bytes while the stored data is a few bytes long.
pub fn zip_with_declared_size(declared: u64) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);
    zip.start_file("ppt/presentation.xml", options).expect("start fixture part");
    zip.write_all(b"<p:presentation/>").expect("write fixture part");
    let mut bytes = zip.finish().expect("finish fixture zip").into_inner();

    let header = bytes
        .windows(4)
        .position(|w| w == [0x50, 0x4b, 0x01, 0x02])
        .expect("central directory header");
    let field = |bytes: &[u8], at: usize| usize::from(u16::from_le_bytes([bytes[at], bytes[at + 1]]));
    let size_field = header + 24..header + 28;
    let mut pos = header + 46 + field(&bytes, header + 28);
    let end = pos + field(&bytes, header + 30);

    // The zip64 extra field carries the real size when the 32-bit one is saturated.
    while pos + 4 <= end {
        let (id, len) = (field(&bytes, pos), field(&bytes, pos + 2));
        if id == 0x0001 && len >= 8 && bytes[size_field.clone()] == [0xff; 4] {
            bytes[pos + 4..pos + 12].copy_from_slice(&declared.to_le_bytes());
            return bytes;
        }
        pos += 4 + len;
    }
    let narrow = u32::try_from(declared).unwrap_or(u32::MAX - 1);
    bytes[size_field].copy_from_slice(&narrow.to_le_bytes());
    bytes
}
