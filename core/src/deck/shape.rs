//! Read and write views over the shape elements of a slide's shape tree.

use super::units::Emu;
use crate::xml::{Element, Node};

/// Children of `p:spTree` that are shapes, as opposed to tree properties.
const SHAPE_ELEMENTS: [&str; 6] = ["sp", "grpSp", "graphicFrame", "cxnSp", "pic", "contentPart"];

/// Elements a paragraph's `a:pPr` must precede.
const PARAGRAPH_CONTENT: [&str; 4] = ["r", "br", "fld", "endParaRPr"];

/// Elements an `a:latin` font must precede inside run properties.
const AFTER_LATIN: [&str; 7] = ["ea", "cs", "sym", "hlinkClick", "hlinkMouseOver", "rtl", "extLst"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    AutoShape,
    Group,
    GraphicFrame,
    Connector,
    Picture,
    ContentPart,
}

impl ShapeKind {
    fn of(el: &Element) -> Option<Self> {
        match el.local_name() {
            "sp" => Some(ShapeKind::AutoShape),
            "grpSp" => Some(ShapeKind::Group),
            "graphicFrame" => Some(ShapeKind::GraphicFrame),
            "cxnSp" => Some(ShapeKind::Connector),
            "pic" => Some(ShapeKind::Picture),
            "contentPart" => Some(ShapeKind::ContentPart),
            _ => None,
        }
    }
}

pub(crate) fn is_shape_element(el: &Element) -> bool {
    let local = el.local_name();
    SHAPE_ELEMENTS.iter().any(|name| *name == local)
}

/// Font settings of a paragraph's default run properties.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FontSpec {
    pub typeface: Option<String>,
    /// Hundredths of a point.
    pub size: Option<i64>,
}

/// `name` with the namespace prefix of `like`, e.g. `("p:sp", "txBody")` -> `p:txBody`.
fn same_prefix(like: &str, local: &str) -> String {
    match like.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn paragraph_text(p: &Element) -> String {
    let mut text = String::new();
    for child in p.elements() {
        match child.local_name() {
            "r" | "fld" => {
                if let Some(t) = child.child("t") {
                    text.push_str(&t.text());
                }
            }
            "br" => text.push('\u{b}'),
            _ => {}
        }
    }
    text
}

fn non_visual_props(el: &Element) -> Option<&Element> {
    el.elements()
        .find(|e| {
            let local = e.local_name();
            local.starts_with("nv") && local.ends_with("Pr")
        })
        .and_then(|nv| nv.child("cNvPr"))
}

/// Highest `cNvPr/@id` anywhere under `tree`.
pub(crate) fn max_shape_id(tree: &Element) -> u32 {
    tree.descendants()
        .into_iter()
        .filter(|e| e.is("cNvPr"))
        .filter_map(|e| e.attr("id").and_then(|id| id.parse().ok()))
        .max()
        .unwrap_or(0)
}

/// A shape on a slide.
#[derive(Debug, Clone, Copy)]
pub struct Shape<'a> {
    el: &'a Element,
}

impl<'a> Shape<'a> {
    pub(crate) fn new(el: &'a Element) -> Self {
        Self { el }
    }

    pub fn kind(&self) -> Option<ShapeKind> {
        ShapeKind::of(self.el)
    }

    pub fn id(&self) -> Option<u32> {
        non_visual_props(self.el)?.attr("id")?.parse().ok()
    }

    pub fn name(&self) -> Option<&'a str> {
        non_visual_props(self.el)?.attr("name")
    }

    /// Only auto-shapes carry a text frame.
    pub fn has_text_frame(&self) -> bool {
        self.kind() == Some(ShapeKind::AutoShape)
    }

    /// Paragraphs joined by `\n`, line breaks as `\u{b}`. `None` for shapes
    /// that cannot hold text; an auto-shape without a text body reads as "".
    pub fn text(&self) -> Option<String> {
        if !self.has_text_frame() {
            return None;
        }
        let Some(body) = self.el.child("txBody") else {
            return Some(String::new());
        };
        let paragraphs: Vec<String> = body.children_named("p").map(paragraph_text).collect();
        Some(paragraphs.join("\n"))
    }

    pub fn position(&self) -> Option<(Emu, Emu)> {
        let xfrm = match self.kind()? {
            ShapeKind::GraphicFrame => self.el.child("xfrm")?,
            ShapeKind::Group => self.el.path(&["grpSpPr", "xfrm"])?,
            _ => self.el.path(&["spPr", "xfrm"])?,
        };
        let off = xfrm.child("off")?;
        Some((Emu::parse(off.attr("x")?)?, Emu::parse(off.attr("y")?)?))
    }

    pub fn first_paragraph_font(&self) -> Option<FontSpec> {
        let def = self.el.path(&["txBody", "p", "pPr", "defRPr"])?;
        Some(FontSpec {
            typeface: def.child("latin").and_then(|l| l.attr("typeface")).map(str::to_string),
            size: def.attr("sz").and_then(|s| s.parse().ok()),
        })
    }
}

/// Mutable access to a shape on a slide.
#[derive(Debug)]
pub struct ShapeMut<'a> {
    el: &'a mut Element,
}

impl<'a> ShapeMut<'a> {
    pub(crate) fn new(el: &'a mut Element) -> Self {
        Self { el }
    }

    pub fn as_shape(&self) -> Shape<'_> {
        Shape::new(self.el)
    }

    pub fn has_text_frame(&self) -> bool {
        self.as_shape().has_text_frame()
    }

    pub fn text(&self) -> Option<String> {
        self.as_shape().text()
    }

    fn text_body(&mut self) -> &mut Element {
        if self.el.child("txBody").is_none() {
            let body = Element::new(same_prefix(&self.el.name, "txBody"))
                .with_child(Element::new("a:bodyPr"))
                .with_child(Element::new("a:lstStyle"))
                .with_child(Element::new("a:p"));
            self.el.insert_before(body, &["extLst"]);
        }
        let name = same_prefix(&self.el.name, "txBody");
        self.el.get_or_insert(&name, &["extLst"])
    }

    /// Replace the whole text of the shape, one paragraph per `\n`-separated
    /// line. Each new paragraph reuses the paragraph and first-run properties
    /// of the old paragraph at the same index.
    pub fn set_text(&mut self, text: &str) {
        let body = self.text_body();
        let old = body.remove_children("p");
        for (idx, line) in text.split('\n').enumerate() {
            body.children.push(Node::Element(build_paragraph(line, old.get(idx))));
        }
    }

    /// Set typeface and size on the first paragraph's default run properties,
    /// creating the text body and paragraph when missing.
    pub fn set_first_paragraph_font(&mut self, typeface: &str, size: Emu) {
        let body = self.text_body();
        if body.child("p").is_none() {
            body.children.push(Node::Element(Element::new("a:p")));
        }
        let Some(paragraph) = body.child_mut("p") else {
            return;
        };
        let props = paragraph
            .get_or_insert("a:pPr", &PARAGRAPH_CONTENT)
            .get_or_insert("a:defRPr", &["extLst"]);
        props.set_attr("sz", size.to_centipoints().to_string());
        props
            .get_or_insert("a:latin", &AFTER_LATIN)
            .set_attr("typeface", typeface);
    }

    /// Move the shape's top-left corner, keeping its size.
    pub fn set_position(&mut self, left: Emu, top: Emu) {
        let kind = self.as_shape().kind();
        let xfrm = match kind {
            Some(ShapeKind::GraphicFrame) => {
                let name = same_prefix(&self.el.name, "xfrm");
                self.el.get_or_insert(&name, &["graphic", "extLst"])
            }
            Some(ShapeKind::Group) => {
                let name = same_prefix(&self.el.name, "grpSpPr");
                let props = self.el.get_or_insert(&name, &["extLst"]);
                first_child(props, "a:xfrm")
            }
            _ => {
                let name = same_prefix(&self.el.name, "spPr");
                let props = self.el.get_or_insert(&name, &["style", "txBody", "extLst"]);
                first_child(props, "a:xfrm")
            }
        };
        let off = first_child(xfrm, "a:off");
        off.set_attr("x", left.to_string());
        off.set_attr("y", top.to_string());
    }
}

/// The child named `name`, inserted as the first child when missing.
fn first_child<'e>(parent: &'e mut Element, name: &str) -> &'e mut Element {
    let local = crate::xml::local_name(name);
    if parent.child(local).is_none() {
        parent.prepend(Element::new(name));
    }
    parent.get_or_insert(name, &[])
}

fn build_paragraph(line: &str, template: Option<&Element>) -> Element {
    let mut p = Element::new("a:p");
    let run_props = template
        .and_then(|t| t.child("r"))
        .and_then(|r| r.child("rPr"))
        .cloned();

    if let Some(props) = template.and_then(|t| t.child("pPr")) {
        p = p.with_child(props.clone());
    }
    for (idx, segment) in line.split('\u{b}').enumerate() {
        if idx > 0 {
            let mut br = Element::new("a:br");
            if let Some(props) = &run_props {
                br = br.with_child(props.clone());
            }
            p = p.with_child(br);
        }
        if segment.is_empty() {
            continue;
        }
        let mut run = Element::new("a:r");
        if let Some(props) = &run_props {
            run = run.with_child(props.clone());
        }
        p = p.with_child(run.with_child(Element::new("a:t").with_text(segment)));
    }
    if let Some(end) = template.and_then(|t| t.child("endParaRPr")) {
        p = p.with_child(end.clone());
    }
    p
}

/// `p:pic` element for an embedded image, sized and placed on the slide.
pub(crate) fn picture_element(
    id: u32,
    rel_id: &str,
    left: Emu,
    top: Emu,
    width: Emu,
    height: Emu,
) -> Element {
    let nv = Element::new("p:nvPicPr")
        .with_child(
            Element::new("p:cNvPr")
                .with_attr("id", id.to_string())
                .with_attr("name", format!("Picture {}", id.saturating_sub(1))),
        )
        .with_child(
            Element::new("p:cNvPicPr")
                .with_child(Element::new("a:picLocks").with_attr("noChangeAspect", "1")),
        )
        .with_child(Element::new("p:nvPr"));

    let blip_fill = Element::new("p:blipFill")
        .with_child(Element::new("a:blip").with_attr("r:embed", rel_id))
        .with_child(Element::new("a:stretch").with_child(Element::new("a:fillRect")));

    let sp_pr = Element::new("p:spPr")
        .with_child(
            Element::new("a:xfrm")
                .with_child(
                    Element::new("a:off")
                        .with_attr("x", left.to_string())
                        .with_attr("y", top.to_string()),
                )
                .with_child(
                    Element::new("a:ext")
                        .with_attr("cx", width.to_string())
                        .with_attr("cy", height.to_string()),
                ),
        )
        .with_child(
            Element::new("a:prstGeom")
                .with_attr("prst", "rect")
                .with_child(Element::new("a:avLst")),
        );

    Element::new("p:pic")
        .with_child(nv)
        .with_child(blip_fill)
        .with_child(sp_pr)
}
