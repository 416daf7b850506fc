//! The four deck mutations a chat instruction can resolve to.

use crate::deck::units::Emu;
use crate::deck::Deck;
use crate::error::{ActionError, DeckError};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

const STYLE_TYPEFACE: &str = "Arial";
const STYLE_SIZE_INCHES: f64 = 0.4;

const ICON_LEFT_INCHES: f64 = 5.0;
const ICON_TOP_INCHES: f64 = 1.0;
const ICON_HEIGHT_INCHES: f64 = 1.0;

/// Left and right column slots used by `change_layout`, as (left, top) inches.
const LAYOUT_SLOTS: [(f64, f64); 2] = [(0.5, 0.5), (4.0, 0.5)];

/// A decoded action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Replace `old_text` in the first shape containing it, on one slide or
    /// on every slide when `slide_number` is absent.
    EditText { slide_number: Option<usize>, old_text: String, new_text: String },
    /// Blanket font override; `style` is accepted but has no effect.
    ApplyStyle { slide_number: usize, style: Option<String> },
    AddIcon { slide_number: usize, keywords: Vec<String> },
    ChangeLayout { slide_number: usize },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::EditText { .. } => "edit_text",
            Action::ApplyStyle { .. } => "apply_style",
            Action::AddIcon { .. } => "add_icon",
            Action::ChangeLayout { .. } => "change_layout",
        }
    }

    /// Decode a JSON object produced by the model. Fields not used by the
    /// action are ignored.
    pub fn decode(value: &Value) -> Result<Self, ActionError> {
        let map = value
            .as_object()
            .ok_or(ActionError::WrongType { field: "action", expected: "a JSON object" })?;

        let tag = match map.get("action") {
            None | Some(Value::Null) => return Err(ActionError::MissingField { field: "action" }),
            Some(Value::String(tag)) => tag.as_str(),
            Some(_) => return Err(ActionError::WrongType { field: "action", expected: "a string" }),
        };

        match tag {
            "edit_text" => Ok(Action::EditText {
                slide_number: optional_slide_number(map)?,
                old_text: required_string(map, "old_text")?,
                new_text: required_string(map, "new_text")?,
            }),
            "apply_style" => Ok(Action::ApplyStyle {
                slide_number: required_slide_number(map)?,
                style: optional_string(map, "style")?,
            }),
            "add_icon" => Ok(Action::AddIcon {
                slide_number: required_slide_number(map)?,
                keywords: keywords(map)?,
            }),
            "change_layout" => Ok(Action::ChangeLayout { slide_number: required_slide_number(map)? }),
            other => Err(ActionError::UnknownTag(other.to_string())),
        }
    }

    pub fn apply(&self, deck: &mut Deck, ctx: &ActionContext) -> Result<Outcome, DeckError> {
        match self {
            Action::EditText { slide_number, old_text, new_text } => {
                edit_text(deck, *slide_number, old_text, new_text)
            }
            Action::ApplyStyle { slide_number, .. } => apply_style(deck, *slide_number),
            Action::AddIcon { slide_number, keywords } => add_icon(deck, *slide_number, keywords, ctx),
            Action::ChangeLayout { slide_number } => change_layout(deck, *slide_number),
        }
    }
}

fn optional_slide_number(map: &Map<String, Value>) -> Result<Option<usize>, ActionError> {
    match map.get("slide_number") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or(ActionError::WrongType { field: "slide_number", expected: "a non-negative integer" }),
    }
}

fn required_slide_number(map: &Map<String, Value>) -> Result<usize, ActionError> {
    optional_slide_number(map)?.ok_or(ActionError::MissingField { field: "slide_number" })
}

fn optional_string(map: &Map<String, Value>, field: &'static str) -> Result<Option<String>, ActionError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ActionError::WrongType { field, expected: "a string" }),
    }
}

fn required_string(map: &Map<String, Value>, field: &'static str) -> Result<String, ActionError> {
    optional_string(map, field)?.ok_or(ActionError::MissingField { field })
}

/// `keywords` may be a list of strings or a single string.
fn keywords(map: &Map<String, Value>) -> Result<Vec<String>, ActionError> {
    const EXPECTED: &str = "a list of strings";
    match map.get("keywords") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(ActionError::WrongType { field: "keywords", expected: EXPECTED })
            })
            .collect(),
        Some(_) => Err(ActionError::WrongType { field: "keywords", expected: EXPECTED }),
    }
}

/// Result of applying an action; its `Display` is the chat reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    EditApplied,
    TextNotFound,
    StyleApplied,
    IconAdded,
    LayoutUpdated,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::EditApplied => "Edit applied.",
            Outcome::TextNotFound => "Text not found.",
            Outcome::StyleApplied => "Modern style applied.",
            Outcome::IconAdded => "Placeholder icon added.",
            Outcome::LayoutUpdated => "Slide layout updated.",
        };
        f.write_str(text)
    }
}

/// Settings the handlers need besides the deck.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub icon_path: PathBuf,
}

impl ActionContext {
    pub fn new(icon_path: impl Into<PathBuf>) -> Self {
        Self { icon_path: icon_path.into() }
    }
}

fn edit_text(
    deck: &mut Deck,
    slide_number: Option<usize>,
    old_text: &str,
    new_text: &str,
) -> Result<Outcome, DeckError> {
    let slides = match slide_number {
        Some(n) => std::slice::from_mut(deck.slide_mut(n)?),
        None => deck.slides_mut(),
    };

    for slide in slides {
        let partname = slide.partname().to_string();
        for mut shape in slide.shapes_mut() {
            let Some(text) = shape.text() else {
                continue;
            };
            if text.contains(old_text) {
                shape.set_text(&text.replace(old_text, new_text));
                tracing::debug!(slide = %partname, "replaced text");
                return Ok(Outcome::EditApplied);
            }
        }
    }
    Ok(Outcome::TextNotFound)
}

fn apply_style(deck: &mut Deck, slide_number: usize) -> Result<Outcome, DeckError> {
    let size = Emu::from_inches(STYLE_SIZE_INCHES);
    for mut shape in deck.slide_mut(slide_number)?.shapes_mut() {
        if shape.has_text_frame() {
            shape.set_first_paragraph_font(STYLE_TYPEFACE, size);
        }
    }
    Ok(Outcome::StyleApplied)
}

fn add_icon(
    deck: &mut Deck,
    slide_number: usize,
    keywords: &[String],
    ctx: &ActionContext,
) -> Result<Outcome, DeckError> {
    deck.slide(slide_number)?;
    tracing::debug!(?keywords, "add_icon keywords");

    if !ctx.icon_path.is_file() {
        tracing::debug!(path = %ctx.icon_path.display(), "icon file not found; nothing added");
        return Ok(Outcome::IconAdded);
    }
    let image = std::fs::read(&ctx.icon_path)?;
    deck.add_picture(
        slide_number,
        &image,
        Emu::from_inches(ICON_LEFT_INCHES),
        Emu::from_inches(ICON_TOP_INCHES),
        Emu::from_inches(ICON_HEIGHT_INCHES),
    )?;
    Ok(Outcome::IconAdded)
}

fn change_layout(deck: &mut Deck, slide_number: usize) -> Result<Outcome, DeckError> {
    let slide = deck.slide_mut(slide_number)?;
    let text_shapes = slide.shapes_mut().into_iter().filter(|s| s.has_text_frame());
    for (mut shape, (left, top)) in text_shapes.zip(LAYOUT_SLOTS) {
        shape.set_position(Emu::from_inches(left), Emu::from_inches(top));
    }
    Ok(Outcome::LayoutUpdated)
}
