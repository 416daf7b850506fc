use thiserror::Error;

/// Core error type for a chat turn.
#[derive(Error, Debug)]
pub enum SlideError {
    /// Presentation package errors
    #[error("Presentation error: {0}")]
    Deck(#[from] DeckError),

    /// The model's JSON did not describe a valid action
    #[error("Invalid action: {0}")]
    Action(#[from] ActionError),

    /// The language model could not be reached or answered with an error
    #[error("Model request failed: {0}")]
    Model(#[source] anyhow::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No presentation loaded.")]
    NoPresentation,
}

impl SlideError {
    /// Message safe to show to a client. Library internals are reduced to a
    /// generic description; the full error is logged by the caller.
    pub fn public_message(&self) -> String {
        match self {
            SlideError::Deck(DeckError::SlideOutOfRange { .. })
            | SlideError::Action(_)
            | SlideError::NoPresentation => self.to_string(),
            SlideError::Deck(DeckError::UnsupportedImage | DeckError::Image(_)) => {
                "The icon image could not be read.".to_string()
            }
            SlideError::Deck(_) => "The presentation could not be updated.".to_string(),
            SlideError::Model(_) => "The language model request failed.".to_string(),
            SlideError::Io(_) => "The presentation could not be saved.".to_string(),
        }
    }
}

/// Errors reading, editing or writing a `.pptx` package.
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("invalid presentation archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("package is missing part {part}")]
    MissingPart { part: String },

    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("presentation unpacks to more than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("slide {slide_number} is out of range (deck has {slide_count} slides)")]
    SlideOutOfRange { slide_number: usize, slide_count: usize },

    #[error("unsupported image format")]
    UnsupportedImage,

    #[error("image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ways a model-produced action object can fail to decode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` should be {expected}")]
    WrongType { field: &'static str, expected: &'static str },

    #[error("unknown action `{0}`")]
    UnknownTag(String),
}

pub type Result<T> = std::result::Result<T, SlideError>;
